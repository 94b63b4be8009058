use serde::{Deserialize, Serialize};
use std::fmt;

/// 阈值类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ThresholdType {
    Value,
    RollingAvg,
    IncreasePercentage,
    Rate,
}

impl ThresholdType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThresholdType::Value => "value",
            ThresholdType::RollingAvg => "rolling-avg",
            ThresholdType::IncreasePercentage => "increase-percentage",
            ThresholdType::Rate => "rate",
        }
    }

    /// 告警信息中的单位
    pub fn unit(&self) -> &'static str {
        match self {
            ThresholdType::Value | ThresholdType::RollingAvg => "",
            ThresholdType::IncreasePercentage => "%",
            ThresholdType::Rate => "/s",
        }
    }

    /// 是否依赖时间窗口内的多个样本
    pub fn is_windowed(&self) -> bool {
        !matches!(self, ThresholdType::Value)
    }
}

impl fmt::Display for ThresholdType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 比较运算符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Comparison {
    #[serde(rename = ">")]
    GreaterThan,
    #[serde(rename = ">=")]
    GreaterOrEqual,
    #[serde(rename = "<")]
    LessThan,
    #[serde(rename = "<=")]
    LessOrEqual,
    #[serde(rename = "==")]
    Equal,
}

impl Comparison {
    pub fn symbol(&self) -> &'static str {
        match self {
            Comparison::GreaterThan => ">",
            Comparison::GreaterOrEqual => ">=",
            Comparison::LessThan => "<",
            Comparison::LessOrEqual => "<=",
            Comparison::Equal => "==",
        }
    }

    pub fn compare(&self, value: f64, threshold: f64) -> bool {
        match self {
            Comparison::GreaterThan => value > threshold,
            Comparison::GreaterOrEqual => value >= threshold,
            Comparison::LessThan => value < threshold,
            Comparison::LessOrEqual => value <= threshold,
            Comparison::Equal => (value - threshold).abs() < f64::EPSILON,
        }
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// 阈值定义，加载后不可变
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Threshold {
    /// 仅对该指标名生效；None 表示对所有指标生效
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metric: Option<String>,

    #[serde(rename = "type")]
    pub kind: ThresholdType,

    pub operator: Comparison,

    pub value: f64,

    /// 时间窗口（毫秒）
    #[serde(default, alias = "timeframe", skip_serializing_if = "Option::is_none")]
    pub time_frame: Option<u64>,
}

impl Threshold {
    pub fn new(kind: ThresholdType, operator: Comparison, value: f64) -> Self {
        Self {
            metric: None,
            kind,
            operator,
            value,
            time_frame: None,
        }
    }

    pub fn with_time_frame(mut self, millis: u64) -> Self {
        self.time_frame = Some(millis);
        self
    }

    pub fn for_metric(mut self, metric: impl Into<String>) -> Self {
        self.metric = Some(metric.into());
        self
    }

    pub fn applies_to(&self, metric_name: &str) -> bool {
        self.metric.as_deref().map_or(true, |m| m == metric_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comparison() {
        assert!(Comparison::GreaterThan.compare(150.0, 100.0));
        assert!(!Comparison::GreaterThan.compare(100.0, 100.0));
        assert!(Comparison::GreaterOrEqual.compare(100.0, 100.0));
        assert!(Comparison::LessThan.compare(1.0, 2.0));
        assert!(Comparison::LessOrEqual.compare(2.0, 2.0));
        assert!(Comparison::Equal.compare(0.1 + 0.2, 0.3));
    }

    #[test]
    fn test_units() {
        assert_eq!(ThresholdType::Value.unit(), "");
        assert_eq!(ThresholdType::RollingAvg.unit(), "");
        assert_eq!(ThresholdType::IncreasePercentage.unit(), "%");
        assert_eq!(ThresholdType::Rate.unit(), "/s");
    }

    #[test]
    fn test_threshold_from_toml() {
        let threshold: Threshold = toml::from_str(
            r#"
metric = "queueSize"
type = "rolling-avg"
operator = ">="
value = 10
timeFrame = 5000
"#,
        )
        .unwrap();

        assert_eq!(threshold.kind, ThresholdType::RollingAvg);
        assert_eq!(threshold.operator, Comparison::GreaterOrEqual);
        assert_eq!(threshold.value, 10.0);
        assert_eq!(threshold.time_frame, Some(5000));
        assert!(threshold.applies_to("queueSize"));
        assert!(!threshold.applies_to("cpu"));
    }

    #[test]
    fn test_threshold_from_json() {
        let threshold: Threshold =
            serde_json::from_str(r#"{"type": "value", "operator": ">", "value": 100}"#).unwrap();
        assert_eq!(threshold, Threshold::new(ThresholdType::Value, Comparison::GreaterThan, 100.0));
        assert!(threshold.applies_to("anything"));
    }
}
