use crate::threshold::{Threshold, ThresholdType};
use flux_monitor_core::attribute::format_decimal;
use flux_monitor_core::{AttributeValue, MetricAttribute, Observation, OutputPort, Record};
use std::fmt;

/// 主输出记录中的消息字段
pub const MESSAGE_FIELD: &str = "message";
pub const CURRENT_VALUE_FIELD: &str = "currentValue";
pub const THRESHOLD_VALUE_FIELD: &str = "thresholdValue";

/// 结构化告警信息
#[derive(Debug, Clone, PartialEq)]
pub struct AlertMessage {
    pub threshold_type: ThresholdType,
    pub metric_name: String,
    pub operator: String,
    pub threshold_value: f64,
    pub current_value: f64,
    /// 时间窗口（秒）
    pub time_frame_secs: Option<u64>,
    pub attributes: Vec<(MetricAttribute, AttributeValue)>,
}

impl fmt::Display for AlertMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = self.threshold_type.as_str();
        let unit = self.threshold_type.unit();

        writeln!(f, "{} of {} reached!", kind, self.metric_name)?;
        write!(
            f,
            "You specified a {} of {}{}{}",
            kind,
            self.operator,
            format_decimal(self.threshold_value),
            unit
        )?;
        if let Some(secs) = self.time_frame_secs {
            write!(f, " in the past {}s", secs)?;
        }
        writeln!(
            f,
            ". The current {} is {}{}. ",
            kind,
            format_decimal(self.current_value),
            unit
        )?;

        let info = self
            .attributes
            .iter()
            .map(|(attr, value)| format!("{}={}", attr, value))
            .collect::<Vec<_>>();
        if info.is_empty() {
            write!(f, "Metrics Information: [ ]")
        } else {
            write!(f, "Metrics Information: [ {} ]", info.join(", "))
        }
    }
}

/// 告警：由观测值、当前值和命中的阈值派生，只在组装和发送期间存在
#[derive(Debug, Clone)]
pub struct Alert {
    pub message: String,
    pub current_value: f64,
    pub threshold_value: f64,
    pub threshold: Threshold,
    pub observation: Observation,
}

/// 一次告警对应的输出记录
#[derive(Debug, Clone, PartialEq)]
pub struct AlertRecord {
    pub primary: Record,
    pub secondary: Option<Record>,
}

impl Alert {
    /// 主记录：仅包含告警信息
    pub fn primary_record(&self) -> Record {
        Record::single(MESSAGE_FIELD, self.message.clone())
    }

    /// 次记录：当前值、阈值以及端口声明过的观测属性
    pub fn secondary_record(&self, port: &dyn OutputPort) -> Record {
        let mut record = Record::new();
        record.set(CURRENT_VALUE_FIELD, self.current_value);
        record.set(THRESHOLD_VALUE_FIELD, self.threshold_value);

        for attr in MetricAttribute::ALL {
            if !port.accepts_field(attr.name()) {
                continue;
            }
            if let Some(value) = self.observation.attribute(attr) {
                record.set(attr.name(), value.to_json());
            }
        }

        record
    }

    pub fn to_records(&self, secondary: Option<&dyn OutputPort>) -> AlertRecord {
        AlertRecord {
            primary: self.primary_record(),
            secondary: secondary.map(|port| self.secondary_record(port)),
        }
    }
}

/// 告警组装器
#[derive(Debug, Clone, Copy, Default)]
pub struct AlertComposer;

impl AlertComposer {
    pub fn new() -> Self {
        Self
    }

    pub fn message(
        &self,
        observation: &Observation,
        current_value: f64,
        threshold: &Threshold,
    ) -> AlertMessage {
        let attributes = MetricAttribute::ALL
            .iter()
            .filter_map(|attr| observation.attribute(*attr).map(|v| (*attr, v)))
            .collect();

        AlertMessage {
            threshold_type: threshold.kind,
            metric_name: observation.metric_name.clone(),
            operator: threshold.operator.symbol().to_string(),
            threshold_value: threshold.value,
            current_value,
            time_frame_secs: threshold.time_frame.map(|millis| millis / 1000),
            attributes,
        }
    }

    pub fn compose(&self, observation: &Observation, current_value: f64, threshold: &Threshold) -> Alert {
        let message = self.message(observation, current_value, threshold).to_string();

        Alert {
            message,
            current_value,
            threshold_value: threshold.value,
            threshold: threshold.clone(),
            observation: observation.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::threshold::Comparison;
    use flux_monitor_core::ChannelPort;

    fn cpu(value: f64) -> Observation {
        Observation::new("cpu", value)
            .with_timestamp(1_700_000_000_000)
            .with_attribute(MetricAttribute::JobName, "app::Main")
            .with_attribute(MetricAttribute::PeId, 4i64)
    }

    #[test]
    fn test_value_alert_message() {
        let threshold = Threshold::new(ThresholdType::Value, Comparison::GreaterThan, 100.0);
        let alert = AlertComposer::new().compose(&cpu(150.0), 150.0, &threshold);

        assert!(alert.message.starts_with(
            "value of cpu reached!\nYou specified a value of >100.0. The current value is 150.0. \n"
        ));
        assert_eq!(alert.current_value, 150.0);
        assert_eq!(alert.threshold_value, 100.0);
    }

    #[test]
    fn test_time_frame_clause() {
        let threshold =
            Threshold::new(ThresholdType::Value, Comparison::GreaterThan, 100.0).with_time_frame(5000);
        let alert = AlertComposer::new().compose(&cpu(150.0), 150.0, &threshold);

        assert!(alert.message.starts_with(
            "value of cpu reached!\nYou specified a value of >100.0 in the past 5s. The current value is 150.0. \n"
        ));
    }

    #[test]
    fn test_time_frame_uses_integer_seconds() {
        let threshold = Threshold::new(ThresholdType::Rate, Comparison::GreaterThan, 2.0)
            .with_time_frame(2500);
        let alert = AlertComposer::new().compose(&cpu(0.0), 3.5, &threshold);

        assert!(alert
            .message
            .contains("You specified a rate of >2.0/s in the past 2s. The current rate is 3.5/s. \n"));
    }

    #[test]
    fn test_units_in_message() {
        let threshold =
            Threshold::new(ThresholdType::IncreasePercentage, Comparison::GreaterOrEqual, 10.0);
        let alert = AlertComposer::new().compose(&cpu(0.0), 12.5, &threshold);
        assert!(alert.message.starts_with("increase-percentage of cpu reached!\n"));
        assert!(alert.message.contains("of >=10.0%. The current increase-percentage is 12.5%. \n"));
    }

    #[test]
    fn test_metrics_information_suffix() {
        let threshold = Threshold::new(ThresholdType::Value, Comparison::GreaterThan, 100.0);
        let alert = AlertComposer::new().compose(&cpu(150.0), 150.0, &threshold);

        assert!(alert.message.ends_with(
            "Metrics Information: [ jobName=app::Main, peId=4, metricName=cpu, metricValue=150.0, lastTimeRetrieved=1700000000000 ]"
        ));
        assert!(!alert.message.contains(", ]"));
        // 未设置的属性不输出
        assert!(!alert.message.contains("instanceId"));
    }

    #[test]
    fn test_metrics_information_without_attributes() {
        let message = AlertMessage {
            threshold_type: ThresholdType::Value,
            metric_name: "cpu".to_string(),
            operator: ">".to_string(),
            threshold_value: 1.0,
            current_value: 2.0,
            time_frame_secs: None,
            attributes: Vec::new(),
        };
        assert!(message.to_string().ends_with("Metrics Information: [ ]"));
    }

    #[test]
    fn test_alert_records() {
        let threshold = Threshold::new(ThresholdType::Value, Comparison::GreaterThan, 100.0);
        let alert = AlertComposer::new().compose(&cpu(150.0), 150.0, &threshold);

        let (port, _rx) = ChannelPort::new("out1", 1);
        let port = port.with_fields(["currentValue", "thresholdValue", "jobName", "metricName"]);

        let records = alert.to_records(Some(&port));
        assert_eq!(records.primary.len(), 1);
        assert_eq!(records.primary.get_str("message"), Some(alert.message.as_str()));

        let secondary = records.secondary.unwrap();
        assert_eq!(secondary.get_f64("currentValue"), Some(150.0));
        assert_eq!(secondary.get_f64("thresholdValue"), Some(100.0));
        assert_eq!(secondary.get_str("jobName"), Some("app::Main"));
        assert_eq!(secondary.get_str("metricName"), Some("cpu"));
        assert!(!secondary.contains("peId"));

        assert!(alert.to_records(None).secondary.is_none());
    }
}
