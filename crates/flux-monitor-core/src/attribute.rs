use serde::{Deserialize, Serialize};
use std::fmt;

/// 指标属性（固定枚举集合，顺序即告警信息中的输出顺序）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MetricAttribute {
    DomainId,
    InstanceId,
    JobId,
    JobName,
    Resource,
    PeId,
    OperatorName,
    Channel,
    PortIndex,
    ConnectionId,
    MetricType,
    MetricKind,
    MetricName,
    MetricValue,
    LastTimeRetrieved,
}

impl MetricAttribute {
    pub const ALL: [MetricAttribute; 15] = [
        MetricAttribute::DomainId,
        MetricAttribute::InstanceId,
        MetricAttribute::JobId,
        MetricAttribute::JobName,
        MetricAttribute::Resource,
        MetricAttribute::PeId,
        MetricAttribute::OperatorName,
        MetricAttribute::Channel,
        MetricAttribute::PortIndex,
        MetricAttribute::ConnectionId,
        MetricAttribute::MetricType,
        MetricAttribute::MetricKind,
        MetricAttribute::MetricName,
        MetricAttribute::MetricValue,
        MetricAttribute::LastTimeRetrieved,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            MetricAttribute::DomainId => "domainId",
            MetricAttribute::InstanceId => "instanceId",
            MetricAttribute::JobId => "jobId",
            MetricAttribute::JobName => "jobName",
            MetricAttribute::Resource => "resource",
            MetricAttribute::PeId => "peId",
            MetricAttribute::OperatorName => "operatorName",
            MetricAttribute::Channel => "channel",
            MetricAttribute::PortIndex => "portIndex",
            MetricAttribute::ConnectionId => "connectionId",
            MetricAttribute::MetricType => "metricType",
            MetricAttribute::MetricKind => "metricKind",
            MetricAttribute::MetricName => "metricName",
            MetricAttribute::MetricValue => "metricValue",
            MetricAttribute::LastTimeRetrieved => "lastTimeRetrieved",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|a| a.name() == name)
    }
}

impl fmt::Display for MetricAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 属性值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl AttributeValue {
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            AttributeValue::Int(v) => serde_json::Value::from(*v),
            AttributeValue::Float(v) => serde_json::Value::from(*v),
            AttributeValue::Text(v) => serde_json::Value::from(v.as_str()),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::Text(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Int(v) => write!(f, "{}", v),
            AttributeValue::Float(v) => f.write_str(&format_decimal(*v)),
            AttributeValue::Text(v) => f.write_str(v),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(v: &str) -> Self {
        AttributeValue::Text(v.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(v: String) -> Self {
        AttributeValue::Text(v)
    }
}

impl From<i64> for AttributeValue {
    fn from(v: i64) -> Self {
        AttributeValue::Int(v)
    }
}

impl From<f64> for AttributeValue {
    fn from(v: f64) -> Self {
        AttributeValue::Float(v)
    }
}

/// 浮点数格式化：整数值保留一位小数（100 -> "100.0"）
pub fn format_decimal(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{:.1}", value)
    } else {
        format!("{}", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_names_round_trip() {
        for attr in MetricAttribute::ALL {
            assert_eq!(MetricAttribute::from_name(attr.name()), Some(attr));
        }
        assert_eq!(MetricAttribute::from_name("unknown"), None);
    }

    #[test]
    fn test_format_decimal() {
        assert_eq!(format_decimal(100.0), "100.0");
        assert_eq!(format_decimal(2.5), "2.5");
        assert_eq!(format_decimal(-3.0), "-3.0");
        assert_eq!(format_decimal(f64::NAN), "NaN");
    }

    #[test]
    fn test_attribute_value_display() {
        assert_eq!(AttributeValue::from("job_1").to_string(), "job_1");
        assert_eq!(AttributeValue::from(7i64).to_string(), "7");
        assert_eq!(AttributeValue::from(7.0).to_string(), "7.0");
    }
}
