use crate::attribute::{format_decimal, AttributeValue, MetricAttribute};
use crate::event::EntityPath;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 指标观测值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Observation {
    pub metric_name: String,
    pub value: f64,
    /// 采集时间（毫秒）
    pub timestamp: i64,
    #[serde(default, flatten)]
    pub attributes: BTreeMap<MetricAttribute, AttributeValue>,
}

/// 指标序列标识：同一实体上的同名指标
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SeriesKey(String);

impl Observation {
    pub fn new(metric_name: impl Into<String>, value: f64) -> Self {
        Self {
            metric_name: metric_name.into(),
            value,
            timestamp: chrono::Utc::now().timestamp_millis(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_attribute(mut self, attr: MetricAttribute, value: impl Into<AttributeValue>) -> Self {
        self.attributes.insert(attr, value.into());
        self
    }

    /// 读取属性；metricName/metricValue/lastTimeRetrieved 取自观测值本身
    pub fn attribute(&self, attr: MetricAttribute) -> Option<AttributeValue> {
        match attr {
            MetricAttribute::MetricName => Some(AttributeValue::Text(self.metric_name.clone())),
            MetricAttribute::MetricValue => Some(AttributeValue::Float(self.value)),
            MetricAttribute::LastTimeRetrieved => Some(AttributeValue::Int(self.timestamp)),
            other => self.attributes.get(&other).cloned(),
        }
    }

    pub fn text(&self, attr: MetricAttribute) -> Option<&str> {
        self.attributes.get(&attr).and_then(|v| v.as_str())
    }

    pub fn series_key(&self) -> SeriesKey {
        let mut parts: Vec<String> = self
            .attributes
            .iter()
            .filter(|(attr, _)| {
                !matches!(
                    attr,
                    MetricAttribute::MetricValue | MetricAttribute::LastTimeRetrieved
                )
            })
            .map(|(attr, value)| format!("{}={}", attr, value))
            .collect();
        parts.push(format!("metricName={}", self.metric_name));
        SeriesKey(parts.join(","))
    }

    pub fn value_text(&self) -> String {
        format_decimal(self.value)
    }

    pub fn entity_path(&self) -> EntityPath<'_> {
        EntityPath {
            instance: self.text(MetricAttribute::InstanceId),
            job: self.text(MetricAttribute::JobName),
            resource: self.text(MetricAttribute::Resource),
            pe: self
                .attributes
                .get(&MetricAttribute::PeId)
                .map(|id| id.to_string()),
            operator: self.text(MetricAttribute::OperatorName),
            metric: Some(&self.metric_name),
        }
    }
}
