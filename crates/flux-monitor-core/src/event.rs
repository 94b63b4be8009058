use crate::observation::Observation;
use crate::operator::OperatorType;
use crate::record::Record;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 域内事件（由连接子系统异步推送）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DomainEvent {
    JobStatus(JobStatusNotification),
    Log(LogRecord),
    Metric(Observation),
    Connection(ConnectionNotification),
}

impl DomainEvent {
    /// 事件所属的源类型；连接通知不属于任何源
    pub fn operator_type(&self) -> Option<OperatorType> {
        match self {
            DomainEvent::JobStatus(_) => Some(OperatorType::JobStatus),
            DomainEvent::Log(_) => Some(OperatorType::Log),
            DomainEvent::Metric(_) => Some(OperatorType::Metrics),
            DomainEvent::Connection(_) => None,
        }
    }

    pub fn to_record(&self) -> Record {
        match self {
            DomainEvent::JobStatus(e) => Record::from_serialize(e),
            DomainEvent::Log(e) => Record::from_serialize(e),
            DomainEvent::Metric(e) => Record::from_serialize(e),
            DomainEvent::Connection(e) => Record::from_serialize(e),
        }
    }
}

/// 事件所涉及的实体标识，用于过滤
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityPath<'a> {
    pub instance: Option<&'a str>,
    pub job: Option<&'a str>,
    pub resource: Option<&'a str>,
    pub pe: Option<String>,
    pub operator: Option<&'a str>,
    pub metric: Option<&'a str>,
}

/// 作业状态通知
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusNotification {
    pub notify_type: String,
    pub domain_id: String,
    pub instance_id: String,
    pub job_id: String,
    pub job_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pe_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pe_health: Option<String>,
    #[serde(default)]
    pub sequence: i64,
    #[serde(default)]
    pub event_timestamp: i64,
}

impl JobStatusNotification {
    pub fn entity_path(&self) -> EntityPath<'_> {
        EntityPath {
            instance: Some(&self.instance_id),
            job: Some(&self.job_name),
            resource: self.resource.as_deref(),
            pe: self.pe_id.map(|id| id.to_string()),
            ..Default::default()
        }
    }
}

/// 日志记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogRecord {
    pub instance_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pe_id: Option<i64>,
    pub log_level: String,
    pub message: String,
    #[serde(default)]
    pub timestamp: i64,
}

/// 连接通知类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionNotificationType {
    #[serde(rename = "jmx.remote.connection.opened")]
    Opened,
    #[serde(rename = "jmx.remote.connection.closed")]
    Closed,
    #[serde(rename = "jmx.remote.connection.failed")]
    Failed,
    #[serde(rename = "jmx.remote.connection.notifs.lost")]
    NotificationsLost,
}

impl ConnectionNotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionNotificationType::Opened => "jmx.remote.connection.opened",
            ConnectionNotificationType::Closed => "jmx.remote.connection.closed",
            ConnectionNotificationType::Failed => "jmx.remote.connection.failed",
            ConnectionNotificationType::NotificationsLost => "jmx.remote.connection.notifs.lost",
        }
    }

    /// 连接已关闭或失败，需要重连
    pub fn is_connection_loss(&self) -> bool {
        matches!(
            self,
            ConnectionNotificationType::Closed | ConnectionNotificationType::Failed
        )
    }
}

impl fmt::Display for ConnectionNotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 连接通知
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionNotification {
    pub notify_type: ConnectionNotificationType,
    pub source: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub sequence: i64,
    #[serde(default)]
    pub timestamp: i64,
}

impl ConnectionNotification {
    pub fn new(notify_type: ConnectionNotificationType, source: impl Into<String>) -> Self {
        Self {
            notify_type,
            source: source.into(),
            message: String::new(),
            sequence: 0,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }
}
