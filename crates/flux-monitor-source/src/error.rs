use flux_monitor_filter::FilterError;
use thiserror::Error;

/// 监控源错误；除 InvalidState 外在初始化阶段均为致命错误
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Filter error: {0}")]
    Filter(FilterError),

    #[error("The {domain_id} domain does not match the specified filter criteria in {document}")]
    DomainMismatch { domain_id: String, document: String },

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Scanner error: {0}")]
    Scanner(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl From<FilterError> for SourceError {
    fn from(err: FilterError) -> Self {
        match err {
            FilterError::Configuration(msg) => SourceError::Configuration(msg),
            other => SourceError::Filter(other),
        }
    }
}

/// 释放扫描器或连接时的错误；只记录，不向上传播
#[derive(Debug, Error)]
pub enum TeardownError {
    #[error("Failed to release subscription {id}: {reason}")]
    Unsubscribe { id: u64, reason: String },

    #[error("Event forwarder did not stop in time")]
    Timeout,

    #[error("Event forwarder failed: {0}")]
    Forwarder(String),

    #[error("Failed to disconnect: {0}")]
    Disconnect(String),
}
