use flux_monitor_core::OperatorType;
use thiserror::Error;

/// 过滤器错误
#[derive(Debug, Error)]
pub enum FilterError {
    /// 没有任何可解析的过滤文档
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Filter syntax error: {0}")]
    Syntax(String),

    #[error("Filter kind '{kind}' is not supported by {operator_type} sources")]
    UnsupportedKind {
        kind: String,
        operator_type: OperatorType,
    },

    #[error("Invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
