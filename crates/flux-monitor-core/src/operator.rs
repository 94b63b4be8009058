use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 监控源类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OperatorType {
    JobStatus,
    Log,
    Metrics,
    ConnectionNotification,
}

impl OperatorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperatorType::JobStatus => "job-status",
            OperatorType::Log => "log",
            OperatorType::Metrics => "metrics",
            OperatorType::ConnectionNotification => "connection-notification",
        }
    }

    /// 日志源不按域过滤
    pub fn is_domain_scoped(&self) -> bool {
        !matches!(self, OperatorType::Log)
    }
}

impl fmt::Display for OperatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperatorType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "job-status" => Ok(OperatorType::JobStatus),
            "log" => Ok(OperatorType::Log),
            "metrics" => Ok(OperatorType::Metrics),
            "connection-notification" => Ok(OperatorType::ConnectionNotification),
            other => Err(format!("unknown operator type: {}", other)),
        }
    }
}
