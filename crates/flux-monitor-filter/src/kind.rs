use flux_monitor_core::OperatorType;
use std::fmt;
use std::str::FromStr;

/// 过滤实体类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    Domain,
    Instance,
    Job,
    Resource,
    Pe,
    Operator,
    Metric,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Domain => "domain",
            EntityKind::Instance => "instance",
            EntityKind::Job => "job",
            EntityKind::Resource => "resource",
            EntityKind::Pe => "pe",
            EntityKind::Operator => "operator",
            EntityKind::Metric => "metric",
        }
    }

    /// 该实体类型是否适用于给定的源类型
    pub fn is_supported_by(&self, operator_type: OperatorType) -> bool {
        match operator_type {
            OperatorType::Metrics => true,
            OperatorType::JobStatus | OperatorType::Log => matches!(
                self,
                EntityKind::Domain
                    | EntityKind::Instance
                    | EntityKind::Job
                    | EntityKind::Resource
                    | EntityKind::Pe
            ),
            OperatorType::ConnectionNotification => {
                matches!(self, EntityKind::Domain | EntityKind::Instance)
            }
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "domain" => Ok(EntityKind::Domain),
            "instance" => Ok(EntityKind::Instance),
            "job" => Ok(EntityKind::Job),
            "resource" => Ok(EntityKind::Resource),
            "pe" => Ok(EntityKind::Pe),
            "operator" => Ok(EntityKind::Operator),
            "metric" => Ok(EntityKind::Metric),
            _ => Err(()),
        }
    }
}
