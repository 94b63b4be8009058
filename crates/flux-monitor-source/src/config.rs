use crate::error::SourceError;
use config::{Config, Environment, File, FileFormat};
use flux_monitor_alert::Threshold;
use flux_monitor_core::OperatorType;
use flux_monitor_filter::LoaderConfig;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// 环境变量覆盖前缀，例如 `FLUX_MONITOR__DOMAIN_ID=D1`
pub const ENV_PREFIX: &str = "FLUX_MONITOR";

/// 应用配置中保存凭据的属性名
pub const CREDENTIALS_PROPERTY: &str = "credentials";

/// 监控源配置
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub operator: OperatorKind,

    #[serde(default)]
    pub domain_id: String,

    /// 静态过滤文档：文件路径或内联文档
    #[serde(default)]
    pub filter_document: Option<String>,

    #[serde(default = "default_filter_document")]
    pub default_filter_document: Option<String>,

    /// 动态应用配置名，属性 `filterDocument` 从中读取
    #[serde(default)]
    pub application_configuration: Option<String>,

    /// 应用配置文件（TOML 或 JSON），每次轮询时重新读取
    #[serde(default)]
    pub application_configuration_file: Option<PathBuf>,

    #[serde(default = "default_base_dir")]
    pub base_dir: PathBuf,

    #[serde(default = "default_reload_interval_ms")]
    pub reload_interval_ms: u64,

    #[serde(default)]
    pub credentials: Credentials,

    #[serde(default)]
    pub thresholds: Vec<Threshold>,

    /// 重放文件（JSON Lines 格式的域事件）
    #[serde(default)]
    pub replay_file: Option<PathBuf>,
}

fn default_filter_document() -> Option<String> {
    Some("{}".to_string())
}

fn default_base_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_reload_interval_ms() -> u64 {
    5000
}

impl SourceConfig {
    pub fn new(operator: OperatorKind, domain_id: impl Into<String>) -> Self {
        Self {
            operator,
            domain_id: domain_id.into(),
            filter_document: None,
            default_filter_document: default_filter_document(),
            application_configuration: None,
            application_configuration_file: None,
            base_dir: default_base_dir(),
            reload_interval_ms: default_reload_interval_ms(),
            credentials: Credentials::default(),
            thresholds: Vec::new(),
            replay_file: None,
        }
    }

    /// 从 TOML 文件加载，并叠加环境变量覆盖
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, SourceError> {
        let path = path.as_ref();
        let name = path
            .to_str()
            .ok_or_else(|| SourceError::Configuration("Invalid config path".to_string()))?;

        let config = Config::builder()
            .add_source(File::new(name, FileFormat::Toml))
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()
            .map_err(|e| SourceError::Configuration(e.to_string()))?;

        Self::from_config(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, SourceError> {
        let config = Config::builder()
            .add_source(File::from_str(content, FileFormat::Toml))
            .build()
            .map_err(|e| SourceError::Configuration(e.to_string()))?;

        Self::from_config(config)
    }

    fn from_config(config: Config) -> Result<Self, SourceError> {
        let parsed: SourceConfig = config
            .try_deserialize()
            .map_err(|e| SourceError::Configuration(e.to_string()))?;
        parsed.validate()?;
        Ok(parsed)
    }

    pub fn validate(&self) -> Result<(), SourceError> {
        if self.operator.requires_filters() && self.domain_id.trim().is_empty() {
            return Err(SourceError::Configuration(format!(
                "domain_id is required for {} sources",
                self.operator.operator_type()
            )));
        }
        if self.reload_interval_ms == 0 {
            return Err(SourceError::Configuration(
                "reload_interval_ms must be greater than 0".to_string(),
            ));
        }
        if !self.thresholds.is_empty() && self.operator.operator_type() != OperatorType::Metrics {
            return Err(SourceError::Configuration(
                "thresholds are only supported by metrics sources".to_string(),
            ));
        }
        Ok(())
    }

    pub fn operator_type(&self) -> OperatorType {
        self.operator.operator_type()
    }

    pub fn reload_interval(&self) -> Duration {
        Duration::from_millis(self.reload_interval_ms)
    }

    pub fn loader_config(&self) -> LoaderConfig {
        LoaderConfig {
            operator_type: self.operator_type(),
            filter_document: self.filter_document.clone(),
            default_filter_document: self.default_filter_document.clone(),
            base_dir: self.base_dir.clone(),
            application_configuration: self.application_configuration.clone(),
        }
    }
}

/// 源类型及其专属选项
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum OperatorKind {
    JobStatus,
    Log,
    Metrics(MetricsOptions),
    ConnectionNotification,
}

impl OperatorKind {
    pub fn operator_type(&self) -> OperatorType {
        match self {
            OperatorKind::JobStatus => OperatorType::JobStatus,
            OperatorKind::Log => OperatorType::Log,
            OperatorKind::Metrics(_) => OperatorType::Metrics,
            OperatorKind::ConnectionNotification => OperatorType::ConnectionNotification,
        }
    }

    /// 日志源不加载过滤文档，也不校验域
    pub fn requires_filters(&self) -> bool {
        self.operator_type().is_domain_scoped()
    }

    pub fn scan_period(&self) -> Option<Duration> {
        match self {
            OperatorKind::Metrics(options) => Some(Duration::from_millis(options.scan_period_ms)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MetricsOptions {
    #[serde(default = "default_scan_period_ms")]
    pub scan_period_ms: u64,
}

fn default_scan_period_ms() -> u64 {
    5000
}

impl Default for MetricsOptions {
    fn default() -> Self {
        Self {
            scan_period_ms: default_scan_period_ms(),
        }
    }
}

/// 连接凭据，内容对监控源不透明
#[derive(Clone, Default, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// JSON 形式的凭据
    #[serde(default)]
    pub credentials: Option<String>,
}

impl Credentials {
    /// 三项都未设置
    pub fn is_empty(&self) -> bool {
        self.user.is_none() && self.password.is_none() && self.credentials.is_none()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("credentials", &self.credentials.as_ref().map(|_| "***"))
            .finish()
    }
}
