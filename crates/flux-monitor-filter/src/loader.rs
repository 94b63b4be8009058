use crate::document::FilterDocument;
use crate::error::FilterError;
use crate::filter_set::FilterSet;
use crate::property::PropertySource;
use flux_monitor_core::OperatorType;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, info, warn};

/// 应用配置中保存过滤文档的属性名
pub const FILTER_DOCUMENT_PROPERTY: &str = "filterDocument";

/// 过滤文档加载配置
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    pub operator_type: OperatorType,
    /// 静态引用：文件路径或内联文档
    pub filter_document: Option<String>,
    /// 未指定 filter_document 时使用
    pub default_filter_document: Option<String>,
    /// 相对路径的解析根目录
    pub base_dir: PathBuf,
    /// 动态应用配置名
    pub application_configuration: Option<String>,
}

impl LoaderConfig {
    pub fn new(operator_type: OperatorType) -> Self {
        Self {
            operator_type,
            filter_document: None,
            default_filter_document: None,
            base_dir: PathBuf::from("."),
            application_configuration: None,
        }
    }
}

/// 过滤文档加载器
///
/// 优先使用应用配置中的 `filterDocument` 属性；否则使用静态引用，
/// 静态引用缺省时使用默认引用。静态引用指向存在的文件时读取文件内容，
/// 否则把引用字符串本身当作内联文档。
pub struct FilterLoader {
    config: LoaderConfig,
    properties: Option<Arc<dyn PropertySource>>,
}

impl FilterLoader {
    pub fn new(config: LoaderConfig) -> Self {
        Self {
            config,
            properties: None,
        }
    }

    pub fn with_property_source(mut self, source: Arc<dyn PropertySource>) -> Self {
        self.properties = Some(source);
        self
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    pub fn operator_type(&self) -> OperatorType {
        self.config.operator_type
    }

    /// 是否配置了动态来源
    pub fn tracks_dynamic_source(&self) -> bool {
        self.config.application_configuration.is_some() && self.properties.is_some()
    }

    /// 读取动态配置中的原始文档；未配置或属性不存在时返回 None
    pub async fn fetch_dynamic(&self) -> anyhow::Result<Option<String>> {
        self.fetch_property(FILTER_DOCUMENT_PROPERTY).await
    }

    /// 读取应用配置中的任意属性
    pub async fn fetch_property(&self, key: &str) -> anyhow::Result<Option<String>> {
        let (Some(name), Some(source)) = (&self.config.application_configuration, &self.properties)
        else {
            return Ok(None);
        };

        source.property(name, key).await
    }

    /// 解析出当前应生效的过滤文档
    pub async fn resolve(&self) -> Result<FilterDocument, FilterError> {
        match self.fetch_dynamic().await {
            Ok(Some(raw)) => {
                debug!("Using filterDocument from application configuration: {}", raw);
                let name = self
                    .config
                    .application_configuration
                    .clone()
                    .unwrap_or_default();
                return Ok(FilterDocument::from_application_configuration(name, raw));
            }
            Ok(None) => {}
            Err(e) => {
                warn!(error = %e, "Application configuration unavailable, using static filter document");
            }
        }

        self.resolve_static().await
    }

    /// 解析静态引用（文件或内联文本）
    pub async fn resolve_static(&self) -> Result<FilterDocument, FilterError> {
        let reference = match non_empty(&self.config.filter_document) {
            Some(reference) => {
                debug!("filterDocument is not in application configuration: {}", reference);
                reference
            }
            None => {
                let reference = non_empty(&self.config.default_filter_document).ok_or_else(|| {
                    FilterError::Configuration(
                        "no filter document specified and no default available".to_string(),
                    )
                })?;
                info!("filterDocument is not specified, use default: {}", reference);
                reference
            }
        };

        match existing_file(&self.config.base_dir, reference).await {
            Some(path) => {
                let content = fs::read_to_string(&path).await.map_err(|e| {
                    FilterError::Configuration(format!(
                        "filter document {} is unreadable: {}",
                        path.display(),
                        e
                    ))
                })?;
                Ok(FilterDocument::from_file(path, content))
            }
            None => {
                debug!("filterDocument is not a file");
                Ok(FilterDocument::inline(reference))
            }
        }
    }

    /// 解析并构造过滤集合
    pub async fn load(&self) -> Result<(FilterDocument, FilterSet), FilterError> {
        let document = self.resolve().await?;
        let filters = document.parse(self.config.operator_type)?;
        info!(origin = %document.origin(), "Filter document loaded");
        Ok((document, filters))
    }
}

/// 逐字节比较；没有先前值时视为已变更
pub fn has_changed(previous: Option<&str>, current: &str) -> bool {
    match previous {
        Some(previous) => previous != current,
        None => true,
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

/// 相对路径基于 base_dir 解析，规范化后确认是已存在的文件
async fn existing_file(base_dir: &Path, reference: &str) -> Option<PathBuf> {
    let candidate = Path::new(reference);
    let absolute = if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        base_dir.join(candidate)
    };

    let canonical = fs::canonicalize(&absolute).await.ok()?;
    let metadata = fs::metadata(&canonical).await.ok()?;
    metadata.is_file().then_some(canonical)
}
