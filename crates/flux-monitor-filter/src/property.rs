use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::RwLock;
use tracing::debug;

/// 外部动态配置源（应用配置）
#[async_trait]
pub trait PropertySource: Send + Sync {
    /// 读取指定应用配置下的全部属性；配置不存在时返回空集合
    async fn properties(&self, name: &str) -> Result<HashMap<String, String>>;

    async fn property(&self, name: &str, key: &str) -> Result<Option<String>> {
        Ok(self.properties(name).await?.remove(key))
    }
}

/// 内存配置源
#[derive(Default)]
pub struct MemoryPropertySource {
    sets: RwLock<HashMap<String, HashMap<String, String>>>,
}

impl MemoryPropertySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set(&self, name: &str, key: &str, value: impl Into<String>) {
        let mut sets = self.sets.write().await;
        sets.entry(name.to_string())
            .or_default()
            .insert(key.to_string(), value.into());
    }

    pub async fn remove(&self, name: &str, key: &str) {
        let mut sets = self.sets.write().await;
        if let Some(props) = sets.get_mut(name) {
            props.remove(key);
        }
    }
}

#[async_trait]
impl PropertySource for MemoryPropertySource {
    async fn properties(&self, name: &str) -> Result<HashMap<String, String>> {
        let sets = self.sets.read().await;
        Ok(sets.get(name).cloned().unwrap_or_default())
    }
}

/// 文件配置源：每次读取都重新加载文件（TOML 或 JSON，顶层按应用配置名分表）
pub struct FilePropertySource {
    path: PathBuf,
}

impl FilePropertySource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl PropertySource for FilePropertySource {
    async fn properties(&self, name: &str) -> Result<HashMap<String, String>> {
        if !tokio::fs::try_exists(&self.path).await.unwrap_or(false) {
            debug!("Application configuration file not found: {:?}", self.path);
            return Ok(HashMap::new());
        }

        let content = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read {}", self.path.display()))?;

        let mut sets: HashMap<String, HashMap<String, String>> =
            if self.path.extension().and_then(|s| s.to_str()) == Some("json") {
                serde_json::from_str(&content)
                    .with_context(|| format!("Invalid JSON in {}", self.path.display()))?
            } else {
                toml::from_str(&content)
                    .with_context(|| format!("Invalid TOML in {}", self.path.display()))?
            };

        Ok(sets.remove(name).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_memory_property_source() {
        let source = MemoryPropertySource::new();
        let missing = tokio_test::assert_ok!(source.property("monitor", "filterDocument").await);
        assert_eq!(missing, None);

        source.set("monitor", "filterDocument", "{}").await;
        assert_eq!(
            source.property("monitor", "filterDocument").await.unwrap(),
            Some("{}".to_string())
        );

        source.remove("monitor", "filterDocument").await;
        assert_eq!(source.property("monitor", "filterDocument").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_file_property_source_toml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("appconfig.toml");
        std::fs::write(
            &path,
            r#"
[monitor]
filterDocument = '{"job": ["app::.*"]}'
"#,
        )
        .unwrap();

        let source = FilePropertySource::new(&path);
        let value = source.property("monitor", "filterDocument").await.unwrap();
        assert_eq!(value.as_deref(), Some(r#"{"job": ["app::.*"]}"#));

        assert!(source.properties("other").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_file_property_source_missing_file() {
        let dir = tempdir().unwrap();
        let source = FilePropertySource::new(dir.path().join("missing.json"));
        assert!(source.properties("monitor").await.unwrap().is_empty());
    }
}
