use crate::error::FilterError;
use crate::filter_set::FilterSet;
use flux_monitor_core::OperatorType;
use std::fmt;
use std::path::PathBuf;

/// 过滤文档来源
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentOrigin {
    /// 静态配置引用指向的文件
    File(PathBuf),
    /// 静态配置引用本身即文档内容
    Inline,
    /// 外部应用配置中的属性（可动态变化）
    ApplicationConfiguration(String),
}

impl fmt::Display for DocumentOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentOrigin::File(path) => write!(f, "file {}", path.display()),
            DocumentOrigin::Inline => f.write_str("inline document"),
            DocumentOrigin::ApplicationConfiguration(name) => {
                write!(f, "application configuration {}", name)
            }
        }
    }
}

/// 已解析出的过滤文档；每次加载整体替换，不做原地修改
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterDocument {
    origin: DocumentOrigin,
    raw: String,
    content: String,
}

impl FilterDocument {
    pub fn from_file(path: PathBuf, content: String) -> Self {
        Self {
            origin: DocumentOrigin::File(path),
            raw: content.clone(),
            content,
        }
    }

    pub fn inline(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        Self {
            origin: DocumentOrigin::Inline,
            content: normalize_inline(&raw),
            raw,
        }
    }

    pub fn from_application_configuration(name: impl Into<String>, raw: impl Into<String>) -> Self {
        let raw = raw.into();
        Self {
            origin: DocumentOrigin::ApplicationConfiguration(name.into()),
            content: normalize_inline(&raw),
            raw,
        }
    }

    pub fn origin(&self) -> &DocumentOrigin {
        &self.origin
    }

    /// 原始内容（未做规范化）
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// 交给解析器的内容
    pub fn content(&self) -> &str {
        &self.content
    }

    /// 仅动态配置来源参与变更检测
    pub fn is_dynamic(&self) -> bool {
        matches!(self.origin, DocumentOrigin::ApplicationConfiguration(_))
    }

    pub fn parse(&self, operator_type: OperatorType) -> Result<FilterSet, FilterError> {
        FilterSet::parse(&self.content, operator_type)
    }
}

/// 去掉传输中带入的字面 `\t` 转义序列
pub fn normalize_inline(raw: &str) -> String {
    raw.replace("\\t", "")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_escaped_tabs() {
        assert_eq!(normalize_inline(r#"{\t"job":\t[".*"]}"#), r#"{"job":[".*"]}"#);
        // 真正的制表符保留
        assert_eq!(normalize_inline("{\t}"), "{\t}");
    }

    #[test]
    fn test_inline_document_keeps_raw() {
        let doc = FilterDocument::from_application_configuration("monitor", r#"{\t"job": []}"#);
        assert_eq!(doc.raw(), r#"{\t"job": []}"#);
        assert_eq!(doc.content(), r#"{"job": []}"#);
        assert!(doc.is_dynamic());
        assert!(doc.parse(OperatorType::JobStatus).is_ok());
    }

    #[test]
    fn test_file_document_is_not_dynamic() {
        let doc = FilterDocument::from_file(PathBuf::from("/etc/filters.json"), "{}".to_string());
        assert!(!doc.is_dynamic());
        assert_eq!(doc.origin().to_string(), "file /etc/filters.json");
    }
}
