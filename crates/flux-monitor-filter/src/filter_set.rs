use crate::error::FilterError;
use crate::kind::EntityKind;
use crate::rule::{MatchRule, Polarity, RuleSpec};
use flux_monitor_core::{EntityPath, OperatorType};
use std::collections::BTreeMap;
use tracing::debug;

/// 过滤规则集合
///
/// 每种实体类型对应一个有序规则列表：首条匹配的规则决定结果；
/// 有规则但均不匹配时排除；没有规则时全部接受。
/// 构造要么完整成功，要么失败，不会暴露部分解析的结果。
#[derive(Debug, Clone)]
pub struct FilterSet {
    operator_type: OperatorType,
    rules: BTreeMap<EntityKind, Vec<MatchRule>>,
}

impl FilterSet {
    /// 不含任何规则（接受所有实体）
    pub fn empty(operator_type: OperatorType) -> Self {
        Self {
            operator_type,
            rules: BTreeMap::new(),
        }
    }

    /// 解析过滤文档（JSON 对象或 TOML 表）
    pub fn parse(content: &str, operator_type: OperatorType) -> Result<Self, FilterError> {
        let trimmed = content.trim();
        if trimmed.is_empty() {
            return Err(FilterError::Syntax("empty filter document".to_string()));
        }

        let raw: BTreeMap<String, Vec<RuleSpec>> =
            if trimmed.starts_with('{') || trimmed.starts_with('[') {
                serde_json::from_str(trimmed).map_err(|e| FilterError::Syntax(e.to_string()))?
            } else {
                toml::from_str(trimmed).map_err(|e| FilterError::Syntax(e.to_string()))?
            };

        let mut rules = BTreeMap::new();
        for (name, specs) in raw {
            let kind: EntityKind = name.parse().map_err(|_| FilterError::UnsupportedKind {
                kind: name.clone(),
                operator_type,
            })?;

            if !kind.is_supported_by(operator_type) {
                return Err(FilterError::UnsupportedKind {
                    kind: name,
                    operator_type,
                });
            }

            let compiled = specs
                .iter()
                .map(RuleSpec::compile)
                .collect::<Result<Vec<_>, _>>()?;
            rules.insert(kind, compiled);
        }

        debug!(
            operator_type = %operator_type,
            kinds = rules.len(),
            "Filter set parsed"
        );

        Ok(Self {
            operator_type,
            rules,
        })
    }

    pub fn operator_type(&self) -> OperatorType {
        self.operator_type
    }

    pub fn rules(&self, kind: EntityKind) -> &[MatchRule] {
        self.rules.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.rules.values().all(Vec::is_empty)
    }

    /// 判断某个实体标识是否被接受
    pub fn matches(&self, kind: EntityKind, id: &str) -> bool {
        let rules = self.rules(kind);
        if rules.is_empty() {
            return true;
        }

        match rules.iter().find(|rule| rule.is_match(id)) {
            Some(rule) => rule.polarity() == Polarity::Include,
            None => false,
        }
    }

    pub fn matches_domain_id(&self, domain_id: &str) -> bool {
        self.matches(EntityKind::Domain, domain_id)
    }

    /// 事件涉及的所有实体都被接受时才放行
    pub fn admits(&self, path: &EntityPath<'_>) -> bool {
        let checks = [
            (EntityKind::Instance, path.instance),
            (EntityKind::Job, path.job),
            (EntityKind::Resource, path.resource),
            (EntityKind::Pe, path.pe.as_deref()),
            (EntityKind::Operator, path.operator),
            (EntityKind::Metric, path.metric),
        ];

        checks
            .iter()
            .all(|(kind, id)| id.map_or(true, |id| self.matches(*kind, id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"{
        "domain": [{"include": "StreamsDomain"}],
        "instance": [{"exclude": "test_.*"}, {"include": ".*"}],
        "job": ["app::.*"]
    }"#;

    #[test]
    fn test_parse_and_match() {
        let filters = FilterSet::parse(DOC, OperatorType::JobStatus).unwrap();

        assert!(filters.matches_domain_id("StreamsDomain"));
        assert!(!filters.matches_domain_id("OtherDomain"));

        assert!(filters.matches(EntityKind::Instance, "prod"));
        assert!(!filters.matches(EntityKind::Instance, "test_1"));

        assert!(filters.matches(EntityKind::Job, "app::Main_3"));
        assert!(!filters.matches(EntityKind::Job, "other::Main"));

        // 未配置的类型全部接受
        assert!(filters.matches(EntityKind::Resource, "host-a"));
    }

    #[test]
    fn test_first_match_wins() {
        let filters = FilterSet::parse(
            r#"{"job": [{"include": "a.*"}, {"exclude": "ab"}]}"#,
            OperatorType::JobStatus,
        )
        .unwrap();
        assert!(filters.matches(EntityKind::Job, "ab"));

        let filters = FilterSet::parse(
            r#"{"job": [{"exclude": "ab"}, {"include": "a.*"}]}"#,
            OperatorType::JobStatus,
        )
        .unwrap();
        assert!(!filters.matches(EntityKind::Job, "ab"));
        assert!(filters.matches(EntityKind::Job, "ac"));
    }

    #[test]
    fn test_empty_domain_rules_match_all() {
        let filters = FilterSet::parse(r#"{"job": ["x"]}"#, OperatorType::Metrics).unwrap();
        for domain in ["", "StreamsDomain", "any thing"] {
            assert!(filters.matches_domain_id(domain));
        }

        let filters = FilterSet::parse(r#"{"domain": []}"#, OperatorType::Metrics).unwrap();
        assert!(filters.matches_domain_id("whatever"));
        assert!(filters.is_empty());
    }

    #[test]
    fn test_toml_document() {
        let doc = r#"
domain = ["Streams.*"]
metric = [{ exclude = "nTuples.*" }, ".*"]
"#;
        let filters = FilterSet::parse(doc, OperatorType::Metrics).unwrap();
        assert!(filters.matches_domain_id("StreamsDomain"));
        assert!(!filters.matches(EntityKind::Metric, "nTuplesProcessed"));
        assert!(filters.matches(EntityKind::Metric, "queueSize"));
    }

    #[test]
    fn test_syntax_errors() {
        assert!(matches!(
            FilterSet::parse("{ not json", OperatorType::Metrics),
            Err(FilterError::Syntax(_))
        ));
        assert!(matches!(
            FilterSet::parse("   ", OperatorType::Metrics),
            Err(FilterError::Syntax(_))
        ));
        assert!(matches!(
            FilterSet::parse(r#"{"job": "not-a-list"}"#, OperatorType::Metrics),
            Err(FilterError::Syntax(_))
        ));
    }

    #[test]
    fn test_unsupported_kind() {
        let result = FilterSet::parse(r#"{"metric": [".*"]}"#, OperatorType::Log);
        match result {
            Err(FilterError::UnsupportedKind { kind, operator_type }) => {
                assert_eq!(kind, "metric");
                assert_eq!(operator_type, OperatorType::Log);
            }
            other => panic!("unexpected result: {:?}", other),
        }

        let result = FilterSet::parse(r#"{"galaxy": [".*"]}"#, OperatorType::Metrics);
        assert!(matches!(result, Err(FilterError::UnsupportedKind { .. })));
    }

    #[test]
    fn test_parse_is_idempotent() {
        let a = FilterSet::parse(DOC, OperatorType::JobStatus).unwrap();
        let b = FilterSet::parse(DOC, OperatorType::JobStatus).unwrap();

        for (kind, id) in [
            (EntityKind::Domain, "StreamsDomain"),
            (EntityKind::Domain, "Other"),
            (EntityKind::Instance, "test_9"),
            (EntityKind::Job, "app::X"),
            (EntityKind::Job, "zzz"),
        ] {
            assert_eq!(a.matches(kind, id), b.matches(kind, id));
        }
    }

    #[test]
    fn test_admits_entity_path() {
        let filters = FilterSet::parse(
            r#"{"job": ["app::.*"], "metric": [{"exclude": "queueSize"}, ".*"]}"#,
            OperatorType::Metrics,
        )
        .unwrap();

        let path = EntityPath {
            job: Some("app::Main"),
            metric: Some("nTuplesProcessed"),
            ..Default::default()
        };
        assert!(filters.admits(&path));

        let path = EntityPath {
            job: Some("app::Main"),
            metric: Some("queueSize"),
            ..Default::default()
        };
        assert!(!filters.admits(&path));

        // 缺失的标识不参与判断
        assert!(filters.admits(&EntityPath::default()));
    }
}
