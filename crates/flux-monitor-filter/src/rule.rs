use crate::error::FilterError;
use regex::Regex;
use serde::Deserialize;

/// 规则极性
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    Include,
    Exclude,
}

/// 单条匹配规则，模式按整串匹配
#[derive(Debug, Clone)]
pub struct MatchRule {
    polarity: Polarity,
    pattern: String,
    regex: Regex,
}

impl MatchRule {
    pub fn new(polarity: Polarity, pattern: &str) -> Result<Self, FilterError> {
        let regex = Regex::new(&format!("^(?:{})$", pattern)).map_err(|e| {
            FilterError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: e.to_string(),
            }
        })?;

        Ok(Self {
            polarity,
            pattern: pattern.to_string(),
            regex,
        })
    }

    pub fn include(pattern: &str) -> Result<Self, FilterError> {
        Self::new(Polarity::Include, pattern)
    }

    pub fn exclude(pattern: &str) -> Result<Self, FilterError> {
        Self::new(Polarity::Exclude, pattern)
    }

    pub fn polarity(&self) -> Polarity {
        self.polarity
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn is_match(&self, id: &str) -> bool {
        self.regex.is_match(id)
    }
}

/// 文档中的规则写法：`{"include": ".*"}`、`{"exclude": "x"}` 或裸字符串（等同 include）
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum RuleSpec {
    Bare(String),
    Tagged(TaggedRule),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum TaggedRule {
    Include(String),
    Exclude(String),
}

impl RuleSpec {
    pub(crate) fn compile(&self) -> Result<MatchRule, FilterError> {
        match self {
            RuleSpec::Bare(p) | RuleSpec::Tagged(TaggedRule::Include(p)) => MatchRule::include(p),
            RuleSpec::Tagged(TaggedRule::Exclude(p)) => MatchRule::exclude(p),
        }
    }
}
