//! Tool Pattern - 도구 이름 패턴 매칭
//!
//! 권한 규칙과 레지스트리 필터가 같은 매칭 규칙을 공유합니다.
//!
//! - `read`: 정확한 이름
//! - `fetch_*`: glob
//! - `re:^mcp_.*$`: 정규식

use crate::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// 정규식 패턴 prefix
pub const REGEX_PREFIX: &str = "re:";

/// 패턴 구체성 (높을수록 우선)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Specificity {
    Regex = 1,
    Glob = 2,
    Exact = 3,
}

/// 도구 이름 패턴
#[derive(Debug, Clone)]
pub enum ToolPattern {
    Exact(String),
    Glob(glob::Pattern),
    Regex(regex::Regex),
}

impl ToolPattern {
    /// 문자열에서 패턴 파싱
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(Error::Config("empty tool pattern".to_string()));
        }

        if let Some(expr) = raw.strip_prefix(REGEX_PREFIX) {
            let re = regex::Regex::new(expr)
                .map_err(|e| Error::Config(format!("invalid regex pattern '{}': {}", raw, e)))?;
            return Ok(Self::Regex(re));
        }

        if raw.contains(|c: char| matches!(c, '*' | '?' | '[')) {
            let pattern = glob::Pattern::new(raw)
                .map_err(|e| Error::Config(format!("invalid glob pattern '{}': {}", raw, e)))?;
            return Ok(Self::Glob(pattern));
        }

        Ok(Self::Exact(raw.to_string()))
    }

    pub fn exact(name: impl Into<String>) -> Self {
        Self::Exact(name.into())
    }

    pub fn specificity(&self) -> Specificity {
        match self {
            Self::Exact(_) => Specificity::Exact,
            Self::Glob(_) => Specificity::Glob,
            Self::Regex(_) => Specificity::Regex,
        }
    }

    /// 도구 이름이 패턴과 일치하는지
    pub fn matches(&self, name: &str) -> bool {
        match self {
            Self::Exact(exact) => exact == name,
            Self::Glob(pattern) => pattern.matches(name),
            Self::Regex(re) => re.is_match(name),
        }
    }

    /// 원래 문자열 형태
    pub fn as_str(&self) -> String {
        match self {
            Self::Exact(exact) => exact.clone(),
            Self::Glob(pattern) => pattern.as_str().to_string(),
            Self::Regex(re) => format!("{}{}", REGEX_PREFIX, re.as_str()),
        }
    }
}

impl PartialEq for ToolPattern {
    fn eq(&self, other: &Self) -> bool {
        self.specificity() == other.specificity() && self.as_str() == other.as_str()
    }
}

impl Eq for ToolPattern {}

impl fmt::Display for ToolPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ToolPattern {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for ToolPattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.as_str())
    }
}

impl<'de> Deserialize<'de> for ToolPattern {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// 패턴 목록 중 하나라도 일치하는지
pub fn any_matches(patterns: &[ToolPattern], name: &str) -> bool {
    patterns.iter().any(|p| p.matches(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_forms() {
        assert_eq!(ToolPattern::parse("read").unwrap().specificity(), Specificity::Exact);
        assert_eq!(ToolPattern::parse("bash*").unwrap().specificity(), Specificity::Glob);
        assert_eq!(
            ToolPattern::parse("re:^mcp_.*$").unwrap().specificity(),
            Specificity::Regex
        );
    }

    #[test]
    fn test_glob_prefix_matching() {
        let pattern = ToolPattern::parse("fetch_*").unwrap();
        assert!(pattern.matches("fetch_get"));
        assert!(pattern.matches("fetch_post"));
        assert!(!pattern.matches("fetches_get"));
    }

    #[test]
    fn test_regex_matching() {
        let pattern = ToolPattern::parse("re:^github_(list|get)_.*$").unwrap();
        assert!(pattern.matches("github_list_issues"));
        assert!(pattern.matches("github_get_pr"));
        assert!(!pattern.matches("github_create_issue"));
    }

    #[test]
    fn test_exact_is_not_prefix() {
        let pattern = ToolPattern::parse("bash").unwrap();
        assert!(pattern.matches("bash"));
        assert!(!pattern.matches("bash_exec"));
    }

    #[test]
    fn test_invalid_patterns() {
        assert!(ToolPattern::parse("").is_err());
        assert!(ToolPattern::parse("re:(unclosed").is_err());
    }

    #[test]
    fn test_serde_round_trip_keeps_form() {
        let pattern: ToolPattern = serde_json::from_str("\"re:^a.*$\"").unwrap();
        assert_eq!(pattern.specificity(), Specificity::Regex);
        assert_eq!(serde_json::to_string(&pattern).unwrap(), "\"re:^a.*$\"");
    }
}
