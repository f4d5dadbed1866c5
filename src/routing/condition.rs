//! `has` / `missing` route conditions.
//!
//! # Responsibilities
//! - Describe a header, cookie, host or query requirement
//! - Check the shape invariant (key or value present depending on type)
//! - Resolve the condition against a request
//!
//! # Design Decisions
//! - Unknown condition types deserialize successfully so they can be
//!   reported and dropped during validation instead of failing the whole file
//! - Resolving an unknown type is an error, never a silent mismatch
//! - An empty value counts as absent

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::http::EdgeRequest;

/// Where a condition reads its value from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ConditionKind {
    Header,
    Cookie,
    Host,
    Query,
    Other(String),
}

impl ConditionKind {
    pub fn as_str(&self) -> &str {
        match self {
            ConditionKind::Header => "header",
            ConditionKind::Cookie => "cookie",
            ConditionKind::Host => "host",
            ConditionKind::Query => "query",
            ConditionKind::Other(other) => other.as_str(),
        }
    }
}

impl From<String> for ConditionKind {
    fn from(kind: String) -> Self {
        match kind.as_str() {
            "header" => ConditionKind::Header,
            "cookie" => ConditionKind::Cookie,
            "host" => ConditionKind::Host,
            "query" => ConditionKind::Query,
            _ => ConditionKind::Other(kind),
        }
    }
}

impl From<ConditionKind> for String {
    fn from(kind: ConditionKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for ConditionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single `has` or `missing` clause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteCondition {
    #[serde(rename = "type")]
    pub kind: ConditionKind,

    /// Header, cookie or query parameter name. Unused for `host`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,

    /// Exact value to require. Mandatory for `host`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl RouteCondition {
    fn keyed(kind: ConditionKind, key: impl Into<String>) -> Self {
        Self {
            kind,
            key: Some(key.into()),
            value: None,
        }
    }

    pub fn header(key: impl Into<String>) -> Self {
        Self::keyed(ConditionKind::Header, key)
    }

    pub fn cookie(key: impl Into<String>) -> Self {
        Self::keyed(ConditionKind::Cookie, key)
    }

    pub fn query(key: impl Into<String>) -> Self {
        Self::keyed(ConditionKind::Query, key)
    }

    pub fn host(value: impl Into<String>) -> Self {
        Self {
            kind: ConditionKind::Host,
            key: None,
            value: Some(value.into()),
        }
    }

    /// Require an exact value in addition to presence.
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Check the shape invariant, returning the reason when it does not hold.
    pub fn check(&self) -> std::result::Result<(), String> {
        match self.kind {
            ConditionKind::Header | ConditionKind::Cookie | ConditionKind::Query => {
                if self.key.is_some() {
                    Ok(())
                } else {
                    Err(format!("{} condition requires a string `key`", self.kind))
                }
            }
            ConditionKind::Host => {
                if self.value.is_some() {
                    Ok(())
                } else {
                    Err("host condition requires a string `value`".to_string())
                }
            }
            ConditionKind::Other(ref other) => Err(format!("unsupported condition type `{}`", other)),
        }
    }

    /// Look up the value this condition refers to.
    pub fn resolve<'r>(&self, req: &'r EdgeRequest) -> Result<Option<&'r str>> {
        let key = self.key.as_deref().unwrap_or_default();
        let value = match self.kind {
            ConditionKind::Header => req.header(key),
            ConditionKind::Cookie => req.cookie(key),
            ConditionKind::Host => req.host(),
            ConditionKind::Query => req.query(key),
            ConditionKind::Other(ref other) => {
                return Err(Error::UnresolvableCondition {
                    kind: other.clone(),
                    key: key.to_string(),
                })
            }
        };
        Ok(value.filter(|v| !v.is_empty()))
    }

    /// `has` semantics: value present and, when configured, equal.
    pub fn is_satisfied_by(&self, req: &EdgeRequest) -> Result<bool> {
        let Some(actual) = self.resolve(req)? else {
            return Ok(false);
        };
        Ok(match self.value.as_deref().filter(|v| !v.is_empty()) {
            Some(expected) => actual == expected,
            None => true,
        })
    }

    /// `missing` semantics: value absent or empty.
    pub fn is_absent_from(&self, req: &EdgeRequest) -> Result<bool> {
        Ok(self.resolve(req)?.is_none())
    }
}

impl fmt::Display for RouteCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(key) = &self.key {
            write!(f, ":{}", key)?;
        }
        if let Some(value) = &self.value {
            write!(f, "={}", value)?;
        }
        Ok(())
    }
}
