//! Validation tags and comparison.
//!
//! A tag is an opaque quoted string derived from an entity's identity and
//! freshness. Strong tags look like `"user-5-1697198400"`; weak tags carry
//! the `W/` marker in front of the quotes.
//!
//! Tags produced here are always strong. Comparison against tags that came
//! from a client goes through [`normalize`] so either form matches.

pub mod strategy;

pub use strategy::{TagGenerator, TagStrategy, generate};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix marking a weak tag.
pub const WEAK_PREFIX: &str = "W/";

/// An opaque validation tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(transparent)]
pub struct ValidationTag(String);

impl ValidationTag {
    /// Wrap a raw tag string as read from the tag store or a header.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Build a strong tag by quoting `value`.
    pub fn strong(value: impl AsRef<str>) -> Self {
        Self(format!("\"{}\"", value.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }

    pub fn is_weak(&self) -> bool {
        self.0.starts_with(WEAK_PREFIX)
    }

    /// Convert to the weak form. Already-weak tags are returned unchanged.
    pub fn weaken(&self) -> Self {
        if self.is_weak() {
            return self.clone();
        }
        Self(format!("{WEAK_PREFIX}\"{}\"", self.0.trim_matches('"')))
    }
}

impl fmt::Display for ValidationTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ValidationTag {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for ValidationTag {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

/// Strip weak markers and surrounding quotes.
///
/// Repeats until nothing changes, so `normalize(normalize(x)) == normalize(x)`
/// holds even for malformed input such as `W/W/"x"`.
pub fn normalize(tag: &str) -> String {
    let mut current = tag.trim();
    loop {
        let stripped = current.strip_prefix(WEAK_PREFIX).unwrap_or(current);
        let stripped = stripped.trim_matches('"').trim();
        if stripped == current {
            return stripped.to_string();
        }
        current = stripped;
    }
}

/// Weak comparison of two tags.
pub fn tags_equal(a: &str, b: &str) -> bool {
    normalize(a) == normalize(b)
}

/// Parsed `If-None-Match` condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IfNoneMatch {
    /// No condition was sent; a full response is always required.
    None,
    /// `*`: matches whenever the entity exists.
    Any,
    /// Comma-separated list of tags.
    Tags(Vec<String>),
}

impl IfNoneMatch {
    pub fn parse(header: Option<&str>) -> Self {
        let Some(value) = header.map(str::trim).filter(|v| !v.is_empty()) else {
            return Self::None;
        };

        if value == "*" {
            return Self::Any;
        }

        let tags: Vec<String> = value
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();

        if tags.is_empty() { Self::None } else { Self::Tags(tags) }
    }

    /// Whether the condition matches `current`, i.e. the client copy is fresh.
    pub fn matches(&self, current: &ValidationTag) -> bool {
        match self {
            Self::None => false,
            Self::Any => true,
            Self::Tags(tags) => tags.iter().any(|t| tags_equal(t, current.as_str())),
        }
    }
}
