//! URL-safe tenant slugs.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

const MAX_SLUG_LEN: usize = 63;

/// A URL-safe, lowercase identifier (`[a-z0-9]` segments joined by single `-`).
///
/// Slugs are how tenants are resolved by name (e.g. the bootstrap `default`
/// tenant), so the constructor is the only way to obtain one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Slug(String);

impl Slug {
    pub fn parse(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into();
        if value.is_empty() || value.len() > MAX_SLUG_LEN {
            return Err(DomainError::validation(format!(
                "slug must be 1..={MAX_SLUG_LEN} characters"
            )));
        }
        if value.starts_with('-') || value.ends_with('-') || value.contains("--") {
            return Err(DomainError::validation(format!(
                "slug '{value}' has a leading, trailing or doubled '-'"
            )));
        }
        if !value
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        {
            return Err(DomainError::validation(format!(
                "slug '{value}' may only contain a-z, 0-9 and '-'"
            )));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Slug {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Slug {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Slug {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<Slug> for String {
    fn from(value: Slug) -> Self {
        value.0
    }
}
