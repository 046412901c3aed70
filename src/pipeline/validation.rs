//! Court contact validation.

use std::sync::LazyLock;

use regex::Regex;

/// Values the upstream data uses for "no address on file".
const SENTINELS: &[&str] = &["NO ESPECIFICADO", "NULL", "NONE", ""];

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap()
});

/// Why a court contact was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContactError {
    #[error("no address on file")]
    Missing,
    #[error("placeholder value {0:?}")]
    Sentinel(String),
    #[error("malformed address {0:?}")]
    Malformed(String),
}

/// A court email address that passed validation. Stored trimmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourtContact(String);

impl CourtContact {
    /// Validate a raw column value.
    pub fn parse(raw: Option<&str>) -> Result<Self, ContactError> {
        let Some(raw) = raw else {
            return Err(ContactError::Missing);
        };
        let trimmed = raw.trim();
        if SENTINELS.iter().any(|s| trimmed.eq_ignore_ascii_case(s)) {
            return Err(ContactError::Sentinel(trimmed.to_string()));
        }
        if !is_valid_email(trimmed) {
            return Err(ContactError::Malformed(trimmed.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Structural `local@domain.tld` check (TLD of two or more letters).
/// Surrounding whitespace is ignored.
pub fn is_valid_email(candidate: &str) -> bool {
    EMAIL_PATTERN.is_match(candidate.trim())
}
