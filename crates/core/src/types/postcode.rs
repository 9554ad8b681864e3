//! UK postcode validation and normalization.

use core::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Outward code (1-2 letters, a digit, optional alphanumeric), optional
/// space, inward code (digit + two letters).
static UK_POSTCODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^[A-Z]{1,2}\d[A-Z\d]? ?\d[A-Z]{2}$").expect("Invalid regex")
});

/// Splits a compact postcode before its three character inward code.
static INWARD_SPLIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.+?)(\d[A-Z]{2})$").expect("Invalid regex"));

/// Errors from [`UkPostcode::parse`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PostcodeError {
    #[error("postcode cannot be empty")]
    Empty,
    #[error("'{0}' is not a valid UK postcode (e.g. SW1A 1AA)")]
    Invalid(String),
}

/// Canonical form of a postcode: whitespace removed, uppercased, and a single
/// space inserted before the inward code when one can be found.
///
/// Input that has no recognisable inward code is returned cleaned but unsplit.
///
/// ```
/// use ququ_core::normalize_uk_postcode;
///
/// assert_eq!(normalize_uk_postcode("sw1a1aa"), "SW1A 1AA");
/// assert_eq!(normalize_uk_postcode(" e1  6an "), "E1 6AN");
/// ```
#[must_use]
pub fn normalize_uk_postcode(raw: &str) -> String {
    let clean: String = raw
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_uppercase();
    INWARD_SPLIT.replace(&clean, "$1 $2").into_owned()
}

/// A validated UK postcode held in canonical form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UkPostcode(String);

impl UkPostcode {
    /// Whether the input matches the UK postcode pattern (case-insensitive,
    /// at most one space between outward and inward code).
    #[must_use]
    pub fn is_valid(raw: &str) -> bool {
        UK_POSTCODE.is_match(raw.trim())
    }

    /// Validate and normalize a postcode.
    ///
    /// # Errors
    ///
    /// Returns [`PostcodeError`] if the input is blank or fails the pattern.
    pub fn parse(raw: &str) -> Result<Self, PostcodeError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(PostcodeError::Empty);
        }
        if !Self::is_valid(trimmed) {
            return Err(PostcodeError::Invalid(trimmed.to_owned()));
        }
        Ok(Self(normalize_uk_postcode(trimmed)))
    }

    /// The canonical postcode, e.g. `SW1A 1AA`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UkPostcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
