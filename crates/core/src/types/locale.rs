//! Locale tag sent with every request as the `lang` query parameter.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`Locale`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum LocaleError {
    /// The input string is empty.
    #[error("locale cannot be empty")]
    Empty,
    /// The input contains characters other than ASCII letters and `-`/`_`.
    #[error("invalid locale tag: {0}")]
    Invalid(String),
}

/// A short language tag such as `en`, `ar` or `en-US`.
///
/// Stored lowercased with `_` normalized to `-`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Locale(String);

impl Locale {
    /// Parse and normalize a locale tag.
    ///
    /// # Errors
    ///
    /// Returns `LocaleError` if the tag is empty, longer than 16 characters
    /// or contains anything but ASCII letters and separators.
    pub fn parse(tag: &str) -> Result<Self, LocaleError> {
        let trimmed = tag.trim();
        if trimmed.is_empty() {
            return Err(LocaleError::Empty);
        }
        let valid = trimmed.len() <= 16
            && trimmed
                .chars()
                .all(|c| c.is_ascii_alphabetic() || c == '-' || c == '_')
            && trimmed.chars().next().is_some_and(|c| c.is_ascii_alphabetic());
        if !valid {
            return Err(LocaleError::Invalid(trimmed.to_string()));
        }
        Ok(Self(trimmed.to_ascii_lowercase().replace('_', "-")))
    }

    /// The tag as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the language is written right-to-left.
    #[must_use]
    pub fn is_rtl(&self) -> bool {
        matches!(self.language(), "ar" | "he" | "fa" | "ur")
    }

    /// Primary language subtag (`en` for `en-us`).
    #[must_use]
    pub fn language(&self) -> &str {
        self.0.split('-').next().unwrap_or(&self.0)
    }
}

impl Default for Locale {
    /// English, the locale used when none has been chosen.
    fn default() -> Self {
        Self("en".to_string())
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Locale {
    type Err = LocaleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Locale {
    type Error = LocaleError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Locale> for String {
    fn from(locale: Locale) -> Self {
        locale.0
    }
}
