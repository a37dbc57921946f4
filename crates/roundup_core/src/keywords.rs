use std::ops::RangeInclusive;

use serde::Serialize;

use crate::RunError;

/// Fewest keywords accepted when the operator overrides the defaults.
pub const MIN_KEYWORDS: usize = 5;
/// Most keywords accepted in one override.
pub const MAX_KEYWORDS: usize = 25;
/// Range the input helper recommends; outside it is allowed but flagged.
pub const RECOMMENDED_KEYWORDS: RangeInclusive<usize> = 8..=15;

pub const TOO_FEW_KEYWORDS: &str =
    "Please enter at least 5 keywords, or leave it blank to use defaults.";
pub const TOO_MANY_KEYWORDS: &str = "Please enter no more than 25 keywords.";

/// Ordered keyword override for one run. Empty means "use server defaults".
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct KeywordSet(Vec<String>);

impl KeywordSet {
    /// Splits free text on commas, trimming and dropping empty entries.
    pub fn parse(input: &str) -> Self {
        Self(
            input
                .split(',')
                .map(str::trim)
                .filter(|keyword| !keyword.is_empty())
                .map(ToOwned::to_owned)
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    /// Accepts zero keywords or a count in `MIN_KEYWORDS..=MAX_KEYWORDS`.
    pub fn validate(&self) -> Result<(), RunError> {
        match self.len() {
            0 => Ok(()),
            n if n < MIN_KEYWORDS => Err(RunError::Validation(TOO_FEW_KEYWORDS.to_string())),
            n if n > MAX_KEYWORDS => Err(RunError::Validation(TOO_MANY_KEYWORDS.to_string())),
            _ => Ok(()),
        }
    }
}

impl From<Vec<String>> for KeywordSet {
    fn from(keywords: Vec<String>) -> Self {
        Self(
            keywords
                .into_iter()
                .map(|keyword| keyword.trim().to_string())
                .filter(|keyword| !keyword.is_empty())
                .collect(),
        )
    }
}

/// Helper text shown next to the keyword input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeywordAdvice {
    Defaults,
    TooFew,
    TooMany,
    AboveRecommended,
    Good,
}

impl KeywordAdvice {
    pub fn for_count(count: usize) -> Self {
        if count == 0 {
            Self::Defaults
        } else if count > MAX_KEYWORDS {
            Self::TooMany
        } else if count < MIN_KEYWORDS {
            Self::TooFew
        } else if count > *RECOMMENDED_KEYWORDS.end() {
            Self::AboveRecommended
        } else {
            Self::Good
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            Self::Defaults => {
                "Leave blank to use default pipeline keywords. Recommended 8-15 when overriding."
            }
            Self::TooFew => "Too few keywords. Minimum is 5 when overriding.",
            Self::TooMany => "Too many keywords. Maximum is 25.",
            Self::AboveRecommended => {
                "Outside recommended range (8-15). Results may be over-constrained."
            }
            Self::Good => "Good range.",
        }
    }

    /// True when a run with this count would be rejected.
    pub fn is_error(self) -> bool {
        matches!(self, Self::TooFew | Self::TooMany)
    }
}
