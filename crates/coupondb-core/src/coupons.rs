//! Coupon domain types shared by the scraper, database, and API layers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Literal the source site uses for offers that need no code.
///
/// Also used as the provisional code of an offer whose reveal has not been
/// resolved yet. Never persisted.
pub const SENTINEL_CODE: &str = "No code required";

/// Returns `true` if `code` cannot be persisted: empty after trimming, or the
/// sentinel placeholder in any letter case.
#[must_use]
pub fn is_placeholder_code(code: &str) -> bool {
    let trimmed = code.trim();
    trimmed.is_empty() || trimmed.eq_ignore_ascii_case(SENTINEL_CODE)
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid merchant domain \"{value}\": {reason}")]
pub struct InvalidDomain {
    pub value: String,
    pub reason: &'static str,
}

/// Hostname-like identifier of a merchant, e.g. `"acme.com"`.
///
/// Always lowercase, non-empty, and free of path separators and whitespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MerchantDomain(String);

impl MerchantDomain {
    /// Validates and lowercases a raw domain string.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidDomain`] if the value is empty, contains `/`, `?`, `#`
    /// or whitespace, or has no `.` separating labels.
    pub fn parse(raw: &str) -> Result<Self, InvalidDomain> {
        let value = raw.trim().trim_end_matches('.').to_ascii_lowercase();
        let reject = |reason| InvalidDomain {
            value: raw.to_string(),
            reason,
        };

        if value.is_empty() {
            return Err(reject("empty"));
        }
        if value
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '/' | '?' | '#'))
        {
            return Err(reject("contains a path, query, or whitespace"));
        }
        if !value.contains('.') || value.starts_with('.') || value.contains("..") {
            return Err(reject("not a dotted host name"));
        }

        Ok(Self(value))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MerchantDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for MerchantDomain {
    type Err = InvalidDomain;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for MerchantDomain {
    type Error = InvalidDomain;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<MerchantDomain> for String {
    fn from(value: MerchantDomain) -> Self {
        value.0
    }
}

/// A listing-page partition of the source site's merchant directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// Merchants whose name starts with the given lowercase ASCII letter.
    Letter(char),
    /// Merchants whose name starts with a digit or symbol.
    Other,
}

impl Category {
    /// Every category in crawl order: `a` through `z`, then [`Category::Other`].
    #[must_use]
    pub fn all() -> Vec<Self> {
        ('a'..='z')
            .map(Category::Letter)
            .chain(std::iter::once(Category::Other))
            .collect()
    }

    /// Token used in the listing URL for this category.
    #[must_use]
    pub fn url_token(self) -> String {
        match self {
            Category::Letter(c) => c.to_string(),
            Category::Other => "number".to_string(),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Letter(c) => write!(f, "{c}"),
            Category::Other => f.write_str("other"),
        }
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim().to_ascii_lowercase();
        match token.as_str() {
            "other" | "number" | "#" | "0-9" => Ok(Category::Other),
            _ => {
                let mut chars = token.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) if c.is_ascii_lowercase() => Ok(Category::Letter(c)),
                    _ => Err(format!(
                        "unknown category \"{s}\"; expected a letter a-z or \"other\""
                    )),
                }
            }
        }
    }
}

/// One coupon-typed offer card as parsed from a merchant's offer page.
///
/// `direct_code` starts out as the code inlined in the card, if any, and is
/// filled in by the code resolver for offers that carry a `reveal_ref`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawOffer {
    /// Position of the card within the page, starting at 0.
    pub local_id: usize,
    pub discount: String,
    pub terms: String,
    pub verified: bool,
    pub direct_code: Option<String>,
    /// Site-relative or absolute URL of the reveal modal.
    pub reveal_ref: Option<String>,
}

impl RawOffer {
    /// Returns `true` if the offer still needs a reveal fetch to learn its code.
    #[must_use]
    pub fn needs_reveal(&self) -> bool {
        self.direct_code.is_none() && self.reveal_ref.as_deref().is_some_and(|r| !r.is_empty())
    }

    /// The code as currently known, or [`SENTINEL_CODE`] when none is.
    #[must_use]
    pub fn code_or_sentinel(&self) -> &str {
        self.direct_code.as_deref().unwrap_or(SENTINEL_CODE)
    }
}

/// A de-duplicated coupon ready for persistence. Identity is `(domain, code)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CouponRecord {
    pub domain: MerchantDomain,
    pub code: String,
    pub discount: String,
    pub terms: String,
    pub verified: bool,
}
