//! Verdict data types.

use std::fmt;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{VerdictError, VerdictResult};

/// The binary judgment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerdictKind {
    Smash,
    Pass,
}

impl VerdictKind {
    pub const ALL: [VerdictKind; 2] = [VerdictKind::Smash, VerdictKind::Pass];

    /// Wire token, as constrained by the response schema.
    pub fn as_str(self) -> &'static str {
        match self {
            VerdictKind::Smash => "smash",
            VerdictKind::Pass => "pass",
        }
    }

    /// Capitalised form used in headings.
    pub fn label(self) -> &'static str {
        match self {
            VerdictKind::Smash => "Smash",
            VerdictKind::Pass => "Pass",
        }
    }

    pub fn parse(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "smash" => Some(VerdictKind::Smash),
            "pass" => Some(VerdictKind::Pass),
            _ => None,
        }
    }
}

impl fmt::Display for VerdictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A 1..=10 rating, carried on the wire as the string token `"1"`..`"10"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Rating(u8);

impl Rating {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 10;

    pub fn new(value: u8) -> Option<Self> {
        (Self::MIN..=Self::MAX).contains(&value).then_some(Self(value))
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// Accepts exactly the schema tokens: no padding, sign or leading zero.
    pub fn parse_token(token: &str) -> Option<Self> {
        if token.is_empty() || token.starts_with('0') || !token.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        token.parse::<u8>().ok().and_then(Self::new)
    }

    /// All schema tokens in order, `"1"` through `"10"`.
    pub fn tokens() -> impl Iterator<Item = String> {
        (Self::MIN..=Self::MAX).map(|n| n.to_string())
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for Rating {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Rating {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RatingVisitor;

        impl Visitor<'_> for RatingVisitor {
            type Value = Rating;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a rating token \"1\"..\"10\"")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Rating, E> {
                Rating::parse_token(v).ok_or_else(|| E::invalid_value(de::Unexpected::Str(v), &self))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Rating, E> {
                u8::try_from(v)
                    .ok()
                    .and_then(Rating::new)
                    .ok_or_else(|| E::invalid_value(de::Unexpected::Unsigned(v), &self))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Rating, E> {
                u8::try_from(v)
                    .ok()
                    .and_then(Rating::new)
                    .ok_or_else(|| E::invalid_value(de::Unexpected::Signed(v), &self))
            }
        }

        deserializer.deserialize_any(RatingVisitor)
    }
}

/// A complete, schema-valid result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub verdict: VerdictKind,
    pub rating: Rating,
    pub explanation: String,
}

impl Verdict {
    /// `"Smash (8 / 10)"`
    pub fn headline(&self) -> String {
        format!("{} ({} / 10)", self.verdict.label(), self.rating)
    }
}

/// A result whose fields may not have arrived yet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialVerdict {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verdict: Option<VerdictKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<Rating>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

impl PartialVerdict {
    pub fn is_empty(&self) -> bool {
        self.field_count() == 0
    }

    pub fn field_count(&self) -> usize {
        usize::from(self.verdict.is_some())
            + usize::from(self.rating.is_some())
            + usize::from(self.explanation.is_some())
    }

    pub fn is_complete(&self) -> bool {
        self.field_count() == 3
    }

    /// Overwrite with every field present in `newer`. Returns whether anything changed.
    pub fn merge(&mut self, newer: &PartialVerdict) -> bool {
        let mut changed = false;
        if newer.verdict.is_some() && newer.verdict != self.verdict {
            self.verdict = newer.verdict;
            changed = true;
        }
        if newer.rating.is_some() && newer.rating != self.rating {
            self.rating = newer.rating;
            changed = true;
        }
        if newer.explanation.is_some() && newer.explanation != self.explanation {
            self.explanation.clone_from(&newer.explanation);
            changed = true;
        }
        changed
    }

    pub fn into_complete(self) -> VerdictResult<Verdict> {
        match (self.verdict, self.rating, self.explanation) {
            (Some(verdict), Some(rating), Some(explanation)) => Ok(Verdict {
                verdict,
                rating,
                explanation,
            }),
            (verdict, rating, explanation) => {
                let missing: Vec<&str> = [
                    verdict.is_none().then_some("verdict"),
                    rating.is_none().then_some("rating"),
                    explanation.is_none().then_some("explanation"),
                ]
                .into_iter()
                .flatten()
                .collect();
                Err(VerdictError::malformed(format!(
                    "missing field(s): {}",
                    missing.join(", ")
                )))
            }
        }
    }
}

impl From<Verdict> for PartialVerdict {
    fn from(v: Verdict) -> Self {
        Self {
            verdict: Some(v.verdict),
            rating: Some(v.rating),
            explanation: Some(v.explanation),
        }
    }
}
