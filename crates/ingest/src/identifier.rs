use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::LocateError;

/// Series prefixes that sit between the country code and the digits
/// (design, reissue, plant, statutory invention registration, defensive publication).
const SERIES_PREFIXES: &str = "RE|PP|D|H|T";

static WITHOUT_COUNTRY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"^({SERIES_PREFIXES})?0*(\d+)([A-Z]\d?)?$"))
        .expect("patent number pattern compiles")
});

static WITH_COUNTRY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"^([A-Z]{{2}})({SERIES_PREFIXES})?0*(\d+)([A-Z]\d?)?$"))
        .expect("patent number pattern compiles")
});

/// A patent publication number reduced to comparable parts.
///
/// `"US9391881B2"`, `"us 9,391,881 b2"` and `"US09391881"` all share the
/// same [`key`](PatentNumber::key); only the first two also carry a kind code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PatentNumber {
    pub country: String,
    pub series: Option<String>,
    /// Digits without leading zeros.
    pub number: String,
    pub kind: Option<String>,
}

impl PatentNumber {
    /// Parse any common rendering of a publication number. Case, whitespace
    /// and punctuation are ignored; the country defaults to `US`.
    pub fn parse(raw: &str) -> Result<Self, LocateError> {
        let compact: String = raw
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_uppercase();

        if let Some(caps) = WITHOUT_COUNTRY.captures(&compact) {
            return Ok(Self {
                country: "US".to_string(),
                series: caps.get(1).map(|m| m.as_str().to_string()),
                number: caps[2].to_string(),
                kind: caps.get(3).map(|m| m.as_str().to_string()),
            });
        }

        if let Some(caps) = WITH_COUNTRY.captures(&compact) {
            return Ok(Self {
                country: caps[1].to_string(),
                series: caps.get(2).map(|m| m.as_str().to_string()),
                number: caps[3].to_string(),
                kind: caps.get(4).map(|m| m.as_str().to_string()),
            });
        }

        Err(LocateError::InvalidIdentifier(raw.to_string()))
    }

    /// Parse the `file` attribute of a grant root element,
    /// e.g. `US09391881-20160712.XML`. Everything after the first `-` is the
    /// publication date and file suffix.
    pub fn from_file_attribute(attr: &str) -> Result<Self, LocateError> {
        let stem = attr.split('-').next().unwrap_or(attr);
        Self::parse(stem)
    }

    /// Build from the separate `country` / `doc-number` / `kind` elements of
    /// a `document-id`.
    pub fn from_parts(country: &str, doc_number: &str, kind: Option<&str>) -> Result<Self, LocateError> {
        let joined = format!("{}{}{}", country, doc_number, kind.unwrap_or(""));
        Self::parse(&joined)
    }

    /// Kind-independent lookup key, e.g. `US9391881`.
    pub fn key(&self) -> String {
        format!(
            "{}{}{}",
            self.country,
            self.series.as_deref().unwrap_or(""),
            self.number
        )
    }

    /// Same publication. Kind codes only have to agree when both sides carry one.
    pub fn matches(&self, other: &PatentNumber) -> bool {
        if self.key() != other.key() {
            return false;
        }
        match (&self.kind, &other.kind) {
            (Some(a), Some(b)) => a == b,
            _ => true,
        }
    }

    /// Fill in a missing kind code from a more complete rendering of the same number.
    pub fn with_kind_from(mut self, other: &PatentNumber) -> Self {
        if self.kind.is_none() && self.key() == other.key() {
            self.kind = other.kind.clone();
        }
        self
    }
}

impl fmt::Display for PatentNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.key(), self.kind.as_deref().unwrap_or(""))
    }
}

impl FromStr for PatentNumber {
    type Err = LocateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for PatentNumber {
    type Error = LocateError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PatentNumber> for String {
    fn from(value: PatentNumber) -> Self {
        value.to_string()
    }
}
