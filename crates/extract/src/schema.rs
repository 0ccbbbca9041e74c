use chrono::NaiveDate;
use ingest::PatentNumber;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// How a referenced application relates to the record that cites it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RelationKind {
    ParentContinuation,
    ParentContinuationInPart,
    ParentDivisional,
    ParentProvisional,
    Child,
    Other,
}

impl RelationKind {
    /// Map a `us-related-documents` section element to a relation.
    pub fn from_section(element: &str) -> Self {
        match element {
            "continuation" => Self::ParentContinuation,
            "continuation-in-part" => Self::ParentContinuationInPart,
            "division" => Self::ParentDivisional,
            "us-provisional-application" => Self::ParentProvisional,
            _ => Self::Other,
        }
    }

    /// Edges that carry a priority claim for the 20-year clock.
    pub fn is_chain_edge(&self) -> bool {
        matches!(
            self,
            Self::ParentContinuation | Self::ParentContinuationInPart | Self::ParentDivisional
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ParentContinuation => "parent-continuation",
            Self::ParentContinuationInPart => "parent-continuation-in-part",
            Self::ParentDivisional => "parent-divisional",
            Self::ParentProvisional => "parent-provisional",
            Self::Child => "child",
            Self::Other => "other",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelatedApplication {
    pub country: String,
    /// Application number digits, e.g. `13771936`.
    pub application_number: String,
    pub relation: RelationKind,
    /// Filing date as self-reported by the citing document.
    pub filing_date: Option<NaiveDate>,
    /// Grant number of the parent, when it issued.
    pub parent_grant: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClaimCategory {
    System,
    Method,
    Medium,
    #[default]
    Unclassified,
}

impl ClaimCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::Method => "method",
            Self::Medium => "medium",
            Self::Unclassified => "unclassified",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimEntry {
    pub number: u32,
    pub category: ClaimCategory,
    pub independent: bool,
    pub text: String,
    /// Claim numbers this claim is written against, from `claim-ref` markup.
    pub references: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatentRecord {
    pub identifier: PatentNumber,
    pub title: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub grant_date: NaiveDate,
    pub filing_date: Option<NaiveDate>,
    pub earliest_priority_date: Option<NaiveDate>,
    /// Digits only, e.g. `14185366`.
    pub application_number: String,
    pub assignee_original: Option<String>,
    pub claims: Vec<ClaimEntry>,
    pub related: Vec<RelatedApplication>,
    pub family_members: BTreeSet<String>,
}

impl PatentRecord {
    pub fn independent_claims(&self) -> impl Iterator<Item = &ClaimEntry> {
        self.claims.iter().filter(|c| c.independent)
    }

    pub fn claim_count(&self) -> usize {
        self.claims.len()
    }

    /// `14/185366` style, as printed on the grant.
    pub fn formatted_application_number(&self) -> String {
        format_application_number(&self.application_number)
    }

    pub fn parents(&self) -> impl Iterator<Item = &RelatedApplication> {
        self.related.iter().filter(|r| r.relation != RelationKind::Child)
    }
}

/// Series code split off the serial number: `14185366` → `14/185366`.
pub fn format_application_number(digits: &str) -> String {
    if digits.len() >= 8 && digits.is_ascii() {
        format!("{}/{}", &digits[..2], &digits[2..])
    } else {
        digits.to_string()
    }
}

/// Reduce an application number in any rendering (`13/771,936`,
/// `US13771936`) to its digits, the key the working set is indexed by.
pub fn application_key(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_application_number() {
        assert_eq!(format_application_number("14185366"), "14/185366");
        assert_eq!(format_application_number("123"), "123");
    }

    #[test]
    fn test_application_key() {
        assert_eq!(application_key("13/771,936"), "13771936");
        assert_eq!(application_key("US13771936"), "13771936");
    }

    #[test]
    fn test_relation_sections() {
        assert_eq!(RelationKind::from_section("division"), RelationKind::ParentDivisional);
        assert_eq!(RelationKind::from_section("reissue"), RelationKind::Other);
        assert!(RelationKind::ParentContinuationInPart.is_chain_edge());
        assert!(!RelationKind::ParentProvisional.is_chain_edge());
    }

    #[test]
    fn test_claim_category_serializes_lowercase() {
        let json = serde_json::to_string(&ClaimCategory::Medium).unwrap();
        assert_eq!(json, "\"medium\"");
    }
}
