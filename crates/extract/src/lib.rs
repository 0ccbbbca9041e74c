pub mod classifier;
pub mod error;
pub mod normalizer;
pub mod parser;
pub mod schema;

pub use classifier::ClaimClassifier;
pub use error::ParseError;
pub use normalizer::AssigneeNormalizer;
pub use parser::RecordParser;
pub use schema::{
    application_key, format_application_number, ClaimCategory, ClaimEntry, PatentRecord,
    RelatedApplication, RelationKind,
};

use ingest::RawDocumentFragment;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// A parsed record plus what the classifier could not decide.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedRecord {
    pub record: PatentRecord,
    /// Independent claims no rule matched.
    pub unclassified_claims: Vec<u32>,
}

#[derive(Debug, Default)]
pub struct Extractor {
    parser: RecordParser,
    classifier: ClaimClassifier,
}

impl Extractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a located fragment and categorise its claims.
    pub fn extract(&self, fragment: &RawDocumentFragment) -> Result<ExtractedRecord, ParseError> {
        let mut record = self.parser.parse(fragment)?;
        let unclassified_claims = self.classifier.classify_record(&mut record);

        if !unclassified_claims.is_empty() {
            warn!(
                identifier = %record.identifier,
                claims = ?unclassified_claims,
                "independent claims left unclassified"
            );
        }

        Ok(ExtractedRecord {
            record,
            unclassified_claims,
        })
    }

    pub fn parser(&self) -> &RecordParser {
        &self.parser
    }

    pub fn classifier(&self) -> &ClaimClassifier {
        &self.classifier
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ingest::{ArchiveLocator, PatentNumber};

    const ARCHIVE: &str = include_str!("../../../testdata/ipg160712.xml");

    fn fragment(id: &str) -> RawDocumentFragment {
        let archive = ingest::Archive::new("ipg160712".to_string(), ARCHIVE.to_string());
        ArchiveLocator::default()
            .locate(&archive, &PatentNumber::parse(id).unwrap())
            .unwrap()
    }

    #[test]
    fn test_extract_classifies_fixture_claims() {
        let extracted = Extractor::new().extract(&fragment("US9391881")).unwrap();
        let categories: Vec<ClaimCategory> =
            extracted.record.claims.iter().map(|c| c.category).collect();

        assert_eq!(
            categories,
            vec![
                ClaimCategory::Method,
                ClaimCategory::Method,
                ClaimCategory::System,
                ClaimCategory::System,
                ClaimCategory::Medium,
            ]
        );
        let independent: Vec<u32> = extracted.record.independent_claims().map(|c| c.number).collect();
        assert_eq!(independent, vec![1, 3, 5]);
        assert!(extracted.unclassified_claims.is_empty());
    }

    #[test]
    fn test_extract_reports_unclassified() {
        let extracted = Extractor::new().extract(&fragment("US9391882")).unwrap();
        assert_eq!(extracted.unclassified_claims, vec![3]);
    }

    #[test]
    fn test_extract_propagates_parse_failure() {
        let err = Extractor::new().extract(&fragment("US9391883")).unwrap_err();
        assert!(matches!(err, ParseError::MissingField { field: "title", .. }));
    }
}
