pub mod conflict;
pub mod enrichment;
pub mod error;
pub mod expiration;
pub mod merger;

pub use conflict::{FieldConflict, QualityFlag};
pub use enrichment::{CitingAssignee, EnrichmentIndex, EnrichmentRecord, MAX_CITING_ASSIGNEES};
pub use error::MergeError;
pub use expiration::{ExpirationCalculator, ExpirationConfig, ExpirationOutcome};
pub use merger::{EnrichmentMerger, PriorKnowledge, ReconciledRecord};

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use extract::{ExtractedRecord, Extractor};
    use ingest::{Archive, ArchiveLocator, PatentNumber};
    use priority::{PriorityChainResolver, PriorityResolution, WorkingSet};

    const ARCHIVE: &str = include_str!("../../../testdata/ipg160712.xml");

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn extracted(id: &str) -> (ExtractedRecord, PriorityResolution) {
        let archive = Archive::new("ipg160712".to_string(), ARCHIVE.to_string());
        let fragment = ArchiveLocator::default()
            .locate(&archive, &PatentNumber::parse(id).unwrap())
            .unwrap();
        let extracted = Extractor::new().extract(&fragment).unwrap();
        let resolution = PriorityChainResolver::default().resolve(&extracted.record, &WorkingSet::new());
        (extracted, resolution)
    }

    #[test]
    fn test_absent_enrichment_still_produces_record() {
        let (rec, resolution) = extracted("US9391881B2");
        let merged = EnrichmentMerger::default()
            .merge(rec, &resolution, None, &PriorKnowledge::default())
            .unwrap();

        assert_eq!(merged.earliest_priority_date, date("2013-02-20"));
        assert_eq!(merged.base_expiration, Some(date("2033-02-20")));
        assert_eq!(merged.expiration, Some(date("2033-02-20")));
        assert_eq!(merged.application_number, "14/185366");
        assert!(merged.conflicts.is_empty());
        assert!(merged.forward_cites.is_none());
        assert!(merged.assignee_current.is_none());
        assert!(merged.citing_assignees.is_empty());
    }

    #[test]
    fn test_only_independent_claims_are_carried() {
        let (rec, resolution) = extracted("US9391881B2");
        let merged = EnrichmentMerger::default()
            .merge(rec, &resolution, None, &PriorKnowledge::default())
            .unwrap();

        assert_eq!(merged.claim_count, 5);
        let numbers: Vec<u32> = merged.independent_claims.iter().map(|c| c.number).collect();
        assert_eq!(numbers, vec![1, 3, 5]);
        assert!(merged.independent_claims.iter().all(|c| c.independent));
    }

    #[test]
    fn test_forward_cites_enrichment_wins_with_conflict() {
        let (rec, resolution) = extracted("US9391881B2");
        let enrichment = EnrichmentRecord {
            forward_cites: Some(18),
            ..EnrichmentRecord::new("US9391881")
        };
        let prior = PriorKnowledge { forward_cites: Some(16) };

        let merged = EnrichmentMerger::default()
            .merge(rec, &resolution, Some(&enrichment), &prior)
            .unwrap();

        assert_eq!(merged.forward_cites, Some(18));
        assert_eq!(merged.conflicts, vec![FieldConflict::new("forward_cites", 16u32, 18u32)]);
    }

    #[test]
    fn test_prior_count_kept_without_enrichment_value() {
        let (rec, resolution) = extracted("US9391881B2");
        let prior = PriorKnowledge { forward_cites: Some(16) };
        let merged = EnrichmentMerger::default()
            .merge(rec, &resolution, None, &prior)
            .unwrap();
        assert_eq!(merged.forward_cites, Some(16));
        assert!(merged.conflicts.is_empty());
    }

    #[test]
    fn test_identifier_mismatch() {
        let (rec, resolution) = extracted("US9391881B2");
        let enrichment = EnrichmentRecord::new("US9391882");
        let err = EnrichmentMerger::default()
            .merge(rec, &resolution, Some(&enrichment), &PriorKnowledge::default())
            .unwrap_err();
        assert!(matches!(err, MergeError::IdentifierMismatch { .. }));
    }

    #[test]
    fn test_assignee_formatting_is_not_a_change() {
        let (rec, resolution) = extracted("US9391881B2");
        let enrichment = EnrichmentRecord {
            assignee_current: Some("ACME ANALYTICS INC".to_string()),
            ..EnrichmentRecord::default()
        };
        let merged = EnrichmentMerger::default()
            .merge(rec, &resolution, Some(&enrichment), &PriorKnowledge::default())
            .unwrap();

        assert_eq!(merged.assignee_original.as_deref(), Some("Acme Analytics, Inc."));
        assert_eq!(merged.assignee_current.as_deref(), Some("ACME ANALYTICS INC"));
        assert!(merged.conflicts.is_empty());
        assert!(!merged
            .quality_flags
            .iter()
            .any(|f| matches!(f, QualityFlag::AssigneeChanged { .. })));
    }

    #[test]
    fn test_assignee_change_is_flagged_not_conflicted() {
        let (rec, resolution) = extracted("US9391881B2");
        let enrichment = EnrichmentRecord {
            assignee_current: Some("Omega Licensing LLC".to_string()),
            ..EnrichmentRecord::default()
        };
        let merged = EnrichmentMerger::default()
            .merge(rec, &resolution, Some(&enrichment), &PriorKnowledge::default())
            .unwrap();

        assert!(merged.conflicts.is_empty());
        assert!(merged
            .quality_flags
            .iter()
            .any(|f| matches!(f, QualityFlag::AssigneeChanged { .. })));
    }

    #[test]
    fn test_family_union_is_order_independent() {
        let family_a = vec!["US2017000001A1".to_string(), "us 9,391,881 b2".to_string(), "EP3000000".to_string()];
        let mut family_b = family_a.clone();
        family_b.reverse();

        let merge = |family: Vec<String>| {
            let (rec, resolution) = extracted("US9391881B2");
            let enrichment = EnrichmentRecord {
                simple_family: family,
                ..EnrichmentRecord::default()
            };
            EnrichmentMerger::default()
                .merge(rec, &resolution, Some(&enrichment), &PriorKnowledge::default())
                .unwrap()
                .family_members
        };

        let a = merge(family_a);
        let b = merge(family_b);
        assert_eq!(a, b);
        assert_eq!(a, vec!["EP3000000", "US20140164999A1", "US2017000001A1"]);
    }

    #[test]
    fn test_conflicts_are_deterministic() {
        let enrichment = EnrichmentRecord {
            forward_cites: Some(18),
            adjusted_expiration: Some(date("2033-05-21")),
            ..EnrichmentRecord::default()
        };
        let prior = PriorKnowledge { forward_cites: Some(16) };

        let run = || {
            let (rec, resolution) = extracted("US9391881B2");
            EnrichmentMerger::default()
                .merge(rec, &resolution, Some(&enrichment), &prior)
                .unwrap()
        };
        let first = run();
        let second = run();

        assert_eq!(first, second);
        let fields: Vec<&str> = first.conflicts.iter().map(|c| c.field.as_str()).collect();
        assert_eq!(fields, vec!["forward_cites", "expiration"]);
        assert_eq!(first.expiration, Some(date("2033-05-21")));
    }
}
