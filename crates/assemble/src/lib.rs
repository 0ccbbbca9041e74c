pub mod config;
pub mod output;
pub mod pipeline;

pub use config::{BatchSpec, PipelineConfig, TargetPatent};
pub use output::{
    AssembleError, FailedEntry, FailureKind, OutputAssembler, PatentEntry, PortfolioDocument,
    PortfolioSummary,
};
pub use pipeline::{Pipeline, SharedSource};

use reconcile::EnrichmentIndex;

/// One-shot helper for callers that don't keep a pipeline around.
pub async fn reconcile_batch(
    source: SharedSource,
    enrichment: EnrichmentIndex,
    batch: &BatchSpec,
    config: PipelineConfig,
) -> Result<PortfolioDocument, AssembleError> {
    Pipeline::new(config, source, enrichment).run(batch).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use ingest::{Archive, ArchiveSet};
    use reconcile::{EnrichmentRecord, FieldConflict};
    use std::collections::HashMap;
    use std::sync::Arc;

    const ARCHIVE: &str = include_str!("../../../testdata/ipg160712.xml");

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn source() -> SharedSource {
        Arc::new(ArchiveSet::from_archives(vec![Archive::new(
            "ipg160712".to_string(),
            ARCHIVE.to_string(),
        )]))
    }

    fn enrichment() -> EnrichmentIndex {
        let mut raw = HashMap::new();
        raw.insert(
            "US9391881B2".to_string(),
            EnrichmentRecord {
                forward_cites: Some(18),
                assignee_current: Some("Omega Licensing LLC".to_string()),
                ..EnrichmentRecord::new("US9391881")
            },
        );
        EnrichmentIndex::from_map(raw)
    }

    fn batch() -> BatchSpec {
        let mut batch = BatchSpec::from_numbers([
            "US9391881B2",
            "US9391882",
            "US9391883",
            "US9391884",
            "US9999999",
        ]);
        batch.patents[0].forward_cites = Some(16);
        batch.patents[0].grant_date = Some(date("2016-07-12"));
        batch
    }

    fn statuses(doc: &PortfolioDocument) -> Vec<Option<FailureKind>> {
        doc.patents
            .iter()
            .map(|e| e.as_failed().map(|f| f.kind))
            .collect()
    }

    #[tokio::test]
    async fn test_end_to_end_batch() {
        let doc = reconcile_batch(source(), enrichment(), &batch(), PipelineConfig::default())
            .await
            .unwrap();

        assert_eq!(
            statuses(&doc),
            vec![
                None,
                None,
                Some(FailureKind::MalformedRecord),
                None,
                Some(FailureKind::NotFound),
            ]
        );
        assert_eq!(doc.portfolio.record_count, 3);
        assert_eq!(doc.portfolio.failed_count, 2);
        assert_eq!(doc.portfolio.assignee.as_deref(), Some("Omega Licensing LLC"));
        assert_eq!(doc.portfolio.total_forward_cites, 18);

        let first = doc.patents[0].as_reconciled().unwrap();
        assert_eq!(first.earliest_priority_date, date("2013-02-20"));
        assert_eq!(first.base_expiration, Some(date("2033-02-20")));
        assert_eq!(first.forward_cites, Some(18));
        assert_eq!(first.conflicts, vec![FieldConflict::new("forward_cites", 16u32, 18u32)]);
    }

    #[tokio::test]
    async fn test_parent_in_same_batch_extends_chain() {
        let doc = reconcile_batch(source(), EnrichmentIndex::new(), &batch(), PipelineConfig::default())
            .await
            .unwrap();

        let child = doc.patents[3].as_reconciled().unwrap();
        assert_eq!(child.filing_date, Some(date("2015-06-01")));
        assert_eq!(child.earliest_priority_date, date("2013-02-20"));
        assert_eq!(child.priority_chain, vec!["14727111", "14185366", "13771936"]);
    }

    #[tokio::test]
    async fn test_output_independent_of_concurrency() {
        let sequential = PipelineConfig {
            max_concurrency: 1,
            ..PipelineConfig::default()
        };
        let parallel = PipelineConfig {
            max_concurrency: 8,
            ..PipelineConfig::default()
        };

        let a = reconcile_batch(source(), enrichment(), &batch(), sequential).await.unwrap();
        let b = reconcile_batch(source(), enrichment(), &batch(), parallel).await.unwrap();
        assert_eq!(a.patents, b.patents);
    }

    #[tokio::test]
    async fn test_require_complete_reports_uncovered_identifiers() {
        let err = reconcile_batch(source(), enrichment(), &batch(), PipelineConfig::strict())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            AssembleError::IncompleteBatch {
                missing: vec!["US9391883".to_string(), "US9999999".to_string()]
            }
        );
    }

    #[tokio::test]
    async fn test_enrichment_alone_counts_as_coverage() {
        let mut raw = HashMap::new();
        raw.insert("US9391883".to_string(), EnrichmentRecord::default());
        raw.insert("US9999999".to_string(), EnrichmentRecord::default());
        let index = EnrichmentIndex::from_map(raw);

        let doc = reconcile_batch(source(), index, &batch(), PipelineConfig::strict())
            .await
            .unwrap();
        let missing = doc.patents[4].as_failed().unwrap();
        assert!(missing.enrichment.is_some());
        assert_eq!(missing.kind, FailureKind::NotFound);
    }

    #[tokio::test]
    async fn test_repeated_target_is_reconciled_once() {
        let batch = BatchSpec::from_numbers(["US9391881B2", "us 9,391,881 b2", "US9391882"]);
        let doc = reconcile_batch(source(), enrichment(), &batch, PipelineConfig::strict())
            .await
            .unwrap();

        assert_eq!(
            statuses(&doc),
            vec![None, Some(FailureKind::DuplicateTarget), None]
        );
        assert_eq!(doc.portfolio.record_count, 2);
        assert_eq!(doc.portfolio.total_forward_cites, 18);

        let repeated = doc.patents[1].as_failed().unwrap();
        assert_eq!(repeated.identifier, "us 9,391,881 b2");
        assert!(repeated.message.contains("US9391881B2"));
    }

    #[tokio::test]
    async fn test_serialized_entries_are_tagged() {
        let doc = reconcile_batch(source(), enrichment(), &batch(), PipelineConfig::default())
            .await
            .unwrap();
        let json = serde_json::to_value(&doc).unwrap();

        assert_eq!(json["patents"][0]["status"], "reconciled");
        assert_eq!(json["patents"][0]["application_number"], "14/185366");
        assert!(json["patents"][0].get("claims").is_none());
        assert_eq!(json["patents"][0]["claim_count"], 5);

        let claims = json["patents"][0]["independent_claims"].as_array().unwrap();
        let numbers: Vec<u64> = claims.iter().map(|c| c["number"].as_u64().unwrap()).collect();
        assert_eq!(numbers, vec![1, 3, 5]);
        assert!(claims.iter().all(|c| c["independent"] == true));
        assert_eq!(json["patents"][2]["status"], "failed");
        assert_eq!(json["patents"][2]["kind"], "malformed_record");
        assert!(json["portfolio"]["run_id"].is_string());
    }
}
