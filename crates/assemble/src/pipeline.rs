use extract::{ExtractedRecord, Extractor};
use ingest::{FragmentSource, PatentNumber};
use priority::{PriorityChainResolver, ResolverConfig, WorkingSet};
use reconcile::{EnrichmentIndex, EnrichmentMerger, ExpirationCalculator, ExpirationConfig};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::config::{BatchSpec, PipelineConfig, TargetPatent};
use crate::output::{
    AssembleError, FailedEntry, FailureKind, OutputAssembler, PatentEntry, PortfolioDocument,
};

pub type SharedSource = Arc<dyn FragmentSource + Send + Sync>;

/// Runs a batch end to end: locate and parse every target concurrently,
/// freeze the parsed records into a working set, then resolve, merge and
/// assemble in target order.
pub struct Pipeline {
    config: PipelineConfig,
    source: SharedSource,
    enrichment: Arc<EnrichmentIndex>,
    extractor: Arc<Extractor>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, source: SharedSource, enrichment: EnrichmentIndex) -> Self {
        Self {
            config,
            source,
            enrichment: Arc::new(enrichment),
            extractor: Arc::new(Extractor::new()),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub async fn run(&self, batch: &BatchSpec) -> Result<PortfolioDocument, AssembleError> {
        info!(
            targets = batch.len(),
            enrichment = self.enrichment.len(),
            concurrency = self.config.max_concurrency,
            "batch started"
        );

        let duplicates = duplicate_targets(batch);
        let parsed = self.parse_all(batch, &duplicates).await;

        let working_set = WorkingSet::from_records(
            parsed
                .iter()
                .filter_map(|p| p.as_ref().ok())
                .map(|e| e.record.clone()),
        );
        debug!(records = working_set.len(), "working set frozen");

        let resolver = PriorityChainResolver::new(ResolverConfig {
            max_chain_depth: self.config.max_chain_depth,
        });
        let merger = EnrichmentMerger::new(ExpirationCalculator::new(ExpirationConfig {
            tolerance_days: self.config.expiration_tolerance_days,
        }));

        let entries: Vec<PatentEntry> = batch
            .patents
            .iter()
            .zip(parsed)
            .map(|(target, parsed)| match parsed {
                Ok(extracted) => self.reconcile_one(extracted, target, &resolver, &merger, &working_set),
                Err(failed) => {
                    warn!(
                        identifier = %failed.identifier,
                        kind = ?failed.kind,
                        error = %failed.message,
                        "target failed"
                    );
                    PatentEntry::Failed(failed)
                }
            })
            .collect();

        OutputAssembler::new(self.config.require_complete).assemble(entries)
    }

    /// Locate and parse every target. Results come back indexed by target
    /// position regardless of completion order.
    async fn parse_all(
        &self,
        batch: &BatchSpec,
        duplicates: &[Option<usize>],
    ) -> Vec<Result<ExtractedRecord, FailedEntry>> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency.max(1)));
        let mut tasks = JoinSet::new();
        let mut slots: Vec<Option<Result<ExtractedRecord, FailedEntry>>> =
            (0..batch.len()).map(|_| None).collect();

        for (idx, target) in batch.patents.iter().enumerate() {
            if let Some(first) = duplicates[idx] {
                slots[idx] = Some(Err(FailedEntry::new(
                    target.number.clone(),
                    FailureKind::DuplicateTarget,
                    format!(
                        "same patent as target {} ({})",
                        first + 1,
                        batch.patents[first].number
                    ),
                )));
                continue;
            }

            let semaphore = Arc::clone(&semaphore);
            let source = Arc::clone(&self.source);
            let extractor = Arc::clone(&self.extractor);
            let enrichment = Arc::clone(&self.enrichment);
            let target = target.clone();

            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                let label = target.number.clone();
                let outcome = tokio::task::spawn_blocking(move || {
                    locate_and_extract(source.as_ref(), &extractor, &enrichment, &target)
                })
                .await
                .unwrap_or_else(|e| {
                    Err(FailedEntry::new(
                        label,
                        FailureKind::MalformedRecord,
                        format!("extraction task failed: {}", e),
                    ))
                });
                (idx, outcome)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((idx, outcome)) => slots[idx] = Some(outcome),
                Err(e) => warn!(error = %e, "parse task aborted"),
            }
        }

        slots
            .into_iter()
            .zip(&batch.patents)
            .map(|(slot, target)| {
                slot.unwrap_or_else(|| {
                    Err(FailedEntry::new(
                        target.number.clone(),
                        FailureKind::MalformedRecord,
                        "parse task did not complete",
                    ))
                })
            })
            .collect()
    }

    fn reconcile_one(
        &self,
        mut extracted: ExtractedRecord,
        target: &TargetPatent,
        resolver: &PriorityChainResolver,
        merger: &EnrichmentMerger,
        working_set: &WorkingSet,
    ) -> PatentEntry {
        let resolution = resolver.apply(&mut extracted.record, working_set);
        let identifier = extracted.record.identifier.clone();
        let enrichment = self.enrichment.get(&identifier);

        match merger.merge(extracted, &resolution, enrichment, &target.prior()) {
            Ok(record) => PatentEntry::Reconciled(Box::new(record)),
            Err(e) => {
                warn!(identifier = %identifier, error = %e, "merge failed");
                PatentEntry::Failed(
                    FailedEntry::new(identifier.to_string(), FailureKind::MergeError, e)
                        .with_enrichment(enrichment.cloned()),
                )
            }
        }
    }
}

/// For each target, the position of an earlier target naming the same
/// patent. Targets that don't parse are left to fail on their own.
fn duplicate_targets(batch: &BatchSpec) -> Vec<Option<usize>> {
    let mut first_seen: HashMap<String, usize> = HashMap::new();
    batch
        .patents
        .iter()
        .enumerate()
        .map(|(idx, target)| {
            let key = PatentNumber::parse(&target.number).ok()?.key();
            match first_seen.get(&key) {
                Some(&first) => {
                    warn!(identifier = %target.number, first = first + 1, "duplicate target");
                    Some(first)
                }
                None => {
                    first_seen.insert(key, idx);
                    None
                }
            }
        })
        .collect()
}

fn locate_and_extract(
    source: &dyn FragmentSource,
    extractor: &Extractor,
    enrichment: &EnrichmentIndex,
    target: &TargetPatent,
) -> Result<ExtractedRecord, FailedEntry> {
    let number = PatentNumber::parse(&target.number)
        .map_err(|e| FailedEntry::new(target.number.clone(), FailureKind::NotFound, e))?;
    let label = number.to_string();
    let known = || enrichment.get(&number).cloned();

    let fragment = source
        .resolve(&number, target.grant_date)
        .map_err(|e| FailedEntry::new(label.clone(), FailureKind::NotFound, e).with_enrichment(known()))?;

    extractor
        .extract(&fragment)
        .map_err(|e| FailedEntry::new(label.clone(), FailureKind::MalformedRecord, e).with_enrichment(known()))
}

