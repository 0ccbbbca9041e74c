use chrono::NaiveDate;
use reconcile::PriorKnowledge;
use serde::{Deserialize, Serialize};

/// One patent the caller wants reconciled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetPatent {
    pub number: String,
    /// Routes the lookup to the weekly container of that grant date.
    #[serde(default)]
    pub grant_date: Option<NaiveDate>,
    #[serde(default, alias = "forward_citations")]
    pub forward_cites: Option<u32>,
}

impl TargetPatent {
    pub fn new(number: impl Into<String>) -> Self {
        Self {
            number: number.into(),
            grant_date: None,
            forward_cites: None,
        }
    }

    pub fn prior(&self) -> PriorKnowledge {
        PriorKnowledge {
            forward_cites: self.forward_cites,
        }
    }
}

/// Ordered target list. Output entries follow this order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSpec {
    pub patents: Vec<TargetPatent>,
}

impl BatchSpec {
    pub fn from_numbers<I, S>(numbers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            patents: numbers.into_iter().map(TargetPatent::new).collect(),
        }
    }

    /// Parse a portfolio template. Fields other than the target ones are ignored.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn len(&self) -> usize {
        self.patents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patents.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Parent hops followed when resolving priority; deeper branches are cut
    /// and flagged.
    pub max_chain_depth: usize,
    /// Days an enrichment expiration may drift from the base before a
    /// conflict is logged.
    pub expiration_tolerance_days: i64,
    /// Fail the batch when an identifier yields neither a record nor enrichment.
    pub require_complete: bool,
    pub max_concurrency: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_chain_depth: 16,
            expiration_tolerance_days: 0,
            require_complete: false,
            max_concurrency: 8,
        }
    }
}

impl PipelineConfig {
    /// Every identifier must be covered and every expiration drift is logged.
    pub fn strict() -> Self {
        Self {
            require_complete: true,
            ..Self::default()
        }
    }

    /// Tolerates partial coverage and small expiration drift.
    pub fn lenient() -> Self {
        Self {
            max_chain_depth: 32,
            expiration_tolerance_days: 120,
            require_complete: false,
            max_concurrency: 16,
        }
    }
}
