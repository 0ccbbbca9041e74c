use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::conflict::{FieldConflict, QualityFlag};

/// Statutory term from the earliest priority date.
const TERM_MONTHS: u32 = 240;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpirationConfig {
    /// Days an adjusted date may differ from the base before it is logged
    /// as a conflict.
    pub tolerance_days: i64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExpirationOutcome {
    pub base: Option<NaiveDate>,
    /// Accepted adjusted date from enrichment.
    pub adjusted: Option<NaiveDate>,
    /// Adjusted when accepted, base otherwise.
    pub effective: Option<NaiveDate>,
    pub conflicts: Vec<FieldConflict>,
    pub flags: Vec<QualityFlag>,
}

#[derive(Debug, Default)]
pub struct ExpirationCalculator {
    config: ExpirationConfig,
}

impl ExpirationCalculator {
    pub fn new(config: ExpirationConfig) -> Self {
        Self { config }
    }

    /// Twenty calendar years after priority. Feb 29 lands on Feb 28 in a
    /// non-leap target year.
    pub fn base_expiration(&self, priority: NaiveDate) -> Option<NaiveDate> {
        priority.checked_add_months(Months::new(TERM_MONTHS))
    }

    pub fn evaluate(
        &self,
        identifier: &str,
        priority: NaiveDate,
        grant: NaiveDate,
        adjusted: Option<NaiveDate>,
    ) -> ExpirationOutcome {
        let mut outcome = ExpirationOutcome {
            base: self.base_expiration(priority),
            ..ExpirationOutcome::default()
        };
        if outcome.base.is_none() {
            outcome.flags.push(QualityFlag::ExpirationOutOfRange { priority });
        }

        let Some(adjusted) = adjusted else {
            outcome.effective = outcome.base;
            return outcome;
        };

        if adjusted < grant {
            warn!(
                identifier = %identifier,
                adjusted = %adjusted,
                grant = %grant,
                "adjusted expiration precedes grant, ignoring it"
            );
            if let Some(base) = outcome.base {
                outcome.conflicts.push(FieldConflict::dates("expiration", base, adjusted));
            }
            outcome.flags.push(QualityFlag::AdjustedExpirationBeforeGrant { adjusted, grant });
            outcome.effective = outcome.base;
            return outcome;
        }

        if let Some(base) = outcome.base {
            let drift = (adjusted - base).num_days();
            if drift.abs() > self.config.tolerance_days {
                warn!(
                    identifier = %identifier,
                    base = %base,
                    adjusted = %adjusted,
                    drift_days = drift,
                    "adjusted expiration differs from base"
                );
                outcome.conflicts.push(FieldConflict::dates("expiration", base, adjusted));
            }
        }

        outcome.adjusted = Some(adjusted);
        outcome.effective = Some(adjusted);
        outcome
    }
}
