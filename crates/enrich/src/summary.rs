use std::collections::BTreeMap;

use serde::Serialize;

use crate::classify::Classification;
use crate::matcher::{MatchKind, MatchMiss};
use crate::proxy::GapOutcome;

/// Counters for one generate run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GenerateSummary {
    pub archetypes: usize,
    pub truth_rows: usize,
    pub exact_matches: usize,
    pub approximate_matches: usize,
    pub skipped_zero_rate: usize,
    pub skipped_empty_pool: usize,
    pub rows_out: usize,
}

impl GenerateSummary {
    pub fn record_match(&mut self, kind: &MatchKind) {
        match kind {
            MatchKind::Exact => self.exact_matches += 1,
            MatchKind::Approximate { .. } => self.approximate_matches += 1,
        }
    }

    pub fn record_miss(&mut self, miss: MatchMiss) {
        match miss {
            MatchMiss::ZeroRate => self.skipped_zero_rate += 1,
            MatchMiss::EmptyPool => self.skipped_empty_pool += 1,
        }
    }

    pub fn skipped(&self) -> usize {
        self.skipped_zero_rate + self.skipped_empty_pool
    }
}

/// Counters for one refine run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RefineSummary {
    pub rows: usize,
    pub proxies_filled: usize,
    pub missing_base: usize,
    pub no_rule: usize,
    pub anomalies: usize,
    pub band_counts: BTreeMap<String, usize>,
}

impl RefineSummary {
    pub fn record_gap(&mut self, outcome: &GapOutcome) {
        match outcome {
            GapOutcome::NotNeeded => {}
            GapOutcome::Filled { .. } => self.proxies_filled += 1,
            GapOutcome::MissingBase { .. } => self.missing_base += 1,
            GapOutcome::NoRule => self.no_rule += 1,
        }
    }

    pub fn record_classification(&mut self, classification: &Classification) {
        self.rows += 1;
        *self
            .band_counts
            .entry(classification.band.to_string())
            .or_insert(0) += 1;
        if classification.anomaly.is_some() {
            self.anomalies += 1;
        }
    }

    /// Gaps left at zero after proxying.
    pub fn unresolved(&self) -> usize {
        self.missing_base + self.no_rule
    }
}

/// Both stages of a `build` run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildSummary {
    pub generate: GenerateSummary,
    pub refine: RefineSummary,
}
