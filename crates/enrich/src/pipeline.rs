use log::{info, warn};

use crate::classify::classify;
use crate::config::RateCardConfig;
use crate::index::RateIndex;
use crate::matcher::match_rate;
use crate::model::{RateRecord, SourceRow, Table, DERIVED_COLUMNS};
use crate::money::{format_amount, parse_currency};
use crate::proxy::{resolve_gap, RateLookup};
use crate::summary::{BuildSummary, GenerateSummary, RefineSummary};

pub struct GenerateOutput {
    pub table: Table,
    pub summary: GenerateSummary,
}

pub struct RefineOutput {
    pub table: Table,
    pub summary: RefineSummary,
}

pub struct BuildOutput {
    pub table: Table,
    pub summary: BuildSummary,
}

/// Expand each truth row into one working-table row per configured region.
///
/// The regional rates come from the raw-file archetype nearest to the truth
/// row's GBP rate. Truth rows with no usable rate, or an empty archetype
/// pool, are skipped and counted.
pub fn generate(truth: &[SourceRow], raw: &[SourceRow], config: &RateCardConfig) -> GenerateOutput {
    let gen = &config.generate;
    let columns = &config.columns;

    let index = RateIndex::build(raw, &gen.reference_column, config.policy.archetype_duplicates);
    info!(
        "found {} unique {} price points to use as archetypes",
        index.len(),
        gen.reference_column
    );

    let mut summary = GenerateSummary {
        archetypes: index.len(),
        truth_rows: truth.len(),
        ..GenerateSummary::default()
    };
    let mut rows = Vec::with_capacity(truth.len() * config.regions.len());

    for truth_row in truth {
        let role = truth_row.get(&columns.role).unwrap_or("Unknown Role");
        let category = truth_row.get(&columns.category).unwrap_or("Unknown Category");
        let target = target_rate(truth_row, &gen.target_rate_columns);

        let role_match = match match_rate(target, &index) {
            Ok(m) => m,
            Err(miss) => {
                warn!("skipping '{role}': {miss}");
                summary.record_miss(miss);
                continue;
            }
        };
        summary.record_match(&role_match.kind);
        let note = role_match.kind.note();

        for region in &config.regions {
            let market_rate = role_match
                .archetype
                .row
                .get(&region.column)
                .map(parse_currency)
                .unwrap_or(0.0);
            let rate = format_amount(market_rate);

            rows.push(SourceRow::from_pairs([
                (columns.category.as_str(), category),
                (columns.role.as_str(), role),
                (columns.resource_type.as_str(), gen.resource_type.as_str()),
                (columns.unit.as_str(), gen.unit.as_str()),
                (columns.region.as_str(), region.code.as_str()),
                (columns.rate_low.as_str(), rate.as_str()),
                (columns.rate_high.as_str(), rate.as_str()),
                (columns.currency.as_str(), region.currency.as_str()),
                (columns.source.as_str(), gen.source_label.as_str()),
                (columns.notes.as_str(), note.as_str()),
            ]));
        }
    }

    summary.rows_out = rows.len();
    info!(
        "generated {} rows from {} roles ({} skipped)",
        summary.rows_out,
        summary.truth_rows - summary.skipped(),
        summary.skipped()
    );

    GenerateOutput {
        table: Table::new(columns.working_headers(), rows),
        summary,
    }
}

/// First configured rate column with a non-empty cell, parsed.
fn target_rate(row: &SourceRow, candidates: &[String]) -> f64 {
    candidates
        .iter()
        .filter_map(|c| row.get(c))
        .find(|v| !v.is_empty())
        .map(parse_currency)
        .unwrap_or(0.0)
}

/// Fill gaps, derive cost and band, and flag anomalies over a working table.
///
/// Input columns pass through in order; `Estimated_Cost`, `Band`,
/// `Anomaly_Flag` (and `Notes` if missing) are appended. No row is added or
/// removed.
pub fn refine(table: Table, config: &RateCardConfig) -> RefineOutput {
    let columns = &config.columns;
    let Table { headers, rows } = table;

    let mut records: Vec<RateRecord> = rows
        .into_iter()
        .map(|row| RateRecord::from_row(row, columns))
        .collect();

    let lookup = RateLookup::build(&records, config.policy.lookup_duplicates);

    let mut summary = RefineSummary::default();
    for record in &mut records {
        let gap = resolve_gap(record, &lookup, config);
        summary.record_gap(&gap);
        let classification = classify(record, config);
        summary.record_classification(&classification);
    }

    let mut out = Table::new(headers, Vec::with_capacity(records.len()));
    for column in DERIVED_COLUMNS {
        out.ensure_column(column);
    }
    out.ensure_column(&columns.notes);
    out.rows = records
        .into_iter()
        .map(|record| record.into_row(columns))
        .collect();

    info!(
        "refined {} rows: {} gaps filled by proxy, {} unresolved, {} anomalies",
        summary.rows,
        summary.proxies_filled,
        summary.unresolved(),
        summary.anomalies
    );

    RefineOutput {
        table: out,
        summary,
    }
}

/// `generate` followed by `refine`, without an intermediate file.
pub fn build(truth: &[SourceRow], raw: &[SourceRow], config: &RateCardConfig) -> BuildOutput {
    let generated = generate(truth, raw, config);
    let refined = refine(generated.table, config);
    BuildOutput {
        table: refined.table,
        summary: BuildSummary {
            generate: generated.summary,
            refine: refined.summary,
        },
    }
}
