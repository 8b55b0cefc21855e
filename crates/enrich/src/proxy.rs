//! Gap filling: derive a missing regional rate from a related region.
//!
//! The lookup is built once per run from every record carrying a positive
//! rate, then only read while records are resolved. Resolution is a single
//! hop: a base region that is itself missing is never chased further.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use log::{debug, warn};

use crate::config::{DuplicatePolicy, ProxyCurrencyPolicy, RateCardConfig};
use crate::model::{RateRecord, RATE_CURRENCY_NOTE};
use crate::money::round2;

pub const NO_RULE_NOTE: &str = "MISSING: No base rate or index found";
pub const MISSING_BASE_NOTE: &str = "Missing Base:";

/// A known rate for one `(role, region)` pair.
#[derive(Debug, Clone, PartialEq)]
pub struct BaseRate {
    pub rate: f64,
    pub currency: String,
}

/// `(role, region) -> rate` built from the records that already have one.
#[derive(Debug, Clone, Default)]
pub struct RateLookup {
    rates: HashMap<(String, String), BaseRate>,
}

impl RateLookup {
    pub fn build<'a, I>(records: I, policy: DuplicatePolicy) -> Self
    where
        I: IntoIterator<Item = &'a RateRecord>,
    {
        let mut rates = HashMap::new();
        for record in records {
            if record.rate_low <= 0.0 {
                continue;
            }
            let key = (record.role.trim().to_string(), record.region.trim().to_string());
            let value = BaseRate {
                rate: record.rate_low,
                currency: record.banding_currency().to_string(),
            };
            match rates.entry(key) {
                Entry::Vacant(slot) => {
                    slot.insert(value);
                }
                Entry::Occupied(mut slot) => {
                    if policy == DuplicatePolicy::LastWins {
                        slot.insert(value);
                    }
                }
            }
        }
        Self { rates }
    }

    pub fn get(&self, role: &str, region: &str) -> Option<&BaseRate> {
        self.rates
            .get(&(role.trim().to_string(), region.trim().to_string()))
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }
}

/// Result of trying to fill one record's rate.
#[derive(Debug, Clone, PartialEq)]
pub enum GapOutcome {
    /// The record already had a rate.
    NotNeeded,
    Filled {
        base: String,
        multiplier: f64,
        rate: f64,
    },
    /// No proxy rule exists for the record's region.
    NoRule,
    /// A rule exists but the base region has no rate for this role.
    MissingBase { base: String },
}

/// Fill `record`'s rate from its region's proxy rule, if it has none.
///
/// Unresolved gaps leave the rate at zero and add an annotation; they are
/// never errors.
pub fn resolve_gap(record: &mut RateRecord, lookup: &RateLookup, config: &RateCardConfig) -> GapOutcome {
    if record.rate_low > 0.0 {
        return GapOutcome::NotNeeded;
    }

    let Some(rule) = config.proxy_rule(&record.region) else {
        warn!("{} / {}: no rate and no proxy rule", record.role, record.region);
        record.notes.push(NO_RULE_NOTE);
        return GapOutcome::NoRule;
    };

    let Some(base_rate) = lookup.get(&record.role, &rule.base) else {
        warn!(
            "{} / {}: base region {} has no rate",
            record.role, record.region, rule.base
        );
        record.notes.push(format!("{MISSING_BASE_NOTE} {}", rule.base));
        return GapOutcome::MissingBase {
            base: rule.base.clone(),
        };
    };

    let target_currency = record.currency.clone();
    let crosses_currency = !base_rate.currency.is_empty()
        && !target_currency.is_empty()
        && base_rate.currency != target_currency;

    let mut value = base_rate.rate;
    if crosses_currency {
        match config.policy.proxy_currency {
            ProxyCurrencyPolicy::Retain => {
                record.rate_currency = Some(base_rate.currency.clone());
            }
            ProxyCurrencyPolicy::Convert => {
                value = value * config.exchange_rate(&base_rate.currency)
                    / config.exchange_rate(&target_currency);
            }
        }
    }

    let rate = round2(value * rule.multiplier);
    record.rate_low = rate;
    record.rate_high = rate;
    record.rate_filled = true;
    // An earlier run may have left this gap unresolved
    record.notes.remove_prefixed(MISSING_BASE_NOTE);
    record.notes.remove_prefixed(NO_RULE_NOTE);
    record
        .notes
        .push(format!("Proxy: {} x {}", rule.base, rule.multiplier));

    if crosses_currency {
        match config.policy.proxy_currency {
            ProxyCurrencyPolicy::Retain => {
                record
                    .notes
                    .push(format!("{RATE_CURRENCY_NOTE} {}", base_rate.currency));
            }
            ProxyCurrencyPolicy::Convert => {
                record
                    .notes
                    .push(format!("FX: {}->{}", base_rate.currency, target_currency));
            }
        }
    }

    debug!(
        "{} / {}: proxied {} from {} x {}",
        record.role, record.region, rate, rule.base, rule.multiplier
    );

    GapOutcome::Filled {
        base: rule.base.clone(),
        multiplier: rule.multiplier,
        rate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ColumnMapping;
    use crate::model::SourceRow;

    fn record(role: &str, region: &str, rate: &str, currency: &str) -> RateRecord {
        let row = SourceRow::from_pairs([
            ("Role", role),
            ("Region", region),
            ("Rate_low", rate),
            ("Rate_high", rate),
            ("Currency", currency),
        ]);
        RateRecord::from_row(row, &ColumnMapping::default())
    }

    #[test]
    fn fills_from_base_region() {
        let base = vec![record("RoleX", "UK-LON", "100", "GBP")];
        let lookup = RateLookup::build(&base, DuplicatePolicy::LastWins);
        let config = RateCardConfig::default();

        let mut rec = record("RoleX", "EU-ES", "", "GBP");
        let outcome = resolve_gap(&mut rec, &lookup, &config);

        assert_eq!(
            outcome,
            GapOutcome::Filled {
                base: "UK-LON".into(),
                multiplier: 0.75,
                rate: 75.0
            }
        );
        assert_eq!(rec.rate_low, 75.0);
        assert_eq!(rec.rate_high, 75.0);
        assert!(rec.rate_filled);
        assert!(rec.notes.contains("Proxy: UK-LON x 0.75"));
        assert_eq!(rec.rate_currency, None);
    }

    #[test]
    fn missing_base_leaves_rate_at_zero() {
        let lookup = RateLookup::default();
        let config = RateCardConfig::default();

        let mut rec = record("RoleX", "US-SEA", "0", "USD");
        let outcome = resolve_gap(&mut rec, &lookup, &config);

        assert_eq!(outcome, GapOutcome::MissingBase { base: "US-NYC".into() });
        assert_eq!(rec.rate_low, 0.0);
        assert!(!rec.rate_filled);
        assert_eq!(rec.notes.to_string(), "Missing Base: US-NYC");
    }

    #[test]
    fn region_without_rule_is_annotated() {
        let lookup = RateLookup::default();
        let config = RateCardConfig::default();

        let mut rec = record("RoleX", "EU-PL", "", "USD");
        assert_eq!(resolve_gap(&mut rec, &lookup, &config), GapOutcome::NoRule);
        assert_eq!(rec.rate_low, 0.0);
        assert!(rec.notes.contains(NO_RULE_NOTE));
    }

    #[test]
    fn existing_rate_is_untouched() {
        let lookup = RateLookup::default();
        let config = RateCardConfig::default();
        let mut rec = record("RoleX", "EU-ES", "80", "EUR");
        assert_eq!(resolve_gap(&mut rec, &lookup, &config), GapOutcome::NotNeeded);
        assert_eq!(rec.rate_low, 80.0);
        assert!(rec.notes.is_empty());
    }

    #[test]
    fn resolution_is_single_hop() {
        // EU-ES -> UK-LON, and UK-LON itself only derivable through another rule
        let mut config = RateCardConfig::default();
        config.proxies.insert(
            "UK-LON".into(),
            crate::config::ProxyRule {
                base: "US-NYC".into(),
                multiplier: 0.8,
            },
        );
        let records = vec![
            record("RoleX", "US-NYC", "150", "USD"),
            record("RoleX", "UK-LON", "", "GBP"),
        ];
        let lookup = RateLookup::build(&records, DuplicatePolicy::LastWins);

        let mut rec = record("RoleX", "EU-ES", "", "GBP");
        let outcome = resolve_gap(&mut rec, &lookup, &config);
        assert_eq!(outcome, GapOutcome::MissingBase { base: "UK-LON".into() });
        assert_eq!(rec.rate_low, 0.0);
    }

    #[test]
    fn later_fill_clears_stale_gap_notes() {
        let base = vec![record("RoleX", "UK-LON", "100", "GBP")];
        let lookup = RateLookup::build(&base, DuplicatePolicy::LastWins);
        let config = RateCardConfig::default();

        let mut rec = record("RoleX", "EU-ES", "", "GBP");
        rec.notes.push("legacy row");
        rec.notes.push("Missing Base: UK-LON");
        rec.notes.push(NO_RULE_NOTE);
        resolve_gap(&mut rec, &lookup, &config);

        assert_eq!(rec.notes.to_string(), "legacy row | Proxy: UK-LON x 0.75");
    }

    #[test]
    fn sub_cent_proxy_rounds_half_to_even() {
        let base = vec![record("RoleX", "UK-LON", "0.5", "GBP")];
        let lookup = RateLookup::build(&base, DuplicatePolicy::LastWins);
        let mut config = RateCardConfig::default();
        config.proxies.get_mut("EU-ES").unwrap().multiplier = 0.25;

        let mut rec = record("RoleX", "EU-ES", "", "GBP");
        resolve_gap(&mut rec, &lookup, &config);
        assert_eq!(rec.rate_low, 0.12);
    }

    #[test]
    fn lookup_duplicate_policy_is_explicit() {
        let records = vec![
            record("RoleX", "UK-LON", "100", "GBP"),
            record("RoleX", "UK-LON", "120", "GBP"),
        ];
        let last = RateLookup::build(&records, DuplicatePolicy::LastWins);
        let first = RateLookup::build(&records, DuplicatePolicy::FirstWins);
        assert_eq!(last.get("RoleX", "UK-LON").unwrap().rate, 120.0);
        assert_eq!(first.get("RoleX", "UK-LON").unwrap().rate, 100.0);
        assert_eq!(last.len(), 1);
    }

    #[test]
    fn lookup_keys_are_trimmed() {
        let records = vec![record(" RoleX ", "UK-LON ", "100", "GBP")];
        let lookup = RateLookup::build(&records, DuplicatePolicy::LastWins);
        assert!(lookup.get("RoleX", "UK-LON").is_some());
    }

    #[test]
    fn retain_policy_records_base_currency() {
        let base = vec![record("RoleX", "UK-LON", "100", "GBP")];
        let lookup = RateLookup::build(&base, DuplicatePolicy::LastWins);
        let config = RateCardConfig::default();

        let mut rec = record("RoleX", "EU-ES", "", "EUR");
        resolve_gap(&mut rec, &lookup, &config);

        assert_eq!(rec.rate_low, 75.0);
        assert_eq!(rec.currency, "EUR");
        assert_eq!(rec.rate_currency.as_deref(), Some("GBP"));
        assert_eq!(rec.banding_currency(), "GBP");
        assert_eq!(rec.notes.to_string(), "Proxy: UK-LON x 0.75 | Rate currency: GBP");
    }

    #[test]
    fn convert_policy_moves_value_into_target_currency() {
        let base = vec![record("RoleX", "UK-LON", "100", "GBP")];
        let lookup = RateLookup::build(&base, DuplicatePolicy::LastWins);
        let mut config = RateCardConfig::default();
        config.policy.proxy_currency = ProxyCurrencyPolicy::Convert;

        let mut rec = record("RoleX", "EU-ES", "", "EUR");
        resolve_gap(&mut rec, &lookup, &config);

        // 100 GBP -> 116.28 EUR, x 0.75
        assert_eq!(rec.rate_low, round2(100.0 / 0.86 * 0.75));
        assert_eq!(rec.rate_currency, None);
        assert!(rec.notes.contains("FX: GBP->EUR"));
    }
}
