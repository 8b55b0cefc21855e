use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::model::Band;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Every static table the pipeline consults. Passed explicitly to each
/// stage; `Default` carries the reference tables.
///
/// Scalars are declared before tables so the struct serializes to TOML
/// in a readable order.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct RateCardConfig {
    /// Price-to-cost ratio: `estimated_cost = rate / margin_divisor`.
    pub margin_divisor: f64,
    /// Divisor turning a day rate into an hourly figure for banding.
    pub hours_per_day: f64,
    /// Exchange multiplier for currencies missing from `exchange_rates`.
    pub default_exchange_rate: f64,
    pub policy: PolicyConfig,
    pub columns: ColumnMapping,
    pub generate: GenerateConfig,
    /// Currency code -> GBP multiplier. Used for banding only.
    pub exchange_rates: BTreeMap<String, f64>,
    /// Region -> rule deriving its rate from a base region.
    pub proxies: BTreeMap<String, ProxyRule>,
    /// Ordered `(low, high]` intervals over the hourly GBP rate.
    pub bands: Vec<BandThreshold>,
    /// Region expansion table for the generate stage.
    pub regions: Vec<RegionSpec>,
}

impl Default for RateCardConfig {
    fn default() -> Self {
        Self {
            margin_divisor: 2.35,
            hours_per_day: 8.0,
            default_exchange_rate: 1.0,
            policy: PolicyConfig::default(),
            columns: ColumnMapping::default(),
            generate: GenerateConfig::default(),
            exchange_rates: default_exchange_rates(),
            proxies: default_proxies(),
            bands: default_bands(),
            regions: default_regions(),
        }
    }
}

// ---------------------------------------------------------------------------
// Policies
// ---------------------------------------------------------------------------

/// Which row survives when two rows share a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    FirstWins,
    LastWins,
}

/// How a proxied rate treats a base region priced in another currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProxyCurrencyPolicy {
    /// Copy the base value across unconverted; remember its currency for banding.
    Retain,
    /// Convert the base value into the target currency before applying the multiplier.
    Convert,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct PolicyConfig {
    pub archetype_duplicates: DuplicatePolicy,
    pub lookup_duplicates: DuplicatePolicy,
    pub proxy_currency: ProxyCurrencyPolicy,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            archetype_duplicates: DuplicatePolicy::FirstWins,
            lookup_duplicates: DuplicatePolicy::LastWins,
            proxy_currency: ProxyCurrencyPolicy::Retain,
        }
    }
}

// ---------------------------------------------------------------------------
// Column mapping
// ---------------------------------------------------------------------------

/// Working-table column names.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ColumnMapping {
    pub category: String,
    pub role: String,
    pub resource_type: String,
    pub unit: String,
    pub region: String,
    pub rate_low: String,
    pub rate_high: String,
    pub currency: String,
    pub source: String,
    pub notes: String,
}

impl Default for ColumnMapping {
    fn default() -> Self {
        Self {
            category: "Category | Function".into(),
            role: "Role".into(),
            resource_type: "Resource type".into(),
            unit: "Unit".into(),
            region: "Region".into(),
            rate_low: "Rate_low".into(),
            rate_high: "Rate_high".into(),
            currency: "Currency".into(),
            source: "Source".into(),
            notes: "Notes".into(),
        }
    }
}

impl ColumnMapping {
    /// Column order of a freshly generated working table.
    pub fn working_headers(&self) -> Vec<String> {
        vec![
            self.category.clone(),
            self.role.clone(),
            self.resource_type.clone(),
            self.unit.clone(),
            self.region.clone(),
            self.rate_low.clone(),
            self.rate_high.clone(),
            self.currency.clone(),
            self.source.clone(),
            self.notes.clone(),
        ]
    }
}

// ---------------------------------------------------------------------------
// Generate stage
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct GenerateConfig {
    /// Raw-file column holding the reference (GBP) rate.
    pub reference_column: String,
    /// Truth-file columns tried in order for the target rate.
    pub target_rate_columns: Vec<String>,
    /// Text identifying the raw file's header row.
    pub raw_header_marker: String,
    pub source_label: String,
    pub resource_type: String,
    pub unit: String,
}

impl Default for GenerateConfig {
    fn default() -> Self {
        Self {
            reference_column: "United Kingdom".into(),
            target_rate_columns: vec!["Rate_low".into(), "Rate".into(), "Unit Rate".into()],
            raw_header_marker: "Department / Category".into(),
            source_label: "OP_Content Lab".into(),
            resource_type: "FTE".into(),
            unit: "Hour".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ProxyRule {
    pub base: String,
    pub multiplier: f64,
}

/// Half-open interval `(low, high]` mapped to a band.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BandThreshold {
    pub low: f64,
    pub high: f64,
    pub band: Band,
}

impl BandThreshold {
    pub fn contains(&self, rate: f64) -> bool {
        self.low < rate && rate <= self.high
    }
}

/// A generated region: its code, the raw-file column carrying its rate,
/// and the currency that column is priced in.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RegionSpec {
    pub code: String,
    pub column: String,
    pub currency: String,
}

fn default_exchange_rates() -> BTreeMap<String, f64> {
    [
        ("GBP", 1.0),
        ("USD", 0.79),
        ("EUR", 0.86),
        ("BRL", 0.14),
        ("CNY", 0.11),
        ("CAD", 0.59),
        ("CHF", 0.90),
        ("AUD", 0.52),
        ("MXN", 0.04),
        ("PLN", 0.20),
        ("INR", 0.0095),
    ]
    .into_iter()
    .map(|(code, rate)| (code.to_string(), rate))
    .collect()
}

fn default_proxies() -> BTreeMap<String, ProxyRule> {
    [
        ("US-SEA", "US-NYC", 0.95),
        ("US-AUS", "US-NYC", 0.85),
        ("EU-ES", "UK-LON", 0.75),
        ("APAC-PH", "APAC-IN", 1.10),
    ]
    .into_iter()
    .map(|(region, base, multiplier)| {
        (
            region.to_string(),
            ProxyRule {
                base: base.to_string(),
                multiplier,
            },
        )
    })
    .collect()
}

fn default_bands() -> Vec<BandThreshold> {
    [
        (0.0, 65.0, Band::J),
        (65.0, 85.0, Band::K),
        (85.0, 105.0, Band::L),
        (105.0, 140.0, Band::M),
        (140.0, 200.0, Band::N),
        (200.0, 9999.0, Band::O),
    ]
    .into_iter()
    .map(|(low, high, band)| BandThreshold { low, high, band })
    .collect()
}

fn default_regions() -> Vec<RegionSpec> {
    [
        ("UK-LON", "United Kingdom", "GBP"),
        ("EU-ES", "Spain", "EUR"),
        ("EU-FR", "France", "EUR"),
        ("EU-DE", "Germany", "EUR"),
        ("EU-IT", "Italy", "EUR"),
        ("LATAM-BR", "Brazil", "BRL"),
        ("APAC-CN", "China_L", "CNY"),
        ("NA-CA", "Canada", "CAD"),
        ("EU-CH", "Switzerland HQ", "CHF"),
        ("APAC-IN", "India-USD", "USD"),
        ("APAC-CN-USD", "China-USD", "USD"),
        ("LATAM-MX", "Mexico-USD", "USD"),
        ("EU-PL", "Poland-USD", "USD"),
    ]
    .into_iter()
    .map(|(code, column, currency)| RegionSpec {
        code: code.to_string(),
        column: column.to_string(),
        currency: currency.to_string(),
    })
    .collect()
}

// ---------------------------------------------------------------------------
// Lookups
// ---------------------------------------------------------------------------

impl RateCardConfig {
    /// GBP multiplier for `currency`; unknown or blank codes use the default.
    pub fn exchange_rate(&self, currency: &str) -> f64 {
        self.exchange_rates
            .get(currency.trim().to_uppercase().as_str())
            .copied()
            .unwrap_or(self.default_exchange_rate)
    }

    pub fn knows_currency(&self, currency: &str) -> bool {
        self.exchange_rates
            .contains_key(currency.trim().to_uppercase().as_str())
    }

    pub fn proxy_rule(&self, region: &str) -> Option<&ProxyRule> {
        self.proxies.get(region.trim())
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl RateCardConfig {
    pub fn from_toml(input: &str) -> Result<Self, ConfigError> {
        let mut config: RateCardConfig =
            toml::from_str(input).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.exchange_rates = config
            .exchange_rates
            .into_iter()
            .map(|(code, rate)| (code.trim().to_uppercase(), rate))
            .collect();
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("margin_divisor", self.margin_divisor)?;
        positive("hours_per_day", self.hours_per_day)?;
        positive("default_exchange_rate", self.default_exchange_rate)?;

        for (code, rate) in &self.exchange_rates {
            positive(&format!("exchange_rates.{code}"), *rate)?;
        }

        for (region, rule) in &self.proxies {
            if !(rule.multiplier.is_finite() && rule.multiplier > 0.0) {
                return Err(ConfigError::ProxyRule {
                    region: region.clone(),
                    reason: format!("multiplier must be positive, got {}", rule.multiplier),
                });
            }
            if rule.base.trim() == region.trim() {
                return Err(ConfigError::ProxyRule {
                    region: region.clone(),
                    reason: "base region cannot be the region itself".into(),
                });
            }
        }

        if self.bands.is_empty() {
            return Err(ConfigError::Validation("at least one band is required".into()));
        }
        for (i, band) in self.bands.iter().enumerate() {
            if !(band.low < band.high) {
                return Err(ConfigError::Validation(format!(
                    "band {} ({}): low {} must be below high {}",
                    i, band.band, band.low, band.high
                )));
            }
            if let Some(prev) = i.checked_sub(1).map(|p| &self.bands[p]) {
                if band.low < prev.high {
                    return Err(ConfigError::Validation(format!(
                        "band {} ({}) overlaps band {} ({}): bands must be strictly ordered",
                        i,
                        band.band,
                        i - 1,
                        prev.band
                    )));
                }
            }
        }

        let mut seen = HashSet::new();
        for region in &self.regions {
            if !seen.insert(region.code.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "region '{}' is listed more than once",
                    region.code
                )));
            }
        }

        if self.generate.target_rate_columns.is_empty() {
            return Err(ConfigError::Validation(
                "generate.target_rate_columns must name at least one column".into(),
            ));
        }

        Ok(())
    }
}

fn positive(name: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Validation(format!(
            "{name} must be a positive number, got {value}"
        )))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
