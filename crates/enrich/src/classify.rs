use log::debug;

use crate::config::{BandThreshold, RateCardConfig};
use crate::model::{Anomaly, Band, RateRecord, Unit};
use crate::money::round2;

/// Derived values for one record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    pub estimated_cost: f64,
    /// Rate used for banding: GBP-equivalent, per hour.
    pub hourly_gbp: f64,
    pub band: Band,
    pub anomaly: Option<Anomaly>,
}

/// Price-to-cost conversion; zero when there is no rate.
pub fn estimated_cost(rate_low: f64, margin_divisor: f64) -> f64 {
    if rate_low > 0.0 {
        round2(rate_low / margin_divisor)
    } else {
        0.0
    }
}

/// GBP-equivalent hourly figure used only for banding.
pub fn normalized_hourly_gbp(rate: f64, currency: &str, unit: Unit, config: &RateCardConfig) -> f64 {
    let gbp = rate * config.exchange_rate(currency);
    match unit {
        Unit::Day => gbp / config.hours_per_day,
        Unit::Hour => gbp,
    }
}

/// First threshold whose `(low, high]` contains `hourly_gbp`.
pub fn band_for(hourly_gbp: f64, bands: &[BandThreshold]) -> Band {
    bands
        .iter()
        .find(|t| t.contains(hourly_gbp))
        .map(|t| t.band)
        .unwrap_or(Band::Unknown)
}

/// Compute cost, band and anomaly for `record` and store them on it.
///
/// The stored rate and currency are never changed. Safe to run repeatedly.
pub fn classify(record: &mut RateRecord, config: &RateCardConfig) -> Classification {
    let rate_low = record.rate_low;
    let estimated_cost = estimated_cost(rate_low, config.margin_divisor);

    let (hourly_gbp, band) = if rate_low > 0.0 {
        let currency = record.banding_currency().to_string();
        if !currency.is_empty() && !config.knows_currency(&currency) {
            record
                .notes
                .push(format!("FX default: {currency} x {}", config.default_exchange_rate));
        }
        let hourly = normalized_hourly_gbp(rate_low, &currency, record.unit, config);
        (hourly, band_for(hourly, &config.bands))
    } else {
        (0.0, Band::Unknown)
    };

    let anomaly = (rate_low > 0.0 && estimated_cost > rate_low).then_some(Anomaly::CostExceedsPrice);

    record.estimated_cost = estimated_cost;
    record.band = band;
    record.anomaly = anomaly;

    debug!(
        "{} / {}: cost {} band {} (hourly GBP {:.2})",
        record.role, record.region, estimated_cost, band, hourly_gbp
    );

    Classification {
        estimated_cost,
        hourly_gbp,
        band,
        anomaly,
    }
}
