//! Currency cell parsing and rounding.

/// Characters removed from a cell before numeric parsing.
const STRIPPED: [char; 4] = ['£', '$', '€', ','];

/// Parse a currency cell into a non-negative amount.
///
/// Symbols, thousands separators and whitespace are removed in any
/// combination. Empty, non-numeric, non-finite and negative input all
/// yield `0.0`; this function never fails.
pub fn parse_currency(raw: &str) -> f64 {
    let cleaned: String = raw
        .chars()
        .filter(|c| !STRIPPED.contains(c) && !c.is_whitespace())
        .collect();

    if cleaned.is_empty() {
        return 0.0;
    }

    match cleaned.parse::<f64>() {
        Ok(value) if value.is_finite() && value > 0.0 => value,
        _ => 0.0,
    }
}

/// Round to two decimal places. Exact ties go to the even cent, so
/// `0.125` becomes `0.12` and `0.375` becomes `0.38`.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}

/// Render an amount for a CSV cell: at most two decimals, no trailing zeros.
pub fn format_amount(value: f64) -> String {
    let rounded = round2(value);
    if rounded == 0.0 {
        // avoids "-0"
        return "0".to_string();
    }
    format!("{rounded}")
}
