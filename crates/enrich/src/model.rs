use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::ColumnMapping;
use crate::money::{format_amount, parse_currency};

/// Derived columns appended to the output, in this order, when absent.
pub const ESTIMATED_COST_COLUMN: &str = "Estimated_Cost";
pub const BAND_COLUMN: &str = "Band";
pub const ANOMALY_COLUMN: &str = "Anomaly_Flag";
pub const DERIVED_COLUMNS: [&str; 3] = [ESTIMATED_COST_COLUMN, BAND_COLUMN, ANOMALY_COLUMN];

/// Annotation prefix recording the currency a proxied rate was computed in.
pub const RATE_CURRENCY_NOTE: &str = "Rate currency:";

// ---------------------------------------------------------------------------
// Rows + tables
// ---------------------------------------------------------------------------

/// One input row: ordered `(column, value)` cells.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceRow {
    cells: Vec<(String, String)>,
}

impl SourceRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            cells: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.cells
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value.as_str())
    }

    /// Cell value, or `""` when the column is absent.
    pub fn value(&self, column: &str) -> &str {
        self.get(column).unwrap_or("")
    }

    /// Replace the cell in place, or append it when the column is new.
    pub fn set(&mut self, column: &str, value: impl Into<String>) {
        let value = value.into();
        match self.cells.iter_mut().find(|(name, _)| name == column) {
            Some(cell) => cell.1 = value,
            None => self.cells.push((column.to_string(), value)),
        }
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Values laid out in `headers` order; missing columns become `""`.
    pub fn values_for(&self, headers: &[String]) -> Vec<String> {
        headers.iter().map(|h| self.value(h).to_string()).collect()
    }
}

/// Header list plus rows. Column order is the input order; new columns
/// are appended.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<SourceRow>,
}

impl Table {
    pub fn new(headers: Vec<String>, rows: Vec<SourceRow>) -> Self {
        Self { headers, rows }
    }

    /// Append `column` to the headers unless already present.
    pub fn ensure_column(&mut self, column: &str) {
        if !self.headers.iter().any(|h| h == column) {
            self.headers.push(column.to_string());
        }
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.headers.iter().any(|h| h == column)
    }

    /// Row values in header order, ready for a CSV writer.
    pub fn records(&self) -> impl Iterator<Item = Vec<String>> + '_ {
        self.rows.iter().map(|row| row.values_for(&self.headers))
    }
}

// ---------------------------------------------------------------------------
// Enumerations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Unit {
    #[default]
    Hour,
    Day,
}

impl Unit {
    /// Any cell mentioning "day" is a day rate; everything else is hourly.
    pub fn parse(raw: &str) -> Self {
        if raw.trim().to_lowercase().contains("day") {
            Self::Day
        } else {
            Self::Hour
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hour => write!(f, "Hour"),
            Self::Day => write!(f, "Day"),
        }
    }
}

/// Seniority band derived from an hourly GBP-equivalent rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum Band {
    J,
    K,
    L,
    M,
    N,
    O,
    #[default]
    Unknown,
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            Self::J => "J",
            Self::K => "K",
            Self::L => "L",
            Self::M => "M",
            Self::N => "N",
            Self::O => "O",
            Self::Unknown => "Unknown",
        };
        f.write_str(code)
    }
}

impl FromStr for Band {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "J" => Ok(Self::J),
            "K" => Ok(Self::K),
            "L" => Ok(Self::L),
            "M" => Ok(Self::M),
            "N" => Ok(Self::N),
            "O" => Ok(Self::O),
            "Unknown" | "" => Ok(Self::Unknown),
            other => Err(format!("unknown band code '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anomaly {
    CostExceedsPrice,
}

impl fmt::Display for Anomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CostExceedsPrice => write!(f, "Cost > Price"),
        }
    }
}

// ---------------------------------------------------------------------------
// Notes
// ---------------------------------------------------------------------------

/// Ordered annotation list. Rendered as `a | b | c`; never holds duplicates
/// or empty fragments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Notes(Vec<String>);

impl Notes {
    /// Split an existing notes cell on `|`.
    pub fn parse(raw: &str) -> Self {
        let mut notes = Self::default();
        for fragment in raw.split('|') {
            notes.push(fragment);
        }
        notes
    }

    /// Returns `false` if the annotation was empty or already present.
    pub fn push(&mut self, note: impl AsRef<str>) -> bool {
        let note = note.as_ref().trim();
        if note.is_empty() || self.contains(note) {
            return false;
        }
        self.0.push(note.to_string());
        true
    }

    pub fn contains(&self, note: &str) -> bool {
        self.0.iter().any(|n| n == note)
    }

    /// Drop every annotation starting with `prefix`; returns how many went.
    pub fn remove_prefixed(&mut self, prefix: &str) -> usize {
        let before = self.0.len();
        self.0.retain(|n| !n.starts_with(prefix));
        before - self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Notes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(" | "))
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// Typed view of one working-table row, plus the fields the pipeline derives.
#[derive(Debug, Clone)]
pub struct RateRecord {
    pub category: String,
    pub role: String,
    pub region: String,
    pub unit: Unit,
    pub rate_low: f64,
    pub rate_high: f64,
    pub currency: String,
    /// Currency the rate value is actually denominated in, when it differs
    /// from `currency` (a proxied rate copied across currencies).
    pub rate_currency: Option<String>,
    pub source: String,
    pub notes: Notes,
    /// Set when the resolver wrote a new rate into this record.
    pub rate_filled: bool,
    pub estimated_cost: f64,
    pub band: Band,
    pub anomaly: Option<Anomaly>,
    pub row: SourceRow,
}

impl RateRecord {
    pub fn from_row(row: SourceRow, columns: &ColumnMapping) -> Self {
        let notes = Notes::parse(row.value(&columns.notes));
        let rate_currency = notes
            .iter()
            .find_map(|n| n.strip_prefix(RATE_CURRENCY_NOTE))
            .map(|c| c.trim().to_uppercase())
            .filter(|c| !c.is_empty());

        Self {
            category: row.value(&columns.category).trim().to_string(),
            role: row.value(&columns.role).trim().to_string(),
            region: row.value(&columns.region).trim().to_string(),
            unit: Unit::parse(row.value(&columns.unit)),
            rate_low: parse_currency(row.value(&columns.rate_low)),
            rate_high: parse_currency(row.value(&columns.rate_high)),
            currency: row.value(&columns.currency).trim().to_uppercase(),
            rate_currency,
            source: row.value(&columns.source).trim().to_string(),
            notes,
            rate_filled: false,
            estimated_cost: 0.0,
            band: Band::Unknown,
            anomaly: None,
            row,
        }
    }

    /// Currency the banding normalisation should convert from.
    pub fn banding_currency(&self) -> &str {
        self.rate_currency.as_deref().unwrap_or(&self.currency)
    }

    /// Write the record back into its row. Rate cells are only touched when
    /// the resolver filled them; all other input cells pass through.
    pub fn into_row(mut self, columns: &ColumnMapping) -> SourceRow {
        if self.rate_filled {
            self.row.set(&columns.rate_low, format_amount(self.rate_low));
            self.row.set(&columns.rate_high, format_amount(self.rate_high));
        }
        self.row.set(&columns.notes, self.notes.to_string());
        self.row.set(ESTIMATED_COST_COLUMN, format_amount(self.estimated_cost));
        self.row.set(BAND_COLUMN, self.band.to_string());
        self.row.set(
            ANOMALY_COLUMN,
            self.anomaly.map(|a| a.to_string()).unwrap_or_default(),
        );
        self.row
    }
}

/// A reference row standing in for every role that shares its rate.
#[derive(Debug, Clone, PartialEq)]
pub struct RateArchetype {
    /// Rate in the reference currency (GBP).
    pub rate: f64,
    pub row: SourceRow,
}
