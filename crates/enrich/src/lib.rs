//! `ratecard-enrich`: rate card gap-filling and enrichment engine.
//!
//! Pure engine crate: receives pre-loaded rows, returns enriched rows.
//! No CLI or IO dependencies.

pub mod classify;
pub mod config;
pub mod error;
pub mod index;
pub mod matcher;
pub mod model;
pub mod money;
pub mod pipeline;
pub mod proxy;
pub mod summary;

pub use config::RateCardConfig;
pub use error::ConfigError;
pub use model::{Band, RateRecord, SourceRow, Table};
pub use pipeline::{build, generate, refine, BuildOutput, GenerateOutput, RefineOutput};
pub use summary::{BuildSummary, GenerateSummary, RefineSummary};
