use thiserror::Error;

/// Failures loading or validating a [`crate::RateCardConfig`].
///
/// Per-record conditions (unmatchable rates, unresolved gaps) are not
/// errors; they are reported as values by the matcher and resolver.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// TOML parse / deserialization error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Config validation error (bad band order, non-positive divisor, etc.).
    #[error("config validation error: {0}")]
    Validation(String),
    /// A proxy rule that cannot be applied as written.
    #[error("proxy rule for '{region}': {reason}")]
    ProxyRule { region: String, reason: String },
}
