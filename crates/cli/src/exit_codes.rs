//! CLI Exit Code Registry
//!
//! This is the single source of truth for all `ratecard` exit codes.
//! Exit codes are part of the shell contract: scripts rely on them.
//!
//! | Code | Meaning                                          |
//! |------|--------------------------------------------------|
//! | 0    | Success                                          |
//! | 2    | CLI usage error (bad args; clap exits with this) |
//! | 3    | Input file missing or unreadable                 |
//! | 4    | No header row found, or input is not valid CSV   |
//! | 5    | Invalid configuration                            |
//! | 6    | Output could not be written                      |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Wire it into `CliError`

/// Success - command completed without errors.
/// Unresolved gaps and unmatched roles are reported, not failures.
pub const EXIT_SUCCESS: u8 = 0;

/// Usage error - bad arguments, missing required options.
pub const EXIT_USAGE: u8 = 2;

/// An input file (CSV or config) does not exist or cannot be read.
pub const EXIT_INPUT_MISSING: u8 = 3;

/// No row in the input carried every header marker, or the CSV is malformed.
pub const EXIT_HEADER_NOT_FOUND: u8 = 4;

/// Config failed to parse or validate.
pub const EXIT_INVALID_CONFIG: u8 = 5;

/// Output table or summary could not be written.
pub const EXIT_WRITE_FAILED: u8 = 6;
