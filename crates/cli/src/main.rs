// ratecard CLI - build, gap-fill and band multi-region rate cards

mod exit_codes;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{ArgAction, Args, Parser, Subcommand};
use log::{info, warn};
use serde::Serialize;

use ratecard_enrich::{build, generate, refine, ConfigError, RateCardConfig, Table};
use ratecard_io::{read_table, write_table, HeaderMarkers, IoError};

use exit_codes::{
    EXIT_HEADER_NOT_FOUND, EXIT_INPUT_MISSING, EXIT_INVALID_CONFIG, EXIT_SUCCESS, EXIT_USAGE,
    EXIT_WRITE_FAILED,
};

#[derive(Parser)]
#[command(name = "ratecard")]
#[command(about = "Generate, gap-fill and band multi-region rate cards")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct CommonArgs {
    /// TOML file overriding the built-in rates, proxies, bands and regions
    #[arg(long, global = true, env = "RATECARD_CONFIG")]
    config: Option<PathBuf>,

    /// Also write the run counters as JSON to this path
    #[arg(long, global = true)]
    summary_json: Option<PathBuf>,

    /// Only print errors
    #[arg(long, short = 'q', global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Log record decisions (-v info, -vv debug). RUST_LOG takes precedence
    #[arg(long, short = 'v', global = true, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Expand truth-file roles into a multi-region working table
    #[command(after_help = "\
Examples:
  ratecard generate --truth roles.csv --raw content_lab.csv -o working.csv
  ratecard generate --truth roles.csv --raw content_lab.csv -o working.csv --summary-json gen.json")]
    Generate {
        /// Roles with target GBP rates
        #[arg(long)]
        truth: PathBuf,

        /// Raw rate sheet with one column per region
        #[arg(long)]
        raw: PathBuf,

        /// Output CSV path
        #[arg(long, short = 'o')]
        output: PathBuf,
    },

    /// Fill missing rates by proxy, then add cost, band and anomaly columns
    #[command(after_help = "\
Examples:
  ratecard refine master.csv -o master_enriched.csv
  ratecard refine master.csv -o out.csv --config rates.toml -v")]
    Refine {
        /// Working table to enrich
        input: PathBuf,

        /// Output CSV path
        #[arg(long, short = 'o')]
        output: PathBuf,
    },

    /// Generate then refine in one pass
    #[command(after_help = "\
Examples:
  ratecard build --truth roles.csv --raw content_lab.csv -o rate_card.csv")]
    Build {
        /// Roles with target GBP rates
        #[arg(long)]
        truth: PathBuf,

        /// Raw rate sheet with one column per region
        #[arg(long)]
        raw: PathBuf,

        /// Output CSV path
        #[arg(long, short = 'o')]
        output: PathBuf,
    },

    /// Validate a config and print the effective settings as TOML
    #[command(after_help = "\
Examples:
  ratecard config > rates.toml
  ratecard config --config rates.toml")]
    Config,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli.common);

    let result = match cli.command {
        Commands::Generate { truth, raw, output } => cmd_generate(&cli.common, &truth, &raw, &output),
        Commands::Refine { input, output } => cmd_refine(&cli.common, &input, &output),
        Commands::Build { truth, raw, output } => cmd_build(&cli.common, &truth, &raw, &output),
        Commands::Config => cmd_config(&cli.common),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

fn init_logging(common: &CommonArgs) {
    let level = if common.quiet {
        "error"
    } else {
        match common.verbose {
            0 => "warn",
            1 => "info",
            _ => "debug",
        }
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn usage(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn write(msg: impl Into<String>) -> Self {
        Self { code: EXIT_WRITE_FAILED, message: msg.into(), hint: None }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl From<IoError> for CliError {
    fn from(err: IoError) -> Self {
        let message = err.to_string();
        match err {
            IoError::NotFound { .. } | IoError::Read { .. } => Self {
                code: EXIT_INPUT_MISSING,
                message,
                hint: None,
            },
            IoError::HeaderNotFound { .. } => Self {
                code: EXIT_HEADER_NOT_FOUND,
                message,
                hint: Some("column names are set under [columns] and [generate] in --config".into()),
            },
            IoError::Csv { .. } => Self {
                code: EXIT_HEADER_NOT_FOUND,
                message,
                hint: None,
            },
            IoError::Write { .. } => Self::write(message),
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        Self {
            code: EXIT_INVALID_CONFIG,
            message: err.to_string(),
            hint: Some("run `ratecard config` to print the defaults".into()),
        }
    }
}

// ============================================================================
// Commands
// ============================================================================

fn cmd_generate(common: &CommonArgs, truth: &Path, raw: &Path, output: &Path) -> Result<(), CliError> {
    check_output(output, &[truth, raw])?;
    let config = load_config(common.config.as_deref())?;
    let truth_table = read_table(truth, &truth_markers(&config))?;
    let raw_table = read_table(raw, &raw_markers(&config))?;

    let out = generate(&truth_table.rows, &raw_table.rows, &config);
    finish(common, &out.table, output, &out.summary)?;

    if !common.quiet {
        let s = &out.summary;
        eprintln!(
            "generate: {} roles matched ({} exact, {} approximate), {} skipped, {} rows -> {}",
            s.exact_matches + s.approximate_matches,
            s.exact_matches,
            s.approximate_matches,
            s.skipped(),
            s.rows_out,
            output.display()
        );
    }
    Ok(())
}

fn cmd_refine(common: &CommonArgs, input: &Path, output: &Path) -> Result<(), CliError> {
    check_output(output, &[input])?;
    let config = load_config(common.config.as_deref())?;
    let table = read_table(input, &master_markers(&config))?;

    let out = refine(table, &config);
    finish(common, &out.table, output, &out.summary)?;

    if !common.quiet {
        let s = &out.summary;
        eprintln!(
            "refine: {} rows, {} proxies filled, {} unresolved, {} anomalies -> {}",
            s.rows,
            s.proxies_filled,
            s.unresolved(),
            s.anomalies,
            output.display()
        );
    }
    Ok(())
}

fn cmd_build(common: &CommonArgs, truth: &Path, raw: &Path, output: &Path) -> Result<(), CliError> {
    check_output(output, &[truth, raw])?;
    let config = load_config(common.config.as_deref())?;
    let truth_table = read_table(truth, &truth_markers(&config))?;
    let raw_table = read_table(raw, &raw_markers(&config))?;

    let out = build(&truth_table.rows, &raw_table.rows, &config);
    finish(common, &out.table, output, &out.summary)?;

    if !common.quiet {
        let g = &out.summary.generate;
        let r = &out.summary.refine;
        eprintln!(
            "build: {} rows, {} roles skipped, {} proxies filled, {} unresolved, {} anomalies -> {}",
            r.rows,
            g.skipped(),
            r.proxies_filled,
            r.unresolved(),
            r.anomalies,
            output.display()
        );
    }
    Ok(())
}

fn cmd_config(common: &CommonArgs) -> Result<(), CliError> {
    let config = load_config(common.config.as_deref())?;
    print!("{}", config.to_toml()?);
    Ok(())
}

// ============================================================================
// Helpers
// ============================================================================

fn load_config(path: Option<&Path>) -> Result<RateCardConfig, CliError> {
    let Some(path) = path else {
        return Ok(RateCardConfig::default());
    };

    let text = std::fs::read_to_string(path).map_err(|e| CliError {
        code: EXIT_INPUT_MISSING,
        message: format!("cannot read config {}: {}", path.display(), e),
        hint: None,
    })?;
    let config = RateCardConfig::from_toml(&text)?;
    info!("loaded config from {}", path.display());
    Ok(config)
}

/// Refuse to overwrite a source file.
fn check_output(output: &Path, inputs: &[&Path]) -> Result<(), CliError> {
    if inputs.iter().any(|input| same_file(input, output)) {
        return Err(CliError::usage(format!(
            "output {} would overwrite an input file",
            output.display()
        ))
        .with_hint("choose a different -o path"));
    }
    Ok(())
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

/// Write the table, then the optional JSON summary.
fn finish<S: Serialize>(
    common: &CommonArgs,
    table: &Table,
    output: &Path,
    summary: &S,
) -> Result<(), CliError> {
    write_table(table, output)?;

    if let Some(path) = &common.summary_json {
        let json = serde_json::to_string_pretty(summary)
            .map_err(|e| CliError::write(format!("cannot encode summary: {}", e)))?;
        std::fs::write(path, json + "\n")
            .map_err(|e| CliError::write(format!("cannot write {}: {}", path.display(), e)))?;
        info!("summary written to {}", path.display());
    }
    Ok(())
}

fn master_markers(config: &RateCardConfig) -> HeaderMarkers {
    HeaderMarkers::columns([config.columns.role.clone(), config.columns.region.clone()])
}

fn truth_markers(config: &RateCardConfig) -> HeaderMarkers {
    HeaderMarkers::columns([config.columns.role.clone()])
}

fn raw_markers(config: &RateCardConfig) -> HeaderMarkers {
    let marker = &config.generate.raw_header_marker;
    if marker.trim().is_empty() {
        warn!("generate.raw_header_marker is empty; using the first row as header");
    }
    HeaderMarkers::contains([marker.clone()])
}
