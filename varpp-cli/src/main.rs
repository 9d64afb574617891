#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

//! # varpp CLI
//!
//! Command-line front end of the varpp variability analysis: prints each
//! translation unit annotated with the presence conditions of its code.

use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use colored::Colorize;
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::EnvFilter;
use varpp::{AnalysisMode, Artifact, ConfigEnvironment, SourceUnit, UnitOutcome, analyze_batch};

/// Exit codes for different outcomes
mod exit_code {
    pub const SUCCESS: i32 = 0;
    pub const WARNINGS: i32 = 1;
    pub const IO_ERROR: i32 = 2;
    pub const ANALYSIS_ERROR: i32 = 3;
}

/// Command-line interface for the varpp analysis
#[derive(Parser)]
#[command(
    name = "varpp",
    version,
    about = "Variability-aware C preprocessor analysis",
    long_about = "varpp preprocesses C sources without fixing a configuration and reports, for every \
                  piece of code, the presence condition over configuration macros under which it is compiled.",
    after_help = "EXAMPLES:
  # Symbolic analysis over Kconfig options
  $ varpp mm.c --atom-prefix CONFIG_

  # One concrete configuration
  $ varpp mm.c --mode concrete -D CONFIG_MMU -D CONFIG_SMP

  # Several files in parallel, JSON output
  $ varpp a.c b.c --json > result.json

  # Read from stdin
  $ cat mm.c | varpp -"
)]
#[command(arg_required_else_help = true)]
struct Cli {
    /// Input files (use '-' for stdin)
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Analysis mode
    #[arg(short, long, value_enum)]
    mode: Option<ModeValue>,

    /// Configuration atom known to be defined
    #[arg(short = 'D', long = "define", value_name = "NAME")]
    defined: Vec<String>,

    /// Configuration atom known to be undefined
    #[arg(short = 'U', long = "undefine", value_name = "NAME")]
    undefined: Vec<String>,

    /// Only names with this prefix are configuration atoms
    #[arg(short = 'p', long, value_name = "PREFIX")]
    atom_prefix: Option<String>,

    /// Environment as a JSON file; command-line options are applied on top
    #[cfg(feature = "json")]
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Maximum number of alternatives one macro invocation may expand to
    #[arg(long, value_name = "N")]
    max_variants: Option<usize>,

    /// Output the analysis result as JSON
    #[cfg(feature = "json")]
    #[arg(long)]
    json: bool,

    /// List line blocks with their conditions instead of annotated text
    #[arg(short, long)]
    blocks: bool,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Enable verbose logging
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress warnings
    #[arg(short, long)]
    quiet: bool,
}

/// Analysis mode values for CLI
#[derive(Clone, Copy, Debug, ValueEnum)]
enum ModeValue {
    Symbolic,
    Concrete,
}

impl From<ModeValue> for AnalysisMode {
    fn from(value: ModeValue) -> Self {
        match value {
            ModeValue::Symbolic => AnalysisMode::Symbolic,
            ModeValue::Concrete => AnalysisMode::Concrete,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(&cli);
    if cli.no_color {
        colored::control::set_override(false);
    }

    std::process::exit(match run(&cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {e:#}", "error:".red().bold());
            determine_exit_code(&e)
        }
    });
}

fn init_logging(cli: &Cli) {
    let level = match (cli.quiet, cli.verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(!cli.no_color)
        .init();
}

/// Determine the exit code based on the error
fn determine_exit_code(error: &anyhow::Error) -> i32 {
    if error.downcast_ref::<std::io::Error>().is_some() {
        exit_code::IO_ERROR
    } else {
        exit_code::ANALYSIS_ERROR
    }
}

/// Run the analysis and return the exit code
fn run(cli: &Cli) -> Result<i32> {
    let env = create_environment(cli)?;
    debug!(?env, "analysis environment");
    let units = cli
        .inputs
        .iter()
        .map(|path| read_input(path).map(|source| SourceUnit::new(format_input(path), source)))
        .collect::<Result<Vec<_>>>()?;

    let outcomes = analyze_batch(&units, &env);

    #[cfg(feature = "json")]
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&outcomes)?);
        return Ok(exit_status(&outcomes));
    }

    let multiple = outcomes.len() > 1;
    for outcome in &outcomes {
        match &outcome.result {
            Ok(artifact) => {
                if multiple {
                    println!("{}", format!("==> {} <==", outcome.file).bold());
                }
                if cli.blocks {
                    print_blocks(artifact);
                } else {
                    print_annotated(artifact);
                }
                if !cli.quiet {
                    for diagnostic in &artifact.diagnostics {
                        eprintln!("{} {}: {diagnostic}", "warning:".yellow().bold(), outcome.file);
                    }
                }
            }
            Err(e) => eprintln!("{} {}: {e}", "error:".red().bold(), outcome.file),
        }
    }
    Ok(exit_status(&outcomes))
}

fn exit_status(outcomes: &[UnitOutcome]) -> i32 {
    if outcomes.iter().any(|o| o.result.is_err()) {
        exit_code::ANALYSIS_ERROR
    } else if outcomes
        .iter()
        .any(|o| o.result.as_ref().is_ok_and(|a| !a.diagnostics.is_empty()))
    {
        exit_code::WARNINGS
    } else {
        exit_code::SUCCESS
    }
}

/// Build the analysis environment from the config file and CLI arguments
fn create_environment(cli: &Cli) -> Result<ConfigEnvironment> {
    #[cfg(feature = "json")]
    let mut env = match &cli.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("Invalid config file: {}", path.display()))?
        }
        None => ConfigEnvironment::default(),
    };
    #[cfg(not(feature = "json"))]
    let mut env = ConfigEnvironment::default();

    if let Some(mode) = cli.mode {
        env.mode = mode.into();
    }
    if let Some(max) = cli.max_variants {
        if max == 0 {
            bail!("--max-variants must be greater than 0");
        }
        env = env.with_max_variants(max);
    }
    if let Some(prefix) = &cli.atom_prefix {
        env = env.with_atom_prefix(prefix.clone());
    }
    for name in cli.defined.iter().chain(&cli.undefined) {
        if !is_identifier(name) {
            bail!("not a macro name: {name}");
        }
    }
    Ok(env
        .with_defined(cli.defined.iter().cloned())
        .with_undefined(cli.undefined.iter().cloned()))
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c == '_' || c.is_ascii_alphabetic())
        && chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}

/// Read input from file or stdin
fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        use std::io::Read;
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read from stdin")?;
        Ok(buffer)
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read input file: {}", path.display()))
    }
}

fn print_annotated(artifact: &Artifact) {
    for block in artifact.blocks() {
        println!("{}", format!("//@ {}", block.condition).cyan());
        println!("{}", block.text);
    }
}

fn print_blocks(artifact: &Artifact) {
    for block in artifact.blocks() {
        let lines = if block.first_line == block.last_line {
            block.first_line.to_string()
        } else {
            format!("{}-{}", block.first_line, block.last_line)
        };
        println!("{:>9}  {}", lines.dimmed(), block.condition.to_string().cyan());
    }
}

/// Format input path for display
fn format_input(path: &Path) -> String {
    if path == Path::new("-") {
        "stdin".to_string()
    } else {
        path.display().to_string()
    }
}
