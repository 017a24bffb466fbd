//! Command-line front end over [`reconcile_core::reconcile`].
//!
//! Reads two JSON arrays of already-projected `{name, sku, qty}` rows and
//! prints the reconcile result as JSON. Spreadsheet decoding, header
//! detection, and HTTP transport are deliberately out of scope here — this
//! binary exists only to drive the core against files a caller has already
//! turned into rows.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use reconcile_core::{reconcile, Options, Row};

/// Reconciles two JSON row files against each other.
#[derive(Parser, Debug)]
#[command(name = "reconcile-cli", version, about, long_about = None)]
struct Cli {
    /// Path to the JSON array of A-side rows.
    rows_a: PathBuf,

    /// Path to the JSON array of B-side rows.
    rows_b: PathBuf,

    /// Disable the normalization pipeline entirely (raw string equality only).
    #[arg(long)]
    no_normalization: bool,

    /// Disable token-sort (word-bag) comparison inside the normalizer.
    #[arg(long)]
    no_token_sort: bool,

    /// Strip recognized unit tokens from normalized names.
    #[arg(long)]
    strip_units: bool,

    /// Disable Cyrillic/Latin lookalike and synonym unification.
    #[arg(long)]
    no_unify: bool,

    /// Disable lowercasing during normalization.
    #[arg(long)]
    no_lowercase: bool,

    /// Disable the fuzzy (trigram + Damerau-Levenshtein) tier entirely.
    #[arg(long)]
    no_fuzzy: bool,

    /// Only match rows whose normalized names are already identical
    /// (skips the fuzzy tier regardless of `--no-fuzzy`).
    #[arg(long)]
    strict_after_norm: bool,

    /// Minimum similarity score for a fuzzy match to be accepted.
    #[arg(long, default_value_t = Options::default().threshold)]
    threshold: f64,

    /// Pretty-print the JSON result.
    #[arg(long)]
    pretty: bool,
}

impl Cli {
    fn options(&self) -> Options {
        Options {
            normalization: !self.no_normalization,
            token_sort: !self.no_token_sort,
            strip_units: self.strip_units,
            unify: !self.no_unify,
            lowercase: !self.no_lowercase,
            enable_fuzzy: !self.no_fuzzy,
            strict_after_norm: self.strict_after_norm,
            threshold: self.threshold,
        }
    }
}

fn load_rows(path: &PathBuf) -> Result<Vec<Row>> {
    let raw = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {} as a JSON row array", path.display()))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let opt = cli.options();

    let rows_a = load_rows(&cli.rows_a)?;
    let rows_b = load_rows(&cli.rows_b)?;

    tracing::info!(a = rows_a.len(), b = rows_b.len(), threshold = opt.threshold, "reconciling");

    let result = reconcile(rows_a, rows_b, opt, None).context("reconcile failed")?;

    let out = if cli.pretty {
        serde_json::to_string_pretty(&result)?
    } else {
        serde_json::to_string(&result)?
    };
    println!("{out}");

    Ok(())
}
