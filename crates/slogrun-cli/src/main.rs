// crates/slogrun-cli/src/main.rs

#![forbid(unsafe_code)]
#![deny(
    rust_2018_idioms,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo
)]

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use slogrun_core::{
    io_jsonl::open_slog, Category, ClassifierConfig, DirSink, RunTracker, TrackerStats,
};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(
    name = "slogrun",
    about = "Label (and optionally extract) runs in a cosmic-swingset slog",
    long_about = "Label (and optionally extract) runs in a cosmic-swingset slog.\n\nEach run is printed as `category,bBLOCK-rRUN,computrons,elapsed` on stdout. Diagnostics go to stderr.",
    version = env!("CARGO_PKG_VERSION"),
    disable_help_subcommand = true
)]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Classify every run in a slog and print one summary line per run.
    Classify {
        /// Slog to read (line-delimited JSON); stdin if omitted or `-`
        #[arg(long)]
        input: Option<PathBuf>,

        /// TOML file overriding the timer/bundle signatures
        #[arg(long)]
        config: Option<PathBuf>,

        /// Directory receiving extracted runs, one file per run
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,

        /// Replace extracted files that already exist instead of failing
        #[arg(long, default_value_t = false)]
        overwrite: bool,

        /// Write vbank address frequencies (`address count` per line) here
        #[arg(long)]
        addresses: Option<PathBuf>,

        /// Categories whose raw run lines should be extracted
        #[arg(value_name = "CATEGORY")]
        extract: Vec<String>,
    },

    /// Write a deterministic synthetic slog (for testing and benchmarking)
    Simulate {
        /// Number of regular blocks after the bootstrap block
        #[arg(long, default_value_t = 100, value_parser = clap::value_parser!(u32).range(1..))]
        blocks: u32,

        /// RNG seed
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Output slog path
        #[arg(long, default_value = "synthetic.slog")]
        out: PathBuf,
    },
}

fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    match cli.cmd {
        Cmd::Classify {
            input,
            config,
            out_dir,
            overwrite,
            addresses,
            extract,
        } => classify(
            input.as_deref(),
            config.as_deref(),
            out_dir,
            overwrite,
            addresses.as_deref(),
            extract,
        ),

        Cmd::Simulate { blocks, seed, out } => simulate(blocks, seed, &out),
    }
}

/// Initialize tracing with an env-driven filter (default INFO), on stderr.
fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = fmt::layer()
        .with_writer(io::stderr)
        .with_target(false)
        .with_level(true)
        .compact();

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init();
}

/// Ensure the parent directory for a file exists.
fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating parent directory {}", dir.display()))?;
        }
    }
    Ok(())
}

fn classify(
    input: Option<&Path>,
    config: Option<&Path>,
    out_dir: PathBuf,
    overwrite: bool,
    addresses: Option<&Path>,
    extract: Vec<String>,
) -> Result<()> {
    let config = match config {
        Some(p) => ClassifierConfig::load(p)?,
        None => ClassifierConfig::default(),
    };
    for name in &extract {
        if let Ok(Category::Passthrough(_)) = name.parse::<Category>() {
            warn!(category = %name, "not a known category; it can only match a passthrough bridge source");
        }
    }
    info!(
        input = %input.map_or_else(|| "<stdin>".into(), |p| p.display().to_string()),
        out_dir = %out_dir.display(),
        ?extract,
        "classifying runs"
    );

    let lines = open_slog(input)?;
    let mut tracker = RunTracker::new(config, extract, DirSink::new(out_dir, overwrite));
    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());

    let outcome = (|| -> Result<()> {
        for line in lines {
            let line = line?;
            if let Some(summary) = tracker.ingest(&line)? {
                writeln!(out, "{summary}").context("write summary")?;
            }
        }
        Ok(())
    })();
    // Summaries printed before a failure are still useful.
    out.flush().context("flush stdout")?;
    outcome?;

    let (_, tally, stats) = tracker.into_parts();
    report(&stats);

    if let Some(path) = addresses {
        ensure_parent_dir(path)?;
        let f = File::create(path).with_context(|| format!("create {}", path.display()))?;
        tally
            .write_to(BufWriter::new(f))
            .with_context(|| format!("writing addresses to {}", path.display()))?;
        info!(path = %path.display(), distinct = tally.len(), "wrote vbank address tally");
    }
    Ok(())
}

fn report(stats: &TrackerStats) {
    info!(
        lines = stats.lines,
        runs = stats.runs_finished,
        summarized = stats.runs_summarized(),
        extracted = stats.runs_extracted,
        replay_skipped = stats.replay_skipped,
        preamble_skipped = stats.preamble_skipped,
        abandoned = stats.runs_abandoned,
        orphan_finishes = stats.orphan_finishes,
        "done"
    );
    for (category, n) in &stats.categories {
        info!("{n:>9} {category}");
    }
}

fn simulate(blocks: u32, seed: u64, out: &Path) -> Result<()> {
    use slogrun_synth::generator::generate_slog;

    info!(blocks, seed, "generating synthetic slog");
    let slog = generate_slog(blocks, seed);

    ensure_parent_dir(out)?;
    slog.write_to(out)
        .with_context(|| format!("writing synthetic slog to {}", out.display()))?;

    println!(
        "Simulated {} blocks → {} lines, {} runs → {}",
        blocks,
        slog.lines.len(),
        slog.expected.len(),
        out.display()
    );
    Ok(())
}
