//! Flight recorder operator CLI.
//!
//! Appends agent decisions to the hash-chained log, shows the most recent
//! entries, and audits the whole chain.  `verify` exits non-zero when the
//! log is corrupted, so it can run from CI or a cron-driven alert.
//!
//! Usage:
//!   flightrec append --agent ARQUITETO --intent "review PR" --trust-score 9 --result approved
//!   flightrec recent --limit 20
//!   flightrec verify --json
//!   flightrec head
//!
//! Exit status: 0 on success, 1 when `verify` finds corruption, 2 on any
//! operational error (bad config, unreadable log, rejected append).

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use flightrec_audit::{query, verify_file, FileAppender, RecentQuery};
use flightrec_config::FlightConfig;
use flightrec_contracts::{
    action::AppendRequest,
    entry::{timestamp, GENESIS_HASH},
    error::{FlightError, FlightResult},
    verify::{FindingKind, VerifyReport},
};

/// `verify` found no integrity problems, or any other command succeeded.
const EXIT_OK: i32 = 0;
/// `verify` found at least one corrupted line.
const EXIT_CORRUPTED: i32 = 1;
/// Bad configuration, unreadable log, rejected append.
const EXIT_ERROR: i32 = 2;

// ── CLI definition ────────────────────────────────────────────────────────────

/// Agent flight recorder: a tamper-evident log of AI-agent decisions.
#[derive(Parser)]
#[command(
    name = "flightrec",
    version,
    about = "Append to, read, and audit the agent flight recorder log",
    long_about = "Every agent decision is stored as one JSON line linked to the previous\n\
                  line by its SHA-256 hash. `verify` replays the chain and reports any\n\
                  record that was edited, removed, or reordered after the fact."
)]
struct Cli {
    /// TOML configuration file.
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log file to operate on (overrides `log.path` from the config).
    #[arg(long, global = true, value_name = "FILE")]
    log: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Record one agent decision.
    Append {
        #[arg(long)]
        agent: String,
        #[arg(long)]
        intent: String,
        #[arg(long)]
        tool: Option<String>,
        /// Trust score in [0, 10].
        #[arg(long, allow_negative_numbers = true)]
        trust_score: f64,
        #[arg(long)]
        result: Option<String>,
        #[arg(long)]
        verification: Option<String>,
    },
    /// Show the most recent entries, newest first.
    Recent {
        /// At most this many entries (capped at 100).
        #[arg(long)]
        limit: Option<usize>,
        /// Only entries from this agent.
        #[arg(long)]
        agent: Option<String>,
        /// Only entries at or after this RFC 3339 instant.
        #[arg(long)]
        since: Option<DateTime<Utc>>,
        /// Print JSON instead of one line per entry.
        #[arg(long)]
        json: bool,
    },
    /// Replay the whole chain and report every integrity finding.
    Verify {
        /// Print the full report as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Print the hash of the last entry (the genesis value when empty).
    Head,
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() {
    // Initialize structured logging.  Set RUST_LOG=debug for verbose output.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let cli = Cli::parse();
    std::process::exit(exit_code(run(cli)));
}

fn exit_code(outcome: FlightResult<i32>) -> i32 {
    match outcome {
        Ok(code) => code,
        Err(e) => {
            eprintln!("flightrec: {}", e);
            EXIT_ERROR
        }
    }
}

fn run(cli: Cli) -> FlightResult<i32> {
    let mut config = match &cli.config {
        Some(path) => FlightConfig::from_file(path)?,
        None => FlightConfig::default(),
    };
    if let Some(log) = cli.log {
        config.log.path = log;
    }
    debug!(log = %config.log.path.display(), "configuration resolved");

    match cli.command {
        Command::Append {
            agent,
            intent,
            tool,
            trust_score,
            result,
            verification,
        } => append(
            &config,
            AppendRequest {
                agent,
                intent,
                tool,
                trust_score,
                result,
                verification,
            },
        ),
        Command::Recent {
            limit,
            agent,
            since,
            json,
        } => recent(
            &config,
            RecentQuery {
                limit: Some(limit.unwrap_or(config.reader.default_limit)),
                agent,
                since,
            },
            json,
        ),
        Command::Verify { json } => verify(&config, json),
        Command::Head => head(&config),
    }
}

// ── Subcommands ───────────────────────────────────────────────────────────────

/// One-shot append.  Rate limiting (`[ingress]`) only means something in a
/// long-lived host that keeps an `IngressGate` across requests, so it is not
/// applied here.
fn append(config: &FlightConfig, request: AppendRequest) -> FlightResult<i32> {
    let action = request.validate()?;
    let appender = FileAppender::new(&config.log.path).with_fsync(config.log.fsync);

    let entry = appender.append(action)?;
    println!("{}", to_json(&entry)?);
    Ok(EXIT_OK)
}

fn recent(config: &FlightConfig, q: RecentQuery, json: bool) -> FlightResult<i32> {
    let entries = query(&config.log.path, &q)?;

    if json {
        println!("{}", to_json(&entries)?);
        return Ok(EXIT_OK);
    }

    if entries.is_empty() {
        println!("No entries in {}", config.log.path.display());
    }
    for entry in &entries {
        println!("{} {}", timestamp::format(&entry.timestamp), entry.summary());
    }
    Ok(EXIT_OK)
}

fn verify(config: &FlightConfig, json: bool) -> FlightResult<i32> {
    let report = verify_file(&config.log.path)?;

    if json {
        println!("{}", to_json(&report)?);
    } else {
        print_report(config, &report);
    }

    Ok(if report.is_ok() {
        EXIT_OK
    } else {
        EXIT_CORRUPTED
    })
}

fn head(config: &FlightConfig) -> FlightResult<i32> {
    let appender = FileAppender::new(&config.log.path);
    let head = appender.head()?;
    println!("{}", head.as_deref().unwrap_or(GENESIS_HASH));
    Ok(EXIT_OK)
}

// ── Output ────────────────────────────────────────────────────────────────────

fn print_report(config: &FlightConfig, report: &VerifyReport) {
    println!("Audit log: {}", config.log.path.display());
    println!("{}", report.summary());

    for finding in &report.findings {
        match &finding.kind {
            FindingKind::Unparsable { reason } => {
                println!("  line {}: unparsable record: {}", finding.line, reason);
            }
            FindingKind::PrevHashMismatch { expected, actual } => {
                println!(
                    "  line {}: broken link: _prevHash {} does not match previous _hash {}",
                    finding.line, actual, expected
                );
            }
            FindingKind::HashMismatch { expected, actual } => {
                println!(
                    "  line {}: content modified: stored _hash {} but content hashes to {}",
                    finding.line, actual, expected
                );
            }
        }
    }

    if report.pending_tail {
        println!("  note: last line is an incomplete write and was not checked");
    }
}

fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> FlightResult<String> {
    serde_json::to_string_pretty(value).map_err(|e| FlightError::LogReadFailed {
        reason: format!("failed to render JSON: {}", e),
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
