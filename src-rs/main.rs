use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::error::ErrorKind;
use clap::{ArgAction, Parser};
use rastreio::capture::{self, CaptureDiagnostic, CaptureOptions};
use rastreio::{ClassificationResult, Classifier, ClassifierConfig, Policy, Rule, Snapshot};
use serde_json::{json, Value};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(
    name = "rastreio",
    version,
    about = "Classify the current shipment status shown on a rendered tracking page"
)]
struct Cli {
    /// Tracking code or full tracking URL
    target: Option<String>,
    /// Classify a stored snapshot JSON file (or - for stdin) instead of capturing
    #[arg(long)]
    snapshot: Option<String>,
    /// Write the captured snapshot JSON to this path
    #[arg(long)]
    snapshot_out: Option<PathBuf>,
    /// Arbitration order between the date and color signals
    #[arg(long, value_enum)]
    policy: Option<Policy>,
    /// Classifier config JSON (policy + traversal limits)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Capture timeout in seconds (minimum 10)
    #[arg(long, default_value_t = 90)]
    timeout: u64,
    /// Capture attempts before giving up (at least 1)
    #[arg(long, default_value_t = 2)]
    attempts: u32,
    /// Node.js executable used for capture (default: RASTREIO_NODE_BIN or node)
    #[arg(long)]
    node_bin: Option<String>,
    /// Print the result as JSON
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,
}

#[derive(Debug)]
struct Report {
    result: ClassificationResult,
    policy: Policy,
    url: Option<String>,
    capture: Option<CaptureDiagnostic>,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            err.exit()
        }
        Err(err) => {
            eprint!("{err}");
            println!("{}", rastreio::StatusLabel::Unknown.token());
            return;
        }
    };

    // Failures degrade to "unknown"; the exit status is always 0.
    let payload = match run(&cli) {
        Ok(report) => report_value(&report),
        Err(err) => {
            log::warn!("classification degraded to unknown: {err:#}");
            json!({
                "status": rastreio::StatusLabel::Unknown.token(),
                "label": rastreio::StatusLabel::Unknown,
                "rule": Value::Null,
                "error": format!("{err:#}"),
                "classified_at": Utc::now().to_rfc3339(),
            })
        }
    };

    if cli.json {
        println!("{payload}");
    } else {
        println!(
            "{}",
            payload
                .get("status")
                .and_then(Value::as_str)
                .unwrap_or(rastreio::StatusLabel::Unknown.token())
        );
    }
}

fn run(cli: &Cli) -> Result<Report> {
    let mut config = match cli.config.as_deref() {
        Some(path) => ClassifierConfig::load(path)?,
        None => ClassifierConfig::default(),
    };
    if let Some(policy) = cli.policy {
        config.policy = policy;
    }

    let (raw, url, capture) = match cli.snapshot.as_deref() {
        Some(path) => (read_snapshot(path)?, None, None),
        None => {
            let Some(target) = cli.target.as_deref() else {
                bail!("specify a tracking code, URL or --snapshot");
            };
            let url = capture::tracking_url(target)?;
            let Some(node_bin) = capture::resolve_node_executable(cli.node_bin.as_deref()) else {
                bail!("node executable not found (set --node-bin or RASTREIO_NODE_BIN)");
            };
            let options = CaptureOptions {
                node_bin,
                timeout: Duration::from_secs(cli.timeout.max(10)),
                attempts: cli.attempts.max(1),
                backoff_ms: 500,
            };
            log::info!("capturing {url}");
            let (raw, diag) = capture::capture_snapshot(&url, &options);
            let Some(raw) = raw else {
                bail!(
                    "capture failed: {}",
                    diag.message
                        .or(diag.error_code)
                        .unwrap_or_else(|| "no output".to_string())
                );
            };
            (raw, Some(url), Some(diag))
        }
    };

    if let Some(out) = cli.snapshot_out.as_deref() {
        write_text_file(out, &raw)?;
    }

    let snapshot = Snapshot::from_json_str(&raw)?;
    log::debug!("snapshot has {} nodes", snapshot.len());
    let classifier = Classifier::new(config);
    let result = classifier.classify(&snapshot);

    Ok(Report {
        result,
        policy: config.policy,
        url,
        capture,
    })
}

fn read_snapshot(path: &str) -> Result<String> {
    if path == "-" {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read snapshot from stdin")?;
        return Ok(buf);
    }
    fs::read_to_string(path).with_context(|| format!("failed to read snapshot file: {path}"))
}

fn write_text_file(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create parent directory: {}", parent.display())
            })?;
        }
    }
    fs::write(path, content).with_context(|| format!("failed to write: {}", path.display()))
}

fn report_value(report: &Report) -> Value {
    let result = &report.result;
    json!({
        "status": result.label.token(),
        "label": result.label,
        "rule": result.rule,
        "ambiguous": result.rule == Rule::Ambiguous,
        "candidate_count": result.candidate_count,
        "winner": result.winner,
        "policy": report.policy,
        "url": report.url,
        "capture": report.capture,
        "classified_at": Utc::now().to_rfc3339(),
    })
}
