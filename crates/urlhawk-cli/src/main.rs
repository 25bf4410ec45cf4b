//! CLI entry point for the urlhawk scanner.
//!
//! Scans one URL (`-u`) or a newline-delimited file of URLs (`-l`) and
//! prints either colored findings or the raw JSON result per URL.

mod render;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use clap::Parser;
use colored::*;
use tracing_subscriber::{fmt, EnvFilter};

use urlhawk_core::{normalize, ScanResult};
use urlhawk_engine::Orchestrator;

#[derive(Parser)]
#[command(name = "urlhawk")]
#[command(about = "A blazing fast URL reconnaissance scanner")]
struct Cli {
    /// Single URL to scan.
    #[arg(short = 'u', long = "url", conflicts_with = "file")]
    url: Option<String>,

    /// File containing URLs to scan, one per line.
    #[arg(short = 'l', long = "file")]
    file: Option<PathBuf>,

    /// Maximum probes in flight per scan (0 = unbounded).
    #[arg(short = 't', long)]
    threads: Option<usize>,

    /// Run only the named probe.
    #[arg(long)]
    probe: Option<String>,

    /// Print the available probes and exit.
    #[arg(long)]
    list: bool,

    /// Emit the raw JSON result per URL instead of colored text.
    #[arg(long)]
    json: bool,

    /// Config file prefix (default: urlhawk).
    #[arg(short, long, default_value = "urlhawk")]
    config: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let cli = Cli::parse();

    let mut config = urlhawk_core::config::load(&cli.config)?;
    if let Some(threads) = cli.threads {
        config.scan.max_concurrent_probes = threads;
    }
    let orchestrator = Orchestrator::from_config(&config)?;

    if cli.list {
        for descriptor in orchestrator.registry().list() {
            println!("{:<18} {}", descriptor.name.cyan(), descriptor.description);
        }
        return Ok(());
    }

    tracing::info!(probes = orchestrator.registry().len(), "Probe registry loaded");

    let urls = match (&cli.url, &cli.file) {
        (Some(url), _) => vec![url.clone()],
        (None, Some(path)) => read_urls(path)?,
        (None, None) => anyhow::bail!("No URLs provided. Provide either -u <url> or -l <file>"),
    };
    if urls.is_empty() {
        anyhow::bail!("No URLs found in input");
    }

    if !cli.json {
        println!("{}", format!("[+] Loaded {} URLs to scan", urls.len()).green());
    }

    // URLs run one after another; concurrency lives inside each scan.
    for url in &urls {
        let result = scan_target(&orchestrator, url, cli.probe.as_deref()).await?;

        if cli.json {
            println!("{}", serde_json::to_string(&result)?);
        } else {
            print!("{}", render::render(&result));
        }
    }

    if !cli.json {
        println!("\n{}", "[+] Scan complete. Hawk is returning to nest.".green());
    }

    Ok(())
}

/// Scan one URL with every probe, or with just `probe` when given.
async fn scan_target(
    orchestrator: &Orchestrator,
    url: &str,
    probe: Option<&str>,
) -> anyhow::Result<ScanResult> {
    let started = std::time::Instant::now();
    tracing::info!(url = %url, probe = probe.unwrap_or("all"), "Scanning target");

    let result = match probe {
        Some(name) => {
            let outcome = orchestrator.run_probe(name, url).await?;
            ScanResult::new(normalize(url), BTreeMap::from([(name.to_string(), outcome)]))
        }
        None => orchestrator.scan(url).await,
    };

    tracing::info!(
        url = %result.url,
        entries = result.len(),
        errors = result.error_count(),
        duration_ms = started.elapsed().as_millis() as u64,
        "Target scanned"
    );
    Ok(result)
}

/// Non-blank, trimmed lines of a URL list file.
fn read_urls(path: &Path) -> anyhow::Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Error opening {}: {e}", path.display()))?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}
