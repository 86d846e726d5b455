use anyhow::{bail, Context, Result};
use clap::Parser;
use comfy_table::Table as DisplayTable;
use isadconv::{config::ModelConfig, convert::Converter, export, model::HfEndpoint};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use std::io::{BufRead, IsTerminal, Write};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Convert tabular archive descriptions to ISAD(G) CSV/Excel",
    long_about = None
)]
struct Cli {
    /// Input CSV: first line is an ignored banner, second line is the header
    input: PathBuf,

    /// Output base path; writes <base>.csv and <base>.xlsx
    #[arg(short, long, default_value = "resultados/salida_isad")]
    output: PathBuf,

    /// Hugging Face API token; prompted for interactively when absent
    #[arg(long, env = "HF_API_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Model repository id on the inference service
    #[arg(long, default_value = "mistralai/Mixtral-8x7B-Instruct-v0.1")]
    model: String,

    /// Inference endpoint base URL
    #[arg(long, default_value = "https://api-inference.huggingface.co/models")]
    endpoint: String,

    /// Per-call timeout in seconds; waits indefinitely when omitted
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Rows shown in the post-run preview
    #[arg(long, default_value_t = 5)]
    preview_rows: usize,
}

fn main() -> Result<()> {
    // ─── 1) env + logging ────────────────────────────────────────────
    dotenvy::dotenv().ok();
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder().with_env_filter(env).init();

    let cli = Cli::parse();

    // ─── 2) model client ─────────────────────────────────────────────
    let token = resolve_token(cli.token);
    if token.is_none() {
        warn!("no API token; dates and titles will use deterministic fallbacks only");
    }
    let config = ModelConfig {
        endpoint: cli.endpoint,
        repo_id: cli.model,
        api_token: token,
        timeout: cli.timeout_secs.map(Duration::from_secs),
        ..ModelConfig::default()
    };
    let endpoint = HfEndpoint::new(config)?;
    let converter = Converter::new(endpoint);

    // ─── 3) convert ──────────────────────────────────────────────────
    info!(input = %cli.input.display(), output = %cli.output.display(), "starting conversion");
    if !converter.process(&cli.input, &cli.output) {
        bail!("processing failed; no output files were produced");
    }

    // ─── 4) preview ──────────────────────────────────────────────────
    if cli.preview_rows > 0 {
        print_preview(&export::csv_path(&cli.output), cli.preview_rows)?;
    }
    println!("CSV:   {}", export::csv_path(&cli.output).display());
    println!("Excel: {}", export::xlsx_path(&cli.output).display());
    Ok(())
}

/// Token from flag/env, else one interactive prompt when attached to a
/// terminal. Blank answer (or no terminal) runs with the model disabled.
fn resolve_token(from_cli: Option<String>) -> Option<String> {
    if let Some(token) = from_cli {
        return Some(token);
    }
    if !std::io::stdin().is_terminal() {
        return None;
    }
    eprint!("Hugging Face API token (blank to run without the model): ");
    std::io::stderr().flush().ok();
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line).ok()?;
    let token = line.trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

/// Print the first `limit` rows of the converted CSV.
fn print_preview(csv_path: &std::path::Path, limit: usize) -> Result<()> {
    let mut rdr = csv::Reader::from_path(csv_path)
        .with_context(|| format!("reading back {csv_path:?} for preview"))?;

    let headers: Vec<String> = rdr
        .headers()
        .context("reading preview header")?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_string())
        .collect();

    let mut table = DisplayTable::new();
    table.set_header(headers);
    for record in rdr.records().take(limit) {
        let record = record.context("reading preview row")?;
        table.add_row(record.iter().collect::<Vec<_>>());
    }
    println!("{table}");
    Ok(())
}
