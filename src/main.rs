//! asnmap - map IPs, ASNs, organizations and domains to ASN ranges.
//!
//! This is the command-line interface for the asnmap library.

use anyhow::{Context, Result};
use asnmap::asn::AsnmapClient;
use asnmap::config::defaults::{DEFAULT_CONCURRENCY, DEFAULT_REQUEST_TIMEOUT_MS};
use asnmap::config::ClientConfig;
use asnmap::dns::{HickoryResolver, Upstream};
use asnmap::output::{Formatter, OutputFormat};
use asnmap::runner::{ChannelSink, Runner, RunnerOptions};
use asnmap::Inputs;
use clap::Parser;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing_subscriber::EnvFilter;

/// Get the version string for asnmap
fn get_version() -> &'static str {
    if cfg!(debug_assertions) {
        concat!(env!("CARGO_PKG_VERSION"), "-UNRELEASED")
    } else {
        env!("CARGO_PKG_VERSION")
    }
}

/// Command-line arguments for the asnmap tool.
#[derive(Parser, Debug)]
#[clap(author, version = get_version(), about = "Map IPs, ASNs, organizations and domains to ASN ranges", long_about = None)]
struct Args {
    /// ASN to look up (e.g. AS14421 or 14421); repeatable or comma-separated
    #[clap(short = 'a', long, value_delimiter = ',')]
    asn: Vec<String>,

    /// IP address to look up; repeatable or comma-separated
    #[clap(short = 'i', long, value_delimiter = ',')]
    ip: Vec<String>,

    /// Domain to resolve and look up; repeatable or comma-separated
    #[clap(short = 'd', long, value_delimiter = ',')]
    domain: Vec<String>,

    /// Organization name to look up; repeatable or comma-separated
    #[clap(short = 'o', long, value_delimiter = ',')]
    org: Vec<String>,

    /// Input of any kind, classified automatically; repeatable or comma-separated
    #[clap(long, value_delimiter = ',')]
    input: Vec<String>,

    /// File with one input of any kind per line
    #[clap(short = 'f', long)]
    file: Option<PathBuf>,

    /// Output results as JSON lines
    #[clap(short = 'j', long, conflicts_with = "csv")]
    json: bool,

    /// Output results as CSV
    #[clap(short = 'c', long)]
    csv: bool,

    /// Include IPv6 ranges in text output
    #[clap(long)]
    v6: bool,

    /// Write results to this file instead of stdout
    #[clap(long)]
    output: Option<PathBuf>,

    /// Maximum number of lookups in flight
    #[clap(long, default_value_t = DEFAULT_CONCURRENCY)]
    concurrency: usize,

    /// Timeout for each lookup request in milliseconds
    #[clap(long = "timeout", value_name = "MS", default_value_t = DEFAULT_REQUEST_TIMEOUT_MS)]
    timeout_ms: u64,

    /// Lookup service URL (defaults to $ASNMAP_SERVER_URL or the public service)
    #[clap(long)]
    server_url: Option<String>,

    /// API key for the lookup service (defaults to $PDCP_API_KEY)
    #[clap(long)]
    api_key: Option<String>,

    /// DNS upstream used to resolve domains
    #[clap(long, value_enum, default_value_t = ResolverArg::Cloudflare)]
    resolver: ResolverArg,

    /// Enable verbose logging (use -vv for debug output)
    #[clap(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all logging
    #[clap(long)]
    silent: bool,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum ResolverArg {
    Cloudflare,
    Google,
    System,
}

impl From<ResolverArg> for Upstream {
    fn from(arg: ResolverArg) -> Self {
        match arg {
            ResolverArg::Cloudflare => Upstream::Cloudflare,
            ResolverArg::Google => Upstream::Google,
            ResolverArg::System => Upstream::System,
        }
    }
}

impl Args {
    fn format(&self) -> OutputFormat {
        if self.json {
            OutputFormat::Json
        } else if self.csv {
            OutputFormat::Csv
        } else {
            OutputFormat::Text
        }
    }
}

fn main() {
    let args = Args::parse();
    init_logging(args.verbose, args.silent);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("Failed to create Tokio runtime");

    if let Err(e) = runtime.block_on(async_main(args)) {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn init_logging(verbose: u8, silent: bool) {
    if silent {
        return;
    }
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn async_main(args: Args) -> Result<()> {
    let inputs = collect_inputs(&args).await?;

    let mut config = ClientConfig::builder()
        .with_env()
        .timeout(Duration::from_millis(args.timeout_ms));
    if let Some(url) = &args.server_url {
        config = config.server_url(url);
    }
    if let Some(key) = &args.api_key {
        config = config.api_key(key);
    }
    let config = config.build().context("invalid client configuration")?;
    if config.api_key.is_none() {
        tracing::warn!("no API key configured; the lookup service may reject requests");
    }

    let client = Arc::new(AsnmapClient::new(config)?);
    let resolver = Arc::new(HickoryResolver::new(args.resolver.into())?);

    let (sink, mut results) = ChannelSink::channel();
    let options = RunnerOptions::builder()
        .inputs(inputs)
        .concurrency(args.concurrency)
        .sink(sink)
        .build()?;
    let runner = Runner::new(options, client, resolver)?;

    let formatter = Formatter::new(args.format(), args.v6);
    let mut out = open_output(args.output.as_deref()).await?;
    let writer = tokio::spawn(async move {
        if let Some(header) = formatter.header() {
            out.write_all(header.as_bytes()).await?;
            out.write_all(b"\n").await?;
        }
        while let Some(batch) = results.recv().await {
            for line in formatter.format_batch(&batch, chrono::Utc::now()) {
                out.write_all(line.as_bytes()).await?;
                out.write_all(b"\n").await?;
            }
        }
        out.flush().await
    });

    let result = runner.run().await;
    runner.close();
    // Dropping the runner drops the sink, which ends the writer loop
    drop(runner);

    writer
        .await
        .context("output writer panicked")?
        .context("failed to write output")?;

    let summary = result?;
    if summary.batches == 0 {
        tracing::info!("no results found");
    }
    Ok(())
}

/// Merge flag inputs with the input file and, when nothing else is given, stdin
async fn collect_inputs(args: &Args) -> Result<Inputs> {
    let mut inputs = Inputs {
        ip: args.ip.clone(),
        asn: args.asn.clone(),
        org: args.org.clone(),
        domain: args.domain.clone(),
    };
    for token in &args.input {
        inputs.push_auto(token);
    }

    if let Some(path) = &args.file {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read input file {}", path.display()))?;
        inputs.extend_from_lines(&text);
    }

    if inputs.is_empty() && !std::io::stdin().is_terminal() {
        let mut text = String::new();
        tokio::io::stdin()
            .read_to_string(&mut text)
            .await
            .context("failed to read stdin")?;
        inputs.extend_from_lines(&text);
    }

    Ok(inputs)
}

async fn open_output(path: Option<&Path>) -> Result<Box<dyn AsyncWrite + Unpin + Send>> {
    match path {
        Some(path) => {
            let file = tokio::fs::File::create(path)
                .await
                .with_context(|| format!("failed to create output file {}", path.display()))?;
            Ok(Box::new(tokio::io::BufWriter::new(file)))
        }
        None => Ok(Box::new(tokio::io::stdout())),
    }
}
