// src/main.rs
use anyhow::Context;
use certsio::certresolve::CertResolver;
use certsio::cli::{Cli, Command, OutputFormat, ResolveArgs, SearchArgs};
use certsio::config::{Config, ResolverConfig};
use certsio::interrupt;
use certsio::output::{OutputHandler, OutputManager, human, json};
use certsio::progress::ProgressIndicator;
use certsio::resolver::{HickoryLookup, Lookup};
use certsio::search::{Client, Query};
use certsio::stats::StatsCollector;
use clap::Parser;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::BufReader;
use tokio::sync::{mpsc, watch};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    cli.validate()?;

    let config_path = match cli.config {
        Some(ref path) => PathBuf::from(path),
        None => Config::default_path()?,
    };

    let config = match cli.command {
        Command::Search(_) => {
            let config = Config::load_or_create(&config_path)?;
            config.validate_search()?;
            config
        }
        // Resolution needs no API key, so a missing file just means defaults
        Command::Resolve(_) if !config_path.exists() => Config::default(),
        Command::Resolve(_) => Config::from_file(&config_path)
            .with_context(|| format!("couldn't read config file {}", config_path.display()))?,
    };
    config.validate_resolver()?;

    let log_level = cli.log_level().unwrap_or(config.logging.level.as_str());
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!("Loaded config from {}", config_path.display());

    let output = Arc::new(build_output(&cli)?);
    let stats = StatsCollector::new();
    let progress = ProgressIndicator::new(
        cli.should_show_progress() && is_terminal::is_terminal(std::io::stderr()),
    );
    let ticker = progress.follow(stats.clone(), Duration::from_millis(250));

    let workers = cli.workers.unwrap_or(config.resolver.workers);

    let result = match cli.command {
        Command::Search(ref args) => {
            run_search(args, &config, workers, Arc::clone(&output), stats.clone()).await
        }
        Command::Resolve(ref args) => {
            run_resolve(args, &config, workers, Arc::clone(&output), stats.clone()).await
        }
    };

    if let Some(handle) = ticker {
        handle.abort();
    }
    progress.finish();
    output.flush().await?;

    if cli.stats {
        let snapshot = stats.snapshot();
        eprintln!("\nFinal Statistics:");
        eprintln!(
            "  Pages fetched: {}",
            StatsCollector::format_pages(snapshot.pages, snapshot.total_pages)
        );
        eprintln!("  Certificates: {}", snapshot.certificates);
        eprintln!("  Hosts resolved: {}/{}", snapshot.results, snapshot.hosts_submitted);
        eprintln!("  Hosts without addresses: {}", snapshot.hosts_dropped());
        eprintln!("  Possible origin bypasses: {}", snapshot.origin_bypasses);
        eprintln!("  Possible internal hosts: {}", snapshot.internal_hosts);
        if snapshot.lines_skipped > 0 {
            eprintln!("  Malformed input lines: {}", snapshot.lines_skipped);
        }
        eprintln!("  Elapsed: {}", StatsCollector::format_uptime(snapshot.uptime_secs));
    }

    result
}

fn build_output(cli: &Cli) -> anyhow::Result<OutputManager> {
    let mut manager = OutputManager::new();

    let handler: Arc<dyn OutputHandler> = match (cli.format, cli.output.as_deref()) {
        (OutputFormat::Json, None) => Arc::new(json::JsonOutput::new()),
        (OutputFormat::Json, Some(path)) => Arc::new(json::JsonOutput::to_file(open_append(path)?)),
        (OutputFormat::Human, None) => Arc::new(human::HumanOutput::new()),
        (OutputFormat::Human, Some(path)) => Arc::new(human::HumanOutput::to_file(open_append(path)?)),
    };
    manager.add_handler(handler);

    Ok(manager)
}

fn open_append(path: &str) -> anyhow::Result<std::fs::File> {
    OpenOptions::new()
        .append(true)
        .create(true)
        .open(Path::new(path))
        .with_context(|| format!("couldn't create output file {}", path))
}

fn build_lookup(config: &ResolverConfig) -> anyhow::Result<Arc<dyn Lookup>> {
    let nameservers = HickoryLookup::parse_nameservers(&config.nameservers)?;
    let lookup = HickoryLookup::new(
        &nameservers,
        config.attempts,
        Duration::from_secs(config.timeout_secs),
    )?;
    Ok(Arc::new(lookup))
}

async fn run_search(
    args: &SearchArgs,
    config: &Config,
    workers: usize,
    output: Arc<OutputManager>,
    stats: StatsCollector,
) -> anyhow::Result<()> {
    let client = Client::new(config.api_key.clone())?
        .with_base_url(config.base_url.clone())
        .with_max_pages(args.max_pages.unwrap_or(config.search.max_pages))
        .with_stats(stats.clone())
        .with_timeout(Duration::from_secs(config.search.timeout_secs))?
        .with_retries(config.search.max_retries)?;

    let resolver = if args.resolve {
        let lookup = build_lookup(&config.resolver)?;
        Some(CertResolver::new(lookup, workers, Arc::clone(&output), stats.clone()))
    } else {
        None
    };

    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        match interrupt::wait_for_second_interrupt(tokio::signal::ctrl_c, cancel_tx).await {
            Ok(()) => std::process::exit(130),
            Err(e) => tracing::warn!("Failed to listen for Ctrl-C: {}", e),
        }
    });

    tracing::info!("Searching certificates by {} for {:?}", args.field, args.value);

    let (page_tx, mut page_rx) = mpsc::channel(1);
    let query = Query::new(args.field, args.value.clone());
    let producer = tokio::spawn(async move { client.stream(query, page_tx, cancel_rx).await });

    let mut submit_error = None;
    while let Some(page) = page_rx.recv().await {
        stats.increment_pages();
        stats.add_certificates(page.len() as u64);

        for cert in page {
            if let Err(e) = output.emit_certificate(&cert).await {
                tracing::warn!("Failed to write certificate {}: {:?}", cert.fingerprint_sha256, e);
            }
            if submit_error.is_some() {
                continue;
            }
            if let Some(ref resolver) = resolver {
                if let Err(e) = resolver.submit(Arc::new(cert)).await {
                    submit_error = Some(e);
                }
            }
        }
    }

    let searched = producer.await.context("search task failed")?;

    // Drain the pool even when the search failed so no finding is lost
    if let Some(resolver) = resolver {
        resolver.finish().await?;
    }

    if let Some(e) = submit_error {
        return Err(e);
    }
    searched?;
    Ok(())
}

async fn run_resolve(
    args: &ResolveArgs,
    config: &Config,
    workers: usize,
    output: Arc<OutputManager>,
    stats: StatsCollector,
) -> anyhow::Result<()> {
    let lookup = build_lookup(&config.resolver)?;
    let resolver = CertResolver::new(lookup, workers, output, stats);

    let ingested = if args.input == "-" {
        resolver.ingest(BufReader::new(tokio::io::stdin())).await
    } else {
        match tokio::fs::File::open(&args.input).await {
            Ok(file) => resolver.ingest(BufReader::new(file)).await,
            Err(e) => Err(anyhow::Error::new(e).context(format!("couldn't open input file {}", args.input))),
        }
    };

    resolver.finish().await?;
    ingested?;
    Ok(())
}
