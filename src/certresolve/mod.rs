// src/certresolve/mod.rs
//! Resolve certificate names and report hosts that look out of place.

pub mod classifier;

pub use classifier::{Finding, classify};

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::certificate::Certificate;
use crate::output::OutputManager;
use crate::resolver::{HostEntry, Lookup, ResolveResult, ResolverPool};
use crate::stats::StatsCollector;

/// Feeds certificate names through a [`ResolverPool`] and reports findings.
pub struct CertResolver {
    tasks: mpsc::Sender<HostEntry>,
    consumer: JoinHandle<()>,
    coordinator: JoinHandle<()>,
    stats: StatsCollector,
}

/// Counts from one ingestion stream
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IngestSummary {
    pub certificates: u64,
    pub skipped_lines: u64,
}

impl CertResolver {
    /// Start the pool and the result consumer.
    pub fn new(
        lookup: Arc<dyn Lookup>,
        workers: usize,
        output: Arc<OutputManager>,
        stats: StatsCollector,
    ) -> Self {
        let (tasks, results, coordinator) = ResolverPool::new(lookup, workers).into_parts();

        let consumer = tokio::spawn(consume_results(results, output, stats.clone()));

        Self {
            tasks,
            consumer,
            coordinator,
            stats,
        }
    }

    /// Queue every name of `cert`; returns how many were queued.
    pub async fn submit(&self, cert: Arc<Certificate>) -> Result<usize> {
        let entries = HostEntry::from_certificate(&cert);
        let count = entries.len();

        for entry in entries {
            self.tasks
                .send(entry)
                .await
                .map_err(|_| anyhow::anyhow!("resolver pool stopped accepting tasks"))?;
            self.stats.increment_hosts_submitted();
        }

        Ok(count)
    }

    /// Queue the names of every certificate in a newline-delimited JSON stream.
    ///
    /// Lines that do not decode as a certificate are skipped.
    pub async fn ingest<R>(&self, reader: R) -> Result<IngestSummary>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut summary = IngestSummary::default();
        let mut lines = reader.lines();
        let mut line_no = 0u64;

        while let Some(line) = lines.next_line().await.context("failed to read input")? {
            line_no += 1;
            if line.trim().is_empty() {
                continue;
            }

            let cert: Certificate = match serde_json::from_str(&line) {
                Ok(cert) => cert,
                Err(e) => {
                    debug!("Skipping malformed line {}: {}", line_no, e);
                    summary.skipped_lines += 1;
                    self.stats.increment_lines_skipped();
                    continue;
                }
            };

            summary.certificates += 1;
            self.stats.add_certificates(1);
            self.submit(Arc::new(cert)).await?;
        }

        info!(
            "Read {} certificates ({} malformed lines skipped)",
            summary.certificates, summary.skipped_lines
        );

        Ok(summary)
    }

    /// Close submission and wait until every result has been reported.
    pub async fn finish(self) -> Result<()> {
        drop(self.tasks);
        self.coordinator
            .await
            .context("resolver pool coordinator failed")?;
        self.consumer.await.context("result consumer failed")?;
        Ok(())
    }
}

async fn consume_results(
    mut results: mpsc::Receiver<ResolveResult>,
    output: Arc<OutputManager>,
    stats: StatsCollector,
) {
    while let Some(result) = results.recv().await {
        stats.increment_results();

        let Some(finding) = classify(&result) else {
            continue;
        };

        report(&finding, &stats);

        if let Err(e) = output.emit_finding(&finding).await {
            warn!("Failed to write finding for {}: {:?}", finding.host(), e);
        }
    }

    if let Err(e) = output.flush().await {
        warn!("Failed to flush output: {:?}", e);
    }
}

fn report(finding: &Finding, stats: &StatsCollector) {
    match finding {
        Finding::PossibleOriginBypass {
            host,
            resolved_ips,
            source_ip,
            ..
        } => {
            stats.increment_origin_bypasses();
            info!(
                host = %host,
                resolved_ips = ?resolved_ips,
                source_ip = %source_ip,
                "Possible Origin Bypass"
            );
        }
        Finding::PossibleInternalHost { host, source, .. } => {
            stats.increment_internal_hosts();
            warn!(host = %host, source = %source, "Possible Internal Host");
        }
    }
}
