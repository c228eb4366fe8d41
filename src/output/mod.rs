//! Output handling for certsio
//!
//! Certificates and findings are fanned out to every registered handler.

use crate::certificate::Certificate;
use crate::certresolve::Finding;
use async_trait::async_trait;
use std::io::Write;
use std::sync::{Arc, Mutex, MutexGuard};

pub mod human;
pub mod json;

/// Trait for output handlers
#[async_trait]
pub trait OutputHandler: Send + Sync {
    /// Emit a certificate returned by a search
    async fn emit_certificate(&self, cert: &Certificate) -> anyhow::Result<()>;

    /// Emit a finding from name resolution
    async fn emit_finding(&self, finding: &Finding) -> anyhow::Result<()>;

    /// Flush any buffered output
    async fn flush(&self) -> anyhow::Result<()>;
}

/// Manager that dispatches output to multiple handlers
#[derive(Default)]
pub struct OutputManager {
    handlers: Vec<Arc<dyn OutputHandler>>,
}

impl OutputManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_handler(&mut self, handler: Arc<dyn OutputHandler>) {
        self.handlers.push(handler);
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Errors from individual handlers are logged; an error is returned only
    /// when the sole handler fails.
    pub async fn emit_certificate(&self, cert: &Certificate) -> anyhow::Result<()> {
        let mut last_error = None;
        for handler in &self.handlers {
            if let Err(e) = handler.emit_certificate(cert).await {
                tracing::warn!("Output handler error: {}", e);
                last_error = Some(e);
            }
        }
        self.single_failure(last_error)
    }

    pub async fn emit_finding(&self, finding: &Finding) -> anyhow::Result<()> {
        let mut last_error = None;
        for handler in &self.handlers {
            if let Err(e) = handler.emit_finding(finding).await {
                tracing::warn!("Output handler error: {}", e);
                last_error = Some(e);
            }
        }
        self.single_failure(last_error)
    }

    pub async fn flush(&self) -> anyhow::Result<()> {
        for handler in &self.handlers {
            handler.flush().await?;
        }
        Ok(())
    }

    fn single_failure(&self, last_error: Option<anyhow::Error>) -> anyhow::Result<()> {
        match last_error {
            Some(err) if self.handlers.len() == 1 => Err(err),
            _ => Ok(()),
        }
    }
}

/// Shared writer behind the stdout/file handlers
pub(crate) struct SharedWriter(Mutex<Box<dyn Write + Send>>);

impl SharedWriter {
    pub(crate) fn new(writer: Box<dyn Write + Send>) -> Self {
        Self(Mutex::new(writer))
    }

    pub(crate) fn lock(&self) -> anyhow::Result<MutexGuard<'_, Box<dyn Write + Send>>> {
        self.0
            .lock()
            .map_err(|_| anyhow::anyhow!("output writer lock poisoned"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingOutput {
        certificates: AtomicUsize,
        findings: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl OutputHandler for CountingOutput {
        async fn emit_certificate(&self, _cert: &Certificate) -> anyhow::Result<()> {
            self.certificates.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("broken pipe");
            }
            Ok(())
        }

        async fn emit_finding(&self, _finding: &Finding) -> anyhow::Result<()> {
            self.findings.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("broken pipe");
            }
            Ok(())
        }

        async fn flush(&self) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn finding() -> Finding {
        Finding::PossibleInternalHost {
            host: "db.internal".to_string(),
            source: "10.0.0.1:443".to_string(),
            error: "NXDOMAIN".to_string(),
            fingerprint_sha256: String::new(),
        }
    }

    #[tokio::test]
    async fn test_output_manager_no_handlers() {
        let manager = OutputManager::new();
        assert!(manager.is_empty());
        assert!(manager.emit_certificate(&Certificate::default()).await.is_ok());
        assert!(manager.emit_finding(&finding()).await.is_ok());
    }

    #[tokio::test]
    async fn test_output_manager_fans_out() {
        let first = Arc::new(CountingOutput::default());
        let second = Arc::new(CountingOutput::default());
        let mut manager = OutputManager::new();
        manager.add_handler(first.clone());
        manager.add_handler(second.clone());

        manager.emit_certificate(&Certificate::default()).await.unwrap();
        manager.emit_finding(&finding()).await.unwrap();

        assert_eq!(first.certificates.load(Ordering::SeqCst), 1);
        assert_eq!(second.findings.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_single_failing_handler_errors() {
        let mut manager = OutputManager::new();
        manager.add_handler(Arc::new(CountingOutput {
            fail: true,
            ..Default::default()
        }));

        assert!(manager.emit_finding(&finding()).await.is_err());
    }

    #[tokio::test]
    async fn test_one_of_many_failing_is_tolerated() {
        let mut manager = OutputManager::new();
        manager.add_handler(Arc::new(CountingOutput {
            fail: true,
            ..Default::default()
        }));
        manager.add_handler(Arc::new(CountingOutput::default()));

        assert!(manager.emit_certificate(&Certificate::default()).await.is_ok());
    }
}
