//! JSON Lines (JSONL) output handler

use crate::certificate::Certificate;
use crate::certresolve::Finding;
use crate::output::{OutputHandler, SharedWriter};
use async_trait::async_trait;
use serde::Serialize;
use std::io::{self, Write};

/// Writes one JSON object per line, certificates and findings alike
pub struct JsonOutput {
    writer: SharedWriter,
}

impl JsonOutput {
    /// Create a new JsonOutput that writes to stdout
    pub fn new() -> Self {
        Self::to_writer(Box::new(io::stdout()))
    }

    /// Create a new JsonOutput that writes to a file
    pub fn to_file(file: std::fs::File) -> Self {
        Self::to_writer(Box::new(file))
    }

    pub fn to_writer(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: SharedWriter::new(writer),
        }
    }

    fn write_line<T: Serialize>(&self, value: &T) -> anyhow::Result<()> {
        let json = serde_json::to_string(value)?;
        let mut writer = self.writer.lock()?;
        writeln!(writer, "{}", json)?;
        writer.flush()?;
        Ok(())
    }
}

impl Default for JsonOutput {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OutputHandler for JsonOutput {
    async fn emit_certificate(&self, cert: &Certificate) -> anyhow::Result<()> {
        self.write_line(cert)
    }

    async fn emit_finding(&self, finding: &Finding) -> anyhow::Result<()> {
        self.write_line(finding)
    }

    async fn flush(&self) -> anyhow::Result<()> {
        self.writer.lock()?.flush()?;
        Ok(())
    }
}
