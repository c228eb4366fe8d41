//! Human-readable colored terminal output

use crate::certificate::Certificate;
use crate::certresolve::Finding;
use crate::output::{OutputHandler, SharedWriter};
use async_trait::async_trait;
use colored::Colorize;
use std::io::{self, Write};

/// Human-readable output handler with colored terminal output
pub struct HumanOutput {
    writer: SharedWriter,
    use_colors: bool,
}

impl HumanOutput {
    /// Create a new HumanOutput that writes to stdout
    pub fn new() -> Self {
        Self {
            writer: SharedWriter::new(Box::new(io::stdout())),
            use_colors: is_terminal::is_terminal(std::io::stdout()),
        }
    }

    /// Create a new HumanOutput that writes to a file
    pub fn to_file(file: std::fs::File) -> Self {
        Self {
            writer: SharedWriter::new(Box::new(file)),
            use_colors: false, // No colors when writing to file
        }
    }

    fn validity(cert: &Certificate) -> String {
        match cert.not_after {
            Some(not_after) => format!("expires {}", not_after.format("%Y-%m-%d")),
            None => "no expiry".to_string(),
        }
    }

    fn flags(cert: &Certificate) -> Vec<&'static str> {
        let mut flags = Vec::new();
        if cert.expired {
            flags.push("expired");
        }
        if cert.revoked {
            flags.push("revoked");
        }
        if cert.self_signed {
            flags.push("self-signed");
        }
        flags
    }
}

impl Default for HumanOutput {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OutputHandler for HumanOutput {
    async fn emit_certificate(&self, cert: &Certificate) -> anyhow::Result<()> {
        let mut writer = self.writer.lock()?;
        let flags = Self::flags(cert);

        if self.use_colors {
            write!(
                writer,
                "{} {} {}",
                "[cert]".green().bold(),
                cert.server.cyan().bold(),
                format!("({})", Self::validity(cert)).dimmed()
            )?;
            if !flags.is_empty() {
                write!(writer, " {}", flags.join(",").red())?;
            }
            writeln!(writer)?;
        } else {
            write!(writer, "[cert] {} ({})", cert.server, Self::validity(cert))?;
            if !flags.is_empty() {
                write!(writer, " {}", flags.join(","))?;
            }
            writeln!(writer)?;
        }

        if !cert.names.is_empty() {
            writeln!(writer, "    Names: {}", cert.names.join(", "))?;
        }
        if !cert.issuer_org.is_empty() {
            writeln!(writer, "    Issuer: {}", cert.issuer_org.join(", "))?;
        }

        writer.flush()?;
        Ok(())
    }

    async fn emit_finding(&self, finding: &Finding) -> anyhow::Result<()> {
        let mut writer = self.writer.lock()?;

        if self.use_colors {
            let line = finding.to_string();
            let line = match finding {
                Finding::PossibleOriginBypass { .. } => line.yellow().bold(),
                Finding::PossibleInternalHost { .. } => line.magenta(),
            };
            writeln!(writer, "{}", line)?;
        } else {
            writeln!(writer, "{}", finding)?;
        }

        writer.flush()?;
        Ok(())
    }

    async fn flush(&self) -> anyhow::Result<()> {
        self.writer.lock()?.flush()?;
        Ok(())
    }
}
