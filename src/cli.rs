use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::search::Field;

/// certsio: command line client for certs.io
///
/// Search TLS certificates and look for hosts that bypass their CDN or WAF.
#[derive(Parser, Debug, Clone)]
#[command(name = "certsio")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Config file (default is $HOME/.certsio.toml)
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<String>,

    /// Output file, appended to (default is stdout)
    #[arg(short = 'o', long = "output", global = true)]
    pub output: Option<String>,

    /// Output format
    #[arg(long = "format", value_enum, default_value_t = OutputFormat::Json, global = true)]
    pub format: OutputFormat,

    /// Number of concurrent DNS workers (overrides config)
    #[arg(short = 'w', long = "workers", global = true)]
    pub workers: Option<usize>,

    /// Print run statistics at exit
    #[arg(long = "stats", global = true)]
    pub stats: bool,

    /// Disable progress indicator
    #[arg(long = "no-progress", global = true)]
    pub no_progress: bool,

    /// Verbose logging (set log level to debug)
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    /// Quiet logging (set log level to warn)
    #[arg(short = 'q', long = "quiet", global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Search for certificates
    Search(SearchArgs),
    /// Resolve the ssl_names within certificates to find potential origin
    /// bypasses or internal hosts
    Resolve(ResolveArgs),
}

#[derive(Args, Debug, Clone)]
pub struct SearchArgs {
    /// Field to search by
    #[arg(value_enum)]
    pub field: Field,

    /// Value to search for
    pub value: String,

    /// Maximum number of pages to return (0 for all pages, overrides config)
    #[arg(short = 'm', long = "max-pages")]
    pub max_pages: Option<u64>,

    /// Also resolve the names of every certificate found
    #[arg(long = "resolve")]
    pub resolve: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ResolveArgs {
    /// Input file containing TLS certificates, one JSON object per line ("-" for stdin)
    #[arg(short = 'i', long = "input")]
    pub input: String,
}

/// Output format selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// JSON Lines format (one JSON object per line)
    Json,
    /// Human-readable colored text output
    Human,
}

impl Cli {
    /// Validate flag combinations and return errors for invalid usage
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.verbose && self.quiet {
            anyhow::bail!("Cannot specify both --verbose and --quiet");
        }

        if self.workers == Some(0) {
            anyhow::bail!("--workers must be greater than 0");
        }

        Ok(())
    }

    /// Log level from flags, `None` to defer to the config file
    pub fn log_level(&self) -> Option<&'static str> {
        if self.verbose {
            Some("debug")
        } else if self.quiet {
            Some("warn")
        } else {
            None
        }
    }

    pub fn should_show_progress(&self) -> bool {
        !self.no_progress && !self.quiet
    }
}
