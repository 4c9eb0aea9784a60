//! Logging initialization.

use anyhow::{Result, anyhow};
use tracing::Level;
use tracing_subscriber::fmt;

/// Output verbosity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    Normal,
    Verbose,
}

impl Verbosity {
    pub fn from_flags(verbose: bool, quiet: bool) -> Self {
        if quiet {
            Verbosity::Quiet
        } else if verbose {
            Verbosity::Verbose
        } else {
            Verbosity::Normal
        }
    }

    pub fn is_quiet(self) -> bool {
        matches!(self, Verbosity::Quiet)
    }

    /// Print a progress or result line unless quiet.
    pub fn info(self, msg: &str) {
        if !self.is_quiet() {
            eprintln!("{msg}");
        }
    }

    fn level(self) -> Level {
        match self {
            Verbosity::Quiet => Level::ERROR,
            Verbosity::Normal => Level::INFO,
            Verbosity::Verbose => Level::DEBUG,
        }
    }
}

/// Install the global subscriber.
///
/// Logs, including script `print` output, go to stderr so stdout stays
/// clean for CSV output.
pub fn init_logging(verbosity: Verbosity) -> Result<()> {
    fmt::Subscriber::builder()
        .with_max_level(verbosity.level())
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow!("failed to initialize logging: {e}"))
}
