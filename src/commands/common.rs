//! Common CLI options shared across commands.

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use clap::Args;

/// Returns true for the conventional stdin/stdout path `-`.
#[must_use]
pub fn is_stdio_path(path: &Path) -> bool {
    path.as_os_str() == "-"
}

/// Validates that an input file exists, with a labeled error message.
pub fn validate_file_exists(path: &Path, label: &str) -> Result<()> {
    if !path.exists() {
        bail!("{label} file does not exist: {}", path.display());
    }
    Ok(())
}

/// Input/output options for the calling command.
#[derive(Debug, Clone, Args)]
pub struct IoOptions {
    /// Input observation table (`-` for stdin)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,

    /// Output file for decision records (`-` or omitted for stdout)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Optional BED file restricting calling to target regions
    #[arg(short = 't', long = "targets")]
    pub targets: Option<PathBuf>,

    /// Optional sink for rejected-site records (BED-style)
    #[arg(long = "failed")]
    pub failed: Option<PathBuf>,

    /// Optional JSON file for run statistics
    #[arg(short = 's', long = "stats")]
    pub stats: Option<PathBuf>,
}

impl IoOptions {
    /// Validates that the configured input files exist.
    pub fn validate(&self) -> Result<()> {
        if !is_stdio_path(&self.input) {
            validate_file_exists(&self.input, "Input observation table")?;
        }
        if let Some(targets) = &self.targets {
            validate_file_exists(targets, "Targets BED")?;
        }
        Ok(())
    }
}
