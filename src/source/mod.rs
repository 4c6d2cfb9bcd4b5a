//! Cell-info sources: where raw readings come from
//!
//! On a handset this is the telephony stack; the crate reaches it through an
//! external helper program (e.g. `termux-telephony-cellinfo`) whose JSON
//! output is parsed per call. A file source replays a snapshot written by
//! another process, which is what the `cell-sim` binary feeds.

#[cfg(test)]
use std::collections::VecDeque;
use std::io;
use std::path::PathBuf;

use tokio::process::Command;
use tracing::debug;

use crate::cell::reading::{parse_readings, RawCellReading};
use crate::config::{SourceConfig, SourceKind};
use crate::error::ScanError;

/// Platform accessor for every cell the modem currently sees
#[allow(async_fn_in_trait)]
pub trait CellInfoSource {
    /// One scan. An empty result is valid (no service, airplane mode).
    async fn all_cell_info(&mut self) -> Result<Vec<RawCellReading>, ScanError>;
}

/// Reads a JSON array of readings from a file on every scan
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CellInfoSource for FileSource {
    async fn all_cell_info(&mut self) -> Result<Vec<RawCellReading>, ScanError> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| io_error(&format!("reading {}", self.path.display()), e))?;

        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        parse_readings(&content).map_err(|e| {
            ScanError::Transient(format!(
                "Invalid cell info in {}: {}",
                self.path.display(),
                e
            ))
        })
    }
}

/// Runs a helper program and parses its stdout as a JSON array of readings
#[derive(Debug, Clone)]
pub struct CommandSource {
    program: String,
    args: Vec<String>,
}

impl CommandSource {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

impl CellInfoSource for CommandSource {
    async fn all_cell_info(&mut self) -> Result<Vec<RawCellReading>, ScanError> {
        debug!("Running {} {:?}", self.program, self.args);

        let output = Command::new(&self.program)
            .args(&self.args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| io_error(&format!("running {}", self.program), e))?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !output.status.success() {
            let message = format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            );
            return Err(if mentions_permission(&stderr) {
                ScanError::PermissionRevoked(message)
            } else {
                ScanError::Transient(message)
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        if stdout.trim().is_empty() {
            return Ok(Vec::new());
        }

        parse_readings(&stdout).map_err(|e| {
            if mentions_permission(&stdout) {
                ScanError::PermissionRevoked(stdout.trim().to_string())
            } else {
                ScanError::Transient(format!("Invalid output from {}: {}", self.program, e))
            }
        })
    }
}

/// Replays a fixed sequence of scan results, then reports empty scans
#[cfg(test)]
#[derive(Debug, Default)]
pub struct StaticSource {
    results: VecDeque<Result<Vec<RawCellReading>, ScanError>>,
}

#[cfg(test)]
impl StaticSource {
    pub fn new(results: Vec<Result<Vec<RawCellReading>, ScanError>>) -> Self {
        Self {
            results: results.into(),
        }
    }
}

#[cfg(test)]
impl CellInfoSource for StaticSource {
    async fn all_cell_info(&mut self) -> Result<Vec<RawCellReading>, ScanError> {
        self.results.pop_front().unwrap_or_else(|| Ok(Vec::new()))
    }
}

/// A source picked at runtime from configuration
#[derive(Debug, Clone)]
pub enum AnySource {
    File(FileSource),
    Command(CommandSource),
}

impl AnySource {
    pub fn from_config(config: &SourceConfig) -> anyhow::Result<Self> {
        match config.kind {
            SourceKind::File => {
                let path = config
                    .path
                    .clone()
                    .ok_or_else(|| anyhow::anyhow!("source.path is required for a file source"))?;
                Ok(AnySource::File(FileSource::new(path)))
            }
            SourceKind::Command => {
                let program = config.command.clone().ok_or_else(|| {
                    anyhow::anyhow!("source.command is required for a command source")
                })?;
                Ok(AnySource::Command(CommandSource::new(
                    program,
                    config.args.clone(),
                )))
            }
        }
    }
}

impl CellInfoSource for AnySource {
    async fn all_cell_info(&mut self) -> Result<Vec<RawCellReading>, ScanError> {
        match self {
            AnySource::File(source) => source.all_cell_info().await,
            AnySource::Command(source) => source.all_cell_info().await,
        }
    }
}

fn io_error(context: &str, e: io::Error) -> ScanError {
    let message = format!("{}: {}", context, e);
    if e.kind() == io::ErrorKind::PermissionDenied {
        ScanError::PermissionRevoked(message)
    } else {
        ScanError::Transient(message)
    }
}

fn mentions_permission(text: &str) -> bool {
    text.to_ascii_lowercase().contains("permission")
}
