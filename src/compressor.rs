//! External compressor handling.
//!
//! Locates the PVRTexToolCLI binary and runs built commands either to
//! completion or as detached processes.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::config::ConfigError;
use crate::textures::CompressorCommand;

/// Binary name used when none is configured
pub const DEFAULT_COMPRESSOR: &str = "PVRTexToolCLI";

/// Environment variable that overrides the compressor location
pub const COMPRESSOR_ENV: &str = "PVRTEXTOOL_CLI";

/// Find the compressor executable.
///
/// Anything that looks like a path must exist as given; a bare name is
/// looked up on `PATH`.
pub fn resolve_compressor(name: impl AsRef<Path>) -> Result<PathBuf, ConfigError> {
    let as_path = name.as_ref();
    let not_found = || ConfigError::CompressorNotFound(as_path.display().to_string());

    if as_path.components().count() > 1 || as_path.is_absolute() {
        if as_path.is_file() {
            return Ok(as_path.to_path_buf());
        }
        return Err(not_found());
    }

    which::which(as_path).map_err(|_| not_found())
}

/// Result of a compressor run that was waited on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationOutcome {
    Succeeded,
    Failed(ExitStatus),
}

/// Run a command and wait for it.
///
/// A compressor that cannot be started is an error. A compressor that exits
/// non-zero is reported as [`InvocationOutcome::Failed`].
pub fn run_blocking(cmd: &CompressorCommand) -> Result<InvocationOutcome> {
    debug!("Running: {}", cmd.command_line());

    let status = cmd
        .to_std()
        .stdin(Stdio::null())
        .status()
        .with_context(|| format!("Failed to run {}", cmd.program.display()))?;

    if status.success() {
        Ok(InvocationOutcome::Succeeded)
    } else {
        warn!(
            "{} conversion failed ({}): {}",
            cmd.format,
            status,
            cmd.output.display()
        );
        Ok(InvocationOutcome::Failed(status))
    }
}

/// Start a command and return without waiting for it.
///
/// The child is not tracked; tokio reaps it in the background once it exits.
pub fn launch_detached(cmd: &CompressorCommand) -> Result<()> {
    debug!("Launching: {}", cmd.command_line());

    cmd.to_tokio()
        .stdin(Stdio::null())
        .kill_on_drop(false)
        .spawn()
        .with_context(|| format!("Failed to launch {}", cmd.program.display()))?;

    Ok(())
}
