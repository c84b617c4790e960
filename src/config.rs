//! Conversion configuration
//!
//! Defines the request a run is started with. A request is built once,
//! pruned for the host platform, validated, and then only read.

use std::path::PathBuf;

use tracing::warn;

use crate::scan::LoneFacePolicy;
use crate::textures::{normalize_formats, OutputFormat, Quality};

/// How discovered images are probed and compressed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    /// Blocking reads, wait for every compressor run in order
    #[default]
    Blocking,
    /// Tokio tasks per image, compressor processes launched and not awaited
    Detached,
}

/// Host platforms with format restrictions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    MacOs,
    Other,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(target_os = "macos") {
            Platform::MacOs
        } else {
            Platform::Other
        }
    }

    /// Whether the compressor can produce this format here
    pub fn supports(self, format: OutputFormat) -> bool {
        !(self == Platform::MacOs && format == OutputFormat::Dxt)
    }

    /// Formats requested when none are given
    pub fn default_formats(self) -> Vec<OutputFormat> {
        OutputFormat::ALL
            .into_iter()
            .filter(|f| self.supports(*f))
            .collect()
    }
}

/// Configuration for one conversion run
#[derive(Debug, Clone)]
pub struct ConversionRequest {
    /// Compressor executable (PVRTexToolCLI)
    pub compressor: PathBuf,

    /// Root of the image tree
    pub input_dir: PathBuf,

    /// Compression effort
    pub quality: Quality,

    /// Output formats, in emission order without duplicates
    pub formats: Vec<OutputFormat>,

    /// Blocking or detached execution
    pub mode: ExecutionMode,

    /// Delete existing `.ktx` files under the input tree first
    pub clean_outputs: bool,

    /// Handling of face-suffixed files without a complete set
    pub lone_faces: LoneFacePolicy,
}

impl ConversionRequest {
    /// Request with every default: high quality, all formats, blocking
    pub fn new(compressor: impl Into<PathBuf>, input_dir: impl Into<PathBuf>) -> Self {
        Self {
            compressor: compressor.into(),
            input_dir: input_dir.into(),
            quality: Quality::default(),
            formats: OutputFormat::ALL.to_vec(),
            mode: ExecutionMode::default(),
            clean_outputs: false,
            lone_faces: LoneFacePolicy::default(),
        }
    }

    pub fn with_formats(mut self, formats: &[OutputFormat]) -> Self {
        self.formats = normalize_formats(formats);
        self
    }

    pub fn with_quality(mut self, quality: Quality) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Drop formats the platform cannot produce, warning about each.
    pub fn apply_platform(&mut self, platform: Platform) {
        let (kept, dropped): (Vec<_>, Vec<_>) = normalize_formats(&self.formats)
            .into_iter()
            .partition(|f| platform.supports(*f));

        for format in dropped {
            warn!("{} format is not supported on macOS", format);
        }
        self.formats = kept;
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.input_dir.exists() {
            return Err(ConfigError::InputNotFound(self.input_dir.clone()));
        }

        if !self.input_dir.is_dir() {
            return Err(ConfigError::InputNotDirectory(self.input_dir.clone()));
        }

        if self.formats.is_empty() {
            return Err(ConfigError::NoFormats);
        }

        Ok(())
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Input directory not found: {0}")]
    InputNotFound(PathBuf),

    #[error("Input is not a directory: {0}")]
    InputNotDirectory(PathBuf),

    #[error("Compressor not found: {0} (install PVRTexToolCLI or pass --compressor)")]
    CompressorNotFound(String),

    #[error("No output formats left to generate on this platform")]
    NoFormats,

    #[error("Detached mode needs a running tokio runtime")]
    NoRuntime,
}
