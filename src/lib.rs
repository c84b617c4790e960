//! ktxgen - batch GPU texture generation
//!
//! Walks a tree of PNG/JPEG images (and six-face cubemap sets) and asks
//! PVRTexToolCLI for one `.ktx` per image per output format.

pub mod compressor;
pub mod config;
pub mod pipeline;
pub mod scan;
pub mod textures;

pub use config::{ConfigError, ConversionRequest, ExecutionMode, Platform};
pub use pipeline::{generate_textures, plan_commands, probe_file, Run, RunSummary};
pub use scan::LoneFacePolicy;
pub use textures::{OutputFormat, Quality};
