//! Conversion pipeline.
//!
//! Ties the scanner, the alpha probe, the command builder and the compressor
//! together. There is one pipeline for both execution modes; the mode only
//! decides whether an image is handled inline or handed to a tokio task.

use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::compressor::{launch_detached, resolve_compressor, run_blocking, InvocationOutcome};
use crate::config::{ConfigError, ConversionRequest, ExecutionMode, Platform};
use crate::scan::{remove_existing_outputs, DiscoveredImage, ImageScanner};
use crate::textures::{
    build_commands, has_alpha, has_alpha_async, CompressorCommand, ImageJob, OutputFormat, Quality,
};

/// Everything needed to turn a job into commands, shareable across tasks
#[derive(Debug, Clone)]
struct CommandSettings {
    compressor: PathBuf,
    formats: Arc<[OutputFormat]>,
    quality: Quality,
}

impl CommandSettings {
    fn from_request(request: &ConversionRequest) -> Self {
        Self {
            compressor: request.compressor.clone(),
            formats: request.formats.clone().into(),
            quality: request.quality,
        }
    }

    fn commands(&self, job: &ImageJob) -> Vec<CompressorCommand> {
        build_commands(&self.compressor, job, &self.formats, self.quality)
    }
}

/// A compressor run that exited non-zero
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedInvocation {
    pub format: OutputFormat,
    pub output: PathBuf,
    pub status: ExitStatus,
}

/// Counters for one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Single images dispatched
    pub images: usize,
    /// Cube sets dispatched
    pub cube_sets: usize,
    /// Compressor runs completed (blocking mode only)
    pub invocations: usize,
    /// Compressor runs that exited non-zero (blocking mode only)
    pub failures: Vec<FailedInvocation>,
    /// `.ktx` files deleted before the walk
    pub removed_outputs: usize,
}

impl RunSummary {
    fn record(&mut self, image: &DiscoveredImage) {
        if image.source.is_cube() {
            self.cube_sets += 1;
        } else {
            self.images += 1;
        }
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Launch tasks still in flight after a detached run returned.
///
/// These cover probing and process launch only. Compressor processes are
/// never waited on. Dropping this value leaves the tasks running.
#[derive(Debug, Default)]
pub struct PendingLaunches {
    handles: Vec<JoinHandle<Result<usize>>>,
}

impl PendingLaunches {
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Wait until every launch has been issued. Returns the number of
    /// processes started, or the first probe/launch error.
    pub async fn settle(self) -> Result<usize> {
        let mut launched = 0;
        for handle in self.handles {
            launched += handle.await.context("Launch task panicked")??;
        }
        Ok(launched)
    }
}

/// Result of [`generate_textures`]
#[derive(Debug)]
pub struct Run {
    pub summary: RunSummary,
    pub pending: PendingLaunches,
}

/// Routes each discovered image according to the execution mode
struct Dispatcher {
    settings: CommandSettings,
    runtime: Option<Handle>,
    summary: RunSummary,
    pending: PendingLaunches,
}

impl Dispatcher {
    fn new(request: &ConversionRequest) -> Result<Self, ConfigError> {
        let runtime = match request.mode {
            ExecutionMode::Blocking => None,
            ExecutionMode::Detached => {
                Some(Handle::try_current().map_err(|_| ConfigError::NoRuntime)?)
            }
        };

        Ok(Self {
            settings: CommandSettings::from_request(request),
            runtime,
            summary: RunSummary::default(),
            pending: PendingLaunches::default(),
        })
    }

    fn submit(&mut self, image: DiscoveredImage) -> Result<()> {
        self.summary.record(&image);
        info!("Converting {}", image.source.primary_path().display());

        let Some(runtime) = self.runtime.clone() else {
            return self.run_inline(image);
        };

        let handle = runtime.spawn(launch_image(self.settings.clone(), image));
        self.pending.handles.push(handle);
        Ok(())
    }

    fn run_inline(&mut self, image: DiscoveredImage) -> Result<()> {
        let job = probe_job(image)?;

        for cmd in self.settings.commands(&job) {
            self.summary.invocations += 1;
            if let InvocationOutcome::Failed(status) = run_blocking(&cmd)? {
                self.summary.failures.push(FailedInvocation {
                    format: cmd.format,
                    output: cmd.output,
                    status,
                });
            }
        }

        Ok(())
    }

    fn finish(self) -> Run {
        Run {
            summary: self.summary,
            pending: self.pending,
        }
    }
}

/// Probe alpha with blocking reads
fn probe_job(image: DiscoveredImage) -> Result<ImageJob> {
    let has_alpha = has_alpha(image.source.primary_path(), image.encoding)?;
    Ok(ImageJob {
        source: image.source,
        has_alpha,
    })
}

/// Detached handling of one image: async probe, then fire every command
async fn launch_image(settings: CommandSettings, image: DiscoveredImage) -> Result<usize> {
    let has_alpha = has_alpha_async(image.source.primary_path(), image.encoding).await?;
    let job = ImageJob {
        source: image.source,
        has_alpha,
    };

    let commands = settings.commands(&job);
    for cmd in &commands {
        launch_detached(cmd)?;
    }
    Ok(commands.len())
}

/// Prepare a request for a run: platform pruning, then validation
fn prepare(mut request: ConversionRequest) -> Result<ConversionRequest> {
    request.apply_platform(Platform::current());
    request.validate()?;
    debug!(
        "Formats: {}",
        request
            .formats
            .iter()
            .map(|f| f.name())
            .collect::<Vec<_>>()
            .join(", ")
    );
    Ok(request)
}

/// Convert every image under the request's input directory.
///
/// In blocking mode this returns after the last compressor exits. In
/// detached mode it returns as soon as the walk is done; `Run::pending`
/// holds the launch tasks. Any filesystem error aborts the walk.
///
/// The compressor is resolved before anything under the input tree is
/// touched, so a missing binary never costs the existing outputs.
pub fn generate_textures(request: ConversionRequest) -> Result<Run> {
    let mut request = prepare(request)?;
    request.compressor = resolve_compressor(&request.compressor)?;
    let mut dispatcher = Dispatcher::new(&request)?;

    if request.clean_outputs {
        dispatcher.summary.removed_outputs = remove_existing_outputs(&request.input_dir)?;
        info!("Removed {} existing outputs", dispatcher.summary.removed_outputs);
    }

    for image in ImageScanner::new(&request.input_dir, request.lone_faces) {
        dispatcher.submit(image?)?;
    }

    Ok(dispatcher.finish())
}

/// Every command a blocking run would execute, in execution order.
///
/// Reads the tree and probes alpha but runs nothing.
pub fn plan_commands(request: ConversionRequest) -> Result<Vec<CompressorCommand>> {
    let request = prepare(request)?;
    let settings = CommandSettings::from_request(&request);

    let mut commands = Vec::new();
    for image in ImageScanner::new(&request.input_dir, request.lone_faces) {
        let job = probe_job(image?)?;
        commands.extend(settings.commands(&job));
    }
    Ok(commands)
}

/// Probe a single file, as `ktxgen probe` reports it
pub fn probe_file(path: &Path) -> Result<bool> {
    let encoding = crate::textures::SourceEncoding::from_path(path)
        .with_context(|| format!("Not a PNG or JPEG file: {}", path.display()))?;
    has_alpha(path, encoding)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::LoneFacePolicy;
    use crate::textures::{png_bytes, FACE_SUFFIXES};
    use tempfile::tempdir;

    fn formats_here() -> Vec<OutputFormat> {
        Platform::current().default_formats()
    }

    fn lines(commands: &[CompressorCommand]) -> Vec<String> {
        commands.iter().map(|c| c.command_line()).collect()
    }

    #[test]
    fn test_plan_counts_images_times_formats() {
        let temp = tempdir().unwrap();
        let sub = temp.path().join("sub");
        std::fs::create_dir_all(&sub).unwrap();
        std::fs::write(temp.path().join("a.png"), png_bytes(2)).unwrap();
        std::fs::write(temp.path().join("b.jpg"), b"jpeg").unwrap();
        std::fs::write(sub.join("c.png"), png_bytes(0)).unwrap();
        std::fs::write(sub.join("notes.txt"), b"").unwrap();

        let commands = plan_commands(ConversionRequest::new("tool", temp.path())).unwrap();
        assert_eq!(commands.len(), 3 * formats_here().len());
    }

    #[test]
    fn test_plan_skips_etc1_for_alpha() {
        let temp = tempdir().unwrap();
        std::fs::write(temp.path().join("opaque.png"), png_bytes(2)).unwrap();
        std::fs::write(temp.path().join("rgba.png"), png_bytes(6)).unwrap();

        let request = ConversionRequest::new("tool", temp.path())
            .with_formats(&[OutputFormat::Etc1, OutputFormat::Etc2]);
        let commands = plan_commands(request).unwrap();

        let outputs: Vec<_> = commands
            .iter()
            .map(|c| c.output.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(outputs, vec!["opaque-etc1.ktx", "opaque-etc2.ktx", "rgba-etc2.ktx"]);
        assert!(commands[2].command_line().contains("ETC2_RGBA,UBN,lRGB"));
    }

    #[test]
    fn test_plan_cube_set() {
        let temp = tempdir().unwrap();
        for suffix in FACE_SUFFIXES {
            std::fs::write(temp.path().join(format!("sky{}.png", suffix)), png_bytes(6)).unwrap();
        }

        let request =
            ConversionRequest::new("tool", temp.path()).with_formats(&[OutputFormat::Etc2]);
        let commands = plan_commands(request).unwrap();
        assert_eq!(commands.len(), 1);

        let line = commands[0].command_line();
        assert!(line.contains(" -cube "));
        assert!(!line.contains("-flip"));
        assert!(line.contains("ETC2_RGBA"));
        assert_eq!(commands[0].output, temp.path().join("sky-etc2.ktx"));
    }

    #[test]
    fn test_plan_cube_set_with_uppercase_extension() {
        let temp = tempdir().unwrap();
        for suffix in FACE_SUFFIXES {
            std::fs::write(temp.path().join(format!("sky{}.PNG", suffix)), png_bytes(2)).unwrap();
        }

        let request =
            ConversionRequest::new("tool", temp.path()).with_formats(&[OutputFormat::Etc2]);
        let commands = plan_commands(request).unwrap();
        assert_eq!(commands.len(), 1);
        assert!(commands[0].command_line().contains("ETC2_RGB,UBN,lRGB"));
        assert_eq!(commands[0].output, temp.path().join("sky-etc2.ktx"));
    }

    #[test]
    fn test_plan_incomplete_cube() {
        let temp = tempdir().unwrap();
        for suffix in &FACE_SUFFIXES[1..] {
            std::fs::write(temp.path().join(format!("sky{}.png", suffix)), png_bytes(2)).unwrap();
        }
        std::fs::write(temp.path().join("sky_px.png"), png_bytes(2)).unwrap();
        std::fs::remove_file(temp.path().join("sky_nz.png")).unwrap();

        let request =
            ConversionRequest::new("tool", temp.path()).with_formats(&[OutputFormat::Astc]);
        assert!(plan_commands(request.clone()).unwrap().is_empty());

        let mut fallback = request;
        fallback.lone_faces = LoneFacePolicy::ConvertAsImage;
        assert_eq!(plan_commands(fallback).unwrap().len(), 5);
    }

    #[test]
    fn test_plan_is_idempotent() {
        let temp = tempdir().unwrap();
        std::fs::write(temp.path().join("a.png"), png_bytes(6)).unwrap();
        std::fs::write(temp.path().join("b.jpeg"), b"").unwrap();

        let request = ConversionRequest::new("tool", temp.path()).with_quality(Quality::Low);
        let first = plan_commands(request.clone()).unwrap();
        let second = plan_commands(request).unwrap();
        assert_eq!(lines(&first), lines(&second));
    }

    #[test]
    fn test_unreadable_png_aborts() {
        let temp = tempdir().unwrap();
        // A directory named like a PNG is skipped; a dangling symlink is not
        std::fs::create_dir(temp.path().join("folder.png")).unwrap();
        #[cfg(unix)]
        std::os::unix::fs::symlink(temp.path().join("gone.png"), temp.path().join("link.png"))
            .unwrap();

        let result = plan_commands(ConversionRequest::new("tool", temp.path()));
        if cfg!(unix) {
            assert!(result.is_err());
        } else {
            assert!(result.unwrap().is_empty());
        }
    }

    #[test]
    fn test_missing_input_is_config_error() {
        let temp = tempdir().unwrap();
        let err = generate_textures(ConversionRequest::new("tool", temp.path().join("nope")))
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::InputNotFound(_))
        ));
    }

    #[test]
    fn test_detached_without_runtime_is_error() {
        let temp = tempdir().unwrap();
        let tool = temp.path().join("tool");
        std::fs::write(&tool, b"").unwrap();
        let request =
            ConversionRequest::new(&tool, temp.path()).with_mode(ExecutionMode::Detached);
        let err = generate_textures(request).unwrap_err();
        assert!(matches!(err.downcast_ref::<ConfigError>(), Some(ConfigError::NoRuntime)));
    }

    #[test]
    fn test_missing_compressor_keeps_existing_outputs() {
        let temp = tempdir().unwrap();
        std::fs::write(temp.path().join("a.jpg"), b"").unwrap();
        std::fs::write(temp.path().join("a-etc2.ktx"), b"stale").unwrap();

        let mut request = ConversionRequest::new(temp.path().join("bin/PVRTexToolCLI"), temp.path())
            .with_formats(&[OutputFormat::Etc2]);
        request.clean_outputs = true;
        let err = generate_textures(request).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::CompressorNotFound(_))
        ));
        assert!(temp.path().join("a-etc2.ktx").exists());
    }

    #[test]
    fn test_plan_needs_no_compressor() {
        let temp = tempdir().unwrap();
        std::fs::write(temp.path().join("a.jpg"), b"").unwrap();

        let request = ConversionRequest::new(temp.path().join("bin/PVRTexToolCLI"), temp.path())
            .with_formats(&[OutputFormat::Etc2]);
        assert_eq!(plan_commands(request).unwrap().len(), 1);
    }

    #[test]
    fn test_probe_file() {
        let temp = tempdir().unwrap();
        let png = temp.path().join("a.png");
        std::fs::write(&png, png_bytes(6)).unwrap();
        assert!(probe_file(&png).unwrap());
        assert!(probe_file(&temp.path().join("a.gif")).is_err());
    }

    #[cfg(unix)]
    mod unix {
        use super::*;
        use crate::compressor::tests::unix::fake_compressor;

        fn logged_calls(dir: &Path) -> Vec<String> {
            std::fs::read_to_string(dir.join("calls.log"))
                .unwrap_or_default()
                .lines()
                .map(str::to_string)
                .collect()
        }

        #[test]
        fn test_generate_blocking_runs_every_command() {
            let tools = tempdir().unwrap();
            let input = tempdir().unwrap();
            let tool = fake_compressor(tools.path(), 0);

            std::fs::write(input.path().join("a.png"), png_bytes(6)).unwrap();
            std::fs::write(input.path().join("b.jpg"), b"").unwrap();

            let request = ConversionRequest::new(&tool, input.path())
                .with_formats(&[OutputFormat::Pvrtc, OutputFormat::Etc1]);
            let run = generate_textures(request).unwrap();

            // a.png has alpha: no ETC1
            assert_eq!(run.summary.images, 2);
            assert_eq!(run.summary.invocations, 3);
            assert!(!run.summary.has_failures());
            assert!(run.pending.is_empty());

            let calls = logged_calls(tools.path());
            assert_eq!(calls.len(), 3);
            assert!(calls[0].contains("-f PVRTC1_2,UBN,lRGB"));
            assert!(calls[1].contains("-f PVRTC1_2_RGB,UBN,lRGB"));
            assert!(calls[2].contains("-f ETC1,UBN,lRGB"));
        }

        #[test]
        fn test_generate_blocking_records_failures() {
            let tools = tempdir().unwrap();
            let input = tempdir().unwrap();
            let tool = fake_compressor(tools.path(), 2);
            std::fs::write(input.path().join("a.jpg"), b"").unwrap();

            let request = ConversionRequest::new(&tool, input.path())
                .with_formats(&[OutputFormat::Etc2, OutputFormat::Astc]);
            let run = generate_textures(request).unwrap();

            assert_eq!(run.summary.invocations, 2);
            assert_eq!(run.summary.failures.len(), 2);
            assert_eq!(run.summary.failures[0].format, OutputFormat::Etc2);
            assert_eq!(run.summary.failures[0].status.code(), Some(2));
            assert_eq!(run.summary.failures[1].output, input.path().join("a-astc.ktx"));
        }

        #[test]
        fn test_generate_cleans_outputs_first() {
            let tools = tempdir().unwrap();
            let input = tempdir().unwrap();
            let tool = fake_compressor(tools.path(), 0);
            std::fs::write(input.path().join("a.jpg"), b"").unwrap();
            std::fs::write(input.path().join("a-etc2.ktx"), b"stale").unwrap();

            let mut request =
                ConversionRequest::new(&tool, input.path()).with_formats(&[OutputFormat::Etc2]);
            request.clean_outputs = true;
            let run = generate_textures(request).unwrap();

            assert_eq!(run.summary.removed_outputs, 1);
            assert!(!input.path().join("a-etc2.ktx").exists());
            assert_eq!(run.summary.invocations, 1);
        }

        #[tokio::test(flavor = "multi_thread")]
        async fn test_generate_detached_launches_without_waiting() {
            let tools = tempdir().unwrap();
            let input = tempdir().unwrap();
            let tool = fake_compressor(tools.path(), 1);
            std::fs::write(input.path().join("a.png"), png_bytes(2)).unwrap();
            std::fs::write(input.path().join("b.png"), png_bytes(6)).unwrap();

            let request = ConversionRequest::new(&tool, input.path())
                .with_formats(&[OutputFormat::Etc1, OutputFormat::Etc2])
                .with_mode(ExecutionMode::Detached);
            let run = generate_textures(request).unwrap();

            assert_eq!(run.summary.images, 2);
            assert_eq!(run.summary.invocations, 0);
            assert!(!run.summary.has_failures());
            assert_eq!(run.pending.len(), 2);

            // a.png: ETC1 + ETC2, b.png (alpha): ETC2 only
            assert_eq!(run.pending.settle().await.unwrap(), 3);
        }

        #[tokio::test(flavor = "multi_thread")]
        async fn test_detached_walk_error_is_fatal() {
            let tools = tempdir().unwrap();
            let input = tempdir().unwrap();
            let tool = fake_compressor(tools.path(), 0);
            std::os::unix::fs::symlink(input.path().join("gone.png"), input.path().join("x.png"))
                .unwrap();

            let request = ConversionRequest::new(&tool, input.path())
                .with_mode(ExecutionMode::Detached);
            assert!(generate_textures(request).is_err());
        }
    }
}
