//! Compressor invocations built from an image job and the format table.
//!
//! Building never fails and never touches the filesystem. Running the result
//! is the job of [`crate::compressor`].

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

use super::cubemap::CubeFaces;
use super::format::{OutputFormat, Quality, CONTAINER_EXTENSION, PIXEL_FORMAT_TAIL};

/// What a job converts
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    Single(PathBuf),
    Cube(CubeFaces),
}

impl ImageSource {
    pub fn is_cube(&self) -> bool {
        matches!(self, ImageSource::Cube(_))
    }

    /// The file whose bytes describe the job (the `_px` face for cubes)
    pub fn primary_path(&self) -> &Path {
        match self {
            ImageSource::Single(path) => path,
            ImageSource::Cube(faces) => faces.first(),
        }
    }

    /// Value of the compressor's `-i` flag
    pub fn input_arg(&self) -> OsString {
        match self {
            ImageSource::Single(path) => path.as_os_str().to_os_string(),
            ImageSource::Cube(faces) => faces.joined(),
        }
    }

    /// Output path without the `-<suffix>.ktx` tail
    pub fn output_base(&self) -> PathBuf {
        match self {
            ImageSource::Single(path) => path.with_extension(""),
            ImageSource::Cube(faces) => faces.base().to_path_buf(),
        }
    }

    /// Output file for one format: `<base>-<suffix>.ktx`
    pub fn output_path(&self, format: OutputFormat) -> PathBuf {
        let mut out = self.output_base().into_os_string();
        out.push(format!("-{}.{}", format.policy().suffix, CONTAINER_EXTENSION));
        PathBuf::from(out)
    }
}

/// One image (or cube set) ready for command building
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageJob {
    pub source: ImageSource,
    pub has_alpha: bool,
}

/// A single argv token
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Arg {
    /// Fixed flag or flag value
    Flag(&'static str),
    /// Computed token such as `ETC2_RGB,UBN,lRGB`
    Value(String),
    /// Filesystem path (quoted when rendered)
    Path(OsString),
}

impl Arg {
    fn as_os_str(&self) -> &OsStr {
        match self {
            Arg::Flag(s) => OsStr::new(s),
            Arg::Value(s) => OsStr::new(s.as_str()),
            Arg::Path(p) => p.as_os_str(),
        }
    }
}

/// A fully built compressor invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressorCommand {
    pub program: PathBuf,
    pub format: OutputFormat,
    pub output: PathBuf,
    args: Vec<Arg>,
}

impl CompressorCommand {
    pub fn args(&self) -> &[Arg] {
        &self.args
    }

    /// Arguments as handed to the OS
    pub fn argv(&self) -> impl Iterator<Item = &OsStr> {
        self.args.iter().map(Arg::as_os_str)
    }

    /// Shell-equivalent rendering, used for logs and `plan` output
    pub fn command_line(&self) -> String {
        let mut line = self.program.display().to_string();
        for arg in &self.args {
            line.push(' ');
            match arg {
                Arg::Flag(s) => line.push_str(s),
                Arg::Value(s) => line.push_str(s),
                Arg::Path(p) => line.push_str(&format!("\"{}\"", p.to_string_lossy())),
            }
        }
        line
    }

    pub fn to_std(&self) -> std::process::Command {
        let mut cmd = std::process::Command::new(&self.program);
        cmd.args(self.argv());
        cmd
    }

    pub fn to_tokio(&self) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new(&self.program);
        cmd.args(self.argv());
        cmd
    }
}

/// Build the invocation for one format.
///
/// Returns `None` when the format policy excludes this job (ETC1 with alpha).
pub fn build_command(
    compressor: &Path,
    job: &ImageJob,
    format: OutputFormat,
    quality: Quality,
) -> Option<CompressorCommand> {
    let policy = format.policy();
    if policy.skip_when_alpha && job.has_alpha {
        return None;
    }

    let output = job.source.output_path(format);
    let mut args = vec![Arg::Flag("-i"), Arg::Path(job.source.input_arg())];

    if job.source.is_cube() {
        args.push(Arg::Flag("-cube"));
    } else {
        args.extend([Arg::Flag("-flip"), Arg::Flag("y")]);
    }

    args.extend([Arg::Flag("-pot"), Arg::Flag("+")]);
    if policy.square {
        args.extend([Arg::Flag("-square"), Arg::Flag("+")]);
    }
    args.push(Arg::Flag("-m"));
    if policy.dither {
        args.push(Arg::Flag("-dither"));
    }

    let pixel_format = policy.pixel_formats.select(job.has_alpha);
    args.extend([
        Arg::Flag("-f"),
        Arg::Value(format!("{},{}", pixel_format, PIXEL_FORMAT_TAIL)),
    ]);

    if let Some(tokens) = policy.quality {
        args.extend([Arg::Flag("-q"), Arg::Flag(tokens.select(quality))]);
    }

    args.extend([Arg::Flag("-o"), Arg::Path(output.clone().into_os_string())]);

    Some(CompressorCommand {
        program: compressor.to_path_buf(),
        format,
        output,
        args,
    })
}

/// Build every applicable invocation for a job, in format table order.
///
/// `formats` is expected to be normalized (see
/// [`super::format::normalize_formats`]).
pub fn build_commands(
    compressor: &Path,
    job: &ImageJob,
    formats: &[OutputFormat],
    quality: Quality,
) -> Vec<CompressorCommand> {
    formats
        .iter()
        .filter_map(|&format| build_command(compressor, job, format, quality))
        .collect()
}
