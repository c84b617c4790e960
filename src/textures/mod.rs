//! Texture job model and compressor command building
//!
//! Source classification (alpha, cubemap face sets) and the mapping from an
//! image job to one compressor invocation per output format. Nothing here
//! runs a process.

mod alpha;
mod command;
mod cubemap;
mod format;

pub use alpha::{
    has_alpha, has_alpha_async, png_has_alpha, png_has_alpha_async, SourceEncoding,
    PNG_COLOR_TYPE_OFFSET, PNG_COLOR_TYPE_RGBA,
};
pub use command::{build_command, build_commands, Arg, CompressorCommand, ImageJob, ImageSource};
pub use cubemap::{detect_cube_faces, match_face, CubeFaces, FaceMatch, FACE_SUFFIXES};
pub use format::{
    normalize_formats, FormatPolicy, OutputFormat, PixelFormats, Quality, QualityTokens,
    CONTAINER_EXTENSION, FORMAT_POLICIES, PIXEL_FORMAT_TAIL,
};

#[cfg(test)]
pub(crate) use alpha::tests::png_bytes;
