//! Output formats and the per-format compressor policy table.
//!
//! Every format-specific rule (pixel format tokens, quality tokens, geometry
//! flags, output suffix) lives in [`FORMAT_POLICIES`]. The command builder
//! only reads from this table.

use std::fmt;

/// GPU texture compression families the compressor can produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, clap::ValueEnum)]
pub enum OutputFormat {
    /// PowerVR texture compression, 2bpp
    Pvrtc,
    /// Ericsson texture compression v1 (no alpha)
    Etc1,
    /// Ericsson texture compression v2
    Etc2,
    /// Adaptive scalable texture compression, 8x8 blocks
    Astc,
    /// S3TC (BC1/BC2)
    Dxt,
}

impl OutputFormat {
    /// All formats, in the order their commands are emitted
    pub const ALL: [OutputFormat; 5] = [
        OutputFormat::Pvrtc,
        OutputFormat::Etc1,
        OutputFormat::Etc2,
        OutputFormat::Astc,
        OutputFormat::Dxt,
    ];

    /// Get format name for logging
    pub fn name(&self) -> &'static str {
        match self {
            OutputFormat::Pvrtc => "PVRTC",
            OutputFormat::Etc1 => "ETC1",
            OutputFormat::Etc2 => "ETC2",
            OutputFormat::Astc => "ASTC",
            OutputFormat::Dxt => "DXT",
        }
    }

    /// Policy entry for this format
    pub fn policy(self) -> &'static FormatPolicy {
        // Table rows follow declaration order
        &FORMAT_POLICIES[self as usize]
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

/// Compression effort requested from the compressor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Quality {
    #[default]
    High,
    Low,
}

/// Pixel format token depending on whether the source carries alpha
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelFormats {
    pub opaque: &'static str,
    pub alpha: &'static str,
}

impl PixelFormats {
    pub fn select(&self, has_alpha: bool) -> &'static str {
        if has_alpha {
            self.alpha
        } else {
            self.opaque
        }
    }
}

/// Quality token per tier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualityTokens {
    pub high: &'static str,
    pub low: &'static str,
}

impl QualityTokens {
    pub fn select(&self, quality: Quality) -> &'static str {
        match quality {
            Quality::High => self.high,
            Quality::Low => self.low,
        }
    }
}

/// How one output format is requested from the compressor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatPolicy {
    pub format: OutputFormat,
    /// Appended to the output basename as `-<suffix>.ktx`
    pub suffix: &'static str,
    pub pixel_formats: PixelFormats,
    /// Images with alpha get no output in this format
    pub skip_when_alpha: bool,
    /// `None` means the compressor gets no `-q` flag
    pub quality: Option<QualityTokens>,
    /// Force square dimensions (`-square +`)
    pub square: bool,
    /// Dither (`-dither`)
    pub dither: bool,
}

/// Channel layout and colour space appended to every pixel format token
pub const PIXEL_FORMAT_TAIL: &str = "UBN,lRGB";

/// Container extension of every output
pub const CONTAINER_EXTENSION: &str = "ktx";

pub static FORMAT_POLICIES: [FormatPolicy; 5] = [
    FormatPolicy {
        format: OutputFormat::Pvrtc,
        suffix: "pvrtc",
        pixel_formats: PixelFormats {
            opaque: "PVRTC1_2_RGB",
            alpha: "PVRTC1_2",
        },
        skip_when_alpha: false,
        quality: Some(QualityTokens {
            high: "pvrtcbest",
            low: "pvrtcfastest",
        }),
        square: true,
        dither: true,
    },
    FormatPolicy {
        format: OutputFormat::Etc1,
        suffix: "etc1",
        pixel_formats: PixelFormats {
            opaque: "ETC1",
            alpha: "ETC1",
        },
        skip_when_alpha: true,
        quality: Some(QualityTokens {
            high: "etcslowperceptual",
            low: "etcfast",
        }),
        square: false,
        dither: false,
    },
    FormatPolicy {
        format: OutputFormat::Etc2,
        suffix: "etc2",
        pixel_formats: PixelFormats {
            opaque: "ETC2_RGB",
            alpha: "ETC2_RGBA",
        },
        skip_when_alpha: false,
        quality: Some(QualityTokens {
            high: "etcslowperceptual",
            low: "etcfast",
        }),
        square: false,
        dither: false,
    },
    FormatPolicy {
        format: OutputFormat::Astc,
        suffix: "astc",
        pixel_formats: PixelFormats {
            opaque: "ASTC_8x8",
            alpha: "ASTC_8x8",
        },
        skip_when_alpha: false,
        quality: Some(QualityTokens {
            high: "astcexhaustive",
            low: "astcveryfast",
        }),
        square: false,
        dither: false,
    },
    FormatPolicy {
        format: OutputFormat::Dxt,
        suffix: "dxt",
        pixel_formats: PixelFormats {
            opaque: "BC1",
            alpha: "BC2",
        },
        skip_when_alpha: false,
        quality: None,
        square: false,
        dither: false,
    },
];

/// Sort requested formats into emission order and drop duplicates
pub fn normalize_formats(formats: &[OutputFormat]) -> Vec<OutputFormat> {
    let mut out: Vec<OutputFormat> = formats.to_vec();
    out.sort();
    out.dedup();
    out
}
