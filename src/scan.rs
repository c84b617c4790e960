//! Input tree discovery.
//!
//! [`ImageScanner`] walks the input directory and yields one
//! [`DiscoveredImage`] per conversion unit: a single PNG/JPEG, or a complete
//! cubemap face set reported once through its `_px` face. Traversal is kept
//! separate from conversion so the pipeline decides how (and when) each
//! discovered image is probed and compressed.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::textures::{detect_cube_faces, match_face, ImageSource, SourceEncoding};

/// What to do with a face-suffixed file whose siblings are incomplete
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoneFacePolicy {
    /// Produce no job for it
    #[default]
    Skip,
    /// Convert it as an ordinary single image
    ConvertAsImage,
}

/// A conversion unit found in the input tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredImage {
    pub source: ImageSource,
    pub encoding: SourceEncoding,
}

/// Depth-first iterator over the convertible images under a root.
///
/// Entries are visited in file-name order. Any filesystem error is yielded
/// as `Err`; callers are expected to stop at the first one.
pub struct ImageScanner {
    entries: walkdir::IntoIter,
    lone_faces: LoneFacePolicy,
}

impl ImageScanner {
    pub fn new(root: &Path, lone_faces: LoneFacePolicy) -> Self {
        let entries = WalkDir::new(root)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter();
        Self { entries, lone_faces }
    }

    /// Turn one file into a job, or `None` if it is skipped
    fn classify(&self, path: PathBuf) -> Option<DiscoveredImage> {
        let encoding = SourceEncoding::from_path(&path)?;

        let Some(face) = path.file_name().and_then(match_face) else {
            return Some(DiscoveredImage {
                source: ImageSource::Single(path),
                encoding,
            });
        };

        match detect_cube_faces(&path) {
            Some(faces) if face.is_first_face() => {
                info!("Found cubemap: {}", faces.base().display());
                Some(DiscoveredImage {
                    source: ImageSource::Cube(faces),
                    encoding,
                })
            }
            Some(_) => {
                debug!("Skipping cube face covered by its _px face: {}", path.display());
                None
            }
            None => match self.lone_faces {
                LoneFacePolicy::Skip => {
                    warn!("Cube face without a complete set, skipping: {}", path.display());
                    None
                }
                LoneFacePolicy::ConvertAsImage => {
                    debug!("Incomplete cube face converted as image: {}", path.display());
                    Some(DiscoveredImage {
                        source: ImageSource::Single(path),
                        encoding,
                    })
                }
            },
        }
    }
}

impl Iterator for ImageScanner {
    type Item = Result<DiscoveredImage>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.entries.next()? {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e
                        .path()
                        .map(|p| p.display().to_string())
                        .unwrap_or_default();
                    return Some(
                        Err::<DiscoveredImage, _>(e)
                            .with_context(|| format!("Failed to read {}", path)),
                    );
                }
            };

            if entry.file_type().is_dir() {
                continue;
            }

            if let Some(image) = self.classify(entry.into_path()) {
                return Some(Ok(image));
            }
        }
    }
}

/// Delete every `.ktx` file under `root`. Returns how many were removed.
pub fn remove_existing_outputs(root: &Path) -> Result<usize> {
    let mut removed = 0;

    for entry in WalkDir::new(root).follow_links(true) {
        let entry = entry.with_context(|| format!("Failed to scan {}", root.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let is_ktx = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case(crate::textures::CONTAINER_EXTENSION))
            .unwrap_or(false);

        if is_ktx {
            std::fs::remove_file(path)
                .with_context(|| format!("Failed to remove {}", path.display()))?;
            debug!("Removed {}", path.display());
            removed += 1;
        }
    }

    Ok(removed)
}
