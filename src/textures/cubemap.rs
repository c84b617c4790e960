//! Cubemap face-set detection by filename convention.
//!
//! A cubemap is six images in one directory sharing a base name, each ending
//! in a face suffix right before the extension: `sky_px.png`, `sky_nx.png`,
//! `sky_py.png`, `sky_ny.png`, `sky_pz.png`, `sky_nz.png`.

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

/// Face suffixes in the compressor's face order (+X, -X, +Y, -Y, +Z, -Z)
pub const FACE_SUFFIXES: [&str; 6] = ["_px", "_nx", "_py", "_ny", "_pz", "_nz"];

/// A filename that carries a face suffix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaceMatch {
    /// Index into [`FACE_SUFFIXES`]
    pub face: usize,
    /// File stem without the face suffix (`sky` for `sky_px.png`)
    pub base: String,
    /// Extension as spelled in the filename
    pub extension: String,
}

impl FaceMatch {
    /// Whether this is the `_px` face, the one that stands for the whole set
    pub fn is_first_face(&self) -> bool {
        self.face == 0
    }
}

/// Check whether a file name ends in `<face suffix>.<ext>`.
pub fn match_face(file_name: &OsStr) -> Option<FaceMatch> {
    let name = file_name.to_str()?;
    let (stem, extension) = name.rsplit_once('.')?;

    FACE_SUFFIXES.iter().enumerate().find_map(|(face, suffix)| {
        stem.strip_suffix(suffix).map(|base| FaceMatch {
            face,
            base: base.to_string(),
            extension: extension.to_string(),
        })
    })
}

/// Six face paths of one cubemap, always in [`FACE_SUFFIXES`] order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CubeFaces {
    faces: [PathBuf; 6],
    base: PathBuf,
}

impl CubeFaces {
    pub fn faces(&self) -> &[PathBuf; 6] {
        &self.faces
    }

    /// The `_px` face
    pub fn first(&self) -> &Path {
        &self.faces[0]
    }

    /// Directory plus base name shared by all faces (`dir/sky`)
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// The six paths joined by commas, as the compressor expects them
    pub fn joined(&self) -> OsString {
        let mut out = OsString::new();
        for (i, face) in self.faces.iter().enumerate() {
            if i > 0 {
                out.push(",");
            }
            out.push(face.as_os_str());
        }
        out
    }
}

/// Build the six sibling paths for a face-suffixed file and check they exist.
///
/// Returns `None` when the file has no face suffix or when any of the six
/// faces is missing, including the case where only the file itself exists.
pub fn detect_cube_faces(path: &Path) -> Option<CubeFaces> {
    let face = match_face(path.file_name()?)?;
    let dir = path.parent().unwrap_or_else(|| Path::new(""));

    let mut faces: [PathBuf; 6] = Default::default();
    for (slot, suffix) in faces.iter_mut().zip(FACE_SUFFIXES) {
        let candidate = dir.join(format!("{}{}.{}", face.base, suffix, face.extension));
        if !candidate.exists() {
            return None;
        }
        *slot = candidate;
    }

    Some(CubeFaces {
        faces,
        base: dir.join(&face.base),
    })
}
