//! Gallery export: registering persisted assets with the shared media library.

use crate::device::AssetKind;
use crate::error::ExportError;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// Asset type hint passed to the media library
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetType {
    /// Let the exporter decide from the file
    Auto,
    Photo,
    Video,
}

impl AssetType {
    /// Resolve `Auto` from the file extension; unknown extensions count as photos
    pub fn resolve(self, path: &Path) -> AssetType {
        match self {
            AssetType::Auto => {
                let extension = path
                    .extension()
                    .and_then(|e| e.to_str())
                    .map(|e| e.to_ascii_lowercase());
                match extension.as_deref() {
                    Some("mp4") | Some("mov") | Some("m4v") => AssetType::Video,
                    _ => AssetType::Photo,
                }
            }
            other => other,
        }
    }
}

impl From<AssetKind> for AssetType {
    fn from(kind: AssetKind) -> Self {
        match kind {
            AssetKind::Photo => AssetType::Photo,
            AssetKind::Video => AssetType::Video,
        }
    }
}

/// Where the media library stored an exported asset
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GalleryEntry {
    pub source: PathBuf,
    pub location: PathBuf,
    pub asset_type: AssetType,
}

#[async_trait::async_trait]
pub trait GalleryExporter: Send + Sync {
    /// Copy or register `path` in the media library. The source file is left in place.
    async fn save(&self, path: &Path, asset_type: AssetType) -> Result<GalleryEntry, ExportError>;
}

/// Media library backed by a plain directory
pub struct DirectoryGallery {
    root: PathBuf,
}

impl DirectoryGallery {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn album_dir(&self, asset_type: AssetType) -> PathBuf {
        match asset_type {
            AssetType::Video => self.root.join("Videos"),
            AssetType::Photo | AssetType::Auto => self.root.join("Pictures"),
        }
    }

    async fn unique_destination(dir: &Path, source: &Path) -> io::Result<PathBuf> {
        let file_name = source.file_name().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} has no file name", source.display()),
            )
        })?;

        let candidate = dir.join(file_name);
        if !fs::try_exists(&candidate).await? {
            return Ok(candidate);
        }

        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let extension = source
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();

        let mut copy = 1u32;
        loop {
            let candidate = dir.join(format!("{} ({}){}", stem, copy, extension));
            if !fs::try_exists(&candidate).await? {
                return Ok(candidate);
            }
            copy += 1;
        }
    }
}

#[cfg(unix)]
fn is_out_of_space(code: i32) -> bool {
    code == libc::ENOSPC || code == libc::EDQUOT
}

#[cfg(not(unix))]
fn is_out_of_space(code: i32) -> bool {
    code == libc::ENOSPC
}

fn classify_io_error(path: &Path, source: io::Error) -> ExportError {
    if source.kind() == io::ErrorKind::PermissionDenied {
        return ExportError::PermissionDenied {
            path: path.to_path_buf(),
        };
    }

    match source.raw_os_error() {
        Some(code) if is_out_of_space(code) => ExportError::StorageFull {
            path: path.to_path_buf(),
        },
        _ => ExportError::Io {
            path: path.to_path_buf(),
            source,
        },
    }
}

#[async_trait::async_trait]
impl GalleryExporter for DirectoryGallery {
    async fn save(&self, path: &Path, asset_type: AssetType) -> Result<GalleryEntry, ExportError> {
        let asset_type = asset_type.resolve(path);
        let album = self.album_dir(asset_type);

        fs::create_dir_all(&album)
            .await
            .map_err(|e| classify_io_error(&album, e))?;

        let destination = Self::unique_destination(&album, path)
            .await
            .map_err(|e| classify_io_error(path, e))?;

        if let Err(e) = fs::copy(path, &destination).await {
            if fs::remove_file(&destination).await.is_ok() {
                debug!("Removed partial gallery copy {}", destination.display());
            }
            return Err(classify_io_error(path, e));
        }

        info!("Saved to gallery: {}", destination.display());
        Ok(GalleryEntry {
            source: path.to_path_buf(),
            location: destination,
            asset_type,
        })
    }
}
