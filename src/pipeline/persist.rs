use crate::error::{PocketcamError, Result};
use std::io;
use std::path::Path;
use tokio::fs;
use tracing::{debug, warn};

fn move_error(src: &Path, dst: &Path, source: io::Error) -> PocketcamError {
    PocketcamError::Move {
        from: src.to_path_buf(),
        to: dst.to_path_buf(),
        source,
    }
}

fn crosses_devices(error: &io::Error) -> bool {
    error.raw_os_error() == Some(libc::EXDEV)
}

/// Move `src` to `dst`, copying when the two live on different filesystems.
///
/// On failure `src` is left untouched and no partial `dst` remains.
pub async fn move_file(src: &Path, dst: &Path) -> Result<()> {
    match fs::rename(src, dst).await {
        Ok(()) => {
            debug!("Moved {} to {}", src.display(), dst.display());
            Ok(())
        }
        Err(e) if crosses_devices(&e) => copy_then_remove(src, dst).await,
        Err(e) => Err(move_error(src, dst, e)),
    }
}

async fn copy_then_remove(src: &Path, dst: &Path) -> Result<()> {
    debug!(
        "{} and {} are on different filesystems, copying",
        src.display(),
        dst.display()
    );

    if let Err(e) = fs::copy(src, dst).await {
        if let Err(cleanup) = fs::remove_file(dst).await {
            if cleanup.kind() != io::ErrorKind::NotFound {
                warn!("Could not remove partial copy {}: {}", dst.display(), cleanup);
            }
        }
        return Err(move_error(src, dst, e));
    }

    // The asset is durable at this point; a leftover source only wastes space
    if let Err(e) = fs::remove_file(src).await {
        warn!("Copied to {} but could not remove {}: {}", dst.display(), src.display(), e);
    }
    Ok(())
}

/// Remove `dir` unless files are still waiting in it.
///
/// Returns whether the directory was removed; leftover files are kept and logged.
pub async fn remove_dir_if_empty(dir: &Path) -> Result<bool> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(PocketcamError::io(dir, e)),
    };

    let mut leftovers = 0usize;
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| PocketcamError::io(dir, e))?
    {
        warn!("Keeping unpersisted capture {}", entry.path().display());
        leftovers += 1;
    }

    if leftovers > 0 {
        return Ok(false);
    }

    fs::remove_dir(dir)
        .await
        .map_err(|e| PocketcamError::io(dir, e))?;
    debug!("Removed {}", dir.display());
    Ok(true)
}
