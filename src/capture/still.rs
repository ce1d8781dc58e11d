use super::naming::capture_path;
use super::record::CaptureReceipt;
use crate::camera::CameraLease;
use crate::error::{Result, StorageError};
use chrono::NaiveDateTime;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, warn};

/// Capture one JPEG through `lease` and store it under `root`.
///
/// The frame is read in full before anything touches the filesystem, and
/// is written through a temporary file, so a failed capture or write
/// never leaves a partial image behind.
pub async fn capture_still(
    lease: &mut CameraLease,
    root: &Path,
    at: NaiveDateTime,
    quality: u8,
) -> Result<CaptureReceipt> {
    let jpeg = lease.capture_jpeg(quality).await?;
    let path = capture_path(root, at);
    let bytes = write_image(&path, &jpeg).await?;

    let receipt = CaptureReceipt {
        path,
        bytes,
        timestamp: at,
    };
    info!(
        "Captured: {} ({:.2} MB)",
        receipt.path.display(),
        receipt.size_mb()
    );
    Ok(receipt)
}

/// Write `data` to `path` atomically, creating parent directories
pub async fn write_image(path: &Path, data: &[u8]) -> std::result::Result<u64, StorageError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| StorageError::DirectoryCreation {
                path: parent.to_path_buf(),
                source: e,
            })?;
    }

    let temp = temp_path(path);
    if let Err(e) = fs::write(&temp, data).await {
        discard(&temp).await;
        return Err(StorageError::Write {
            path: path.to_path_buf(),
            source: e,
        });
    }

    if let Err(e) = fs::rename(&temp, path).await {
        discard(&temp).await;
        return Err(StorageError::Write {
            path: path.to_path_buf(),
            source: e,
        });
    }

    Ok(data.len() as u64)
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    path.with_file_name(name)
}

async fn discard(temp: &Path) {
    if let Err(e) = fs::remove_file(temp).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("Failed to remove temporary file {}: {}", temp.display(), e);
        }
    }
}
