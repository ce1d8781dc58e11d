use crate::capture::DATE_DIR_FORMAT;
use crate::error::StorageError;
use chrono::{Days, NaiveDate};
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::fs;
use tracing::{debug, error, info, warn};

/// File extensions removed from expired folders
const DELETABLE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "part"];

/// Age-based pruning of per-date image folders
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    pub keep_days: u32,
}

/// Result of one cleanup pass
#[derive(Debug, Clone, Default)]
pub struct CleanupResult {
    pub folders_removed: usize,
    pub images_deleted: usize,
    pub bytes_freed: u64,
    pub errors: Vec<String>,
    pub duration: Duration,
}

impl RetentionPolicy {
    pub fn new(keep_days: u32) -> Self {
        Self { keep_days }
    }

    /// Oldest folder date that is kept
    pub fn cutoff(&self, today: NaiveDate) -> NaiveDate {
        today
            .checked_sub_days(Days::new(u64::from(self.keep_days)))
            .unwrap_or(NaiveDate::MIN)
    }

    /// A folder is expired once it is more than `keep_days` calendar days old
    pub fn is_expired(&self, folder_date: NaiveDate, today: NaiveDate) -> bool {
        folder_date < self.cutoff(today)
    }

    /// Delete images in expired date folders under `root`, then the folders
    /// themselves once empty. Folder names that are not dates are skipped.
    pub async fn run(&self, root: &Path, today: NaiveDate) -> Result<CleanupResult, StorageError> {
        let start = Instant::now();
        let mut result = CleanupResult::default();

        if !fs::try_exists(root).await.unwrap_or(false) {
            debug!("Storage path {} does not exist, nothing to clean", root.display());
            return Ok(result);
        }

        let mut entries = fs::read_dir(root).await.map_err(|e| StorageError::Cleanup {
            path: root.to_path_buf(),
            source: e,
        })?;

        let mut expired = Vec::new();
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    result.errors.push(format!("Failed to read {}: {}", root.display(), e));
                    break;
                }
            };

            let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
            if !is_dir {
                continue;
            }

            let name = entry.file_name();
            let Some(folder_date) = name
                .to_str()
                .and_then(|n| NaiveDate::parse_from_str(n, DATE_DIR_FORMAT).ok())
            else {
                debug!("Skipping non-date folder {:?}", name);
                continue;
            };

            if self.is_expired(folder_date, today) {
                expired.push(entry.path());
            }
        }

        for folder in expired {
            if let Err(e) = prune_folder(&folder, &mut result).await {
                let msg = format!("Failed to clean {}: {}", folder.display(), e);
                error!("{}", msg);
                result.errors.push(msg);
            }
        }

        result.duration = start.elapsed();
        if result.images_deleted > 0 || result.folders_removed > 0 {
            info!(
                "Cleaned up {} old images in {} folders ({} bytes)",
                result.images_deleted, result.folders_removed, result.bytes_freed
            );
        }

        Ok(result)
    }
}

async fn prune_folder(folder: &Path, result: &mut CleanupResult) -> std::io::Result<()> {
    let mut entries = fs::read_dir(folder).await?;
    let mut remaining = 0usize;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let deletable = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| DELETABLE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
            .unwrap_or(false);

        if !deletable || !entry.file_type().await?.is_file() {
            remaining += 1;
            continue;
        }

        let size = entry.metadata().await.map(|m| m.len()).unwrap_or(0);
        match fs::remove_file(&path).await {
            Ok(()) => {
                result.images_deleted += 1;
                result.bytes_freed += size;
            }
            Err(e) => {
                warn!("Failed to delete {}: {}", path.display(), e);
                result.errors.push(format!("Failed to delete {}: {}", path.display(), e));
                remaining += 1;
            }
        }
    }

    if remaining == 0 {
        fs::remove_dir(folder).await?;
        result.folders_removed += 1;
        info!("Removed old directory: {}", folder.display());
    } else {
        debug!(
            "Keeping {} with {} unrelated entries",
            folder.display(),
            remaining
        );
    }

    Ok(())
}
