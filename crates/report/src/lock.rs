use crate::{ReportError, Result};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Exclusive advisory lock on `<table>.lock`, released on drop
pub(crate) struct TableFileLock {
    file: File,
}

impl Drop for TableFileLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

pub(crate) fn lock_path_for_table(table: &Path) -> PathBuf {
    let mut name = table
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_else(|| "table".into());
    name.push(".lock");
    table.with_file_name(name)
}

pub(crate) async fn acquire_table_lock(table: &Path) -> Result<TableFileLock> {
    let path = lock_path_for_table(table);
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }

    let lock_path = path.clone();
    tokio::task::spawn_blocking(move || -> Result<TableFileLock> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|err| ReportError::Lock {
                path: lock_path.clone(),
                message: format!("open: {err}"),
            })?;

        let start = Instant::now();
        file.lock_exclusive().map_err(|err| ReportError::Lock {
            path: lock_path.clone(),
            message: format!("acquire: {err}"),
        })?;
        log::debug!(
            "Acquired {} after {}ms",
            lock_path.display(),
            start.elapsed().as_millis()
        );

        Ok(TableFileLock { file })
    })
    .await
    .map_err(|err| ReportError::Lock {
        path,
        message: format!("join lock task: {err}"),
    })?
}
