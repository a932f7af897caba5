//! 日期标记持久化

use crate::store::MarkerStore;
use async_trait::async_trait;
use chrono::NaiveDate;
use clinic_core::{ClinicError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use tracing::debug;

/// 默认标记文件名
pub const DEFAULT_MARKER_FILE: &str = "last_cycle_date.json";

#[derive(Debug, Serialize, Deserialize)]
struct MarkerDocument {
    last_cycle_date: NaiveDate,
}

/// JSON文件日期标记
#[derive(Debug, Clone)]
pub struct FileMarkerStore {
    path: PathBuf,
}

impl FileMarkerStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self::new(dir.as_ref().join(DEFAULT_MARKER_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl MarkerStore for FileMarkerStore {
    async fn load(&self) -> Result<Option<NaiveDate>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Marker file {} not found", self.path.display());
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        if content.trim().is_empty() {
            return Ok(None);
        }

        let document: MarkerDocument = serde_json::from_str(&content)?;
        Ok(Some(document.last_cycle_date))
    }

    async fn store(&self, date: NaiveDate) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let content = serde_json::to_string_pretty(&MarkerDocument {
            last_cycle_date: date,
        })?;
        let tmp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, content).await?;
        tokio::fs::rename(&tmp_path, &self.path).await?;
        debug!("Stored cycle marker {}", date);
        Ok(())
    }
}

/// 内存日期标记
#[derive(Debug, Default)]
pub struct InMemoryMarkerStore {
    date: RwLock<Option<NaiveDate>>,
    corrupted: AtomicBool,
}

impl InMemoryMarkerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_date(date: NaiveDate) -> Self {
        Self {
            date: RwLock::new(Some(date)),
            corrupted: AtomicBool::new(false),
        }
    }

    /// 模拟标记内容损坏：读取返回错误，直到下一次写入
    pub fn corrupt(&self) {
        self.corrupted.store(true, Ordering::SeqCst);
    }

    pub async fn current(&self) -> Option<NaiveDate> {
        *self.date.read().await
    }
}

#[async_trait]
impl MarkerStore for InMemoryMarkerStore {
    async fn load(&self) -> Result<Option<NaiveDate>> {
        if self.corrupted.load(Ordering::SeqCst) {
            return Err(ClinicError::Storage("日期标记内容损坏".to_string()));
        }
        Ok(*self.date.read().await)
    }

    async fn store(&self, date: NaiveDate) -> Result<()> {
        *self.date.write().await = Some(date);
        self.corrupted.store(false, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_file_marker_roundtrip() {
        let dir = TempDir::new().unwrap();
        let marker = FileMarkerStore::in_dir(dir.path().join("state"));

        assert_eq!(marker.load().await.unwrap(), None);

        let date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        marker.store(date).await.unwrap();
        assert_eq!(marker.load().await.unwrap(), Some(date));

        let raw = std::fs::read_to_string(marker.path()).unwrap();
        assert!(raw.contains("2024-01-02"));
    }

    #[tokio::test]
    async fn test_file_marker_corrupt_is_error() {
        let dir = TempDir::new().unwrap();
        let marker = FileMarkerStore::in_dir(dir.path());
        std::fs::write(marker.path(), "{ not json").unwrap();
        assert!(marker.load().await.is_err());

        std::fs::write(marker.path(), "  \n").unwrap();
        assert_eq!(marker.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_memory_marker_corruption_clears_on_store() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        let marker = InMemoryMarkerStore::new();
        marker.corrupt();
        assert!(marker.load().await.is_err());

        marker.store(date).await.unwrap();
        assert_eq!(marker.load().await.unwrap(), Some(date));
    }
}
