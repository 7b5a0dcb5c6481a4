use async_trait::async_trait;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use crate::error::StoreError;
use crate::models::{FeedbackRecord, StoredRow, COLUMNS};

/// Append-only storage for feedback submissions
#[async_trait]
pub trait FeedbackStore: Send + Sync {
    /// Append one record to the table, creating it if needed
    async fn append(&self, record: &FeedbackRecord) -> Result<(), StoreError>;

    /// Read every stored row. `None` means the table does not exist yet.
    async fn load(&self) -> Result<Option<Vec<StoredRow>>, StoreError>;
}

/// Engagement table kept in a flat CSV file with a header row
pub struct CsvFeedbackStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl CsvFeedbackStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }
}

#[async_trait]
impl FeedbackStore for CsvFeedbackStore {
    async fn append(&self, record: &FeedbackRecord) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let path = self.path.clone();
        let row = record.to_row();

        tokio::task::spawn_blocking(move || append_row(&path, &row))
            .await
            .map_err(|e| StoreError::Io(io::Error::other(e)))??;

        tracing::info!(
            path = %self.path.display(),
            user_id = %record.user_id,
            app_type = %record.app_type,
            theme = %record.theme_name,
            "Feedback appended"
        );
        Ok(())
    }

    async fn load(&self) -> Result<Option<Vec<StoredRow>>, StoreError> {
        let path = self.path.clone();
        let rows = tokio::task::spawn_blocking(move || read_rows(&path))
            .await
            .map_err(|e| StoreError::Io(io::Error::other(e)))??;

        if let Some(rows) = &rows {
            tracing::debug!(path = %self.path.display(), rows = rows.len(), "Loaded engagement table");
        }
        Ok(rows)
    }
}

fn append_row(path: &Path, row: &StoredRow) -> Result<(), StoreError> {
    let is_new = std::fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(file);

    if is_new {
        writer.write_record(COLUMNS)?;
    }
    writer.serialize(row)?;
    writer.flush()?;
    Ok(())
}

fn read_rows(path: &Path) -> Result<Option<Vec<StoredRow>>, StoreError> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .flexible(true)
        .from_reader(file);

    let rows = reader
        .deserialize::<StoredRow>()
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Some(rows))
}

/// Serialize rows as a CSV document with the standard header
pub fn export_csv(rows: &[StoredRow]) -> Result<Vec<u8>, StoreError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());

    writer.write_record(COLUMNS)?;
    for row in rows {
        writer.serialize(row)?;
    }

    writer
        .into_inner()
        .map_err(|e| StoreError::Io(io::Error::other(e.to_string())))
}
