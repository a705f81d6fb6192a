//! File-backed tables: one JSON document per table under the store dir.
//!
//! ```text
//! <state>/db/tags.json
//! <state>/db/media.json
//! <state>/db/tag_links.json
//! ```
//!
//! Every mutation rewrites the table with the atomic `.tmp` + rename pattern,
//! so a crash leaves either the old or the new document, never a torn one.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{io_err, StoreError};
use crate::repository::{Record, Repository};
use crate::rows::{self, Rows};

/// On-disk table payload.
#[derive(Debug, Serialize, Deserialize)]
struct TableFile<R> {
    table: String,
    saved_at: DateTime<Utc>,
    rows: Vec<R>,
}

pub struct JsonTable<R: Record> {
    path: PathBuf,
    rows: Mutex<Rows<R>>,
}

/// `<dir>/<table>.json`
pub fn table_path(dir: &Path, table: &str) -> PathBuf {
    dir.join(format!("{table}.json"))
}

impl<R: Record> JsonTable<R> {
    /// Open the table in `dir`, creating the directory if needed. A missing
    /// table file is an empty table.
    pub fn open(dir: &Path) -> Result<Self, StoreError> {
        std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
        let path = table_path(dir, R::TABLE);
        let mut rows = Rows::<R>::new();
        if path.exists() {
            let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
            let file: TableFile<R> =
                serde_json::from_str(&contents).map_err(|source| StoreError::Corrupt {
                    path: path.clone(),
                    source,
                })?;
            rows::insert(&mut rows, &file.rows);
            tracing::debug!(table = R::TABLE, rows = rows.len(), "table loaded");
        }
        Ok(Self {
            path,
            rows: Mutex::new(rows),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> MutexGuard<'_, Rows<R>> {
        // A panic mid-mutation leaves the map usable; the file is only
        // replaced by a complete flush.
        self.rows.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn flush(&self, rows: &Rows<R>) -> Result<(), StoreError> {
        let file = TableFile {
            table: R::TABLE.to_string(),
            saved_at: Utc::now(),
            rows: rows.values().cloned().collect(),
        };
        let json = serde_json::to_string_pretty(&file)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, &json).map_err(|e| io_err(&tmp, e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| io_err(&self.path, e))?;
        Ok(())
    }
}

impl<R: Record> Repository<R> for JsonTable<R> {
    fn insert(&self, record: &R) -> Result<(), StoreError> {
        self.insert_batch(std::slice::from_ref(record))
    }

    fn insert_batch(&self, records: &[R]) -> Result<(), StoreError> {
        if records.is_empty() {
            return Ok(());
        }
        let mut rows = self.lock();
        rows::insert(&mut rows, records);
        self.flush(&rows)
    }

    fn update(&self, record: &R) -> Result<(), StoreError> {
        self.update_batch(std::slice::from_ref(record))
    }

    fn update_batch(&self, records: &[R]) -> Result<(), StoreError> {
        if records.is_empty() {
            return Ok(());
        }
        let mut rows = self.lock();
        rows::update(&mut rows, records)?;
        self.flush(&rows)
    }

    fn remove(&self, key: R::Key) -> Result<(), StoreError> {
        self.remove_batch(&[key])
    }

    fn remove_batch(&self, keys: &[R::Key]) -> Result<(), StoreError> {
        let mut rows = self.lock();
        if rows::remove(&mut rows, keys) == 0 {
            return Ok(());
        }
        self.flush(&rows)
    }

    fn get_all(&self) -> Result<Vec<R>, StoreError> {
        Ok(self.lock().values().cloned().collect())
    }
}
