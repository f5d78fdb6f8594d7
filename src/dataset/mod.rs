//! Dataset storage for askql.
//!
//! A dataset is one SQLite store created from an uploaded CSV file, plus a
//! schema context sidecar. The registry owns the upload directory, performs
//! imports, and tracks which dataset questions run against by default.

mod context;
mod csv_import;

pub use context::{SchemaContext, CONTEXT_SUFFIX};
pub use csv_import::{parse_csv, ParsedCsv, INTEGER_TYPE, REAL_TYPE, TEXT_TYPE};

use crate::db::{DatabaseClient, DatabaseSummary, SqliteClient};
use crate::error::{AskError, Result};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// File extension accepted by the importer (compared case-insensitively).
pub const ALLOWED_EXTENSION: &str = "csv";

/// Message returned when a question arrives before any dataset exists.
pub const NO_DATASET_MESSAGE: &str = "No dataset available. Upload a CSV file first.";

/// A dataset ready to be queried.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedDataset {
    /// Dataset name (upload file stem), or the default store's file stem.
    pub name: String,

    /// Location of the store.
    pub db_path: PathBuf,

    /// Schema text for prompts.
    pub schema: String,

    /// Structured summary for API responses.
    pub summary: DatabaseSummary,
}

/// Outcome of a successful import.
#[derive(Debug, Clone)]
pub struct ImportOutcome {
    /// Sanitized upload file name.
    pub filename: String,

    /// Name of the table created in the store.
    pub table_name: String,

    /// Number of data rows imported.
    pub row_count: usize,

    /// The dataset as it is now resolved.
    pub dataset: ResolvedDataset,
}

/// Entry in the dataset listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetEntry {
    pub name: String,
    pub table_name: Option<String>,
    pub db_path: PathBuf,
    pub active: bool,
}

/// Owns the upload directory and the active-dataset pointer.
#[derive(Debug)]
pub struct DatasetRegistry {
    upload_dir: PathBuf,
    default_database: PathBuf,
    query_timeout: Duration,
    active: RwLock<Option<String>>,
    import_lock: Mutex<()>,
    tmp_counter: AtomicU64,
}

impl DatasetRegistry {
    /// Creates a registry rooted at `upload_dir`, creating the directory if needed.
    pub fn new(upload_dir: impl Into<PathBuf>, default_database: impl Into<PathBuf>) -> Result<Self> {
        let upload_dir = upload_dir.into();
        fs::create_dir_all(&upload_dir).map_err(|e| {
            AskError::dataset(format!(
                "Failed to create upload directory {}: {}",
                upload_dir.display(),
                e
            ))
        })?;

        Ok(Self {
            upload_dir,
            default_database: default_database.into(),
            query_timeout: Duration::from_secs(30),
            active: RwLock::new(None),
            import_lock: Mutex::new(()),
            tmp_counter: AtomicU64::new(0),
        })
    }

    /// Sets the deadline applied to queries against resolved datasets.
    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    /// Directory holding uploads, stores and sidecars.
    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    /// Name of the dataset questions run against by default.
    pub fn active(&self) -> Option<String> {
        self.active
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn set_active(&self, name: &str) {
        *self
            .active
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(name.to_string());
    }

    /// Points the registry at the most recently written sidecar, if any.
    pub fn restore(&self) -> Result<Option<String>> {
        let newest = self
            .sidecars()?
            .into_iter()
            .filter_map(|(name, path)| {
                let modified = fs::metadata(&path).and_then(|m| m.modified()).ok()?;
                Some((modified, name))
            })
            .max();

        match newest {
            Some((_, name)) => {
                info!("Restored active dataset '{}'", name);
                self.set_active(&name);
                Ok(Some(name))
            }
            None => Ok(None),
        }
    }

    /// Lists every dataset with a sidecar in the upload directory.
    pub fn list(&self) -> Result<Vec<DatasetEntry>> {
        let active = self.active();
        let mut entries = Vec::new();

        for (name, path) in self.sidecars()? {
            match SchemaContext::load(&path) {
                Ok(ctx) => entries.push(DatasetEntry {
                    active: active.as_deref() == Some(name.as_str()),
                    name,
                    table_name: ctx.table_name,
                    db_path: ctx.db_path,
                }),
                Err(e) => warn!("Skipping unreadable context {}: {}", path.display(), e),
            }
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn sidecars(&self) -> Result<Vec<(String, PathBuf)>> {
        let mut found = Vec::new();
        for entry in fs::read_dir(&self.upload_dir)? {
            let path = entry?.path();
            if let Some(name) = SchemaContext::dataset_name(&path) {
                found.push((name, path));
            }
        }
        Ok(found)
    }

    /// Imports an uploaded CSV file, replacing any dataset of the same name.
    ///
    /// The store is built in a temporary file and renamed over the previous
    /// one, so readers see either the old store or the complete new one.
    pub async fn import_csv(&self, filename: &str, bytes: &[u8]) -> Result<ImportOutcome> {
        if filename.is_empty() {
            return Err(AskError::invalid_input("No selected file"));
        }
        let filename = sanitize_filename(filename)
            .ok_or_else(|| AskError::invalid_input("Invalid file type"))?;
        let stem = match filename.rsplit_once('.') {
            Some((stem, ext)) if ext.eq_ignore_ascii_case(ALLOWED_EXTENSION) && !stem.is_empty() => {
                stem.to_string()
            }
            _ => return Err(AskError::invalid_input("Invalid file type")),
        };
        let table_name = stem.replace(' ', "_");

        let owned = bytes.to_vec();
        let parsed = tokio::task::spawn_blocking(move || parse_csv(&owned))
            .await
            .map_err(|e| AskError::internal(format!("CSV parsing task failed: {e}")))??;

        let _guard = self.import_lock.lock().await;

        tokio::fs::write(self.upload_dir.join(&filename), bytes).await?;

        let db_path = self.upload_dir.join(format!("{}.db", stem));
        let tmp_path = self.upload_dir.join(format!(
            ".{}.{}.{}.tmp",
            stem,
            std::process::id(),
            self.tmp_counter.fetch_add(1, Ordering::Relaxed)
        ));

        let summary = match self.write_store(&tmp_path, &table_name, &parsed).await {
            Ok(summary) => summary,
            Err(e) => {
                let _ = tokio::fs::remove_file(&tmp_path).await;
                return Err(e);
            }
        };
        tokio::fs::rename(&tmp_path, &db_path).await?;

        let context = SchemaContext::new(db_path.clone(), &table_name, summary.clone());
        context.save(&SchemaContext::path_for(&self.upload_dir, &stem))?;
        self.set_active(&stem);

        info!(
            "Imported {} ({} rows) into {}",
            filename,
            parsed.row_count(),
            db_path.display()
        );

        Ok(ImportOutcome {
            filename,
            table_name,
            row_count: parsed.row_count(),
            dataset: ResolvedDataset {
                name: stem,
                db_path,
                schema: context.schema,
                summary,
            },
        })
    }

    async fn write_store(
        &self,
        path: &Path,
        table_name: &str,
        parsed: &ParsedCsv,
    ) -> Result<DatabaseSummary> {
        let store = SqliteClient::create(path).await?;
        let result = async {
            store
                .replace_table(table_name, &parsed.columns, &parsed.rows)
                .await?;
            store.summarize().await
        }
        .await;
        store.close().await?;
        result
    }

    /// Resolves a dataset by name, or the active one when `name` is `None`.
    ///
    /// Without any upload the default database is used if it exists.
    pub async fn resolve(&self, name: Option<&str>) -> Result<ResolvedDataset> {
        let name = match name.map(str::trim).filter(|n| !n.is_empty()) {
            Some(requested) => {
                if !is_plain_name(requested) {
                    return Err(AskError::not_found(format!("Unknown dataset: {requested}")));
                }
                Some(requested.to_string())
            }
            None => self.active(),
        };

        if let Some(name) = name {
            let path = SchemaContext::path_for(&self.upload_dir, &name);
            if !path.is_file() {
                return Err(AskError::not_found(format!("Unknown dataset: {name}")));
            }
            return self.from_context(name, &path).await;
        }

        if self.default_database.is_file() {
            debug!(
                "No uploads yet, using default database {}",
                self.default_database.display()
            );
            let store = self.open(&self.default_database).await?;
            let summary = store.summarize().await;
            store.close().await?;
            let summary = summary?;
            let name = self
                .default_database
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("default")
                .to_string();
            return Ok(ResolvedDataset {
                name,
                db_path: self.default_database.clone(),
                schema: summary.format_for_llm(),
                summary,
            });
        }

        Err(AskError::not_found(NO_DATASET_MESSAGE))
    }

    async fn from_context(&self, name: String, path: &Path) -> Result<ResolvedDataset> {
        let context = SchemaContext::load(path)?;
        let summary = match context.summary {
            Some(summary) => summary,
            None => {
                let store = self.open(&context.db_path).await?;
                let summary = store.summarize().await;
                store.close().await?;
                summary?
            }
        };

        Ok(ResolvedDataset {
            name,
            db_path: context.db_path,
            schema: context.schema,
            summary,
        })
    }

    /// Opens a store read-only with the configured query timeout.
    pub async fn open(&self, path: &Path) -> Result<SqliteClient> {
        Ok(SqliteClient::open_read_only(path)
            .await?
            .with_query_timeout(self.query_timeout))
    }
}

/// Reduces an upload name to its final path component.
fn sanitize_filename(filename: &str) -> Option<String> {
    let name = filename.rsplit(['/', '\\']).next()?.trim();
    if name.is_empty() || name.starts_with('.') {
        return None;
    }
    Some(name.to_string())
}

fn is_plain_name(name: &str) -> bool {
    !name.contains(['/', '\\']) && name != "." && name != ".."
}
