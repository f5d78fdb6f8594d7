//! Schema context sidecar files.
//!
//! Each dataset keeps a `<name>_context.json` next to its store holding the
//! prompt-ready schema text and the store location. The structured summary is
//! stored too so API responses never have to re-derive it from the text.

use crate::db::DatabaseSummary;
use crate::error::{AskError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Suffix appended to a dataset name to form its sidecar file name.
pub const CONTEXT_SUFFIX: &str = "_context.json";

/// Cached schema description of one dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaContext {
    /// Schema text as embedded in prompts.
    pub schema: String,

    /// Location of the dataset store.
    pub db_path: PathBuf,

    /// Name of the imported table.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_name: Option<String>,

    /// Structured summary; absent in sidecars written by older versions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<DatabaseSummary>,
}

impl SchemaContext {
    /// Builds a context from a fresh summary.
    pub fn new(db_path: PathBuf, table_name: &str, summary: DatabaseSummary) -> Self {
        Self {
            schema: summary.format_for_llm(),
            db_path,
            table_name: Some(table_name.to_string()),
            summary: Some(summary),
        }
    }

    /// Sidecar path for a dataset in `dir`.
    pub fn path_for(dir: &Path, dataset: &str) -> PathBuf {
        dir.join(format!("{}{}", dataset, CONTEXT_SUFFIX))
    }

    /// Dataset name encoded in a sidecar file name, if it is one.
    pub fn dataset_name(path: &Path) -> Option<String> {
        path.file_name()?
            .to_str()?
            .strip_suffix(CONTEXT_SUFFIX)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
    }

    /// Reads a sidecar file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            AskError::dataset(format!("Failed to read {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            AskError::dataset(format!("Invalid context file {}: {}", path.display(), e))
        })
    }

    /// Writes the sidecar through a temporary file and a rename.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| AskError::internal(format!("Failed to serialize context: {e}")))?;

        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, content)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }
}
