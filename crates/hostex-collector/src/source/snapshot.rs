use std::path::{Path, PathBuf};

use hostex_common::error::{HostexError, Result};
use tracing::debug;

use super::{NativeSource, QueryRequest, Row};

/// Reads counter tables from `<dir>/<class>.json`, one JSON array of row
/// objects per class. Files are re-read on every query.
#[derive(Debug, Clone)]
pub struct SnapshotSource {
    root: PathBuf,
}

impl SnapshotSource {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(HostexError::InvalidArgument(format!(
                "snapshot directory does not exist: {}",
                root.display()
            )));
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn table_path(&self, class: &str) -> PathBuf {
        self.root.join(format!("{class}.json"))
    }
}

impl NativeSource for SnapshotSource {
    fn name(&self) -> &str {
        "snapshot"
    }

    fn supports(&self, class: &str) -> bool {
        self.table_path(class).is_file()
    }

    fn query(&self, request: &QueryRequest) -> Result<Vec<Row>> {
        let path = self.table_path(&request.class);
        debug!(query = %request.wql(), path = %path.display(), "reading snapshot table");

        let raw = std::fs::read_to_string(&path)
            .map_err(|err| HostexError::Query(format!("{}: {err}", path.display())))?;
        serde_json::from_str(&raw)
            .map_err(|err| HostexError::Query(format!("{}: {err}", path.display())))
    }
}
