//! Native performance-counter sources.
//!
//! A source answers "all rows of this class" queries with flat rows of named
//! values. Sources are synchronous; [`SourceHandle`] moves the call onto the
//! blocking pool and serializes queries per collector.

pub mod memory;
pub mod snapshot;
#[cfg(windows)]
pub mod windows;

use std::{collections::BTreeMap, sync::Arc};

use hostex_common::error::{HostexError, Result};
use serde::Deserialize;
use tokio::sync::Semaphore;

pub use memory::MemorySource;
pub use snapshot::SnapshotSource;
#[cfg(windows)]
pub use self::windows::WmiSource;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Unsigned(u64),
    Signed(i64),
    Float(f64),
    Text(String),
    Null,
}

impl From<u64> for FieldValue {
    fn from(value: u64) -> Self {
        Self::Unsigned(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Signed(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

pub type Row = BTreeMap<String, FieldValue>;

/// Builds a row from `(field, value)` pairs.
pub fn row<K, V>(fields: impl IntoIterator<Item = (K, V)>) -> Row
where
    K: Into<String>,
    V: Into<FieldValue>,
{
    fields
        .into_iter()
        .map(|(key, value)| (key.into(), value.into()))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRequest {
    pub class: String,
    pub fields: Vec<String>,
}

impl QueryRequest {
    pub fn wql(&self) -> String {
        if self.fields.is_empty() {
            format!("SELECT * FROM {}", self.class)
        } else {
            format!("SELECT {} FROM {}", self.fields.join(", "), self.class)
        }
    }
}

pub trait NativeSource: Send + Sync + 'static {
    fn name(&self) -> &str;

    /// Whether `class` can be queried on this host at all.
    fn supports(&self, class: &str) -> bool;

    fn query(&self, request: &QueryRequest) -> Result<Vec<Row>>;
}

/// A collector's handle on its native source.
///
/// Queries run on the blocking pool while holding the handle's single
/// permit. If the scrape abandons a query, the permit stays with the blocking
/// call until it returns, so the next cycle waits for the previous query to
/// release its native resources instead of opening a second one.
#[derive(Clone)]
pub struct SourceHandle {
    source: Arc<dyn NativeSource>,
    gate: Arc<Semaphore>,
}

impl SourceHandle {
    pub fn new(source: Arc<dyn NativeSource>) -> Self {
        Self {
            source,
            gate: Arc::new(Semaphore::new(1)),
        }
    }

    pub async fn query(&self, request: QueryRequest) -> Result<Vec<Row>> {
        let permit = Arc::clone(&self.gate)
            .acquire_owned()
            .await
            .map_err(|_| HostexError::InternalError("query gate closed".to_string()))?;
        let source = Arc::clone(&self.source);

        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            source.query(&request)
        })
        .await
        .map_err(|err| HostexError::InternalError(format!("native query task failed: {err}")))?
    }

    pub fn in_flight(&self) -> bool {
        self.gate.available_permits() == 0
    }
}
