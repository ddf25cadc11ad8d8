use std::{
    collections::HashMap,
    sync::RwLock,
    time::Duration,
};

use hostex_common::error::{HostexError, Result};

use super::{NativeSource, QueryRequest, Row};

#[derive(Debug, Clone, Default)]
struct Table {
    rows: Vec<Row>,
    failure: Option<String>,
    delay: Option<Duration>,
    queries: u64,
}

/// In-memory source. Each class holds a fixed row set and can be told to
/// fail or to stall before answering.
#[derive(Debug, Default)]
pub struct MemorySource {
    tables: RwLock<HashMap<String, Table>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_rows(&self, class: &str, rows: Vec<Row>) {
        self.with_table(class, |table| {
            table.rows = rows;
            table.failure = None;
        });
    }

    pub fn fail(&self, class: &str, message: impl Into<String>) {
        let message = message.into();
        self.with_table(class, |table| table.failure = Some(message));
    }

    pub fn set_delay(&self, class: &str, delay: Duration) {
        self.with_table(class, |table| table.delay = Some(delay));
    }

    pub fn query_count(&self, class: &str) -> u64 {
        self.tables
            .read()
            .ok()
            .and_then(|tables| tables.get(class).map(|table| table.queries))
            .unwrap_or_default()
    }

    fn with_table(&self, class: &str, update: impl FnOnce(&mut Table)) {
        if let Ok(mut tables) = self.tables.write() {
            update(tables.entry(class.to_string()).or_default());
        }
    }
}

impl NativeSource for MemorySource {
    fn name(&self) -> &str {
        "memory"
    }

    fn supports(&self, class: &str) -> bool {
        self.tables
            .read()
            .map(|tables| tables.contains_key(class))
            .unwrap_or(false)
    }

    fn query(&self, request: &QueryRequest) -> Result<Vec<Row>> {
        let (delay, outcome) = {
            let mut tables = self.tables.write().map_err(|_| {
                HostexError::InternalError("memory source lock poisoned".to_string())
            })?;
            let table = tables
                .get_mut(&request.class)
                .ok_or_else(|| HostexError::Query(format!("invalid class: {}", request.class)))?;
            table.queries += 1;

            let outcome = match &table.failure {
                Some(message) => Err(HostexError::Query(message.clone())),
                None => Ok(table.rows.clone()),
            };
            (table.delay, outcome)
        };

        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }

        outcome
    }
}
