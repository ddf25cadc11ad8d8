//! Collector name → factory table.
//!
//! Registration happens once at start-up on a [`RegistryBuilder`]. Sealing
//! consumes the builder and yields a read-only [`CollectorRegistry`], so no
//! lock is needed to serve lookups afterwards.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use hostex_common::error::{HostexError, Result};
use tracing::{info, warn};

use crate::{
    collector::{Collector, CollectorDeps, CollectorFactory, NamedCollector},
    collectors,
};

/// Expands to every registered collector in `--collectors.enabled`.
pub const DEFAULTS_PLACEHOLDER: &str = "[defaults]";

#[derive(Default)]
pub struct RegistryBuilder {
    entries: Vec<(String, CollectorFactory)>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// # Panics
    ///
    /// Panics when `name` is already registered. Duplicate names are a
    /// programming error, not something to recover from.
    pub fn register(&mut self, name: &str, factory: CollectorFactory) {
        if self.entries.iter().any(|(existing, _)| existing == name) {
            panic!("collector already registered: {name}");
        }
        self.entries.push((name.to_string(), factory));
    }

    pub fn seal(self) -> CollectorRegistry {
        let index = self
            .entries
            .iter()
            .enumerate()
            .map(|(position, (name, _))| (name.clone(), position))
            .collect();

        CollectorRegistry {
            entries: self.entries,
            index,
        }
    }
}

/// Registry with every built-in collector.
pub fn default_registry() -> CollectorRegistry {
    let mut builder = RegistryBuilder::new();
    collectors::register_all(&mut builder);
    builder.seal()
}

pub struct CollectorRegistry {
    entries: Vec<(String, CollectorFactory)>,
    index: HashMap<String, usize>,
}

impl CollectorRegistry {
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Validates a configured collector list against the registry.
    ///
    /// `[defaults]` expands to every registered name. Duplicates are dropped,
    /// first occurrence wins. Any unknown name is an error.
    pub fn resolve_enabled(&self, requested: &[String]) -> Result<Vec<String>> {
        let mut resolved = Vec::new();
        let mut seen = HashSet::new();

        for name in requested.iter().map(|name| name.trim()) {
            if name.is_empty() {
                continue;
            }

            if name == DEFAULTS_PLACEHOLDER {
                for default in self.names() {
                    if seen.insert(default.to_string()) {
                        resolved.push(default.to_string());
                    }
                }
                continue;
            }

            if !self.contains(name) {
                return Err(HostexError::UnknownCollector(name.to_string()));
            }
            if seen.insert(name.to_string()) {
                resolved.push(name.to_string());
            }
        }

        Ok(resolved)
    }

    /// Instantiates the requested collectors in request order. Each name gets
    /// exactly one collector or one error; a failing factory does not stop
    /// the others.
    pub fn get(
        &self,
        names: &[String],
        deps: &CollectorDeps,
    ) -> Vec<(String, Result<Box<dyn Collector>>)> {
        names
            .iter()
            .map(|name| {
                let collector = match self.index.get(name) {
                    Some(&position) => (self.entries[position].1)(deps),
                    None => Err(HostexError::UnknownCollector(name.clone())),
                };
                (name.clone(), collector)
            })
            .collect()
    }

    /// Builds the active set for the process lifetime. Collectors whose
    /// factory fails are logged and left out.
    ///
    /// # Panics
    ///
    /// Panics when two active collectors declare the same qualified metric name.
    pub fn build(&self, names: &[String], deps: &CollectorDeps) -> Vec<NamedCollector> {
        let mut active = Vec::new();
        let mut owners: HashMap<String, String> = HashMap::new();

        for (name, result) in self.get(names, deps) {
            let collector = match result {
                Ok(collector) => collector,
                Err(err) => {
                    warn!(
                        collector = %name,
                        error = %err,
                        "collector unavailable on this host, excluding it"
                    );
                    continue;
                }
            };

            for descriptor in collector.descriptors() {
                if let Some(owner) = owners.insert(descriptor.name.clone(), name.clone()) {
                    panic!(
                        "metric {} declared by both {owner} and {name}",
                        descriptor.name
                    );
                }
            }

            info!(collector = %name, "collector enabled");
            active.push(NamedCollector::new(name, Arc::from(collector)));
        }

        active
    }
}
