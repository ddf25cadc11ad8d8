use std::sync::Arc;

use hostex_common::error::{HostexError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricKind {
    /// Monotonically non-decreasing until the counter source restarts.
    Counter,
    /// Point-in-time value that may move in either direction.
    Gauge,
}

impl MetricKind {
    pub fn as_prometheus_type(&self) -> &'static str {
        match self {
            Self::Counter => "counter",
            Self::Gauge => "gauge",
        }
    }
}

/// Immutable identity of one exposed metric.
///
/// Descriptors are built once when a collector is constructed and shared via
/// [`Arc`] by every sample emitted under them, so two samples of the same
/// metric can be matched with [`Arc::ptr_eq`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricDescriptor {
    pub name: String,
    pub help: String,
    pub kind: MetricKind,
    pub label_names: Vec<String>,
}

impl MetricDescriptor {
    pub fn new(
        namespace: &str,
        subsystem: &str,
        name: &str,
        help: &str,
        kind: MetricKind,
        label_names: &[&str],
    ) -> Result<Arc<Self>> {
        if name.is_empty() {
            return Err(HostexError::InvalidMetricName(
                "metric name must not be empty".to_string(),
            ));
        }

        for component in [namespace, subsystem, name] {
            if !component.is_empty() && !is_valid_metric_component(component) {
                return Err(HostexError::InvalidMetricName(component.to_string()));
            }
        }

        for label in label_names {
            if !is_valid_label_name(label) {
                return Err(HostexError::InvalidLabelName((*label).to_string()));
            }
        }

        Ok(Arc::new(Self {
            name: build_fq_name(namespace, subsystem, name),
            help: help.to_string(),
            kind,
            label_names: label_names.iter().map(|label| (*label).to_string()).collect(),
        }))
    }
}

/// Joins the non-empty name components with `_`.
pub fn build_fq_name(namespace: &str, subsystem: &str, name: &str) -> String {
    [namespace, subsystem, name]
        .into_iter()
        .filter(|component| !component.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

fn is_valid_metric_component(value: &str) -> bool {
    let mut chars = value.chars();
    chars
        .next()
        .is_some_and(|first| first.is_ascii_alphabetic() || first == '_' || first == ':')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
}

fn is_valid_label_name(value: &str) -> bool {
    let mut chars = value.chars();
    !value.starts_with("__")
        && chars
            .next()
            .is_some_and(|first| first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// One observed value of a descriptor, alive only for the scrape that produced it.
#[derive(Debug, Clone)]
pub struct Sample {
    pub descriptor: Arc<MetricDescriptor>,
    pub kind: MetricKind,
    pub label_values: Vec<String>,
    pub value: f64,
}

impl Sample {
    pub fn new(
        descriptor: Arc<MetricDescriptor>,
        value: f64,
        label_values: Vec<String>,
    ) -> Result<Self> {
        if label_values.len() != descriptor.label_names.len() {
            return Err(HostexError::LabelArity {
                metric: descriptor.name.clone(),
                expected: descriptor.label_names.len(),
                actual: label_values.len(),
            });
        }

        Ok(Self {
            kind: descriptor.kind,
            descriptor,
            label_values,
            value,
        })
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn label(&self, name: &str) -> Option<&str> {
        self.descriptor
            .label_names
            .iter()
            .position(|label| label == name)
            .and_then(|index| self.label_values.get(index))
            .map(String::as_str)
    }
}
