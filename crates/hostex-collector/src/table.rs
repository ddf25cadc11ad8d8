//! Schema-driven mapping of native rows to typed samples.
//!
//! Each adapter declares a [`Schema`]: the native class it reads, the numeric
//! fields it exposes (with their metric name and kind) and the text fields it
//! turns into labels. [`TableCollector`] does the query and the conversion.

use std::sync::Arc;

use async_trait::async_trait;
use hostex_common::error::{HostexError, Result};
use hostex_metrics::{MetricDescriptor, MetricKind, MetricSender, Sample};
use tracing::debug;

use crate::{
    collector::{Collector, CollectorDeps},
    context::ScrapeContext,
    source::{FieldValue, QueryRequest, Row, SourceHandle},
};

#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub field: &'static str,
    pub metric: &'static str,
    pub help: &'static str,
    pub kind: MetricKind,
}

impl FieldSpec {
    pub const fn counter(field: &'static str, metric: &'static str, help: &'static str) -> Self {
        Self {
            field,
            metric,
            help,
            kind: MetricKind::Counter,
        }
    }

    pub const fn gauge(field: &'static str, metric: &'static str, help: &'static str) -> Self {
        Self {
            field,
            metric,
            help,
            kind: MetricKind::Gauge,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LabelSpec {
    pub field: &'static str,
    pub label: &'static str,
}

#[derive(Debug)]
pub struct Schema {
    pub class: &'static str,
    pub subsystem: &'static str,
    pub fields: &'static [FieldSpec],
    pub labels: &'static [LabelSpec],
    /// Rows whose label values include one of these are dropped, e.g. the
    /// `_Global_` aggregate instance.
    pub skip_instances: &'static [&'static str],
}

/// One converted row: label values in label order, values in field order.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub labels: Vec<String>,
    pub values: Vec<f64>,
}

impl Schema {
    pub fn request(&self) -> QueryRequest {
        let fields = self
            .labels
            .iter()
            .map(|label| label.field)
            .chain(self.fields.iter().map(|field| field.field))
            .map(str::to_string)
            .collect();

        QueryRequest {
            class: self.class.to_string(),
            fields,
        }
    }

    /// Converts one row, or returns `None` for a skipped instance.
    pub fn convert(&self, row: &Row) -> Result<Option<Record>> {
        let labels = self
            .labels
            .iter()
            .map(|spec| self.text(row, spec.field))
            .collect::<Result<Vec<_>>>()?;

        if labels
            .iter()
            .any(|value| self.skip_instances.contains(&value.as_str()))
        {
            return Ok(None);
        }

        let values = self
            .fields
            .iter()
            .map(|spec| self.number(row, spec.field))
            .collect::<Result<Vec<_>>>()?;

        Ok(Some(Record { labels, values }))
    }

    fn number(&self, row: &Row, field: &str) -> Result<f64> {
        match row.get(field) {
            Some(FieldValue::Unsigned(value)) => Ok(*value as f64),
            Some(FieldValue::Signed(value)) => Ok(*value as f64),
            Some(FieldValue::Float(value)) => Ok(*value),
            // 64-bit counters arrive as decimal strings from some sources.
            Some(FieldValue::Text(text)) => parse_decimal(text.trim()).ok_or_else(|| {
                self.mismatch(field, format!("expected a decimal number, found {text:?}"))
            }),
            Some(FieldValue::Null) => Err(self.mismatch(field, "value is null")),
            None => Err(self.mismatch(field, "field missing from row")),
        }
    }

    fn text(&self, row: &Row, field: &str) -> Result<String> {
        match row.get(field) {
            Some(FieldValue::Text(text)) => Ok(text.clone()),
            Some(FieldValue::Null) => Err(self.mismatch(field, "value is null")),
            Some(other) => Err(self.mismatch(field, format!("expected text, found {other:?}"))),
            None => Err(self.mismatch(field, "field missing from row")),
        }
    }

    fn mismatch(&self, field: &str, reason: impl Into<String>) -> HostexError {
        HostexError::SchemaMismatch {
            class: self.class.to_string(),
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

/// Plain decimal notation only: no exponent, no `inf` or `NaN` spellings.
fn parse_decimal(text: &str) -> Option<f64> {
    if !text
        .bytes()
        .all(|byte| byte.is_ascii_digit() || matches!(byte, b'.' | b'-' | b'+'))
    {
        return None;
    }
    text.parse::<f64>().ok().filter(|value| value.is_finite())
}

pub struct TableCollector {
    schema: &'static Schema,
    descriptors: Vec<Arc<MetricDescriptor>>,
    source: SourceHandle,
}

impl TableCollector {
    pub fn new(schema: &'static Schema, deps: &CollectorDeps) -> Result<Self> {
        if !deps.source.supports(schema.class) {
            return Err(HostexError::Unsupported(schema.class.to_string()));
        }

        let label_names: Vec<&str> = schema.labels.iter().map(|spec| spec.label).collect();
        let descriptors = schema
            .fields
            .iter()
            .map(|spec| {
                MetricDescriptor::new(
                    &deps.namespace,
                    schema.subsystem,
                    spec.metric,
                    spec.help,
                    spec.kind,
                    &label_names,
                )
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            schema,
            descriptors,
            source: SourceHandle::new(Arc::clone(&deps.source)),
        })
    }
}

#[async_trait]
impl Collector for TableCollector {
    fn descriptors(&self) -> Vec<Arc<MetricDescriptor>> {
        self.descriptors.clone()
    }

    async fn collect(&self, ctx: &ScrapeContext, sink: MetricSender) -> Result<()> {
        let rows = self.source.query(self.schema.request()).await?;
        // Waiting on the query gate can outlast the scrape.
        if ctx.is_expired() {
            return Err(HostexError::Timeout(ctx.timeout()));
        }
        debug!(class = self.schema.class, rows = rows.len(), "native query returned");

        // Convert everything before emitting so a bad row yields no samples.
        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            if let Some(record) = self.schema.convert(row)? {
                records.push(record);
            }
        }

        for record in records {
            for (descriptor, value) in self.descriptors.iter().zip(record.values) {
                let sample = Sample::new(Arc::clone(descriptor), value, record.labels.clone())?;
                if ctx.accepts(&sample) {
                    sink.send(sample).await?;
                }
            }
        }

        Ok(())
    }
}
