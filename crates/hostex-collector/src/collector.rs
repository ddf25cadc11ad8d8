use std::sync::Arc;

use async_trait::async_trait;
use hostex_common::error::Result;
use hostex_metrics::{MetricDescriptor, MetricSender};

use crate::{context::ScrapeContext, source::NativeSource};

/// Uniform contract for one counter family.
///
/// `collect` is invoked once per scrape cycle. The sink is handed over by
/// value and dropped on return, so nothing can be written for this cycle
/// afterwards. A failed invocation reports a single error; whatever it
/// already sent is discarded by the orchestrator.
#[async_trait]
pub trait Collector: Send + Sync {
    /// Every descriptor this collector can emit. Built once at construction.
    fn descriptors(&self) -> Vec<Arc<MetricDescriptor>>;

    async fn collect(&self, ctx: &ScrapeContext, sink: MetricSender) -> Result<()>;
}

/// What a factory needs to build a collector on this host.
#[derive(Clone)]
pub struct CollectorDeps {
    pub namespace: String,
    pub source: Arc<dyn NativeSource>,
}

pub type CollectorFactory = fn(&CollectorDeps) -> Result<Box<dyn Collector>>;

#[derive(Clone)]
pub struct NamedCollector {
    pub name: Arc<str>,
    pub collector: Arc<dyn Collector>,
}

impl NamedCollector {
    pub fn new(name: impl Into<Arc<str>>, collector: Arc<dyn Collector>) -> Self {
        Self {
            name: name.into(),
            collector,
        }
    }
}

impl std::fmt::Debug for NamedCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NamedCollector")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
