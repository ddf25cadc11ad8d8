//! Scrape orchestration.
//!
//! One scrape runs every selected collector on its own task, feeding a single
//! bounded channel. Samples are buffered per collector and only kept for
//! collectors that finished successfully before the deadline. Every collector
//! additionally gets duration, success and timeout meta-metrics.

use std::{any::Any, collections::HashMap, sync::Arc, time::Duration};

use hostex_common::error::{HostexError, Result};
use hostex_metrics::{MetricDescriptor, MetricKind, Sample, metric_channel};
use tokio::{task::JoinSet, time::Instant};
use tracing::{debug, warn};

use crate::{collector::NamedCollector, context::ScrapeContext};

#[derive(Debug, Clone)]
pub struct ScraperConfig {
    pub channel_capacity: usize,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 1024,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CollectorStatus {
    pub name: Arc<str>,
    pub success: bool,
    pub timed_out: bool,
    pub duration: Duration,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ScrapeReport {
    pub samples: Vec<Sample>,
    pub statuses: Vec<CollectorStatus>,
}

impl ScrapeReport {
    /// True when at least one collector ran and none of them succeeded.
    pub fn all_failed(&self) -> bool {
        !self.statuses.is_empty() && self.statuses.iter().all(|status| !status.success)
    }

    pub fn status(&self, name: &str) -> Option<&CollectorStatus> {
        self.statuses.iter().find(|status| &*status.name == name)
    }
}

struct ScrapeMetrics {
    duration: Arc<MetricDescriptor>,
    success: Arc<MetricDescriptor>,
    timeout: Arc<MetricDescriptor>,
}

impl ScrapeMetrics {
    fn new(namespace: &str) -> Result<Self> {
        Ok(Self {
            duration: MetricDescriptor::new(
                namespace,
                "exporter",
                "collector_duration_seconds",
                "Duration of a collection.",
                MetricKind::Gauge,
                &["collector"],
            )?,
            success: MetricDescriptor::new(
                namespace,
                "exporter",
                "collector_success",
                "Whether the collector was successful.",
                MetricKind::Gauge,
                &["collector"],
            )?,
            timeout: MetricDescriptor::new(
                namespace,
                "exporter",
                "collector_timeout",
                "Whether the collector timed out.",
                MetricKind::Gauge,
                &["collector"],
            )?,
        })
    }

    fn owns(&self, name: &str) -> bool {
        [&self.duration, &self.success, &self.timeout]
            .iter()
            .any(|descriptor| descriptor.name == name)
    }

    fn samples(&self, status: &CollectorStatus) -> Result<[Sample; 3]> {
        let label = vec![status.name.to_string()];
        Ok([
            Sample::new(
                Arc::clone(&self.duration),
                status.duration.as_secs_f64(),
                label.clone(),
            )?,
            Sample::new(
                Arc::clone(&self.success),
                if status.success { 1.0 } else { 0.0 },
                label.clone(),
            )?,
            Sample::new(
                Arc::clone(&self.timeout),
                if status.timed_out { 1.0 } else { 0.0 },
                label,
            )?,
        ])
    }
}

pub struct Scraper {
    collectors: Vec<NamedCollector>,
    config: ScraperConfig,
    meta: ScrapeMetrics,
}

impl Scraper {
    /// # Panics
    ///
    /// Panics when a collector declares one of the meta-metric names.
    pub fn new(
        namespace: &str,
        collectors: Vec<NamedCollector>,
        config: ScraperConfig,
    ) -> Result<Self> {
        let meta = ScrapeMetrics::new(namespace)?;
        for entry in &collectors {
            for descriptor in entry.collector.descriptors() {
                if meta.owns(&descriptor.name) {
                    panic!(
                        "metric {} declared by {} is reserved for scrape meta-metrics",
                        descriptor.name, entry.name
                    );
                }
            }
        }

        Ok(Self {
            collectors,
            config,
            meta,
        })
    }

    pub fn collector_names(&self) -> impl Iterator<Item = &str> {
        self.collectors.iter().map(|entry| &*entry.name)
    }

    pub fn is_active(&self, name: &str) -> bool {
        self.collectors.iter().any(|entry| &*entry.name == name)
    }

    /// Runs one scrape cycle over `selection`, or over every active collector
    /// when `selection` is `None`. Naming a collector that is not active is an
    /// error; collector failures are not.
    pub async fn scrape(
        &self,
        ctx: &ScrapeContext,
        selection: Option<&[String]>,
    ) -> Result<ScrapeReport> {
        let selected = self.select(selection)?;
        let started_at = Instant::now();

        let (tx, mut rx) = metric_channel(self.config.channel_capacity);
        let mut tasks = JoinSet::new();
        let mut origins = HashMap::new();
        for (origin, entry) in selected.iter().enumerate() {
            let collector = Arc::clone(&entry.collector);
            let sink = tx.scoped(origin);
            let ctx = ctx.clone();
            let handle = tasks.spawn(async move { collector.collect(&ctx, sink).await });
            origins.insert(handle.id(), origin);
        }
        drop(tx);

        let mut buffers: Vec<Vec<Sample>> = vec![Vec::new(); selected.len()];
        let mut outcomes: Vec<Option<(Duration, Result<()>)>> =
            (0..selected.len()).map(|_| None).collect();

        let deadline = tokio::time::sleep_until(ctx.deadline());
        tokio::pin!(deadline);

        while !tasks.is_empty() {
            tokio::select! {
                biased;
                Some(envelope) = rx.recv() => {
                    buffers[envelope.origin].push(envelope.sample);
                }
                Some(joined) = tasks.join_next_with_id() => {
                    let (id, result) = match joined {
                        Ok((id, result)) => (id, result),
                        Err(err) => {
                            let id = err.id();
                            let message = if err.is_panic() {
                                panic_message(err.into_panic())
                            } else {
                                "task cancelled".to_string()
                            };
                            (id, Err(HostexError::CollectorPanicked(message)))
                        }
                    };
                    if let Some(&origin) = origins.get(&id) {
                        outcomes[origin] = Some((started_at.elapsed(), result));
                    }
                }
                () = &mut deadline => break,
            }
        }

        // Dropping the futures of collectors still running releases whatever
        // they hold; blocking queries keep their gate until they return.
        tasks.abort_all();
        let abandoned_after = started_at.elapsed();
        for envelope in rx.close_and_drain() {
            buffers[envelope.origin].push(envelope.sample);
        }

        let mut report = ScrapeReport::default();
        for ((entry, buffer), outcome) in selected.iter().zip(buffers).zip(outcomes) {
            let status = match outcome {
                Some((duration, Ok(()))) => {
                    debug!(
                        collector = %entry.name,
                        samples = buffer.len(),
                        ?duration,
                        "collector succeeded"
                    );
                    report.samples.extend(buffer);
                    CollectorStatus {
                        name: Arc::clone(&entry.name),
                        success: true,
                        timed_out: false,
                        duration,
                        error: None,
                    }
                }
                Some((duration, Err(err))) => {
                    warn!(collector = %entry.name, ?duration, error = %err, "collector failed");
                    CollectorStatus {
                        name: Arc::clone(&entry.name),
                        success: false,
                        timed_out: false,
                        duration,
                        error: Some(err.to_string()),
                    }
                }
                None => {
                    let err = HostexError::Timeout(ctx.timeout());
                    warn!(
                        collector = %entry.name,
                        duration = ?abandoned_after,
                        error = %err,
                        "collector abandoned at scrape deadline"
                    );
                    CollectorStatus {
                        name: Arc::clone(&entry.name),
                        success: false,
                        timed_out: true,
                        duration: abandoned_after,
                        error: Some(err.to_string()),
                    }
                }
            };
            report.statuses.push(status);
        }

        for status in &report.statuses {
            report.samples.extend(self.meta.samples(status)?);
        }

        Ok(report)
    }

    fn select(&self, selection: Option<&[String]>) -> Result<Vec<NamedCollector>> {
        let Some(names) = selection else {
            return Ok(self.collectors.clone());
        };

        let mut selected: Vec<NamedCollector> = Vec::with_capacity(names.len());
        for name in names {
            if selected.iter().any(|entry| &*entry.name == name.as_str()) {
                continue;
            }
            if !self.is_active(name) {
                return Err(HostexError::CollectorNotEnabled(name.clone()));
            }
            selected.extend(
                self.collectors
                    .iter()
                    .filter(|entry| &*entry.name == name.as_str())
                    .cloned(),
            );
        }
        Ok(selected)
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use hostex_metrics::MetricSender;

    use super::*;
    use crate::{
        collector::{Collector, CollectorDeps},
        collectors::{aad_app_proxy_connector, clr_security},
        registry::default_registry,
        source::{FieldValue, MemorySource, Row, row},
    };

    struct Emitting {
        descriptor: Arc<MetricDescriptor>,
        values: Vec<f64>,
    }

    impl Emitting {
        fn new(name: &str, values: Vec<f64>) -> Self {
            Self {
                descriptor: MetricDescriptor::new("test", "", name, "", MetricKind::Counter, &[])
                    .unwrap(),
                values,
            }
        }
    }

    #[async_trait]
    impl Collector for Emitting {
        fn descriptors(&self) -> Vec<Arc<MetricDescriptor>> {
            vec![Arc::clone(&self.descriptor)]
        }

        async fn collect(&self, _ctx: &ScrapeContext, sink: MetricSender) -> Result<()> {
            for value in &self.values {
                sink.send(Sample::new(Arc::clone(&self.descriptor), *value, Vec::new())?)
                    .await?;
            }
            Ok(())
        }
    }

    /// Emits one sample, then fails.
    struct Failing(Arc<MetricDescriptor>);

    #[async_trait]
    impl Collector for Failing {
        fn descriptors(&self) -> Vec<Arc<MetricDescriptor>> {
            vec![Arc::clone(&self.0)]
        }

        async fn collect(&self, _ctx: &ScrapeContext, sink: MetricSender) -> Result<()> {
            sink.send(Sample::new(Arc::clone(&self.0), 1.0, Vec::new())?)
                .await?;
            Err(HostexError::Query("native source unavailable".to_string()))
        }
    }

    /// Emits one sample, then never returns.
    struct Hanging(Arc<MetricDescriptor>);

    #[async_trait]
    impl Collector for Hanging {
        fn descriptors(&self) -> Vec<Arc<MetricDescriptor>> {
            vec![Arc::clone(&self.0)]
        }

        async fn collect(&self, _ctx: &ScrapeContext, sink: MetricSender) -> Result<()> {
            sink.send(Sample::new(Arc::clone(&self.0), 1.0, Vec::new())?)
                .await?;
            std::future::pending::<()>().await;
            Ok(())
        }
    }

    struct Panicking;

    #[async_trait]
    impl Collector for Panicking {
        fn descriptors(&self) -> Vec<Arc<MetricDescriptor>> {
            Vec::new()
        }

        async fn collect(&self, _ctx: &ScrapeContext, _sink: MetricSender) -> Result<()> {
            panic!("counter table corrupted");
        }
    }

    fn named(name: &str, collector: impl Collector + 'static) -> NamedCollector {
        NamedCollector::new(name, Arc::new(collector))
    }

    fn descriptor(name: &str) -> Arc<MetricDescriptor> {
        MetricDescriptor::new("test", "", name, "", MetricKind::Gauge, &[]).unwrap()
    }

    fn meta_value(report: &ScrapeReport, metric: &str, collector: &str) -> Option<f64> {
        report
            .samples
            .iter()
            .find(|sample| sample.name() == metric && sample.label("collector") == Some(collector))
            .map(|sample| sample.value)
    }

    #[tokio::test(start_paused = true)]
    async fn failing_and_hanging_collectors_do_not_affect_others() {
        let scraper = Scraper::new(
            "windows",
            vec![
                named("good", Emitting::new("good_total", vec![1.0, 2.0, 3.0])),
                named("broken", Failing(descriptor("broken"))),
                named("stuck", Hanging(descriptor("stuck"))),
                named("panics", Panicking),
            ],
            ScraperConfig::default(),
        )
        .unwrap();

        let ctx = ScrapeContext::new(Duration::from_secs(2));
        let started_at = Instant::now();
        let report = scraper.scrape(&ctx, None).await.unwrap();
        assert!(started_at.elapsed() <= Duration::from_secs(2));

        let data: Vec<_> = report
            .samples
            .iter()
            .filter(|sample| !sample.name().starts_with("windows_exporter_"))
            .collect();
        assert_eq!(data.len(), 3);
        assert!(data.iter().all(|sample| sample.name() == "test_good_total"));
        assert_eq!(
            data.iter().map(|sample| sample.value).collect::<Vec<_>>(),
            vec![1.0, 2.0, 3.0]
        );

        let good = report.status("good").unwrap();
        assert!(good.success && !good.timed_out);

        let broken = report.status("broken").unwrap();
        assert!(!broken.success && !broken.timed_out);
        assert!(broken.error.as_deref().unwrap().contains("native source unavailable"));

        let stuck = report.status("stuck").unwrap();
        assert!(!stuck.success && stuck.timed_out);

        let panics = report.status("panics").unwrap();
        assert!(!panics.success);
        assert!(panics.error.as_deref().unwrap().contains("counter table corrupted"));

        assert_eq!(meta_value(&report, "windows_exporter_collector_success", "good"), Some(1.0));
        assert_eq!(meta_value(&report, "windows_exporter_collector_success", "broken"), Some(0.0));
        assert_eq!(meta_value(&report, "windows_exporter_collector_timeout", "stuck"), Some(1.0));
        assert_eq!(meta_value(&report, "windows_exporter_collector_timeout", "broken"), Some(0.0));
        assert!(
            meta_value(&report, "windows_exporter_collector_duration_seconds", "stuck").is_some()
        );
        assert!(!report.all_failed());
    }

    #[test]
    #[should_panic(expected = "reserved for scrape meta-metrics")]
    fn collector_cannot_shadow_meta_metrics() {
        let shadow = MetricDescriptor::new(
            "windows",
            "exporter",
            "collector_success",
            "",
            MetricKind::Counter,
            &[],
        )
        .unwrap();
        let _ = Scraper::new(
            "windows",
            vec![named("shadow", Failing(shadow))],
            ScraperConfig::default(),
        );
    }

    #[test]
    fn meta_names_follow_the_namespace() {
        let custom =
            MetricDescriptor::new("test", "", "collector_success", "", MetricKind::Gauge, &[])
                .unwrap();
        let scraper = Scraper::new(
            "windows",
            vec![named("custom", Failing(custom))],
            ScraperConfig::default(),
        )
        .unwrap();
        assert_eq!(scraper.collector_names().collect::<Vec<_>>(), vec!["custom"]);
    }

    #[tokio::test]
    async fn selection_limits_and_validates_collectors() {
        let scraper = Scraper::new(
            "windows",
            vec![
                named("a", Emitting::new("a_total", vec![1.0])),
                named("b", Emitting::new("b_total", vec![2.0])),
            ],
            ScraperConfig::default(),
        )
        .unwrap();
        let ctx = ScrapeContext::new(Duration::from_secs(5));

        let selection = vec!["b".to_string(), "b".to_string()];
        let report = scraper.scrape(&ctx, Some(&selection)).await.unwrap();
        assert_eq!(report.statuses.len(), 1);
        assert_eq!(&*report.statuses[0].name, "b");
        assert!(report.samples.iter().all(|sample| sample.name() != "test_a_total"));

        let unknown = vec!["c".to_string()];
        assert!(matches!(
            scraper.scrape(&ctx, Some(&unknown)).await,
            Err(HostexError::CollectorNotEnabled(name)) if name == "c"
        ));
    }

    #[tokio::test]
    async fn small_channel_applies_backpressure_without_losing_samples() {
        let values: Vec<f64> = (0..100).map(f64::from).collect();
        let scraper = Scraper::new(
            "windows",
            vec![
                named("first", Emitting::new("first_total", values.clone())),
                named("second", Emitting::new("second_total", values)),
            ],
            ScraperConfig {
                channel_capacity: 1,
            },
        )
        .unwrap();

        let report = scraper
            .scrape(&ScrapeContext::new(Duration::from_secs(5)), None)
            .await
            .unwrap();

        let first: Vec<f64> = report
            .samples
            .iter()
            .filter(|sample| sample.name() == "test_first_total")
            .map(|sample| sample.value)
            .collect();
        assert_eq!(first.len(), 100);
        assert!(first.windows(2).all(|pair| pair[0] < pair[1]));
        assert_eq!(
            report
                .samples
                .iter()
                .filter(|sample| sample.name() == "test_second_total")
                .count(),
            100
        );
    }

    #[tokio::test]
    async fn all_failed_is_reported() {
        let scraper = Scraper::new(
            "windows",
            vec![named("broken", Failing(descriptor("broken")))],
            ScraperConfig::default(),
        )
        .unwrap();

        let report = scraper
            .scrape(&ScrapeContext::new(Duration::from_secs(5)), None)
            .await
            .unwrap();
        assert!(report.all_failed());
        assert_eq!(report.samples.len(), 3);

        let empty = Scraper::new("windows", Vec::new(), ScraperConfig::default()).unwrap();
        let report = empty
            .scrape(&ScrapeContext::new(Duration::from_secs(5)), None)
            .await
            .unwrap();
        assert!(!report.all_failed());
        assert!(report.samples.is_empty());
    }

    fn aad_row(requests: u64) -> Row {
        aad_app_proxy_connector::SCHEMA
            .fields
            .iter()
            .map(|spec| (spec.field.to_string(), FieldValue::Unsigned(requests)))
            .collect()
    }

    #[tokio::test]
    async fn registry_built_collectors_scrape_end_to_end() {
        let source = Arc::new(MemorySource::new());
        source.set_rows(aad_app_proxy_connector::SCHEMA.class, vec![aad_row(5)]);
        source.set_rows(
            clr_security::SCHEMA.class,
            vec![row([
                ("Name", FieldValue::from("w3wp")),
                ("NumberLinkTimeChecks", FieldValue::from(1u64)),
                ("PercentTimeinRTchecks", FieldValue::from(2u64)),
                ("StackWalkDepth", FieldValue::from(3u64)),
            ])],
        );

        let registry = default_registry();
        let deps = CollectorDeps {
            namespace: "windows".to_string(),
            source: Arc::clone(&source) as _,
        };
        let enabled = registry.resolve_enabled(&["[defaults]".to_string()]).unwrap();
        let scraper = Scraper::new(
            "windows",
            registry.build(&enabled, &deps),
            ScraperConfig::default(),
        )
        .unwrap();

        let report = scraper
            .scrape(&ScrapeContext::new(Duration::from_secs(5)), None)
            .await
            .unwrap();

        // The CLR row lacks TotalRuntimeChecks, so that collector fails on
        // schema conversion and contributes no data.
        assert!(report.status(aad_app_proxy_connector::NAME).unwrap().success);
        let clr = report.status(clr_security::NAME).unwrap();
        assert!(!clr.success);
        assert!(clr.error.as_deref().unwrap().contains("TotalRuntimeChecks"));

        let data = report
            .samples
            .iter()
            .filter(|sample| !sample.name().starts_with("windows_exporter_"))
            .count();
        assert_eq!(data, aad_app_proxy_connector::SCHEMA.fields.len());
        assert!(
            report
                .samples
                .iter()
                .all(|sample| sample.label_values.len() == sample.descriptor.label_names.len())
        );
    }

    #[tokio::test]
    async fn slow_native_query_is_abandoned_and_gated_next_cycle() {
        let source = Arc::new(MemorySource::new());
        source.set_rows(aad_app_proxy_connector::SCHEMA.class, vec![aad_row(1)]);
        source.set_delay(aad_app_proxy_connector::SCHEMA.class, Duration::from_millis(300));

        let registry = default_registry();
        let deps = CollectorDeps {
            namespace: "windows".to_string(),
            source: Arc::clone(&source) as _,
        };
        let scraper = Scraper::new(
            "windows",
            registry.build(&[aad_app_proxy_connector::NAME.to_string()], &deps),
            ScraperConfig::default(),
        )
        .unwrap();

        let first = scraper
            .scrape(&ScrapeContext::new(Duration::from_millis(50)), None)
            .await
            .unwrap();
        assert!(first.status(aad_app_proxy_connector::NAME).unwrap().timed_out);

        // The abandoned query still holds the gate, so this cycle cannot
        // start a second native query before the first one returns.
        let second = scraper
            .scrape(&ScrapeContext::new(Duration::from_millis(50)), None)
            .await
            .unwrap();
        assert!(second.status(aad_app_proxy_connector::NAME).unwrap().timed_out);
        assert_eq!(source.query_count(aad_app_proxy_connector::SCHEMA.class), 1);

        tokio::time::sleep(Duration::from_millis(400)).await;
        source.set_delay(aad_app_proxy_connector::SCHEMA.class, Duration::ZERO);
        let third = scraper
            .scrape(&ScrapeContext::new(Duration::from_secs(5)), None)
            .await
            .unwrap();
        assert!(third.status(aad_app_proxy_connector::NAME).unwrap().success);
    }
}
