use std::time::Duration;

use hostex_metrics::Sample;
use tokio::time::Instant;

/// Per-scrape parameters shared read-only with every collector.
#[derive(Debug, Clone)]
pub struct ScrapeContext {
    deadline: Instant,
    timeout: Duration,
    label_filters: Vec<(String, String)>,
}

impl ScrapeContext {
    pub fn new(timeout: Duration) -> Self {
        Self {
            deadline: Instant::now() + timeout,
            timeout,
            label_filters: Vec::new(),
        }
    }

    pub fn with_label_filters(mut self, filters: Vec<(String, String)>) -> Self {
        self.label_filters = filters;
        self
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.deadline
    }

    /// A sample passes when every filter whose label it carries matches exactly.
    /// Filters on labels the sample does not have are ignored.
    pub fn accepts(&self, sample: &Sample) -> bool {
        self.label_filters.iter().all(|(label, expected)| {
            sample.label(label).is_none_or(|actual| actual == expected)
        })
    }
}
