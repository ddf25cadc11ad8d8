pub mod channel;
pub mod exposition;
pub mod types;

pub use channel::{Envelope, MetricReceiver, MetricSender, metric_channel};
pub use exposition::{CONTENT_TYPE, render_prometheus};
pub use types::{MetricDescriptor, MetricKind, Sample, build_fq_name};
