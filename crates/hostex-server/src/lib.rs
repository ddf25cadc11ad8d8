pub mod config;
pub mod handlers;
pub mod logging;
pub mod router;

pub use config::{Cli, ExporterConfig};
pub use router::{ExporterState, ScrapeSettings, exporter_router};
