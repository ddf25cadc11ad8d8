pub mod collector;
pub mod collectors;
pub mod context;
pub mod registry;
pub mod scrape;
pub mod source;
pub mod table;

pub use collector::{Collector, CollectorDeps, CollectorFactory, NamedCollector};
pub use context::ScrapeContext;
pub use registry::{CollectorRegistry, DEFAULTS_PLACEHOLDER, RegistryBuilder, default_registry};
pub use scrape::{CollectorStatus, ScrapeReport, Scraper, ScraperConfig};
pub use source::{FieldValue, NativeSource, QueryRequest, Row, SourceHandle};
