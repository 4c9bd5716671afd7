//! Solar analyzer service library.
//!
//! Turns an address or coordinate into an attached flux overlay plus the
//! insights summary shown beside it.

pub mod config;
pub mod output;
pub mod pipeline;
pub mod summary;

pub use config::AnalyzerConfig;
pub use output::FileMapView;
pub use pipeline::{SearchInput, SearchPipeline, SearchReport};
pub use summary::{Assumptions, ConfigurationEstimate, InsightsSummary};
