pub mod config;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod processor;

pub use config::AntiDetectionConfig;
pub use error::{Result, ScrapeError};
pub use extract::{ExtractionRecord, ExtractionResult, SplitsExtractor};
pub use fetch::{FetchClient, FetchOutcome, FetchTarget};
pub use processor::PageProcessor;
