pub(crate) mod aggregate;
pub(crate) mod classify;
pub(crate) mod discover;
pub(crate) mod schema;

pub use aggregate::{ExtractionRecord, ExtractionResult, SplitsExtractor};
pub use classify::{CategoryClassifier, SplitCategoryAssignment, TableKind};
pub use discover::{DiscoveredTable, TableDiscoverer};
pub use schema::{FieldType, MappedRow, PositionalFieldMapper};
