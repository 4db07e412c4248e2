use crate::extract::classify::{CategoryClassifier, FALLBACK_CATEGORY};
use crate::extract::discover::TableDiscoverer;
use crate::extract::schema::PositionalFieldMapper;
use scraper::Html;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{debug, info, warn};

/// One normalized data row: its split category and value plus every
/// semantic field, resolved or null. Immutable once built; persistence is
/// the caller's business.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionRecord {
    pub category: String,
    pub value: String,
    pub confidence: f64,
    pub fields: BTreeMap<&'static str, Option<f64>>,
}

/// Aggregate outcome of extracting one page.
#[derive(Debug, Clone, Serialize, Default)]
pub struct ExtractionResult {
    pub records: Vec<ExtractionRecord>,
    pub tables_discovered: usize,
    pub tables_processed: usize,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub elapsed_secs: f64,
}

impl ExtractionResult {
    /// Data-quality complaints beyond the per-table warnings, for callers
    /// that want to requeue thin pages.
    pub fn validate(&self) -> Vec<String> {
        let mut complaints = Vec::new();
        if self.tables_discovered == 0 {
            complaints.push("no data tables discovered".to_string());
        } else if self.tables_processed == 0 {
            complaints.push("no data tables processed".to_string());
        } else if self.tables_processed < self.tables_discovered {
            complaints.push(format!(
                "only processed {}/{} tables",
                self.tables_processed, self.tables_discovered
            ));
        }
        if self.elapsed_secs > 30.0 {
            complaints.push(format!("slow extraction: {:.2}s", self.elapsed_secs));
        }
        complaints
    }
}

/// Drives discover -> classify -> map over one fetched document. A
/// malformed table is a warning, never a reason to abandon the page, and
/// every data row of every processed table yields exactly one record.
pub struct SplitsExtractor {
    classifier: CategoryClassifier,
}

impl SplitsExtractor {
    pub fn new(classifier: CategoryClassifier) -> Self {
        Self { classifier }
    }

    pub fn extract(&self, html: &str) -> ExtractionResult {
        let started = Instant::now();
        let document = Html::parse_document(html);

        let (tables, mut warnings) = TableDiscoverer::discover(&document);
        let mut result = ExtractionResult {
            tables_discovered: tables.len(),
            ..Default::default()
        };

        if tables.is_empty() {
            warnings.push("no data tables discovered on page".to_string());
        }

        for table in &tables {
            let kind = self.classifier.table_kind(table);
            let expected = PositionalFieldMapper::expected_width(kind);
            if table.width() != expected {
                warnings.push(format!(
                    "table '{}': width {} differs from {:?} schema width {}",
                    table.table_id.as_deref().unwrap_or("unnamed"),
                    table.width(),
                    kind,
                    expected
                ));
            }

            let (table_category, assignments) = self.classifier.classify(table);
            debug!(
                "Table '{}' classified as {:?} / category '{}'",
                table.table_id.as_deref().unwrap_or("unnamed"),
                kind,
                table_category
            );

            for (cells, assignment) in table.rows.iter().zip(assignments) {
                if assignment.category == FALLBACK_CATEGORY {
                    warnings.push(format!(
                        "unmatched split value '{}'; extend the taxonomy prototypes",
                        assignment.value
                    ));
                }
                let mapped = PositionalFieldMapper::map_row(kind, cells);
                result.records.push(ExtractionRecord {
                    category: assignment.category,
                    value: assignment.value,
                    confidence: assignment.confidence,
                    fields: mapped.fields,
                });
            }
            result.tables_processed += 1;
        }

        result.warnings = warnings;
        result.elapsed_secs = started.elapsed().as_secs_f64();

        if result.warnings.is_empty() {
            info!(
                "Extracted {} records from {} tables in {:.2}s",
                result.records.len(),
                result.tables_processed,
                result.elapsed_secs
            );
        } else {
            warn!(
                "Extracted {} records from {} tables with {} warnings",
                result.records.len(),
                result.tables_processed,
                result.warnings.len()
            );
        }

        result
    }
}

impl Default for SplitsExtractor {
    fn default() -> Self {
        Self::new(CategoryClassifier::default())
    }
}
