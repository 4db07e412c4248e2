use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashMap;
use tracing::debug;

static TABLE: Lazy<Selector> = Lazy::new(|| Selector::parse("table").unwrap());
static CAPTION: Lazy<Selector> = Lazy::new(|| Selector::parse("caption").unwrap());
static HEADER_ROW: Lazy<Selector> = Lazy::new(|| Selector::parse("thead tr").unwrap());
static BODY_ROW: Lazy<Selector> = Lazy::new(|| Selector::parse("tbody tr").unwrap());
static ANY_ROW: Lazy<Selector> = Lazy::new(|| Selector::parse("tr").unwrap());
static CELL: Lazy<Selector> = Lazy::new(|| Selector::parse("th, td").unwrap());

#[derive(Debug, Clone)]
pub struct ColumnHeader {
    pub text: String,
    pub position: usize,
}

/// Raw cell matrix for one candidate data table. Rows are guaranteed
/// uniform in cell count; section-header rows have already been filtered.
#[derive(Debug, Clone)]
pub struct DiscoveredTable {
    pub table_id: Option<String>,
    pub caption: Option<String>,
    pub headers: Vec<ColumnHeader>,
    pub rows: Vec<Vec<String>>,
}

impl DiscoveredTable {
    pub fn width(&self) -> usize {
        self.rows.first().map(|r| r.len()).unwrap_or(0)
    }
}

/// Scans a parsed document for candidate data tables. The source renders
/// statistical and navigational tables with identical markup, so the only
/// usable signals are structural: header rows, modal cell counts, and
/// section-header rows that span where data cells are expected.
pub struct TableDiscoverer;

impl TableDiscoverer {
    /// Extract every table with at least one uniform data row. Structural
    /// oddities are reported as warnings, never as failures; a malformed
    /// table must not cost us the rest of the page.
    pub fn discover(document: &Html) -> (Vec<DiscoveredTable>, Vec<String>) {
        let mut tables = Vec::new();
        let mut warnings = Vec::new();

        for (index, table) in document.select(&TABLE).enumerate() {
            let table_id = table.value().attr("id").map(|s| s.to_string());
            let label = table_id
                .clone()
                .unwrap_or_else(|| format!("table-{}", index));

            let caption = table
                .select(&CAPTION)
                .next()
                .map(|c| cell_text(c))
                .filter(|t| !t.is_empty());

            let headers = Self::extract_headers(table);
            let raw_rows = Self::extract_body_rows(table);
            if raw_rows.is_empty() {
                debug!("Skipping table '{}': no body rows", label);
                continue;
            }

            let modal = modal_cell_count(&raw_rows);
            let mut rows = Vec::new();
            for cells in raw_rows {
                if cells.len() == modal {
                    rows.push(cells);
                } else if is_section_header(&cells, modal) {
                    debug!("Filtered section header row in '{}'", label);
                } else {
                    warnings.push(format!(
                        "table '{}': dropped row with {} cells (expected {})",
                        label,
                        cells.len(),
                        modal
                    ));
                }
            }

            if rows.is_empty() {
                warnings.push(format!("table '{}': no uniform data rows", label));
                continue;
            }

            tables.push(DiscoveredTable {
                table_id,
                caption,
                headers,
                rows,
            });
        }

        (tables, warnings)
    }

    fn extract_headers(table: ElementRef) -> Vec<ColumnHeader> {
        // Stat tables carry a two-level thead (section banner over column
        // labels); the last thead row is the per-column one.
        let header_row = table.select(&HEADER_ROW).last().or_else(|| {
            table
                .select(&ANY_ROW)
                .next()
                .filter(|row| row.select(&CELL).all(|c| c.value().name() == "th"))
        });

        match header_row {
            Some(row) => row
                .select(&CELL)
                .enumerate()
                .map(|(position, cell)| ColumnHeader {
                    text: cell_text(cell),
                    position,
                })
                .collect(),
            None => Vec::new(),
        }
    }

    fn extract_body_rows(table: ElementRef) -> Vec<Vec<String>> {
        // The parser synthesizes a tbody around loose rows, so `tbody tr`
        // also covers tables written without one; a header row outside a
        // thead lands in the body as an all-th row.
        table
            .select(&BODY_ROW)
            // Mid-table repeats of the column labels carry a thead class.
            .filter(|row| !row.value().classes().any(|c| c == "thead"))
            .filter(|row| row.select(&CELL).any(|c| c.value().name() == "td"))
            .map(|row| row.select(&CELL).map(cell_text).collect::<Vec<String>>())
            .filter(|cells| cells.iter().any(|c| !c.is_empty()))
            .collect()
    }
}

fn cell_text(cell: ElementRef) -> String {
    cell.text().collect::<String>().trim().to_string()
}

fn modal_cell_count(rows: &[Vec<String>]) -> usize {
    let mut counts: HashMap<usize, usize> = HashMap::new();
    for row in rows {
        *counts.entry(row.len()).or_default() += 1;
    }
    counts
        .into_iter()
        .max_by_key(|&(len, n)| (n, len))
        .map(|(len, _)| len)
        .unwrap_or(0)
}

/// A section header renders as a single wide label where a full stat row
/// is expected: far fewer cells than the modal row, only one of them
/// non-empty.
fn is_section_header(cells: &[String], modal: usize) -> bool {
    let non_empty = cells.iter().filter(|c| !c.is_empty()).count();
    non_empty == 1 && cells.len() * 2 <= modal
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(html: &str) -> Html {
        Html::parse_document(html)
    }

    const SPLITS_TABLE: &str = r#"
        <table id="stats">
          <caption>2024 Splits Table</caption>
          <thead>
            <tr><th colspan="2"></th><th colspan="3">Games</th></tr>
            <tr><th>Split</th><th>Value</th><th>G</th><th>W</th><th>L</th></tr>
          </thead>
          <tbody>
            <tr><td colspan="2">Place</td></tr>
            <tr><td>Place</td><td>Home</td><td>8</td><td>5</td><td>3</td></tr>
            <tr><td></td><td>Road</td><td>9</td><td>4</td><td>5</td></tr>
            <tr><td>Result</td><td>Win</td><td>9</td></tr>
          </tbody>
        </table>"#;

    #[test]
    fn rows_are_uniform_and_section_headers_filtered() {
        let doc = parse(SPLITS_TABLE);
        let (tables, warnings) = TableDiscoverer::discover(&doc);
        assert_eq!(tables.len(), 1);
        let table = &tables[0];
        assert_eq!(table.table_id.as_deref(), Some("stats"));
        assert_eq!(table.caption.as_deref(), Some("2024 Splits Table"));
        // Section header gone, short row dropped with a warning.
        assert_eq!(table.rows.len(), 2);
        assert!(table.rows.iter().all(|r| r.len() == 5));
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("dropped row"));
    }

    #[test]
    fn headers_come_from_last_thead_row_with_positions() {
        let doc = parse(SPLITS_TABLE);
        let (tables, _) = TableDiscoverer::discover(&doc);
        let headers = &tables[0].headers;
        assert_eq!(headers.len(), 5);
        assert_eq!(headers[0].text, "Split");
        assert_eq!(headers[4].text, "L");
        assert_eq!(headers[4].position, 4);
    }

    #[test]
    fn empty_tables_are_excluded() {
        let doc = parse("<table id=\"nav\"><thead><tr><th>Links</th></tr></thead></table>");
        let (tables, _) = TableDiscoverer::discover(&doc);
        assert!(tables.is_empty());
    }

    #[test]
    fn table_without_tbody_still_yields_rows() {
        let doc = parse(
            "<table><tr><th>Value</th><th>Att</th></tr>\
             <tr><td>Home</td><td>30</td></tr>\
             <tr><td>Road</td><td>28</td></tr></table>",
        );
        let (tables, warnings) = TableDiscoverer::discover(&doc);
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].rows.len(), 2);
        assert!(warnings.is_empty());
    }

    #[test]
    fn all_th_rows_inside_tbody_are_not_data() {
        let doc = parse(
            "<table><tbody>\
             <tr><th>Value</th><th>Att</th></tr>\
             <tr><td>Home</td><td>30</td></tr>\
             <tr><td>Road</td><td>28</td></tr>\
             </tbody></table>",
        );
        let (tables, warnings) = TableDiscoverer::discover(&doc);
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].rows.len(), 2);
        assert_eq!(tables[0].rows[0][0], "Home");
        assert!(warnings.is_empty());
    }

    #[test]
    fn repeated_header_rows_inside_tbody_are_ignored() {
        let doc = parse(
            "<table><tbody>\
             <tr class=\"thead\"><th>Value</th><th>G</th></tr>\
             <tr><td>Home</td><td>8</td></tr>\
             </tbody></table>",
        );
        let (tables, _) = TableDiscoverer::discover(&doc);
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].rows, vec![vec!["Home".to_string(), "8".to_string()]]);
    }
}
