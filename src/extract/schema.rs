use crate::extract::classify::TableKind;
use std::collections::BTreeMap;

/// How a cell at a given position is converted. The source repeats its
/// column labels (two "Yds" columns, one passing one rushing), so the
/// label is never consulted; only the position is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// Split label or split value; carried through as text.
    Text,
    Int,
    Float,
    /// Numeric with a trailing "%" to strip.
    Pct,
}

#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldType,
}

const fn f(name: &'static str, kind: FieldType) -> FieldSpec {
    FieldSpec { name, kind }
}

use FieldType::{Float, Int, Pct, Text};

/// Full splits layout: games, passing, rushing, scoring, fumbles.
static BASIC_SCHEMA: &[FieldSpec] = &[
    f("split", Text),
    f("value", Text),
    f("games", Int),
    f("wins", Int),
    f("losses", Int),
    f("ties", Int),
    f("pass_cmp", Int),
    f("pass_att", Int),
    f("pass_inc", Int),
    f("cmp_pct", Pct),
    f("pass_yds", Int),
    f("pass_td", Int),
    f("pass_int", Int),
    f("pass_rating", Float),
    f("sacks", Int),
    f("sack_yds", Int),
    f("yds_per_att", Float),
    f("adj_yds_per_att", Float),
    f("att_per_game", Float),
    f("yds_per_game", Float),
    f("rush_att", Int),
    f("rush_yds", Int),
    f("rush_yds_per_att", Float),
    f("rush_td", Int),
    f("rush_att_per_game", Float),
    f("rush_yds_per_game", Float),
    f("total_td", Int),
    f("points", Int),
    f("fumbles", Int),
    f("fumbles_lost", Int),
    f("fumbles_forced", Int),
    f("fumbles_recovered", Int),
    f("fumble_rec_yds", Int),
    f("fumble_rec_td", Int),
];

/// First-downs layout: passing and rushing with 1D columns.
static ADVANCED_SCHEMA: &[FieldSpec] = &[
    f("split", Text),
    f("value", Text),
    f("pass_cmp", Int),
    f("pass_att", Int),
    f("pass_inc", Int),
    f("cmp_pct", Pct),
    f("pass_yds", Int),
    f("pass_td", Int),
    f("pass_first_downs", Int),
    f("pass_int", Int),
    f("pass_rating", Float),
    f("sacks", Int),
    f("sack_yds", Int),
    f("yds_per_att", Float),
    f("adj_yds_per_att", Float),
    f("rush_att", Int),
    f("rush_yds", Int),
    f("rush_yds_per_att", Float),
    f("rush_td", Int),
    f("rush_first_downs", Int),
];

/// Value-led layout: the first cell is the down-and-distance value itself.
static SITUATIONAL_SCHEMA: &[FieldSpec] = &[
    f("value", Text),
    f("pass_cmp", Int),
    f("pass_att", Int),
    f("pass_inc", Int),
    f("cmp_pct", Pct),
    f("pass_yds", Int),
    f("pass_td", Int),
    f("pass_first_downs", Int),
    f("pass_int", Int),
    f("pass_rating", Float),
    f("sacks", Int),
    f("sack_yds", Int),
    f("yds_per_att", Float),
    f("adj_yds_per_att", Float),
    f("rush_att", Int),
    f("rush_yds", Int),
    f("rush_yds_per_att", Float),
    f("rush_td", Int),
    f("rush_first_downs", Int),
];

/// One row after positional mapping: the text labels pulled out, every
/// numeric field resolved to a value or null.
#[derive(Debug, Clone, PartialEq)]
pub struct MappedRow {
    pub split_label: Option<String>,
    pub value: Option<String>,
    pub fields: BTreeMap<&'static str, Option<f64>>,
}

pub struct PositionalFieldMapper;

impl PositionalFieldMapper {
    pub fn schema(kind: TableKind) -> &'static [FieldSpec] {
        match kind {
            TableKind::Basic => BASIC_SCHEMA,
            TableKind::Advanced => ADVANCED_SCHEMA,
            TableKind::Situational => SITUATIONAL_SCHEMA,
        }
    }

    pub fn expected_width(kind: TableKind) -> usize {
        Self::schema(kind).len()
    }

    /// Map one uniform data row by position. Short rows populate the
    /// remaining fields with null rather than failing; numeric junk
    /// resolves to null, never to an error.
    pub fn map_row(kind: TableKind, cells: &[String]) -> MappedRow {
        let mut split_label = None;
        let mut value = None;
        let mut fields = BTreeMap::new();

        for (position, spec) in Self::schema(kind).iter().enumerate() {
            let raw = cells.get(position).map(String::as_str).unwrap_or("");
            match spec.kind {
                Text => {
                    let text = (!raw.is_empty()).then(|| raw.to_string());
                    if spec.name == "split" {
                        split_label = text;
                    } else {
                        value = text;
                    }
                }
                Int | Float | Pct => {
                    fields.insert(spec.name, coerce_numeric(raw, spec.kind));
                }
            }
        }

        MappedRow {
            split_label,
            value,
            fields,
        }
    }
}

/// Tolerant numeric coercion: empty, "N/A", and unparseable text become
/// null. Integers parse through f64 so "123.0" survives.
fn coerce_numeric(raw: &str, kind: FieldType) -> Option<f64> {
    let mut cleaned = raw.trim();
    if cleaned.is_empty() || cleaned.eq_ignore_ascii_case("n/a") {
        return None;
    }
    if kind == Pct {
        cleaned = cleaned.strip_suffix('%').unwrap_or(cleaned).trim_end();
    }
    cleaned.parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn schema_widths_match_expected_row_widths() {
        assert_eq!(PositionalFieldMapper::expected_width(TableKind::Basic), 34);
        assert_eq!(PositionalFieldMapper::expected_width(TableKind::Advanced), 20);
        assert_eq!(
            PositionalFieldMapper::expected_width(TableKind::Situational),
            19
        );
    }

    #[test]
    fn duplicate_site_labels_resolve_to_distinct_fields() {
        // Positions 10 and 21 both render as "Yds" on the site.
        let basic = PositionalFieldMapper::schema(TableKind::Basic);
        assert_eq!(basic[10].name, "pass_yds");
        assert_eq!(basic[21].name, "rush_yds");
        assert_eq!(basic[15].name, "sack_yds");
    }

    #[test]
    fn mapping_ignores_header_text_entirely() {
        // The mapper never sees headers; identical cells map identically
        // no matter what the page called the columns.
        let cells = row(&["Place", "Home", "8", "5", "3", "0", "210"]);
        let first = PositionalFieldMapper::map_row(TableKind::Basic, &cells);
        let second = PositionalFieldMapper::map_row(TableKind::Basic, &cells);
        assert_eq!(first, second);
        assert_eq!(first.split_label.as_deref(), Some("Place"));
        assert_eq!(first.value.as_deref(), Some("Home"));
        assert_eq!(first.fields["games"], Some(8.0));
        assert_eq!(first.fields["pass_cmp"], Some(210.0));
    }

    #[test]
    fn short_rows_pad_with_nulls() {
        let cells = row(&["Place", "Home", "8"]);
        let mapped = PositionalFieldMapper::map_row(TableKind::Basic, &cells);
        assert_eq!(mapped.fields["games"], Some(8.0));
        assert_eq!(mapped.fields["wins"], None);
        assert_eq!(mapped.fields["fumble_rec_td"], None);
        // All numeric fields are present even when the row ran short.
        assert_eq!(mapped.fields.len(), 32);
    }

    #[test]
    fn percentage_fields_strip_the_suffix() {
        let mut cells = row(&["Place", "Home", "8", "5", "3", "0", "210", "320", "110"]);
        cells.push("65.6%".to_string());
        let mapped = PositionalFieldMapper::map_row(TableKind::Basic, &cells);
        assert_eq!(mapped.fields["cmp_pct"], Some(65.6));
    }

    #[test]
    fn junk_cells_become_null_not_errors() {
        let cells = row(&["Place", "Home", "N/A", "", "abc", "3.0"]);
        let mapped = PositionalFieldMapper::map_row(TableKind::Basic, &cells);
        assert_eq!(mapped.fields["games"], None);
        assert_eq!(mapped.fields["wins"], None);
        assert_eq!(mapped.fields["losses"], None);
        assert_eq!(mapped.fields["ties"], Some(3.0));
    }

    #[test]
    fn situational_rows_lead_with_the_value() {
        let cells = row(&["1st & 10", "45", "60", "15", "75.0%", "520"]);
        let mapped = PositionalFieldMapper::map_row(TableKind::Situational, &cells);
        assert_eq!(mapped.split_label, None);
        assert_eq!(mapped.value.as_deref(), Some("1st & 10"));
        assert_eq!(mapped.fields["pass_cmp"], Some(45.0));
        assert_eq!(mapped.fields["cmp_pct"], Some(75.0));
    }
}
