use crate::extract::discover::DiscoveredTable;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use strsim::normalized_levenshtein;

/// Rows whose value matches no prototype land here rather than being
/// dropped.
pub const FALLBACK_CATEGORY: &str = "uncategorized";

/// "1st & 10", "3rd & 10+", "2nd & 1-3" and friends.
static DOWN_DISTANCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(1st|2nd|3rd|4th)\s*&\s*\d+").unwrap());

/// Which positional schema applies to a table. Determined from structural
/// signals, not column labels, because the labels repeat across sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    /// Full splits layout: games, passing, rushing, scoring, fumbles.
    Basic,
    /// First-downs layout: passing and rushing with 1D columns.
    Advanced,
    /// Value-led rows keyed by down and distance.
    Situational,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SplitCategoryAssignment {
    pub category: String,
    pub value: String,
    pub confidence: f64,
}

/// One semantic category with the example values used to recognize it.
/// Kept as data so the taxonomy can be extended without touching the
/// matching algorithm.
#[derive(Debug, Clone, Deserialize)]
pub struct CategoryPrototype {
    pub name: String,
    pub examples: Vec<String>,
}

impl CategoryPrototype {
    fn new(name: &str, examples: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            examples: examples.iter().map(|e| e.to_string()).collect(),
        }
    }
}

/// Prototype-value matcher. Prototypes are held in priority order with
/// more specific categories first, so a tie resolves away from the
/// generic ones ("2nd Half" must never land in "quarter").
#[derive(Debug, Clone, Deserialize)]
pub struct CategoryClassifier {
    prototypes: Vec<CategoryPrototype>,
    /// Minimum share of a category's examples that must be matched for a
    /// table-level assignment. Empirically tuned; not load-bearing.
    #[serde(default = "default_table_threshold")]
    table_threshold: f64,
    /// Minimum string similarity for a per-value assignment when no
    /// substring match exists.
    #[serde(default = "default_value_threshold")]
    value_threshold: f64,
}

fn default_table_threshold() -> f64 {
    0.3
}

fn default_value_threshold() -> f64 {
    0.6
}

impl Default for CategoryClassifier {
    fn default() -> Self {
        Self {
            prototypes: standard_taxonomy(),
            table_threshold: default_table_threshold(),
            value_threshold: default_value_threshold(),
        }
    }
}

/// The split taxonomy as the target site actually renders it. The site
/// never declares these anywhere in the markup; the example values were
/// collected from live pages.
fn standard_taxonomy() -> Vec<CategoryPrototype> {
    vec![
        CategoryPrototype::new("down & yards to go", &[
            "1st & 10", "2nd & 1-3", "2nd & 4-6", "3rd & 7-9", "3rd & 10+",
        ]),
        CategoryPrototype::new("down", &["1st Down", "2nd Down", "3rd Down", "4th Down"]),
        CategoryPrototype::new("yards to go", &["1-3", "4-6", "7-9", "10+"]),
        CategoryPrototype::new("field position", &[
            "Own 1-10", "Own 1-20", "Own 21-50", "Opp 49-20", "Red Zone",
        ]),
        CategoryPrototype::new("quarter", &[
            "1st Quarter", "2nd Quarter", "3rd Quarter", "4th Quarter", "Overtime", "OT",
        ]),
        CategoryPrototype::new("half", &["1st Half", "2nd Half"]),
        CategoryPrototype::new("game situation", &[
            "Leading, < 2 min to go", "Tied, < 2 min to go", "Trailing, < 2 min to go",
        ]),
        CategoryPrototype::new("score differential", &["Leading", "Tied", "Trailing"]),
        CategoryPrototype::new("place", &["Home", "Road", "Away"]),
        CategoryPrototype::new("result", &["Win", "Loss", "Tie"]),
        CategoryPrototype::new("final margin", &["0-7 points", "8-14 points", "15+ points"]),
        CategoryPrototype::new("month", &[
            "September", "October", "November", "December", "January",
        ]),
        CategoryPrototype::new("game number", &[
            "Games 1-4", "Games 5-8", "Games 9-12", "Games 13+",
        ]),
        CategoryPrototype::new("day", &["Sunday", "Monday", "Thursday", "Saturday"]),
        CategoryPrototype::new("time", &["Early", "Afternoon", "Late Afternoon", "Night"]),
        CategoryPrototype::new("division", &[
            "AFC East", "AFC North", "AFC South", "AFC West",
            "NFC East", "NFC North", "NFC South", "NFC West",
        ]),
        CategoryPrototype::new("conference", &["AFC", "NFC"]),
        CategoryPrototype::new("stadium", &["dome", "outdoors", "retroof"]),
        CategoryPrototype::new("snap type", &["Huddle", "No Huddle", "Shotgun", "Under Center"]),
        CategoryPrototype::new("play action", &["play action", "non-play action"]),
        CategoryPrototype::new("rpo", &["RPO", "non-RPO"]),
        CategoryPrototype::new("time in pocket", &["2.5+ seconds", "< 2.5 seconds"]),
        CategoryPrototype::new("league", &["NFL"]),
    ]
}

impl CategoryClassifier {
    pub fn new(prototypes: Vec<CategoryPrototype>) -> Self {
        Self {
            prototypes,
            table_threshold: default_table_threshold(),
            value_threshold: default_value_threshold(),
        }
    }

    /// Structural table-kind scoring from id, caption, and header signals.
    /// Header text is only trusted as a coarse section hint, never for
    /// field mapping.
    pub fn table_kind(&self, table: &DiscoveredTable) -> TableKind {
        let value_col = value_column(table);
        let down_like = table
            .rows
            .iter()
            .filter(|row| {
                row.get(value_col)
                    .map(|v| DOWN_DISTANCE.is_match(v))
                    .unwrap_or(false)
            })
            .count();
        if down_like * 2 > table.rows.len() {
            return TableKind::Situational;
        }

        let id = table.table_id.as_deref().unwrap_or("").to_lowercase();
        let caption = table.caption.as_deref().unwrap_or("").to_lowercase();
        let headers = table
            .headers
            .iter()
            .map(|h| h.text.to_lowercase())
            .collect::<Vec<_>>();

        let mut advanced = 0;
        let mut basic = 0;

        if id.contains("advanced") {
            advanced += 10;
        } else if id == "stats" {
            basic += 10;
        } else if id.contains("splits") {
            basic += 5;
        }

        if caption.contains("advanced splits") {
            advanced += 4;
        } else if caption.contains("splits") {
            basic += 4;
        }

        if headers.iter().any(|h| h == "1d") {
            advanced += 2;
        }
        for section in ["g", "w", "l", "pts", "fmb"] {
            if headers.iter().any(|h| h == section) {
                basic += 2;
            }
        }

        if advanced > basic {
            TableKind::Advanced
        } else {
            TableKind::Basic
        }
    }

    /// Assign the table and each of its rows to the split taxonomy.
    /// Pure over its inputs: the same table always yields the same
    /// assignments.
    pub fn classify(&self, table: &DiscoveredTable) -> (String, Vec<SplitCategoryAssignment>) {
        let value_col = value_column(table);
        let label_col = if value_col == 1 { Some(0) } else { None };

        let mut distinct: Vec<&str> = Vec::new();
        for row in &table.rows {
            if let Some(v) = row.get(value_col) {
                if !v.is_empty() && !distinct.contains(&v.as_str()) {
                    distinct.push(v.as_str());
                }
            }
        }

        let table_category = self.best_table_category(&distinct);

        let assignments = table
            .rows
            .iter()
            .map(|row| {
                let value = row.get(value_col).cloned().unwrap_or_default();
                let explicit = label_col
                    .and_then(|c| row.get(c))
                    .filter(|label| !label.is_empty());

                if let Some(label) = explicit {
                    return SplitCategoryAssignment {
                        category: label.to_lowercase(),
                        value,
                        confidence: 1.0,
                    };
                }

                if let Some(confidence) = self.category_fit(&table_category, &value) {
                    return SplitCategoryAssignment {
                        category: table_category.clone(),
                        value,
                        confidence,
                    };
                }

                // The row does not fit the table's category; re-evaluate
                // the value on its own before falling back.
                match self.best_value_category(&value) {
                    Some((category, confidence)) => SplitCategoryAssignment {
                        category,
                        value,
                        confidence,
                    },
                    None => SplitCategoryAssignment {
                        category: FALLBACK_CATEGORY.to_string(),
                        value,
                        confidence: 0.0,
                    },
                }
            })
            .collect();

        (table_category, assignments)
    }

    /// Per-value lookup used both for row re-evaluation and for value-led
    /// situational rows.
    pub fn best_value_category(&self, value: &str) -> Option<(String, f64)> {
        if value.is_empty() {
            return None;
        }
        if DOWN_DISTANCE.is_match(value) {
            return Some(("down".to_string(), 1.0));
        }
        for prototype in &self.prototypes {
            let mut best = 0.0_f64;
            for example in &prototype.examples {
                if substring_match(value, example) {
                    best = best.max(similarity(value, example)).max(self.value_threshold);
                } else {
                    let sim = similarity(value, example);
                    if sim >= self.value_threshold {
                        best = best.max(sim);
                    }
                }
            }
            if best > 0.0 {
                return Some((prototype.name.clone(), best));
            }
        }
        None
    }

    fn best_table_category(&self, distinct: &[&str]) -> String {
        // Down-and-distance values are recognized structurally; no
        // prototype list can enumerate every "Nth & yards" combination.
        let down_like = distinct.iter().filter(|v| DOWN_DISTANCE.is_match(v)).count();
        if down_like * 2 > distinct.len() && !distinct.is_empty() {
            return "down".to_string();
        }

        let mut best: Option<(&CategoryPrototype, f64)> = None;
        for prototype in &self.prototypes {
            let matched = prototype
                .examples
                .iter()
                .filter(|example| distinct.iter().any(|v| value_contains(v, example)))
                .count();
            let score = matched as f64 / prototype.examples.len() as f64;
            if score >= self.table_threshold {
                // Strictly-greater keeps the first-declared prototype on
                // ties, which is the priority order.
                match best {
                    Some((_, top)) if score <= top => {}
                    _ => best = Some((prototype, score)),
                }
            }
        }
        best.map(|(p, _)| p.name.clone())
            .unwrap_or_else(|| FALLBACK_CATEGORY.to_string())
    }

    fn category_fit(&self, category: &str, value: &str) -> Option<f64> {
        if category == FALLBACK_CATEGORY || value.is_empty() {
            return None;
        }
        let prototype = self.prototypes.iter().find(|p| p.name == category)?;
        let mut best = 0.0_f64;
        for example in &prototype.examples {
            if substring_match(value, example) {
                best = best.max(similarity(value, example)).max(self.value_threshold);
            }
        }
        (best > 0.0).then_some(best)
    }
}

fn value_column(table: &DiscoveredTable) -> usize {
    let labelled = table.headers.first().map(|h| h.text.eq_ignore_ascii_case("split"))
        == Some(true)
        && table.headers.get(1).map(|h| h.text.eq_ignore_ascii_case("value")) == Some(true);
    usize::from(labelled)
}

fn substring_match(value: &str, example: &str) -> bool {
    let v = value.to_lowercase();
    let e = example.to_lowercase();
    // Containment is meaningless below three characters: "OT" sits
    // inside "Shotgun" and "Total". Short strings must match exactly.
    if v.len() < 3 || e.len() < 3 {
        return v == e;
    }
    v.contains(&e) || e.contains(&v)
}

/// Value-side containment only, for table-level scoring. A bare table
/// value must carry the example, not the other way around; otherwise
/// "Leading" counts as a match for "Leading, < 2 min to go".
fn value_contains(value: &str, example: &str) -> bool {
    let v = value.to_lowercase();
    let e = example.to_lowercase();
    if v.len() < 3 || e.len() < 3 {
        return v == e;
    }
    v.contains(&e)
}

fn similarity(value: &str, example: &str) -> f64 {
    normalized_levenshtein(&value.to_lowercase(), &example.to_lowercase())
}
