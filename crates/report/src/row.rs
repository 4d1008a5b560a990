use bughunt_model::{BugRecord, Origin};
use csv::StringRecord;
use std::collections::BTreeSet;

/// Column order used when creating a new table
pub const TABLE_COLUMNS: [&str; 9] = [
    "bug_id",
    "language",
    "bug_type",
    "lines",
    "bug_signature",
    "explanation",
    "context",
    "source",
    "timestamp",
];

pub(crate) const COL_LINES: &str = "lines";

/// One typed row of the bug table
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedBug {
    pub bug_id: String,
    pub language: String,
    pub bug_type: String,
    pub lines: BTreeSet<usize>,
    pub signature: String,
    pub explanation: Option<String>,
    pub context: Option<String>,
    pub origin: Origin,
    pub timestamp: Option<String>,
}

/// Outcome of parsing one data row
#[derive(Debug, Clone, PartialEq)]
pub enum RowOutcome {
    Parsed(PersistedBug),
    /// `row` is 1-based, counting data rows after the header
    Skipped { row: usize, reason: String },
}

impl RowOutcome {
    pub fn parsed(&self) -> Option<&PersistedBug> {
        match self {
            Self::Parsed(bug) => Some(bug),
            Self::Skipped { .. } => None,
        }
    }
}

/// Header name to column position
#[derive(Debug, Clone)]
pub struct ColumnIndex {
    names: Vec<String>,
}

impl ColumnIndex {
    pub fn new(headers: &StringRecord) -> Self {
        Self {
            names: headers.iter().map(|h| h.trim().to_string()).collect(),
        }
    }

    pub fn default_layout() -> Self {
        Self {
            names: TABLE_COLUMNS.iter().map(|c| (*c).to_string()).collect(),
        }
    }

    pub fn position(&self, column: &str) -> Option<usize> {
        self.names.iter().position(|name| name == column)
    }

    pub(crate) fn names(&self) -> &[String] {
        &self.names
    }

    pub(crate) fn len(&self) -> usize {
        self.names.len()
    }

    pub(crate) fn missing_required(&self) -> Option<&'static str> {
        ["bug_id", "bug_type", "lines", "bug_signature"]
            .into_iter()
            .find(|column| self.position(column).is_none())
    }
}

fn cell<'a>(record: &'a StringRecord, columns: &ColumnIndex, column: &str) -> Option<&'a str> {
    columns
        .position(column)
        .and_then(|idx| record.get(idx))
        .map(str::trim)
}

fn required<'a>(
    record: &'a StringRecord,
    columns: &ColumnIndex,
    column: &str,
) -> Result<&'a str, String> {
    match cell(record, columns, column) {
        Some(value) if !value.is_empty() => Ok(value),
        Some(_) => Err(format!("empty '{column}'")),
        None => Err(format!("missing '{column}'")),
    }
}

fn optional(record: &StringRecord, columns: &ColumnIndex, column: &str) -> Option<String> {
    cell(record, columns, column)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Parse a `lines` cell such as `5,6,10` (brackets and spaces tolerated)
pub fn parse_lines(raw: &str) -> Result<BTreeSet<usize>, String> {
    let inner = raw.trim().trim_start_matches('[').trim_end_matches(']');
    let mut lines = BTreeSet::new();
    for token in inner.split(|c: char| c == ',' || c.is_whitespace()) {
        if token.is_empty() {
            continue;
        }
        let line: usize = token
            .parse()
            .map_err(|_| format!("invalid line number '{token}'"))?;
        if line == 0 {
            return Err("line numbers are 1-based".to_string());
        }
        lines.insert(line);
    }
    if lines.is_empty() {
        return Err("no line numbers".to_string());
    }
    Ok(lines)
}

pub fn format_lines<'a>(lines: impl IntoIterator<Item = &'a usize>) -> String {
    lines
        .into_iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

impl PersistedBug {
    /// Explicit per-row parse step
    pub fn from_record(
        record: &StringRecord,
        columns: &ColumnIndex,
    ) -> std::result::Result<Self, String> {
        let bug_id = required(record, columns, "bug_id")?.to_string();
        let bug_type = required(record, columns, "bug_type")?.to_string();
        let signature = required(record, columns, "bug_signature")?.to_string();
        let lines = parse_lines(required(record, columns, COL_LINES)?)?;
        let origin = match cell(record, columns, "source").unwrap_or_default() {
            "" => Origin::KnowledgeBase,
            raw => Origin::parse(raw).ok_or_else(|| format!("unknown source '{raw}'"))?,
        };

        Ok(Self {
            bug_id,
            language: optional(record, columns, "language").unwrap_or_else(|| "Unknown".into()),
            bug_type,
            lines,
            signature,
            explanation: optional(record, columns, "explanation"),
            context: optional(record, columns, "context"),
            origin,
            timestamp: optional(record, columns, "timestamp"),
        })
    }

    /// Row for a freshly created bug
    pub fn from_bug(bug_id: &str, lines: &[usize], record: &BugRecord, timestamp: String) -> Self {
        Self {
            bug_id: bug_id.to_string(),
            language: record.language.clone(),
            bug_type: record.bug_type.clone(),
            lines: lines.iter().copied().collect(),
            signature: record.signature.clone(),
            explanation: record.explanation.clone(),
            context: record.context.clone(),
            origin: record.origin,
            timestamp: Some(timestamp),
        }
    }

    /// The persisted view the resolver compares against
    pub fn to_bug_record(&self) -> BugRecord {
        let mut record = BugRecord::new(self.bug_type.clone(), self.signature.clone())
            .language(self.language.clone())
            .lines(self.lines.iter().copied());
        record.id = self.bug_id.clone();
        record.explanation = self.explanation.clone();
        record.context = self.context.clone();
        record.origin = self.origin;
        record
    }

    /// Cells laid out in the order of `columns`; unknown columns stay empty
    pub(crate) fn to_cells(&self, columns: &ColumnIndex) -> Vec<String> {
        columns
            .names()
            .iter()
            .map(|name| match name.as_str() {
                "bug_id" => self.bug_id.clone(),
                "language" => self.language.clone(),
                "bug_type" => self.bug_type.clone(),
                "lines" => format_lines(&self.lines),
                "bug_signature" => self.signature.clone(),
                "explanation" => self.explanation.clone().unwrap_or_default(),
                "context" => self.context.clone().unwrap_or_default(),
                "source" => self.origin.as_str().to_string(),
                "timestamp" => self.timestamp.clone().unwrap_or_default(),
                _ => String::new(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn columns() -> ColumnIndex {
        ColumnIndex::default_layout()
    }

    fn row(cells: &[&str]) -> StringRecord {
        StringRecord::from(cells.to_vec())
    }

    #[test]
    fn parses_lines_cells() {
        assert_eq!(parse_lines("5,6").unwrap(), BTreeSet::from([5, 6]));
        assert_eq!(parse_lines("[10, 4, 4]").unwrap(), BTreeSet::from([4, 10]));
        assert!(parse_lines("").is_err());
        assert!(parse_lines("0").is_err());
        assert!(parse_lines("4,x").is_err());
    }

    #[test]
    fn parses_full_row() {
        let record = row(&[
            "abc123",
            "C++",
            "Mode Configuration Mismatch",
            "5,6",
            "mode configuration mismatch",
            "Mode set after connect",
            "",
            "generative",
            "2026-01-01T00:00:00Z",
        ]);
        let bug = PersistedBug::from_record(&record, &columns()).unwrap();

        assert_eq!(bug.bug_id, "abc123");
        assert_eq!(bug.lines, BTreeSet::from([5, 6]));
        assert_eq!(bug.context, None);
        assert_eq!(bug.origin, Origin::Generative);

        let as_record = bug.to_bug_record();
        assert_eq!(as_record.id, "abc123");
        assert_eq!(as_record.sorted_lines(), vec![5, 6]);
        assert_eq!(as_record.signature, "mode configuration mismatch");
    }

    #[test]
    fn rejects_rows_missing_identity() {
        let no_lines = row(&["abc", "C++", "T", "", "sig", "", "", "", ""]);
        assert_eq!(
            PersistedBug::from_record(&no_lines, &columns()),
            Err("empty 'lines'".to_string())
        );

        let short = row(&["abc", "C++", "T"]);
        assert!(PersistedBug::from_record(&short, &columns()).is_err());

        let bad_source = row(&["abc", "C++", "T", "1", "sig", "", "", "oracle", ""]);
        assert!(PersistedBug::from_record(&bad_source, &columns()).is_err());
    }

    #[test]
    fn legacy_source_names_are_accepted() {
        let record = row(&["abc", "C++", "T", "1", "sig", "", "", "vector_db", ""]);
        let bug = PersistedBug::from_record(&record, &columns()).unwrap();
        assert_eq!(bug.origin, Origin::KnowledgeBase);
    }

    #[test]
    fn reordered_columns_are_honored() {
        let headers = row(&["bug_signature", "lines", "bug_type", "bug_id"]);
        let columns = ColumnIndex::new(&headers);
        assert_eq!(columns.missing_required(), None);

        let bug = PersistedBug::from_record(&row(&["sig", "3", "T", "id1"]), &columns).unwrap();
        assert_eq!(bug.bug_id, "id1");
        assert_eq!(bug.language, "Unknown");
        assert_eq!(bug.to_cells(&columns), vec!["sig", "3", "T", "id1"]);
    }
}
