//! CSV import/export of [`Table`]s.
//!
//! The first non-blank record is the header row; headers are cleaned of
//! trailing `(...)` comments on read. Fully blank records are skipped.
//! Quoted fields may span lines.

use std::io::Write;
use std::path::Path;

use crate::error::{Result, TreelineError};
use crate::table::{CellValue, Table, format_number};

/// Read a CSV file into a header-cleaned table.
pub fn read_csv(path: &Path) -> Result<Table> {
    let content = std::fs::read_to_string(path)?;
    parse_csv_table(&content)
}

/// Parse CSV text into a header-cleaned table.
pub fn parse_csv_table(content: &str) -> Result<Table> {
    let mut records = split_records(content)
        .into_iter()
        .filter(|(_, record)| !record.trim().is_empty());

    let Some((_, header)) = records.next() else {
        return Err(TreelineError::Parse {
            line: 1,
            message: "CSV file is empty".to_string(),
        });
    };
    let header: Vec<String> = parse_csv_line(header)
        .into_iter()
        .map(|h| strip_formula_guard(&h).to_string())
        .collect();
    let mut table = Table::with_raw_headers(&header);

    for (line, record) in records {
        let fields = parse_csv_line(record);
        if fields.iter().all(|f| f.trim().is_empty()) {
            continue;
        }
        let width = table.columns().len();
        if fields.len() > width {
            return Err(TreelineError::Parse {
                line,
                message: format!("{} fields but the header has {}", fields.len(), width),
            });
        }
        table.push_row(fields.iter().map(|f| parse_csv_field(f)).collect())?;
    }

    tracing::debug!(columns = table.columns().len(), rows = table.len(), "parsed csv");
    Ok(table)
}

/// Split CSV text into records, each paired with its 1-based starting line.
/// A newline inside a quoted field belongs to the field, not the record break.
fn split_records(content: &str) -> Vec<(usize, &str)> {
    let mut records = Vec::new();
    let mut in_quotes = false;
    let mut start = 0;
    let mut line = 1;
    let mut record_line = 1;

    for (i, c) in content.char_indices() {
        match c {
            // A doubled quote toggles twice, leaving the state unchanged.
            '"' => in_quotes = !in_quotes,
            '\n' => {
                if !in_quotes {
                    records.push((record_line, content[start..i].trim_end_matches('\r')));
                    start = i + 1;
                    record_line = line + 1;
                }
                line += 1;
            }
            _ => {}
        }
    }
    if start < content.len() {
        records.push((record_line, content[start..].trim_end_matches('\r')));
    }
    records
}

/// Parse a single CSV line, handling quoted fields
pub(crate) fn parse_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut field_was_quoted = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                // Check for escaped quote
                if chars.peek() == Some(&'"') {
                    current.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            } else {
                current.push(c);
            }
        } else {
            match c {
                '"' => {
                    in_quotes = true;
                    field_was_quoted = true;
                }
                ',' => {
                    let field = std::mem::take(&mut current);
                    fields.push(if field_was_quoted {
                        field
                    } else {
                        field.trim().to_string()
                    });
                    field_was_quoted = false;
                }
                _ => current.push(c),
            }
        }
    }
    if field_was_quoted {
        fields.push(current);
    } else {
        fields.push(current.trim().to_string());
    }
    fields
}

/// Parse a CSV field into a cell
/// - Empty string -> Empty
/// - Finite number -> Number (unless it has leading zeros like "007")
/// - Otherwise -> Text, keeping quoted surrounding whitespace
/// - `'` in front of a formula-looking value -> that value as Text
pub(crate) fn parse_csv_field(field: &str) -> CellValue {
    if field.is_empty() {
        return CellValue::Empty;
    }

    let unguarded = strip_formula_guard(field);
    if unguarded.len() != field.len() {
        return CellValue::text(unguarded);
    }

    let trimmed = field.trim();
    if field != trimmed {
        return CellValue::text(field);
    }

    // "007" stays text, "0" and "0.5" are numbers
    if trimmed.starts_with('0')
        && trimmed.len() > 1
        && !trimmed.starts_with("0.")
        && trimmed.chars().nth(1).is_some_and(|c| c.is_ascii_digit())
    {
        return CellValue::text(trimmed);
    }

    match trimmed.parse::<f64>() {
        Ok(n) if n.is_finite() => CellValue::Number(n),
        _ => CellValue::text(trimmed),
    }
}

/// Write a table as CSV, header row first.
pub fn write_csv(path: &Path, table: &Table) -> Result<()> {
    let mut file = std::fs::File::create(path)?;
    file.write_all(table_to_csv(table).as_bytes())?;
    Ok(())
}

pub(crate) fn table_to_csv(table: &Table) -> String {
    let mut out = String::new();
    let header: Vec<String> = table.columns().iter().map(|c| escape_csv_field(c)).collect();
    out.push_str(&header.join(","));
    out.push('\n');
    for row in table.rows() {
        let fields: Vec<String> = row
            .cells()
            .iter()
            .map(|value| match value {
                CellValue::Number(n) => format_number(*n),
                other => escape_csv_field(&other.to_string()),
            })
            .collect();
        out.push_str(&fields.join(","));
        out.push('\n');
    }
    out
}

/// True if a spreadsheet app would read `field` as a formula, or if `field`
/// already looks like a guarded value and so needs guarding itself.
fn needs_formula_guard(field: &str) -> bool {
    if let Some(rest) = field.strip_prefix('\'') {
        return needs_formula_guard(rest);
    }
    let first_non_space = field.trim_start_matches([' ', '\t']).chars().next();
    matches!(first_non_space, Some('=' | '+' | '-' | '@'))
}

/// Remove the `'` that [`escape_csv_field`] puts in front of formula-looking text.
fn strip_formula_guard(field: &str) -> &str {
    match field.strip_prefix('\'') {
        Some(rest) if needs_formula_guard(rest) => rest,
        _ => field,
    }
}

/// Escape a field for CSV output
fn escape_csv_field(field: &str) -> String {
    // Guard against CSV formula injection in spreadsheet apps.
    let safe_field = if needs_formula_guard(field) {
        format!("'{}", field)
    } else {
        field.to_string()
    };

    if safe_field.contains(',')
        || safe_field.contains('"')
        || safe_field.contains('\n')
        || safe_field.contains('\r')
        || safe_field != safe_field.trim()
    {
        format!("\"{}\"", safe_field.replace('"', "\"\""))
    } else {
        safe_field
    }
}
