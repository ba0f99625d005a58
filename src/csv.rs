use std::collections::BTreeMap;

use tracing::debug;

use crate::rows::{Row, Value, synthesize_id};

// Outcome of a best-effort import. Rows with missing required fields
// are still imported, the problems end up in `errors`.
pub struct ParseOutcome {
    pub rows: Vec<Row>,
    pub errors: Vec<String>,
}

// Parses CSV text into reconciled rows. The first record is the
// header, data rows are mapped to it by position. Blank lines are
// skipped.
pub fn parse(text: &str) -> ParseOutcome {
    let records = parse_records(text);
    let mut rows = Vec::new();
    let mut errors = Vec::new();

    let Some((headers, data)) = records.split_first() else {
        return ParseOutcome { rows, errors };
    };

    for (idx, record) in data.iter().enumerate() {
        let row_number = idx + 1;
        let mut raw: BTreeMap<String, String> = BTreeMap::new();
        for (pos, header) in headers.iter().enumerate() {
            if let Some(value) = record.get(pos) {
                raw.insert(header.clone(), value.clone());
            }
        }

        if raw.get("name").is_none_or(|v| v.is_empty()) {
            errors.push(format!("Row {}: missing required field 'name'", row_number));
        }
        if raw.get("email").is_none_or(|v| v.is_empty()) {
            errors.push(format!("Row {}: missing required field 'email'", row_number));
        }

        rows.push(reconcile(&raw, row_number));
    }

    debug!("Parsed {} rows, {} errors", rows.len(), errors.len());
    ParseOutcome { rows, errors }
}

// Start from the defaults, then merge every raw field on top so a key
// present in the CSV always ends up holding exactly its raw value.
// The id is the exception: an empty raw id must not clobber the
// synthesized one, ids stay unique.
fn reconcile(raw: &BTreeMap<String, String>, row_number: usize) -> Row {
    let mut fields: BTreeMap<String, Value> = BTreeMap::new();
    fields.insert("name".to_string(), Value::Str(String::new()));
    fields.insert("email".to_string(), Value::Str(String::new()));
    fields.insert("age".to_string(), Value::Int(0));
    fields.insert("role".to_string(), Value::from("Viewer"));

    for (key, value) in raw {
        fields.insert(key.clone(), Value::Str(value.clone()));
    }

    let id = raw
        .get("id")
        .filter(|v| !v.is_empty())
        .cloned()
        .unwrap_or_else(|| synthesize_id(row_number));
    fields.insert("id".to_string(), Value::Str(id));

    Row::from_fields(fields)
}

// Raw RFC4180 record scan. Quoted fields may contain delimiters,
// doubled quotes and line breaks. Fully blank lines produce no record.
fn parse_records(text: &str) -> Vec<Vec<String>> {
    let mut records: Vec<Vec<String>> = Vec::new();
    let mut record: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;

    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    field.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            } else {
                field.push(c);
            }
            continue;
        }
        match c {
            '"' => in_quotes = true,
            ',' => record.push(std::mem::take(&mut field)),
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                end_record(&mut records, &mut record, &mut field);
            }
            '\n' => end_record(&mut records, &mut record, &mut field),
            _ => field.push(c),
        }
    }
    end_record(&mut records, &mut record, &mut field);

    records
}

fn end_record(records: &mut Vec<Vec<String>>, record: &mut Vec<String>, field: &mut String) {
    record.push(std::mem::take(field));
    // A lone empty field is a blank line, not a record
    if record.len() == 1 && record[0].is_empty() {
        record.clear();
        return;
    }
    records.push(std::mem::take(record));
}

// Serializes a row projection back to CSV text. Only the named keys
// are emitted, in the given order, headed by a line of the keys.
pub fn serialize(rows: &[Row], visible_keys: &[String]) -> String {
    let mut out = String::new();
    let header: Vec<String> = visible_keys.iter().map(|k| escape_field(k)).collect();
    out.push_str(&header.join(","));
    out.push('\n');

    for row in rows {
        let line: Vec<String> = visible_keys
            .iter()
            .map(|key| {
                let value = row.get(key).map(|v| v.to_string()).unwrap_or_default();
                escape_field(&value)
            })
            .collect();
        out.push_str(&line.join(","));
        out.push('\n');
    }
    out
}

// Fields holding the delimiter, a quote or a line break get wrapped in
// quotes with interior quotes doubled.
pub fn escape_field(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
