// 🏗️ Delimited-Text Parser
// One generic CSV reader for every entity kind (header line + data lines)

use csv::{ReaderBuilder, StringRecord};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const BYTE_ORDER_MARK: char = '\u{feff}';

// ============================================================================
// RAW ROW
// ============================================================================

/// RawRow - One data line keyed by header name
///
/// Header order is preserved. `row_number` counts the header as row 1,
/// so the first data line is row 2.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRow {
    pub row_number: usize,
    fields: Vec<(String, String)>,
}

impl RawRow {
    pub fn new(row_number: usize, fields: Vec<(String, String)>) -> Self {
        RawRow { row_number, fields }
    }

    /// Value for a header, `None` when the header is not in the file
    pub fn get(&self, header: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(name, _)| name == header)
            .map(|(_, value)| value.as_str())
    }

    /// Value for a header, empty when the header is not in the file
    pub fn value(&self, header: &str) -> &str {
        self.get(header).unwrap_or("")
    }

    pub fn headers(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

// ============================================================================
// CSV PARSER
// ============================================================================

/// CsvParser - RFC 4180 style reader over in-memory text
///
/// Quote state is tracked per field by the `csv` reader, so a quoted field
/// may contain the delimiter, doubled quotes, or even a line break.
#[derive(Debug, Clone)]
pub struct CsvParser {
    delimiter: u8,
}

impl Default for CsvParser {
    fn default() -> Self {
        CsvParser { delimiter: b',' }
    }
}

impl CsvParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: use a different single-byte delimiter
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Parse text into rows
    ///
    /// Never fails: text without a header or without data lines yields an
    /// empty vector. Short rows are padded with empty strings, extra
    /// trailing fields are dropped.
    pub fn parse(&self, text: &str) -> Vec<RawRow> {
        let mut lines = self.records(text).into_iter();

        let headers = match lines.next() {
            Some(record) => dedupe_headers(&record),
            None => return Vec::new(),
        };

        lines
            .enumerate()
            .map(|(index, record)| {
                let fields = headers
                    .iter()
                    .enumerate()
                    .map(|(i, header)| (header.clone(), record.get(i).unwrap_or("").to_string()))
                    .collect();
                RawRow::new(index + 2, fields)
            })
            .collect()
    }

    /// Header names as the parser sees them (trimmed, de-duplicated)
    pub fn headers(&self, text: &str) -> Option<Vec<String>> {
        self.records(text).first().map(dedupe_headers)
    }

    /// True when the text has at least a non-blank header line
    pub fn has_header(&self, text: &str) -> bool {
        !self.records(text).is_empty()
    }

    /// All non-blank records, header included
    fn records(&self, text: &str) -> Vec<StringRecord> {
        let text = text.strip_prefix(BYTE_ORDER_MARK).unwrap_or(text);

        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(self.delimiter)
            .from_reader(text.as_bytes());

        let mut records = Vec::new();
        for (index, result) in reader.records().enumerate() {
            match result {
                Ok(record) if is_blank(&record) => continue,
                Ok(record) => records.push(record),
                Err(e) => log::warn!("Skipping unreadable CSV record {}: {}", index + 1, e),
            }
        }

        records
    }
}

/// Parse with the default comma delimiter
pub fn parse(text: &str) -> Vec<RawRow> {
    CsvParser::new().parse(text)
}

/// A blank line is a single field holding only whitespace
fn is_blank(record: &StringRecord) -> bool {
    record.len() <= 1 && record.get(0).map_or(true, |field| field.trim().is_empty())
}

/// Trim header names and suffix repeats (`name`, `name_2`, `name_3`)
fn dedupe_headers(record: &StringRecord) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();

    record
        .iter()
        .map(|raw| {
            let name = raw.trim().to_string();
            let count = seen.entry(name.clone()).or_insert(0);
            *count += 1;
            if *count == 1 {
                name
            } else {
                format!("{}_{}", name, count)
            }
        })
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================
