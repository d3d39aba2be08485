use crate::coercion::{column_type, try_coerce};
use crate::objects::*;
use crate::Error;
use log::{debug, warn};
use std::collections::BTreeMap;
use std::sync::Arc;

/// A CSV file of the feed, read as strings
///
/// The first line is the header. Lines may have fewer fields than the header (the
/// missing columns are absent from the [RawRecord]); extra fields are dropped.
#[derive(Debug, Default)]
pub struct RawTable {
    /// Table name, the file name without its extension (e.g. `stop_times`)
    pub name: String,
    /// Column names, trimmed
    pub headers: Vec<ColumnName>,
    /// Data rows, in file order
    pub rows: Vec<RawRecord>,
}

impl RawTable {
    /// Parses a whole CSV file
    ///
    /// Quoted fields may contain commas and doubled quotes (`""` is a literal `"`), and keep
    /// their surrounding whitespace; headers and unquoted fields are trimmed.
    /// Blank lines are skipped. An empty text gives a table without headers nor rows.
    pub fn parse(name: &str, text: &str) -> Result<RawTable, Error> {
        // Some producers (Excel exports mostly) start the file with a BOM
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);

        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::Headers)
            .from_reader(text.as_bytes());

        let headers: Vec<ColumnName> = reader
            .headers()
            .map_err(|e| Error::CSVError {
                file_name: name.to_owned(),
                source: e,
            })?
            .iter()
            .map(Arc::from)
            .collect();

        // Pre-allocate a StringRecord for performance reasons
        let mut rec = csv::StringRecord::new();
        let mut rows = Vec::new();
        let mut overlong = 0usize;

        while reader.read_record(&mut rec).map_err(|e| Error::CSVError {
            file_name: name.to_owned(),
            source: e,
        })? {
            let start = rec.position().map_or(0, |p| p.byte() as usize);
            let end = reader.position().byte() as usize;
            let quoted = quoted_fields(text.as_bytes().get(start..end).unwrap_or_default());
            let is_quoted = |i: usize| quoted.get(i).copied().unwrap_or(false);

            // A line of spaces only is blank
            if rec.len() == 1 && !is_quoted(0) && rec[0].trim().is_empty() {
                continue;
            }
            if rec.len() > headers.len() {
                overlong += 1;
            }
            let mut row = RawRecord::with_capacity(headers.len());
            for (i, (column, value)) in headers.iter().zip(rec.iter()).enumerate() {
                let value = if is_quoted(i) { value } else { value.trim() };
                row.push(Arc::clone(column), value.to_owned());
            }
            rows.push(row);
        }

        if overlong > 0 {
            warn!("{overlong} rows of {name} have more fields than the header, extra fields dropped");
        }
        debug!("{name}: {} columns, {} rows", headers.len(), rows.len());

        Ok(RawTable {
            name: name.to_owned(),
            headers,
            rows,
        })
    }

    /// Converts every row with the column rules of [crate::coercion]
    ///
    /// Fields that cannot be converted become [TypedValue::Null]. Only the first bad value
    /// of each column is logged, followed by a count, so a broken column in `stop_times`
    /// does not flood the logs.
    pub fn into_typed(self) -> Vec<TypedRecord> {
        let column_types: Vec<_> = self
            .headers
            .iter()
            .map(|column| column_type(&self.name, column))
            .collect();
        let mut malformed: BTreeMap<ColumnName, usize> = BTreeMap::new();

        let records = self
            .rows
            .into_iter()
            .map(|row| {
                let mut record = TypedRecord::with_capacity(row.len());
                for ((column, raw), ty) in row.iter().zip(column_types.iter()) {
                    let value = match try_coerce(*ty, raw) {
                        Ok(value) => value,
                        Err(reason) => {
                            let count = malformed.entry(Arc::clone(column)).or_default();
                            if *count == 0 {
                                warn!(
                                    "{}",
                                    crate::MalformedField {
                                        table: self.name.clone(),
                                        column: column.to_string(),
                                        value: raw.to_owned(),
                                        reason,
                                    }
                                );
                            }
                            *count += 1;
                            TypedValue::Null
                        }
                    };
                    record.push(Arc::clone(column), value);
                }
                record
            })
            .collect();

        for (column, count) in malformed {
            if count > 1 {
                warn!("{}.{column}: {count} values could not be converted", self.name);
            }
        }
        records
    }
}

/// Whether each field of one raw CSV record starts with a double quote
///
/// Scanning stops at the first line break outside quotes. A trailing empty field may be
/// missing from the result.
fn quoted_fields(record: &[u8]) -> Vec<bool> {
    let mut quoted = Vec::new();
    let mut at_field_start = true;
    let mut in_quotes = false;
    let mut bytes = record.iter().copied().peekable();

    while let Some(b) = bytes.next() {
        if at_field_start {
            at_field_start = false;
            quoted.push(b == b'"');
            if b == b'"' {
                in_quotes = true;
                continue;
            }
        }
        if in_quotes {
            if b == b'"' {
                if bytes.peek() == Some(&b'"') {
                    bytes.next();
                } else {
                    in_quotes = false;
                }
            }
            continue;
        }
        match b {
            b',' => at_field_start = true,
            b'\n' | b'\r' => break,
            _ => {}
        }
    }
    quoted
}
