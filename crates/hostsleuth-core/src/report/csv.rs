/// CSV export and baseline import.
///
/// Import tolerates the two quirks of CSV written by Windows tooling: a
/// UTF-8 byte-order mark and a leading `#TYPE ...` line.
use crate::error::{Error, Result};
use crate::model::Record;
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

/// Write `records` with one column per entry of `fields`.
pub fn write_csv<W: Write>(writer: W, fields: &[&str], records: &[Record]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(fields)?;
    for record in records {
        wtr.write_record(fields.iter().map(|f| record.value(f)))?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn export_csv(path: &Path, fields: &[&str], records: &[Record]) -> Result<()> {
    let file = File::create(path)?;
    write_csv(BufWriter::new(file), fields, records)
}

/// Parse CSV text into records, keeping the header order.
///
/// An empty document (no header) is a [`Error::BaselineParse`].
pub fn read_csv<R: Read>(mut reader: R) -> Result<(Vec<String>, Vec<Record>)> {
    let mut text = String::new();
    reader.read_to_string(&mut text)?;
    let body = strip_preamble(&text);
    if body.trim().is_empty() {
        return Err(Error::BaselineParse("file is empty".into()));
    }

    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(body.as_bytes());
    let headers: Vec<String> = rdr
        .headers()
        .map_err(|e| Error::BaselineParse(format!("unreadable header: {e}")))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    if headers.iter().all(String::is_empty) {
        return Err(Error::BaselineParse("header row is empty".into()));
    }

    let mut records = Vec::new();
    for (line, row) in rdr.records().enumerate() {
        let row = row.map_err(|e| Error::BaselineParse(format!("row {}: {e}", line + 2)))?;
        records.push(Record::from_pairs(
            headers
                .iter()
                .zip(row.iter())
                .map(|(h, v)| (h.as_str(), v.to_string())),
        ));
    }
    Ok((headers, records))
}

/// Read a baseline CSV and check that it carries `key_field`.
pub fn import_csv(path: &Path, key_field: &str) -> Result<Vec<Record>> {
    let file = File::open(path)?;
    let (headers, records) = read_csv(file)?;
    if !headers.iter().any(|h| h == key_field) {
        return Err(Error::BaselineParse(format!(
            "missing key column '{key_field}'"
        )));
    }
    Ok(records)
}

fn strip_preamble(text: &str) -> &str {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    if text.starts_with("#TYPE") {
        return text.split_once('\n').map_or("", |(_, rest)| rest);
    }
    text
}
