/// JSON export (array of objects) and import.
use crate::error::{Error, Result};
use crate::model::record::bool_str;
use crate::model::Record;
use serde_json::Value;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Write `records` as a JSON array; each object has exactly `fields`, in
/// order.
pub fn write_json<W: Write>(writer: W, fields: &[&str], records: &[Record]) -> Result<()> {
    let rows: Vec<Record> = records
        .iter()
        .map(|r| Record::from_pairs(fields.iter().map(|f| (*f, r.value(f)))))
        .collect();
    serde_json::to_writer_pretty(writer, &rows)?;
    Ok(())
}

pub fn export_json(path: &Path, fields: &[&str], records: &[Record]) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    write_json(&mut writer, fields, records)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

/// Parse a JSON array of flat objects (a single object is accepted too).
///
/// Non-string scalars are rendered as text; `null` becomes empty.
pub fn read_json(text: &str) -> Result<Vec<Record>> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    if text.trim().is_empty() {
        return Err(Error::BaselineParse("file is empty".into()));
    }
    let value: Value = serde_json::from_str(text)
        .map_err(|e| Error::BaselineParse(format!("invalid JSON: {e}")))?;
    let rows = match value {
        Value::Array(rows) => rows,
        obj @ Value::Object(_) => vec![obj],
        _ => {
            return Err(Error::BaselineParse(
                "expected an array of objects".into(),
            ))
        }
    };

    rows.into_iter()
        .enumerate()
        .map(|(i, row)| match row {
            Value::Object(obj) => Ok(Record::from_pairs(
                obj.into_iter().map(|(k, v)| (k, scalar_text(v))),
            )),
            _ => Err(Error::BaselineParse(format!("element {i} is not an object"))),
        })
        .collect()
}

/// Read a baseline JSON file and check that the objects carry `key_field`.
pub fn import_json(path: &Path, key_field: &str) -> Result<Vec<Record>> {
    let text = std::fs::read_to_string(path)?;
    let records = read_json(&text)?;
    if records.is_empty() {
        return Err(Error::BaselineParse("no entries".into()));
    }
    if !records.iter().any(|r| r.contains(key_field)) {
        return Err(Error::BaselineParse(format!(
            "missing key field '{key_field}'"
        )));
    }
    Ok(records)
}

fn scalar_text(value: Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s,
        Value::Bool(b) => bool_str(b).to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_objects_in_field_order() {
        let records = vec![Record::from_pairs([("A", "1"), ("B", "2")])];
        let mut out = Vec::new();
        write_json(&mut out, &["B", "A"], &records).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.find("\"B\"").unwrap() < text.find("\"A\"").unwrap());
        let back = read_json(&text).unwrap();
        assert_eq!(back[0].value("A"), "1");
    }

    #[test]
    fn reads_mixed_scalars() {
        let text = r#"[{"Name":"Foo","Size":1024,"IsFramework":true,"Comments":null}]"#;
        let records = read_json(text).unwrap();
        assert_eq!(records[0].value("Size"), "1024");
        assert_eq!(records[0].value("IsFramework"), "True");
        assert_eq!(records[0].value("Comments"), "");
    }

    #[test]
    fn rejects_non_objects() {
        assert!(matches!(read_json("[1,2]"), Err(Error::BaselineParse(_))));
        assert!(matches!(read_json("\"x\""), Err(Error::BaselineParse(_))));
        assert!(matches!(read_json("  "), Err(Error::BaselineParse(_))));
        assert!(matches!(read_json("{oops"), Err(Error::BaselineParse(_))));
    }
}
