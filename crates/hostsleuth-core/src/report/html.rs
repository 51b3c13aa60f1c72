/// Static HTML report: one table with a substring filter box and
/// click-to-sort headers. No external assets.
use crate::error::Result;
use crate::model::Record;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Fields whose value becomes the row's CSS class (`row-new`,
/// `row-changed`, ...).
const ROW_CLASS_FIELDS: &[&str] = &["ChangeStatus", "ChangeType"];

const CSS: &str = r#"
body { font-family: "Segoe UI", sans-serif; margin: 1.5em; color: #222; }
h1 { font-size: 1.4em; margin-bottom: 0.2em; }
.meta { color: #666; margin-bottom: 1em; }
#filter { width: 28em; padding: 0.3em; margin-bottom: 0.8em; }
table { border-collapse: collapse; width: 100%; font-size: 0.9em; }
th, td { border: 1px solid #ccc; padding: 0.25em 0.5em; text-align: left; vertical-align: top; }
th { background: #f0f0f0; cursor: pointer; user-select: none; }
tr:nth-child(even) { background: #fafafa; }
tr.row-new, tr.row-added { background: #e6f4ea; }
tr.row-updated, tr.row-changed { background: #fff4d6; }
tr.row-removed { background: #fde7e9; }
td.risk { color: #b00020; font-weight: 600; }
"#;

const SCRIPT: &str = r#"
const table = document.getElementById('report');
document.getElementById('filter').addEventListener('input', e => {
  const q = e.target.value.toLowerCase();
  for (const row of table.tBodies[0].rows) {
    row.style.display = row.textContent.toLowerCase().includes(q) ? '' : 'none';
  }
});
table.tHead.addEventListener('click', e => {
  const th = e.target.closest('th');
  if (!th) return;
  const col = th.cellIndex;
  const asc = th.dataset.dir !== 'asc';
  for (const h of table.tHead.rows[0].cells) delete h.dataset.dir;
  th.dataset.dir = asc ? 'asc' : 'desc';
  const rows = Array.from(table.tBodies[0].rows);
  rows.sort((a, b) => {
    const x = a.cells[col].textContent, y = b.cells[col].textContent;
    return (asc ? 1 : -1) * x.localeCompare(y, undefined, {numeric: true, sensitivity: 'base'});
  });
  for (const r of rows) table.tBodies[0].appendChild(r);
});
"#;

/// Render the report as a string.
pub fn render_html(title: &str, fields: &[&str], records: &[Record]) -> String {
    let mut html = String::with_capacity(4096 + records.len() * fields.len() * 32);
    let generated = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");

    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"UTF-8\">\n");
    html.push_str(&format!("<title>{}</title>\n", escape_html(title)));
    html.push_str(&format!("<style>{CSS}</style>\n</head>\n<body>\n"));
    html.push_str(&format!("<h1>{}</h1>\n", escape_html(title)));
    html.push_str(&format!(
        "<div class=\"meta\">{} rows &middot; generated {generated}</div>\n",
        records.len()
    ));
    html.push_str("<input id=\"filter\" type=\"search\" placeholder=\"Filter rows...\">\n");
    html.push_str("<table id=\"report\">\n<thead><tr>");
    for f in fields {
        html.push_str(&format!("<th>{}</th>", escape_html(f)));
    }
    html.push_str("</tr></thead>\n<tbody>\n");

    for record in records {
        match row_class(record) {
            Some(class) => html.push_str(&format!("<tr class=\"{class}\">")),
            None => html.push_str("<tr>"),
        }
        for f in fields {
            let value = record.value(f);
            if value.starts_with('!') {
                html.push_str("<td class=\"risk\">");
            } else {
                html.push_str("<td>");
            }
            html.push_str(&escape_html(value));
            html.push_str("</td>");
        }
        html.push_str("</tr>\n");
    }

    html.push_str("</tbody>\n</table>\n");
    html.push_str(&format!("<script>{SCRIPT}</script>\n</body>\n</html>\n"));
    html
}

pub fn export_html(path: &Path, title: &str, fields: &[&str], records: &[Record]) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    writer.write_all(render_html(title, fields, records).as_bytes())?;
    writer.flush()?;
    Ok(())
}

fn row_class(record: &Record) -> Option<String> {
    ROW_CLASS_FIELDS
        .iter()
        .map(|f| record.value(f).trim())
        .find(|v| !v.is_empty())
        .map(|v| {
            let slug: String = v
                .chars()
                .filter(char::is_ascii_alphanumeric)
                .collect::<String>()
                .to_ascii_lowercase();
            format!("row-{slug}")
        })
}

/// Escape text for element content and attribute values.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
