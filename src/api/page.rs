//! HTML rendering for the editor page
//!
//! One page: notices, the four price inputs, the upload control, the CSV
//! download with a preview, and file diagnostics.

use std::fmt::Write;

use crate::layout::PRICE_LAYOUT;
use crate::session::{NoticeLevel, SessionView};

/// Multipart field name of the upload control
pub const UPLOAD_FIELD: &str = "workbook";

const STYLE: &str = r#"
body { font-family: system-ui, sans-serif; margin: 2rem; color: #222; }
main { display: flex; gap: 2rem; }
section { flex: 2; }
aside { flex: 1; }
.notice { padding: .6rem 1rem; border-radius: 4px; margin-bottom: .5rem; }
.success { background: #e6f4ea; } .info { background: #e8f0fe; }
.warning { background: #fef7e0; } .error { background: #fce8e6; }
.field { margin-bottom: .8rem; } .field label { display: block; font-weight: 600; }
.field-error { color: #b3261e; font-size: .9rem; }
table { border-collapse: collapse; } td, th { border: 1px solid #ccc; padding: .2rem .5rem; }
"#;

/// Escape text for HTML element and attribute content
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

fn level_class(level: NoticeLevel) -> &'static str {
    match level {
        NoticeLevel::Success => "success",
        NoticeLevel::Info => "info",
        NoticeLevel::Warning => "warning",
        NoticeLevel::Error => "error",
    }
}

/// Render the full page for a session
pub fn render_page(view: &SessionView) -> String {
    let mut html = String::new();
    let layout = &PRICE_LAYOUT;

    // Writing into a String cannot fail
    let _ = write!(
        html,
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>Price Editor</title>\n<style>{}</style>\n</head>\n<body>\n\
         <h1>Excel Price Editor</h1>\n<p>Edit prices in cells {}-{} of the '{}' sheet and export the '{}' sheet as CSV</p>\n",
        STYLE,
        layout.cells[0].cell,
        layout.cells[layout.cells.len() - 1].cell,
        escape_html(layout.prices_sheet),
        escape_html(layout.export_sheet),
    );

    for notice in &view.notices {
        let _ = writeln!(
            html,
            "<div class=\"notice {}\">{}</div>",
            level_class(notice.level),
            escape_html(&notice.message)
        );
    }

    render_upload(&mut html);
    html.push_str("<main>\n");
    render_form(&mut html, view);
    render_export(&mut html, view);
    html.push_str("</main>\n");
    render_file_info(&mut html, view);

    html.push_str("</body>\n</html>\n");
    html
}

fn render_upload(html: &mut String) {
    let _ = writeln!(
        html,
        "<form class=\"upload\" method=\"post\" action=\"/upload\" enctype=\"multipart/form-data\">\n\
         <label for=\"{field}\">Upload Excel File (optional - overrides default)</label>\n\
         <input type=\"file\" id=\"{field}\" name=\"{field}\" accept=\".xlsx,.xlsm,.xlsb,.xls,.ods\">\n\
         <button type=\"submit\">Upload</button>\n</form>",
        field = UPLOAD_FIELD
    );
}

fn render_form(html: &mut String, view: &SessionView) {
    let layout = &PRICE_LAYOUT;
    let disabled = if view.source.is_some() { "" } else { " disabled" };

    let _ = writeln!(
        html,
        "<section>\n<h2>Edit Prices (Cells {}-{})</h2>\n<form method=\"post\" action=\"/prices\">",
        layout.cells[0].cell,
        layout.cells[layout.cells.len() - 1].cell,
    );

    for field in &view.form.fields {
        let name = field.address.to_lowercase();
        let _ = writeln!(
            html,
            "<div class=\"field\">\n<label for=\"{name}\">{addr} - {label}:</label>\n\
             <input type=\"text\" inputmode=\"decimal\" id=\"{name}\" name=\"{name}\" value=\"{value}\"{disabled}>",
            name = name,
            addr = escape_html(&field.address),
            label = escape_html(field.label),
            value = escape_html(&field.input),
            disabled = disabled,
        );
        if let Some(error) = &field.error {
            let _ = writeln!(
                html,
                "<div class=\"field-error\">{}</div>",
                escape_html(error)
            );
        }
        html.push_str("</div>\n");
    }

    let _ = writeln!(
        html,
        "<button type=\"submit\"{}>Update Prices</button>\n</form>\n</section>",
        disabled
    );
}

fn render_export(html: &mut String, view: &SessionView) {
    let layout = &PRICE_LAYOUT;
    html.push_str("<aside>\n<h2>Export Options</h2>\n");

    if !view.export_available {
        let _ = writeln!(
            html,
            "<div class=\"notice warning\">'{}' sheet not found</div>",
            escape_html(layout.export_sheet)
        );
        if !view.sheet_names.is_empty() {
            html.push_str("<p>Available sheets:</p>\n<ul>\n");
            for name in &view.sheet_names {
                let _ = writeln!(html, "<li>{}</li>", escape_html(name));
            }
            html.push_str("</ul>\n");
        }
        html.push_str("</aside>\n");
        return;
    }

    let _ = writeln!(
        html,
        "<p><a class=\"download\" href=\"/export.csv\" download=\"{}\">Download CSV</a></p>",
        escape_html(layout.export_filename)
    );

    if let Some(preview) = &view.preview {
        html.push_str("<details>\n<summary>Preview Export Sheet</summary>\n<table>\n<tr>");
        for cell in &preview.header {
            let _ = write!(html, "<th>{}</th>", escape_html(cell));
        }
        html.push_str("</tr>\n");
        for row in &preview.rows {
            html.push_str("<tr>");
            for cell in row {
                let _ = write!(html, "<td>{}</td>", escape_html(cell));
            }
            html.push_str("</tr>\n");
        }
        html.push_str("</table>\n");
        if preview.hidden_rows() > 0 {
            let _ = writeln!(html, "<p>... and {} more rows</p>", preview.hidden_rows());
        }
        html.push_str("</details>\n");
    }

    html.push_str("</aside>\n");
}

fn render_file_info(html: &mut String, view: &SessionView) {
    let layout = &PRICE_LAYOUT;
    let Some(source) = &view.source else {
        return;
    };

    let cells: Vec<String> = layout.cells.iter().map(|p| p.cell.a1()).collect();
    let _ = writeln!(
        html,
        "<hr>\n<details>\n<summary>File Information &amp; Diagnostics</summary>\n\
         <p><strong>File:</strong> {}</p>\n<p><strong>Available Sheets:</strong> {}</p>\n\
         <p><strong>Target Cells:</strong> {} in '{}' sheet</p>\n\
         <p><strong>Export Sheet:</strong> '{}' sheet &rarr; CSV download</p>",
        escape_html(source),
        escape_html(&view.sheet_names.join(", ")),
        cells.join(", "),
        escape_html(layout.prices_sheet),
        escape_html(layout.export_sheet),
    );

    if view.export_available {
        html.push_str("<h3>Formula Diagnostics</h3>\n");
        if view.formula_references.is_empty() {
            let _ = writeln!(
                html,
                "<div class=\"notice warning\">No formulas in '{}' reference the '{}' sheet or cells {}. \
                 Price edits will not change the export.</div>",
                escape_html(layout.export_sheet),
                escape_html(layout.prices_sheet),
                cells.join(", "),
            );
        } else {
            html.push_str("<ul>\n");
            for reference in &view.formula_references {
                let _ = writeln!(
                    html,
                    "<li>{}: <code>{}</code></li>",
                    escape_html(&reference.cell),
                    escape_html(&reference.formula)
                );
            }
            html.push_str("</ul>\n");
        }
    }

    html.push_str("</details>\n");
}
