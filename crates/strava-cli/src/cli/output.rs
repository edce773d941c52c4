//! Terminal rendering helpers

use serde::Serialize;

use crate::error::Result;

/// Render rows of `(label, cell)` pairs as a left-aligned text table.
///
/// Headers come from the first row's labels; every row must share them.
pub fn render_table(rows: &[Vec<(&'static str, String)>]) -> String {
    let Some(first) = rows.first() else {
        return String::new();
    };

    let headers: Vec<&str> = first.iter().map(|(label, _)| *label).collect();
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, (_, cell)) in row.iter().enumerate() {
            if let Some(w) = widths.get_mut(i) {
                *w = (*w).max(cell.chars().count());
            }
        }
    }

    let mut out = String::new();
    let header_cells: Vec<String> = headers.iter().map(|h| h.to_string()).collect();
    push_line(&mut out, &header_cells, &widths);

    let rule_len = widths.iter().sum::<usize>() + 2 * widths.len().saturating_sub(1);
    out.push_str(&"-".repeat(rule_len));
    out.push('\n');

    for row in rows {
        let cells: Vec<String> = row.iter().map(|(_, cell)| cell.clone()).collect();
        push_line(&mut out, &cells, &widths);
    }

    out
}

/// Render `(label, value)` pairs as an aligned two-column listing
pub fn render_details(rows: &[(&'static str, String)]) -> String {
    let width = rows
        .iter()
        .map(|(label, _)| label.chars().count())
        .max()
        .unwrap_or(0);

    rows.iter()
        .map(|(label, value)| format!("{:<width$}  {}\n", label, value, width = width))
        .collect()
}

/// Pretty-print a serializable value as JSON on stdout
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn push_line(out: &mut String, cells: &[String], widths: &[usize]) {
    let line: Vec<String> = cells
        .iter()
        .zip(widths)
        .map(|(cell, w)| format!("{:<width$}", cell, width = *w))
        .collect();
    out.push_str(line.join("  ").trim_end());
    out.push('\n');
}
