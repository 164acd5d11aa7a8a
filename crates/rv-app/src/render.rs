//! Plain-text rendering of a table view

use std::fmt::Write;

use rv_core::{LogicalWindow, RecordOrder, ViewSnapshot, ViewSubscriber};
use serde_json::Value;

/// Longest cell text before truncation
const MAX_CELL_WIDTH: usize = 24;

/// Prints the view to stdout every time it changes
#[derive(Debug, Default)]
pub struct TextRenderer;

impl ViewSubscriber for TextRenderer {
    fn on_view_change(&self, snapshot: &ViewSnapshot) {
        println!("{}", render(snapshot));
    }
}

pub fn render(snapshot: &ViewSnapshot) -> String {
    let mut out = String::new();
    match &snapshot.window {
        Some(window) => render_window(&mut out, &snapshot.order, window, snapshot),
        None => out.push_str("(no data)\n"),
    }
    if let Some(found) = &snapshot.find_result {
        let _ = writeln!(
            out,
            "matches: {} before, {} here, {} after",
            found.before, found.at, found.after
        );
    }
    if let Some(status) = &snapshot.status {
        let _ = writeln!(out, "! {}", status);
    }
    out
}

fn render_window(out: &mut String, order: &RecordOrder, window: &LogicalWindow, snapshot: &ViewSnapshot) {
    let mut header: Vec<String> = vec!["#".to_string()];
    header.extend(order.entries().iter().enumerate().map(|(i, entry)| {
        let arrow = if entry.is_ascending { '^' } else { 'v' };
        let mark = if snapshot.selection.columns.contains(i) { "*" } else { "" };
        format!("{}{}{}", mark, entry.name(), arrow)
    }));

    let body: Vec<Vec<String>> = window
        .rows
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let count = if snapshot.selection.rows.contains(i) {
                format!("*{}", row.count)
            } else {
                row.count.to_string()
            };
            std::iter::once(count)
                .chain(row.values.iter().map(cell_text))
                .collect()
        })
        .collect();

    let mut widths: Vec<usize> = header.iter().map(|h| h.chars().count()).collect();
    for row in &body {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    write_line(out, &header, &widths);
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    write_line(out, &rule, &widths);
    for row in &body {
        write_line(out, row, &widths);
    }

    let first = if window.is_empty() { 0 } else { window.start_position + 1 };
    let last = window.start_position + window.displayed_row_count();
    let _ = writeln!(
        out,
        "rows {}-{} of {} ({:.1}%)",
        first,
        last,
        window.total_row_count,
        window.start_percent()
    );
}

fn write_line(out: &mut String, cells: &[String], widths: &[usize]) {
    let line: Vec<String> = cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
        .collect();
    let _ = writeln!(out, "{}", line.join(" | ").trim_end());
}

fn cell_text(value: &Value) -> String {
    let text = match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    if text.chars().count() > MAX_CELL_WIDTH {
        let mut short: String = text.chars().take(MAX_CELL_WIDTH - 3).collect();
        short.push_str("...");
        short
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rv_core::{ColumnDescription, ColumnSortOrientation, ContentsKind, RowView, SelectionInput};
    use serde_json::json;

    fn snapshot() -> ViewSnapshot {
        let order = RecordOrder::new(vec![
            ColumnSortOrientation::ascending(ColumnDescription::new("city", ContentsKind::String, false)),
            ColumnSortOrientation::descending(ColumnDescription::new("n", ContentsKind::Integer, true)),
        ]);
        let window = LogicalWindow {
            schema: order.schema(),
            total_row_count: 40,
            start_position: 10,
            rows: vec![
                RowView::new(2, vec![json!("Oslo"), json!(7)]),
                RowView::new(1, vec![json!("Bergen"), Value::Null]),
            ],
        };
        ViewSnapshot {
            order,
            window: Some(window),
            ..ViewSnapshot::default()
        }
    }

    #[test]
    fn renders_rows_and_footer() {
        let text = render(&snapshot());
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "# | city^  | nv");
        assert_eq!(lines[2], "2 | Oslo   | 7");
        assert_eq!(lines[3], "1 | Bergen |");
        assert_eq!(lines[4], "rows 11-13 of 40 (25.0%)");
    }

    #[test]
    fn marks_selection_and_status() {
        let mut snapshot = snapshot();
        snapshot.selection.rows.apply(SelectionInput::Plain, 1);
        snapshot.status = Some("Already at the top".into());
        let text = render(&snapshot);
        assert!(text.contains("*1 | Bergen"));
        assert!(text.ends_with("! Already at the top\n"));
    }

    #[test]
    fn truncates_long_cells() {
        let long = "x".repeat(40);
        assert_eq!(cell_text(&json!(long)).chars().count(), MAX_CELL_WIDTH);
        assert_eq!(render(&ViewSnapshot::default()), "(no data)\n");
    }
}
