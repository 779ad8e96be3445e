use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};
use serde_json::Value;

use crate::rows::Row;

fn format_value(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::from("NULL"),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Format normalized rows as a table with terminal width awareness
pub fn format_rows(columns: &[String], rows: &[Row]) -> String {
    if columns.is_empty() {
        return String::new();
    }

    let mut table = Table::new();

    // Apply UTF8 preset for nice borders
    table.load_preset(UTF8_FULL);

    // Set content arrangement to dynamically adjust to terminal width
    table.set_content_arrangement(ContentArrangement::DynamicFullWidth);

    table.set_header(columns.iter().map(Cell::new).collect::<Vec<_>>());

    for row in rows {
        let cells: Vec<Cell> = columns
            .iter()
            .map(|column| Cell::new(format_value(row.get(column))))
            .collect();
        table.add_row(cells);
    }

    table.to_string()
}
