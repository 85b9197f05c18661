//! Diagnostic formatting shared by every facade operation: every logged
//! message carries the owning engine context name, the table id, and the
//! offending payload, truncated so a chunk of a million events doesn't
//! flood the log.

use table_schema::{CellValue, Row, StateEvent};

const MAX_PAYLOAD_CHARS: usize = 200;

/// Truncates `payload` to at most [`MAX_PAYLOAD_CHARS`] characters.
pub fn truncate_payload(payload: &str) -> String {
    if payload.chars().count() <= MAX_PAYLOAD_CHARS {
        payload.to_string()
    } else {
        let mut truncated: String = payload.chars().take(MAX_PAYLOAD_CHARS).collect();
        truncated.push_str("...");
        truncated
    }
}

fn describe_cell(cell: &CellValue) -> String {
    cell.to_string()
}

/// Renders a single row as `(cell, cell, ...)`.
pub fn describe_row(row: &Row) -> String {
    let cells: Vec<String> = row.iter().map(describe_cell).collect();
    format!("({})", cells.join(", "))
}

/// Renders a slice of rows for an `add_events`-style payload.
pub fn describe_rows(rows: &[Row]) -> String {
    let rendered: Vec<String> = rows.iter().map(describe_row).collect();
    format!("{} row(s): [{}]", rows.len(), rendered.join(", "))
}

/// Renders a single state event as `row=(...) matching=(...)`.
pub fn describe_state_event(event: &StateEvent) -> String {
    format!(
        "row={} matching={}",
        describe_row(&event.row),
        describe_row(&event.matching)
    )
}

/// Renders a slice of state events for a `delete_events`/`update_events`-style
/// payload.
pub fn describe_state_events(events: &[StateEvent]) -> String {
    let rendered: Vec<String> = events.iter().map(describe_state_event).collect();
    format!("{} event(s): [{}]", events.len(), rendered.join(", "))
}
