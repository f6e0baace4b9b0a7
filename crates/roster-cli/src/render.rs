//! Console output for list views.

use anyhow::Result;
use colored::Colorize;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, CellAlignment, Color, ContentArrangement, Table};
use roster_core::filter::json::{display_value, get_field};
use roster_core::page_window::render_line;
use roster_core::{ListEngine, PaginationDescriptor, SampleEstimate};
use serde_json::Value;

/// Column order for records without configured columns: union of keys in
/// first-seen order, `id` first.
fn ordered_columns(records: &[&Value]) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for record in records {
        if let Value::Object(map) = record {
            for key in map.keys() {
                if !columns.contains(key) {
                    columns.push(key.clone());
                }
            }
        }
    }

    if let Some(pos) = columns.iter().position(|c| c == "id") {
        let id = columns.remove(pos);
        columns.insert(0, id);
    }
    columns
}

/// Builds the records table for the visible page.
pub fn records_table(records: &[&Value], columns: &[String]) -> Table {
    let columns = if columns.is_empty() {
        ordered_columns(records)
    } else {
        columns.to_vec()
    };

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);

    let header: Vec<Cell> = columns
        .iter()
        .map(|c| Cell::new(c).fg(Color::Cyan))
        .collect();
    table.set_header(header);

    for record in records {
        let cells: Vec<Cell> = columns
            .iter()
            .map(|col| {
                let value = match get_field(record, col) {
                    None | Some(Value::Null) => "-".to_string(),
                    Some(v) => display_value(v),
                };
                Cell::new(value)
            })
            .collect();
        table.add_row(cells);
    }

    table
}

/// "Showing 11-20 of 25 (page 2/3)".
pub fn pagination_line(pagination: &PaginationDescriptor) -> String {
    if pagination.total_items == 0 {
        return "No records".to_string();
    }
    format!(
        "Showing {}-{} of {} (page {}/{})",
        pagination.first_item(),
        pagination.last_item(),
        pagination.total_items,
        pagination.current_page,
        pagination.total_pages
    )
}

/// Formats a metric value; estimates are prefixed with `~`.
pub fn format_estimate(estimate: &SampleEstimate) -> String {
    let value = if estimate.value.fract().abs() < 1e-9 {
        format!("{:.0}", estimate.value)
    } else {
        format!("{:.2}", estimate.value)
    };
    if estimate.is_estimated() {
        format!("~{value}")
    } else {
        value
    }
}

/// Builds the statistics table.
pub fn estimates_table<'a>(
    estimates: impl IntoIterator<Item = (&'a String, &'a SampleEstimate)>,
) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Metric").fg(Color::Cyan),
        Cell::new("Value").fg(Color::Cyan),
        Cell::new("Basis").fg(Color::Cyan),
        Cell::new("Sample").fg(Color::Cyan),
    ]);

    for (name, estimate) in estimates {
        let basis = if estimate.is_estimated() {
            Cell::new(format!("{} (estimated)", estimate.basis)).fg(Color::Yellow)
        } else {
            Cell::new(estimate.basis)
        };
        table.add_row(vec![
            Cell::new(name),
            Cell::new(format_estimate(estimate)).set_alignment(CellAlignment::Right),
            basis,
            Cell::new(format!("{}/{}", estimate.sample_size, estimate.population)),
        ]);
    }

    table
}

/// Prints the whole view: title, table, pagination, page controls and
/// statistics.
pub fn print_view(engine: &ListEngine<Value>, title: Option<&str>, columns: &[String]) {
    if let Some(title) = title {
        println!("{}", title.bold().underline());
    }

    print_status(engine);

    let page = engine.visible_page();
    if page.is_empty() {
        println!("{}", "No results.".dimmed());
    } else {
        println!("{}", records_table(&page, columns));
    }

    let pagination = engine.pagination();
    println!("{}", pagination_line(pagination).dimmed());
    let window = engine.page_window();
    if window.len() > 1 {
        println!("{}", render_line(&window, pagination.current_page));
    }

    if !engine.estimates().is_empty() {
        println!("{}", estimates_table(engine.estimates()));
    }
}

/// Prints loading, search and error state, if any.
pub fn print_status(engine: &ListEngine<Value>) {
    if engine.is_loading() {
        println!("{}", "Loading...".yellow());
    }
    if engine.query().search_pending() {
        println!("{} {}", "Searching:".yellow(), engine.query().raw_search());
    }
    if let Some(error) = engine.error() {
        println!("{} {}", "Error:".red().bold(), error);
    }
}

/// Prints the view snapshot as pretty JSON.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn print_json(engine: &ListEngine<Value>) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&engine.snapshot())?);
    Ok(())
}
