use comfy_table::modifiers::{UTF8_ROUND_CORNERS, UTF8_SOLID_INNER_BORDERS};
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

use ndop_core::Publication;
use ndop_model::{PatientStatus, ReportingPeriod};
use ndop_report::WrittenOutputs;

use crate::commands::{MappingCheck, RunOutcome};

const DIGEST_PREFIX: usize = 12;

pub fn print_summary(outcome: &RunOutcome) {
    let period = &outcome.publication.period;
    println!(
        "Period: {} to {} ({} months)",
        ReportingPeriod::month_label(period.start_date()),
        ReportingPeriod::month_label(period.end_date()),
        period.month_count()
    );
    println!("Output: {}", outcome.output_dir.display());
    println!("{}", period_table(&outcome.publication));
    println!("{}", outputs_table(&outcome.outputs));
}

pub fn print_mapping_check(check: &MappingCheck) {
    let describe = |count: Option<usize>| {
        count.map_or_else(|| "not configured".to_string(), |count| format!("{count} entries"))
    };
    println!("Practice overrides: {}", describe(check.practices));
    println!("LSOA overrides: {}", describe(check.lsoas));
}

/// Headline counts and cleaning outcome per month, latest first.
pub fn period_table(publication: &Publication) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Month"),
        header_cell("Opt-outs"),
        header_cell("List size"),
        header_cell("Rate %"),
        header_cell("Deceased"),
        header_cell("Duplicates"),
        header_cell("NHS numbers nulled"),
    ]);
    apply_summary_table_style(&mut table);
    for index in 1..7 {
        align_column(&mut table, index, CellAlignment::Right);
    }
    for row in &publication.tables.headline.rows {
        let cleaning = [PatientStatus::Living, PatientStatus::Deceased]
            .iter()
            .filter_map(|status| publication.cleaning.get(&(row.month, *status)))
            .fold((0usize, 0usize), |(duplicates, nulled), report| {
                (
                    duplicates + report.duplicates_collapsed,
                    nulled + report.nhs_numbers_nulled,
                )
            });
        table.add_row(vec![
            Cell::new(ReportingPeriod::month_label(row.month)),
            Cell::new(row.opt_out),
            Cell::new(row.list_size),
            row.opt_out_rate()
                .map_or_else(|| dim_cell("-"), |rate| Cell::new(format!("{rate:.2}"))),
            Cell::new(row.deceased),
            Cell::new(cleaning.0),
            Cell::new(cleaning.1),
        ]);
    }
    table
}

pub fn outputs_table(outputs: &WrittenOutputs) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("File"),
        header_cell("Rows"),
        header_cell("SHA-256"),
    ]);
    apply_summary_table_style(&mut table);
    align_column(&mut table, 1, CellAlignment::Right);
    let mut total_rows = 0usize;
    for entry in &outputs.manifest.files {
        total_rows += entry.rows;
        let digest = entry.sha256.get(..DIGEST_PREFIX).unwrap_or(&entry.sha256);
        table.add_row(vec![
            Cell::new(&entry.name),
            Cell::new(entry.rows),
            dim_cell(format!("{digest}…")),
        ]);
    }
    table.add_row(vec![
        Cell::new("TOTAL")
            .fg(Color::Cyan)
            .add_attribute(Attribute::Bold),
        Cell::new(total_rows).add_attribute(Attribute::Bold),
        dim_cell(outputs.manifest_path.display()),
    ]);
    table
}

fn apply_summary_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .apply_modifier(UTF8_SOLID_INNER_BORDERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
}

fn align_column(table: &mut Table, index: usize, alignment: CellAlignment) {
    if let Some(column) = table.column_mut(index) {
        column.set_cell_alignment(alignment);
    }
}

fn header_cell(label: &str) -> Cell {
    Cell::new(label)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

fn dim_cell<T: ToString>(value: T) -> Cell {
    Cell::new(value).add_attribute(Attribute::Dim)
}
