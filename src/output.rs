// Export and console rendering.
//
// Exports take the rendered text grid of a table (what the console shows),
// not the raw values, so amounts keep their grouping and unit.
use std::fs;
use std::path::Path;

use serde::Serialize;
use tabled::builder::Builder;
use tabled::settings::object::Columns;
use tabled::settings::{Alignment, Style};
use tabled::{Table, Tabled};

use crate::error::ExportError;
use crate::sort::{Align, SortState, TableRow};

/// Prepended so spreadsheet apps pick UTF-8 for Hangul text.
pub const UTF8_BOM: &str = "\u{feff}";

/// Header and cell text of a table, in column order.
pub fn text_grid<T: Tabled>(rows: &[T]) -> (Vec<String>, Vec<Vec<String>>) {
    let headers = T::headers().into_iter().map(|h| h.into_owned()).collect();
    let cells = rows
        .iter()
        .map(|r| r.fields().into_iter().map(|c| c.into_owned()).collect())
        .collect();
    (headers, cells)
}

/// CSV text of a grid: a BOM, then one line per row. Fields holding a comma,
/// quote or line break are quoted with inner quotes doubled.
pub fn grid_to_csv(headers: &[String], rows: &[Vec<String>]) -> Result<String, ExportError> {
    let mut buf: Vec<u8> = Vec::new();
    {
        let mut wtr = csv::WriterBuilder::new()
            .quote_style(csv::QuoteStyle::Necessary)
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(&mut buf);
        wtr.write_record(headers)?;
        for r in rows {
            wtr.write_record(r)?;
        }
        wtr.flush()?;
    }
    let body = String::from_utf8_lossy(&buf);
    Ok(format!("{UTF8_BOM}{body}"))
}

pub fn export_grid(path: &Path, headers: &[String], rows: &[Vec<String>]) -> Result<(), ExportError> {
    fs::write(path, grid_to_csv(headers, rows)?)?;
    Ok(())
}

/// Export a report table as it is rendered.
pub fn export_table<T: Tabled>(path: &Path, rows: &[T]) -> Result<(), ExportError> {
    let (headers, cells) = text_grid(rows);
    export_grid(path, &headers, &cells)
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), ExportError> {
    let s = serde_json::to_string_pretty(value)?;
    fs::write(path, s)?;
    Ok(())
}

pub fn print_json<T: Serialize>(value: &T) -> Result<(), ExportError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Render a sortable table: column alignment from its column definitions
/// and a direction marker on the active sort column.
pub fn render_sorted<T>(rows: &[T], sort: Option<&SortState>, max_rows: usize) -> String
where
    T: Tabled + TableRow,
{
    let columns = T::columns();
    let mut headers: Vec<String> = T::headers().into_iter().map(|h| h.into_owned()).collect();
    if let Some(state) = sort {
        if let Some(col) = T::column(&state.key) {
            if let Some(h) = headers.iter_mut().find(|h| h.as_str() == col.label) {
                h.push_str(state.direction.indicator());
            }
        }
    }

    let mut builder = Builder::default();
    builder.push_record(headers);
    for r in rows.iter().take(max_rows) {
        builder.push_record(r.fields().into_iter().map(|c| c.into_owned()));
    }
    let mut table = builder.build();
    table.with(Style::markdown());

    for (idx, label) in T::headers().iter().enumerate() {
        let align = columns
            .iter()
            .find(|c| c.label == label.as_ref())
            .map_or(Align::Left, |c| c.align);
        let setting = match align {
            Align::Left => Alignment::left(),
            Align::Center => Alignment::center(),
            Align::Right => Alignment::right(),
        };
        table.modify(Columns::single(idx), setting);
    }
    table.to_string()
}

pub fn preview_sorted<T>(title: &str, rows: &[T], sort: Option<&SortState>, max_rows: usize)
where
    T: Tabled + TableRow,
{
    println!("\n{}", title);
    if rows.is_empty() {
        println!("(표시할 데이터가 없습니다)\n");
        return;
    }
    println!("{}", render_sorted(rows, sort, max_rows));
    if rows.len() > max_rows {
        println!("({} of {} rows shown)", max_rows, rows.len());
    }
    println!();
}

/// Plain preview for tables without sort support.
pub fn preview_table_rows<T>(title: &str, rows: &[T], max_rows: usize)
where
    T: Tabled + Clone,
{
    println!("\n{}", title);
    let slice: Vec<T> = rows.iter().cloned().take(max_rows).collect();
    if slice.is_empty() {
        println!("(표시할 데이터가 없습니다)\n");
        return;
    }
    let table_str = Table::new(slice).with(Style::markdown()).to_string();
    println!("{}\n", table_str);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sort::SortKind;
    use crate::types::SupplierRankRow;

    fn rows() -> Vec<SupplierRankRow> {
        vec![
            SupplierRankRow { rank: 1, supplier: "두발로 주식회사".into(), contract_count: 12, amount: 1_500_000 },
            SupplierRankRow { rank: 2, supplier: "A, \"B\" 상사".into(), contract_count: 3, amount: 20_000 },
        ]
    }

    #[test]
    fn csv_starts_with_bom_and_quotes_when_needed() {
        let (headers, cells) = text_grid(&rows());
        let csv = grid_to_csv(&headers, &cells).unwrap();
        assert!(csv.starts_with(UTF8_BOM));
        let lines: Vec<&str> = csv.trim_start_matches(UTF8_BOM).lines().collect();
        assert_eq!(lines[0], "순위,업체명,계약건수,판매금액");
        assert_eq!(lines[1], "1,두발로 주식회사,12,\"1,500,000원\"");
        assert_eq!(lines[2], "2,\"A, \"\"B\"\" 상사\",3,\"20,000원\"");
    }

    #[test]
    fn sorted_render_marks_active_column() {
        let state = SortState::descending("amount", SortKind::Numeric);
        let text = render_sorted(&rows(), Some(&state), 10);
        assert!(text.contains("판매금액 ▼"));
        assert!(!text.contains("업체명 ▼"));
        let one = render_sorted(&rows(), None, 1);
        assert!(!one.contains("A, \"B\""));
    }
}
