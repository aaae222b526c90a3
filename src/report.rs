use colored::Colorize;
use comfy_table::{
    presets::UTF8_FULL, Attribute, Cell, CellAlignment, Color as TColor, ContentArrangement, Table,
};

use crate::change::ChangeMetric;
use crate::client::SchemeListing;
use crate::view::{SchemeView, WindowView};
use crate::window::TimeWindow;

pub fn format_with_commas(value: f64) -> String {
    let formatted = format!("{:.2}", value.abs());
    let (integer_part, decimal_part) = formatted.split_once('.').unwrap_or((&formatted, "00"));

    let mut grouped = String::with_capacity(integer_part.len() + integer_part.len() / 3);
    for (i, c) in integer_part.chars().enumerate() {
        if i > 0 && (integer_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    let sign = if value < 0.0 { "-" } else { "" };
    format!("{sign}{grouped}.{decimal_part}")
}

/// `₹1,234.56`, or `—` for an unknown NAV.
pub fn format_nav(nav: Option<f64>) -> String {
    match nav {
        Some(v) => format!("₹{}", format_with_commas(v)),
        None => "—".to_string(),
    }
}

fn new_table(width: u16) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(width);
    table
}

fn header(names: &[&str]) -> Vec<Cell> {
    names
        .iter()
        .map(|h| Cell::new(h).add_attribute(Attribute::Bold))
        .collect()
}

fn change_cells(change: Option<ChangeMetric>) -> [Cell; 2] {
    match change {
        Some(c) => {
            let color = if c.is_positive { TColor::Green } else { TColor::Red };
            [
                Cell::new(c.absolute_text()).set_alignment(CellAlignment::Right).fg(color),
                Cell::new(c.percent_text()).set_alignment(CellAlignment::Right).fg(color),
            ]
        }
        None => [
            Cell::new("—").set_alignment(CellAlignment::Right),
            Cell::new("—").set_alignment(CellAlignment::Right),
        ],
    }
}

pub fn listing_table(schemes: &[&SchemeListing]) -> Table {
    let mut table = new_table(120);
    table.set_header(header(&["Code", "Scheme"]));
    for scheme in schemes {
        table.add_row(vec![
            Cell::new(scheme.scheme_code).set_alignment(CellAlignment::Right),
            Cell::new(&scheme.scheme_name),
        ]);
    }
    table
}

/// Newest-first NAV rows of a window with day-over-day change, at most
/// `limit` rows.
pub fn history_table(window: &WindowView, limit: usize) -> Table {
    let mut table = new_table(80);
    table.set_header(header(&["Date", "NAV", "Change", "%"]));
    for (record, change) in window.records.iter().zip(&window.row_changes).take(limit) {
        let [abs, pct] = change_cells(*change);
        table.add_row(vec![
            Cell::new(record.label()),
            Cell::new(format_nav(record.nav)).set_alignment(CellAlignment::Right),
            abs,
            pct,
        ]);
    }
    table
}

pub fn yearly_table(view: &SchemeView) -> Table {
    let mut table = new_table(80);
    table.set_header(header(&["Year", "NAV", "As of", "Days", "YoY", "YoY %"]));
    for (row, change) in view.yearly().iter().zip(view.yearly_changes()) {
        let [abs, pct] = change_cells(*change);
        table.add_row(vec![
            Cell::new(row.year),
            Cell::new(format_nav(row.nav)).set_alignment(CellAlignment::Right),
            Cell::new(row.source_date.format(crate::nav::DATE_FORMAT)),
            Cell::new(row.count_in_year).set_alignment(CellAlignment::Right),
            abs,
            pct,
        ]);
    }
    table
}

/// `[1M] [3M] (6M) ...`: brackets mark available windows, the selected one
/// is bold, unavailable ones are dimmed in parentheses.
pub fn availability_strip(view: &SchemeView, selected: TimeWindow) -> String {
    let availability = view.availability();
    TimeWindow::all()
        .iter()
        .map(|&w| {
            if !availability.is_available(w) {
                format!("({w})").dimmed().to_string()
            } else if w == selected {
                format!("[{w}]").bold().to_string()
            } else {
                format!("[{w}]")
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn print_listing(schemes: &[&SchemeListing], total: usize) {
    if schemes.is_empty() {
        println!("No schemes found");
        return;
    }
    println!("{}", listing_table(schemes));
    println!("Showing {} of {} scheme(s)", schemes.len(), total);
}

pub fn print_scheme(view: &SchemeView, window: TimeWindow, recent_rows: usize) {
    let meta = &view.history().meta;
    println!("{}", meta.scheme_name.bold());
    println!("{} | {} | {}", meta.fund_house, meta.scheme_type, meta.scheme_category);
    let history = view.history();
    if let (Some(latest), Some(oldest)) = (history.latest(), history.oldest()) {
        println!("Latest NAV: {} ({})", format_nav(latest.nav), latest.label());
        println!(
            "History: {} to {}, {} record(s)",
            oldest.label(),
            latest.label(),
            history.records.len()
        );
    }
    if history.skipped > 0 {
        println!("{}", format!("Skipped {} row(s) without a valid date", history.skipped).dimmed());
    }
    println!("{}", availability_strip(view, window));
    println!();

    let current = view.window(window);
    println!("{}", current.caption);
    if current.is_empty() {
        println!("No data for this period");
    } else {
        if let Some(change) = current.change {
            let text = format!("{} ({})", change.absolute_text(), change.percent_text());
            let text = if change.is_positive { text.green() } else { text.red() };
            println!("Change: {text}");
        }
        println!("{}", history_table(current, recent_rows));
    }

    println!();
    print_yearly(view);
}

pub fn print_yearly(view: &SchemeView) {
    println!("Yearly summary (total years: {})", view.yearly().len());
    if view.yearly().is_empty() {
        println!("No yearly summary available.");
    } else {
        println!("{}", yearly_table(view));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nav::{parse_nav_date, NavRecord, SchemeHistory, SchemeMeta};
    use chrono::NaiveDate;

    fn view() -> SchemeView {
        let records = [("14-06-2024", "1,100.50"), ("13-06-2024", "1,000"), ("29-12-2023", "x")]
            .iter()
            .map(|(d, n)| NavRecord::new(parse_nav_date(d).unwrap(), n))
            .collect();
        SchemeView::new(
            SchemeHistory::new(SchemeMeta::default(), records),
            NaiveDate::from_ymd_opt(2024, 6, 15).unwrap(),
        )
    }

    #[test]
    fn test_format_with_commas() {
        assert_eq!(format_with_commas(0.0), "0.00");
        assert_eq!(format_with_commas(999.999), "1,000.00");
        assert_eq!(format_with_commas(1234567.891), "1,234,567.89");
        assert_eq!(format_with_commas(-1234.5), "-1,234.50");
    }

    #[test]
    fn test_format_nav() {
        assert_eq!(format_nav(Some(1234.5)), "₹1,234.50");
        assert_eq!(format_nav(None), "—");
    }

    #[test]
    fn test_history_table() {
        let view = view();
        let rendered = history_table(view.window(TimeWindow::OneMonth), 10).to_string();
        assert!(rendered.contains("14-06-2024"));
        assert!(rendered.contains("₹1,100.50"));
        assert!(rendered.contains("+100.50"));
        assert!(rendered.contains("+10.05%"));
        assert!(!rendered.contains("29-12-2023"));
    }

    #[test]
    fn test_history_table_respects_limit() {
        let view = view();
        let rendered = history_table(view.window(TimeWindow::MaxPeriod), 1).to_string();
        assert!(rendered.contains("14-06-2024"));
        assert!(!rendered.contains("13-06-2024"));
    }

    #[test]
    fn test_yearly_table() {
        let view = view();
        let rendered = yearly_table(&view).to_string();
        assert!(rendered.contains("2024"));
        assert!(rendered.contains("2023"));
        assert!(rendered.contains("₹1,100.50"));
    }

    #[test]
    fn test_listing_table() {
        let schemes = [SchemeListing {
            scheme_code: 119551,
            scheme_name: "Test Fund".to_string(),
        }];
        let refs: Vec<&SchemeListing> = schemes.iter().collect();
        let rendered = listing_table(&refs).to_string();
        assert!(rendered.contains("119551"));
        assert!(rendered.contains("Test Fund"));
    }

    #[test]
    fn test_availability_strip_marks_unavailable() {
        colored::control::set_override(false);
        let strip = availability_strip(&view(), TimeWindow::OneMonth);
        assert_eq!(strip, "[1M] [3M] [6M] [1Y] [2Y] [5Y] [MAX]");

        let stale = SchemeView::new(
            SchemeHistory::new(
                SchemeMeta::default(),
                vec![NavRecord::new(parse_nav_date("01-01-2010").unwrap(), "10")],
            ),
            NaiveDate::from_ymd_opt(2024, 6, 15).unwrap(),
        );
        let strip = availability_strip(&stale, TimeWindow::MaxPeriod);
        assert_eq!(strip, "(1M) (3M) (6M) (1Y) (2Y) (5Y) [MAX]");
    }
}
