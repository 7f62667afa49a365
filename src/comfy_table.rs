use crate::dashboard::{DATA_HEADERS, Dashboard, PanelLine, data_row};
use crate::signals::Signal;
use comfy_table::{
    Attribute, Cell, CellAlignment, Color, ContentArrangement, Table, modifiers::UTF8_ROUND_CORNERS,
    presets::UTF8_BORDERS_ONLY,
};

fn base_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_BORDERS_ONLY)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn signal_color(signal: Option<Signal>) -> Color {
    match signal {
        Some(Signal::Positive) => Color::Green,
        Some(Signal::Negative) => Color::Red,
        None => Color::Grey,
    }
}

fn panel_cell(line: &PanelLine) -> Cell {
    Cell::new(line.text()).fg(signal_color(line.signal))
}

fn returns_cell(line: &str) -> Cell {
    let color = if line.contains(Signal::Positive.emoji()) {
        Color::Green
    } else if line.contains(Signal::Negative.emoji()) {
        Color::Red
    } else {
        Color::Yellow
    };
    Cell::new(line).fg(color)
}

/// The three panels side by side.
pub fn panels_table(dashboard: &Dashboard) -> Table {
    let mut table = base_table();
    table.set_header(vec![
        Cell::new("Returns").add_attribute(Attribute::Bold),
        Cell::new("Momentum").add_attribute(Attribute::Bold),
        Cell::new("Trend Strength").add_attribute(Attribute::Bold),
    ]);

    let returns: Vec<Cell> = dashboard.returns_lines().iter().map(|l| returns_cell(l)).collect();
    let momentum: Vec<Cell> = dashboard.momentum_lines().iter().map(panel_cell).collect();
    let trend: Vec<Cell> = dashboard.trend_lines().iter().map(panel_cell).collect();

    let height = returns.len().max(momentum.len()).max(trend.len());
    let mut columns = [returns.into_iter(), momentum.into_iter(), trend.into_iter()];
    for _ in 0..height {
        let row: Vec<Cell> = columns
            .iter_mut()
            .map(|col| col.next().unwrap_or_else(|| Cell::new("")))
            .collect();
        table.add_row(row);
    }
    table
}

/// Every row of the series, most recent first.
pub fn data_table(dashboard: &Dashboard) -> Table {
    let mut table = base_table();
    table.set_header(
        DATA_HEADERS
            .iter()
            .map(|h| Cell::new(h).add_attribute(Attribute::Bold))
            .collect::<Vec<_>>(),
    );

    for row in dashboard.rows_latest_first() {
        let cells = data_row(row).into_iter().enumerate().map(|(i, text)| {
            if i == 0 {
                Cell::new(text).fg(Color::DarkGrey)
            } else {
                Cell::new(text).set_alignment(CellAlignment::Right)
            }
        });
        table.add_row(cells.collect::<Vec<_>>());
    }
    table
}

/// Renders the whole report as text.
pub fn render(dashboard: &Dashboard, show_data: bool) -> String {
    let title = format!(
        "{} ({}) as of {}",
        dashboard.ticker, dashboard.period, dashboard.snapshot.date
    );
    let mut out = format!("\n{}\n{}\n", title, panels_table(dashboard));
    if let Some(warning) = dashboard.warning() {
        out.push_str(&format!("\n⚠ {}\n", warning));
    }
    if show_data {
        out.push_str(&format!("\n{}\n", data_table(dashboard)));
    }
    out
}

pub fn run(dashboard: &Dashboard, show_data: bool) {
    println!("{}", render(dashboard, show_data));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::PriceRow;
    use crate::period::Period;

    fn dashboard(len: usize) -> Dashboard {
        let rows = (0..len)
            .map(|i| {
                let c = 50.0 + i as f64;
                PriceRow {
                    date: format!("2024-02-{:02}", i % 28 + 1),
                    open: c,
                    high: c + 1.0,
                    low: c - 1.0,
                    close: c,
                    volume: 10.0,
                }
            })
            .collect();
        Dashboard::build("AAPL", Period::OneMonth, rows).unwrap()
    }

    #[test]
    fn short_series_report_warns_once() {
        let text = render(&dashboard(5), false);
        assert!(text.contains("AAPL (1mo)"));
        assert!(text.contains("LTP : 54.00"));
        assert!(text.contains("EMA20 : N/A"));
        assert_eq!(text.matches("⚠").count(), 1);
        assert!(!text.contains("EMA_200"));
    }

    #[test]
    fn data_table_lists_every_row() {
        let table = data_table(&dashboard(7));
        assert_eq!(table.row_iter().count(), 7);
        let text = table.to_string();
        assert!(text.contains("ATR_14"));
        assert!(text.contains("N/A"));
    }

    #[test]
    fn report_includes_data_table_on_request() {
        let text = render(&dashboard(3), true);
        assert!(text.contains("DMN_14"));
    }
}
