use anyhow::Result;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    prelude::*,
    text::Line,
    widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, Wrap},
};
use reqwest::Client;
use std::io;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info};

use crate::analysis;
use crate::chart;
use crate::dashboard::{DATA_HEADERS, Dashboard, PanelLine, data_row};
use crate::period::Period;
use crate::signals::Signal;
use crate::storage_utils::{DefaultsConfig, MarketDataConfig};

const MAX_TICKER_LEN: usize = 15;
const TABLE_PAGE: usize = 10;
const CHART_PAN: usize = 20;

const OVERVIEW: &str = "\
Type a ticker in the sidebar and press Enter to load it.
Three columns summarise Returns, Momentum and Trend Strength.
Pick a timeframe and toggle the raw data table and the chart.

RSI     Relative Strength Index
EMA20 / EMA200  Exponential Moving Average (20/200 periods)
LTP     Last Traded Price
ADX     Average Directional Index, strength of a trend
DMP     Directional Movement Plus, strength of upward movement
DMN     Directional Movement Minus, strength of downward movement
ATR     Average True Range, daily volatility

Trade in the direction of the trend when ADX signals a strong
trend, and use DMP and DMN to confirm the direction.";

// --- App State ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Focus {
    Ticker,
    Period,
    ShowData,
    ShowChart,
}

impl Focus {
    const ORDER: [Focus; 4] = [Focus::Ticker, Focus::Period, Focus::ShowData, Focus::ShowChart];

    fn step(self, forward: bool) -> Self {
        let i = Self::ORDER.iter().position(|f| *f == self).unwrap_or(0);
        let n = Self::ORDER.len();
        Self::ORDER[if forward { (i + 1) % n } else { (i + n - 1) % n }]
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Action {
    Continue,
    Fetch,
    Quit,
}

struct App {
    ticker_input: String,
    period: Period,
    show_data: bool,
    show_chart: bool,
    show_help: bool,
    focus: Focus,
    dashboard: Option<Dashboard>,
    error: Option<String>,
    is_fetching: bool,
    fetching_label: String,
    table_scroll: usize,
    chart_offset: usize,
}

impl App {
    fn new(defaults: &DefaultsConfig) -> Self {
        Self {
            ticker_input: defaults.ticker.clone(),
            period: defaults.period,
            show_data: defaults.show_data,
            show_chart: defaults.show_chart,
            show_help: false,
            focus: Focus::Ticker,
            dashboard: None,
            error: None,
            is_fetching: false,
            fetching_label: String::new(),
            table_scroll: 0,
            chart_offset: 0,
        }
    }

    fn set_result(&mut self, result: Result<Dashboard>) {
        self.is_fetching = false;
        match result {
            Ok(dashboard) => {
                self.dashboard = Some(dashboard);
                self.error = None;
                self.table_scroll = 0;
                self.chart_offset = 0;
            }
            Err(e) => {
                // A failed request blanks the panels rather than showing a stale ticker.
                self.dashboard = None;
                self.error = Some(e.to_string());
            }
        }
    }

    fn scroll_table(&mut self, down: bool) {
        let rows = self.dashboard.as_ref().map_or(0, |d| d.series.len());
        self.table_scroll = if down {
            (self.table_scroll + TABLE_PAGE).min(rows.saturating_sub(1))
        } else {
            self.table_scroll.saturating_sub(TABLE_PAGE)
        };
    }

    fn pan_chart(&mut self, back: bool) {
        let rows = self.dashboard.as_ref().map_or(0, |d| d.series.len());
        self.chart_offset = if back {
            (self.chart_offset + CHART_PAN).min(rows)
        } else {
            self.chart_offset.saturating_sub(CHART_PAN)
        };
    }
}

// --- TUI ---

pub async fn run_tui(client: Client, market: MarketDataConfig, defaults: DefaultsConfig) -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, client, market, defaults).await;

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    res
}

fn spawn_fetch(app: &mut App, client: &Client, market: &MarketDataConfig, tx: &mpsc::Sender<Result<Dashboard>>) {
    if app.is_fetching {
        return;
    }
    app.is_fetching = true;
    let ticker = app.ticker_input.clone();
    let period = app.period;
    app.fetching_label = format!("{ticker} ({period})");
    let client = client.clone();
    let market = market.clone();
    let tx = tx.clone();
    tokio::spawn(async move {
        let result = analysis::run_analysis_pipeline(&client, &market, &ticker, period).await;
        if let Err(e) = &result {
            error!(%ticker, %period, error = %e, "analysis failed");
        }
        let _ = tx.send(result).await;
    });
}

async fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    client: Client,
    market: MarketDataConfig,
    defaults: DefaultsConfig,
) -> Result<()> {
    let (data_tx, mut data_rx) = mpsc::channel::<Result<Dashboard>>(1);
    let mut app = App::new(&defaults);

    // Load the default ticker straight away.
    spawn_fetch(&mut app, &client, &market, &data_tx);

    loop {
        terminal.draw(|f| ui(f, &app))?;

        if let Ok(result) = data_rx.try_recv() {
            app.set_result(result);
        }

        if event::poll(Duration::from_millis(50))? {
            match event::read()? {
                Event::Key(key) if key.kind != KeyEventKind::Release => match handle_key_event(key, &mut app) {
                    Action::Quit => {
                        info!("quit requested");
                        return Ok(());
                    }
                    Action::Fetch => spawn_fetch(&mut app, &client, &market, &data_tx),
                    Action::Continue => {}
                },
                // The next draw picks up the new size.
                Event::Resize(_, _) => {}
                _ => {}
            }
        }
    }
}

fn handle_key_event(key: KeyEvent, app: &mut App) -> Action {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return Action::Quit;
    }

    match key.code {
        KeyCode::Esc => return Action::Quit,
        KeyCode::Enter | KeyCode::F(5) if !app.is_fetching => return Action::Fetch,
        KeyCode::F(1) => app.show_help = !app.show_help,
        KeyCode::Tab => app.focus = app.focus.step(true),
        KeyCode::BackTab => app.focus = app.focus.step(false),
        KeyCode::PageDown => app.scroll_table(true),
        KeyCode::PageUp => app.scroll_table(false),
        // The ticker being fetched stays on screen until its result arrives.
        KeyCode::Backspace | KeyCode::Char(_) if app.focus == Focus::Ticker && app.is_fetching => {}
        KeyCode::Backspace if app.focus == Focus::Ticker => {
            app.ticker_input.pop();
        }
        KeyCode::Char(c) if app.focus == Focus::Ticker => {
            if !c.is_control() && app.ticker_input.chars().count() < MAX_TICKER_LEN {
                app.ticker_input.push(c.to_ascii_uppercase());
            }
        }
        KeyCode::Char('q') => return Action::Quit,
        KeyCode::Char('?') => app.show_help = !app.show_help,
        KeyCode::Char('d') => app.show_data = !app.show_data,
        KeyCode::Char('c') => app.show_chart = !app.show_chart,
        KeyCode::Char('[') => app.pan_chart(true),
        KeyCode::Char(']') => app.pan_chart(false),
        KeyCode::Char(' ') => match app.focus {
            Focus::ShowData => app.show_data = !app.show_data,
            Focus::ShowChart => app.show_chart = !app.show_chart,
            _ => {}
        },
        KeyCode::Left | KeyCode::Up if app.focus == Focus::Period => app.period = app.period.prev(),
        KeyCode::Right | KeyCode::Down if app.focus == Focus::Period => app.period = app.period.next(),
        _ => {}
    }
    Action::Continue
}

// --- Rendering ---

fn focus_style(app: &App, focus: Focus) -> Style {
    if app.focus == focus {
        Style::default().fg(Color::Yellow).bg(Color::DarkGray)
    } else {
        Style::default()
    }
}

fn checkbox(label: &str, on: bool) -> String {
    format!("[{}] {}", if on { "x" } else { " " }, label)
}

fn ui(f: &mut Frame, app: &App) {
    let main_layout = Layout::horizontal([Constraint::Percentage(22), Constraint::Percentage(78)])
        .split(f.size());

    render_sidebar(f, app, main_layout[0]);

    let has_table = app.show_data && app.dashboard.is_some();
    let has_chart = app.show_chart && app.dashboard.is_some();
    let mut constraints = vec![Constraint::Length(3), Constraint::Length(7), Constraint::Length(1)];
    if has_table && has_chart {
        constraints.extend([Constraint::Percentage(40), Constraint::Percentage(60)]);
    } else {
        constraints.push(Constraint::Min(0));
    }
    let chunks = Layout::vertical(constraints).split(main_layout[1]);

    f.render_widget(
        Paragraph::new(Line::from(vec![
            Span::raw("Stock "),
            Span::styled("Technical", Style::default().fg(Color::Green)),
            Span::raw(" "),
            Span::styled("Analysis", Style::default().fg(Color::Red)),
            Span::raw(" Dashboard"),
        ]))
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL)),
        chunks[0],
    );

    render_panels(f, app, chunks[1]);
    render_status(f, app, chunks[2]);

    if let Some(dashboard) = &app.dashboard {
        let mut next = 3;
        if has_table {
            render_data_table(f, app, dashboard, chunks[next]);
            next += 1;
        }
        if has_chart {
            chart::render(f, chunks[next], dashboard, app.chart_offset);
        }
    }

    if app.show_help {
        let area = centered_rect(70, 70, main_layout[1]);
        f.render_widget(Clear, area);
        f.render_widget(
            Paragraph::new(OVERVIEW)
                .wrap(Wrap { trim: false })
                .block(Block::default().title("Overview (F1 closes)").borders(Borders::ALL)),
            area,
        );
    }

    if app.is_fetching {
        let area = centered_rect(40, 20, main_layout[1]);
        f.render_widget(Clear, area);
        f.render_widget(
            Paragraph::new(format!("Fetching {}...\nPlease wait.", app.fetching_label))
                .block(Block::default().title("Loading").borders(Borders::ALL))
                .alignment(Alignment::Center),
            area,
        );
    }
}

fn render_sidebar(f: &mut Frame, app: &App, area: Rect) {
    let sidebar_block = Block::default()
        .borders(Borders::ALL)
        .title("Controls")
        .title_alignment(Alignment::Center);
    let inner = sidebar_block.inner(area);
    f.render_widget(sidebar_block, area);

    let sidebar_chunks = Layout::vertical([Constraint::Min(1), Constraint::Length(4)]).split(inner);

    let cursor = if app.focus == Focus::Ticker { "_" } else { "" };
    let lines = vec![
        Line::from("Stock Symbol e.g. AAPL"),
        Line::from(format!("> {}{}", app.ticker_input, cursor)).style(focus_style(app, Focus::Ticker)),
        Line::from(""),
        Line::from("Timeframe?"),
        Line::from(format!("< {} >", app.period)).style(focus_style(app, Focus::Period)),
        Line::from(""),
        Line::from(checkbox("Show Data", app.show_data)).style(focus_style(app, Focus::ShowData)),
        Line::from(checkbox("Show Chart", app.show_chart)).style(focus_style(app, Focus::ShowChart)),
    ];
    f.render_widget(Paragraph::new(lines), sidebar_chunks[0]);

    f.render_widget(
        Paragraph::new("Enter/F5 load  Tab focus\nSpace toggle  F1 help\nPgUp/PgDn rows  [ ] pan\nEsc quit")
            .style(Style::default().fg(Color::DarkGray)),
        sidebar_chunks[1],
    );
}

fn signal_style(signal: Option<Signal>) -> Style {
    match signal {
        Some(Signal::Positive) => Style::default().fg(Color::Green),
        Some(Signal::Negative) => Style::default().fg(Color::Red),
        None => Style::default(),
    }
}

fn panel_lines(lines: &[PanelLine]) -> Vec<Line<'static>> {
    lines
        .iter()
        .map(|l| Line::from(format!("- {}", l.text())).style(signal_style(l.signal)))
        .collect()
}

fn render_panels(f: &mut Frame, app: &App, area: Rect) {
    let columns = Layout::horizontal([
        Constraint::Ratio(1, 3),
        Constraint::Ratio(1, 3),
        Constraint::Ratio(1, 3),
    ])
    .split(area);

    let (returns, momentum, trend): (Vec<Line>, Vec<Line>, Vec<Line>) = match &app.dashboard {
        Some(d) => (
            d.returns_lines()
                .into_iter()
                .map(|l| Line::from(format!("- {}", l)))
                .collect(),
            panel_lines(&d.momentum_lines()),
            panel_lines(&d.trend_lines()),
        ),
        None => (Vec::new(), Vec::new(), Vec::new()),
    };

    for ((title, lines), area) in [("Returns", returns), ("Momentum", momentum), ("Trend Strength", trend)]
        .into_iter()
        .zip(columns.iter())
    {
        f.render_widget(
            Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title(title)),
            *area,
        );
    }
}

fn render_status(f: &mut Frame, app: &App, area: Rect) {
    let status = if let Some(err) = &app.error {
        Line::from(format!("✖ {}", err)).style(Style::default().fg(Color::Red))
    } else if let Some(d) = &app.dashboard {
        match d.warning() {
            Some(w) => Line::from(format!("⚠ {}", w)).style(Style::default().fg(Color::Yellow)),
            None => Line::from(format!(
                "{} ({}) · {} rows · last close {}",
                d.ticker,
                d.period,
                d.series.len(),
                d.snapshot.date
            ))
            .style(Style::default().fg(Color::DarkGray)),
        }
    } else {
        Line::from("")
    };
    f.render_widget(Paragraph::new(status), area);
}

fn render_data_table(f: &mut Frame, app: &App, dashboard: &Dashboard, area: Rect) {
    let header = Row::new(DATA_HEADERS.iter().map(|h| Cell::from(*h)))
        .style(Style::default().bg(Color::DarkGray));

    let visible = area.height.saturating_sub(3) as usize;
    let rows = dashboard
        .rows_latest_first()
        .skip(app.table_scroll)
        .take(visible)
        .map(|row| Row::new(data_row(row).into_iter().map(Cell::from)).height(1));

    let mut widths = vec![Constraint::Length(10)];
    widths.extend(std::iter::repeat_n(Constraint::Length(9), DATA_HEADERS.len() - 1));

    f.render_widget(
        Table::new(rows, widths).header(header).block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!(
                    "Data ({}-{} of {})",
                    (app.table_scroll + 1).min(dashboard.series.len()),
                    (app.table_scroll + visible).min(dashboard.series.len()),
                    dashboard.series.len()
                )),
        ),
        area,
    );
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::vertical([
        Constraint::Percentage((100 - percent_y) / 2),
        Constraint::Percentage(percent_y),
        Constraint::Percentage((100 - percent_y) / 2),
    ])
    .split(r);
    Layout::horizontal([
        Constraint::Percentage((100 - percent_x) / 2),
        Constraint::Percentage(percent_x),
        Constraint::Percentage((100 - percent_x) / 2),
    ])
    .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::PriceRow;

    fn app() -> App {
        App::new(&DefaultsConfig::default())
    }

    fn press(app: &mut App, code: KeyCode) -> Action {
        handle_key_event(KeyEvent::new(code, KeyModifiers::NONE), app)
    }

    fn loaded(len: usize) -> Dashboard {
        let rows = (0..len)
            .map(|i| PriceRow {
                date: format!("d{i}"),
                open: 1.0,
                high: 2.0,
                low: 0.5,
                close: 1.5,
                volume: 0.0,
            })
            .collect();
        Dashboard::build("AAPL", Period::OneYear, rows).unwrap()
    }

    #[test]
    fn typing_edits_the_ticker() {
        let mut app = app();
        app.ticker_input.clear();
        for c in "msft".chars() {
            assert_eq!(press(&mut app, KeyCode::Char(c)), Action::Continue);
        }
        assert_eq!(app.ticker_input, "MSFT");
        press(&mut app, KeyCode::Backspace);
        assert_eq!(app.ticker_input, "MSF");
    }

    #[test]
    fn q_is_text_while_typing_and_quits_elsewhere() {
        let mut app = app();
        assert_eq!(press(&mut app, KeyCode::Char('q')), Action::Continue);
        assert!(app.ticker_input.ends_with('Q'));
        press(&mut app, KeyCode::Tab);
        assert_eq!(press(&mut app, KeyCode::Char('q')), Action::Quit);
    }

    #[test]
    fn ticker_is_locked_while_fetching() {
        let mut app = app();
        app.is_fetching = true;
        let before = app.ticker_input.clone();
        assert_eq!(press(&mut app, KeyCode::Char('x')), Action::Continue);
        assert_eq!(press(&mut app, KeyCode::Char('q')), Action::Continue);
        press(&mut app, KeyCode::Backspace);
        assert_eq!(app.ticker_input, before);

        app.set_result(Ok(loaded(3)));
        press(&mut app, KeyCode::Char('x'));
        assert!(app.ticker_input.ends_with('X'));
    }

    #[test]
    fn ticker_input_is_bounded() {
        let mut app = app();
        for _ in 0..40 {
            press(&mut app, KeyCode::Char('A'));
        }
        assert_eq!(app.ticker_input.len(), MAX_TICKER_LEN);
    }

    #[test]
    fn period_selector_cycles_when_focused() {
        let mut app = app();
        press(&mut app, KeyCode::Right);
        assert_eq!(app.period, Period::OneYear);

        press(&mut app, KeyCode::Tab);
        press(&mut app, KeyCode::Right);
        assert_eq!(app.period, Period::TwoYears);
        press(&mut app, KeyCode::Up);
        press(&mut app, KeyCode::Up);
        assert_eq!(app.period, Period::SixMonths);
    }

    #[test]
    fn space_toggles_the_focused_checkbox() {
        let mut app = app();
        press(&mut app, KeyCode::Tab);
        press(&mut app, KeyCode::Tab);
        press(&mut app, KeyCode::Char(' '));
        assert!(app.show_data);
        assert!(!app.show_chart);
        press(&mut app, KeyCode::BackTab);
        press(&mut app, KeyCode::BackTab);
        press(&mut app, KeyCode::BackTab);
        assert_eq!(app.focus, Focus::ShowChart);
        press(&mut app, KeyCode::Char(' '));
        assert!(app.show_chart);
    }

    #[test]
    fn enter_fetches_unless_busy() {
        let mut app = app();
        assert_eq!(press(&mut app, KeyCode::Enter), Action::Fetch);
        app.is_fetching = true;
        assert_eq!(press(&mut app, KeyCode::Enter), Action::Continue);
        assert_eq!(press(&mut app, KeyCode::F(5)), Action::Continue);
    }

    #[test]
    fn ctrl_c_and_esc_quit() {
        let mut app = app();
        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(handle_key_event(ctrl_c, &mut app), Action::Quit);
        assert_eq!(press(&mut app, KeyCode::Esc), Action::Quit);
    }

    #[test]
    fn results_replace_state() {
        let mut app = app();
        app.is_fetching = true;
        app.set_result(Ok(loaded(30)));
        assert!(!app.is_fetching);
        assert!(app.dashboard.is_some());

        app.set_result(Err(crate::error::DashboardError::NoData.into()));
        assert!(app.dashboard.is_none());
        assert_eq!(
            app.error.as_deref(),
            Some("No data available for the selected stock and timeframe.")
        );
    }

    #[test]
    fn scrolling_and_panning_are_clamped() {
        let mut app = app();
        app.set_result(Ok(loaded(25)));
        press(&mut app, KeyCode::PageDown);
        press(&mut app, KeyCode::PageDown);
        press(&mut app, KeyCode::PageDown);
        assert_eq!(app.table_scroll, 24);
        press(&mut app, KeyCode::PageUp);
        assert_eq!(app.table_scroll, 14);

        press(&mut app, KeyCode::Tab);
        press(&mut app, KeyCode::Char('['));
        press(&mut app, KeyCode::Char('['));
        assert_eq!(app.chart_offset, 25);
        press(&mut app, KeyCode::Char(']'));
        assert_eq!(app.chart_offset, 5);
    }
}
