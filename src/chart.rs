//! Candlestick chart with EMA20 / EMA200 overlays, drawn on a ratatui canvas.

use crate::dashboard::Dashboard;
use crate::indicators::AnalyzedRow;
use ratatui::{
    prelude::*,
    symbols::Marker,
    widgets::{
        Block, Borders, Paragraph,
        block::{Position, Title},
        canvas::{Canvas, Context, Line as CanvasLine},
    },
};
use std::ops::Range;

const UP_COLOR: Color = Color::Green;
const DOWN_COLOR: Color = Color::Red;
const EMA_FAST_COLOR: Color = Color::Yellow;
const EMA_SLOW_COLOR: Color = Color::Cyan;

/// Rows shown when `width` candles fit and the view is panned `offset`
/// candles back from the latest one. The offset is clamped.
pub fn visible_window(len: usize, width: usize, offset: usize) -> Range<usize> {
    let count = width.min(len);
    let max_offset = len - count;
    let end = len - offset.min(max_offset);
    end - count..end
}

/// Lowest low and highest high across candles and both EMA lines.
pub fn price_bounds(rows: &[AnalyzedRow]) -> Option<(f64, f64)> {
    let values = rows.iter().flat_map(|r| {
        [
            Some(r.price.low),
            Some(r.price.high),
            r.indicators.ema_20,
            r.indicators.ema_200,
        ]
    });
    let (lo, hi) = values
        .flatten()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if !lo.is_finite() || !hi.is_finite() {
        return None;
    }
    // Leave room so a flat series still has a visible range.
    let pad = ((hi - lo) * 0.05).max(hi.abs() * 0.001).max(0.01);
    Some((lo - pad, hi + pad))
}

fn draw_candles(ctx: &mut Context, rows: &[AnalyzedRow]) {
    for (i, row) in rows.iter().enumerate() {
        let p = &row.price;
        let x = i as f64 + 0.5;
        let color = if p.close >= p.open { UP_COLOR } else { DOWN_COLOR };
        ctx.draw(&CanvasLine {
            x1: x,
            y1: p.low,
            x2: x,
            y2: p.high,
            color,
        });
        for dx in [-0.25, 0.25] {
            ctx.draw(&CanvasLine {
                x1: x + dx,
                y1: p.open,
                x2: x + dx,
                y2: p.close,
                color,
            });
        }
    }
}

fn draw_overlay(ctx: &mut Context, rows: &[AnalyzedRow], value: fn(&AnalyzedRow) -> Option<f64>, color: Color) {
    for (i, pair) in rows.windows(2).enumerate() {
        if let (Some(y1), Some(y2)) = (value(&pair[0]), value(&pair[1])) {
            ctx.draw(&CanvasLine {
                x1: i as f64 + 0.5,
                y1,
                x2: i as f64 + 1.5,
                y2,
                color,
            });
        }
    }
}

/// Renders the chart for `dashboard` into `area`, panned `offset` candles.
pub fn render(f: &mut Frame, area: Rect, dashboard: &Dashboard, offset: usize) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(dashboard.chart_title());
    let inner_width = block.inner(area).width as usize;

    let window = visible_window(dashboard.series.len(), inner_width, offset);
    let rows = &dashboard.series[window.clone()];

    let Some((lo, hi)) = price_bounds(rows) else {
        f.render_widget(Paragraph::new("No candles to draw").block(block), area);
        return;
    };

    let first = rows.first().map_or("", |r| r.price.date.as_str());
    let last = rows.last().map_or("", |r| r.price.date.as_str());
    let legend = Line::from(vec![
        Span::raw(format!(" {first} → {last}  {lo:.2}–{hi:.2}  ")),
        Span::styled("EMA20", Style::default().fg(EMA_FAST_COLOR)),
        Span::raw(" "),
        Span::styled("EMA200", Style::default().fg(EMA_SLOW_COLOR)),
        Span::raw(" "),
    ]);

    let canvas = Canvas::default()
        .block(block.title(Title::from(legend).position(Position::Bottom)))
        .marker(Marker::Braille)
        .x_bounds([0.0, window.len() as f64])
        .y_bounds([lo, hi])
        .paint(|ctx| {
            draw_candles(ctx, rows);
            ctx.layer();
            draw_overlay(ctx, rows, |r| r.indicators.ema_20, EMA_FAST_COLOR);
            draw_overlay(ctx, rows, |r| r.indicators.ema_200, EMA_SLOW_COLOR);
        });
    f.render_widget(canvas, area);
}
