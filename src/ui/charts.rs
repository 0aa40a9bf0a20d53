use chrono::DateTime;
use ratatui::{
    layout::{Alignment, Rect},
    style::{Modifier, Style},
    symbols,
    text::{Line, Span},
    widgets::{Axis, Block, Chart, Dataset, GraphType, Paragraph},
    Frame,
};

use crate::app::feeds::{ChartFeed, OrderFlowFeed};
use crate::data::Bar;
use crate::profile::VolumeProfile;
use crate::sync::{SyncStatus, Timeframe};
use crate::theme::ResolvedTheme;

use super::components::{compact, muted_style, rgb};

pub fn status_label(status: &SyncStatus) -> String {
    match status {
        SyncStatus::Init | SyncStatus::Loading => "Loading...".to_string(),
        SyncStatus::Ready => "Ready".to_string(),
        SyncStatus::Live => "Live".to_string(),
        SyncStatus::Error(e) => format!("Error: {e}"),
    }
}

fn placeholder(f: &mut Frame, block: Block<'static>, message: String, style: Style, area: Rect) {
    let message = Paragraph::new(message).style(style).alignment(Alignment::Center).block(block);
    f.render_widget(message, area);
}

fn time_label(time: i64, timeframe: Timeframe) -> String {
    let format = match timeframe {
        Timeframe::D1 | Timeframe::W1 => "%Y-%m-%d",
        _ => "%m/%d %H:%M",
    };
    DateTime::from_timestamp(time, 0)
        .map(|t| t.format(format).to_string())
        .unwrap_or_default()
}

/// Low/high across the series with a little headroom.
fn price_bounds(bars: &[Bar]) -> (f64, f64) {
    let low = bars.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
    let high = bars.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
    let pad = ((high - low) * 0.05).max(0.01);
    (low - pad, high + pad)
}

pub fn render_price_chart(
    f: &mut Frame,
    feed: &ChartFeed,
    timeframe: Timeframe,
    block: Block<'static>,
    theme: &ResolvedTheme,
    area: Rect,
) {
    let status = feed.status();
    let bars = &feed.series;
    if bars.len() < 2 {
        let style = match status {
            SyncStatus::Error(_) => Style::default().fg(rgb(theme.bear)),
            _ => muted_style(theme),
        };
        placeholder(f, block, status_label(&status), style, area);
        return;
    }

    // x is the bar index so sessions without trading leave no gaps
    let closes: Vec<(f64, f64)> = bars.iter().enumerate().map(|(i, b)| (i as f64, b.close)).collect();
    let points = |bullish: bool| -> Vec<(f64, f64)> {
        bars.iter()
            .enumerate()
            .filter(|(_, b)| b.is_bullish() == bullish)
            .map(|(i, b)| (i as f64, b.close))
            .collect()
    };
    let (ups, downs) = (points(true), points(false));

    let first = &bars[0];
    let last = &bars[bars.len() - 1];
    let trend = if last.close >= first.open { theme.bull } else { theme.bear };
    let change = if first.open > 0.0 { (last.close - first.open) / first.open * 100.0 } else { 0.0 };
    let (y_min, y_max) = price_bounds(bars);

    let datasets = vec![
        Dataset::default()
            .name("Close")
            .marker(symbols::Marker::Braille)
            .style(Style::default().fg(rgb(trend)))
            .graph_type(GraphType::Line)
            .data(&closes),
        Dataset::default()
            .marker(symbols::Marker::Dot)
            .style(Style::default().fg(rgb(theme.bull)))
            .graph_type(GraphType::Scatter)
            .data(&ups),
        Dataset::default()
            .marker(symbols::Marker::Dot)
            .style(Style::default().fg(rgb(theme.bear)))
            .graph_type(GraphType::Scatter)
            .data(&downs),
    ];

    let block = block.title_bottom(Line::from(vec![
        Span::styled(format!(" {:.2} ", last.close), Style::default().fg(rgb(trend)).add_modifier(Modifier::BOLD)),
        Span::styled(format!("{change:+.2}% "), Style::default().fg(rgb(trend))),
        Span::styled(format!("{} ", status_label(&status)), muted_style(theme)),
    ]));

    let chart = Chart::new(datasets)
        .block(block)
        .x_axis(
            Axis::default()
                .style(muted_style(theme))
                .bounds([0.0, (bars.len() - 1) as f64])
                .labels(vec![
                    Span::from(time_label(first.time, timeframe)),
                    Span::from(time_label(last.time, timeframe)),
                ]),
        )
        .y_axis(
            Axis::default()
                .style(muted_style(theme))
                .bounds([y_min, y_max])
                .labels(vec![
                    Span::from(format!("{y_min:.2}")),
                    Span::from(format!("{:.2}", (y_min + y_max) / 2.0)),
                    Span::from(format!("{y_max:.2}")),
                ]),
        );
    f.render_widget(chart, area);
}

/// Buckets to show when the profile is taller than the panel: a window
/// centred on the point of control.
fn visible_range(profile: &VolumeProfile, rows: usize) -> std::ops::Range<usize> {
    let len = profile.buckets.len();
    if rows == 0 || len <= rows {
        return 0..len;
    }
    let center = profile.poc.unwrap_or(len / 2);
    let start = center.saturating_sub(rows / 2).min(len - rows);
    start..start + rows
}

pub fn render_order_flow(f: &mut Frame, feed: &OrderFlowFeed, block: Block<'static>, theme: &ResolvedTheme, area: Rect) {
    let status = feed.status();
    let profile = &feed.profile;
    if profile.is_empty() {
        let message = match status {
            SyncStatus::Ready | SyncStatus::Live => "No price range to profile".to_string(),
            other => status_label(&other),
        };
        placeholder(f, block, message, muted_style(theme), area);
        return;
    }

    let last_price = feed.last_price();
    // bucket nearest the last trade
    let last_bucket = last_price.and_then(|price| {
        profile
            .buckets
            .iter()
            .enumerate()
            .min_by(|a, b| (a.1.price - price).abs().total_cmp(&(b.1.price - price).abs()))
            .map(|(i, _)| i)
    });

    let inner = block.inner(area);
    let label_width = 10usize;
    let bar_width = (inner.width as usize).saturating_sub(label_width + 2).max(1);
    let max_total = profile.max_total().max(f64::MIN_POSITIVE);

    let lines: Vec<Line> = visible_range(profile, inner.height as usize)
        .map(|i| {
            let bucket = &profile.buckets[i];
            let filled = ((bucket.total() / max_total) * bar_width as f64).round() as usize;
            let buy = ((filled as f64) * bucket.buy_ratio()).round() as usize;
            let sell = filled.saturating_sub(buy);
            let is_poc = profile.poc == Some(i);
            let marker = match (is_poc, last_bucket == Some(i)) {
                (_, true) => "●",
                (true, false) => "◆",
                _ => " ",
            };
            let mut label = Style::default().fg(rgb(theme.muted_text));
            if is_poc {
                label = Style::default().fg(rgb(theme.text)).add_modifier(Modifier::BOLD);
            }
            Line::from(vec![
                Span::styled(format!("{:>9.2}", bucket.price), label),
                Span::raw(marker),
                Span::styled("█".repeat(buy), Style::default().fg(rgb(theme.bull))),
                Span::styled("█".repeat(sell), Style::default().fg(rgb(theme.bear))),
            ])
        })
        .collect();

    let mut footer = vec![Span::styled(
        format!(" Vol {} | {} bars ", compact(profile.total_volume()), feed.bar_count),
        muted_style(theme),
    )];
    if let Some(poc) = profile.poc_bucket() {
        footer.push(Span::styled(format!("POC {:.2} ", poc.price), Style::default().fg(rgb(theme.text))));
    }
    if let Some(price) = last_price {
        footer.push(Span::styled(format!("Last {price:.2} "), Style::default().fg(rgb(theme.bull))));
    }

    let paragraph = Paragraph::new(lines).block(block.title_bottom(Line::from(footer)));
    f.render_widget(paragraph, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::ProfileBucket;

    fn profile(len: usize, poc: usize) -> VolumeProfile {
        let bucket = ProfileBucket { price: 1.0, buy_volume: 1.0, sell_volume: 0.0 };
        VolumeProfile { buckets: vec![bucket; len], poc: Some(poc) }
    }

    #[test]
    fn window_centres_on_poc() {
        assert_eq!(visible_range(&profile(40, 20), 10), 15..25);
        assert_eq!(visible_range(&profile(40, 2), 10), 0..10);
        assert_eq!(visible_range(&profile(40, 39), 10), 30..40);
        assert_eq!(visible_range(&profile(8, 3), 10), 0..8);
    }

    #[test]
    fn bounds_pad_the_range() {
        let bars = vec![Bar::new(0, 10.0, 12.0, 9.0, 11.0, 1.0), Bar::new(60, 11.0, 13.0, 10.0, 12.0, 1.0)];
        let (lo, hi) = price_bounds(&bars);
        assert!(lo < 9.0 && hi > 13.0);
    }
}
