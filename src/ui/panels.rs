use chrono::Utc;
use ratatui::{
    layout::{Alignment, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Paragraph, Wrap},
    Frame,
};

use crate::app::feeds::{ChatFeed, FetchFeed};
use crate::app::{App, Fetched, WidgetFeed};
use crate::config::{EXPOSURE_MAX_ROWS, EXPOSURE_SPOT_BAND};
use crate::data::{ChatRole, ExposureKind, ExposureSeries, NewsItem};
use crate::resolver::is_global_override;
use crate::theme::ResolvedTheme;
use crate::widget::{FeedKind, URL_KEY, WidgetKind};
use crate::workspace::WidgetInstance;

use super::charts::{render_order_flow, render_price_chart};
use super::components::{compact, muted_style, panel_block, rgb};

/// Title like `Chart SPY 5m`, with `*` when a tab override supplies the symbol.
fn panel_title(app: &App, widget: &WidgetInstance) -> String {
    let mut title = format!(" {} ", widget.kind);
    if widget.kind.is_symbol_aware() {
        title.push_str(&app.symbol_for(widget));
        if app.active_tab().is_some_and(|tab| is_global_override(tab, widget)) {
            title.push('*');
        }
        title.push(' ');
    }
    if let Some(timeframe) = app.feeds.get(&widget.id).and_then(|slot| slot.key.timeframe) {
        title.push_str(&format!("{timeframe} "));
    }
    title
}

pub fn render_panel(f: &mut Frame, app: &App, widget: &WidgetInstance, area: Rect) {
    let theme = app.theme.resolved();
    let focused = app.focus.as_deref() == Some(widget.id.as_str());
    let block = panel_block(panel_title(app, widget), focused, theme);

    match app.feeds.get(&widget.id).map(|slot| &slot.feed) {
        Some(WidgetFeed::Chart(feed)) => {
            let timeframe = app.feeds.get(&widget.id).and_then(|s| s.key.timeframe).unwrap_or_default();
            render_price_chart(f, feed, timeframe, block, theme, area);
        }
        Some(WidgetFeed::OrderFlow(feed)) => render_order_flow(f, feed, block, theme, area),
        Some(WidgetFeed::Exposure(kind, feed)) => render_exposure(f, *kind, feed, block, theme, area),
        Some(WidgetFeed::News(feed)) => render_news(f, feed, block, theme, area),
        Some(WidgetFeed::Report(feed)) => render_report(f, feed, block, theme, area),
        Some(WidgetFeed::Chat(feed)) => render_chat(f, feed, block, theme, area),
        None => match widget.kind {
            WidgetKind::Embed => render_embed(f, widget, block, theme, area),
            WidgetKind::OpenInterest3d => render_placeholder(
                f,
                block,
                "Strike x expiry surface needs a graphical host".into(),
                theme,
                area,
            ),
            // feed not started yet
            _ if widget.kind.feed() != FeedKind::Static => {
                render_placeholder(f, block, "Loading...".into(), theme, area)
            }
            _ => render_placeholder(f, block, String::new(), theme, area),
        },
    }
}

fn render_placeholder(f: &mut Frame, block: Block<'static>, message: String, theme: &ResolvedTheme, area: Rect) {
    let paragraph = Paragraph::new(message)
        .style(muted_style(theme))
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .block(block);
    f.render_widget(paragraph, area);
}

/// Common handling of the loading and failed states of a fetched value.
fn fetched_or_placeholder<T>(
    f: &mut Frame,
    fetched: Fetched<T>,
    block: &Block<'static>,
    theme: &ResolvedTheme,
    area: Rect,
) -> Option<T> {
    match fetched {
        Fetched::Ready(value) => Some(value),
        Fetched::Loading => {
            render_placeholder(f, block.clone(), "Loading...".into(), theme, area);
            None
        }
        Fetched::Failed(e) => {
            let paragraph = Paragraph::new(format!("Error: {e}"))
                .style(Style::default().fg(rgb(theme.bear)))
                .alignment(Alignment::Center)
                .wrap(Wrap { trim: true })
                .block(block.clone());
            f.render_widget(paragraph, area);
            None
        }
    }
}

fn render_exposure(
    f: &mut Frame,
    kind: ExposureKind,
    feed: &FetchFeed<ExposureSeries>,
    block: Block<'static>,
    theme: &ResolvedTheme,
    area: Rect,
) {
    let Some(series) = fetched_or_placeholder(f, feed.snapshot(), &block, theme, area) else { return };
    let rows = series.near_spot(EXPOSURE_SPOT_BAND, EXPOSURE_MAX_ROWS);
    if rows.is_empty() {
        render_placeholder(f, block, "No strikes near spot".into(), theme, area);
        return;
    }

    let inner = block.inner(area);
    let split = kind == ExposureKind::OpenInterest;
    let label_width = if split { 30 } else { 22 };
    let bar_width = (inner.width as usize).saturating_sub(label_width).max(1);
    let max_abs = rows
        .iter()
        .map(|r| if split { r.call.max(r.put) } else { r.value.abs() })
        .fold(0.0, f64::max)
        .max(f64::MIN_POSITIVE);
    // strikes nearest the anchor first when the panel is short
    let anchor = series.anchor().unwrap_or_default();
    let spot_index = rows
        .iter()
        .enumerate()
        .min_by(|a, b| (a.1.strike - anchor).abs().total_cmp(&(b.1.strike - anchor).abs()))
        .map(|(i, _)| i)
        .unwrap_or(0);
    let height = inner.height as usize;
    let start = if rows.len() > height {
        spot_index.saturating_sub(height / 2).min(rows.len() - height)
    } else {
        0
    };

    let lines: Vec<Line> = rows
        .iter()
        .enumerate()
        .skip(start)
        .take(height.max(1))
        .map(|(i, row)| {
            let color = if row.value >= 0.0 { theme.bull } else { theme.bear };
            let filled = |value: f64, width: usize| ((value.abs() / max_abs) * width as f64).round() as usize;
            let mut strike = muted_style(theme);
            if i == spot_index {
                strike = Style::default().fg(rgb(theme.text)).add_modifier(Modifier::BOLD);
            }
            if split {
                let half = (bar_width / 2).max(1);
                return Line::from(vec![
                    Span::styled(format!("{:>8.1} ", row.strike), strike),
                    Span::styled(format!("C {:>8} ", compact(row.call)), Style::default().fg(rgb(theme.bull))),
                    Span::styled(format!("P {:>8} ", compact(row.put)), Style::default().fg(rgb(theme.bear))),
                    Span::styled(format!("{:<half$}", "▇".repeat(filled(row.call, half))), Style::default().fg(rgb(theme.bull))),
                    Span::styled("▇".repeat(filled(row.put, half)), Style::default().fg(rgb(theme.bear))),
                ]);
            }
            let filled = filled(row.value, bar_width);
            Line::from(vec![
                Span::styled(format!("{:>8.1} ", row.strike), strike),
                Span::styled(format!("{:>10} ", compact(row.value)), Style::default().fg(rgb(color))),
                Span::styled("▇".repeat(filled), Style::default().fg(rgb(color))),
            ])
        })
        .collect();

    let net = ExposureSeries::net(&rows);
    let mut footer = vec![Span::styled(format!(" Net {} ", compact(net)), muted_style(theme))];
    if series.spot > 0.0 {
        footer.push(Span::styled(format!("Spot {:.2} ", series.spot), Style::default().fg(rgb(theme.text))));
    } else if split {
        footer.push(Span::styled(format!("ATM {anchor:.1} "), Style::default().fg(rgb(theme.text))));
    }
    if !split {
        if let Some(flip) = ExposureSeries::flip_strike(&rows) {
            footer.push(Span::styled(format!("Flip {flip:.1} "), muted_style(theme)));
        }
    }
    f.render_widget(Paragraph::new(lines).block(block.title_bottom(Line::from(footer))), area);
}

fn age(item: &NewsItem) -> String {
    let Some(created) = item.created() else { return String::new() };
    let minutes = (Utc::now() - created).num_minutes().max(0);
    match minutes {
        0 => "now".to_string(),
        m if m < 60 => format!("{m}m"),
        m if m < 60 * 24 => format!("{}h", m / 60),
        m => format!("{}d", m / (60 * 24)),
    }
}

fn render_news(f: &mut Frame, feed: &FetchFeed<Vec<NewsItem>>, block: Block<'static>, theme: &ResolvedTheme, area: Rect) {
    let Some(items) = fetched_or_placeholder(f, feed.snapshot(), &block, theme, area) else { return };
    if items.is_empty() {
        render_placeholder(f, block, "No news".into(), theme, area);
        return;
    }
    let lines: Vec<Line> = items
        .iter()
        .flat_map(|item| {
            vec![
                Line::from(Span::styled(item.headline.clone(), Style::default().fg(rgb(theme.text)))),
                Line::from(Span::styled(
                    format!("  {} · {} · {}", item.source, item.symbols.join(","), age(item)),
                    muted_style(theme),
                )),
            ]
        })
        .collect();
    f.render_widget(Paragraph::new(lines).wrap(Wrap { trim: true }).block(block), area);
}

fn render_report(f: &mut Frame, feed: &FetchFeed<String>, block: Block<'static>, theme: &ResolvedTheme, area: Rect) {
    let Some(report) = fetched_or_placeholder(f, feed.snapshot(), &block, theme, area) else { return };
    let lines: Vec<Line> = report
        .lines()
        .map(|line| match line.strip_prefix('#') {
            Some(heading) => Line::from(Span::styled(
                heading.trim_start_matches('#').trim().to_string(),
                Style::default().fg(rgb(theme.bull)).add_modifier(Modifier::BOLD),
            )),
            None => Line::from(Span::styled(line.to_string(), Style::default().fg(rgb(theme.text)))),
        })
        .collect();
    f.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }).block(block), area);
}

fn render_chat(f: &mut Frame, feed: &ChatFeed, block: Block<'static>, theme: &ResolvedTheme, area: Rect) {
    let state = feed.snapshot();
    let mut lines: Vec<Line> = Vec::new();
    for message in &state.messages {
        let (who, color) = match message.role {
            ChatRole::User => ("you", theme.text),
            ChatRole::Assistant => ("ai", theme.bull),
        };
        lines.push(Line::from(vec![
            Span::styled(format!("{who}: "), Style::default().fg(rgb(color)).add_modifier(Modifier::BOLD)),
            Span::styled(message.content.clone(), Style::default().fg(rgb(theme.text))),
        ]));
    }
    if state.pending {
        lines.push(Line::from(Span::styled("ai: thinking...", muted_style(theme))));
    }

    // keep the newest messages in view
    let inner = block.inner(area);
    let scroll = (lines.len() as u16).saturating_sub(inner.height);
    let paragraph = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .scroll((scroll, 0))
        .block(block.title_bottom(Line::from(Span::styled(" m: message ", muted_style(theme)))));
    f.render_widget(paragraph, area);
}

fn render_embed(f: &mut Frame, widget: &WidgetInstance, block: Block<'static>, theme: &ResolvedTheme, area: Rect) {
    let url = widget.config_value(URL_KEY).unwrap_or_default();
    let lines = vec![
        Line::from(Span::styled("Live stream", Style::default().fg(rgb(theme.text)).add_modifier(Modifier::BOLD))),
        Line::from(Span::styled(url.to_string(), Style::default().fg(rgb(theme.bull)))),
        Line::from(Span::styled("Open in a browser to watch", muted_style(theme))),
    ];
    let paragraph = Paragraph::new(lines).alignment(Alignment::Center).wrap(Wrap { trim: true }).block(block);
    f.render_widget(paragraph, area);
}
