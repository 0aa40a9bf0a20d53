use chrono::Utc;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};

use crate::app::{App, InputMode, MarketStatus, market_status};
use crate::layout::{self as grid, LayoutPlan, MobileLayout};
use crate::theme::ResolvedTheme;
use crate::widget::WidgetKind;
use crate::workspace::Tab;

use super::components::{centered_rect, muted_style, panel_block, render_tab_bar, rgb, text_style};
use super::panels::render_panel;

pub fn render_ui(f: &mut Frame, app: &mut App) {
    let area = f.area();
    app.set_viewport(area.width, area.height);
    let app: &App = app;
    let theme = app.theme.resolved();

    f.render_widget(Block::default().style(text_style(theme)), area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Top bar
            Constraint::Length(3), // Tab bar
            Constraint::Min(0),    // Widget grid
            Constraint::Length(1), // Key help
        ])
        .split(area);

    render_top_bar(f, app, chunks[0]);
    render_tab_bar(f, app, chunks[1]);

    if let Some(tab) = app.active_tab() {
        match grid::compute(tab, app.viewport, &app.metrics) {
            LayoutPlan::Desktop { cells, .. } => {
                for cell in cells {
                    let Some(widget) = tab.widget(&cell.widget_id) else { continue };
                    let rect = Rect::new(
                        chunks[2].x.saturating_add(cell.left as u16),
                        chunks[2].y.saturating_add(cell.top as u16),
                        cell.width as u16,
                        cell.height as u16,
                    )
                    .intersection(chunks[2]);
                    if rect.width > 1 && rect.height > 1 {
                        render_panel(f, app, widget, rect);
                    }
                }
            }
            LayoutPlan::Mobile(strips) => render_mobile(f, app, tab, &strips, chunks[2]),
        }
        if tab.widgets.is_empty() {
            let hint = Paragraph::new("Empty tab. Press a to add a widget.")
                .style(muted_style(theme))
                .alignment(Alignment::Center);
            f.render_widget(hint, centered_rect(60, 20, chunks[2]));
        }
    }

    render_footer(f, app, chunks[3]);

    match &app.mode {
        InputMode::Catalogue { selected } => render_catalogue(f, *selected, theme, area),
        InputMode::Prompt { kind, buffer } => render_prompt(f, kind.title(), buffer, theme, area),
        InputMode::Normal => {}
    }

    // Error overlay
    if let Some(ref error) = app.error_message {
        let area = centered_rect(60, 20, area);
        f.render_widget(Clear, area);
        let error_block = Paragraph::new(error.as_str())
            .style(Style::default().fg(rgb(theme.bear)))
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true })
            .block(Block::default().borders(Borders::ALL).title("Error"));
        f.render_widget(error_block, area);
    }

    // Status message overlay
    if let Some(ref status) = app.status_message {
        let area = centered_rect(50, 15, area);
        f.render_widget(Clear, area);
        let status_block = Paragraph::new(status.as_str())
            .style(Style::default().fg(rgb(theme.bull)))
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true })
            .block(Block::default().borders(Borders::ALL).title("Status"));
        f.render_widget(status_block, area);
    }
}

fn render_top_bar(f: &mut Frame, app: &App, area: Rect) {
    let theme = app.theme.resolved();
    let status = market_status(Utc::now());
    let status_color = match status {
        MarketStatus::Open => theme.bull,
        MarketStatus::Closed => theme.bear,
    };
    let mut spans = vec![
        Span::styled("CrystalBall", Style::default().fg(rgb(theme.text)).add_modifier(Modifier::BOLD)),
        Span::raw("  "),
        Span::styled(format!("● {}", status.label()), Style::default().fg(rgb(status_color))),
    ];
    if let Some(tab) = app.active_tab() {
        if !tab.global_symbols.is_empty() {
            spans.push(Span::styled(
                format!("  Tab symbols: {}", tab.global_symbols.join(", ")),
                Style::default().fg(rgb(theme.text)),
            ));
        }
    }
    spans.push(Span::styled(
        format!("  Theme: {}  {}", app.theme.theme().mode, Utc::now().format("%H:%M:%S UTC")),
        muted_style(theme),
    ));

    let header = Paragraph::new(Line::from(spans))
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(rgb(theme.grid))));
    f.render_widget(header, area);
}

/// Narrow terminals: primary panels on top, the rest below, one card per strip.
fn render_mobile(f: &mut Frame, app: &App, tab: &Tab, strips: &MobileLayout, area: Rect) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(strips.strip_height as u16), Constraint::Min(0)])
        .split(area);

    for (index, (ids, rect)) in [(&strips.primary, rows[0]), (&strips.secondary, rows[1])].into_iter().enumerate() {
        if ids.is_empty() || rect.height < 3 {
            continue;
        }
        let cursor = app.strip_cursor[index].min(ids.len() - 1);
        let Some(widget) = tab.widget(&ids[cursor]) else { continue };

        let parts = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(0), Constraint::Length(1)])
            .split(rect);
        render_panel(f, app, widget, parts[0]);

        let indicator = Paragraph::new(format!("◀ {}/{} ▶", cursor + 1, ids.len()))
            .style(muted_style(app.theme.resolved()))
            .alignment(Alignment::Center);
        f.render_widget(indicator, parts[1]);
    }
}

fn render_footer(f: &mut Frame, app: &App, area: Rect) {
    let help = match app.mode {
        InputMode::Normal => {
            "q: Quit | [/]: Tabs | n/x/r: New/Close/Rename tab | a: Add | d: Remove | Tab: Focus | \
             ←↑↓→: Move | Shift+←↑↓→: Resize | s: Symbol | g: Tab symbols | f: Timeframe | t: Theme | R: Refresh"
        }
        InputMode::Catalogue { .. } => "↑↓: Navigate | Enter: Add widget | Esc: Close",
        InputMode::Prompt { .. } => "Enter: Confirm | Esc: Cancel",
    };
    let footer = Paragraph::new(help)
        .style(muted_style(app.theme.resolved()))
        .alignment(Alignment::Center);
    f.render_widget(footer, area);
}

fn render_catalogue(f: &mut Frame, selected: usize, theme: &ResolvedTheme, area: Rect) {
    let area = centered_rect(60, 60, area);
    f.render_widget(Clear, area);

    let items: Vec<ListItem> = WidgetKind::all()
        .into_iter()
        .map(|kind| {
            ListItem::new(Line::from(vec![
                Span::styled(format!("{kind:<24}"), Style::default().fg(rgb(theme.text))),
                Span::styled(kind.description(), muted_style(theme)),
            ]))
        })
        .collect();

    let list = List::new(items)
        .block(panel_block(" Add widget ".into(), true, theme))
        .highlight_style(Style::default().bg(rgb(theme.grid)).add_modifier(Modifier::BOLD))
        .highlight_symbol("> ");
    let mut state = ListState::default().with_selected(Some(selected));
    f.render_stateful_widget(list, area, &mut state);
}

fn render_prompt(f: &mut Frame, title: &str, buffer: &str, theme: &ResolvedTheme, area: Rect) {
    let area = centered_rect(60, 20, area);
    f.render_widget(Clear, area);
    let prompt = Paragraph::new(format!("{buffer}_"))
        .style(Style::default().fg(rgb(theme.text)))
        .wrap(Wrap { trim: false })
        .block(panel_block(format!(" {title} "), true, theme));
    f.render_widget(prompt, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::HttpMarketApi;
    use crate::workspace::{MemoryStorage, WorkspaceStore};
    use ratatui::{backend::TestBackend, Terminal};
    use std::sync::Arc;

    fn app() -> App {
        let store = WorkspaceStore::load(Box::new(MemoryStorage::new()));
        App::new(store, Arc::new(HttpMarketApi::new("http://127.0.0.1:9").unwrap()), "SPY")
    }

    fn draw(app: &mut App, width: u16, height: u16) -> String {
        let mut terminal = Terminal::new(TestBackend::new(width, height)).unwrap();
        terminal.draw(|f| render_ui(f, app)).unwrap();
        terminal.backend().buffer().content().iter().map(|c| c.symbol()).collect()
    }

    #[tokio::test]
    async fn desktop_frame_shows_chrome_and_panels() {
        let mut app = app();
        app.reconcile_feeds();
        let screen = draw(&mut app, 180, 60);
        assert!(screen.contains("CrystalBall"));
        assert!(screen.contains("Main"));
        assert!(screen.contains("Chart SPY"));
        assert_eq!(app.viewport.width, 180);
        assert!(!app.is_mobile());
    }

    #[tokio::test]
    async fn narrow_frame_switches_to_strips() {
        let mut app = app();
        let screen = draw(&mut app, 80, 40);
        assert!(app.is_mobile());
        assert!(screen.contains("1/"));
    }

    #[tokio::test]
    async fn overlays_render_over_the_grid() {
        let mut app = app();
        app.mode = InputMode::Catalogue { selected: 2 };
        let screen = draw(&mut app, 160, 50);
        assert!(screen.contains("Add widget"));
        assert!(screen.contains("Open Interest"));
    }
}
