use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, Tabs},
    Frame,
};

use crate::app::App;
use crate::theme::{ResolvedTheme, Rgb};

pub fn rgb(color: Rgb) -> Color {
    Color::Rgb(color.0, color.1, color.2)
}

pub fn text_style(theme: &ResolvedTheme) -> Style {
    Style::default().fg(rgb(theme.text)).bg(rgb(theme.background))
}

pub fn muted_style(theme: &ResolvedTheme) -> Style {
    Style::default().fg(rgb(theme.muted_text))
}

/// Bordered panel; the focused one gets the bull accent.
pub fn panel_block(title: String, focused: bool, theme: &ResolvedTheme) -> Block<'static> {
    let border = if focused {
        Style::default().fg(rgb(theme.bull)).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(rgb(theme.grid))
    };
    Block::default()
        .borders(Borders::ALL)
        .border_style(border)
        .title(title)
        .style(Style::default().fg(rgb(theme.text)).bg(rgb(theme.surface)))
}

pub fn render_tab_bar(f: &mut Frame, app: &App, area: Rect) {
    let theme = app.theme.resolved();
    let workspace = app.store.workspace();
    let titles: Vec<String> = workspace
        .tabs
        .iter()
        .map(|tab| {
            if tab.global_symbols.is_empty() {
                tab.name.clone()
            } else {
                format!("{} [{}]", tab.name, tab.global_symbols.join(","))
            }
        })
        .collect();
    let selected = workspace
        .tabs
        .iter()
        .position(|t| t.id == workspace.active_tab_id)
        .unwrap_or(0);

    let tabs = Tabs::new(titles)
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(rgb(theme.grid))))
        .style(text_style(theme))
        .highlight_style(Style::default().fg(rgb(theme.bull)).add_modifier(Modifier::BOLD))
        .select(selected)
        .divider("|");

    f.render_widget(tabs, area);
}

pub fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

/// Compact volume/price formatting for narrow panels.
pub fn compact(value: f64) -> String {
    let abs = value.abs();
    if abs >= 1e9 {
        format!("{:.2}B", value / 1e9)
    } else if abs >= 1e6 {
        format!("{:.2}M", value / 1e6)
    } else if abs >= 1e3 {
        format!("{:.1}K", value / 1e3)
    } else {
        format!("{value:.0}")
    }
}
