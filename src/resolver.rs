//! Effective symbol per widget, honoring the tab-level override list

use crate::config::DEFAULT_SYMBOL;
use crate::widget::SYMBOL_KEY;
use crate::workspace::{Tab, WidgetInstance, Workspace};

/// Resolves the symbol a widget should display.
///
/// Symbol-aware widgets in a tab with a non-empty override list take the
/// override at their position among the tab's symbol-aware widgets; when the
/// list is shorter than that position they collapse onto the first override.
/// Everything else uses its own configured symbol or `fallback`. The result is
/// always upper case.
pub fn resolve_symbol(workspace: &Workspace, tab_id: &str, widget_id: &str, fallback: &str) -> String {
    let Some(tab) = workspace.tab(tab_id) else {
        return fallback.to_uppercase();
    };
    let Some(widget) = tab.widget(widget_id) else {
        return fallback.to_uppercase();
    };
    resolve_in_tab(tab, widget, fallback)
}

pub fn resolve_in_tab(tab: &Tab, widget: &WidgetInstance, fallback: &str) -> String {
    match override_for(tab, widget) {
        Some(symbol) => symbol.to_uppercase(),
        None => own_symbol(widget, fallback),
    }
}

/// Shorthand with the default fallback.
pub fn resolve_default(workspace: &Workspace, tab_id: &str, widget_id: &str) -> String {
    resolve_symbol(workspace, tab_id, widget_id, DEFAULT_SYMBOL)
}

/// True when the widget's symbol currently comes from the tab override list.
pub fn is_global_override(tab: &Tab, widget: &WidgetInstance) -> bool {
    override_for(tab, widget).is_some()
}

fn override_for<'a>(tab: &'a Tab, widget: &WidgetInstance) -> Option<&'a str> {
    if !widget.kind.is_symbol_aware() {
        return None;
    }
    let first = tab.global_symbols.first()?;
    if tab.global_symbols.len() == 1 {
        return Some(first);
    }
    let index = tab
        .widgets
        .iter()
        .filter(|w| w.kind.is_symbol_aware())
        .position(|w| w.id == widget.id)?;
    Some(tab.global_symbols.get(index).unwrap_or(first))
}

fn own_symbol(widget: &WidgetInstance, fallback: &str) -> String {
    widget
        .config_value(SYMBOL_KEY)
        .map(str::trim)
        .unwrap_or(fallback)
        .to_uppercase()
}
