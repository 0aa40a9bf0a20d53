//! Workspace mutations as values plus the pure function that applies them

use cli_log::*;

use crate::config::GRID_COLUMNS;
use crate::layout;
use crate::theme::ThemePatch;
use crate::widget::{SYMBOL_KEY, WidgetConfig, WidgetKind};

use super::types::{GridEntry, Tab, WidgetInstance, Workspace, normalize_symbols};

#[derive(Debug, Clone, PartialEq)]
pub enum WorkspaceAction {
    AddTab { tab_id: String, name: Option<String> },
    RemoveTab { tab_id: String },
    RenameTab { tab_id: String, name: String },
    SetActiveTab { tab_id: String },
    AddWidget { tab_id: String, widget_id: String, kind: WidgetKind, config: Option<WidgetConfig> },
    RemoveWidget { tab_id: String, widget_id: String },
    UpdateWidgetConfig { tab_id: String, widget_id: String, patch: WidgetConfig },
    UpdateLayout { tab_id: String, layout: Vec<GridEntry> },
    SetGlobalSymbols { tab_id: String, symbols: Vec<String> },
    SetTheme(ThemePatch),
}

/// Applies one action. Never fails: actions that reference unknown ids or
/// would break an invariant leave the workspace untouched. Returns whether
/// anything changed.
pub fn apply(workspace: &mut Workspace, action: WorkspaceAction) -> bool {
    match action {
        WorkspaceAction::AddTab { tab_id, name } => add_tab(workspace, tab_id, name),
        WorkspaceAction::RemoveTab { tab_id } => remove_tab(workspace, &tab_id),
        WorkspaceAction::RenameTab { tab_id, name } => rename_tab(workspace, &tab_id, &name),
        WorkspaceAction::SetActiveTab { tab_id } => set_active_tab(workspace, tab_id),
        WorkspaceAction::AddWidget { tab_id, widget_id, kind, config } => {
            add_widget(workspace, &tab_id, widget_id, kind, config)
        }
        WorkspaceAction::RemoveWidget { tab_id, widget_id } => remove_widget(workspace, &tab_id, &widget_id),
        WorkspaceAction::UpdateWidgetConfig { tab_id, widget_id, patch } => {
            update_widget_config(workspace, &tab_id, &widget_id, patch)
        }
        WorkspaceAction::UpdateLayout { tab_id, layout } => update_layout(workspace, &tab_id, &layout),
        WorkspaceAction::SetGlobalSymbols { tab_id, symbols } => set_global_symbols(workspace, &tab_id, symbols),
        WorkspaceAction::SetTheme(patch) => workspace.theme.merge(patch),
    }
}

fn add_tab(workspace: &mut Workspace, tab_id: String, name: Option<String>) -> bool {
    if workspace.tab(&tab_id).is_some() {
        return false;
    }
    let name = name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| format!("Tab {}", workspace.tabs.len() + 1));
    debug!("Adding tab '{name}' ({tab_id})");
    workspace.tabs.push(Tab::new(tab_id.clone(), name));
    workspace.active_tab_id = tab_id;
    true
}

fn remove_tab(workspace: &mut Workspace, tab_id: &str) -> bool {
    if workspace.tabs.len() <= 1 {
        return false;
    }
    let Some(index) = workspace.tabs.iter().position(|t| t.id == tab_id) else {
        return false;
    };
    workspace.tabs.remove(index);
    if workspace.active_tab_id == tab_id {
        // neighbour to the left, or the new first tab
        let next = index.saturating_sub(1).min(workspace.tabs.len() - 1);
        workspace.active_tab_id = workspace.tabs[next].id.clone();
    }
    debug!("Removed tab {tab_id}, active is now {}", workspace.active_tab_id);
    true
}

fn rename_tab(workspace: &mut Workspace, tab_id: &str, name: &str) -> bool {
    let name = name.trim();
    if name.is_empty() {
        return false;
    }
    match workspace.tab_mut(tab_id) {
        Some(tab) if tab.name != name => {
            tab.name = name.to_string();
            true
        }
        _ => false,
    }
}

fn set_active_tab(workspace: &mut Workspace, tab_id: String) -> bool {
    if workspace.active_tab_id == tab_id || workspace.tab(&tab_id).is_none() {
        return false;
    }
    workspace.active_tab_id = tab_id;
    true
}

fn add_widget(
    workspace: &mut Workspace,
    tab_id: &str,
    widget_id: String,
    kind: WidgetKind,
    config: Option<WidgetConfig>,
) -> bool {
    if workspace.contains_widget(&widget_id) {
        return false;
    }
    let Some(tab) = workspace.tab_mut(tab_id) else {
        return false;
    };
    let mut merged = kind.default_config();
    if let Some(config) = config {
        merge_config(&mut merged, config);
    }
    let entry = layout::place_new(&widget_id, kind, &tab.layout);
    debug!("Adding {kind} widget {widget_id} to tab {tab_id} at row {}", entry.y);
    tab.widgets.push(WidgetInstance { id: widget_id, kind, config: merged });
    tab.layout.push(entry);
    true
}

fn remove_widget(workspace: &mut Workspace, tab_id: &str, widget_id: &str) -> bool {
    let Some(tab) = workspace.tab_mut(tab_id) else {
        return false;
    };
    let before = tab.widgets.len();
    tab.widgets.retain(|w| w.id != widget_id);
    tab.layout.retain(|e| e.widget_id != widget_id);
    before != tab.widgets.len()
}

fn update_widget_config(workspace: &mut Workspace, tab_id: &str, widget_id: &str, patch: WidgetConfig) -> bool {
    let Some(widget) = workspace.tab_mut(tab_id).and_then(|t| t.widget_mut(widget_id)) else {
        return false;
    };
    let before = widget.config.clone();
    merge_config(&mut widget.config, patch);
    widget.config != before
}

fn update_layout(workspace: &mut Workspace, tab_id: &str, incoming: &[GridEntry]) -> bool {
    let Some(tab) = workspace.tab_mut(tab_id) else {
        return false;
    };
    let next = layout::reconcile(incoming, &tab.widgets, &tab.layout, GRID_COLUMNS);
    if next == tab.layout {
        return false;
    }
    tab.layout = next;
    true
}

fn set_global_symbols(workspace: &mut Workspace, tab_id: &str, symbols: Vec<String>) -> bool {
    let Some(tab) = workspace.tab_mut(tab_id) else {
        return false;
    };
    let symbols = normalize_symbols(symbols);
    if tab.global_symbols == symbols {
        return false;
    }
    tab.global_symbols = symbols;
    true
}

/// Overlays `patch`; symbols are stored upper case and an empty symbol clears the key.
fn merge_config(config: &mut WidgetConfig, patch: WidgetConfig) {
    for (key, value) in patch {
        if key == SYMBOL_KEY {
            let symbol = value.trim().to_uppercase();
            if symbol.is_empty() {
                config.remove(&key);
            } else {
                config.insert(key, symbol);
            }
        } else {
            config.insert(key, value);
        }
    }
}
