//! Type definitions for the workspace state

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::theme::Theme;
use crate::widget::{WidgetConfig, WidgetKind};

/// Position of one widget in the 12-column grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridEntry {
    #[serde(alias = "i")]
    pub widget_id: String,
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl GridEntry {
    pub fn new(widget_id: impl Into<String>, x: u32, y: u32, w: u32, h: u32) -> Self {
        Self { widget_id: widget_id.into(), x, y, w, h }
    }

    pub fn bottom(&self) -> u32 {
        self.y.saturating_add(self.h)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WidgetInstance {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: WidgetKind,
    #[serde(default)]
    pub config: WidgetConfig,
}

impl WidgetInstance {
    pub fn config_value(&self, key: &str) -> Option<&str> {
        self.config.get(key).map(String::as_str).filter(|v| !v.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tab {
    pub id: String,
    pub name: String,
    pub layout: Vec<GridEntry>,
    pub widgets: Vec<WidgetInstance>,
    #[serde(default)]
    pub global_symbols: Vec<String>,
}

impl Tab {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            layout: Vec::new(),
            widgets: Vec::new(),
            global_symbols: Vec::new(),
        }
    }

    pub fn widget(&self, widget_id: &str) -> Option<&WidgetInstance> {
        self.widgets.iter().find(|w| w.id == widget_id)
    }

    pub fn widget_mut(&mut self, widget_id: &str) -> Option<&mut WidgetInstance> {
        self.widgets.iter_mut().find(|w| w.id == widget_id)
    }

    pub fn entry(&self, widget_id: &str) -> Option<&GridEntry> {
        self.layout.iter().find(|e| e.widget_id == widget_id)
    }
}

/// The whole persisted arrangement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    pub tabs: Vec<Tab>,
    pub active_tab_id: String,
    pub theme: Theme,
}

impl Workspace {
    pub fn tab(&self, tab_id: &str) -> Option<&Tab> {
        self.tabs.iter().find(|t| t.id == tab_id)
    }

    pub fn tab_mut(&mut self, tab_id: &str) -> Option<&mut Tab> {
        self.tabs.iter_mut().find(|t| t.id == tab_id)
    }

    pub fn active_tab(&self) -> Option<&Tab> {
        self.tab(&self.active_tab_id)
    }

    pub fn contains_widget(&self, widget_id: &str) -> bool {
        self.tabs.iter().any(|t| t.widget(widget_id).is_some())
    }
}

static ID_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Workspace-unique identifier: wall-clock millis plus a process-local sequence.
pub fn next_id(prefix: &str) -> String {
    let seq = ID_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}-{:x}-{seq}", chrono::Utc::now().timestamp_millis())
}

/// Trims, upper-cases and drops empty symbols, keeping order.
pub fn normalize_symbols<I, S>(symbols: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    symbols
        .into_iter()
        .map(|s| s.as_ref().trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique() {
        let a = next_id("w");
        let b = next_id("w");
        assert_ne!(a, b);
        assert!(a.starts_with("w-"));
    }

    #[test]
    fn normalizes_symbol_lists() {
        assert_eq!(normalize_symbols([" spy", "", "  ", "qqq "]), vec!["SPY", "QQQ"]);
    }

    #[test]
    fn grid_entry_reads_legacy_key() {
        let entry: GridEntry = serde_json::from_str(r#"{"i": "a", "x": 0, "y": 2, "w": 3, "h": 4}"#).unwrap();
        assert_eq!(entry.widget_id, "a");
        assert_eq!(entry.bottom(), 6);
    }
}
