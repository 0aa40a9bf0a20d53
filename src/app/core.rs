//! Core application state and per-frame updates

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use cli_log::*;

use crate::config::{GRID_COLUMNS, UI_UPDATE_RATE_MS};
use crate::layout::{self, GridMetrics, Viewport};
use crate::market::MarketApi;
use crate::resolver::resolve_in_tab;
use crate::sync::Timeframe;
use crate::theme::{ThemeController, ThemePatch, detect_system_scheme};
use crate::widget::{SYMBOL_KEY, TIMEFRAME_KEY, WidgetCategory, WidgetConfig, WidgetKind};
use crate::workspace::{GridEntry, Tab, WidgetInstance, WorkspaceStore};

use super::feeds::{FeedKey, FeedSlot, WidgetFeed};
use super::types::{InputMode, PromptKind};

pub struct App {
    // Workspace and collaborators
    pub store: WorkspaceStore,
    pub api: Arc<dyn MarketApi>,
    pub theme: ThemeController,
    pub fallback_symbol: String,

    // Live data, keyed by widget id (active tab only)
    pub feeds: HashMap<String, FeedSlot>,

    // UI state
    pub focus: Option<String>,
    pub mode: InputMode,
    pub strip_cursor: [usize; 2],
    pub viewport: Viewport,
    pub metrics: GridMetrics,
    pub needs_redraw: bool,
    pub status_message: Option<String>,
    pub error_message: Option<String>,

    // Timing
    pub last_scheme_check: Instant,
    pub scheme_check_interval: Duration,
}

impl App {
    pub fn new(store: WorkspaceStore, api: Arc<dyn MarketApi>, fallback_symbol: &str) -> Self {
        let theme = ThemeController::new(store.workspace().theme.clone(), detect_system_scheme());
        let mut app = Self {
            store,
            api,
            theme,
            fallback_symbol: fallback_symbol.trim().to_uppercase(),
            feeds: HashMap::new(),
            focus: None,
            mode: InputMode::Normal,
            strip_cursor: [0, 0],
            viewport: Viewport::new(0, 0),
            metrics: GridMetrics::terminal(),
            needs_redraw: true,
            status_message: None,
            error_message: None,
            last_scheme_check: Instant::now(),
            scheme_check_interval: Duration::from_millis(UI_UPDATE_RATE_MS),
        };
        app.ensure_focus();
        app
    }

    pub fn active_tab(&self) -> Option<&Tab> {
        self.store.workspace().active_tab()
    }

    pub fn active_tab_id(&self) -> String {
        self.store.workspace().active_tab_id.clone()
    }

    pub fn focused_widget(&self) -> Option<&WidgetInstance> {
        let tab = self.active_tab()?;
        tab.widget(self.focus.as_deref()?)
    }

    /// Effective symbol of a widget in the active tab.
    pub fn symbol_for(&self, widget: &WidgetInstance) -> String {
        match self.active_tab() {
            Some(tab) => resolve_in_tab(tab, widget, &self.fallback_symbol),
            None => self.fallback_symbol.clone(),
        }
    }

    pub fn is_mobile(&self) -> bool {
        layout::is_mobile(self.viewport, &self.metrics)
    }

    /// Keeps focus on an existing widget of the active tab.
    pub fn ensure_focus(&mut self) {
        let Some(tab) = self.active_tab() else {
            self.focus = None;
            return;
        };
        let valid = self.focus.as_deref().is_some_and(|id| tab.widget(id).is_some());
        if !valid {
            self.focus = tab.widgets.first().map(|w| w.id.clone());
        }
        self.sync_strip_cursor();
    }

    pub fn cycle_focus(&mut self, forward: bool) {
        let Some(tab) = self.active_tab() else { return };
        if tab.widgets.is_empty() {
            self.focus = None;
            return;
        }
        let len = tab.widgets.len();
        let current = self
            .focus
            .as_deref()
            .and_then(|id| tab.widgets.iter().position(|w| w.id == id));
        let next = match (current, forward) {
            (Some(i), true) => (i + 1) % len,
            (Some(i), false) => (i + len - 1) % len,
            (None, _) => 0,
        };
        self.focus = Some(tab.widgets[next].id.clone());
        self.sync_strip_cursor();
        self.needs_redraw = true;
    }

    /// Points the strip holding the focused widget at it.
    fn sync_strip_cursor(&mut self) {
        let Some(widget) = self.focused_widget() else { return };
        let category = widget.kind.category();
        let Some(tab) = self.active_tab() else { return };
        let index = tab
            .widgets
            .iter()
            .filter(|w| w.kind.category() == category)
            .position(|w| Some(&w.id) == self.focus.as_ref())
            .unwrap_or(0);
        self.strip_cursor[strip_index(category)] = index;
    }

    pub fn switch_tab(&mut self, forward: bool) {
        let ws = self.store.workspace();
        let len = ws.tabs.len();
        let Some(index) = ws.tabs.iter().position(|t| t.id == ws.active_tab_id) else { return };
        let next = if forward { (index + 1) % len } else { (index + len - 1) % len };
        let target = ws.tabs[next].id.clone();
        if self.store.set_active_tab(&target) {
            self.on_tab_changed();
        }
    }

    pub fn new_tab(&mut self) {
        self.store.add_tab(None);
        self.on_tab_changed();
    }

    pub fn close_active_tab(&mut self) {
        let tab_id = self.active_tab_id();
        if self.store.remove_tab(&tab_id) {
            self.on_tab_changed();
        } else {
            self.status_message = Some("The last tab cannot be closed".into());
            self.needs_redraw = true;
        }
    }

    fn on_tab_changed(&mut self) {
        self.focus = None;
        self.strip_cursor = [0, 0];
        self.ensure_focus();
        self.reconcile_feeds();
        self.needs_redraw = true;
    }

    pub fn add_widget(&mut self, kind: WidgetKind) {
        let tab_id = self.active_tab_id();
        if let Some(id) = self.store.add_widget(&tab_id, kind, None) {
            info!("Added {kind} widget {id}");
            self.focus = Some(id);
            self.sync_strip_cursor();
            self.status_message = Some(format!("Added {kind}"));
        }
        self.needs_redraw = true;
    }

    pub fn remove_focused_widget(&mut self) {
        let Some(widget_id) = self.focus.clone() else { return };
        let tab_id = self.active_tab_id();
        if self.store.remove_widget(&tab_id, &widget_id) {
            self.feeds.remove(&widget_id);
            self.focus = None;
            self.ensure_focus();
        }
        self.needs_redraw = true;
    }

    pub fn set_focused_symbol(&mut self, symbol: &str) {
        let Some(widget_id) = self.focus.clone() else { return };
        let tab_id = self.active_tab_id();
        let mut patch = WidgetConfig::new();
        patch.insert(SYMBOL_KEY.into(), symbol.to_string());
        self.store.update_widget_config(&tab_id, &widget_id, patch);
        if let Some(tab) = self.active_tab() {
            if tab.widget(&widget_id).is_some_and(|w| crate::resolver::is_global_override(tab, w)) {
                self.status_message = Some("Saved, but this tab's symbol override still applies".into());
            }
        }
        self.needs_redraw = true;
    }

    pub fn cycle_focused_timeframe(&mut self) {
        let Some(widget) = self.focused_widget() else { return };
        if widget.kind != WidgetKind::Chart {
            return;
        }
        let next = Timeframe::parse_or_default(widget.config_value(TIMEFRAME_KEY)).next();
        let (tab_id, widget_id) = (self.active_tab_id(), widget.id.clone());
        let mut patch = WidgetConfig::new();
        patch.insert(TIMEFRAME_KEY.into(), next.to_string());
        self.store.update_widget_config(&tab_id, &widget_id, patch);
        self.needs_redraw = true;
    }

    pub fn set_global_symbols(&mut self, input: &str) {
        let tab_id = self.active_tab_id();
        let symbols = input.split([',', ' ']).map(str::to_string).collect();
        self.store.set_global_symbols(&tab_id, symbols);
        self.needs_redraw = true;
    }

    pub fn rename_active_tab(&mut self, name: &str) {
        let tab_id = self.active_tab_id();
        self.store.rename_tab(&tab_id, name);
        self.needs_redraw = true;
    }

    pub fn cycle_theme_mode(&mut self) {
        let next = self.store.workspace().theme.mode.next();
        self.store.set_theme(ThemePatch { mode: Some(next), ..Default::default() });
        self.theme.sync_from(&self.store.workspace().theme);
        self.status_message = Some(format!("Theme: {next}"));
        self.needs_redraw = true;
    }

    /// Moves or resizes the focused widget's grid entry by the given deltas.
    pub fn nudge_focused(&mut self, dx: i32, dy: i32, dw: i32, dh: i32) {
        let Some(widget_id) = self.focus.clone() else { return };
        let Some(tab) = self.active_tab() else { return };
        let tab_id = tab.id.clone();
        let mut layout: Vec<GridEntry> = tab.layout.clone();
        let Some(entry) = layout.iter_mut().find(|e| e.widget_id == widget_id) else { return };
        let shift = |v: u32, d: i32| v.saturating_add_signed(d);
        entry.x = shift(entry.x, dx).min(GRID_COLUMNS.saturating_sub(1));
        entry.y = shift(entry.y, dy);
        entry.w = shift(entry.w, dw).max(1);
        entry.h = shift(entry.h, dh).max(1);
        if self.store.update_layout(&tab_id, layout) {
            self.needs_redraw = true;
        }
    }

    /// Sends the chat prompt to the focused assistant widget.
    pub fn send_chat(&mut self, text: &str) {
        let Some(widget) = self.focused_widget().cloned() else { return };
        let symbol = self.symbol_for(&widget);
        match self.feeds.get_mut(&widget.id).map(|slot| &mut slot.feed) {
            Some(WidgetFeed::Chat(chat)) => {
                if !chat.send(text, &symbol) {
                    self.status_message = Some("Waiting for the previous reply".into());
                }
            }
            _ => self.status_message = Some("Focus an assistant widget to chat".into()),
        }
        self.needs_redraw = true;
    }

    /// Drops the focused widget's feed so the next frame restarts it.
    pub fn refresh_focused(&mut self) {
        if let Some(id) = self.focus.clone() {
            if self.feeds.remove(&id).is_some() {
                info!("Refreshing widget {id}");
            }
        }
        self.reconcile_feeds();
        self.needs_redraw = true;
    }

    /// Starts, restarts and tears down feeds so that exactly the active tab's
    /// widgets have one, each matching its current resolved key.
    pub fn reconcile_feeds(&mut self) {
        let wanted: Vec<(String, FeedKey)> = match self.active_tab() {
            Some(tab) => tab
                .widgets
                .iter()
                .map(|w| (w.id.clone(), FeedKey::for_widget(tab, w, &self.fallback_symbol)))
                .collect(),
            None => Vec::new(),
        };

        self.feeds.retain(|id, slot| {
            let keep = wanted.iter().any(|(wid, key)| wid == id && *key == slot.key);
            if !keep {
                debug!("Tearing down feed for {id}");
            }
            keep
        });

        for (widget_id, key) in wanted {
            if self.feeds.contains_key(&widget_id) {
                continue;
            }
            if let Some(feed) = WidgetFeed::start(&widget_id, &key, &self.api) {
                self.feeds.insert(widget_id, FeedSlot { key, feed });
                self.needs_redraw = true;
            }
        }
    }

    /// Per-frame housekeeping.
    pub fn update(&mut self) {
        self.reconcile_feeds();
        for slot in self.feeds.values_mut() {
            if slot.feed.absorb() {
                self.needs_redraw = true;
            }
        }
        if self.theme.sync_from(&self.store.workspace().theme) {
            self.needs_redraw = true;
        }
        if self.last_scheme_check.elapsed() >= self.scheme_check_interval {
            self.last_scheme_check = Instant::now();
            if self.theme.on_system_scheme_changed(detect_system_scheme()) {
                info!("System color scheme changed");
                self.needs_redraw = true;
            }
        }
    }

    pub fn set_viewport(&mut self, width: u16, height: u16) {
        let viewport = Viewport::new(width as u32, height as u32);
        if viewport != self.viewport {
            self.viewport = viewport;
            self.needs_redraw = true;
        }
    }

    pub fn open_prompt(&mut self, kind: PromptKind) {
        let buffer = match kind {
            PromptKind::RenameTab => self.active_tab().map(|t| t.name.clone()).unwrap_or_default(),
            PromptKind::WidgetSymbol => self
                .focused_widget()
                .and_then(|w| w.config_value(SYMBOL_KEY).map(str::to_string))
                .unwrap_or_default(),
            PromptKind::GlobalSymbols => self.active_tab().map(|t| t.global_symbols.join(",")).unwrap_or_default(),
            PromptKind::ChatMessage => String::new(),
        };
        self.mode = InputMode::Prompt { kind, buffer };
        self.needs_redraw = true;
    }

    pub fn submit_prompt(&mut self, kind: PromptKind, buffer: &str) {
        match kind {
            PromptKind::RenameTab => self.rename_active_tab(buffer),
            PromptKind::WidgetSymbol => self.set_focused_symbol(buffer),
            PromptKind::GlobalSymbols => self.set_global_symbols(buffer),
            PromptKind::ChatMessage => self.send_chat(buffer),
        }
    }
}

/// Slot in `App::strip_cursor` for a mobile strip.
pub fn strip_index(category: WidgetCategory) -> usize {
    match category {
        WidgetCategory::Primary => 0,
        WidgetCategory::Secondary => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::HttpMarketApi;
    use crate::sync::SyncPolicy;
    use crate::workspace::MemoryStorage;

    fn app() -> App {
        let store = WorkspaceStore::load(Box::new(MemoryStorage::new()));
        let api = Arc::new(HttpMarketApi::new("http://127.0.0.1:9").unwrap());
        App::new(store, api, "spy")
    }

    #[tokio::test]
    async fn feeds_follow_the_active_tab() {
        let mut app = app();
        app.reconcile_feeds();
        let widgets = app.active_tab().unwrap().widgets.len();
        assert_eq!(app.feeds.len(), widgets);

        app.new_tab();
        assert!(app.feeds.is_empty());
        assert_eq!(app.focus, None);

        app.add_widget(WidgetKind::News);
        app.reconcile_feeds();
        assert_eq!(app.feeds.len(), 1);

        app.remove_focused_widget();
        assert!(app.feeds.is_empty());
    }

    #[tokio::test]
    async fn override_restarts_symbol_aware_feeds() {
        let mut app = app();
        app.reconcile_feeds();
        let chart_id = app.active_tab().unwrap().widgets[0].id.clone();
        assert_eq!(app.feeds[&chart_id].key.symbol, "SPY");

        app.set_global_symbols("qqq");
        app.reconcile_feeds();
        assert_eq!(app.feeds[&chart_id].key.symbol, "QQQ");
    }

    #[tokio::test]
    async fn timeframe_change_restarts_the_chart_feed() {
        let mut app = app();
        app.reconcile_feeds();
        let chart = app.active_tab().unwrap().widgets[0].clone();
        assert_eq!(chart.kind, WidgetKind::Chart);
        app.focus = Some(chart.id.clone());

        let before_key = app.feeds[&chart.id].key.clone();
        let WidgetFeed::Chart(feed) = &app.feeds[&chart.id].feed else { panic!("chart feed expected") };
        let before_sync = Arc::clone(feed.sync());

        app.cycle_focused_timeframe();
        app.reconcile_feeds();

        let slot = &app.feeds[&chart.id];
        let expected = before_key.timeframe.map(|tf| tf.next());
        assert_eq!(slot.key.timeframe, expected);
        assert_eq!(slot.key.symbol, before_key.symbol);
        let WidgetFeed::Chart(feed) = &slot.feed else { panic!("chart feed expected") };
        assert!(!Arc::ptr_eq(&before_sync, feed.sync()));
        assert_eq!(feed.timeframe_policy(), SyncPolicy::for_timeframe(expected.unwrap()));
        assert!(feed.series.is_empty());
        // the old instance can no longer land results
        assert!(before_sync.load_full().await.is_err());
    }

    #[tokio::test]
    async fn focus_cycles_and_layout_nudges() {
        let mut app = app();
        let first = app.focus.clone().unwrap();
        app.cycle_focus(true);
        app.cycle_focus(false);
        assert_eq!(app.focus.as_deref(), Some(first.as_str()));

        let before = app.active_tab().unwrap().entry(&first).cloned().unwrap();
        app.nudge_focused(0, 2, 0, 1);
        let after = app.active_tab().unwrap().entry(&first).cloned().unwrap();
        assert_eq!(after.y, before.y + 2);
        assert_eq!(after.h, before.h + 1);
    }

    #[tokio::test]
    async fn last_tab_close_is_refused() {
        let mut app = app();
        app.close_active_tab();
        assert_eq!(app.store.workspace().tabs.len(), 1);
        assert!(app.status_message.is_some());
    }
}
