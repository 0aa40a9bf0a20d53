use std::collections::HashSet;

use crystalball::config::STORAGE_KEY;
use crystalball::widget::SYMBOL_KEY;
use crystalball::workspace::{MemoryStorage, WorkspaceStore, load_workspace};
use crystalball::{WidgetConfig, WidgetKind, resolve_default, resolve_symbol};

fn store() -> WorkspaceStore {
    WorkspaceStore::load(Box::new(MemoryStorage::new()))
}

fn layout_matches_widgets(store: &WorkspaceStore) {
    for tab in &store.workspace().tabs {
        assert_eq!(tab.layout.len(), tab.widgets.len(), "tab {}", tab.name);
        let widget_ids: HashSet<&str> = tab.widgets.iter().map(|w| w.id.as_str()).collect();
        let entry_ids: HashSet<&str> = tab.layout.iter().map(|e| e.widget_id.as_str()).collect();
        assert_eq!(widget_ids, entry_ids);
    }
}

#[test]
fn layout_tracks_widgets_through_add_and_remove() {
    let mut store = store();
    let tab_id = store.workspace().active_tab_id.clone();

    let mut added = Vec::new();
    for kind in WidgetKind::all() {
        added.push(store.add_widget(&tab_id, kind, None).unwrap());
        layout_matches_widgets(&store);
    }
    for id in added.iter().step_by(2) {
        assert!(store.remove_widget(&tab_id, id));
        layout_matches_widgets(&store);
    }
    // removing twice is a no-op
    assert!(!store.remove_widget(&tab_id, &added[0]));

    let second = store.add_tab(Some("Flow".into()));
    store.add_widget(&second, WidgetKind::OrderFlow, None);
    store.add_widget(&second, WidgetKind::News, None);
    layout_matches_widgets(&store);

    // new widgets land below everything already placed
    let tab = store.workspace().tab(&second).unwrap();
    assert_eq!(tab.layout[0].y, 0);
    assert_eq!(tab.layout[1].y, tab.layout[0].bottom());
}

#[test]
fn the_last_tab_cannot_be_removed() {
    let mut store = store();
    let only = store.workspace().active_tab_id.clone();
    assert!(!store.remove_tab(&only));
    assert_eq!(store.workspace().tabs.len(), 1);

    let other = store.add_tab(None);
    assert!(store.remove_tab(&only));
    assert_eq!(store.workspace().tabs.len(), 1);
    assert_eq!(store.workspace().active_tab_id, other);
    assert!(!store.remove_tab(&other));
}

fn tab_with_three_charts(symbols: &[&str]) -> (WorkspaceStore, String, Vec<String>) {
    let mut store = store();
    let tab_id = store.add_tab(Some("Overrides".into()));
    let ids = ["AAPL", "MSFT", "NVDA"]
        .iter()
        .map(|symbol| {
            let mut config = WidgetConfig::new();
            config.insert(SYMBOL_KEY.into(), (*symbol).into());
            store.add_widget(&tab_id, WidgetKind::Chart, Some(config)).unwrap()
        })
        .collect();
    store.set_global_symbols(&tab_id, symbols.iter().map(|s| s.to_string()).collect());
    (store, tab_id, ids)
}

#[test]
fn single_override_applies_to_every_symbol_aware_widget() {
    let (store, tab_id, ids) = tab_with_three_charts(&["qqq"]);
    for id in &ids {
        assert_eq!(resolve_default(store.workspace(), &tab_id, id), "QQQ");
    }
}

#[test]
fn short_override_list_wraps_to_the_first_symbol() {
    let (store, tab_id, ids) = tab_with_three_charts(&["SPY", "QQQ"]);
    let resolved: Vec<String> = ids.iter().map(|id| resolve_default(store.workspace(), &tab_id, id)).collect();
    assert_eq!(resolved, vec!["SPY", "QQQ", "SPY"]);
}

#[test]
fn resolution_is_upper_case_and_stable() {
    let mut store = store();
    let tab_id = store.workspace().active_tab_id.clone();
    let mut config = WidgetConfig::new();
    config.insert(SYMBOL_KEY.into(), " tsla ".into());
    let id = store.add_widget(&tab_id, WidgetKind::GammaExposure, Some(config)).unwrap();

    let first = resolve_symbol(store.workspace(), &tab_id, &id, "spy");
    let second = resolve_symbol(store.workspace(), &tab_id, &id, "spy");
    assert_eq!(first, "TSLA");
    assert_eq!(first, second);

    // unknown widget falls back
    assert_eq!(resolve_symbol(store.workspace(), &tab_id, "missing", "spy"), "SPY");
}

#[test]
fn snapshot_without_global_symbols_migrates_to_empty_list() {
    let snapshot = r#"{
        "tabs": [{
            "id": "tab-1",
            "name": "Scalping",
            "widgets": [
                {"id": "c1", "type": "chart", "config": {"symbol": "IWM", "timeframe": "1m"}},
                {"id": "g1", "type": "gex", "config": {"symbol": "SPX"}}
            ],
            "layout": [
                {"i": "c1", "x": 0, "y": 0, "w": 8, "h": 10},
                {"i": "g1", "x": 8, "y": 0, "w": 4, "h": 10}
            ]
        }],
        "activeTabId": "tab-1"
    }"#;
    let storage = MemoryStorage::with_entry(STORAGE_KEY, snapshot);
    let workspace = load_workspace(&storage);

    assert_eq!(workspace.tabs.len(), 1);
    let tab = &workspace.tabs[0];
    assert_eq!(tab.name, "Scalping");
    assert!(tab.global_symbols.is_empty());
    assert_eq!(tab.widgets.len(), 2);
    assert_eq!(tab.widgets[1].kind, WidgetKind::GammaExposure);
    let chart = tab.entry("c1").unwrap();
    assert_eq!((chart.x, chart.y, chart.w, chart.h), (0, 0, 8, 10));
    let gex = tab.entry("g1").unwrap();
    assert_eq!((gex.x, gex.w), (8, 4));
    assert_eq!(workspace.active_tab_id, "tab-1");
}
