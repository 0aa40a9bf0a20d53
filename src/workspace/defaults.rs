//! First-run workspace

use crate::theme::Theme;
use crate::widget::WidgetKind;

use super::types::{GridEntry, Tab, WidgetInstance, Workspace, next_id};

pub const DEFAULT_TAB_NAME: &str = "Main";

/// One tab seeded with the standard desk: chart, volume profile and gamma on
/// top; news, delta exposure and the daily report underneath.
pub fn default_workspace() -> Workspace {
    let placements: [(WidgetKind, u32, u32, u32, u32); 6] = [
        (WidgetKind::Chart, 0, 0, 6, 10),
        (WidgetKind::OrderFlow, 6, 0, 3, 10),
        (WidgetKind::GammaExposure, 9, 0, 3, 10),
        (WidgetKind::News, 0, 10, 4, 8),
        (WidgetKind::DeltaExposure, 4, 10, 4, 8),
        (WidgetKind::Report, 8, 10, 4, 8),
    ];

    let mut tab = Tab::new(next_id("tab"), DEFAULT_TAB_NAME);
    for (kind, x, y, w, h) in placements {
        let id = next_id("w");
        tab.layout.push(GridEntry::new(id.clone(), x, y, w, h));
        tab.widgets.push(WidgetInstance { id, kind, config: kind.default_config() });
    }

    Workspace {
        active_tab_id: tab.id.clone(),
        tabs: vec![tab],
        theme: Theme::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_workspace_is_consistent() {
        let ws = default_workspace();
        assert_eq!(ws.tabs.len(), 1);
        assert!(ws.active_tab().is_some());
        let tab = &ws.tabs[0];
        assert_eq!(tab.widgets.len(), tab.layout.len());
        assert!(tab.widgets.iter().all(|w| tab.entry(&w.id).is_some()));
        assert!(tab.global_symbols.is_empty());
    }
}
