use cli_log::*;

use crate::theme::ThemePatch;
use crate::widget::{WidgetConfig, WidgetKind};

use super::actions::{WorkspaceAction, apply};
use super::defaults::default_workspace;
use super::persist::{StoragePort, load_workspace, save_workspace};
use super::types::{GridEntry, Workspace, next_id};

/// Owns the workspace and writes a snapshot after every effective change.
pub struct WorkspaceStore {
    state: Workspace,
    storage: Box<dyn StoragePort>,
}

impl WorkspaceStore {
    /// Restores from storage, migrating older snapshots.
    pub fn load(storage: Box<dyn StoragePort>) -> Self {
        let state = load_workspace(storage.as_ref());
        Self { state, storage }
    }

    /// Starts from the default workspace, discarding whatever was stored.
    pub fn fresh(storage: Box<dyn StoragePort>) -> Self {
        let mut store = Self { state: default_workspace(), storage };
        store.persist();
        store
    }

    pub fn workspace(&self) -> &Workspace {
        &self.state
    }

    /// Applies the action; persists only when something changed. Storage
    /// failures are logged and never roll back the in-memory state.
    pub fn dispatch(&mut self, action: WorkspaceAction) -> bool {
        let changed = apply(&mut self.state, action);
        if changed {
            self.persist();
        }
        changed
    }

    fn persist(&mut self) {
        if let Err(e) = save_workspace(self.storage.as_mut(), &self.state) {
            warn!("Failed to persist workspace: {e}");
        }
    }

    /// Returns the id of the new tab, which becomes active.
    pub fn add_tab(&mut self, name: Option<String>) -> String {
        let tab_id = next_id("tab");
        self.dispatch(WorkspaceAction::AddTab { tab_id: tab_id.clone(), name });
        tab_id
    }

    pub fn remove_tab(&mut self, tab_id: &str) -> bool {
        self.dispatch(WorkspaceAction::RemoveTab { tab_id: tab_id.to_string() })
    }

    pub fn rename_tab(&mut self, tab_id: &str, name: &str) -> bool {
        self.dispatch(WorkspaceAction::RenameTab { tab_id: tab_id.to_string(), name: name.to_string() })
    }

    pub fn set_active_tab(&mut self, tab_id: &str) -> bool {
        self.dispatch(WorkspaceAction::SetActiveTab { tab_id: tab_id.to_string() })
    }

    /// Returns the new widget id, or `None` when the tab does not exist.
    pub fn add_widget(&mut self, tab_id: &str, kind: WidgetKind, config: Option<WidgetConfig>) -> Option<String> {
        let widget_id = next_id("w");
        let added = self.dispatch(WorkspaceAction::AddWidget {
            tab_id: tab_id.to_string(),
            widget_id: widget_id.clone(),
            kind,
            config,
        });
        added.then_some(widget_id)
    }

    pub fn remove_widget(&mut self, tab_id: &str, widget_id: &str) -> bool {
        self.dispatch(WorkspaceAction::RemoveWidget { tab_id: tab_id.to_string(), widget_id: widget_id.to_string() })
    }

    pub fn update_widget_config(&mut self, tab_id: &str, widget_id: &str, patch: WidgetConfig) -> bool {
        self.dispatch(WorkspaceAction::UpdateWidgetConfig {
            tab_id: tab_id.to_string(),
            widget_id: widget_id.to_string(),
            patch,
        })
    }

    pub fn update_layout(&mut self, tab_id: &str, layout: Vec<GridEntry>) -> bool {
        self.dispatch(WorkspaceAction::UpdateLayout { tab_id: tab_id.to_string(), layout })
    }

    pub fn set_global_symbols(&mut self, tab_id: &str, symbols: Vec<String>) -> bool {
        self.dispatch(WorkspaceAction::SetGlobalSymbols { tab_id: tab_id.to_string(), symbols })
    }

    pub fn set_theme(&mut self, patch: ThemePatch) -> bool {
        self.dispatch(WorkspaceAction::SetTheme(patch))
    }
}
