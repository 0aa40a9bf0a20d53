//! Snapshot persistence: storage port, versioned snapshot and migration

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use cli_log::*;

use crate::config::{GRID_COLUMNS, LEGACY_STORAGE_KEYS, MAX_GRID_UNITS, SCHEMA_VERSION, STORAGE_KEY};
use crate::error::{DashboardError, Result};
use crate::layout;
use crate::theme::Theme;
use crate::widget::{WidgetConfig, WidgetKind};

use super::defaults::{DEFAULT_TAB_NAME, default_workspace};
use super::types::{GridEntry, Tab, WidgetInstance, Workspace, next_id, normalize_symbols};

/// Durable key/value storage for serialized snapshots.
pub trait StoragePort: Send {
    fn read(&self, key: &str) -> Result<Option<String>>;
    fn write(&mut self, key: &str, value: &str) -> Result<()>;
    fn remove(&mut self, key: &str) -> Result<()>;
}

#[derive(Debug, Default, Clone)]
pub struct MemoryStorage {
    entries: HashMap<String, String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(key: &str, value: &str) -> Self {
        let mut storage = Self::new();
        storage.entries.insert(key.to_string(), value.to_string());
        storage
    }
}

impl StoragePort for MemoryStorage {
    fn read(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn write(&mut self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}

/// All keys live in one JSON object file: `{"<key>": "<serialized snapshot>"}`.
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let contents = std::fs::read_to_string(&self.path)?;
        if contents.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&contents).map_err(|e| {
            DashboardError::Config(format!("Storage file {} is not a key map: {e}", self.path.display()))
        })
    }

    fn write_all(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }
        // write-then-rename so a crash never leaves a half-written file behind
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_string_pretty(entries)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl StoragePort for FileStorage {
    fn read(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read_all()?.get(key).cloned())
    }

    fn write(&mut self, key: &str, value: &str) -> Result<()> {
        // an unreadable file is replaced rather than blocking every save
        let mut entries = self.read_all().unwrap_or_default();
        entries.insert(key.to_string(), value.to_string());
        self.write_all(&entries)
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        let mut entries = self.read_all().unwrap_or_default();
        if entries.remove(key).is_some() {
            self.write_all(&entries)?;
        }
        Ok(())
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Snapshot<'a> {
    schema_version: u32,
    theme: &'a Theme,
    tabs: &'a [Tab],
    active_tab_id: &'a str,
}

pub fn encode(workspace: &Workspace) -> Result<String> {
    let snapshot = Snapshot {
        schema_version: SCHEMA_VERSION,
        theme: &workspace.theme,
        tabs: &workspace.tabs,
        active_tab_id: &workspace.active_tab_id,
    };
    Ok(serde_json::to_string(&snapshot)?)
}

pub fn decode(raw: &str) -> Result<Workspace> {
    let value: Value = serde_json::from_str(raw)?;
    migrate(value)
}

/// Brings any snapshot shape written so far up to the current one.
///
/// Handled shapes: the current `{schemaVersion, theme, tabs, activeTabId}`;
/// tab lists without `globalSymbols`; the single-dashboard shape
/// `{widgets, layout}` from before tabs existed; and any of these wrapped as
/// `{state, version}` by the old browser persistence layer. Missing fields get
/// defaults, unknown widget kinds are dropped together with their grid entry,
/// and grid entries are reconciled against the widget list. Fails only when
/// the value is not an object at all.
pub fn migrate(value: Value) -> Result<Workspace> {
    let Value::Object(mut root) = value else {
        return Err(DashboardError::Config("snapshot is not an object".into()));
    };
    if let Some(Value::Object(inner)) = root.remove("state") {
        root = inner;
    }

    let theme = root
        .get("theme")
        .cloned()
        .and_then(|t| serde_json::from_value::<Theme>(t).ok())
        .unwrap_or_default();

    let raw_tabs: Vec<Value> = match root.get("tabs") {
        Some(Value::Array(tabs)) => tabs.clone(),
        _ if root.contains_key("widgets") || root.contains_key("layout") => {
            let mut single = Map::new();
            single.insert("name".into(), Value::String(DEFAULT_TAB_NAME.into()));
            for key in ["widgets", "layout", "globalSymbols"] {
                if let Some(v) = root.get(key) {
                    single.insert(key.into(), v.clone());
                }
            }
            vec![Value::Object(single)]
        }
        _ => Vec::new(),
    };

    let mut seen_widgets: HashSet<String> = HashSet::new();
    let mut seen_tabs: HashSet<String> = HashSet::new();
    let mut tabs = Vec::with_capacity(raw_tabs.len());
    for (index, raw) in raw_tabs.iter().enumerate() {
        let Some(obj) = raw.as_object() else {
            warn!("Dropping malformed tab at index {index}");
            continue;
        };
        let mut tab = migrate_tab(obj, index, &mut seen_widgets);
        if !seen_tabs.insert(tab.id.clone()) {
            tab.id = next_id("tab");
            seen_tabs.insert(tab.id.clone());
        }
        tabs.push(tab);
    }

    if tabs.is_empty() {
        info!("Snapshot has no usable tabs, seeding the default workspace");
        let mut fresh = default_workspace();
        fresh.theme = theme;
        return Ok(fresh);
    }

    let active_tab_id = root
        .get("activeTabId")
        .and_then(Value::as_str)
        .filter(|id| tabs.iter().any(|t| t.id == *id))
        .map(str::to_string)
        .unwrap_or_else(|| tabs[0].id.clone());

    Ok(Workspace { tabs, active_tab_id, theme })
}

fn migrate_tab(obj: &Map<String, Value>, index: usize, seen_widgets: &mut HashSet<String>) -> Tab {
    let id = obj
        .get("id")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| next_id("tab"));
    let name = obj
        .get("name")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("Tab {}", index + 1));

    let widgets: Vec<WidgetInstance> = obj
        .get("widgets")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(migrate_widget).collect())
        .unwrap_or_default();
    let widgets: Vec<WidgetInstance> = widgets.into_iter().filter(|w| seen_widgets.insert(w.id.clone())).collect();

    let entries: Vec<GridEntry> = obj
        .get("layout")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(migrate_entry).collect())
        .unwrap_or_default();
    let layout = layout::reconcile(&entries, &widgets, &[], GRID_COLUMNS);

    let global_symbols = obj
        .get("globalSymbols")
        .and_then(Value::as_array)
        .map(|items| normalize_symbols(items.iter().filter_map(Value::as_str)))
        .unwrap_or_default();

    Tab { id, name, layout, widgets, global_symbols }
}

fn migrate_widget(value: &Value) -> Option<WidgetInstance> {
    let obj = value.as_object()?;
    let id = obj.get("id").and_then(Value::as_str).filter(|s| !s.is_empty())?;
    let kind: WidgetKind = match obj.get("type").cloned().map(serde_json::from_value) {
        Some(Ok(kind)) => kind,
        _ => {
            warn!("Dropping widget {id} with unknown type {:?}", obj.get("type"));
            return None;
        }
    };
    let mut config = WidgetConfig::new();
    if let Some(Value::Object(raw)) = obj.get("config") {
        for (key, value) in raw {
            match value {
                Value::String(s) => {
                    config.insert(key.clone(), s.clone());
                }
                Value::Number(n) => {
                    config.insert(key.clone(), n.to_string());
                }
                Value::Bool(b) => {
                    config.insert(key.clone(), b.to_string());
                }
                _ => {}
            }
        }
    }
    Some(WidgetInstance { id: id.to_string(), kind, config })
}

fn migrate_entry(value: &Value) -> Option<GridEntry> {
    let obj = value.as_object()?;
    let widget_id = obj
        .get("widgetId")
        .or_else(|| obj.get("i"))
        .and_then(Value::as_str)?;
    let int = |key: &str, default: u32| -> u32 {
        obj.get(key)
            .and_then(Value::as_f64)
            .filter(|v| v.is_finite() && *v >= 0.0)
            .map(|v| v.round().min(MAX_GRID_UNITS as f64) as u32)
            .unwrap_or(default)
    };
    Some(GridEntry::new(widget_id, int("x", 0), int("y", 0), int("w", 1), int("h", 1)))
}

/// Loads the workspace from storage. Tries the current key, then legacy keys;
/// anything unreadable or unparseable yields a fresh default workspace.
pub fn load_workspace(storage: &dyn StoragePort) -> Workspace {
    for key in std::iter::once(STORAGE_KEY).chain(LEGACY_STORAGE_KEYS) {
        let raw = match storage.read(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => continue,
            Err(e) => {
                warn!("Failed to read workspace snapshot '{key}': {e}");
                continue;
            }
        };
        match decode(&raw) {
            Ok(workspace) => {
                info!("Loaded workspace from '{key}' with {} tab(s)", workspace.tabs.len());
                return workspace;
            }
            Err(e) => {
                warn!("Discarding unreadable workspace snapshot '{key}': {e}");
                return default_workspace();
            }
        }
    }
    info!("No saved workspace found, starting fresh");
    default_workspace()
}

pub fn save_workspace(storage: &mut dyn StoragePort, workspace: &Workspace) -> Result<()> {
    let encoded = encode(workspace)?;
    storage.write(STORAGE_KEY, &encoded)
}
