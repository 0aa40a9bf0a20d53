//! Persistent tab/widget/layout state

pub mod actions;
pub mod defaults;
pub mod persist;
pub mod store;
pub mod types;

pub use actions::{WorkspaceAction, apply};
pub use defaults::{DEFAULT_TAB_NAME, default_workspace};
pub use persist::{FileStorage, MemoryStorage, StoragePort, decode, encode, load_workspace, migrate};
pub use store::WorkspaceStore;
pub use types::{GridEntry, Tab, WidgetInstance, Workspace, next_id, normalize_symbols};
