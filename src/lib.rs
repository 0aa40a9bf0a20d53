// Library exports for the CrystalBall dashboard
pub mod app;
pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod layout;
pub mod market;
pub mod profile;
pub mod resolver;
pub mod sync;
pub mod theme;
pub mod ui;
pub mod widget;
pub mod workspace;

// Re-export commonly used types
pub use app::App;
pub use cli::Cli;
pub use data::{Bar, ChatMessage, ExposureKind, ExposureSeries, NewsItem, Quote};
pub use error::{DashboardError, Result};
pub use layout::{GridMetrics, LayoutPlan, Viewport};
pub use market::{HttpMarketApi, MarketApi};
pub use profile::{VolumeProfile, build_profile};
pub use resolver::{resolve_default, resolve_symbol};
pub use sync::{DataSync, SyncHandle, SyncKey, SyncStatus, Timeframe};
pub use theme::{ResolvedTheme, Theme, ThemeController, ThemeMode};
pub use ui::render_ui;
pub use widget::{WidgetConfig, WidgetKind};
pub use workspace::{FileStorage, MemoryStorage, StoragePort, Tab, Workspace, WorkspaceStore};
