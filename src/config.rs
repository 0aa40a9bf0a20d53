// Configuration constants for the application

/// Backend endpoints
pub const DEFAULT_API_URL: &str = "http://localhost:8000";
pub const API_URL_ENV: &str = "CRYSTALBALL_API_URL";
pub const DATA_PATH_ENV: &str = "CRYSTALBALL_DATA_PATH";
pub const HTTP_TIMEOUT_SECS: u64 = 15;

/// Persistence
pub const APP_DIR_NAME: &str = "crystalball";
pub const STATE_FILE_NAME: &str = "workspace.json";
pub const STORAGE_KEY: &str = "crystalball-workspace-v3";
/// Keys written by earlier releases, newest first. Read once, then superseded.
pub const LEGACY_STORAGE_KEYS: [&str; 2] = ["crystalball-workspace-v2", "crystalball-dashboard"];
pub const SCHEMA_VERSION: u32 = 3;

/// Symbols
pub const DEFAULT_SYMBOL: &str = "SPY";

/// Grid geometry (browser pixels)
pub const GRID_COLUMNS: u32 = 12;
pub const GRID_MARGIN_PX: u32 = 6;
pub const GRID_PADDING_PX: u32 = 6;
pub const CHROME_HEIGHT_PX: u32 = 84; // top bar + tab bar
pub const MIN_ROW_HEIGHT_PX: u32 = 10;
pub const MOBILE_BREAKPOINT_PX: u32 = 768;
pub const MAX_GRID_UNITS: u32 = 10_000; // cap on any persisted grid coordinate

/// Grid geometry (terminal cells)
pub const TERMINAL_CHROME_ROWS: u32 = 7; // top bar (3) + tab bar (3) + status line (1)
pub const TERMINAL_MIN_ROW_HEIGHT: u32 = 1;
pub const TERMINAL_MOBILE_BREAKPOINT: u32 = 100;

/// Data sync
pub const POLL_BAR_COUNT: usize = 5;
pub const ORDER_FLOW_BAR_LIMIT: usize = 78; // ~6.5h of 5m bars
pub const ORDER_FLOW_REFRESH_SECS: u64 = 30;
pub const NEWS_LIMIT: usize = 20;
pub const NEWS_REFRESH_SECS: u64 = 60;
pub const EXPOSURE_SPOT_BAND: f64 = 0.05;
pub const EXPOSURE_MAX_ROWS: usize = 40;

/// Volume profile
pub const VOLUME_PROFILE_BUCKETS: usize = 40;

/// Update intervals (in milliseconds)
pub const TICK_RATE_MS: u64 = 50;
pub const UI_UPDATE_RATE_MS: u64 = 1000;

/// Theme defaults
pub const DEFAULT_BULL_COLOR: &str = "#00d4aa";
pub const DEFAULT_BEAR_COLOR: &str = "#ff4d6d";
