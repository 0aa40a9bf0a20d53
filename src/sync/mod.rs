//! Time-series synchronization for chart-like widgets

pub mod cache;
pub mod engine;
pub mod scheduler;
pub mod timeframe;

pub use cache::BarCache;
pub use engine::{DataSync, SyncEvent, SyncHandle, SyncKey, SyncStatus};
pub use scheduler::{Liveness, TaskHandle, spawn_once, spawn_periodic};
pub use timeframe::{SyncPolicy, Timeframe};
