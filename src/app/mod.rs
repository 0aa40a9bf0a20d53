// App module structure for better organization

pub mod core;
pub mod feeds;
pub mod input;
pub mod types;

// Re-export the main App struct and key types
pub use core::{App, strip_index};
pub use feeds::{FeedKey, FeedSlot, Fetched, WidgetFeed};
pub use types::{InputMode, MarketStatus, PromptKind, market_status};
