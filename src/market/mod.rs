//! Backend collaborator: market data, analytics, news, assistant and reports

pub mod http;

use async_trait::async_trait;

use crate::data::{Bar, ChatMessage, ExposureKind, ExposureSeries, NewsItem, Quote, TradeTick};
use crate::error::Result;

pub use http::HttpMarketApi;

#[async_trait]
pub trait MarketApi: Send + Sync {
    /// Bars ascending by time. `timeframe` is the provider code (`5Min`, `1Day`, ...).
    async fn bars(&self, symbol: &str, timeframe: &str, limit: usize) -> Result<Vec<Bar>>;

    async fn quote(&self, symbol: &str) -> Result<Quote>;

    /// Recent prints. Exposed for callers of the port; no panel consumes it yet.
    async fn trades(&self, symbol: &str, limit: usize) -> Result<Vec<TradeTick>>;

    async fn exposure(&self, kind: ExposureKind, symbol: &str) -> Result<ExposureSeries>;

    async fn news(&self, symbols: &[String], limit: usize) -> Result<Vec<NewsItem>>;

    async fn chat(&self, message: &str, symbol: &str, history: &[ChatMessage]) -> Result<String>;

    async fn daily_report(&self, symbol: &str) -> Result<String>;
}
