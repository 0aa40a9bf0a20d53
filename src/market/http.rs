use std::time::Duration;

use async_trait::async_trait;
use cli_log::*;
use reqwest::Url;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::config::HTTP_TIMEOUT_SECS;
use crate::data::{
    Bar, ChatMessage, ChatReply, ExposureKind, ExposureSeries, NewsItem, Quote, RawBar, TradeTick, bars_from_raw,
};
use crate::error::{DashboardError, Result};

use super::MarketApi;

#[derive(Clone)]
pub struct HttpMarketApi {
    base_url: Url,
    http: reqwest::Client,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    message: &'a str,
    symbol: &'a str,
    history: &'a [ChatMessage],
}

impl HttpMarketApi {
    pub fn new(base_url: &str) -> Result<Self> {
        let mut base_url = Url::parse(base_url)
            .map_err(|e| DashboardError::Config(format!("Invalid API url '{base_url}': {e}")))?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let http = reqwest::Client::builder()
            .user_agent(concat!("crystalball/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()?;
        Ok(Self { base_url, http })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| DashboardError::Config(format!("Invalid endpoint '{path}': {e}")))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let url = self.url(path)?;
        debug!("GET {url} {query:?}");
        let response = self.http.get(url).query(query).send().await?;
        let status = response.status();
        if !status.is_success() {
            warn!("GET {path} failed with {status}");
            return Err(DashboardError::Network(format!("{path} returned {status}")));
        }
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl MarketApi for HttpMarketApi {
    async fn bars(&self, symbol: &str, timeframe: &str, limit: usize) -> Result<Vec<Bar>> {
        let raw: Vec<RawBar> = self
            .get_json(
                &format!("api/market/history/{symbol}"),
                &[("timeframe", timeframe.to_string()), ("limit", limit.to_string())],
            )
            .await?;
        Ok(bars_from_raw(raw))
    }

    async fn quote(&self, symbol: &str) -> Result<Quote> {
        self.get_json(&format!("api/market/quote/{symbol}"), &[]).await
    }

    async fn trades(&self, symbol: &str, limit: usize) -> Result<Vec<TradeTick>> {
        self.get_json(&format!("api/market/trades/{symbol}"), &[("limit", limit.to_string())])
            .await
    }

    async fn exposure(&self, kind: ExposureKind, symbol: &str) -> Result<ExposureSeries> {
        self.get_json(&format!("api/analytics/{}/{symbol}", kind.path()), &[]).await
    }

    async fn news(&self, symbols: &[String], limit: usize) -> Result<Vec<NewsItem>> {
        let mut query = vec![("limit", limit.to_string())];
        if !symbols.is_empty() {
            query.push(("symbols", symbols.join(",")));
        }
        self.get_json("api/news", &query).await
    }

    async fn chat(&self, message: &str, symbol: &str, history: &[ChatMessage]) -> Result<String> {
        let url = self.url("api/ai/chat")?;
        let body = ChatRequest { message, symbol, history };
        let response = self.http.post(url).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            warn!("Assistant request failed with {status}");
            return Err(DashboardError::Network(format!("api/ai/chat returned {status}")));
        }
        let reply: ChatReply = response.json().await?;
        Ok(reply.reply)
    }

    async fn daily_report(&self, symbol: &str) -> Result<String> {
        let path = format!("api/reports/daily-bias/{symbol}");
        let response = self.http.get(self.url(&path)?).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DashboardError::Network(format!("{path} returned {status}")));
        }
        let text = response.text().await?;
        if text.trim().is_empty() {
            return Err(DashboardError::EmptyResponse(path));
        }
        Ok(text)
    }
}
