//! Per-widget bar synchronization: one full load, then cheap incremental polls

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use cli_log::*;

use crate::config::POLL_BAR_COUNT;
use crate::data::Bar;
use crate::error::{DashboardError, Result};
use crate::market::MarketApi;

use super::cache::BarCache;
use super::scheduler::{Liveness, TaskHandle, spawn_periodic};
use super::timeframe::SyncPolicy;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SyncStatus {
    #[default]
    Init,
    Loading,
    Ready,
    Live,
    Error(String),
}

impl SyncStatus {
    pub fn has_data(&self) -> bool {
        matches!(self, SyncStatus::Ready | SyncStatus::Live)
    }
}

/// Change notifications for the renderer, drained once per frame.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// Whole series replaced by a full load.
    Reset(Vec<Bar>),
    /// One bar added or revised by a poll.
    Update(Bar),
}

/// Identity of one sync instance. A different key means a different cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SyncKey {
    pub widget_id: String,
    pub symbol: String,
    pub policy: SyncPolicy,
}

#[derive(Debug, Default)]
pub struct SyncState {
    pub status: SyncStatus,
    pub cache: BarCache,
    pub last_update: Option<DateTime<Utc>>,
    events: Vec<SyncEvent>,
}

pub struct DataSync {
    key: SyncKey,
    api: Arc<dyn MarketApi>,
    state: Arc<Mutex<SyncState>>,
    liveness: Liveness,
}

impl DataSync {
    pub fn new(key: SyncKey, api: Arc<dyn MarketApi>) -> Self {
        Self::with_liveness(key, api, Liveness::new())
    }

    pub fn with_liveness(key: SyncKey, api: Arc<dyn MarketApi>, liveness: Liveness) -> Self {
        Self {
            key,
            api,
            state: Arc::new(Mutex::new(SyncState::default())),
            liveness,
        }
    }

    pub fn key(&self) -> &SyncKey {
        &self.key
    }

    fn lock(&self) -> MutexGuard<'_, SyncState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn status(&self) -> SyncStatus {
        self.lock().status.clone()
    }

    pub fn bars(&self) -> Vec<Bar> {
        self.lock().cache.to_vec()
    }

    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        self.lock().last_update
    }

    pub fn take_events(&self) -> Vec<SyncEvent> {
        std::mem::take(&mut self.lock().events)
    }

    /// Stops any in-flight request from touching the cache.
    pub fn cancel(&self) {
        self.liveness.kill();
    }

    fn cancelled(&self) -> DashboardError {
        DashboardError::Cancelled(format!("{} {}", self.key.symbol, self.key.policy.provider))
    }

    /// Fetches the full history and replaces the cache. Failure and empty
    /// responses leave the instance in `Error`.
    pub async fn load_full(&self) -> Result<usize> {
        let SyncKey { symbol, policy, .. } = &self.key;
        if !self.liveness.is_alive() {
            return Err(self.cancelled());
        }
        self.lock().status = SyncStatus::Loading;
        debug!("Full load {symbol} {} x{}", policy.provider, policy.full_limit);

        let result = self.api.bars(symbol, policy.provider, policy.full_limit).await;
        if !self.liveness.is_alive() {
            debug!("Discarding late full load for {symbol}");
            return Err(self.cancelled());
        }

        let mut state = self.lock();
        match result {
            Ok(bars) if !bars.is_empty() => {
                let count = bars.len();
                state.cache.replace_all(bars);
                let series = state.cache.to_vec();
                state.events.clear();
                state.events.push(SyncEvent::Reset(series));
                state.status = SyncStatus::Ready;
                state.last_update = Some(Utc::now());
                info!("Loaded {count} {} bars for {symbol}", policy.provider);
                Ok(count)
            }
            Ok(_) => {
                let err = DashboardError::EmptyResponse(format!("{symbol} {}", policy.provider));
                warn!("Full load failed: {err}");
                state.status = SyncStatus::Error(format!("No data for {symbol}"));
                Err(err)
            }
            Err(e) => {
                warn!("Full load of {symbol} failed: {e}");
                state.status = SyncStatus::Error(e.to_string());
                Err(e)
            }
        }
    }

    /// Fetches the newest few bars and upserts the ones that moved, then drops
    /// the oldest bars past the policy's window. Errors are returned to the
    /// caller but never change status or cached data.
    pub async fn poll_update(&self) -> Result<Vec<Bar>> {
        let SyncKey { symbol, policy, .. } = &self.key;
        if !self.liveness.is_alive() {
            return Err(self.cancelled());
        }
        if !self.lock().status.has_data() {
            return Ok(Vec::new());
        }

        let bars = match self.api.bars(symbol, policy.provider, POLL_BAR_COUNT).await {
            Ok(bars) => bars,
            Err(e) => {
                debug!("Poll of {symbol} failed, keeping cached bars: {e}");
                return Err(e);
            }
        };
        if !self.liveness.is_alive() {
            return Err(self.cancelled());
        }

        let mut state = self.lock();
        let changed = state.cache.upsert(bars);
        state.cache.retain_last(policy.full_limit);
        state.events.extend(changed.iter().copied().map(SyncEvent::Update));
        state.status = SyncStatus::Live;
        state.last_update = Some(Utc::now());
        if !changed.is_empty() {
            debug!("Poll of {symbol} revised {} bar(s)", changed.len());
        }
        Ok(changed)
    }

    /// One scheduler tick: poll when data is held, otherwise retry the full load.
    pub async fn refresh(&self) -> Result<()> {
        if self.lock().status.has_data() {
            self.poll_update().await.map(|_| ())
        } else {
            self.load_full().await.map(|_| ())
        }
    }
}

/// Running sync: the shared instance plus the task that drives it. Dropping
/// the handle tears both down.
pub struct SyncHandle {
    sync: Arc<DataSync>,
    _task: TaskHandle,
}

impl SyncHandle {
    pub fn start(key: SyncKey, api: Arc<dyn MarketApi>) -> Self {
        let liveness = Liveness::new();
        let period = key.policy.poll_every;
        info!("Starting sync for {} ({} {})", key.widget_id, key.symbol, key.policy.provider);
        let sync = Arc::new(DataSync::with_liveness(key, api, liveness.clone()));

        let loader = Arc::clone(&sync);
        let poller = Arc::clone(&sync);
        // A failed first load stays in Error but is retried on every tick.
        let task = spawn_periodic(
            liveness,
            period,
            async move {
                let _ = loader.load_full().await;
                true
            },
            move || {
                let sync = Arc::clone(&poller);
                async move {
                    let _ = sync.refresh().await;
                }
            },
        );
        Self { sync, _task: task }
    }

    pub fn key(&self) -> &SyncKey {
        self.sync.key()
    }

    pub fn sync(&self) -> &Arc<DataSync> {
        &self.sync
    }
}

impl Drop for SyncHandle {
    fn drop(&mut self) {
        debug!("Stopping sync for {}", self.sync.key().widget_id);
        self.sync.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{ChatMessage, ExposureKind, ExposureSeries, NewsItem, Quote, TradeTick};
    use crate::sync::Timeframe;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use tokio::sync::Notify;

    /// Replays scripted bar responses in order; optionally waits on a gate first.
    #[derive(Default)]
    struct ScriptedBars {
        responses: Mutex<VecDeque<Result<Vec<Bar>>>>,
        requests: Mutex<Vec<(String, String, usize)>>,
        gate: Option<Arc<Notify>>,
    }

    impl ScriptedBars {
        fn new(responses: Vec<Result<Vec<Bar>>>) -> Self {
            Self { responses: Mutex::new(responses.into()), ..Default::default() }
        }
    }

    #[async_trait]
    impl MarketApi for ScriptedBars {
        async fn bars(&self, symbol: &str, timeframe: &str, limit: usize) -> Result<Vec<Bar>> {
            self.requests.lock().unwrap().push((symbol.into(), timeframe.into(), limit));
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(DashboardError::Network("script exhausted".into())))
        }
        async fn quote(&self, _symbol: &str) -> Result<Quote> {
            Ok(Quote::default())
        }
        async fn trades(&self, _symbol: &str, _limit: usize) -> Result<Vec<TradeTick>> {
            Ok(Vec::new())
        }
        async fn exposure(&self, _kind: ExposureKind, _symbol: &str) -> Result<ExposureSeries> {
            Ok(ExposureSeries::default())
        }
        async fn news(&self, _symbols: &[String], _limit: usize) -> Result<Vec<NewsItem>> {
            Ok(Vec::new())
        }
        async fn chat(&self, _message: &str, _symbol: &str, _history: &[ChatMessage]) -> Result<String> {
            Ok(String::new())
        }
        async fn daily_report(&self, _symbol: &str) -> Result<String> {
            Ok(String::new())
        }
    }

    fn bar(time: i64, close: f64) -> Bar {
        Bar::new(time, 100.0, 102.0, 99.0, close, 1_000.0)
    }

    fn five_bars() -> Vec<Bar> {
        (0..5).map(|i| bar(i * 300, 101.0)).collect()
    }

    fn key() -> SyncKey {
        SyncKey {
            widget_id: "w".into(),
            symbol: "SPY".into(),
            policy: SyncPolicy::for_timeframe(Timeframe::M5),
        }
    }

    #[tokio::test]
    async fn poll_replaces_only_changed_bars() {
        let mut polled = five_bars();
        polled[4].close = 101.5;
        let api = Arc::new(ScriptedBars::new(vec![Ok(five_bars()), Ok(polled)]));
        let sync = DataSync::new(key(), api.clone());

        assert_eq!(sync.load_full().await.unwrap(), 5);
        assert_eq!(sync.status(), SyncStatus::Ready);
        assert!(matches!(sync.take_events().as_slice(), [SyncEvent::Reset(bars)] if bars.len() == 5));

        let changed = sync.poll_update().await.unwrap();
        assert_eq!(changed, vec![bar(1200, 101.5)]);
        assert_eq!(sync.status(), SyncStatus::Live);
        assert_eq!(sync.take_events(), vec![SyncEvent::Update(bar(1200, 101.5))]);
        assert_eq!(sync.bars().len(), 5);

        let requests = api.requests.lock().unwrap().clone();
        assert_eq!(requests[0], ("SPY".into(), "5Min".into(), 390));
        assert_eq!(requests[1], ("SPY".into(), "5Min".into(), POLL_BAR_COUNT));
    }

    #[tokio::test]
    async fn failed_or_empty_load_is_an_error() {
        let api = Arc::new(ScriptedBars::new(vec![Err(DashboardError::Network("down".into())), Ok(vec![])]));
        let sync = DataSync::new(key(), api);
        assert!(sync.load_full().await.is_err());
        assert!(matches!(sync.status(), SyncStatus::Error(_)));
        assert!(matches!(sync.load_full().await, Err(DashboardError::EmptyResponse(_))));
        assert!(sync.bars().is_empty());
        // nothing to poll against
        assert!(sync.poll_update().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_poll_keeps_stale_data() {
        let api = Arc::new(ScriptedBars::new(vec![Ok(five_bars()), Err(DashboardError::Network("blip".into()))]));
        let sync = DataSync::new(key(), api);
        sync.load_full().await.unwrap();
        assert!(sync.poll_update().await.is_err());
        assert_eq!(sync.status(), SyncStatus::Ready);
        assert_eq!(sync.bars(), five_bars());
    }

    #[tokio::test]
    async fn late_response_after_cancel_is_discarded() {
        let gate = Arc::new(Notify::new());
        let api = Arc::new(ScriptedBars {
            responses: Mutex::new(vec![Ok(five_bars())].into()),
            gate: Some(Arc::clone(&gate)),
            ..Default::default()
        });
        let sync = Arc::new(DataSync::new(key(), api));

        let loader = Arc::clone(&sync);
        let pending = tokio::spawn(async move { loader.load_full().await });
        tokio::task::yield_now().await;
        sync.cancel();
        gate.notify_one();

        assert!(matches!(pending.await.unwrap(), Err(DashboardError::Cancelled(_))));
        assert!(sync.bars().is_empty());
        assert!(sync.take_events().is_empty());
    }

    #[tokio::test]
    async fn poll_rolls_the_window_forward() {
        let policy = SyncPolicy { provider: "5Min", full_limit: 5, poll_every: std::time::Duration::from_secs(30) };
        let newer: Vec<Bar> = (5..8).map(|i| bar(i * 300, 101.0)).collect();
        let api = Arc::new(ScriptedBars::new(vec![Ok(five_bars()), Ok(newer)]));
        let sync = DataSync::new(SyncKey { policy, ..key() }, api);

        sync.load_full().await.unwrap();
        assert_eq!(sync.poll_update().await.unwrap().len(), 3);
        let times: Vec<i64> = sync.bars().iter().map(|b| b.time).collect();
        assert_eq!(times, vec![900, 1200, 1500, 1800, 2100]);
    }

    #[tokio::test]
    async fn handle_retries_a_failed_first_load() {
        let api = Arc::new(ScriptedBars::new(vec![Err(DashboardError::Network("blip".into())), Ok(five_bars())]));
        let policy = SyncPolicy { provider: "5Min", full_limit: 390, poll_every: std::time::Duration::from_millis(10) };
        let handle = SyncHandle::start(SyncKey { policy, ..key() }, api.clone());
        for _ in 0..100 {
            if handle.sync().status().has_data() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        assert!(handle.sync().status().has_data());
        assert_eq!(handle.sync().bars().len(), 5);
        // both requests were full loads
        let limits: Vec<usize> = api.requests.lock().unwrap().iter().take(2).map(|r| r.2).collect();
        assert_eq!(limits, vec![390, 390]);
    }

    #[tokio::test]
    async fn handle_loads_in_background() {
        let api = Arc::new(ScriptedBars::new(vec![Ok(five_bars())]));
        let handle = SyncHandle::start(key(), api);
        for _ in 0..50 {
            if handle.sync().status().has_data() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        assert_eq!(handle.sync().status(), SyncStatus::Ready);
        assert_eq!(handle.sync().bars().len(), 5);
    }
}
