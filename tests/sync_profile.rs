use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use crystalball::data::TradeTick;
use crystalball::sync::{SyncEvent, SyncPolicy};
use crystalball::{
    Bar, ChatMessage, DashboardError, DataSync, ExposureKind, ExposureSeries, MarketApi, NewsItem, Quote, Result,
    SyncHandle, SyncKey, SyncStatus, Timeframe, build_profile,
};

/// Market data double that answers bar requests from a script.
struct Script {
    bars: Mutex<VecDeque<Vec<Bar>>>,
    limits: Mutex<Vec<usize>>,
}

impl Script {
    fn new(responses: Vec<Vec<Bar>>) -> Arc<Self> {
        Arc::new(Self { bars: Mutex::new(responses.into()), limits: Mutex::new(Vec::new()) })
    }
}

#[async_trait]
impl MarketApi for Script {
    async fn bars(&self, _symbol: &str, _timeframe: &str, limit: usize) -> Result<Vec<Bar>> {
        self.limits.lock().unwrap().push(limit);
        self.bars
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| DashboardError::Network("no more responses".into()))
    }
    async fn quote(&self, _symbol: &str) -> Result<Quote> {
        Ok(Quote { last_price: 101.0 })
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
        Ok("ok".into())
    }
    async fn daily_report(&self, _symbol: &str) -> Result<String> {
        Ok("# Bias".into())
    }
}

fn session() -> Vec<Bar> {
    (0..5).map(|i| Bar::new(1_700_000_000 + i * 300, 100.0, 101.0, 99.5, 100.5, 2_000.0)).collect()
}

fn key(policy: SyncPolicy) -> SyncKey {
    SyncKey { widget_id: "chart-1".into(), symbol: "SPY".into(), policy }
}

#[tokio::test]
async fn poll_with_one_changed_bar_replaces_exactly_one() {
    let mut polled = session();
    polled[2].close = 100.9;
    polled[2].high = 101.2;
    let api = Script::new(vec![session(), polled.clone()]);
    let sync = DataSync::new(key(SyncPolicy::for_timeframe(Timeframe::M5)), api.clone());

    sync.load_full().await.unwrap();
    sync.take_events();
    let changed = sync.poll_update().await.unwrap();

    assert_eq!(changed, vec![polled[2]]);
    assert_eq!(sync.take_events(), vec![SyncEvent::Update(polled[2])]);
    let bars = sync.bars();
    assert_eq!(bars.len(), 5);
    assert_eq!(bars[2], polled[2]);
    assert_eq!(bars[3], session()[3]);
    assert_eq!(*api.limits.lock().unwrap(), vec![390, 5]);
}

#[tokio::test]
async fn handle_loads_then_polls_until_dropped() {
    let mut polled = session();
    polled[4].close = 100.7;
    let api = Script::new(vec![session(), polled.clone()]);
    let policy = SyncPolicy { provider: "5Min", full_limit: 5, poll_every: Duration::from_millis(20) };
    let handle = SyncHandle::start(key(policy), api.clone());

    let mut live = false;
    for _ in 0..100 {
        tokio::time::sleep(Duration::from_millis(10)).await;
        if handle.sync().status() == SyncStatus::Live {
            live = true;
            break;
        }
    }
    assert!(live, "poll never landed");
    assert_eq!(handle.sync().bars()[4], polled[4]);

    let sync = Arc::clone(handle.sync());
    drop(handle);
    let requests = api.limits.lock().unwrap().len();
    tokio::time::sleep(Duration::from_millis(80)).await;
    assert_eq!(api.limits.lock().unwrap().len(), requests);
    // a poll that raced the drop cannot overwrite anything
    assert_eq!(sync.bars()[4], polled[4]);
}

#[tokio::test]
async fn order_flow_window_stays_at_one_session() {
    let policy = SyncPolicy::order_flow();
    let first: Vec<Bar> = (0..policy.full_limit as i64).map(|i| Bar::new(i * 300, 100.0, 101.0, 99.0, 100.5, 10.0)).collect();
    let mut responses = vec![first];
    for i in 0..20 {
        let time = (policy.full_limit as i64 + i) * 300;
        responses.push(vec![Bar::new(time, 100.0, 103.0, 99.0, 102.0, 10.0)]);
    }
    let api = Script::new(responses);
    let sync = DataSync::new(key(policy), api);

    sync.load_full().await.unwrap();
    for _ in 0..20 {
        sync.poll_update().await.unwrap();
    }
    let bars = sync.bars();
    assert_eq!(bars.len(), policy.full_limit);
    assert_eq!(bars[0].time, 20 * 300);
    assert!((build_profile(&bars).total_volume() - 10.0 * policy.full_limit as f64).abs() < 1e-6);
}

#[test]
fn profile_over_a_ten_point_range_keeps_all_volume() {
    let bars = vec![
        Bar::new(0, 100.0, 105.0, 100.0, 104.0, 400.0),
        Bar::new(60, 104.0, 110.0, 103.0, 103.5, 350.0),
        Bar::new(120, 103.5, 108.0, 102.0, 107.0, 250.0),
    ];
    let profile = build_profile(&bars);
    assert!((profile.total_volume() - 1000.0).abs() < 1e-6);
    let buy: f64 = profile.buckets.iter().map(|b| b.buy_volume).sum();
    assert!((buy - 650.0).abs() < 1e-6);
    assert!(profile.poc_bucket().is_some());
    assert!(profile.buckets.windows(2).all(|w| w[0].price > w[1].price));
}

#[test]
fn flat_bars_build_an_empty_profile() {
    let bars: Vec<Bar> = (0..4).map(|i| Bar::new(i * 60, 50.0, 50.0, 50.0, 50.0, 10.0)).collect();
    let profile = build_profile(&bars);
    assert!(profile.is_empty());
    assert_eq!(profile.poc, None);
    assert!(build_profile(&[]).is_empty());
}
