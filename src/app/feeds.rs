//! Live data behind each on-screen widget
//!
//! Every widget of the active tab gets at most one feed, keyed by what it
//! fetches. When the key changes (symbol override, timeframe, kind) the old
//! feed is dropped, which cancels its task, and a fresh one starts.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use cli_log::*;

use crate::config::{NEWS_LIMIT, NEWS_REFRESH_SECS, ORDER_FLOW_REFRESH_SECS};
use crate::data::{Bar, ChatMessage, ExposureKind, ExposureSeries, NewsItem, Quote};
use crate::error::Result;
use crate::market::MarketApi;
use crate::profile::{VolumeProfile, build_profile};
use crate::resolver::resolve_in_tab;
use crate::sync::{
    DataSync, Liveness, SyncEvent, SyncHandle, SyncKey, SyncPolicy, SyncStatus, TaskHandle, Timeframe, spawn_once, spawn_periodic,
};
use crate::widget::{FeedKind, TIMEFRAME_KEY, WidgetKind};
use crate::workspace::{Tab, WidgetInstance};

/// Messages sent along with a chat request.
const CHAT_HISTORY_LEN: usize = 6;

const CHAT_WELCOME: &str = "Hi! I'm your trading assistant. Ask me about the current market: \
    GEX levels, key strikes, bias or options flow.";

fn lock<T>(shared: &Mutex<T>) -> MutexGuard<'_, T> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Identity of a feed. Widgets whose key is unchanged keep their feed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FeedKey {
    pub kind: WidgetKind,
    pub symbol: String,
    pub timeframe: Option<Timeframe>,
}

impl FeedKey {
    pub fn for_widget(tab: &Tab, widget: &WidgetInstance, fallback: &str) -> Self {
        let timeframe = match widget.kind {
            WidgetKind::Chart => Some(Timeframe::parse_or_default(widget.config_value(TIMEFRAME_KEY))),
            _ => None,
        };
        // the transcript survives symbol changes; the symbol is read at send time
        let symbol = match widget.kind.feed() {
            FeedKind::Chat | FeedKind::Static => String::new(),
            _ => resolve_in_tab(tab, widget, fallback),
        };
        Self { kind: widget.kind, symbol, timeframe }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum Fetched<T> {
    #[default]
    Loading,
    Ready(T),
    Failed(String),
}

/// Result of a one-shot or periodically refreshed request. A failed refresh
/// keeps the last good value.
pub struct FetchFeed<T> {
    state: Arc<Mutex<Fetched<T>>>,
    _task: TaskHandle,
}

impl<T: Clone + Send + 'static> FetchFeed<T> {
    pub fn once<Fut>(what: String, fetch: Fut) -> Self
    where
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let state = Arc::new(Mutex::new(Fetched::Loading));
        let liveness = Liveness::new();
        let target = Arc::clone(&state);
        let flag = liveness.clone();
        let task = spawn_once(liveness, async move {
            let result = fetch.await;
            store(&target, &flag, &what, result);
        });
        Self { state, _task: task }
    }

    pub fn periodic<F, Fut>(what: String, period: Duration, mut fetch: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let state = Arc::new(Mutex::new(Fetched::Loading));
        let liveness = Liveness::new();

        let first = fetch();
        let (target, flag, label) = (Arc::clone(&state), liveness.clone(), what.clone());
        let start = async move {
            store(&target, &flag, &label, first.await);
            true
        };
        let (target, flag) = (Arc::clone(&state), liveness.clone());
        let task = spawn_periodic(liveness, period, start, move || {
            let next = fetch();
            let (target, flag, label) = (Arc::clone(&target), flag.clone(), what.clone());
            async move { store(&target, &flag, &label, next.await) }
        });
        Self { state, _task: task }
    }

    pub fn snapshot(&self) -> Fetched<T> {
        lock(&self.state).clone()
    }
}

fn store<T>(state: &Mutex<Fetched<T>>, liveness: &Liveness, what: &str, result: Result<T>) {
    if !liveness.is_alive() {
        return;
    }
    let mut guard = lock(state);
    match result {
        Ok(value) => *guard = Fetched::Ready(value),
        Err(e) => {
            warn!("Fetching {what} failed: {e}");
            if !matches!(*guard, Fetched::Ready(_)) {
                *guard = Fetched::Failed(e.to_string());
            }
        }
    }
}

/// Candles for a chart, kept current by folding sync events into the series.
pub struct ChartFeed {
    handle: SyncHandle,
    pub series: Vec<Bar>,
}

impl ChartFeed {
    pub fn status(&self) -> SyncStatus {
        self.handle.sync().status()
    }

    pub fn sync(&self) -> &Arc<DataSync> {
        self.handle.sync()
    }

    pub fn timeframe_policy(&self) -> SyncPolicy {
        self.handle.key().policy
    }

    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        self.handle.sync().last_update()
    }

    fn absorb(&mut self) -> bool {
        let events = self.handle.sync().take_events();
        let changed = !events.is_empty();
        for event in events {
            apply_event(&mut self.series, event);
        }
        changed
    }
}

/// Applies one sync event to a time-sorted series.
pub fn apply_event(series: &mut Vec<Bar>, event: SyncEvent) {
    match event {
        SyncEvent::Reset(bars) => *series = bars,
        SyncEvent::Update(bar) => match series.binary_search_by_key(&bar.time, |b| b.time) {
            Ok(i) => series[i] = bar,
            Err(i) => series.insert(i, bar),
        },
    }
}

/// Session volume profile plus the last traded price.
pub struct OrderFlowFeed {
    handle: SyncHandle,
    quote: FetchFeed<Quote>,
    pub profile: VolumeProfile,
    pub bar_count: usize,
}

impl OrderFlowFeed {
    pub fn status(&self) -> SyncStatus {
        self.handle.sync().status()
    }

    pub fn last_price(&self) -> Option<f64> {
        match self.quote.snapshot() {
            Fetched::Ready(q) if q.last_price > 0.0 => Some(q.last_price),
            _ => None,
        }
    }

    fn absorb(&mut self) -> bool {
        if self.handle.sync().take_events().is_empty() {
            return false;
        }
        let bars = self.handle.sync().bars();
        self.bar_count = bars.len();
        self.profile = build_profile(&bars);
        true
    }
}

#[derive(Debug, Clone, Default)]
pub struct ChatState {
    pub messages: Vec<ChatMessage>,
    pub pending: bool,
}

pub struct ChatFeed {
    api: Arc<dyn MarketApi>,
    state: Arc<Mutex<ChatState>>,
    liveness: Liveness,
    _task: Option<TaskHandle>,
}

impl ChatFeed {
    pub fn new(api: Arc<dyn MarketApi>) -> Self {
        let state = ChatState { messages: vec![ChatMessage::assistant(CHAT_WELCOME)], pending: false };
        Self { api, state: Arc::new(Mutex::new(state)), liveness: Liveness::new(), _task: None }
    }

    pub fn snapshot(&self) -> ChatState {
        lock(&self.state).clone()
    }

    /// Sends `text` with the recent transcript. Ignored while a reply is pending.
    pub fn send(&mut self, text: &str, symbol: &str) -> bool {
        let text = text.trim();
        if text.is_empty() {
            return false;
        }
        let history = {
            let mut state = lock(&self.state);
            if state.pending {
                return false;
            }
            let start = state.messages.len().saturating_sub(CHAT_HISTORY_LEN);
            let history = state.messages[start..].to_vec();
            state.messages.push(ChatMessage::user(text));
            state.pending = true;
            history
        };

        let api = Arc::clone(&self.api);
        let state = Arc::clone(&self.state);
        let flag = self.liveness.clone();
        let (message, symbol) = (text.to_string(), symbol.to_string());
        self._task = Some(spawn_once(self.liveness.clone(), async move {
            let result = api.chat(&message, &symbol, &history).await;
            if !flag.is_alive() {
                return;
            }
            let reply = match result {
                Ok(reply) => ChatMessage::assistant(reply),
                Err(e) => {
                    warn!("Assistant request failed: {e}");
                    ChatMessage::assistant(format!("Error: {e}"))
                }
            };
            let mut state = lock(&state);
            state.messages.push(reply);
            state.pending = false;
        }));
        true
    }
}

impl Drop for ChatFeed {
    fn drop(&mut self) {
        self.liveness.kill();
    }
}

pub enum WidgetFeed {
    Chart(ChartFeed),
    OrderFlow(OrderFlowFeed),
    Exposure(ExposureKind, FetchFeed<ExposureSeries>),
    News(FetchFeed<Vec<NewsItem>>),
    Report(FetchFeed<String>),
    Chat(ChatFeed),
}

impl WidgetFeed {
    /// Starts whatever the widget kind needs; `None` for static widgets.
    pub fn start(widget_id: &str, key: &FeedKey, api: &Arc<dyn MarketApi>) -> Option<Self> {
        let symbol = key.symbol.clone();
        let feed = match key.kind.feed() {
            FeedKind::Bars => {
                let timeframe = key.timeframe.unwrap_or_default();
                let sync_key = SyncKey {
                    widget_id: widget_id.to_string(),
                    symbol,
                    policy: SyncPolicy::for_timeframe(timeframe),
                };
                WidgetFeed::Chart(ChartFeed { handle: SyncHandle::start(sync_key, Arc::clone(api)), series: Vec::new() })
            }
            FeedKind::VolumeProfile => {
                let sync_key = SyncKey {
                    widget_id: widget_id.to_string(),
                    symbol: symbol.clone(),
                    policy: SyncPolicy::order_flow(),
                };
                let quote_api = Arc::clone(api);
                let quote = FetchFeed::periodic(
                    format!("quote {symbol}"),
                    Duration::from_secs(ORDER_FLOW_REFRESH_SECS),
                    move || {
                        let api = Arc::clone(&quote_api);
                        let symbol = symbol.clone();
                        async move { api.quote(&symbol).await }
                    },
                );
                WidgetFeed::OrderFlow(OrderFlowFeed {
                    handle: SyncHandle::start(sync_key, Arc::clone(api)),
                    quote,
                    profile: VolumeProfile::default(),
                    bar_count: 0,
                })
            }
            FeedKind::Exposure(kind) => {
                let api = Arc::clone(api);
                let what = format!("{} {symbol}", kind.path());
                WidgetFeed::Exposure(kind, FetchFeed::once(what, async move { api.exposure(kind, &symbol).await }))
            }
            FeedKind::News => {
                let api = Arc::clone(api);
                let symbols = vec![symbol.clone()];
                WidgetFeed::News(FetchFeed::periodic(
                    format!("news {symbol}"),
                    Duration::from_secs(NEWS_REFRESH_SECS),
                    move || {
                        let api = Arc::clone(&api);
                        let symbols = symbols.clone();
                        async move { api.news(&symbols, NEWS_LIMIT).await }
                    },
                ))
            }
            FeedKind::Report => {
                let api = Arc::clone(api);
                let what = format!("daily report {symbol}");
                WidgetFeed::Report(FetchFeed::once(what, async move { api.daily_report(&symbol).await }))
            }
            FeedKind::Chat => WidgetFeed::Chat(ChatFeed::new(Arc::clone(api))),
            FeedKind::Static => return None,
        };
        debug!("Started {} feed for {widget_id}", key.kind.id());
        Some(feed)
    }

    /// Folds pending background results in. Returns true when a redraw is due.
    pub fn absorb(&mut self) -> bool {
        match self {
            WidgetFeed::Chart(feed) => feed.absorb(),
            WidgetFeed::OrderFlow(feed) => feed.absorb(),
            _ => false,
        }
    }
}

/// A running feed together with the key it was started for.
pub struct FeedSlot {
    pub key: FeedKey,
    pub feed: WidgetFeed,
}
