//! Display timeframes and their fetch/poll policy

use std::time::Duration;
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

use crate::config::{ORDER_FLOW_BAR_LIMIT, ORDER_FLOW_REFRESH_SECS};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
pub enum Timeframe {
    #[strum(serialize = "1s")]
    S1,
    #[strum(serialize = "5s")]
    S5,
    #[strum(serialize = "1m")]
    M1,
    #[default]
    #[strum(serialize = "5m")]
    M5,
    #[strum(serialize = "15m")]
    M15,
    #[strum(serialize = "30m")]
    M30,
    #[strum(serialize = "1h")]
    H1,
    #[strum(serialize = "4h")]
    H4,
    #[strum(serialize = "1d")]
    D1,
    #[strum(serialize = "1w")]
    W1,
}

impl Timeframe {
    /// Unknown or empty values fall back to the default.
    pub fn parse_or_default(value: Option<&str>) -> Self {
        value
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or_default()
    }

    /// Bar size requested from the backend. Sub-minute views are built on 1Min bars.
    pub fn provider(&self) -> &'static str {
        match self {
            Timeframe::S1 | Timeframe::S5 | Timeframe::M1 => "1Min",
            Timeframe::M5 => "5Min",
            Timeframe::M15 => "15Min",
            Timeframe::M30 => "30Min",
            Timeframe::H1 => "1Hour",
            Timeframe::H4 => "4Hour",
            Timeframe::D1 => "1Day",
            Timeframe::W1 => "1Week",
        }
    }

    /// History depth for a full load: one session of intraday bars, a trading
    /// year of dailies, two years of weeklies.
    pub fn bar_limit(&self) -> usize {
        match self {
            Timeframe::S1 | Timeframe::S5 | Timeframe::M1 | Timeframe::M5 => 390,
            Timeframe::M15 | Timeframe::M30 | Timeframe::H1 => 200,
            Timeframe::H4 => 120,
            Timeframe::D1 => 252,
            Timeframe::W1 => 104,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        let secs = match self {
            Timeframe::S1 | Timeframe::S5 => 2,
            Timeframe::M1 => 5,
            Timeframe::M5 | Timeframe::M15 => 15,
            Timeframe::M30 | Timeframe::H1 => 30,
            Timeframe::H4 => 60,
            Timeframe::D1 | Timeframe::W1 => 300,
        };
        Duration::from_secs(secs)
    }

    /// Next timeframe in display order, wrapping around.
    pub fn next(&self) -> Self {
        let all: Vec<Timeframe> = Timeframe::iter().collect();
        let index = all.iter().position(|tf| tf == self).unwrap_or(0);
        all[(index + 1) % all.len()]
    }
}

/// What one sync instance fetches and how often it polls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SyncPolicy {
    pub provider: &'static str,
    pub full_limit: usize,
    pub poll_every: Duration,
}

impl SyncPolicy {
    pub fn for_timeframe(timeframe: Timeframe) -> Self {
        Self {
            provider: timeframe.provider(),
            full_limit: timeframe.bar_limit(),
            poll_every: timeframe.poll_interval(),
        }
    }

    /// Session of 5-minute bars for the volume profile.
    pub fn order_flow() -> Self {
        Self {
            provider: Timeframe::M5.provider(),
            full_limit: ORDER_FLOW_BAR_LIMIT,
            poll_every: Duration::from_secs(ORDER_FLOW_REFRESH_SECS),
        }
    }
}
