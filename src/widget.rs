//! Widget kinds and their per-kind behavior table

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum::{Display, EnumIter, IntoEnumIterator};

use crate::config::DEFAULT_SYMBOL;
use crate::data::ExposureKind;
use crate::sync::Timeframe;

pub type WidgetConfig = BTreeMap<String, String>;

pub const SYMBOL_KEY: &str = "symbol";
pub const TIMEFRAME_KEY: &str = "timeframe";
pub const URL_KEY: &str = "url";

const EMBED_DEFAULT_URL: &str = "https://www.bloomberg.com/live";

/// Every widget a tab can host. Serialized names are stable; aliases accept
/// identifiers written by older snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter)]
pub enum WidgetKind {
    #[serde(rename = "chart")]
    #[strum(to_string = "Chart")]
    Chart,
    #[serde(rename = "order-flow", alias = "orderflow")]
    #[strum(to_string = "Order Flow")]
    OrderFlow,
    #[serde(rename = "open-interest", alias = "openinterest")]
    #[strum(to_string = "Open Interest")]
    OpenInterest,
    #[serde(rename = "open-interest-3d", alias = "openinterest3d")]
    #[strum(to_string = "3D Open Interest")]
    OpenInterest3d,
    #[serde(rename = "gamma-exposure", alias = "gex")]
    #[strum(to_string = "Gamma Exposure (GEX)")]
    GammaExposure,
    #[serde(rename = "delta-exposure", alias = "dex")]
    #[strum(to_string = "Delta Exposure (DEX)")]
    DeltaExposure,
    #[serde(rename = "news", alias = "newsfeed")]
    #[strum(to_string = "News Feed")]
    News,
    #[serde(rename = "embed", alias = "bloomberg")]
    #[strum(to_string = "Live TV")]
    Embed,
    #[serde(rename = "assistant", alias = "ai")]
    #[strum(to_string = "AI Assistant")]
    Assistant,
    #[serde(rename = "report")]
    #[strum(to_string = "Market Report")]
    Report,
}

/// Mobile strip a widget lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidgetCategory {
    Primary,
    Secondary,
}

/// What a widget needs from the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedKind {
    /// Time series kept fresh by a sync cache.
    Bars,
    /// Bars on a fixed 5Min window plus a quote, aggregated into a volume profile.
    VolumeProfile,
    Exposure(ExposureKind),
    News,
    Chat,
    Report,
    Static,
}

impl WidgetKind {
    pub fn all() -> Vec<WidgetKind> {
        WidgetKind::iter().collect()
    }

    /// Stable identifier, as written in snapshots.
    pub fn id(&self) -> &'static str {
        match self {
            WidgetKind::Chart => "chart",
            WidgetKind::OrderFlow => "order-flow",
            WidgetKind::OpenInterest => "open-interest",
            WidgetKind::OpenInterest3d => "open-interest-3d",
            WidgetKind::GammaExposure => "gamma-exposure",
            WidgetKind::DeltaExposure => "delta-exposure",
            WidgetKind::News => "news",
            WidgetKind::Embed => "embed",
            WidgetKind::Assistant => "assistant",
            WidgetKind::Report => "report",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            WidgetKind::Chart => "Candles with live updates",
            WidgetKind::OrderFlow => "Volume profile with point of control",
            WidgetKind::OpenInterest => "OI by strike",
            WidgetKind::OpenInterest3d => "Strike x expiry x OI",
            WidgetKind::GammaExposure => "Gamma exposure levels",
            WidgetKind::DeltaExposure => "Delta exposure",
            WidgetKind::News => "Market news",
            WidgetKind::Embed => "Live stream link",
            WidgetKind::Assistant => "Chat about the market",
            WidgetKind::Report => "Daily bias report",
        }
    }

    /// Symbol-aware kinds participate in tab-level override resolution.
    pub fn is_symbol_aware(&self) -> bool {
        match self {
            WidgetKind::Chart
            | WidgetKind::OrderFlow
            | WidgetKind::OpenInterest
            | WidgetKind::OpenInterest3d
            | WidgetKind::GammaExposure
            | WidgetKind::DeltaExposure => true,
            WidgetKind::News | WidgetKind::Embed | WidgetKind::Assistant | WidgetKind::Report => {
                false
            }
        }
    }

    pub fn category(&self) -> WidgetCategory {
        match self {
            WidgetKind::Chart | WidgetKind::OrderFlow => WidgetCategory::Primary,
            _ => WidgetCategory::Secondary,
        }
    }

    /// Default (w, h) in grid units.
    pub fn default_size(&self) -> (u32, u32) {
        match self {
            WidgetKind::Chart => (6, 10),
            WidgetKind::OrderFlow => (3, 10),
            WidgetKind::OpenInterest => (3, 8),
            WidgetKind::OpenInterest3d => (4, 8),
            WidgetKind::GammaExposure | WidgetKind::DeltaExposure => (4, 8),
            WidgetKind::News | WidgetKind::Assistant => (4, 10),
            WidgetKind::Embed | WidgetKind::Report => (4, 8),
        }
    }

    pub fn default_config(&self) -> WidgetConfig {
        let mut config = WidgetConfig::new();
        match self {
            WidgetKind::Embed => {
                config.insert(URL_KEY.into(), EMBED_DEFAULT_URL.into());
            }
            WidgetKind::Chart => {
                config.insert(SYMBOL_KEY.into(), DEFAULT_SYMBOL.into());
                config.insert(TIMEFRAME_KEY.into(), Timeframe::default().to_string());
            }
            _ => {
                config.insert(SYMBOL_KEY.into(), DEFAULT_SYMBOL.into());
            }
        }
        config
    }

    pub fn feed(&self) -> FeedKind {
        match self {
            WidgetKind::Chart => FeedKind::Bars,
            WidgetKind::OrderFlow => FeedKind::VolumeProfile,
            WidgetKind::OpenInterest => FeedKind::Exposure(ExposureKind::OpenInterest),
            WidgetKind::GammaExposure => FeedKind::Exposure(ExposureKind::Gamma),
            WidgetKind::DeltaExposure => FeedKind::Exposure(ExposureKind::Delta),
            WidgetKind::News => FeedKind::News,
            WidgetKind::Assistant => FeedKind::Chat,
            WidgetKind::Report => FeedKind::Report,
            WidgetKind::OpenInterest3d | WidgetKind::Embed => FeedKind::Static,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_round_trip_through_serde() {
        for kind in WidgetKind::all() {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.id()));
            let back: WidgetKind = serde_json::from_str(&json).unwrap();
            assert_eq!(back, kind);
        }
    }

    #[test]
    fn legacy_identifiers_are_accepted() {
        let kind: WidgetKind = serde_json::from_str("\"gex\"").unwrap();
        assert_eq!(kind, WidgetKind::GammaExposure);
        let kind: WidgetKind = serde_json::from_str("\"openinterest3d\"").unwrap();
        assert_eq!(kind, WidgetKind::OpenInterest3d);
        assert!(serde_json::from_str::<WidgetKind>("\"heatmap\"").is_err());
    }

    #[test]
    fn only_market_panels_are_symbol_aware() {
        let aware: Vec<_> = WidgetKind::all().into_iter().filter(|k| k.is_symbol_aware()).collect();
        assert_eq!(aware.len(), 6);
        assert!(!WidgetKind::News.is_symbol_aware());
        assert!(!WidgetKind::Report.is_symbol_aware());
    }

    #[test]
    fn chart_defaults_carry_a_timeframe() {
        let config = WidgetKind::Chart.default_config();
        assert_eq!(config.get(TIMEFRAME_KEY).map(String::as_str), Some("5m"));
        assert_eq!(config.get(SYMBOL_KEY).map(String::as_str), Some("SPY"));
    }
}
