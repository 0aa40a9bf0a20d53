//! Market data shapes exchanged with the backend collaborator

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// One OHLCV bar keyed by its open time in unix seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(default)]
    pub volume: f64,
}

impl Bar {
    pub fn new(time: i64, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self { time, open, high, low, close, volume }
    }

    /// True when any price field differs. Volume alone does not count as a change.
    pub fn prices_differ(&self, other: &Bar) -> bool {
        self.open != other.open
            || self.high != other.high
            || self.low != other.low
            || self.close != other.close
    }

    pub fn is_bullish(&self) -> bool {
        self.close >= self.open
    }
}

/// Bar as it arrives on the wire: either a unix `time` or an RFC 3339 `timestamp`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawBar {
    #[serde(default)]
    pub time: Option<i64>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(deserialize_with = "lenient_f64")]
    pub open: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub high: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub low: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub close: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub volume: f64,
}

impl RawBar {
    pub fn into_bar(self) -> Option<Bar> {
        let time = match (self.time, self.timestamp.as_deref()) {
            (Some(t), _) => t,
            (None, Some(ts)) => DateTime::parse_from_rfc3339(ts).ok()?.timestamp(),
            (None, None) => return None,
        };
        Some(Bar::new(time, self.open, self.high, self.low, self.close, self.volume))
    }
}

/// Converts wire bars, dropping unparseable rows and sorting ascending by time.
pub fn bars_from_raw(raw: Vec<RawBar>) -> Vec<Bar> {
    let mut bars: Vec<Bar> = raw.into_iter().filter_map(RawBar::into_bar).collect();
    bars.sort_by_key(|b| b.time);
    bars
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
pub struct Quote {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub last_price: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct TradeTick {
    #[serde(deserialize_with = "lenient_f64")]
    pub price: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub size: f64,
}

/// Which analytics series a widget consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExposureKind {
    Gamma,
    Delta,
    OpenInterest,
}

impl ExposureKind {
    pub fn path(&self) -> &'static str {
        match self {
            ExposureKind::Gamma => "gex",
            ExposureKind::Delta => "dex",
            ExposureKind::OpenInterest => "oi",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct StrikeValue {
    #[serde(deserialize_with = "lenient_f64")]
    pub strike: f64,
    #[serde(alias = "gex", alias = "dex", alias = "oi_total", deserialize_with = "lenient_f64")]
    pub value: f64,
    /// Open-interest split; zero for the other series.
    #[serde(default, rename = "oi_call", deserialize_with = "lenient_f64")]
    pub call: f64,
    #[serde(default, rename = "oi_put", deserialize_with = "lenient_f64")]
    pub put: f64,
}

impl StrikeValue {
    pub fn new(strike: f64, value: f64) -> Self {
        Self { strike, value, call: 0.0, put: 0.0 }
    }
}

fn sign(value: f64) -> i8 {
    if value > 0.0 {
        1
    } else if value < 0.0 {
        -1
    } else {
        0
    }
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct ExposureSeries {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub spot: f64,
    #[serde(default)]
    pub data: Vec<StrikeValue>,
}

impl ExposureSeries {
    /// Centre of the visible band: spot when the series carries one, else the
    /// strike with the largest absolute value (the ATM proxy for open interest).
    pub fn anchor(&self) -> Option<f64> {
        if self.spot > 0.0 {
            return Some(self.spot);
        }
        self.data
            .iter()
            .filter(|d| d.value.is_finite())
            .max_by(|a, b| a.value.abs().total_cmp(&b.value.abs()))
            .map(|d| d.strike)
    }

    /// Rows within `band` of the anchor, at most `max_rows` of them centred on it.
    pub fn near_spot(&self, band: f64, max_rows: usize) -> Vec<StrikeValue> {
        let Some(anchor) = self.anchor() else { return Vec::new() };
        let lo = anchor * (1.0 - band);
        let hi = anchor * (1.0 + band);
        let rows: Vec<StrikeValue> = self.data.iter().copied().filter(|d| d.strike >= lo && d.strike <= hi).collect();
        if rows.len() <= max_rows {
            return rows;
        }
        let centre = rows
            .iter()
            .enumerate()
            .min_by(|a, b| (a.1.strike - anchor).abs().total_cmp(&(b.1.strike - anchor).abs()))
            .map_or(0, |(i, _)| i);
        let start = centre.saturating_sub(max_rows / 2).min(rows.len() - max_rows);
        rows[start..start + max_rows].to_vec()
    }

    pub fn net(rows: &[StrikeValue]) -> f64 {
        rows.iter().map(|r| r.value).sum()
    }

    /// First strike where the sign of the series flips relative to the previous row.
    pub fn flip_strike(rows: &[StrikeValue]) -> Option<f64> {
        rows.windows(2)
            .find(|w| sign(w[0].value) != sign(w[1].value))
            .map(|w| w[1].strike)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewsItem {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub headline: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub symbols: Vec<String>,
    #[serde(default, alias = "createdAt")]
    pub created_at: String,
    #[serde(default)]
    pub url: String,
}

impl NewsItem {
    pub fn created(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.created_at).ok().map(|t| t.with_timezone(&Utc))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: ChatRole::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: ChatRole::Assistant, content: content.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChatReply {
    pub reply: String,
}

/// Accepts numbers, numeric strings and null (as 0.0).
fn lenient_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Number(n) => n.as_f64().unwrap_or(0.0),
        serde_json::Value::String(s) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_bars_accept_timestamp_or_time() {
        let raw: Vec<RawBar> = serde_json::from_str(
            r#"[
                {"timestamp": "2024-03-01T14:35:00Z", "open": 1, "high": 2, "low": 0.5, "close": 1.5, "volume": 10},
                {"time": 1709303400, "open": "1", "high": "2", "low": "1", "close": "2"},
                {"open": 1, "high": 1, "low": 1, "close": 1}
            ]"#,
        )
        .unwrap();
        let bars = bars_from_raw(raw);
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].time, 1709303400);
        assert_eq!(bars[1].time, 1709303700);
        assert_eq!(bars[0].volume, 0.0);
    }

    #[test]
    fn strike_value_reads_series_specific_field() {
        let gex: ExposureSeries =
            serde_json::from_str(r#"{"spot": 500, "data": [{"strike": 495, "gex": -2.5}]}"#).unwrap();
        assert_eq!(gex.data[0].value, -2.5);

        let oi: ExposureSeries = serde_json::from_str(
            r#"{"data": [{"strike": 495, "oi_call": 10, "oi_put": 5, "oi_total": 15}]}"#,
        )
        .unwrap();
        assert_eq!(oi.spot, 0.0);
        assert_eq!(oi.data[0].value, 15.0);
        assert_eq!((oi.data[0].call, oi.data[0].put), (10.0, 5.0));
        assert_eq!(gex.data[0].call, 0.0);
    }

    #[test]
    fn open_interest_band_centres_on_the_largest_strike() {
        let series = ExposureSeries {
            spot: 0.0,
            data: (0..60).map(|i| {
                let strike = 400.0 + i as f64 * 5.0;
                StrikeValue::new(strike, if strike == 550.0 { 9_000.0 } else { 100.0 })
            })
            .collect(),
        };
        assert_eq!(series.anchor(), Some(550.0));
        let rows = series.near_spot(0.05, 40);
        // 522.5..=577.5 in steps of 5
        assert_eq!(rows.first().map(|r| r.strike), Some(525.0));
        assert_eq!(rows.last().map(|r| r.strike), Some(575.0));

        let capped = series.near_spot(1.0, 5);
        assert_eq!(capped.iter().map(|r| r.strike).collect::<Vec<_>>(), vec![540.0, 545.0, 550.0, 555.0, 560.0]);
        assert!(ExposureSeries::default().near_spot(0.05, 40).is_empty());
    }

    #[test]
    fn zero_rows_count_as_a_sign_change() {
        let rows = vec![StrikeValue::new(95.0, 0.0), StrikeValue::new(100.0, 0.0), StrikeValue::new(105.0, 4.0)];
        assert_eq!(ExposureSeries::flip_strike(&rows), Some(105.0));
        let same = vec![StrikeValue::new(95.0, 0.0), StrikeValue::new(100.0, 0.0)];
        assert_eq!(ExposureSeries::flip_strike(&same), None);
    }

    #[test]
    fn exposure_filters_near_spot_and_finds_flip() {
        let series = ExposureSeries {
            spot: 100.0,
            data: vec![
                StrikeValue::new(90.0, -5.0),
                StrikeValue::new(96.0, -1.0),
                StrikeValue::new(100.0, 2.0),
                StrikeValue::new(104.0, 3.0),
                StrikeValue::new(110.0, 9.0),
            ],
        };
        let rows = series.near_spot(0.05, 40);
        assert_eq!(rows.len(), 3);
        assert_eq!(ExposureSeries::net(&rows), 4.0);
        assert_eq!(ExposureSeries::flip_strike(&rows), Some(100.0));
    }

    #[test]
    fn news_accepts_camel_case_timestamp() {
        let item: NewsItem = serde_json::from_str(
            r#"{"id": "1", "headline": "h", "createdAt": "2024-03-01T14:35:00Z"}"#,
        )
        .unwrap();
        assert!(item.created().is_some());
    }
}
