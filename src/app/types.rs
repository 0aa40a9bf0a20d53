//! Type definitions for the application

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};

/// What the next keystroke is interpreted as.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum InputMode {
    #[default]
    Normal,
    /// Widget catalogue is open with the given row selected.
    Catalogue { selected: usize },
    Prompt { kind: PromptKind, buffer: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    RenameTab,
    WidgetSymbol,
    GlobalSymbols,
    ChatMessage,
}

impl PromptKind {
    pub fn title(self) -> &'static str {
        match self {
            Self::RenameTab => "Rename tab",
            Self::WidgetSymbol => "Widget symbol",
            Self::GlobalSymbols => "Tab symbol overrides (comma separated, empty clears)",
            Self::ChatMessage => "Ask the assistant",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketStatus {
    Open,
    Closed,
}

impl MarketStatus {
    pub fn label(self) -> &'static str {
        match self {
            Self::Open => "Market Open",
            Self::Closed => "Market Closed",
        }
    }
}

/// US equities regular session, 9:30 to 16:00 New York time on weekdays.
/// Holidays are not modeled.
pub fn market_status(now: DateTime<Utc>) -> MarketStatus {
    let local = now.naive_utc() + Duration::hours(new_york_offset_hours(now));
    let weekday = local.weekday();
    if matches!(weekday, Weekday::Sat | Weekday::Sun) {
        return MarketStatus::Closed;
    }
    let open = NaiveTime::from_hms_opt(9, 30, 0);
    let close = NaiveTime::from_hms_opt(16, 0, 0);
    match (open, close) {
        (Some(open), Some(close)) if local.time() >= open && local.time() < close => MarketStatus::Open,
        _ => MarketStatus::Closed,
    }
}

/// -4 during daylight saving (second Sunday of March 2:00 local until the
/// first Sunday of November 2:00 local), -5 otherwise.
fn new_york_offset_hours(now: DateTime<Utc>) -> i64 {
    let year = now.year();
    // 2:00 local expressed in UTC: 07:00 while still on EST, 06:00 while on EDT
    let starts = nth_sunday(year, 3, 2)
        .and_then(|d| d.and_hms_opt(7, 0, 0))
        .map(|t| Utc.from_utc_datetime(&t));
    let ends = nth_sunday(year, 11, 1)
        .and_then(|d| d.and_hms_opt(6, 0, 0))
        .map(|t| Utc.from_utc_datetime(&t));
    match (starts, ends) {
        (Some(starts), Some(ends)) if now >= starts && now < ends => -4,
        _ => -5,
    }
}

fn nth_sunday(year: i32, month: u32, n: u32) -> Option<NaiveDate> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let offset = (7 - first.weekday().num_days_from_sunday()) % 7;
    first.checked_add_days(chrono::Days::new((offset + 7 * (n - 1)) as u64))
}
