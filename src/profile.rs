//! Price-bucketed volume histogram with point of control

use crate::config::VOLUME_PROFILE_BUCKETS;
use crate::data::Bar;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProfileBucket {
    /// Midpoint of the bucket's price range, rounded to cents.
    pub price: f64,
    pub buy_volume: f64,
    pub sell_volume: f64,
}

impl ProfileBucket {
    pub fn total(&self) -> f64 {
        self.buy_volume + self.sell_volume
    }

    /// Share of the bucket traded on up bars, 0.0..=1.0.
    pub fn buy_ratio(&self) -> f64 {
        let total = self.total();
        if total > 0.0 { self.buy_volume / total } else { 0.0 }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct VolumeProfile {
    /// Highest price first.
    pub buckets: Vec<ProfileBucket>,
    /// Index into `buckets` of the point of control.
    pub poc: Option<usize>,
}

impl VolumeProfile {
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn poc_bucket(&self) -> Option<&ProfileBucket> {
        self.poc.and_then(|i| self.buckets.get(i))
    }

    pub fn total_volume(&self) -> f64 {
        self.buckets.iter().map(ProfileBucket::total).sum()
    }

    pub fn max_total(&self) -> f64 {
        self.poc_bucket().map(ProfileBucket::total).unwrap_or(0.0)
    }
}

pub fn build_profile(bars: &[Bar]) -> VolumeProfile {
    build_profile_with(bars, VOLUME_PROFILE_BUCKETS)
}

/// Spreads each bar's volume evenly over the buckets its low..high range
/// touches, as buy volume for up bars and sell volume otherwise. A bar with a
/// missing volume still widens the range but adds nothing. Returns an empty
/// profile when the bars span no price range.
pub fn build_profile_with(bars: &[Bar], bucket_count: usize) -> VolumeProfile {
    let usable: Vec<&Bar> = bars
        .iter()
        .filter(|b| b.low.is_finite() && b.high.is_finite())
        .collect();
    if usable.is_empty() || bucket_count == 0 {
        return VolumeProfile::default();
    }
    let lo = usable.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
    let hi = usable.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
    if hi <= lo {
        return VolumeProfile::default();
    }

    let step = (hi - lo) / bucket_count as f64;
    let last = bucket_count - 1;
    let mut buy = vec![0.0; bucket_count];
    let mut sell = vec![0.0; bucket_count];

    for bar in usable {
        let first = (((bar.low - lo) / step).floor().max(0.0) as usize).min(last);
        let end = (((bar.high - lo) / step).floor().max(0.0) as usize).min(last);
        let (first, end) = (first.min(end), first.max(end));
        let volume = if bar.volume.is_finite() { bar.volume } else { 0.0 };
        let share = volume / (end - first + 1) as f64;
        let side = if bar.is_bullish() { &mut buy } else { &mut sell };
        for slot in &mut side[first..=end] {
            *slot += share;
        }
    }

    let buckets: Vec<ProfileBucket> = (0..bucket_count)
        .rev()
        .map(|i| ProfileBucket {
            price: round_cents(lo + (i as f64 + 0.5) * step),
            buy_volume: buy[i],
            sell_volume: sell[i],
        })
        .collect();

    // strict comparison keeps the first (highest priced) bucket on ties
    let mut poc: Option<usize> = None;
    for (i, bucket) in buckets.iter().enumerate() {
        if poc.is_none_or(|p| bucket.total() > buckets[p].total()) {
            poc = Some(i);
        }
    }

    VolumeProfile { buckets, poc }
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn volume_is_conserved() {
        let bars = vec![
            Bar::new(0, 100.0, 104.0, 100.0, 103.0, 400.0),
            Bar::new(60, 103.0, 110.0, 102.5, 101.0, 350.0),
            Bar::new(120, 101.0, 106.0, 100.5, 105.0, 250.0),
        ];
        let profile = build_profile(&bars);
        assert_eq!(profile.buckets.len(), VOLUME_PROFILE_BUCKETS);
        assert!((profile.total_volume() - 1000.0).abs() < 1e-6);
        let buy: f64 = profile.buckets.iter().map(|b| b.buy_volume).sum();
        assert!((buy - 650.0).abs() < 1e-6);
    }

    #[test]
    fn bar_without_volume_still_sets_the_range() {
        let bars = vec![Bar::new(0, 100.0, 104.0, 100.0, 103.0, 400.0), Bar::new(60, 104.0, 120.0, 96.0, 110.0, f64::NAN)];
        let profile = build_profile_with(&bars, 24);
        assert_eq!(profile.buckets.first().map(|b| b.price), Some(119.5));
        assert_eq!(profile.buckets.last().map(|b| b.price), Some(96.5));
        assert!((profile.total_volume() - 400.0).abs() < 1e-9);
    }

    #[test]
    fn flat_or_missing_input_is_empty() {
        let flat = vec![Bar::new(0, 50.0, 50.0, 50.0, 50.0, 10.0), Bar::new(60, 50.0, 50.0, 50.0, 50.0, 5.0)];
        assert!(build_profile(&flat).is_empty());
        assert!(build_profile(&[]).is_empty());
        assert_eq!(build_profile(&flat).poc, None);
    }

    #[test]
    fn buckets_descend_with_midpoint_prices() {
        let bars = vec![Bar::new(0, 100.0, 110.0, 100.0, 100.0, 40.0)];
        let profile = build_profile(&bars);
        assert_eq!(profile.buckets.first().unwrap().price, 109.88);
        assert_eq!(profile.buckets.last().unwrap().price, 100.13);
        assert!(profile.buckets.windows(2).all(|w| w[0].price > w[1].price));
        // one up bar spread over all 40 buckets
        assert!(profile.buckets.iter().all(|b| (b.buy_volume - 1.0).abs() < 1e-9 && b.sell_volume == 0.0));
        // uniform totals: point of control is the top bucket
        assert_eq!(profile.poc, Some(0));
    }

    #[test]
    fn point_of_control_tracks_heaviest_bucket() {
        let bars = vec![
            Bar::new(0, 100.0, 110.0, 100.0, 109.0, 100.0),
            Bar::new(60, 102.0, 102.2, 101.9, 101.95, 500.0),
        ];
        let profile = build_profile(&bars);
        let poc = profile.poc_bucket().unwrap();
        assert!(poc.price > 101.5 && poc.price < 102.5, "poc at {}", poc.price);
        assert!(poc.sell_volume > 0.0);
        assert_eq!(profile.max_total(), poc.total());
    }

    #[test]
    fn top_of_range_lands_in_last_bucket() {
        let bars = vec![
            Bar::new(0, 100.0, 100.0, 100.0, 100.0, 10.0),
            Bar::new(60, 110.0, 110.0, 110.0, 110.0, 30.0),
        ];
        let profile = build_profile(&bars);
        assert_eq!(profile.buckets[0].buy_volume, 30.0);
        assert_eq!(profile.buckets[VOLUME_PROFILE_BUCKETS - 1].buy_volume, 10.0);
        assert_eq!(profile.poc, Some(0));
    }
}
