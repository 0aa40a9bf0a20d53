use std::collections::BTreeMap;

use crate::data::Bar;

/// Bars keyed by open time.
#[derive(Debug, Clone, Default)]
pub struct BarCache {
    bars: BTreeMap<i64, Bar>,
}

impl BarCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace_all(&mut self, bars: impl IntoIterator<Item = Bar>) {
        self.bars = bars.into_iter().map(|b| (b.time, b)).collect();
    }

    /// Inserts bars that are new or whose prices moved. Returns exactly those,
    /// in time order.
    pub fn upsert(&mut self, bars: impl IntoIterator<Item = Bar>) -> Vec<Bar> {
        let mut changed: Vec<Bar> = Vec::new();
        for bar in bars {
            let differs = self.bars.get(&bar.time).is_none_or(|cached| cached.prices_differ(&bar));
            if differs {
                self.bars.insert(bar.time, bar);
                changed.push(bar);
            }
        }
        changed.sort_by_key(|b| b.time);
        changed
    }

    /// Keeps only the newest `limit` bars.
    pub fn retain_last(&mut self, limit: usize) {
        while self.bars.len() > limit {
            self.bars.pop_first();
        }
    }

    pub fn clear(&mut self) {
        self.bars.clear();
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn get(&self, time: i64) -> Option<&Bar> {
        self.bars.get(&time)
    }

    pub fn last(&self) -> Option<&Bar> {
        self.bars.values().next_back()
    }

    pub fn to_vec(&self) -> Vec<Bar> {
        self.bars.values().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(time: i64, close: f64) -> Bar {
        Bar::new(time, 100.0, 101.0, 99.0, close, 10.0)
    }

    #[test]
    fn upsert_reports_only_moves_and_new_keys() {
        let mut cache = BarCache::new();
        cache.replace_all([bar(1, 100.5), bar(2, 100.5)]);

        let mut volume_only = bar(1, 100.5);
        volume_only.volume = 99.0;
        let changed = cache.upsert([volume_only, bar(2, 100.7), bar(3, 100.0)]);

        assert_eq!(changed.iter().map(|b| b.time).collect::<Vec<_>>(), vec![2, 3]);
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.get(1).unwrap().volume, 10.0);
        assert_eq!(cache.last().unwrap().time, 3);
    }

    #[test]
    fn retain_last_drops_oldest() {
        let mut cache = BarCache::new();
        cache.replace_all((1..=5).map(|t| bar(t, 1.0)));
        cache.retain_last(3);
        assert_eq!(cache.to_vec().iter().map(|b| b.time).collect::<Vec<_>>(), vec![3, 4, 5]);
        cache.retain_last(10);
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn replace_all_discards_previous() {
        let mut cache = BarCache::new();
        cache.replace_all([bar(1, 1.0), bar(2, 1.0)]);
        cache.replace_all([bar(5, 1.0)]);
        assert_eq!(cache.to_vec(), vec![bar(5, 1.0)]);
    }
}
