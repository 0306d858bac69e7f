use indexmap::IndexMap;

use crate::model::{Coord, Weather};

const INITIAL_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
pub(crate) struct CacheEntry {
    pub weather: Weather,
    /// Time of the latest user request for this city. Background refreshes leave it alone.
    pub last_access: i64,
}

/// City → weather map bounded by `limit`, evicting the least recently requested city.
///
/// Ties on `last_access` go to the entry inserted first.
#[derive(Debug)]
pub(crate) struct WeatherCache {
    entries: IndexMap<String, CacheEntry>,
    limit: usize,
}

impl WeatherCache {
    pub fn new(limit: usize) -> Self {
        Self { entries: IndexMap::with_capacity(limit.min(INITIAL_CAPACITY)), limit }
    }

    pub fn is_enabled(&self) -> bool {
        self.limit > 0
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Stamp `city` as requested at `now` and return its entry.
    pub fn touch(&mut self, city: &str, now: i64) -> Option<&mut CacheEntry> {
        let entry = self.entries.get_mut(city)?;
        entry.last_access = now;
        Some(entry)
    }

    /// Insert a new city, evicting the oldest one first if the cache is full.
    ///
    /// Returns the evicted city, if any. Does nothing when caching is disabled.
    pub fn insert(&mut self, city: &str, weather: Weather, now: i64) -> Option<String> {
        if !self.is_enabled() {
            return None;
        }

        let evicted = if self.entries.len() >= self.limit && !self.entries.contains_key(city) {
            self.evict_oldest()
        } else {
            None
        };

        self.entries.insert(city.to_string(), CacheEntry { weather, last_access: now });
        evicted
    }

    pub fn replace_weather(&mut self, city: &str, weather: Weather) {
        if let Some(entry) = self.entries.get_mut(city) {
            entry.weather = weather;
        }
    }

    /// City names with the coordinates needed to refresh them without re-resolving.
    pub fn refresh_targets(&self) -> Vec<(String, Coord)> {
        self.entries
            .iter()
            .map(|(city, entry)| (city.clone(), entry.weather.coord))
            .collect()
    }

    pub fn cities(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    fn evict_oldest(&mut self) -> Option<String> {
        let index = self
            .entries
            .values()
            .enumerate()
            .min_by_key(|(i, entry)| (entry.last_access, *i))
            .map(|(i, _)| i)?;

        self.entries.shift_remove_index(index).map(|(city, _)| city)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample_weather;

    #[test]
    fn evicts_least_recently_requested() {
        let mut cache = WeatherCache::new(2);

        assert_eq!(cache.insert("London", sample_weather("London", 995), 1000), None);
        assert_eq!(cache.insert("Karaganda", sample_weather("Karaganda", 998), 1001), None);
        assert!(cache.touch("London", 1002).is_some());

        let evicted = cache.insert("Norilsk", sample_weather("Norilsk", 993), 1003);

        assert_eq!(evicted.as_deref(), Some("Karaganda"));
        assert_eq!(cache.cities(), vec!["London".to_string(), "Norilsk".to_string()]);
    }

    #[test]
    fn ties_go_to_first_inserted() {
        let mut cache = WeatherCache::new(2);
        cache.insert("A", sample_weather("A", 0), 7);
        cache.insert("B", sample_weather("B", 0), 7);

        assert_eq!(cache.insert("C", sample_weather("C", 0), 8).as_deref(), Some("A"));
    }

    #[test]
    fn zero_limit_caches_nothing() {
        let mut cache = WeatherCache::new(0);

        assert!(!cache.is_enabled());
        assert_eq!(cache.insert("London", sample_weather("London", 1), 1), None);
        assert_eq!(cache.len(), 0);
        assert!(cache.touch("London", 2).is_none());
    }

    #[test]
    fn refresh_keeps_last_access() {
        let mut cache = WeatherCache::new(1);
        cache.insert("London", sample_weather("London", 100), 500);

        cache.replace_weather("London", sample_weather("London", 200));

        let entry = &cache.entries["London"];
        assert_eq!(entry.weather.dt, 200);
        assert_eq!(entry.last_access, 500);
    }
}
