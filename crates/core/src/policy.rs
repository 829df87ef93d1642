//! Freshness policy table.
//!
//! Maps a request category to how long a cached API response stays valid.
//! The table is built once from configuration and never mutated.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::PolicyConfig;

/// Logical category of a dynamic API request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Weather,
    Events,
    Traffic,
    Default,
}

impl Category {
    /// Infer the category of an API request from its host and path.
    ///
    /// Checked in order: weather (host or path), events (path), traffic
    /// (path). The first match wins.
    pub fn infer(url: &Url) -> Self {
        let host = url.host_str().unwrap_or("").to_ascii_lowercase();
        let path = url.path().to_ascii_lowercase();

        if host.contains("weather") || path.contains("weather") {
            Category::Weather
        } else if path.contains("event") {
            Category::Events
        } else if path.contains("traffic") {
            Category::Traffic
        } else {
            Category::Default
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Weather => "weather",
            Category::Events => "events",
            Category::Traffic => "traffic",
            Category::Default => "default",
        }
    }
}

/// Declared retrieval strategy for a category.
///
/// Informational only: every dynamic API request is served network-first
/// whatever its category declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyName {
    CacheFirst,
    NetworkFirst,
}

/// One row of the policy table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicyEntry {
    pub category: Category,
    pub ttl: Duration,
    pub strategy: StrategyName,
}

impl PolicyEntry {
    /// TTL in whole milliseconds, the unit stored next to cache entries.
    pub fn ttl_ms(&self) -> i64 {
        i64::try_from(self.ttl.as_millis()).unwrap_or(i64::MAX)
    }
}

/// Static category → (ttl, strategy) table.
#[derive(Debug, Clone)]
pub struct PolicyTable {
    weather: PolicyEntry,
    events: PolicyEntry,
    traffic: PolicyEntry,
    default: PolicyEntry,
}

impl PolicyTable {
    pub fn from_config(config: &PolicyConfig) -> Self {
        let entry = |category, ttl_ms, strategy| PolicyEntry { category, ttl: Duration::from_millis(ttl_ms), strategy };
        Self {
            weather: entry(Category::Weather, config.weather_ttl_ms, StrategyName::NetworkFirst),
            events: entry(Category::Events, config.events_ttl_ms, StrategyName::CacheFirst),
            traffic: entry(Category::Traffic, config.traffic_ttl_ms, StrategyName::NetworkFirst),
            default: entry(Category::Default, config.default_ttl_ms, StrategyName::NetworkFirst),
        }
    }

    /// Look up the entry for a category. Never fails.
    pub fn lookup(&self, category: Category) -> &PolicyEntry {
        match category {
            Category::Weather => &self.weather,
            Category::Events => &self.events,
            Category::Traffic => &self.traffic,
            Category::Default => &self.default,
        }
    }

    /// Infer the category of `url` and look it up.
    pub fn resolve(&self, url: &Url) -> &PolicyEntry {
        self.lookup(Category::infer(url))
    }
}

impl Default for PolicyTable {
    fn default() -> Self {
        Self::from_config(&PolicyConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_default_table() {
        let table = PolicyTable::default();
        assert_eq!(table.lookup(Category::Weather).ttl, Duration::from_secs(10 * 60));
        assert_eq!(table.lookup(Category::Events).ttl, Duration::from_secs(60 * 60));
        assert_eq!(table.lookup(Category::Traffic).ttl, Duration::from_secs(2 * 60));
        assert_eq!(table.lookup(Category::Default).ttl, Duration::from_secs(5 * 60));
        assert_eq!(table.lookup(Category::Default).ttl_ms(), 300_000);
    }

    #[test]
    fn test_infer_by_host_and_path() {
        assert_eq!(Category::infer(&url("https://api.openweathermap.org/data/2.5/forecast")), Category::Weather);
        assert_eq!(Category::infer(&url("https://trip.example/api/weather?city=Yokohama")), Category::Weather);
        assert_eq!(Category::infer(&url("https://trip.example/api/events/today")), Category::Events);
        assert_eq!(Category::infer(&url("https://trip.example/api/traffic")), Category::Traffic);
        assert_eq!(Category::infer(&url("https://trip.example/api/hotels")), Category::Default);
    }

    #[test]
    fn test_weather_takes_priority_over_events() {
        let url = url("https://trip.example/api/events/weather");
        assert_eq!(Category::infer(&url), Category::Weather);

        let table = PolicyTable::default();
        assert_eq!(table.resolve(&url).category, Category::Weather);
    }

    #[test]
    fn test_infer_ignores_case() {
        assert_eq!(Category::infer(&url("https://trip.example/API/Traffic/Live")), Category::Traffic);
    }

    #[test]
    fn test_config_overrides_ttl() {
        let config = PolicyConfig { traffic_ttl_ms: 30_000, ..Default::default() };
        let table = PolicyTable::from_config(&config);
        assert_eq!(table.lookup(Category::Traffic).ttl_ms(), 30_000);
        assert_eq!(table.lookup(Category::Traffic).strategy, StrategyName::NetworkFirst);
    }
}
