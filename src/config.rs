use std::time::Duration;

pub const DEFAULT_DATABASE_URL: &str = "host=localhost user=postgres dbname=rental";
pub const DEFAULT_ITEMS_TTL_SECS: u64 = 30;
pub const DEFAULT_TREE_TTL_SECS: u64 = 300;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// libpq-style connection string or `postgres://` URL.
    pub database_url: String,
    /// Freshness window of the flat item list. Item status changes often.
    pub items_ttl: Duration,
    /// Freshness window of the category tree. Shape changes rarely.
    pub tree_ttl: Duration,
    pub metrics_port: Option<u16>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.into(),
            items_ttl: Duration::from_secs(DEFAULT_ITEMS_TTL_SECS),
            tree_ttl: Duration::from_secs(DEFAULT_TREE_TTL_SECS),
            metrics_port: None,
        }
    }
}

impl Config {
    /// Read `GEARLIST_*` variables from the process environment.
    /// Unparseable values fall back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let secs = |key: &str, default: u64| {
            lookup(key)
                .and_then(|s| s.trim().parse::<u64>().ok())
                .unwrap_or(default)
        };
        Self {
            database_url: lookup("GEARLIST_DATABASE_URL")
                .unwrap_or_else(|| DEFAULT_DATABASE_URL.into()),
            items_ttl: Duration::from_secs(secs("GEARLIST_ITEMS_TTL_SECS", DEFAULT_ITEMS_TTL_SECS)),
            tree_ttl: Duration::from_secs(secs("GEARLIST_TREE_TTL_SECS", DEFAULT_TREE_TTL_SECS)),
            metrics_port: lookup("GEARLIST_METRICS_PORT").and_then(|s| s.trim().parse().ok()),
        }
    }
}
