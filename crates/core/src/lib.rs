pub mod analytics;
pub mod cache;
pub mod dashboard;
pub mod domain;
pub mod repo;
pub mod storage;
pub mod time;

pub mod config {
    use anyhow::Context;
    use std::time::Duration;

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub database_url: Option<String>,
        pub sentry_dsn: Option<String>,
        pub cache_ttl: Duration,
        pub cache_max_entries: usize,
        pub single_flight: bool,
        /// Upper bound on one dashboard request; `None` disables it.
        pub deadline: Option<Duration>,
        pub utc_offset_hours: i32,
        pub port: u16,
    }

    impl Default for Settings {
        fn default() -> Self {
            Self {
                database_url: None,
                sentry_dsn: None,
                cache_ttl: Duration::from_secs(300),
                cache_max_entries: 10_000,
                single_flight: false,
                deadline: Some(Duration::from_millis(10_000)),
                utc_offset_hours: 0,
                port: 3000,
            }
        }
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            Self::from_lookup(|key| std::env::var(key).ok())
        }

        pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
            let defaults = Self::default();
            let deadline_ms: u64 = parse_or(&lookup, "DASHBOARD_DEADLINE_MS", 10_000)?;
            Ok(Self {
                database_url: lookup("DATABASE_URL"),
                sentry_dsn: lookup("SENTRY_DSN"),
                cache_ttl: Duration::from_secs(parse_or(&lookup, "DASHBOARD_CACHE_TTL_SECS", 300)?),
                cache_max_entries: parse_or(
                    &lookup,
                    "DASHBOARD_CACHE_MAX_ENTRIES",
                    defaults.cache_max_entries,
                )?,
                single_flight: parse_or(&lookup, "DASHBOARD_SINGLE_FLIGHT", defaults.single_flight)?,
                deadline: (deadline_ms > 0).then(|| Duration::from_millis(deadline_ms)),
                utc_offset_hours: parse_or(&lookup, "DASHBOARD_UTC_OFFSET_HOURS", defaults.utc_offset_hours)?,
                port: parse_or(&lookup, "PORT", defaults.port)?,
            })
        }

        pub fn require_database_url(&self) -> anyhow::Result<&str> {
            self.database_url
                .as_deref()
                .context("DATABASE_URL is required")
        }
    }

    fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
    where
        T: std::str::FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        match lookup(key) {
            Some(raw) if !raw.trim().is_empty() => raw
                .trim()
                .parse()
                .with_context(|| format!("invalid {key}: {raw}")),
            _ => Ok(default),
        }
    }

}
