//! Runtime configuration loaded from environment variables.

use std::ops::RangeInclusive;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::warn;

/// Accepted values of `AUDIT_ACTIVITY_DAYS`
const ACTIVITY_DAYS_RANGE: RangeInclusive<i64> = 1..=36_500;

/// Defaults and bounds applied by the audit trail
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditSettings {
    /// Module tag written on entries that do not set one
    pub default_module: String,
    /// Default number of entries returned by `history_for`
    pub history_limit: i64,
    /// Default number of entries returned by `activity_for`
    pub activity_limit: i64,
    /// Default look-back window of `activity_for`, in days
    pub activity_days: i64,
    /// Hard cap on every query limit
    pub max_query_limit: i64,
}

impl Default for AuditSettings {
    fn default() -> Self {
        Self {
            default_module: "quotes".to_string(),
            history_limit: 50,
            activity_limit: 100,
            activity_days: 30,
            max_query_limit: 1000,
        }
    }
}

impl AuditSettings {
    /// Clamp a caller-supplied limit into `1..=max_query_limit`.
    pub fn clamp_limit(&self, requested: Option<i64>, default: i64) -> i64 {
        requested.unwrap_or(default).clamp(1, self.max_query_limit.max(1))
    }

    /// Start of the default `activity_for` window ending at `now`.
    ///
    /// A look-back too large for the calendar reaches back to the earliest
    /// representable instant.
    pub fn activity_window_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        chrono::Duration::try_days(self.activity_days)
            .and_then(|days| now.checked_sub_signed(days))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

/// Core configuration.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// Postgres connection string; only binaries require it.
    pub database_url: Option<String>,
    /// Pool size (default: `5`).
    pub database_max_connections: u32,
    /// TTL of cached content-type ids (default: 30 minutes).
    pub content_type_cache_ttl: Duration,
    pub audit: AuditSettings,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            database_max_connections: 5,
            content_type_cache_ttl: Duration::from_secs(30 * 60),
            audit: AuditSettings::default(),
        }
    }
}

impl CoreConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                       | Default  |
    /// |-------------------------------|----------|
    /// | `DATABASE_URL`                | none     |
    /// | `DATABASE_MAX_CONNECTIONS`    | `5`      |
    /// | `AUDIT_DEFAULT_MODULE`        | `quotes` |
    /// | `AUDIT_HISTORY_LIMIT`         | `50`     |
    /// | `AUDIT_ACTIVITY_LIMIT`        | `100`    |
    /// | `AUDIT_ACTIVITY_DAYS`         | `30`     |
    /// | `AUDIT_MAX_QUERY_LIMIT`       | `1000`   |
    /// | `CONTENT_TYPE_CACHE_TTL_SECS` | `1800`   |
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from any key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let audit_defaults = AuditSettings::default();

        let database_url = lookup("DATABASE_URL").filter(|v| !v.trim().is_empty());
        let default_module = lookup("AUDIT_DEFAULT_MODULE")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or(audit_defaults.default_module);

        Self {
            database_url,
            database_max_connections: parse_or(
                &lookup,
                "DATABASE_MAX_CONNECTIONS",
                defaults.database_max_connections,
            ),
            content_type_cache_ttl: Duration::from_secs(parse_or(
                &lookup,
                "CONTENT_TYPE_CACHE_TTL_SECS",
                defaults.content_type_cache_ttl.as_secs(),
            )),
            audit: AuditSettings {
                default_module,
                history_limit: parse_or(&lookup, "AUDIT_HISTORY_LIMIT", audit_defaults.history_limit),
                activity_limit: parse_or(&lookup, "AUDIT_ACTIVITY_LIMIT", audit_defaults.activity_limit),
                activity_days: parse_in_range(
                    &lookup,
                    "AUDIT_ACTIVITY_DAYS",
                    ACTIVITY_DAYS_RANGE,
                    audit_defaults.activity_days,
                ),
                max_query_limit: parse_or(
                    &lookup,
                    "AUDIT_MAX_QUERY_LIMIT",
                    audit_defaults.max_query_limit,
                ),
            },
        }
    }
}

/// Parse a numeric variable, falling back to `default` when unset or invalid.
fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + Copy + std::fmt::Display,
{
    match lookup(key) {
        None => default,
        Some(raw) => match raw.trim().parse::<T>() {
            Ok(value) => value,
            Err(_) => {
                warn!(key, value = %raw, default = %default, "Invalid value, using default");
                default
            }
        },
    }
}

/// Like [`parse_or`], but values outside `range` also fall back to `default`.
fn parse_in_range<F>(lookup: &F, key: &str, range: RangeInclusive<i64>, default: i64) -> i64
where
    F: Fn(&str) -> Option<String>,
{
    let value = parse_or(lookup, key, default);
    if range.contains(&value) {
        value
    } else {
        warn!(
            key,
            value,
            min = *range.start(),
            max = *range.end(),
            default,
            "Value out of range, using default"
        );
        default
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = CoreConfig::from_lookup(lookup(&[]));
        assert!(config.database_url.is_none());
        assert_eq!(config.database_max_connections, 5);
        assert_eq!(config.content_type_cache_ttl, Duration::from_secs(1800));
        assert_eq!(config.audit, AuditSettings::default());
    }

    #[test]
    fn test_overrides_and_invalid_fallback() {
        let config = CoreConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/devis"),
            ("DATABASE_MAX_CONNECTIONS", "12"),
            ("AUDIT_DEFAULT_MODULE", "invoices"),
            ("AUDIT_HISTORY_LIMIT", "not-a-number"),
            ("AUDIT_MAX_QUERY_LIMIT", "200"),
        ]));
        assert_eq!(config.database_url.as_deref(), Some("postgres://localhost/devis"));
        assert_eq!(config.database_max_connections, 12);
        assert_eq!(config.audit.default_module, "invoices");
        assert_eq!(config.audit.history_limit, 50);
        assert_eq!(config.audit.max_query_limit, 200);
    }

    #[test]
    fn test_activity_days_out_of_range_falls_back() {
        for raw in ["10000000000", "0", "-5", "36501"] {
            let config = CoreConfig::from_lookup(lookup(&[("AUDIT_ACTIVITY_DAYS", raw)]));
            assert_eq!(config.audit.activity_days, 30, "AUDIT_ACTIVITY_DAYS={}", raw);
        }
        let config = CoreConfig::from_lookup(lookup(&[("AUDIT_ACTIVITY_DAYS", "365")]));
        assert_eq!(config.audit.activity_days, 365);
    }

    #[test]
    fn test_activity_window_start_never_panics() {
        let now = Utc::now();
        let settings = AuditSettings::default();
        assert_eq!(settings.activity_window_start(now), now - chrono::Duration::days(30));

        let huge = AuditSettings {
            activity_days: 10_000_000_000,
            ..AuditSettings::default()
        };
        assert_eq!(huge.activity_window_start(now), DateTime::<Utc>::MIN_UTC);

        let extreme = AuditSettings {
            activity_days: i64::MAX,
            ..AuditSettings::default()
        };
        assert_eq!(extreme.activity_window_start(now), DateTime::<Utc>::MIN_UTC);
    }

    #[test]
    fn test_clamp_limit() {
        let settings = AuditSettings::default();
        assert_eq!(settings.clamp_limit(None, 50), 50);
        assert_eq!(settings.clamp_limit(Some(5000), 50), 1000);
        assert_eq!(settings.clamp_limit(Some(0), 50), 1);
    }
}
