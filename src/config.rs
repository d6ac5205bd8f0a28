// config.rs
use anyhow::Context;
use chrono::TimeDelta;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub port: u16,
    // Shared with the audit service; never sent over the wire.
    pub audit_integrity_secret: String,
    pub audit_service_url: Option<String>,
    pub job_service_url: Option<String>,
    pub upstream_timeout_ms: u64,
    pub review_submit_max_attempts: u32,
    pub reputation_cache_ttl: TimeDelta,
    // None keeps one-sided reviews pending forever.
    pub forced_release_after: Option<TimeDelta>,
    pub forced_release_interval_secs: u64,
    pub log_level: String,
    pub redis_url: Option<String>,
}

pub const MAX_FORCED_RELEASE_DAYS: i64 = 3650;
pub const MAX_REPUTATION_CACHE_TTL_SECS: i64 = 7 * 24 * 60 * 60;

fn optional_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parsed_var<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_var(key) {
        Some(value) => value
            .trim()
            .parse::<T>()
            .with_context(|| format!("{} must be a valid number, got {:?}", key, value)),
        None => Ok(default),
    }
}

pub fn forced_release_window(days: i64) -> anyhow::Result<TimeDelta> {
    anyhow::ensure!(
        (1..=MAX_FORCED_RELEASE_DAYS).contains(&days),
        "REVIEW_FORCED_RELEASE_DAYS must be between 1 and {}, got {}",
        MAX_FORCED_RELEASE_DAYS,
        days
    );
    TimeDelta::try_days(days).context("REVIEW_FORCED_RELEASE_DAYS is out of range")
}

pub fn reputation_cache_ttl(secs: i64) -> anyhow::Result<TimeDelta> {
    anyhow::ensure!(
        (0..=MAX_REPUTATION_CACHE_TTL_SECS).contains(&secs),
        "REPUTATION_CACHE_TTL_SECS must be between 0 and {}, got {}",
        MAX_REPUTATION_CACHE_TTL_SECS,
        secs
    );
    TimeDelta::try_seconds(secs).context("REPUTATION_CACHE_TTL_SECS is out of range")
}

impl Config {
    pub fn init() -> anyhow::Result<Config> {
        let jwt_secret = optional_var("JWT_SECRET_KEY").context("JWT_SECRET_KEY must be set")?;
        let audit_integrity_secret =
            optional_var("AUDIT_INTEGRITY_SECRET").context("AUDIT_INTEGRITY_SECRET must be set")?;

        let forced_release_after = match optional_var("REVIEW_FORCED_RELEASE_DAYS") {
            Some(days) => {
                let days = days
                    .trim()
                    .parse::<i64>()
                    .context("REVIEW_FORCED_RELEASE_DAYS must be a whole number of days")?;
                Some(forced_release_window(days)?)
            }
            None => None,
        };
        let reputation_cache_ttl = reputation_cache_ttl(parsed_var("REPUTATION_CACHE_TTL_SECS", 300)?)?;

        Ok(Config {
            database_url: optional_var("DATABASE_URL"),
            jwt_secret,
            port: parsed_var("PORT", 8000)?,
            audit_integrity_secret,
            audit_service_url: optional_var("AUDIT_SERVICE_URL"),
            job_service_url: optional_var("JOB_SERVICE_URL"),
            upstream_timeout_ms: parsed_var("UPSTREAM_TIMEOUT_MS", 3000)?,
            review_submit_max_attempts: parsed_var("REVIEW_SUBMIT_MAX_ATTEMPTS", 3)?,
            reputation_cache_ttl,
            forced_release_after,
            forced_release_interval_secs: parsed_var("REVIEW_FORCED_RELEASE_INTERVAL_SECS", 3600)?,
            log_level: optional_var("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            redis_url: optional_var("REDIS_URL"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forced_release_window_rejects_values_chrono_cannot_hold() {
        assert!(forced_release_window(i64::MAX).is_err());
        assert!(forced_release_window(MAX_FORCED_RELEASE_DAYS + 1).is_err());
        assert!(forced_release_window(0).is_err());
        assert!(forced_release_window(-3).is_err());
        assert_eq!(forced_release_window(14).unwrap(), TimeDelta::days(14));
    }

    #[test]
    fn cache_ttl_must_be_non_negative_and_bounded() {
        assert!(reputation_cache_ttl(-1).is_err());
        assert!(reputation_cache_ttl(i64::MAX).is_err());
        assert_eq!(reputation_cache_ttl(0).unwrap(), TimeDelta::zero());
        assert_eq!(reputation_cache_ttl(300).unwrap(), TimeDelta::seconds(300));
    }
}
