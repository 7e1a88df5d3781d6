//! Environment configuration for the API binary.

use std::time::Duration;

use tracing::warn;

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_JWT_SECRET: &str = "dev-secret";
const DEFAULT_JOB_TICK_MS: u64 = 1000;
const DEFAULT_DEPENDENCY_TIMEOUT_MS: u64 = 5000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub bind_addr: String,
    pub jwt_secret: String,
    /// Base URL of the blueprint catalog service; the built-in catalog is
    /// used when unset.
    pub techdb_url: Option<String>,
    pub job_tick: Duration,
    pub dependency_timeout: Duration,
}

impl ApiConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bind_addr = var("BIND_ADDR").unwrap_or_else(|| {
            let port = positive_or(var("PORT"), "PORT", DEFAULT_PORT);
            format!("0.0.0.0:{port}")
        });

        let jwt_secret = var("JWT_SECRET").unwrap_or_else(|| {
            warn!("JWT_SECRET not set; using insecure dev default");
            DEFAULT_JWT_SECRET.to_string()
        });

        Self {
            bind_addr,
            jwt_secret,
            techdb_url: var("TECHDB_URL"),
            job_tick: Duration::from_millis(positive_or(
                var("JOB_TICK_MS"),
                "JOB_TICK_MS",
                DEFAULT_JOB_TICK_MS,
            )),
            dependency_timeout: Duration::from_millis(positive_or(
                var("DEPENDENCY_TIMEOUT_MS"),
                "DEPENDENCY_TIMEOUT_MS",
                DEFAULT_DEPENDENCY_TIMEOUT_MS,
            )),
        }
    }
}

/// Parse a positive number, falling back to `default` with a warning.
fn positive_or<T>(value: Option<String>, key: &str, default: T) -> T
where
    T: std::str::FromStr + PartialOrd + Default + Copy + std::fmt::Display,
{
    let Some(raw) = value else {
        return default;
    };
    match raw.parse::<T>() {
        Ok(v) if v > T::default() => v,
        _ => {
            warn!(key, value = %raw, default = %default, "invalid value; using default");
            default
        }
    }
}
