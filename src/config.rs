use anyhow::{Result, anyhow, bail};
use std::env;
use std::time::Duration;

use crate::onboarding::retry::RetryPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Surreal,
    Memory,
}

impl std::str::FromStr for StoreKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "surreal" | "surrealdb" => Ok(StoreKind::Surreal),
            "memory" | "mem" => Ok(StoreKind::Memory),
            other => bail!("unknown store kind {other:?} (expected surreal or memory)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub store: StoreKind,
    pub db_url: String,
    pub db_namespace: String,
    pub db_name: String,
    pub db_user: String,
    pub db_pass: String,
    pub http_addr: String,
    pub bearer_token: Option<String>,
    pub allow_token_in_url: bool,
    /// Header the auth gateway forwards the signed-in user id in.
    pub identity_header: String,
    pub intent_ttl: Duration,
    pub search_limit: usize,
    pub verify: RetryPolicy,
    pub request_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store: StoreKind::Surreal,
            db_url: "ws://127.0.0.1:8000".to_string(),
            db_namespace: "recruiting".to_string(),
            db_name: "onboarding".to_string(),
            db_user: "root".to_string(),
            db_pass: "root".to_string(),
            http_addr: "127.0.0.1:8790".to_string(),
            bearer_token: None,
            allow_token_in_url: false,
            identity_header: "x-user-id".to_string(),
            intent_ttl: Duration::from_secs(30 * 60),
            search_limit: 10,
            verify: RetryPolicy::default(),
            request_timeout: Duration::from_secs(15),
        }
    }
}

fn parse_var<T>(key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| anyhow!("invalid {key}={raw:?}: {e}")),
        Err(_) => Ok(None),
    }
}

fn flag(raw: &str) -> bool {
    raw != "0" && !raw.eq_ignore_ascii_case("false")
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        let store = parse_var::<StoreKind>("ONBOARD_STORE")?.unwrap_or(defaults.store);
        let db_url = env::var("ONBOARD_DB_URL").unwrap_or(defaults.db_url);
        let db_namespace = env::var("ONBOARD_DB_NS").unwrap_or(defaults.db_namespace);
        let db_name = env::var("ONBOARD_DB_NAME").unwrap_or(defaults.db_name);
        let db_user = env::var("ONBOARD_DB_USER").unwrap_or(defaults.db_user);
        let db_pass = env::var("ONBOARD_DB_PASS").unwrap_or(defaults.db_pass);
        let http_addr = env::var("ONBOARD_HTTP_ADDR").unwrap_or(defaults.http_addr);

        let bearer_token = env::var("ONBOARD_BEARER_TOKEN").ok().or_else(|| {
            let home = env::var("HOME").ok()?;
            std::fs::read_to_string(format!("{home}/.onboard_token"))
                .ok()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        });
        let allow_token_in_url = env::var("ONBOARD_ALLOW_TOKEN_IN_URL")
            .map(|v| flag(&v))
            .unwrap_or(defaults.allow_token_in_url);
        let identity_header = env::var("ONBOARD_IDENTITY_HEADER")
            .map(|h| h.trim().to_ascii_lowercase())
            .unwrap_or(defaults.identity_header);

        let intent_ttl = parse_var::<u64>("ONBOARD_INTENT_TTL_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.intent_ttl);
        let search_limit = parse_var::<usize>("ONBOARD_SEARCH_LIMIT")?
            .unwrap_or(defaults.search_limit)
            .clamp(1, 50);
        let verify = RetryPolicy {
            attempts: parse_var::<u32>("ONBOARD_VERIFY_ATTEMPTS")?
                .unwrap_or(defaults.verify.attempts)
                .clamp(1, 10),
            base_delay: parse_var::<u64>("ONBOARD_VERIFY_BASE_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.verify.base_delay),
            max_delay: defaults.verify.max_delay,
        };
        let request_timeout = parse_var::<u64>("ONBOARD_REQUEST_TIMEOUT_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.request_timeout);

        Ok(Self {
            store,
            db_url,
            db_namespace,
            db_name,
            db_user,
            db_pass,
            http_addr,
            bearer_token,
            allow_token_in_url,
            identity_header,
            intent_ttl,
            search_limit,
            verify,
            request_timeout,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_kind_parses_loosely() {
        assert_eq!("Memory".parse::<StoreKind>().unwrap(), StoreKind::Memory);
        assert_eq!(" surrealdb ".parse::<StoreKind>().unwrap(), StoreKind::Surreal);
        assert!("postgres".parse::<StoreKind>().is_err());
    }

    #[test]
    fn flags_accept_zero_and_false_as_off() {
        assert!(!flag("0"));
        assert!(!flag("FALSE"));
        assert!(flag("1"));
        assert!(flag("yes"));
    }

    #[test]
    fn defaults_are_local_and_conservative() {
        let cfg = Config::default();
        assert_eq!(cfg.identity_header, "x-user-id");
        assert!(!cfg.allow_token_in_url);
        assert_eq!(cfg.search_limit, 10);
        assert_eq!(cfg.verify.attempts, 3);
    }
}
