//! Access to the public mutual fund NAV API.
//!
//! Two endpoints are used:
//! - listing: `GET {base}` returns `[{ "schemeCode": .., "schemeName": .. }, ..]`
//! - scheme: `GET {base}/{code}` returns `{ "meta": {..}, "data": [..] }`,
//!   with `data` newest-first
//!
//! Requests are retried sequentially with exponential backoff, so at most one
//! attempt per request is in flight.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::FetchError;
use crate::nav::SchemeHistory;

pub const DEFAULT_BASE_URL: &str = "https://api.mfapi.in/mf";

/// Anything that can GET a URL and hand back JSON.
#[async_trait]
pub trait JsonSource: Send + Sync {
    async fn get_json(&self, url: &str) -> Result<Value, FetchError>;
}

pub struct HttpSource {
    client: Client,
}

impl HttpSource {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("mfnav/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl JsonSource for HttpSource {
    async fn get_json(&self, url: &str) -> Result<Value, FetchError> {
        debug!(url, "GET");
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
            });
        }

        Ok(response.json::<Value>().await?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub attempts: u32,
    pub base_delay: Duration,
    /// Upper bound on the wall time of the whole request, attempts and
    /// backoff sleeps together.
    pub budget: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_secs(1),
            budget: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    /// Sleep after the failed attempt with zero-based index `retry`.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry);
        self.base_delay.saturating_mul(factor)
    }
}

/// GETs `url`, retrying transient failures with exponential backoff.
///
/// Terminal errors are returned as soon as they occur. Transient ones are
/// retried until `policy.attempts` is reached or the next sleep would
/// overrun `policy.budget`, then reported as [`FetchError::Exhausted`].
/// Each attempt is cut off when the budget runs out, so the call never
/// takes much longer than `policy.budget`.
pub async fn fetch_json<S>(source: &S, url: &str, policy: &RetryPolicy) -> Result<Value, FetchError>
where
    S: JsonSource + ?Sized,
{
    let max_attempts = policy.attempts.max(1);
    let started = Instant::now();
    let mut attempt = 0;

    loop {
        attempt += 1;
        let remaining = policy.budget.saturating_sub(started.elapsed());
        let outcome = match tokio::time::timeout(remaining, source.get_json(url)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(FetchError::Timeout {
                url: url.to_string(),
            }),
        };
        let error = match outcome {
            Ok(value) => {
                if attempt > 1 {
                    info!(url, attempt, "Fetch succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) => e,
        };

        if !error.is_retryable() {
            warn!(url, attempt, "Fetch failed: {error}");
            return Err(error);
        }

        let delay = policy.delay_for(attempt - 1);
        if attempt >= max_attempts || started.elapsed() + delay >= policy.budget {
            warn!(url, attempt, "Failed to fetch after multiple retries: {error}");
            return Err(FetchError::Exhausted {
                attempts: attempt,
                last: Box::new(error),
            });
        }

        warn!(url, attempt, ?delay, "Fetch failed, retrying: {error}");
        tokio::time::sleep(delay).await;
    }
}

/// One entry of the scheme listing.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemeListing {
    pub scheme_code: u64,
    pub scheme_name: String,
}

/// Case-insensitive substring search on scheme names. An empty term matches
/// every scheme.
pub fn search_schemes<'a>(schemes: &'a [SchemeListing], term: &str) -> Vec<&'a SchemeListing> {
    let needle = term.trim().to_lowercase();
    schemes
        .iter()
        .filter(|s| s.scheme_name.to_lowercase().contains(&needle))
        .collect()
}

pub struct MfApi<S = HttpSource> {
    source: S,
    base_url: String,
    policy: RetryPolicy,
}

impl MfApi<HttpSource> {
    pub fn from_config(config: &Config) -> Result<Self, FetchError> {
        Ok(MfApi::new(
            HttpSource::new(config.request_timeout())?,
            &config.api_base_url,
            config.retry_policy(),
        ))
    }
}

impl<S: JsonSource> MfApi<S> {
    pub fn new(source: S, base_url: &str, policy: RetryPolicy) -> Self {
        Self {
            source,
            base_url: base_url.trim_end_matches('/').to_string(),
            policy,
        }
    }

    pub fn scheme_url(&self, scheme_code: u64) -> String {
        format!("{}/{}", self.base_url, scheme_code)
    }

    /// Every scheme known upstream. Entries that do not carry a numeric code
    /// and a name are skipped.
    pub async fn list_schemes(&self) -> Result<Vec<SchemeListing>, FetchError> {
        let value = fetch_json(&self.source, &self.base_url, &self.policy).await?;
        let entries = value
            .as_array()
            .ok_or_else(|| FetchError::Decode("scheme listing is not an array".to_string()))?;

        let schemes: Vec<SchemeListing> = entries
            .iter()
            .filter_map(|entry| serde_json::from_value(entry.clone()).ok())
            .collect();

        if schemes.len() < entries.len() {
            debug!(
                dropped = entries.len() - schemes.len(),
                "Skipped malformed listing entries"
            );
        }
        Ok(schemes)
    }

    pub async fn scheme_history(&self, scheme_code: u64) -> Result<SchemeHistory, FetchError> {
        let url = self.scheme_url(scheme_code);
        let value = fetch_json(&self.source, &url, &self.policy).await?;
        if !value.is_object() {
            return Err(FetchError::Decode(format!(
                "scheme {scheme_code} payload is not an object"
            )));
        }
        Ok(SchemeHistory::from_json(&value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Replays canned responses and records requested URLs.
    struct ScriptedSource {
        responses: Mutex<VecDeque<Result<Value, FetchError>>>,
        requests: Mutex<Vec<String>>,
    }

    impl ScriptedSource {
        fn new(responses: Vec<Result<Value, FetchError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn requests(&self) -> Vec<String> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl JsonSource for ScriptedSource {
        async fn get_json(&self, url: &str) -> Result<Value, FetchError> {
            self.requests.lock().unwrap().push(url.to_string());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(FetchError::Network("script exhausted".to_string())))
        }
    }

    /// Fails every attempt after sleeping for `delay`.
    struct SlowSource {
        delay: Duration,
        calls: AtomicU32,
    }

    impl SlowSource {
        fn new(delay: Duration) -> Self {
            Self {
                delay,
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl JsonSource for SlowSource {
        async fn get_json(&self, _url: &str) -> Result<Value, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            Err(FetchError::Network("connection reset".to_string()))
        }
    }

    fn instant_policy(attempts: u32) -> RetryPolicy {
        RetryPolicy {
            attempts,
            base_delay: Duration::ZERO,
            budget: Duration::from_secs(1),
        }
    }

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
        assert!(policy.delay_for(0) + policy.delay_for(1) <= policy.budget);
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let source = ScriptedSource::new(vec![
            Err(FetchError::Status { status: 503 }),
            Err(FetchError::Network("connection reset".to_string())),
            Ok(json!({ "ok": true })),
        ]);

        let value = fetch_json(&source, "http://test/mf", &instant_policy(3)).await.unwrap();
        assert_eq!(value, json!({ "ok": true }));
        assert_eq!(source.requests().len(), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_attempts() {
        let source = ScriptedSource::new(vec![
            Err(FetchError::Status { status: 500 }),
            Err(FetchError::Status { status: 502 }),
            Err(FetchError::Status { status: 504 }),
            Ok(json!([])),
        ]);

        let err = fetch_json(&source, "http://test/mf", &instant_policy(3)).await.unwrap_err();
        match err {
            FetchError::Exhausted { attempts, last } => {
                assert_eq!(attempts, 3);
                assert!(matches!(*last, FetchError::Status { status: 504 }));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(source.requests().len(), 3);
    }

    #[tokio::test]
    async fn test_terminal_error_is_not_retried() {
        let source = ScriptedSource::new(vec![Err(FetchError::Status { status: 404 }), Ok(json!({}))]);

        let err = fetch_json(&source, "http://test/mf/1", &instant_policy(3)).await.unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 404 }));
        assert_eq!(source.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_budget_stops_before_sleeping_past_it() {
        let source = ScriptedSource::new(vec![Err(FetchError::Status { status: 503 }), Ok(json!({}))]);
        let policy = RetryPolicy {
            attempts: 5,
            base_delay: Duration::from_secs(30),
            budget: Duration::from_secs(8),
        };

        let err = fetch_json(&source, "http://test/mf", &policy).await.unwrap_err();
        assert!(matches!(err, FetchError::Exhausted { attempts: 1, .. }));
        assert_eq!(source.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_budget_counts_time_spent_in_attempts() {
        let source = SlowSource::new(Duration::from_millis(40));
        let policy = RetryPolicy {
            attempts: 10,
            base_delay: Duration::ZERO,
            budget: Duration::from_millis(100),
        };

        let started = std::time::Instant::now();
        let err = fetch_json(&source, "http://test/mf", &policy).await.unwrap_err();
        assert!(matches!(err, FetchError::Exhausted { .. }));
        let calls = source.calls.load(Ordering::SeqCst);
        assert!((2..10).contains(&calls), "made {calls} attempts");
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_hung_attempt_is_cut_off_at_budget() {
        let source = SlowSource::new(Duration::from_secs(60));
        let policy = RetryPolicy {
            attempts: 3,
            base_delay: Duration::ZERO,
            budget: Duration::from_millis(50),
        };

        let started = std::time::Instant::now();
        let err = fetch_json(&source, "http://test/mf", &policy).await.unwrap_err();
        match err {
            FetchError::Exhausted { attempts, last } => {
                assert_eq!(attempts, 1);
                assert!(matches!(*last, FetchError::Timeout { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_api_from_default_config() {
        let api = MfApi::from_config(&Config::default()).unwrap();
        assert_eq!(api.scheme_url(119551), format!("{DEFAULT_BASE_URL}/119551"));
    }

    #[tokio::test]
    async fn test_zero_attempts_still_tries_once() {
        let source = ScriptedSource::new(vec![Ok(json!([]))]);
        assert!(fetch_json(&source, "http://test/mf", &instant_policy(0)).await.is_ok());
    }

    #[tokio::test]
    async fn test_list_schemes_skips_malformed_entries() {
        let source = ScriptedSource::new(vec![Ok(json!([
            { "schemeCode": 100027, "schemeName": "Grindlays Super Saver Income Fund" },
            { "schemeCode": "oops", "schemeName": "Broken" },
            { "schemeCode": 119551, "schemeName": "Aditya Birla Sun Life Banking & PSU Debt Fund", "isinGrowth": "INF209KA12Z1" }
        ]))]);
        let api = MfApi::new(source, "http://test/mf/", instant_policy(1));

        let schemes = api.list_schemes().await.unwrap();
        assert_eq!(schemes.len(), 2);
        assert_eq!(schemes[1].scheme_code, 119551);
        assert_eq!(api.source.requests(), vec!["http://test/mf".to_string()]);
    }

    #[tokio::test]
    async fn test_list_schemes_rejects_non_array() {
        let source = ScriptedSource::new(vec![Ok(json!({ "status": "ERROR" }))]);
        let api = MfApi::new(source, "http://test/mf", instant_policy(1));
        assert!(matches!(api.list_schemes().await, Err(FetchError::Decode(_))));
    }

    #[tokio::test]
    async fn test_scheme_history() {
        let source = ScriptedSource::new(vec![Ok(json!({
            "meta": { "scheme_name": "Test Fund", "fund_house": "Test AMC", "scheme_type": "Open Ended Schemes" },
            "data": [ { "date": "15-06-2024", "nav": "10.5" }, { "date": "14-06-2024", "nav": "10.4" } ]
        }))]);
        let api = MfApi::new(source, "http://test/mf", instant_policy(1));

        let history = api.scheme_history(125497).await.unwrap();
        assert_eq!(history.meta.scheme_name, "Test Fund");
        assert_eq!(history.records.len(), 2);
        assert_eq!(api.source.requests(), vec!["http://test/mf/125497".to_string()]);
    }

    #[test]
    fn test_search_schemes() {
        let schemes = vec![
            SchemeListing {
                scheme_code: 1,
                scheme_name: "HDFC Flexi Cap Fund - Growth".to_string(),
            },
            SchemeListing {
                scheme_code: 2,
                scheme_name: "SBI Bluechip Fund".to_string(),
            },
        ];

        let found = search_schemes(&schemes, "flexi");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].scheme_code, 1);
        assert_eq!(search_schemes(&schemes, "  ").len(), 2);
        assert!(search_schemes(&schemes, "nippon").is_empty());
    }
}
