//! Client for the upstream time-series feed.

use std::time::Duration;

use async_trait::async_trait;
use ratediff_common::FeedDate;
use tracing::{debug, warn};

use crate::error::{FxError, FxResult};

/// Text the feed embeds in its body when it rejects a request's parameters.
pub const UPSTREAM_PARAMETER_ERROR: &str = "Error in parameters";

/// Source of raw rate documents.
#[async_trait]
pub trait FeedClient: Send + Sync {
    /// Get the client name.
    fn name(&self) -> &str;

    /// Fetch the rate document of one currency for the inclusive range
    /// `from..=to`.
    async fn fetch(&self, upstream_id: &str, from: &FeedDate, to: &FeedDate) -> FxResult<Vec<u8>>;
}

/// Configuration for the HTTP feed client.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Base URL the dynamic rate script lives under.
    pub base_url: String,
    /// Overall request timeout.
    pub request_timeout: Duration,
    /// Connection timeout.
    pub connect_timeout: Duration,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.cbr.ru/scripts".to_string(),
            request_timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(2),
        }
    }
}

/// Feed client issuing one HTTP GET per fetch.
pub struct HttpFeedClient {
    client: reqwest::Client,
    config: FeedConfig,
}

impl HttpFeedClient {
    /// Create a new client.
    pub fn new(config: FeedConfig) -> FxResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| FxError::UpstreamUnavailable(format!("failed to build client: {}", e)))?;

        Ok(Self { client, config })
    }

    fn dynamic_url(&self) -> String {
        format!(
            "{}/XML_dynamic.asp",
            self.config.base_url.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl FeedClient for HttpFeedClient {
    fn name(&self) -> &str {
        "http"
    }

    async fn fetch(&self, upstream_id: &str, from: &FeedDate, to: &FeedDate) -> FxResult<Vec<u8>> {
        let from = from.to_feed_string();
        let to = to.to_feed_string();

        let response = self
            .client
            .get(self.dynamic_url())
            .query(&[
                ("date_req1", from.as_str()),
                ("date_req2", to.as_str()),
                ("VAL_NM_RQ", upstream_id),
            ])
            .send()
            .await
            .map_err(|e| {
                warn!(upstream_id, error = %e, "Feed request failed");
                FxError::UpstreamUnavailable(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!(upstream_id, status = %status, "Feed answered with failure status");
            return Err(FxError::UpstreamUnavailable(format!("status {}", status)));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| FxError::UpstreamUnavailable(e.to_string()))?;

        debug!(upstream_id, from = %from, to = %to, bytes = body.len(), "Feed document received");

        check_body(upstream_id, &from, &to, body.to_vec())
    }
}

/// Translate the feed's in-band parameter error into a domain error.
fn check_body(upstream_id: &str, from: &str, to: &str, body: Vec<u8>) -> FxResult<Vec<u8>> {
    let needle = UPSTREAM_PARAMETER_ERROR.as_bytes();
    if body.windows(needle.len()).any(|window| window == needle) {
        return Err(FxError::UpstreamParameterError {
            upstream_id: upstream_id.to_string(),
            from: from.to_string(),
            to: to.to_string(),
        });
    }
    Ok(body)
}

/// Scripted feed client for testing.
#[cfg(any(test, feature = "test-utils"))]
pub struct MockFeedClient {
    documents: dashmap::DashMap<String, MockFeedResponse>,
    calls: std::sync::atomic::AtomicUsize,
}

/// Response a [`MockFeedClient`] gives for one upstream id.
#[cfg(any(test, feature = "test-utils"))]
#[derive(Debug, Clone)]
pub enum MockFeedResponse {
    /// Body returned as if it came over HTTP.
    Body(Vec<u8>),
    /// The feed cannot be reached.
    Unavailable,
}

#[cfg(any(test, feature = "test-utils"))]
impl MockFeedClient {
    /// Create a mock with no documents; unknown ids behave as unreachable.
    pub fn new() -> Self {
        Self {
            documents: dashmap::DashMap::new(),
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// Serve `body` for every fetch of `upstream_id`.
    pub fn set_document(&self, upstream_id: impl Into<String>, body: impl Into<Vec<u8>>) {
        self.documents
            .insert(upstream_id.into(), MockFeedResponse::Body(body.into()));
    }

    /// Make fetches of `upstream_id` fail as unreachable.
    pub fn set_unavailable(&self, upstream_id: impl Into<String>) {
        self.documents
            .insert(upstream_id.into(), MockFeedResponse::Unavailable);
    }

    /// Number of fetches made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }

    /// Build a feed document with one record per `(date, value)` pair.
    pub fn document(upstream_id: &str, records: &[(&str, &str)]) -> Vec<u8> {
        let body: String = records
            .iter()
            .map(|(date, value)| {
                format!(
                    "<Record Date=\"{date}\" Id=\"{upstream_id}\"><Nominal>1</Nominal><Value>{value}</Value></Record>"
                )
            })
            .collect();
        format!(
            "<?xml version=\"1.0\" encoding=\"windows-1251\"?><ValCurs ID=\"{upstream_id}\" name=\"Foreign Currency Market Dynamic\">{body}</ValCurs>"
        )
        .into_bytes()
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl Default for MockFeedClient {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl FeedClient for MockFeedClient {
    fn name(&self) -> &str {
        "mock"
    }

    async fn fetch(&self, upstream_id: &str, from: &FeedDate, to: &FeedDate) -> FxResult<Vec<u8>> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);

        let response = self
            .documents
            .get(upstream_id)
            .map(|r| r.clone())
            .unwrap_or(MockFeedResponse::Unavailable);

        match response {
            MockFeedResponse::Body(body) => check_body(
                upstream_id,
                &from.to_feed_string(),
                &to.to_feed_string(),
                body,
            ),
            MockFeedResponse::Unavailable => Err(FxError::UpstreamUnavailable(
                "connection refused".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(iso: &str) -> FeedDate {
        FeedDate::parse_iso(iso).unwrap()
    }

    #[test]
    fn test_parameter_error_is_detected() {
        let result = check_body(
            "R01235",
            "12/07/2020",
            "15/07/2020",
            b"<html>Error in parameters</html>".to_vec(),
        );

        assert!(matches!(
            result,
            Err(FxError::UpstreamParameterError { ref upstream_id, .. }) if upstream_id == "R01235"
        ));
    }

    #[test]
    fn test_regular_body_passes() {
        let body = MockFeedClient::document("R01235", &[("14.07.2020", "71,2298")]);

        assert_eq!(
            check_body("R01235", "12/07/2020", "15/07/2020", body.clone()).unwrap(),
            body
        );
    }

    #[test]
    fn test_dynamic_url() {
        let client = HttpFeedClient::new(FeedConfig {
            base_url: "http://feed.local/scripts/".to_string(),
            ..Default::default()
        })
        .unwrap();

        assert_eq!(client.dynamic_url(), "http://feed.local/scripts/XML_dynamic.asp");
    }

    #[tokio::test]
    async fn test_http_client_unreachable() {
        let client = HttpFeedClient::new(FeedConfig {
            base_url: "http://127.0.0.1:1".to_string(),
            request_timeout: Duration::from_millis(500),
            connect_timeout: Duration::from_millis(200),
        })
        .unwrap();

        let result = client
            .fetch("R01235", &date("2020-07-12"), &date("2020-07-15"))
            .await;

        assert!(matches!(result, Err(FxError::UpstreamUnavailable(_))));
    }

    #[tokio::test]
    async fn test_mock_counts_calls() {
        let mock = MockFeedClient::new();
        mock.set_document("R01235", MockFeedClient::document("R01235", &[]));

        mock.fetch("R01235", &date("2020-07-12"), &date("2020-07-15"))
            .await
            .unwrap();
        let missing = mock
            .fetch("R01239", &date("2020-07-12"), &date("2020-07-15"))
            .await;

        assert_eq!(mock.calls(), 2);
        assert!(matches!(missing, Err(FxError::UpstreamUnavailable(_))));
    }
}
