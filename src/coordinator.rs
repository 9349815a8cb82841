//! # Snow Report Coordinator
//!
//! Owns the network session for the report page, runs one fetch-and-parse
//! cycle per `refresh()`, and keeps the last good [`SnowReport`].
//!
//! ## Cycle
//!
//! ```text
//! Idle ──refresh()──▶ Fetching ──┬──▶ Success (store snapshot) ──┐
//!                                └──▶ Failed  (keep snapshot)  ──┴──▶ Idle
//! ```
//!
//! ## Stale-Serving
//!
//! A failed cycle never clears the stored report. Readers calling
//! [`SnowReportCoordinator::current`] keep getting the last good snapshot
//! through an outage; the failure itself is returned once to the caller.
//!
//! ## Error Handling
//!
//! Two failure kinds, both surfaced as [`FetchError`]:
//! - **Network**: connection errors, timeouts, non-2xx status
//! - **Parse**: a response that arrived fine but is not a page at all,
//!   e.g. an image served in place of the report
//!
//! Individual fields the parser cannot recognize are not errors; they stay
//! absent in the report.

use crate::config::Config;
use crate::net::HttpSession;
use crate::scheduler::Refresh;
use crate::{parser, SnowReport};
use chrono::{DateTime, Utc};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Response, Url};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Why a refresh cycle failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Transport failure, timeout, or non-success HTTP status
    #[error("network error: {0}")]
    Network(String),

    /// The body arrived but could not be read as a report page
    #[error("parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Network(format!("request timed out: {err}"))
        } else {
            FetchError::Network(err.to_string())
        }
    }
}

/// Where the coordinator is in its refresh cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CoordinatorState {
    Idle,
    Fetching,
    Success,
    Failed,
}

/// Periodically refreshed snow report with last-good caching.
#[derive(Debug)]
pub struct SnowReportCoordinator {
    session: HttpSession,
    url: String,
    fetch_timeout: Duration,
    probe_timeout: Duration,
    current: Option<Arc<SnowReport>>,
    last_success: Option<DateTime<Utc>>,
    state: CoordinatorState,
    last_outcome: Option<CoordinatorState>,
}

impl SnowReportCoordinator {
    /// Coordinator for the report page at `url`, with 30 s fetch and 10 s
    /// probe timeouts.
    pub fn new(url: impl Into<String>, user_agent: impl Into<String>) -> Self {
        Self {
            session: HttpSession::new(user_agent),
            url: url.into(),
            fetch_timeout: Duration::from_secs(30),
            probe_timeout: Duration::from_secs(10),
            current: None,
            last_success: None,
            state: CoordinatorState::Idle,
            last_outcome: None,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.source.report_url, &config.source.user_agent)
            .with_timeouts(config.fetch_timeout(), config.probe_timeout())
    }

    pub fn with_timeouts(mut self, fetch: Duration, probe: Duration) -> Self {
        self.fetch_timeout = fetch;
        self.probe_timeout = probe;
        self
    }

    /// Acquire the HTTP session. `refresh()` opens it lazily when this was
    /// not called.
    pub fn open(&mut self) -> Result<(), FetchError> {
        self.session.open()
    }

    /// Release the HTTP session. The stored report survives.
    pub fn close(&mut self) {
        self.session.close();
    }

    pub fn is_open(&self) -> bool {
        self.session.is_open()
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Run one fetch-and-parse cycle.
    ///
    /// On success the stored report is replaced and returned. On failure the
    /// stored report is left untouched and the error is returned.
    pub async fn refresh(&mut self) -> Result<Arc<SnowReport>, FetchError> {
        self.state = CoordinatorState::Fetching;
        let outcome = self.fetch_and_parse().await;
        self.state = CoordinatorState::Idle;

        match outcome {
            Ok(report) => {
                let report = Arc::new(report);
                self.current = Some(Arc::clone(&report));
                self.last_success = Some(Utc::now());
                self.last_outcome = Some(CoordinatorState::Success);
                if report.is_empty() {
                    info!(url = %self.url, "snow report page held no recognizable measurements");
                }
                debug!(url = %self.url, "snow report refreshed");
                Ok(report)
            }
            Err(err) => {
                self.last_outcome = Some(CoordinatorState::Failed);
                warn!(url = %self.url, stale = self.current.is_some(), "snow report refresh failed: {err}");
                Err(err)
            }
        }
    }

    /// Last good report, without touching the network.
    ///
    /// `None` only until the first successful refresh.
    pub fn current(&self) -> Option<Arc<SnowReport>> {
        self.current.clone()
    }

    /// When the stored report was fetched.
    pub fn last_success(&self) -> Option<DateTime<Utc>> {
        self.last_success
    }

    /// `Fetching` while a cycle is in flight (or was abandoned mid-flight),
    /// `Idle` otherwise.
    pub fn state(&self) -> CoordinatorState {
        self.state
    }

    /// How the last completed cycle ended: `Success` or `Failed`.
    pub fn last_outcome(&self) -> Option<CoordinatorState> {
        self.last_outcome
    }

    /// Check that the report page answers HTTP 200, using the probe timeout.
    pub async fn check_connection(&mut self) -> bool {
        let reachable = self.session.probe(&self.url, self.probe_timeout).await;
        debug!(url = %self.url, reachable, "connectivity probe");
        reachable
    }

    async fn fetch_and_parse(&mut self) -> Result<SnowReport, FetchError> {
        let response = self
            .session
            .get(&self.url, self.fetch_timeout)
            .await?
            .error_for_status()?;

        if let Some(media_type) = non_text_media_type(&response) {
            return Err(FetchError::Parse(format!("expected an HTML page, got {media_type}")));
        }

        // Decoded with the charset the server declares; undecodable bytes are replaced
        let html = response.text().await?;

        let mut report = parser::parse(&html);
        report.webcam_url = report
            .webcam_url
            .take()
            .and_then(|src| resolve_url(&self.url, &src));
        Ok(report)
    }
}

impl Refresh for SnowReportCoordinator {
    type Output = SnowReport;
    type Error = FetchError;

    fn refresh(&mut self) -> impl Future<Output = Result<Arc<SnowReport>, FetchError>> + Send {
        SnowReportCoordinator::refresh(self)
    }
}

/// The declared media type, when it is one no report page could be served as.
fn non_text_media_type(response: &Response) -> Option<String> {
    let media_type = response
        .headers()
        .get(CONTENT_TYPE)?
        .to_str()
        .ok()?
        .split(';')
        .next()?
        .trim()
        .to_ascii_lowercase();

    let readable = media_type.is_empty()
        || media_type.starts_with("text/")
        || media_type == "application/xhtml+xml"
        || media_type == "application/xml";
    (!readable).then_some(media_type)
}

/// Resolve a possibly relative address found on the page against the page URL.
fn resolve_url(base: &str, src: &str) -> Option<String> {
    match Url::parse(base).and_then(|base| base.join(src)) {
        Ok(url) => Some(url.to_string()),
        Err(err) => {
            debug!(src, "ignoring unusable webcam address: {err}");
            None
        }
    }
}
