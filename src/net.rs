//! Shared HTTP session.
//!
//! One `reqwest::Client` (and with it one connection pool) per component,
//! opened once and reused across refresh cycles. Every request carries its
//! own timeout so a hung upstream cannot stall a scheduler.

use crate::coordinator::FetchError;
use reqwest::{Client, Response, StatusCode};
use std::time::Duration;
use tracing::debug;

/// Lazily opened HTTP client with an explicit open/close lifecycle.
#[derive(Debug)]
pub struct HttpSession {
    user_agent: String,
    client: Option<Client>,
}

impl HttpSession {
    pub fn new(user_agent: impl Into<String>) -> Self {
        Self {
            user_agent: user_agent.into(),
            client: None,
        }
    }

    /// Build the underlying client. Calling it on an open session is a no-op.
    pub fn open(&mut self) -> Result<(), FetchError> {
        self.client()?;
        Ok(())
    }

    /// Drop the client and its pooled connections. Safe to call twice.
    pub fn close(&mut self) {
        if self.client.take().is_some() {
            debug!("closed HTTP session");
        }
    }

    pub fn is_open(&self) -> bool {
        self.client.is_some()
    }

    /// GET `url`, opening the session first if needed.
    ///
    /// Transport errors and timeouts map to [`FetchError::Network`]. The
    /// status code is left for the caller to judge.
    pub async fn get(&mut self, url: &str, timeout: Duration) -> Result<Response, FetchError> {
        let client = self.client()?;
        debug!(url, ?timeout, "GET");
        Ok(client.get(url).timeout(timeout).send().await?)
    }

    /// Lightweight reachability check: true iff `url` answers HTTP 200.
    pub async fn probe(&mut self, url: &str, timeout: Duration) -> bool {
        match self.get(url, timeout).await {
            Ok(response) => response.status() == StatusCode::OK,
            Err(err) => {
                debug!(url, "probe failed: {err}");
                false
            }
        }
    }

    /// Cheap handle to the client; `reqwest::Client` is reference counted.
    fn client(&mut self) -> Result<Client, FetchError> {
        if let Some(client) = &self.client {
            return Ok(client.clone());
        }

        let client = Client::builder()
            .user_agent(self.user_agent.as_str())
            .pool_max_idle_per_host(2)
            .build()?;
        debug!(user_agent = %self.user_agent, "opened HTTP session");
        self.client = Some(client.clone());
        Ok(client)
    }
}
