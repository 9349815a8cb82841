//! # Webcam Image Cache
//!
//! Fetches the resort webcam image and keeps the last good copy.
//!
//! ## Freshness
//!
//! A cached image younger than the freshness window (five minutes by default)
//! is served without touching the network. Older images trigger one fetch;
//! if that fails for any reason the previous image is served instead. Nothing
//! here ever returns an error to the reader of [`ImageCache::get_image`].
//!
//! When driven by the scheduler, each tick is itself the expiry: the
//! [`Refresh`] implementation always fetches.
//!
//! ## Image Address
//!
//! The canonical source is the address the report page itself publishes
//! ([`ImageSource::FromReport`]). Until a report carrying one has arrived,
//! no fetch is attempted. A fixed address ([`ImageSource::Fixed`]) is also
//! supported; it gets a minute-resolution timestamp appended on every fetch
//! so intermediate caches cannot serve an old frame.

use crate::config::Config;
use crate::coordinator::FetchError;
use crate::net::HttpSession;
use crate::scheduler::{PollState, Refresh};
use crate::SnowReport;
use chrono::{DateTime, Local, Utc};
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, warn};

/// Default freshness window
pub const DEFAULT_FRESHNESS: Duration = Duration::from_secs(5 * 60);

/// Where the webcam image address comes from.
#[derive(Debug)]
pub enum ImageSource {
    /// Fixed address, cache-busted with a timestamp on every fetch
    Fixed(String),
    /// Address published by the latest snow report
    FromReport(watch::Receiver<PollState<SnowReport>>),
}

/// One successfully fetched image. Replaced wholesale, never mutated.
#[derive(Debug, Clone)]
pub struct CachedImage {
    pub content: Arc<[u8]>,
    pub content_type: Option<String>,
    /// Address the image was fetched for, without cache-busting
    pub source_url: String,
    pub fetched_at: DateTime<Utc>,
    fetched: Instant,
}

impl CachedImage {
    pub fn age(&self) -> Duration {
        self.fetched.elapsed()
    }
}

/// Outcome of one lookup, before it is flattened for the caller.
enum Lookup {
    Fresh(Arc<CachedImage>),
    Fetched(Arc<CachedImage>),
    Stale(Option<Arc<CachedImage>>, FetchError),
    NoAddress(Option<Arc<CachedImage>>),
}

/// Last-good webcam image with a freshness window.
#[derive(Debug)]
pub struct ImageCache {
    session: HttpSession,
    source: ImageSource,
    freshness: Duration,
    fetch_timeout: Duration,
    cached: Option<Arc<CachedImage>>,
}

impl ImageCache {
    pub fn new(source: ImageSource, user_agent: impl Into<String>) -> Self {
        Self {
            session: HttpSession::new(user_agent),
            source,
            freshness: DEFAULT_FRESHNESS,
            fetch_timeout: Duration::from_secs(30),
            cached: None,
        }
    }

    pub fn from_config(config: &Config, source: ImageSource) -> Self {
        Self::new(source, &config.source.user_agent)
            .with_freshness(config.webcam_refresh())
            .with_timeout(config.fetch_timeout())
    }

    pub fn with_freshness(mut self, freshness: Duration) -> Self {
        self.freshness = freshness;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn open(&mut self) -> Result<(), FetchError> {
        self.session.open()
    }

    pub fn close(&mut self) {
        self.session.close();
    }

    /// Image bytes, fetched if the cache is stale. `None` only when no image
    /// was ever fetched successfully.
    pub async fn get_image(&mut self) -> Option<Arc<[u8]>> {
        self.image().await.map(|image| Arc::clone(&image.content))
    }

    /// Like [`get_image`](Self::get_image), with the image metadata.
    pub async fn image(&mut self) -> Option<Arc<CachedImage>> {
        match self.lookup(false).await {
            Lookup::Fresh(image) | Lookup::Fetched(image) => Some(image),
            Lookup::Stale(image, _) | Lookup::NoAddress(image) => image,
        }
    }

    /// The cached image without any network access.
    pub fn cached(&self) -> Option<Arc<CachedImage>> {
        self.cached.clone()
    }

    /// `expired` skips the freshness check and always fetches.
    async fn lookup(&mut self, expired: bool) -> Lookup {
        let Some(source_url) = self.source_url() else {
            debug!("no webcam address available yet, serving cached image");
            return Lookup::NoAddress(self.cached.clone());
        };

        if let Some(cached) = self.cached.as_ref().filter(|_| !expired) {
            if cached.source_url == source_url && cached.age() < self.freshness {
                return Lookup::Fresh(Arc::clone(cached));
            }
        }

        match self.fetch(&source_url).await {
            Ok(image) => {
                debug!(url = %source_url, bytes = image.content.len(), "webcam image refreshed");
                let image = Arc::new(image);
                self.cached = Some(Arc::clone(&image));
                Lookup::Fetched(image)
            }
            Err(err) => {
                warn!(url = %source_url, "failed to fetch webcam image: {err}");
                Lookup::Stale(self.cached.clone(), err)
            }
        }
    }

    fn source_url(&self) -> Option<String> {
        match &self.source {
            ImageSource::Fixed(url) => Some(url.clone()),
            ImageSource::FromReport(reports) => reports
                .borrow()
                .data
                .as_ref()
                .and_then(|report| report.webcam_url.clone()),
        }
    }

    async fn fetch(&mut self, source_url: &str) -> Result<CachedImage, FetchError> {
        let request_url = match &self.source {
            ImageSource::Fixed(_) => cache_busted(source_url, Local::now()),
            ImageSource::FromReport(_) => source_url.to_string(),
        };

        let response = self.session.get(&request_url, self.fetch_timeout).await?;
        if response.status() != StatusCode::OK {
            return Err(FetchError::Network(format!("HTTP {}", response.status())));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);
        let content = response.bytes().await?;

        Ok(CachedImage {
            content: Arc::from(&content[..]),
            content_type,
            source_url: source_url.to_string(),
            fetched_at: Utc::now(),
            fetched: Instant::now(),
        })
    }
}

impl Refresh for ImageCache {
    type Output = CachedImage;
    type Error = FetchError;

    /// A scheduled tick marks the cached image as expired, so every tick
    /// fetches. Succeeds when that fetch did, or when there is no address
    /// yet but an earlier image is still held.
    fn refresh(&mut self) -> impl Future<Output = Result<Arc<CachedImage>, FetchError>> + Send {
        async move {
            match self.lookup(true).await {
                Lookup::Fresh(image) | Lookup::Fetched(image) => Ok(image),
                Lookup::NoAddress(Some(image)) => Ok(image),
                Lookup::NoAddress(None) => Err(FetchError::Network(
                    "no webcam image address available".to_string(),
                )),
                Lookup::Stale(_, err) => Err(err),
            }
        }
    }
}

/// Append a minute-resolution timestamp as query string.
fn cache_busted(url: &str, now: DateTime<Local>) -> String {
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{url}{separator}{}", now.format("%Y%m%d%H%M"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_cache_busted() {
        let now = Local.with_ymd_and_hms(2025, 12, 17, 8, 5, 0).unwrap();
        assert_eq!(
            cache_busted("https://example.com/cam.jpg", now),
            "https://example.com/cam.jpg?202512170805"
        );
        assert_eq!(
            cache_busted("https://example.com/cam.jpg?size=l", now),
            "https://example.com/cam.jpg?size=l&202512170805"
        );
    }

    #[tokio::test]
    async fn test_report_without_address_skips_fetch() {
        let (_tx, rx) = watch::channel(PollState::<SnowReport>::default());
        let mut cache = ImageCache::new(ImageSource::FromReport(rx), "test-agent");

        assert!(cache.get_image().await.is_none());
        // No request was made, so no session was needed
        assert!(!cache.session.is_open());

        let err = cache.refresh().await.unwrap_err();
        assert!(matches!(err, FetchError::Network(_)));
    }

    #[tokio::test]
    async fn test_unreachable_fixed_address_yields_none() {
        let mut cache = ImageCache::new(ImageSource::Fixed("http://127.0.0.1:1/cam.jpg".into()), "test-agent")
            .with_timeout(Duration::from_secs(2));
        assert!(cache.get_image().await.is_none());
        assert!(cache.cached().is_none());
    }
}
