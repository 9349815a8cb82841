//! Webcam cache freshness and fallback behaviour.

use super::support::{StubResponse, StubServer};
use snow_report_lib::scheduler::{PollState, Refresh, UpdateScheduler};
use snow_report_lib::webcam::{ImageCache, ImageSource};
use snow_report_lib::SnowReport;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

const FRAME_A: &[u8] = b"\xff\xd8frame-a\xff\xd9";
const FRAME_B: &[u8] = b"\xff\xd8frame-b\xff\xd9";

fn fixed_cache(server: &StubServer, freshness: Duration) -> ImageCache {
    ImageCache::new(ImageSource::Fixed(server.url("/cam.jpg")), "snow-report-tests")
        .with_freshness(freshness)
        .with_timeout(Duration::from_secs(5))
}

/// Two reads inside the freshness window cost one request.
#[tokio::test]
async fn fresh_image_is_served_from_cache() {
    let server = StubServer::start().await;
    server.set_fallback(StubResponse::image(FRAME_A));
    let mut cache = fixed_cache(&server, Duration::from_secs(300));

    let first = cache.get_image().await.expect("Should fetch an image");
    let second = cache.get_image().await.expect("Should serve the cached image");

    assert_eq!(&*first, FRAME_A);
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(server.hits(), 1);
}

/// Once the window has passed, a failed fetch falls back to the previous image.
#[tokio::test]
async fn expired_image_survives_failed_fetch() {
    let server = StubServer::start().await;
    server.push(StubResponse::image(FRAME_A));
    server.push(StubResponse::status(502));
    let mut cache = fixed_cache(&server, Duration::ZERO);

    let first = cache.get_image().await.expect("Should fetch an image");
    let second = cache.get_image().await.expect("Should fall back to the cached image");

    assert_eq!(&*second, FRAME_A);
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(server.hits(), 2);
}

/// Once the window has passed, a successful fetch replaces the image.
#[tokio::test]
async fn expired_image_is_replaced() {
    let server = StubServer::start().await;
    server.push(StubResponse::image(FRAME_A));
    server.push(StubResponse::image(FRAME_B));
    let mut cache = fixed_cache(&server, Duration::ZERO);

    assert_eq!(&*cache.get_image().await.unwrap(), FRAME_A);
    assert_eq!(&*cache.get_image().await.unwrap(), FRAME_B);

    let image = cache.cached().expect("Should keep the latest image");
    assert_eq!(image.content_type.as_deref(), Some("image/jpeg"));
    assert_eq!(image.source_url, server.url("/cam.jpg"));
}

/// Without any good image, a failed fetch yields nothing and never errors.
#[tokio::test]
async fn failure_without_cache_is_absent() {
    let server = StubServer::start().await;
    server.push(StubResponse::status(404));
    let mut cache = fixed_cache(&server, Duration::from_secs(300));

    assert!(cache.get_image().await.is_none());
    assert!(cache.refresh().await.is_err(), "The scheduler still sees the failure");
}

/// Fixed addresses get a minute-resolution cache-busting suffix.
#[tokio::test]
async fn fixed_address_is_cache_busted() {
    let server = StubServer::start().await;
    server.push(StubResponse::image(FRAME_A));
    let mut cache = fixed_cache(&server, Duration::from_secs(300));

    cache.get_image().await.expect("Should fetch an image");

    let request = &server.requests()[0];
    let path = request.split_whitespace().nth(1).expect("Should have a path");
    let (base, stamp) = path.split_once('?').expect("Should carry a query");
    assert_eq!(base, "/cam.jpg");
    assert_eq!(stamp.len(), 12);
    assert!(stamp.chars().all(|c| c.is_ascii_digit()));
}

/// The report-provided address is used as-is, and only once it is known.
#[tokio::test]
async fn address_comes_from_latest_report() {
    let server = StubServer::start().await;
    server.set_fallback(StubResponse::image(FRAME_A));

    let (tx, rx) = watch::channel(PollState::<SnowReport>::default());
    let mut cache = ImageCache::new(ImageSource::FromReport(rx), "snow-report-tests")
        .with_freshness(Duration::from_secs(300));

    assert!(cache.get_image().await.is_none());
    assert_eq!(server.hits(), 0, "No address yet, so no request");

    let report = SnowReport {
        webcam_url: Some(server.url("/live/cam.jpg")),
        ..SnowReport::default()
    };
    tx.send_modify(|state| {
        state.data = Some(Arc::new(report));
        state.last_update_success = true;
    });

    assert_eq!(&*cache.get_image().await.unwrap(), FRAME_A);
    assert_eq!(server.requests(), vec!["GET /live/cam.jpg HTTP/1.1".to_string()]);
}

/// A new address bypasses the freshness window.
#[tokio::test]
async fn changed_address_refetches() {
    let server = StubServer::start().await;
    server.push(StubResponse::image(FRAME_A));
    server.push(StubResponse::image(FRAME_B));

    let with_url = |path: &str| PollState {
        data: Some(Arc::new(SnowReport {
            webcam_url: Some(server.url(path)),
            ..SnowReport::default()
        })),
        last_update_success: true,
        last_error: None,
        last_updated: None,
    };

    let (tx, rx) = watch::channel(with_url("/cam-1.jpg"));
    let mut cache = ImageCache::new(ImageSource::FromReport(rx), "snow-report-tests")
        .with_freshness(Duration::from_secs(300));

    assert_eq!(&*cache.get_image().await.unwrap(), FRAME_A);
    tx.send_replace(with_url("/cam-2.jpg"));
    assert_eq!(&*cache.get_image().await.unwrap(), FRAME_B);
    assert_eq!(server.hits(), 2);
}

/// Once the report loses its address, the cached image keeps being served.
#[tokio::test]
async fn lost_address_serves_cached_image() {
    let server = StubServer::start().await;
    server.push(StubResponse::image(FRAME_A));

    let report = SnowReport {
        webcam_url: Some(server.url("/cam.jpg")),
        ..SnowReport::default()
    };
    let (tx, rx) = watch::channel(PollState {
        data: Some(Arc::new(report)),
        last_update_success: true,
        last_error: None,
        last_updated: None,
    });
    let mut cache = ImageCache::new(ImageSource::FromReport(rx), "snow-report-tests")
        .with_freshness(Duration::ZERO);

    cache.get_image().await.expect("Should fetch an image");
    tx.send_modify(|state| state.data = Some(Arc::new(SnowReport::default())));

    assert_eq!(&*cache.get_image().await.unwrap(), FRAME_A);
    assert_eq!(server.hits(), 1);
}

/// Scheduled with an interval equal to the freshness window, every tick
/// downloads a new image instead of every second one.
#[tokio::test]
async fn every_scheduled_tick_fetches() {
    let server = StubServer::start().await;
    server.set_fallback(StubResponse::image(FRAME_A));
    let window = Duration::from_millis(200);
    let scheduler = UpdateScheduler::new("webcam", fixed_cache(&server, window), window);

    let handle = scheduler.spawn();
    tokio::time::sleep(Duration::from_millis(1000)).await;
    let mut cache = handle.stop().await.expect("Webcam task should stop cleanly");
    cache.close();

    // Ticks at 0, 200, 400, 600, 800 and 1000 ms; leave room for a slow runner
    assert!(server.hits() >= 4, "only {} fetches in five intervals", server.hits());
}

/// On-demand reads still honour the window between scheduled ticks.
#[tokio::test]
async fn scheduled_refresh_then_read_uses_cache() {
    let server = StubServer::start().await;
    server.set_fallback(StubResponse::image(FRAME_A));
    let mut cache = fixed_cache(&server, Duration::from_secs(300));

    cache.refresh().await.expect("Should fetch on a tick");
    cache.refresh().await.expect("Should fetch again on the next tick");
    cache.get_image().await.expect("Should serve the cached image");

    assert_eq!(server.hits(), 2);
}
