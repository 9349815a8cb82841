//! # Snow Report Service Entry Point
//!
//! Wires the library together: configuration, logging, the report
//! coordinator, the webcam cache, and one scheduler for each. Runs until
//! Ctrl-C, then closes both HTTP sessions.
//!
//! `--once` performs a single report refresh, prints it as JSON and exits.
//! `--write-config` writes the effective configuration to snow-config.toml
//! and exits.

// Test modules
#[cfg(test)]
mod tests;

use anyhow::Context;
use std::env;
use tracing::{info, warn};

use snow_report_lib::config::{interval_label, Config};
use snow_report_lib::coordinator::SnowReportCoordinator;
use snow_report_lib::scheduler::{PollState, UpdateScheduler};
use snow_report_lib::sensors::SENSORS;
use snow_report_lib::webcam::{CachedImage, ImageCache, ImageSource};
use snow_report_lib::SnowReport;

/// Log every display field of the latest report.
fn log_report(state: &PollState<SnowReport>) {
    if !state.last_update_success {
        warn!(
            error = state.last_error.as_deref().unwrap_or("unknown"),
            "snow report unavailable, serving last good data"
        );
    }

    let Some(report) = &state.data else {
        return;
    };

    for sensor in SENSORS.iter() {
        match sensor.render(report) {
            Some(value) => info!(sensor = sensor.key, icon = sensor.icon, "{}: {}", sensor.name, value),
            None => info!(sensor = sensor.key, icon = sensor.icon, "{}: unknown", sensor.name),
        }
    }
}

fn log_image(state: &PollState<CachedImage>) {
    match (&state.data, state.last_update_success) {
        (Some(image), true) => info!(
            url = %image.source_url,
            bytes = image.content.len(),
            fetched_at = %image.fetched_at,
            content_type = image.content_type.as_deref().unwrap_or("unknown"),
            "webcam image current"
        ),
        (Some(image), false) => warn!(
            url = %image.source_url,
            age_secs = image.age().as_secs(),
            fetched_at = %image.fetched_at,
            error = state.last_error.as_deref().unwrap_or("unknown"),
            "webcam image stale"
        ),
        (None, _) => warn!(
            error = state.last_error.as_deref().unwrap_or("unknown"),
            "no webcam image yet"
        ),
    }
}

/// Main application entry point.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "snow_report=info,snow_report_lib=info".into()),
        )
        .init();

    // Development mode: one refresh, JSON on stdout
    let once = env::args().any(|arg| arg == "--once");

    let config = Config::load();
    if env::args().any(|arg| arg == "--write-config") {
        config.save().context("failed to write configuration")?;
        return Ok(());
    }

    let mut coordinator = SnowReportCoordinator::from_config(&config);
    coordinator.open().context("failed to open HTTP session")?;

    if once {
        let result = coordinator.refresh().await;
        coordinator.close();
        let report = result.context("snow report refresh failed")?;
        println!("{}", serde_json::to_string_pretty(&*report)?);
        return Ok(());
    }

    if !coordinator.check_connection().await {
        warn!(url = coordinator.url(), "snow report page is not reachable right now");
    }

    let interval = config.update_interval();
    info!(
        every = interval_label(interval.as_secs() / 60).unwrap_or("custom"),
        "starting snow report polling"
    );

    let mut report_scheduler = UpdateScheduler::new("snow_report", coordinator, interval);
    if let Err(err) = report_scheduler.first_refresh().await {
        warn!("initial snow report refresh failed, retrying on schedule: {err}");
    }

    let source = match &config.source.webcam_url {
        Some(url) => ImageSource::Fixed(url.clone()),
        None => ImageSource::FromReport(report_scheduler.subscribe()),
    };
    let webcam_scheduler = UpdateScheduler::new(
        "webcam",
        ImageCache::from_config(&config, source),
        config.webcam_refresh(),
    );

    let report_handle = report_scheduler.spawn();
    let webcam_handle = webcam_scheduler.spawn();

    let mut reports = report_handle.subscribe();
    let mut images = webcam_handle.subscribe();
    log_report(&reports.borrow_and_update());

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("shutdown requested");
                break;
            }
            Ok(()) = reports.changed() => log_report(&reports.borrow_and_update()),
            Ok(()) = images.changed() => log_image(&images.borrow_and_update()),
        }
    }

    let mut coordinator = report_handle.stop().await?;
    coordinator.close();
    let mut image_cache = webcam_handle.stop().await?;
    image_cache.close();

    info!("snow report service stopped");
    Ok(())
}
