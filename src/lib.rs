//! # Snow Report Core Library
//!
//! This library polls a ski resort's public snow report page and its webcam,
//! and keeps the latest good values around for whoever wants to read them.
//!
//! ## Design Philosophy
//!
//! ### Tolerant Parsing
//! The report page is loosely structured HTML. The [`parser`] never fails: a row
//! it cannot understand simply leaves the matching field absent. Every field of
//! [`SnowReport`] is independently optional.
//!
//! ### Stale-Serving
//! The upstream site is flaky. The [`coordinator`] replaces its stored report
//! only after a fully successful fetch-and-parse cycle, so readers keep seeing
//! the last good report through an outage. The [`webcam`] cache does the same
//! for the image bytes.
//!
//! ### Polite Polling
//! Nothing here runs on its own. The [`scheduler`] drives each component on a
//! fixed interval (hours for the report, minutes for the webcam), serializes
//! ticks, and fans the outcome out to subscribers.
//!
//! ### Data Flow
//! 1. **Tick**: the scheduler calls `refresh()`
//! 2. **Fetch**: GET the report page with a 30 s timeout
//! 3. **Parse**: label-match every data row into a [`SnowReport`]
//! 4. **Publish**: store the snapshot, notify subscribers, expose via [`sensors`]
//!
//! ## Core Types
//!
//! - [`SnowReport`]: one immutable snapshot of the resort measurements

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// Module declarations
pub mod config;
pub mod coordinator;
pub mod net;
pub mod parser;
pub mod scheduler;
pub mod sensors;
pub mod webcam;

/// One snapshot of the resort's snow report.
///
/// Lengths are in the unit the page publishes them in: depths in centimetres,
/// trail lengths in kilometres. A freshly constructed report has every field
/// absent; the parser fills in whatever it recognizes.
///
/// # Example
/// ```
/// use snow_report_lib::SnowReport;
///
/// let report = SnowReport {
///     snow_altitude_cm: Some(120.0),
///     alpine_skiing_km: Some(115.0),
///     ..SnowReport::default()
/// };
///
/// assert!(!report.is_empty());
/// assert!(report.fresh_snow_cm.is_none());
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SnowReport {
    /// Snow depth up on the slopes
    pub snow_altitude_cm: Option<f64>,
    /// Snow depth down in the village
    pub snow_village_cm: Option<f64>,
    /// Day of the most recent snowfall
    pub last_snowfall_date: Option<NaiveDate>,
    /// How much fell on that day
    pub last_snowfall_amount_cm: Option<f64>,
    /// Recent fresh snow
    pub fresh_snow_cm: Option<f64>,
    /// Open cross-country trails
    pub cross_country_skiing_km: Option<f64>,
    /// Open alpine pistes
    pub alpine_skiing_km: Option<f64>,
    /// Open winter walking trails
    pub winter_trail_km: Option<f64>,
    /// Webcam image address published by the page, if any
    pub webcam_url: Option<String>,
}

impl SnowReport {
    /// True when no measurement was recognized.
    ///
    /// The webcam address is not a measurement and does not count.
    pub fn is_empty(&self) -> bool {
        self.snow_altitude_cm.is_none()
            && self.snow_village_cm.is_none()
            && self.last_snowfall_date.is_none()
            && self.last_snowfall_amount_cm.is_none()
            && self.fresh_snow_cm.is_none()
            && self.cross_country_skiing_km.is_none()
            && self.alpine_skiing_km.is_none()
            && self.winter_trail_km.is_none()
    }
}
