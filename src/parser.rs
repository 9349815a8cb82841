//! # Snow Report HTML Parser
//!
//! Turns the resort's snow report page into a [`SnowReport`]. Pure functions,
//! no I/O and no state.
//!
//! ## Markup Contract
//!
//! The page lists its measurements as a sequence of rows:
//! ```html
//! <div class="snow-data-row">
//!   <p class="label">Snow in altitude</p>
//!   <p class="data">120 cm</p>
//! </div>
//! <div class="snow-data-row">
//!   <p class="label">Last snowfall 17.12.2025</p>
//!   <p class="data">15 cm</p>
//! </div>
//! ```
//! Labels are English phrases. Values carry a `cm` or `km` suffix and use
//! either `,` or `.` as decimal separator. The date of the last snowfall lives
//! in the *label*, day first.
//!
//! An optional `<div class="webcam"><img src="…"></div>` block publishes the
//! current webcam image address.
//!
//! ## Failure Policy
//!
//! Parsing never fails. A row without a label or a value is skipped, a label
//! matching no rule is ignored, and a value that does not hold a number leaves
//! its field absent.

use crate::SnowReport;
use chrono::NaiveDate;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

/// Which [`SnowReport`] field a row feeds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Field {
    SnowAltitude,
    SnowVillage,
    /// Date from the label, amount from the value
    LastSnowfall,
    FreshSnow,
    CrossCountry,
    AlpineSkiing,
    WinterTrail,
}

/// Ordered label rules. The first needle contained in the lowercased label wins.
///
/// The needles are chosen so none of them is a substring of another row's
/// label: "fresh snow" never appears in "snow in altitude" and vice versa.
pub const LABEL_RULES: [(&str, Field); 7] = [
    ("snow in altitude", Field::SnowAltitude),
    ("snow in the village", Field::SnowVillage),
    ("last snowfall", Field::LastSnowfall),
    ("fresh snow", Field::FreshSnow),
    ("cross-country", Field::CrossCountry),
    ("alpine skiing", Field::AlpineSkiing),
    ("winter trail", Field::WinterTrail),
];

/// Length unit a value is expected to carry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Unit {
    Centimetres,
    Kilometres,
}

impl Unit {
    /// The token the page writes after the number.
    pub fn token(self) -> &'static str {
        match self {
            Unit::Centimetres => "cm",
            Unit::Kilometres => "km",
        }
    }
}

/// Parse a snow report page.
///
/// Never fails; anything unrecognized is left absent.
///
/// # Example
/// ```
/// use snow_report_lib::parser::parse;
///
/// let html = r#"<div class="snow-data-row">
///     <p class="label">Fresh snow</p><p class="data">5 cm</p>
/// </div>"#;
///
/// assert_eq!(parse(html).fresh_snow_cm, Some(5.0));
/// assert!(parse("").is_empty());
/// ```
pub fn parse(html: &str) -> SnowReport {
    let doc = Html::parse_document(html);

    let row_sel = selector("div.snow-data-row");
    let label_sel = selector("p.label");
    let value_sel = selector("p.data");
    let webcam_sel = selector(".webcam img");

    let mut report = SnowReport::default();

    for row in doc.select(&row_sel) {
        let label = row.select(&label_sel).next();
        let value = row.select(&value_sel).next();
        let (Some(label), Some(value)) = (label, value) else {
            continue;
        };

        apply_row(&mut report, &element_text(label), &element_text(value));
    }

    report.webcam_url = doc
        .select(&webcam_sel)
        .filter_map(|img| img.value().attr("src"))
        .map(str::trim)
        .find(|src| !src.is_empty())
        .map(str::to_owned);

    debug!(?report, "parsed snow report page");
    report
}

/// Find the rule a label falls under, if any.
pub fn classify(label: &str) -> Option<Field> {
    let label = label.trim().to_lowercase();
    LABEL_RULES
        .iter()
        .find(|(needle, _)| label.contains(needle))
        .map(|&(_, field)| field)
}

/// Extract a number from a measurement text such as `"45 cm"` or `"5,5 km"`.
///
/// With a unit hint, the first number directly followed by that unit wins.
/// Otherwise (or if no number carries the unit) the first bare number is used.
/// A comma is read as the decimal separator.
///
/// # Example
/// ```
/// use snow_report_lib::parser::{parse_measurement, Unit};
///
/// assert_eq!(parse_measurement("45 cm", Some(Unit::Centimetres)), Some(45.0));
/// assert_eq!(parse_measurement("5,5 km", Some(Unit::Kilometres)), Some(5.5));
/// assert_eq!(parse_measurement("123", None), Some(123.0));
/// assert_eq!(parse_measurement("not a number", None), None);
/// ```
pub fn parse_measurement(text: &str, unit: Option<Unit>) -> Option<f64> {
    if let Some(unit) = unit {
        let qualified = numeric_runs(text).find(|&(_, end)| followed_by_unit(&text[end..], unit));
        if let Some((start, end)) = qualified {
            return to_number(&text[start..end]);
        }
    }

    numeric_runs(text)
        .next()
        .and_then(|(start, end)| to_number(&text[start..end]))
}

/// Extract a day-first `D.M.YYYY` date, e.g. from `"Last snowfall 17.12.2025"`.
///
/// Only the leftmost date-shaped token is considered. Impossible calendar
/// dates such as `99.99.9999` yield `None`.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let bytes = text.as_bytes();
    let (day, month, year) = (0..bytes.len()).find_map(|start| match_date_at(bytes, start))?;
    NaiveDate::from_ymd_opt(year, month, day)
}

// -- Private Implementation --

fn apply_row(report: &mut SnowReport, label: &str, value: &str) {
    let Some(field) = classify(label) else {
        return;
    };

    let cm = || parse_measurement(value, Some(Unit::Centimetres));
    let km = || parse_measurement(value, Some(Unit::Kilometres));

    match field {
        Field::SnowAltitude => report.snow_altitude_cm = cm(),
        Field::SnowVillage => report.snow_village_cm = cm(),
        Field::LastSnowfall => {
            report.last_snowfall_date = parse_date(label);
            report.last_snowfall_amount_cm = cm();
        }
        Field::FreshSnow => report.fresh_snow_cm = cm(),
        Field::CrossCountry => report.cross_country_skiing_km = km(),
        Field::AlpineSkiing => report.alpine_skiing_km = km(),
        Field::WinterTrail => report.winter_trail_km = km(),
    }
}

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("CSS selector should be valid")
}

/// All text below an element, whitespace collapsed to single spaces.
fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_numeric_byte(b: u8) -> bool {
    b.is_ascii_digit() || b == b',' || b == b'.'
}

/// Maximal runs of digits, commas and periods as `(start, end)` byte offsets.
fn numeric_runs(text: &str) -> impl Iterator<Item = (usize, usize)> + '_ {
    let bytes = text.as_bytes();
    let mut pos = 0;
    std::iter::from_fn(move || {
        while pos < bytes.len() && !is_numeric_byte(bytes[pos]) {
            pos += 1;
        }
        if pos >= bytes.len() {
            return None;
        }
        let start = pos;
        while pos < bytes.len() && is_numeric_byte(bytes[pos]) {
            pos += 1;
        }
        Some((start, pos))
    })
}

fn followed_by_unit(rest: &str, unit: Unit) -> bool {
    rest.trim_start()
        .get(..unit.token().len())
        .is_some_and(|token| token.eq_ignore_ascii_case(unit.token()))
}

fn to_number(run: &str) -> Option<f64> {
    run.replace(',', ".").parse::<f64>().ok()
}

/// Match `\d{1,2}\.\d{1,2}\.\d{4}` at `start`, preferring two-digit fields.
fn match_date_at(bytes: &[u8], start: usize) -> Option<(u32, u32, i32)> {
    for day_len in [2, 1] {
        let Some(day) = digits(bytes, start, day_len) else {
            continue;
        };
        let month_at = start + day_len + 1;
        if bytes.get(month_at - 1) != Some(&b'.') {
            continue;
        }
        for month_len in [2, 1] {
            let Some(month) = digits(bytes, month_at, month_len) else {
                continue;
            };
            let year_at = month_at + month_len + 1;
            if bytes.get(year_at - 1) != Some(&b'.') {
                continue;
            }
            if let Some(year) = digits(bytes, year_at, 4) {
                return Some((day, month, year as i32));
            }
        }
    }
    None
}

fn digits(bytes: &[u8], at: usize, len: usize) -> Option<u32> {
    let slice = bytes.get(at..at + len)?;
    if !slice.iter().all(u8::is_ascii_digit) {
        return None;
    }
    Some(slice.iter().fold(0, |acc, b| acc * 10 + u32::from(b - b'0')))
}
