//! Unit conversion utilities.
//!
//! Drawing anchors are measured in EMUs; cell dates are stored as OLE
//! Automation serial numbers.

use chrono::{NaiveDate, NaiveDateTime};

pub const EMUS_PER_INCH: i64 = 914_400;
pub const DEFAULT_DPI: u32 = 96;

const SECONDS_PER_DAY: f64 = 86_400.0;

#[inline]
pub fn px_to_emu(px: u32, dpi: u32) -> i64 {
    ((px as f64) * EMUS_PER_INCH as f64 / dpi as f64) as i64
}

#[inline]
pub fn px_to_emu_96(px: u32) -> i64 {
    px_to_emu(px, DEFAULT_DPI)
}

/// Day zero of the OLE Automation calendar (1899-12-30).
#[inline]
fn oa_epoch() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1899, 12, 30)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}

/// Convert a timestamp to its OLE Automation serial.
///
/// Whole days count from 1899-12-30 and the time of day becomes the
/// fractional part, which is exactly how date cells are stored.
pub fn datetime_to_oa_date(dt: NaiveDateTime) -> f64 {
    let delta = dt - oa_epoch();
    let millis = delta.num_milliseconds() as f64;
    millis / 1000.0 / SECONDS_PER_DAY
}

#[inline]
pub fn date_to_oa_date(date: NaiveDate) -> f64 {
    date.and_hms_opt(0, 0, 0)
        .map(datetime_to_oa_date)
        .unwrap_or_default()
}
