use chrono::{DateTime, Datelike, Timelike};

use crate::model::TimeDimension;

/// Truncate epoch milliseconds to whole seconds (floor, never rounds up).
pub fn epoch_seconds(ts_ms: i64) -> i64 {
    ts_ms.div_euclid(1000)
}

/// Calendar attributes of a play event timestamp, in UTC.
///
/// Returns `None` when the timestamp is outside the range chrono can represent.
pub fn time_dimension(ts_ms: i64) -> Option<TimeDimension> {
    let start_time = epoch_seconds(ts_ms);
    let at = DateTime::from_timestamp(start_time, 0)?;

    Some(TimeDimension {
        start_time,
        hour: at.hour() as i32,
        day: at.day() as i32,
        week: at.iso_week().week() as i32,
        month: at.month() as i32,
        year: at.year(),
        weekday: at.weekday().num_days_from_monday() as i32,
    })
}
