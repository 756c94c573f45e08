//! Calendar formatting for log lines and SMS replies.

use chrono::{DateTime, Datelike, FixedOffset, Utc};

/// Wall clock is considered set once it reaches this year.
pub const MIN_VALID_YEAR: i32 = 2016;

fn local(unix: i64, utc_offset_secs: i32) -> Option<DateTime<FixedOffset>> {
    let offset = FixedOffset::east_opt(utc_offset_secs)?;
    DateTime::<Utc>::from_timestamp(unix, 0).map(|t| t.with_timezone(&offset))
}

/// `asctime`-style text, e.g. `Mon Jan  1 10:00:00 2018`.
pub fn asctime(unix: i64, utc_offset_secs: i32) -> String {
    local(unix, utc_offset_secs)
        .map(|t| t.format("%a %b %e %H:%M:%S %Y").to_string())
        .unwrap_or_else(|| "??".into())
}

/// Short date and time used in SMS replies, e.g. `01/01/18 10:00:00`.
pub fn reply_stamp(unix: i64, utc_offset_secs: i32) -> String {
    local(unix, utc_offset_secs)
        .map(|t| t.format("%m/%d/%y %H:%M:%S").to_string())
        .unwrap_or_else(|| "??".into())
}

/// Whether `unix` looks like a synchronised wall clock.
pub fn is_time_set(unix: i64) -> bool {
    DateTime::<Utc>::from_timestamp(unix, 0).is_some_and(|t| t.year() >= MIN_VALID_YEAR)
}
