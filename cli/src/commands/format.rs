//! Small helpers shared by the command printers.

use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, FixedOffset, Local, NaiveDate, NaiveTime, Offset, Utc};
use color_eyre::eyre::{eyre, Result};
use stride_protocol::{TimeWindow, ZoneOffset};

/// Window for a named period. `today` is the local calendar day containing
/// `now`; the others end at `now` and reach back over the period.
pub fn period_window(period: &str, now: DateTime<FixedOffset>) -> Result<TimeWindow> {
    let end = now.with_timezone(&Utc);
    let start = match period.to_lowercase().as_str() {
        "today" | "day" => return Ok(TimeWindow::day_of(now)),
        "week" => end - Duration::days(7),
        "month" => end - Duration::days(30),
        "year" => end - Duration::days(365),
        "all" => DateTime::<Utc>::UNIX_EPOCH,
        other => return Err(eyre!("unknown period '{}' (today, week, month, year, all)", other)),
    };
    Ok(TimeWindow::between(start, end)?)
}

/// Parses a session start: RFC 3339, or `HH:MM` on the calendar day of `now`.
pub fn parse_start(raw: &str, now: DateTime<FixedOffset>) -> Result<DateTime<FixedOffset>> {
    if let Ok(start) = DateTime::parse_from_rfc3339(raw) {
        return Ok(start);
    }

    let time = NaiveTime::parse_from_str(raw, "%H:%M")
        .map_err(|_| eyre!("invalid start '{}' (use HH:MM or RFC 3339)", raw))?;
    now.date_naive()
        .and_time(time)
        .and_local_timezone(*now.offset())
        .single()
        .ok_or_else(|| eyre!("{} is not a valid time in {}", raw, now.offset()))
}

/// Noon of `date` in `offset`, or of today when no date is given.
pub fn day_instant(date: Option<&str>, offset: Option<&str>) -> Result<DateTime<FixedOffset>> {
    let offset: FixedOffset = match offset {
        Some(raw) => raw
            .parse::<ZoneOffset>()
            .map_err(|e| eyre!(e))?
            .to_fixed(),
        None => Local::now().offset().fix(),
    };

    let date = match date {
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map_err(|e| eyre!("invalid date '{}': {}", raw, e))?,
        None => Utc::now().with_timezone(&offset).date_naive(),
    };

    let noon = NaiveTime::from_hms_opt(12, 0, 0).unwrap_or(NaiveTime::MIN);
    date.and_time(noon)
        .and_local_timezone(offset)
        .single()
        .ok_or_else(|| eyre!("{} has no unambiguous noon in {}", date, offset))
}

pub fn format_duration(secs: i64) -> String {
    humantime::format_duration(StdDuration::from_secs(secs.max(0) as u64)).to_string()
}

pub fn format_time(time: DateTime<FixedOffset>) -> String {
    time.format("%Y-%m-%d %H:%M:%S %:z").to_string()
}

pub fn or_dash<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

pub fn or_dash_f64(value: Option<f64>, precision: usize) -> String {
    value
        .map(|v| format!("{:.*}", precision, v))
        .unwrap_or_else(|| "-".to_string())
}

pub fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
