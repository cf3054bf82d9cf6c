// Parsing of callback times entered on the command line

use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use anyhow::Result;
use crate::utils::duration::parse_duration;

/// Hour used when only a day is given
const DEFAULT_CALLBACK_HOUR: u32 = 9;

fn local_timestamp(datetime: NaiveDateTime) -> Result<i64> {
    Local
        .from_local_datetime(&datetime)
        .earliest()
        .map(|dt| dt.timestamp())
        .ok_or_else(|| anyhow::anyhow!("Time does not exist in the local timezone: {}", datetime))
}

fn at_default_hour(date: NaiveDate) -> Result<i64> {
    let datetime = date
        .and_hms_opt(DEFAULT_CALLBACK_HOUR, 0, 0)
        .ok_or_else(|| anyhow::anyhow!("Invalid date"))?;
    local_timestamp(datetime)
}

/// Parse a point in time relative to `now` (Unix seconds).
///
/// Accepted forms:
/// - `now`
/// - `+<duration>`: `+30m`, `+2h`, `+1d`
/// - `today`, `tomorrow`: 09:00 local time
/// - `HH:MM`: today at that local time
/// - `YYYY-MM-DD` (09:00), `YYYY-MM-DDTHH:MM`, `YYYY-MM-DD HH:MM`
pub fn parse_when(expr: &str, now: i64) -> Result<i64> {
    let expr = expr.trim();

    if expr == "now" {
        return Ok(now);
    }
    if let Some(offset) = expr.strip_prefix('+') {
        return now
            .checked_add(parse_duration(offset)?)
            .ok_or_else(|| anyhow::anyhow!("Duration too large: {}", offset));
    }

    let today = Local
        .timestamp_opt(now, 0)
        .single()
        .map(|dt| dt.date_naive())
        .ok_or_else(|| anyhow::anyhow!("Invalid current time"))?;
    match expr {
        "today" => return at_default_hour(today),
        "tomorrow" => return at_default_hour(today + chrono::Duration::days(1)),
        _ => {}
    }

    if let Ok(time) = NaiveTime::parse_from_str(expr, "%H:%M") {
        return local_timestamp(today.and_time(time));
    }
    if let Ok(date) = NaiveDate::parse_from_str(expr, "%Y-%m-%d") {
        return at_default_hour(date);
    }
    for format in ["%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"] {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(expr, format) {
            return local_timestamp(datetime);
        }
    }

    anyhow::bail!(
        "Unrecognized time '{}'. Use now, +2h, today, tomorrow, HH:MM or YYYY-MM-DD[THH:MM]",
        expr
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    fn local(ts: i64) -> chrono::DateTime<Local> {
        Local.timestamp_opt(ts, 0).single().unwrap()
    }

    #[test]
    fn test_relative() {
        assert_eq!(parse_when("now", 1_000).unwrap(), 1_000);
        assert_eq!(parse_when("+2h", 1_000).unwrap(), 1_000 + 7_200);
        assert_eq!(parse_when("+1d", 0).unwrap(), 86_400);
    }

    #[test]
    fn test_named_days() {
        let now = parse_when("2026-03-10T15:00", 0).unwrap();
        let tomorrow = local(parse_when("tomorrow", now).unwrap());
        assert_eq!(tomorrow.date_naive(), NaiveDate::from_ymd_opt(2026, 3, 11).unwrap());
        assert_eq!(tomorrow.hour(), 9);

        let today = local(parse_when("today", now).unwrap());
        assert_eq!(today.date_naive(), NaiveDate::from_ymd_opt(2026, 3, 10).unwrap());
    }

    #[test]
    fn test_absolute() {
        let ts = parse_when("2026-03-10 14:30", 0).unwrap();
        let dt = local(ts);
        assert_eq!((dt.hour(), dt.minute()), (14, 30));
        assert_eq!(parse_when("2026-03-10T14:30", 0).unwrap(), ts);

        let now = parse_when("2026-03-10T08:00", 0).unwrap();
        assert_eq!(parse_when("14:30", now).unwrap(), ts);
    }

    #[test]
    fn test_invalid() {
        assert!(parse_when("next week", 0).is_err());
        assert!(parse_when("+soon", 0).is_err());
        assert!(parse_when("2026-13-01", 0).is_err());
    }

    #[test]
    fn test_relative_overflow() {
        let err = parse_when("+999999999999999d", 0).unwrap_err();
        assert!(err.to_string().contains("Duration too large"));
        let err = parse_when(&format!("+{}s", i64::MAX), 1).unwrap_err();
        assert!(err.to_string().contains("Duration too large"));
    }
}
