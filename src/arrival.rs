extern crate chrono;

use crate::result;

const PLACEHOLDER_LABEL: &str = "-----";
const PLACEHOLDER_CLOCK: &str = "--:--";

// One display slot. A late train is still Minutes (negative); the other two
// cases never carry a number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrivalOffset {
    Minutes(i64),
    NoData,
    Malformed,
}

// Accepts "2024-01-01T10:05:00-05:00", "2024-01-01T10:05:00.123Z",
// "2024-01-01T10:05:00" and "2024-01-01T10:05". Offsets are not applied: the
// wall-clock fields are taken as written.
pub fn parse_timestamp(iso: &str) -> result::DashResult<chrono::NaiveDateTime> {
    let iso = iso.trim();
    if let Ok(with_offset) = chrono::DateTime::parse_from_rfc3339(iso) {
        return Ok(with_offset.naive_local());
    }
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(iso, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(naive);
    }
    return Ok(chrono::NaiveDateTime::parse_from_str(iso, "%Y-%m-%dT%H:%M")?);
}

// Hour and minute fields only. Dates and seconds are ignored, so a train
// after midnight comes out negative.
pub fn try_minutes_until(now: &chrono::NaiveDateTime, iso: &str) -> result::DashResult<i64> {
    use chrono::Timelike;

    let target = parse_timestamp(iso)?;
    return Ok((target.hour() as i64 - now.hour() as i64) * 60
              + (target.minute() as i64 - now.minute() as i64));
}

pub fn minutes_until(now: &chrono::NaiveDateTime, iso: &str) -> ArrivalOffset {
    match try_minutes_until(now, iso) {
        Ok(minutes) => return ArrivalOffset::Minutes(minutes),
        Err(err) => {
            warn!("Time calculation error for '{}': {}", iso, err);
            return ArrivalOffset::Malformed;
        }
    }
}

pub fn format_label(offset: ArrivalOffset) -> String {
    match offset {
        ArrivalOffset::Minutes(1) => return "Arr".to_string(),
        ArrivalOffset::Minutes(m) if m <= 0 => return "Brd".to_string(),
        ArrivalOffset::Minutes(m) => return format!("{:2} min", m),
        _ => return PLACEHOLDER_LABEL.to_string(),
    }
}

// 12-hour "HH:MM" without AM/PM; both midnight and noon read 12.
pub fn clock_label(hour: u32, minute: u32) -> String {
    let hour = match hour {
        0 => 12,
        h if h > 12 => h - 12,
        h => h,
    };
    return format!("{:02}:{:02}", hour, minute);
}

pub fn arrival_clock_label(iso: &str) -> String {
    use chrono::Timelike;

    match parse_timestamp(iso) {
        Ok(t) => return clock_label(t.hour(), t.minute()),
        Err(_) => return PLACEHOLDER_CLOCK.to_string(),
    }
}
