// Startup time sync against worldtimeapi.org and the clocks the schedule
// loop reads from.
//
// The network half retries according to RetryPolicy (forever by default);
// the parsing half gets exactly one chance. A payload we can't read is
// returned as an error and main refuses to start.
extern crate chrono;
extern crate serde;
extern crate serde_json;

use crate::config;
use crate::fetch;
use crate::result;

pub trait Clock {
    fn now(&self) -> chrono::NaiveDateTime;
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClockReading {
    pub local: chrono::NaiveDateTime,
    pub day_of_year: u32,
    pub day_of_week: u32,
    pub dst: bool,
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: Option<u32>,
    pub delay: std::time::Duration,
}

impl RetryPolicy {
    pub fn unbounded() -> RetryPolicy {
        return RetryPolicy{
            max_attempts: None,
            delay: std::time::Duration::from_millis(0),
        };
    }

    pub fn from_config(config: &config::ClockSyncConfig) -> RetryPolicy {
        return RetryPolicy{
            max_attempts: config.max_attempts,
            delay: std::time::Duration::from_millis(config.retry_delay_ms),
        };
    }
}

#[derive(Deserialize, Debug)]
struct WorldTimeResponse {
    datetime: String,
    day_of_year: u32,
    day_of_week: u32,
    dst: bool,
}

// "2024-01-01T10:04:33.219718-05:00" -> 2024-01-01 10:04:33, local fields as written.
fn parse_local_datetime(datetime: &str) -> result::DashResult<chrono::NaiveDateTime> {
    let (date_part, time_part) = datetime.split_once('T').ok_or(
        result::make_error(&format!("datetime without 'T': '{}'", datetime)))?;

    let date = chrono::NaiveDate::parse_from_str(date_part, "%Y-%m-%d")?;
    let hms = time_part
        .split(|c: char| c == '.' || c == '+' || c == '-' || c == 'Z')
        .next()
        .unwrap_or("");
    let time = chrono::NaiveTime::parse_from_str(hms, "%H:%M:%S")?;

    return Ok(date.and_time(time));
}

pub fn parse_reading(response_body: &str) -> result::DashResult<ClockReading> {
    let response: WorldTimeResponse = serde_json::from_str(response_body)?;

    if response.day_of_week > 6 {
        return Err(result::make_error(&format!("day_of_week out of range: {}", response.day_of_week)));
    }
    if response.day_of_year < 1 || response.day_of_year > 366 {
        return Err(result::make_error(&format!("day_of_year out of range: {}", response.day_of_year)));
    }

    return Ok(ClockReading{
        local: parse_local_datetime(&response.datetime)?,
        day_of_year: response.day_of_year,
        day_of_week: response.day_of_week,
        dst: response.dst,
    });
}

pub fn fetch_reading(fetcher: &dyn fetch::Fetcher, url: &str, policy: &RetryPolicy) -> result::DashResult<ClockReading> {
    let mut attempt: u32 = 0;
    let response_body = loop {
        attempt += 1;
        info!("Fetching time from {} (attempt {})", url, attempt);
        match fetcher.get(url) {
            Ok(body) => break body,
            Err(err) => {
                warn!("Failed to get time, retrying: {}", err);
                if let Some(max_attempts) = policy.max_attempts {
                    if attempt >= max_attempts {
                        return Err(err);
                    }
                }
                std::thread::sleep(policy.delay);
            },
        }
    };

    let reading = parse_reading(&response_body)?;
    info!("Clock synced: {} (day {} of year, weekday {}, dst={})",
          reading.local, reading.day_of_year, reading.day_of_week, reading.dst);
    return Ok(reading);
}

// Set once from a ClockReading, then free-runs on the monotonic clock.
pub struct SoftwareRtc {
    reading: ClockReading,
    set_at: std::time::Instant,
}

impl SoftwareRtc {
    pub fn set(reading: ClockReading) -> SoftwareRtc {
        return SoftwareRtc{
            reading: reading,
            set_at: std::time::Instant::now(),
        };
    }

    pub fn reading(&self) -> &ClockReading {
        return &self.reading;
    }
}

impl Clock for SoftwareRtc {
    fn now(&self) -> chrono::NaiveDateTime {
        let elapsed = chrono::Duration::from_std(self.set_at.elapsed())
            .unwrap_or_else(|_| chrono::Duration::zero());
        return self.reading.local + elapsed;
    }
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> chrono::NaiveDateTime {
        return chrono::Local::now().naive_local();
    }
}

#[cfg(test)]
mod tests {
    extern crate chrono;

    use super::{Clock, RetryPolicy};
    use crate::result;

    fn timed_out() -> result::DashError {
        return result::DashError::IoError(
            std::io::Error::new(std::io::ErrorKind::TimedOut, "timed out"));
    }

    fn golden_body() -> String {
        return std::fs::read_to_string("testdata/worldtimeapi.json").expect("worldtimeapi.json");
    }

    #[test]
    fn parse_golden() {
        let reading = super::parse_reading(&golden_body()).expect("parse");
        assert_eq!(chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(10, 4, 33).unwrap(),
                   reading.local);
        assert_eq!(1, reading.day_of_year);
        assert_eq!(1, reading.day_of_week);
        assert_eq!(false, reading.dst);
    }

    #[test]
    fn parse_without_fraction_or_offset() {
        let reading = super::parse_reading(
            r#"{"datetime": "2024-07-04T21:15:00", "day_of_year": 186, "day_of_week": 4, "dst": true}"#)
            .expect("parse");
        assert_eq!(chrono::NaiveDate::from_ymd_opt(2024, 7, 4).unwrap().and_hms_opt(21, 15, 0).unwrap(),
                   reading.local);
        assert!(reading.dst);
    }

    #[test]
    fn malformed_payloads() {
        assert!(super::parse_reading("{}").is_err());
        assert!(super::parse_reading(
            r#"{"datetime": "yesterday", "day_of_year": 1, "day_of_week": 1, "dst": false}"#).is_err());
        assert!(super::parse_reading(
            r#"{"datetime": "2024-01-01T25:00:00", "day_of_year": 1, "day_of_week": 1, "dst": false}"#).is_err());
        assert!(super::parse_reading(
            r#"{"datetime": "2024-01-01T10:00:00", "day_of_year": 1, "day_of_week": 9, "dst": false}"#).is_err());
    }

    #[test]
    fn retries_transport_errors_until_success() {
        let calls = std::cell::Cell::new(0);
        let fetcher = |_: &str| -> result::DashResult<String> {
            calls.set(calls.get() + 1);
            if calls.get() < 4 {
                return Err(timed_out());
            }
            return Ok(golden_body());
        };

        let reading = super::fetch_reading(&fetcher, "http://worldtimeapi.org/api/ip", &RetryPolicy::unbounded())
            .expect("eventually succeeds");
        assert_eq!(4, calls.get());
        assert_eq!(1, reading.day_of_year);
    }

    #[test]
    fn bounded_policy_gives_up() {
        let calls = std::cell::Cell::new(0);
        let fetcher = |_: &str| -> result::DashResult<String> {
            calls.set(calls.get() + 1);
            return Err(timed_out());
        };
        let policy = RetryPolicy{
            max_attempts: Some(3),
            delay: std::time::Duration::from_millis(0),
        };

        assert!(super::fetch_reading(&fetcher, "http://worldtimeapi.org/api/ip", &policy).is_err());
        assert_eq!(3, calls.get());
    }

    #[test]
    fn malformed_payload_is_not_retried() {
        let calls = std::cell::Cell::new(0);
        let fetcher = |_: &str| -> result::DashResult<String> {
            calls.set(calls.get() + 1);
            return Ok(r#"{"datetime": "garbage"}"#.to_string());
        };

        let err = super::fetch_reading(&fetcher, "http://worldtimeapi.org/api/ip", &RetryPolicy::unbounded())
            .unwrap_err();
        assert!(err.is_payload());
        assert_eq!(1, calls.get());
    }

    #[test]
    fn software_rtc_advances_from_reading() {
        let reading = super::parse_reading(&golden_body()).expect("parse");
        let rtc = super::SoftwareRtc::set(reading.clone());
        let now = rtc.now();
        assert!(now >= reading.local);
        assert!(now - reading.local < chrono::Duration::seconds(5));
        assert_eq!(&reading, rtc.reading());
    }
}
