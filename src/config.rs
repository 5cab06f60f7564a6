extern crate anyhow;
extern crate serde;
extern crate serde_json;

use anyhow::Context;
use crate::result;

const MBTA_PREDICTIONS: &str = "https://api-v3.mbta.com/predictions";
pub const DEFAULT_FONT: &str = "/usr/share/fonts/truetype/dejavu/DejaVuSansMono.ttf";

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Station {
    pub name: String,
    pub endpoint: String,
}

impl Station {
    fn mbta(name: &str, stop: &str, route: &str) -> Station {
        return Station {
            name: name.to_string(),
            endpoint: format!(
                "{}?filter[stop]={}&filter[direction_id]=1&filter[route]={}&page[limit]=2",
                MBTA_PREDICTIONS, stop, route),
        };
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClockSyncConfig {
    // None retries forever.
    pub max_attempts: Option<u32>,
    pub retry_delay_ms: u64,
}

impl Default for ClockSyncConfig {
    fn default() -> ClockSyncConfig {
        return ClockSyncConfig {
            max_attempts: None,
            retry_delay_ms: 0,
        };
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Backgrounds {
    pub green_line: String,
    pub orange_line: String,
}

impl Default for Backgrounds {
    fn default() -> Backgrounds {
        return Backgrounds {
            green_line: "TGreen-dashboard.bmp".to_string(),
            orange_line: "TOrange-dashboard.bmp".to_string(),
        };
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MatrixConfig {
    pub width: u32,
    pub height: u32,
    pub spi_clock_hz: u32,
    pub reset_pin: u8,
    pub dc_pin: u8,
    pub busy_pin: u8,
    pub busy_timeout_ms: u64,
}

impl Default for MatrixConfig {
    fn default() -> MatrixConfig {
        return MatrixConfig {
            width: 64,
            height: 32,
            spi_clock_hz: 8_000_000,
            reset_pin: 17,
            dc_pin: 25,
            busy_pin: 24,
            busy_timeout_ms: 2000,
        };
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub stations: Vec<Station>,
    pub poll_interval_secs: u64,
    pub failure_threshold: u32,
    pub time_api: String,
    pub request_timeout_secs: u64,
    pub clock_sync: ClockSyncConfig,
    pub backgrounds: Backgrounds,
    pub font: String,
    pub font_scale: f32,
    pub matrix: MatrixConfig,
}

impl Default for Config {
    fn default() -> Config {
        return Config {
            stations: vec![
                Station::mbta("Pru", "place-prmnl", "Green-E"),
                Station::mbta("BBY", "place-bbsta", "Orange"),
            ],
            poll_interval_secs: 15,
            failure_threshold: 5,
            time_api: "http://worldtimeapi.org/api/ip".to_string(),
            request_timeout_secs: 10,
            clock_sync: ClockSyncConfig::default(),
            backgrounds: Backgrounds::default(),
            // sudo apt-get install fonts-dejavu-core
            font: DEFAULT_FONT.to_string(),
            font_scale: 10.0,
            matrix: MatrixConfig::default(),
        };
    }
}

impl Config {
    fn validate(self) -> result::DashResult<Config> {
        if self.stations.is_empty() {
            return Err(result::make_error("config has no stations"));
        }
        if self.poll_interval_secs == 0 {
            return Err(result::make_error("poll_interval_secs must be positive"));
        }
        if self.request_timeout_secs == 0 {
            return Err(result::make_error("request_timeout_secs must be positive"));
        }
        if self.matrix.width == 0 || self.matrix.height == 0 {
            return Err(result::make_error(&format!(
                "matrix must be at least 1x1, got {}x{}", self.matrix.width, self.matrix.height)));
        }
        return Ok(self);
    }
}

pub fn from_str(raw_json: &str) -> result::DashResult<Config> {
    let config: Config = serde_json::from_str(raw_json)?;
    return config.validate();
}

pub fn from_file<P: AsRef<std::path::Path>>(path: P) -> result::DashResult<Config> {
    let debug_path = path.as_ref().to_str().map(|x| x.to_string());
    let raw_json = std::fs::read_to_string(path)
        .with_context(|| format!("Opening config from '{:?}'", debug_path))?;
    return from_str(&raw_json);
}
