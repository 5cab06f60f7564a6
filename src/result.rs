extern crate anyhow;
extern crate chrono;
extern crate image;
extern crate reqwest;
extern crate rppal;
extern crate serde_json;
extern crate std;

pub type DashResult<T> = std::result::Result<T, DashError>;

#[derive(Debug)]
pub enum DashError {
    HttpError(reqwest::Error),
    JsonError(serde_json::Error),
    TimeParseError(chrono::ParseError),
    MalformedPayload(String),
    IoError(std::io::Error),
    ImageError(image::ImageError),
    FontError(String),
    GpioError(rppal::gpio::Error),
    SpiError(rppal::spi::Error),
    Other(anyhow::Error),
}

pub fn make_error(msg: &str) -> DashError {
    return DashError::MalformedPayload(msg.to_string());
}

impl DashError {
    // Network never answered (or answered with a bad status).
    pub fn is_transport(&self) -> bool {
        match *self {
            DashError::HttpError(_) => true,
            _ => false,
        }
    }

    // Network answered but the body was unusable.
    pub fn is_payload(&self) -> bool {
        match *self {
            DashError::JsonError(_) => true,
            DashError::TimeParseError(_) => true,
            DashError::MalformedPayload(_) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for DashError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match *self {
            DashError::HttpError(ref err) => {
                return write!(f, "HTTP Error: {}", err);
            },
            DashError::JsonError(ref err) => {
                return write!(f, "JSON Error: {}", err);
            },
            DashError::TimeParseError(ref err) => {
                return write!(f, "Time Parse Error: {}", err);
            },
            DashError::MalformedPayload(ref msg) => {
                return write!(f, "Malformed Payload: {}", msg);
            },
            DashError::IoError(ref err) => {
                return write!(f, "IO Error: {}", err);
            },
            DashError::ImageError(ref err) => {
                return write!(f, "Image Error: {}", err);
            },
            DashError::FontError(ref msg) => {
                return write!(f, "Font Error: {}", msg);
            },
            DashError::GpioError(ref err) => {
                return write!(f, "GPIO Error: {}", err);
            },
            DashError::SpiError(ref err) => {
                return write!(f, "SPI Error: {}", err);
            },
            DashError::Other(ref err) => {
                return write!(f, "{:#}", err);
            },
        }
    }
}

impl std::error::Error for DashError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match *self {
            DashError::HttpError(ref err) => Some(err),
            DashError::JsonError(ref err) => Some(err),
            DashError::TimeParseError(ref err) => Some(err),
            DashError::IoError(ref err) => Some(err),
            DashError::ImageError(ref err) => Some(err),
            DashError::GpioError(ref err) => Some(err),
            DashError::SpiError(ref err) => Some(err),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for DashError {
    fn from(err: reqwest::Error) -> DashError {
        return DashError::HttpError(err);
    }
}

impl From<serde_json::Error> for DashError {
    fn from(err: serde_json::Error) -> DashError {
        return DashError::JsonError(err);
    }
}

impl From<chrono::ParseError> for DashError {
    fn from(err: chrono::ParseError) -> DashError {
        return DashError::TimeParseError(err);
    }
}

impl From<std::io::Error> for DashError {
    fn from(err: std::io::Error) -> DashError {
        return DashError::IoError(err);
    }
}

impl From<image::ImageError> for DashError {
    fn from(err: image::ImageError) -> DashError {
        return DashError::ImageError(err);
    }
}

impl From<rppal::gpio::Error> for DashError {
    fn from(err: rppal::gpio::Error) -> DashError {
        return DashError::GpioError(err);
    }
}

impl From<rppal::spi::Error> for DashError {
    fn from(err: rppal::spi::Error) -> DashError {
        return DashError::SpiError(err);
    }
}

impl From<anyhow::Error> for DashError {
    fn from(err: anyhow::Error) -> DashError {
        return DashError::Other(err);
    }
}
