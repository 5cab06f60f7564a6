extern crate chrono;
extern crate image;
extern crate imageproc;
extern crate rusttype;
extern crate std;

use crate::arrival;
use crate::config;
use crate::display;
use crate::mbta;
use crate::result;

// The one station drawn over the green line artwork; everything else gets orange.
const GREEN_LINE_STATION: &str = "Pru";

const DIM_WHITE: image::Rgb<u8> = image::Rgb([0x44, 0x44, 0x44]);
const GOLD: image::Rgb<u8> = image::Rgb([0xDD, 0x80, 0x00]);

// Row anchors are vertical centres; imageproc wants the top edge.
const ROW_HALF_HEIGHT: i32 = 5;
const STATION_POS: (i32, i32) = (2, 3);
const TIME_POS: (i32, i32) = (2, 11);
const TRAIN1_POS: (i32, i32) = (26, 19);
const TRAIN2_POS: (i32, i32) = (26, 27);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Background {
    GreenLine,
    OrangeLine,
}

impl Background {
    pub fn for_station(station_name: &str) -> Background {
        if station_name == GREEN_LINE_STATION {
            return Background::GreenLine;
        }
        return Background::OrangeLine;
    }
}

// Rebuilt from scratch every cycle and dropped after rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayState {
    pub station_name: String,
    pub time: String,
    pub train1: String,
    pub train2: String,
    pub background: Background,
}

pub struct TextField<'a> {
    pub text: &'a str,
    pub x: i32,
    pub y: i32,
    pub color: image::Rgb<u8>,
}

fn field(text: &str, pos: (i32, i32), color: image::Rgb<u8>) -> TextField {
    return TextField{
        text: text,
        x: pos.0,
        y: pos.1 - ROW_HALF_HEIGHT,
        color: color,
    };
}

impl DisplayState {
    pub fn compose(station_name: &str, now: &chrono::NaiveDateTime, arrivals: &mbta::StationArrivals) -> DisplayState {
        use chrono::Timelike;

        return DisplayState{
            station_name: station_name.to_string(),
            time: arrival::clock_label(now.hour(), now.minute()),
            train1: arrival::format_label(arrivals.first),
            train2: arrival::format_label(arrivals.second),
            background: Background::for_station(station_name),
        };
    }

    // Shown while the clock is still syncing.
    pub fn boot() -> DisplayState {
        return DisplayState{
            station_name: "Station".to_string(),
            time: "Time".to_string(),
            train1: "- min".to_string(),
            train2: "- min".to_string(),
            background: Background::OrangeLine,
        };
    }

    pub fn text_fields(&self) -> Vec<TextField> {
        return vec![
            field(&self.station_name, STATION_POS, DIM_WHITE),
            field(&self.time, TIME_POS, DIM_WHITE),
            field(&self.train1, TRAIN1_POS, GOLD),
            field(&self.train2, TRAIN2_POS, GOLD),
        ];
    }
}

pub struct Styles {
    pub font: rusttype::Font<'static>,
    pub scale: rusttype::Scale,
}

impl Styles {
    pub fn from_font_file(path: &str, size: f32) -> result::DashResult<Styles> {
        let bytes = std::fs::read(path)?;
        let font = rusttype::Font::try_from_vec(bytes).ok_or(
            result::DashError::FontError(format!("couldn't load font from {}", path)))?;
        return Ok(Styles{
            font: font,
            scale: rusttype::Scale{x: size, y: size},
        });
    }
}

// Holds the decoded artwork for the background currently on screen.
pub struct BackgroundCache {
    assets: config::Backgrounds,
    width: u32,
    height: u32,
    current: Option<(Background, image::RgbImage)>,
    decodes: usize,
}

impl BackgroundCache {
    pub fn new(assets: config::Backgrounds, width: u32, height: u32) -> BackgroundCache {
        return BackgroundCache{
            assets: assets,
            width: width,
            height: height,
            current: None,
            decodes: 0,
        };
    }

    pub fn decodes(&self) -> usize {
        return self.decodes;
    }

    fn path_for(&self, background: Background) -> &str {
        match background {
            Background::GreenLine => return &self.assets.green_line,
            Background::OrangeLine => return &self.assets.orange_line,
        }
    }

    pub fn select(&mut self, background: Background) -> result::DashResult<&image::RgbImage> {
        let unchanged = match self.current {
            Some((current, _)) => current == background,
            None => false,
        };

        if !unchanged {
            let path = self.path_for(background).to_string();
            info!("Switching background to {:?} ({})", background, path);
            let mut decoded = image::open(&path)?.to_rgb8();
            if decoded.width() != self.width || decoded.height() != self.height {
                decoded = image::imageops::resize(
                    &decoded, self.width, self.height, image::imageops::FilterType::Nearest);
            }
            self.current = Some((background, decoded));
            self.decodes += 1;
            debug!("{} background decodes so far", self.decodes());
        }

        match self.current {
            Some((_, ref decoded)) => return Ok(decoded),
            None => return Err(result::make_error("no background loaded")),
        }
    }
}

pub trait Render {
    fn render(&mut self, state: &DisplayState) -> result::DashResult<()>;
}

pub struct MatrixRenderer {
    styles: Styles,
    backgrounds: BackgroundCache,
    sinks: Vec<Box<dyn display::FrameSink>>,
}

impl MatrixRenderer {
    pub fn new(styles: Styles, backgrounds: BackgroundCache, sinks: Vec<Box<dyn display::FrameSink>>) -> MatrixRenderer {
        return MatrixRenderer{
            styles: styles,
            backgrounds: backgrounds,
            sinks: sinks,
        };
    }

    pub fn generate_image(&mut self, state: &DisplayState) -> result::DashResult<image::RgbImage> {
        let mut imgbuf = self.backgrounds.select(state.background)?.clone();

        for field in state.text_fields() {
            imageproc::drawing::draw_text_mut(
                &mut imgbuf, field.color, field.x, field.y,
                self.styles.scale, &self.styles.font, field.text);
        }

        return Ok(imgbuf);
    }
}

impl Render for MatrixRenderer {
    fn render(&mut self, state: &DisplayState) -> result::DashResult<()> {
        let imgbuf = self.generate_image(state)?;
        for sink in self.sinks.iter_mut() {
            sink.commit(&imgbuf)?;
        }
        return Ok(());
    }
}
