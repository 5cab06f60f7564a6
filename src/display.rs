extern crate image;
extern crate rppal;
extern crate std;

use rppal::gpio::{Gpio, Level, InputPin, OutputPin};
use rppal::spi::{Spi};

use crate::config;
use crate::result;

const SOFT_RESET : u8 = 0x01;
const DISPLAY_ON : u8 = 0x29;
const COLUMN_ADDRESS_SET : u8 = 0x2A;
const ROW_ADDRESS_SET : u8 = 0x2B;
const MEMORY_WRITE : u8 = 0x2C;
const PIXEL_FORMAT_SET : u8 = 0x3A;
const PIXEL_FORMAT_RGB565 : u8 = 0x55;

// spidev refuses single transfers above its buffer size (4096 by default).
const SPI_CHUNK : usize = 4096;

pub trait FrameSink {
    fn commit(&mut self, frame: &image::RgbImage) -> result::DashResult<()>;
}

// Writes every frame to the same PNG, handy without a panel attached.
pub struct PngSink {
    path: String,
}

impl PngSink {
    pub fn new(path: &str) -> PngSink {
        return PngSink{path: path.to_string()};
    }
}

impl FrameSink for PngSink {
    fn commit(&mut self, frame: &image::RgbImage) -> result::DashResult<()> {
        frame.save(&self.path)?;
        return Ok(());
    }
}

pub struct MatrixPanel {
    spi: Spi,
    dc_pin: OutputPin,
    busy_pin: InputPin,
    busy_timeout: std::time::Duration,
    width: u32,
    height: u32,
}

const BUSY_POLL : std::time::Duration = std::time::Duration::from_millis(10);

// Polls until the panel drops BUSY, giving up after `timeout` so a wedged
// panel shows up as a failed cycle instead of a hang.
fn wait_for_idle<F>(mut read_busy: F, timeout: std::time::Duration) -> result::DashResult<()>
    where F: FnMut() -> Level {
    let started = std::time::Instant::now();
    loop {
        if read_busy() == Level::Low {
            return Ok(());
        }
        if started.elapsed() >= timeout {
            return Err(result::make_error(&format!(
                "panel busy timeout after {}ms", timeout.as_millis())));
        }
        std::thread::sleep(BUSY_POLL);
    }
}

impl MatrixPanel {
    pub fn open(config: &config::MatrixConfig) -> result::DashResult<MatrixPanel> {
        let gpio = Gpio::new()?;
        let dc_pin = gpio.get(config.dc_pin)?.into_output();
        let busy_pin = gpio.get(config.busy_pin)?.into_input();
        let mut rst_pin = gpio.get(config.reset_pin)?.into_output();

        // Don't forget to enable SPI with sudo raspi-config
        let spi = Spi::new(
            rppal::spi::Bus::Spi0,
            rppal::spi::SlaveSelect::Ss0,
            config.spi_clock_hz,
            rppal::spi::Mode::Mode0)?;

        rst_pin.set_low();
        std::thread::sleep(std::time::Duration::from_millis(50));
        rst_pin.set_high();
        std::thread::sleep(std::time::Duration::from_millis(50));

        let mut panel = MatrixPanel{
            spi: spi,
            dc_pin: dc_pin,
            busy_pin: busy_pin,
            busy_timeout: std::time::Duration::from_millis(config.busy_timeout_ms),
            width: config.width,
            height: config.height,
        };
        panel.init()?;
        info!("Matrix panel ready ({}x{})", panel.width, panel.height);
        return Ok(panel);
    }

    fn send_command(&mut self, command: u8) -> result::DashResult<()> {
        self.dc_pin.set_low();
        self.spi.write(&[command])?;
        return Ok(());
    }

    fn send_data(&mut self, data: &[u8]) -> result::DashResult<()> {
        self.dc_pin.set_high();
        for chunk in data.chunks(SPI_CHUNK) {
            self.spi.write(chunk)?;
        }
        return Ok(());
    }

    fn wait_until_idle(&self) -> result::DashResult<()> {
        let busy_pin = &self.busy_pin;
        return wait_for_idle(|| busy_pin.read(), self.busy_timeout);
    }

    fn init(&mut self) -> result::DashResult<()> {
        self.send_command(SOFT_RESET)?;
        self.wait_until_idle()?;

        self.send_command(PIXEL_FORMAT_SET)?;
        self.send_data(&[PIXEL_FORMAT_RGB565])?;

        let last_column = self.width.saturating_sub(1) as u16;
        let last_row = self.height.saturating_sub(1) as u16;
        self.send_command(COLUMN_ADDRESS_SET)?;
        self.send_data(&[0, 0, (last_column >> 8) as u8, last_column as u8])?;
        self.send_command(ROW_ADDRESS_SET)?;
        self.send_data(&[0, 0, (last_row >> 8) as u8, last_row as u8])?;

        self.send_command(DISPLAY_ON)?;
        self.wait_until_idle()?;
        return Ok(());
    }
}

pub fn to_rgb565(frame: &image::RgbImage) -> Vec<u8> {
    let mut bytes = Vec::with_capacity((frame.width() * frame.height() * 2) as usize);
    for pixel in frame.pixels() {
        let r = (pixel[0] as u16 >> 3) << 11;
        let g = (pixel[1] as u16 >> 2) << 5;
        let b = pixel[2] as u16 >> 3;
        let packed = r | g | b;
        bytes.push((packed >> 8) as u8);
        bytes.push(packed as u8);
    }
    return bytes;
}

impl FrameSink for MatrixPanel {
    fn commit(&mut self, frame: &image::RgbImage) -> result::DashResult<()> {
        if frame.width() != self.width || frame.height() != self.height {
            return Err(result::make_error(&format!(
                "frame is {}x{}, panel is {}x{}",
                frame.width(), frame.height(), self.width, self.height)));
        }

        let bytes = to_rgb565(frame);
        self.wait_until_idle()?;
        self.send_command(MEMORY_WRITE)?;
        self.send_data(&bytes)?;
        return Ok(());
    }
}
