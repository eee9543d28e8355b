//! Waveshare 2.13" V2 panel (SSD1675B, 122x250) on top of `epd-waveshare`.
//!
//! The panel is portrait natively; frames are landscape and get rotated while
//! converting to the panel buffer. Partial refreshes use the quick LUT with the
//! registered base buffer as the controller's comparison image.
//!
//! On Linux, [`WaveshareLoader`] opens the panel on spidev and GPIO character
//! device lines following the HAT wiring in [`Pins`](super::pins::Pins).

use embedded_graphics::{pixelcolor::BinaryColor, prelude::*};
use embedded_hal::{
    delay::DelayNs,
    digital::{InputPin, OutputPin},
    spi::SpiDevice,
};
use epd_waveshare::{
    color::Color,
    epd2in13_v2::{Display2in13, Epd2in13},
    graphics::DisplayRotation,
    prelude::*,
};

use super::{Capabilities, DriverError, PanelDriver, RefreshMode};
use crate::render::frame::Frame;

#[cfg(target_os = "linux")]
pub use self::linux::{LinuxPanel, WaveshareLoader};

/// 2.13" V2 panel driver
///
/// ## Type Parameters
///
/// - `SPI` - SPI device for communication
/// - `BUSY` - BUSY input pin (HIGH when display is busy)
/// - `DC` - Data/Command output pin
/// - `RST` - Reset output pin
/// - `DELAY` - Delay provider for timing
pub struct Waveshare2in13<SPI, BUSY, DC, RST, DELAY> {
    spi: SPI,
    epd: Epd2in13<SPI, BUSY, DC, RST, DELAY>,
    delay: DELAY,
    rotation: DisplayRotation,
    asleep: bool,
}

impl<SPI, BUSY, DC, RST, DELAY> Waveshare2in13<SPI, BUSY, DC, RST, DELAY>
where
    SPI: SpiDevice,
    BUSY: InputPin,
    DC: OutputPin,
    RST: OutputPin,
    DELAY: DelayNs,
{
    /// Resets and initialises the controller.
    ///
    /// `flip` turns the picture upside down, for HATs mounted the other way.
    pub fn new(
        mut spi: SPI,
        busy: BUSY,
        dc: DC,
        rst: RST,
        mut delay: DELAY,
        flip: bool,
    ) -> Result<Self, DriverError> {
        let epd = Epd2in13::new(&mut spi, busy, dc, rst, &mut delay, None).map_err(bus)?;
        let rotation = if flip {
            DisplayRotation::Rotate270
        } else {
            DisplayRotation::Rotate90
        };

        log::info!(
            "Waveshare 2.13\" V2 initialised, rotation {}",
            rotation_name(&rotation)
        );

        Ok(Self {
            spi,
            epd,
            delay,
            rotation,
            asleep: false,
        })
    }
}

/// Draws a landscape frame into the portrait panel buffer.
fn panel_buffer(frame: &Frame, rotation: DisplayRotation) -> Vec<u8> {
    let mut display = Display2in13::default();
    display.set_rotation(rotation);

    let pixels = (0..frame.height()).flat_map(|y| {
        (0..frame.width()).map(move |x| {
            let color = match frame.pixel(x, y) {
                Some(BinaryColor::On) => Color::Black,
                _ => Color::White,
            };
            Pixel(Point::new(x as i32, y as i32), color)
        })
    });
    let _ = display.draw_iter(pixels);

    display.buffer().to_vec()
}

fn rotation_name(rotation: &DisplayRotation) -> &'static str {
    match rotation {
        DisplayRotation::Rotate0 => "0",
        DisplayRotation::Rotate90 => "90",
        DisplayRotation::Rotate180 => "180",
        DisplayRotation::Rotate270 => "270",
    }
}

fn bus<E: core::fmt::Debug>(e: E) -> DriverError {
    DriverError::Bus(format!("{:?}", e))
}

impl<SPI, BUSY, DC, RST, DELAY> PanelDriver for Waveshare2in13<SPI, BUSY, DC, RST, DELAY>
where
    SPI: SpiDevice,
    BUSY: InputPin,
    DC: OutputPin,
    RST: OutputPin,
    DELAY: DelayNs,
{
    fn capabilities(&self) -> Capabilities {
        Capabilities {
            partial_display: true,
            base_image: true,
        }
    }

    fn init(&mut self, mode: RefreshMode) -> Result<(), DriverError> {
        if self.asleep {
            self.epd
                .wake_up(&mut self.spi, &mut self.delay)
                .map_err(bus)?;
            self.asleep = false;
        }

        let lut = match mode {
            RefreshMode::Full => RefreshLut::Full,
            RefreshMode::Partial => RefreshLut::Quick,
        };
        log::debug!("Setting {} refresh", mode);
        self.epd
            .set_refresh(&mut self.spi, &mut self.delay, lut)
            .map_err(bus)
    }

    fn clear(&mut self, fill: u8) -> Result<(), DriverError> {
        let color = if fill == 0 { Color::Black } else { Color::White };
        self.epd.set_background_color(color);
        self.epd
            .clear_frame(&mut self.spi, &mut self.delay)
            .map_err(bus)?;
        self.epd
            .display_frame(&mut self.spi, &mut self.delay)
            .map_err(bus)
    }

    fn buffer(&self, frame: &Frame) -> Vec<u8> {
        panel_buffer(frame, self.rotation)
    }

    fn display(&mut self, buffer: &[u8]) -> Result<(), DriverError> {
        self.epd
            .update_frame(&mut self.spi, buffer, &mut self.delay)
            .map_err(bus)?;
        self.epd
            .display_frame(&mut self.spi, &mut self.delay)
            .map_err(bus)
    }

    fn display_partial(&mut self, buffer: &[u8]) -> Result<(), DriverError> {
        // In quick refresh mode the controller only drives pixels that differ
        // from the base buffer.
        self.display(buffer)
    }

    fn set_base_image(&mut self, buffer: &[u8]) -> Result<(), DriverError> {
        self.epd
            .set_partial_base_buffer(&mut self.spi, &mut self.delay, buffer)
            .map_err(bus)
    }

    fn sleep(&mut self) -> Result<(), DriverError> {
        self.epd.sleep(&mut self.spi, &mut self.delay).map_err(bus)?;
        self.asleep = true;
        Ok(())
    }

    fn release(self) -> Result<(), DriverError> {
        // The spidev node and GPIO lines close when `self` goes out of scope.
        log::debug!("Releasing Waveshare panel");
        Ok(())
    }
}

#[cfg(target_os = "linux")]
mod linux {
    use linux_embedded_hal::{
        gpio_cdev::{Chip, LineRequestFlags},
        spidev::{SpiModeFlags, SpidevOptions},
        CdevPin, Delay, SpidevDevice,
    };

    use super::Waveshare2in13;
    use crate::config::Config;
    use crate::epd::pins::Pins;
    use crate::epd::{DriverError, DriverLoader};

    const SPI_SPEED_HZ: u32 = 4_000_000;

    /// Panel on spidev with character device GPIO lines.
    pub type LinuxPanel = Waveshare2in13<SpidevDevice, CdevPin, CdevPin, CdevPin, Delay>;

    /// Opens the panel from the configured device nodes.
    #[derive(Debug, Clone)]
    pub struct WaveshareLoader {
        spi_device: String,
        gpio_chip: String,
        flip: bool,
    }

    impl WaveshareLoader {
        pub fn new(config: &Config) -> Self {
            Self {
                spi_device: config.spi_device.clone(),
                gpio_chip: config.gpio_chip.clone(),
                flip: config.rotate_display,
            }
        }
    }

    impl DriverLoader for WaveshareLoader {
        type Driver = LinuxPanel;

        fn open(&mut self) -> Result<LinuxPanel, DriverError> {
            let mut spi = SpidevDevice::open(&self.spi_device)
                .map_err(|e| DriverError::Open(format!("{}: {}", self.spi_device, e)))?;

            let options = SpidevOptions::new()
                .bits_per_word(8)
                .max_speed_hz(SPI_SPEED_HZ)
                .mode(SpiModeFlags::SPI_MODE_0)
                .build();
            spi.configure(&options)
                .map_err(|e| DriverError::Open(format!("configuring {}: {}", self.spi_device, e)))?;

            let mut chip = Chip::new(&self.gpio_chip)
                .map_err(|e| DriverError::Open(format!("{}: {}", self.gpio_chip, e)))?;

            let busy = request(&mut chip, Pins::BUSY, LineRequestFlags::INPUT, 0, "epd-busy")?;
            let dc = request(&mut chip, Pins::DC, LineRequestFlags::OUTPUT, 0, "epd-dc")?;
            let rst = request(&mut chip, Pins::RST, LineRequestFlags::OUTPUT, 1, "epd-rst")?;

            log::info!(
                "Opened {} (ce={}) and {} (busy={}, dc={}, rst={})",
                self.spi_device,
                Pins::CS,
                self.gpio_chip,
                Pins::BUSY,
                Pins::DC,
                Pins::RST
            );

            Waveshare2in13::new(spi, busy, dc, rst, Delay {}, self.flip)
        }
    }

    fn request(
        chip: &mut Chip,
        line: u32,
        flags: LineRequestFlags,
        default: u8,
        consumer: &str,
    ) -> Result<CdevPin, DriverError> {
        let handle = chip
            .get_line(line)
            .and_then(|l| l.request(flags, default, consumer))
            .map_err(|e| DriverError::Gpio(format!("line {}: {}", line, e)))?;

        CdevPin::new(handle).map_err(|e| DriverError::Gpio(format!("line {}: {}", line, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use epd_waveshare::epd2in13_v2::{HEIGHT, WIDTH};

    fn panel_pixel(buffer: &[u8], x: u32, y: u32) -> bool {
        // Native buffer: WIDTH (122) pixels per row, rows padded to bytes,
        // a set bit is white.
        let row_bytes = WIDTH.div_ceil(8);
        let byte = buffer[(y * row_bytes + x / 8) as usize];
        byte & (0x80 >> (x % 8)) == 0
    }

    #[test]
    fn landscape_frame_fills_portrait_buffer() {
        let mut frame = Frame::new(HEIGHT, WIDTH);
        frame.set_pixel(0, 0, BinaryColor::On);

        let buffer = panel_buffer(&frame, DisplayRotation::Rotate90);

        assert_eq!(buffer.len(), (WIDTH.div_ceil(8) * HEIGHT) as usize);
        let ink = (0..HEIGHT)
            .flat_map(|y| (0..WIDTH).map(move |x| (x, y)))
            .filter(|(x, y)| panel_pixel(&buffer, *x, *y))
            .count();
        assert_eq!(ink, 1);
    }

    #[test]
    fn flipped_rotation_moves_the_pixel() {
        let mut frame = Frame::new(HEIGHT, WIDTH);
        frame.set_pixel(0, 0, BinaryColor::On);

        let normal = panel_buffer(&frame, DisplayRotation::Rotate90);
        let flipped = panel_buffer(&frame, DisplayRotation::Rotate270);

        assert_ne!(normal, flipped);
    }

    #[test]
    fn rotation_names_for_log() {
        assert_eq!(rotation_name(&DisplayRotation::Rotate90), "90");
        assert_eq!(rotation_name(&DisplayRotation::Rotate270), "270");
    }
}
