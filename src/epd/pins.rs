//! Pin definitions for the Waveshare 2.13" e-Paper HAT on a Raspberry Pi
//!
//! Numbers are BCM GPIO line offsets on `/dev/gpiochip0`.

/// Pin configuration constants for the e-paper HAT
pub struct Pins;

impl Pins {
    // SPI Display pins
    /// Reset pin for display, active low
    pub const RST: u32 = 17;
    /// Data/Command control pin (High for data, Low for command)
    pub const DC: u32 = 25;
    /// Chip Select, driven by the kernel as SPI0 CE0
    pub const CS: u32 = 8;
    /// Busy status pin (High when display is busy)
    pub const BUSY: u32 = 24;
}
