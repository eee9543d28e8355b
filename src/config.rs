//! Runtime configuration read from environment variables.
//!
//! Every key has a default matching a Waveshare 2.13" V2 (250x122) panel, so
//! running without any environment set up renders a sensible screen. Values
//! that fail to parse are logged and replaced with their default.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{ensure, Result};

use crate::render::calendar::Locale;

/// Panel geometry in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub width: u32,
    pub height: u32,
    pub margin: u32,
    /// Agenda panel, left side.
    pub left_panel_w: u32,
    /// Calendar and clock panel, right side.
    pub right_panel_w: u32,
    /// Height of the clock block and of the agenda title bar.
    pub time_block_h: u32,
    pub line_spacing: u32,
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            width: 250,
            height: 122,
            margin: 3,
            left_panel_w: 106,
            right_panel_w: 144,
            time_block_h: 15,
            line_spacing: 2,
        }
    }
}

/// Font sizes, as glyph cell heights.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FontSizes {
    pub calendar_title: u32,
    pub calendar_day: u32,
    pub regular: u32,
    pub small: u32,
    pub subtitle: u32,
    pub time: u32,
    pub no_events: u32,
    /// Diameter of the free-day glyph.
    pub emoji: u32,
}

impl Default for FontSizes {
    fn default() -> Self {
        Self {
            calendar_title: 13,
            calendar_day: 9,
            regular: 9,
            small: 9,
            subtitle: 13,
            time: 13,
            no_events: 15,
            emoji: 28,
        }
    }
}

/// User facing strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Messages {
    pub events: String,
    pub no_events: String,
    pub free_day: String,
}

impl Default for Messages {
    fn default() -> Self {
        Self {
            events: "Eventos".to_string(),
            no_events: "Sem Eventos".to_string(),
            free_day: "Dia livre".to_string(),
        }
    }
}

/// Everything the renderer, display and update loop need.
#[derive(Debug, Clone)]
pub struct Config {
    pub layout: Layout,
    pub fonts: FontSizes,
    pub messages: Messages,
    pub locale: Locale,
    pub events_per_page: usize,
    pub max_events: usize,
    pub update_interval: Duration,
    /// Consecutive failed cycles tolerated before the display is reset.
    pub max_consecutive_failures: u32,
    /// Partial updates between forced full refreshes, 0 disables.
    pub full_refresh_every: u32,
    pub sleep_between_updates: bool,
    pub rotate_display: bool,
    pub agenda_file: Option<PathBuf>,
    pub spi_device: String,
    pub gpio_chip: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            layout: Layout::default(),
            fonts: FontSizes::default(),
            messages: Messages::default(),
            locale: Locale::default(),
            events_per_page: 3,
            max_events: 12,
            update_interval: Duration::from_secs(60),
            max_consecutive_failures: 5,
            full_refresh_every: 0,
            sleep_between_updates: false,
            rotate_display: true,
            agenda_file: None,
            spi_device: "/dev/spidev0.0".to_string(),
            gpio_chip: "/dev/gpiochip0".to_string(),
        }
    }
}

impl Config {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Reads the configuration through `lookup`, which maps a key to its value.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars { lookup };
        let d = Config::default();

        let layout = Layout {
            width: vars.parsed("EPD_WIDTH", d.layout.width),
            height: vars.parsed("EPD_HEIGHT", d.layout.height),
            margin: vars.parsed("MARGIN", d.layout.margin),
            left_panel_w: vars.parsed("LEFT_PANEL_W", d.layout.left_panel_w),
            right_panel_w: vars.parsed("RIGHT_PANEL_W", d.layout.right_panel_w),
            time_block_h: vars.parsed("TIME_BLOCK_H", d.layout.time_block_h),
            line_spacing: vars.parsed("LINE_SPACING", d.layout.line_spacing),
        };

        let fonts = FontSizes {
            calendar_title: vars.parsed("FONT_SIZE_CALENDAR_TITLE", d.fonts.calendar_title),
            calendar_day: vars.parsed("FONT_SIZE_CALENDAR_DAY", d.fonts.calendar_day),
            regular: vars.parsed("FONT_SIZE_REGULAR", d.fonts.regular),
            small: vars.parsed("FONT_SIZE_SMALL", d.fonts.small),
            subtitle: vars.parsed("FONT_SIZE_SUBTITLE", d.fonts.subtitle),
            time: vars.parsed("FONT_SIZE_TIME", d.fonts.time),
            no_events: vars.parsed("FONT_SIZE_NO_EVENTS", d.fonts.no_events),
            emoji: vars.parsed("FONT_SIZE_EMOJI", d.fonts.emoji),
        };

        let messages = Messages {
            events: vars.string("MSG_EVENTS", &d.messages.events),
            no_events: vars.string("MSG_NO_EVENTS", &d.messages.no_events),
            free_day: vars.string("MSG_FREE_DAY", &d.messages.free_day),
        };

        let locale = match vars.get("LOCALE") {
            Some(tag) => Locale::from_tag(&tag).unwrap_or_else(|| {
                log::warn!("Unsupported locale {:?}, using default", tag);
                d.locale
            }),
            None => d.locale,
        };

        Self {
            layout,
            fonts,
            messages,
            locale,
            events_per_page: vars.parsed("EVENTS_PER_PAGE", d.events_per_page),
            max_events: vars.parsed("MAX_EVENTS", d.max_events),
            update_interval: Duration::from_secs(
                vars.parsed("UPDATE_INTERVAL", d.update_interval.as_secs()),
            ),
            max_consecutive_failures: vars
                .parsed("MAX_CONSECUTIVE_FAILURES", d.max_consecutive_failures),
            full_refresh_every: vars.parsed("FULL_REFRESH_EVERY", d.full_refresh_every),
            sleep_between_updates: vars.flag("SLEEP_BETWEEN_UPDATES", d.sleep_between_updates),
            rotate_display: vars.flag("ROTATE_DISPLAY", d.rotate_display),
            agenda_file: vars.get("AGENDA_FILE").map(PathBuf::from),
            spi_device: vars.string("EPD_SPI_DEVICE", &d.spi_device),
            gpio_chip: vars.string("EPD_GPIO_CHIP", &d.gpio_chip),
        }
    }

    /// Rejects settings the layout engine or update loop cannot work with.
    pub fn validate(&self) -> Result<()> {
        let l = &self.layout;

        ensure!(l.width > 0 && l.height > 0, "display size must be non-zero");
        ensure!(
            l.left_panel_w
                .checked_add(l.right_panel_w)
                .is_some_and(|panels| panels <= l.width),
            "panels ({} + {}) wider than display ({})",
            l.left_panel_w,
            l.right_panel_w,
            l.width
        );

        let margins = l.margin.checked_mul(2);
        ensure!(
            margins.is_some_and(|m| m < l.left_panel_w && m < l.height),
            "margin {} leaves no room for panels",
            l.margin
        );
        ensure!(
            margins
                .and_then(|m| m.checked_add(l.time_block_h))
                .is_some_and(|h| h < l.height),
            "time block taller than display"
        );
        ensure!(self.events_per_page > 0, "EVENTS_PER_PAGE must be at least 1");
        ensure!(
            !self.update_interval.is_zero(),
            "UPDATE_INTERVAL must be at least 1 second"
        );

        Ok(())
    }
}

struct Vars<F> {
    lookup: F,
}

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        (self.lookup)(key).filter(|value| !value.trim().is_empty())
    }

    fn string(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    fn parsed<T>(&self, key: &str, default: T) -> T
    where
        T: FromStr + std::fmt::Display,
    {
        match self.get(key) {
            Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
                log::warn!("Invalid value {:?} for {}, using default: {}", raw, key, default);
                default
            }),
            None => default,
        }
    }

    fn flag(&self, key: &str, default: bool) -> bool {
        match self.get(key) {
            Some(raw) => matches!(
                raw.trim().to_ascii_lowercase().as_str(),
                "true" | "1" | "yes" | "on"
            ),
            None => default,
        }
    }
}
