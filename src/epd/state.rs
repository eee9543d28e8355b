//! Lifecycle of the panel driver.
//!
//! ```text
//!  Uninit --full_update--> FullDone --prepare_partial--> PartialReady
//!    ^                                                     |    ^
//!    |                                                sleep|    |partial_update
//!    +-------------------- cleanup (from anywhere) ---- Asleep -+
//! ```
//!
//! Any driver failure moves to `Error`. The driver handle is opened lazily by
//! the first operation that needs it and kept until [`DisplayStateMachine::cleanup`],
//! which also runs on drop. All calls block for the duration of the panel I/O.

use std::fmt;

use super::{Capabilities, DriverError, DriverLoader, PanelDriver, RefreshMode, WHITE};
use crate::render::frame::Frame;

/// Where the panel is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No driver handle.
    Uninit,
    /// Full refresh pushed, panel in full mode.
    FullDone,
    /// Partial mode set up with a baseline.
    PartialReady,
    /// Panel in deep sleep, handle still held.
    Asleep,
    /// Last driver operation failed, handle still held.
    Error,
}

/// Display operation failure.
#[derive(Debug)]
pub enum DisplayError {
    /// The driver could not be opened. Not retried.
    HardwareInit(DriverError),
    /// A push to an opened driver failed.
    DisplayWrite {
        op: &'static str,
        source: DriverError,
    },
}

impl fmt::Display for DisplayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisplayError::HardwareInit(e) => write!(f, "display hardware unavailable: {}", e),
            DisplayError::DisplayWrite { op, source } => {
                write!(f, "display {} failed: {}", op, source)
            }
        }
    }
}

impl std::error::Error for DisplayError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DisplayError::HardwareInit(e) => Some(e),
            DisplayError::DisplayWrite { source, .. } => Some(source),
        }
    }
}

/// Sole owner of the panel driver.
pub struct DisplayStateMachine<L: DriverLoader> {
    loader: L,
    driver: Option<L::Driver>,
    capabilities: Capabilities,
    phase: Phase,
}

impl<L: DriverLoader> DisplayStateMachine<L> {
    pub fn new(loader: L) -> Self {
        Self {
            loader,
            driver: None,
            capabilities: Capabilities::default(),
            phase: Phase::Uninit,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Capabilities of the open driver, `None` while uninitialised.
    pub fn capabilities(&self) -> Option<Capabilities> {
        self.driver.as_ref().map(|_| self.capabilities)
    }

    /// Full refresh: init in full mode, clear to white, push `frame`.
    ///
    /// Opens the driver if needed. Any earlier partial setup is dropped.
    pub fn full_update(&mut self, frame: &Frame) -> Result<(), DisplayError> {
        log::info!("FULL update");

        self.step("init", |d| d.init(RefreshMode::Full))?;
        self.step("clear", |d| d.clear(WHITE))?;
        self.step("display", |d| {
            let buffer = d.buffer(frame);
            d.display(&buffer)
        })?;

        self.phase = Phase::FullDone;
        Ok(())
    }

    /// Switches to partial mode with `base` as the diff baseline.
    ///
    /// Without base image support only the mode switch happens.
    pub fn prepare_partial(&mut self, base: &Frame) -> Result<(), DisplayError> {
        if self.driver.is_none() {
            log::warn!("Partial mode requested before a full update");
        }

        self.step("init", |d| d.init(RefreshMode::Partial))?;

        if self.capabilities.base_image {
            self.step("set_base_image", |d| {
                let buffer = d.buffer(base);
                d.set_base_image(&buffer)
            })?;
        } else {
            log::debug!("Driver has no base image, skipping baseline");
        }

        log::info!("PARTIAL mode ready");
        self.phase = Phase::PartialReady;
        Ok(())
    }

    /// Pushes `frame` as a partial update, preparing partial mode with
    /// `frame` as its own baseline when that was not done yet.
    pub fn partial_update(&mut self, frame: &Frame) -> Result<(), DisplayError> {
        if self.phase != Phase::PartialReady {
            log::debug!("Partial update from {:?}, preparing first", self.phase);
            self.prepare_partial(frame)?;
        }

        let partial = self.capabilities.partial_display;
        self.step("display_partial", |d| {
            let buffer = d.buffer(frame);
            if partial {
                d.display_partial(&buffer)
            } else {
                d.display(&buffer)
            }
        })?;

        log::info!("PARTIAL update");
        Ok(())
    }

    /// Puts the panel into deep sleep. Failures are only logged.
    pub fn sleep(&mut self) {
        let Some(driver) = self.driver.as_mut() else {
            return;
        };

        match driver.sleep() {
            Ok(()) => {
                log::debug!("Display asleep");
                self.phase = Phase::Asleep;
            }
            Err(e) => log::warn!("Display sleep failed: {}", e),
        }
    }

    /// Sleeps the panel and releases the driver. Safe to call repeatedly and
    /// from any phase.
    pub fn cleanup(&mut self) {
        if let Some(mut driver) = self.driver.take() {
            if self.phase != Phase::Asleep {
                if let Err(e) = driver.sleep() {
                    log::warn!("Display sleep during cleanup failed: {}", e);
                }
            }
            if let Err(e) = driver.release() {
                log::warn!("Display release failed: {}", e);
            }
            log::info!("Display released");
        }

        self.capabilities = Capabilities::default();
        self.phase = Phase::Uninit;
    }

    fn driver(&mut self) -> Result<&mut L::Driver, DisplayError> {
        let driver = match self.driver.take() {
            Some(driver) => driver,
            None => self.open()?,
        };
        Ok(self.driver.insert(driver))
    }

    fn open(&mut self) -> Result<L::Driver, DisplayError> {
        log::info!("Opening display driver");

        let driver = self.loader.open().map_err(|e| {
            log::error!("Display driver unavailable: {}", e);
            DisplayError::HardwareInit(e)
        })?;

        self.capabilities = driver.capabilities();
        if !self.capabilities.partial_display {
            log::debug!("Driver lacks display_partial, partial updates use display");
        }
        Ok(driver)
    }

    /// Runs one driver operation, entering `Error` when it fails.
    fn step<F>(&mut self, op: &'static str, f: F) -> Result<(), DisplayError>
    where
        F: FnOnce(&mut L::Driver) -> Result<(), DriverError>,
    {
        let result = f(self.driver()?);

        result.map_err(|source| {
            log::error!("Display {} failed: {}", op, source);
            self.phase = Phase::Error;
            DisplayError::DisplayWrite { op, source }
        })
    }
}

impl<L: DriverLoader> Drop for DisplayStateMachine<L> {
    fn drop(&mut self) {
        self.cleanup();
    }
}
