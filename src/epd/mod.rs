//! E-paper panel access.
//!
//! A panel is driven through [`PanelDriver`], which mirrors the operations a
//! vendor driver offers: initialise in a refresh mode, clear, push a full or
//! partial buffer, register a partial baseline and sleep. Optional operations
//! are announced through [`Capabilities`] once, when the driver is opened, so
//! callers never probe for them per call.
//!
//! [`DisplayStateMachine`] owns the single driver instance of the process and
//! is the only thing that talks to it.

pub mod pins;
pub mod state;
pub mod waveshare;

use std::fmt;

use crate::render::frame::Frame;

pub use state::{DisplayError, DisplayStateMachine, Phase};

/// Fill byte clearing the panel to white.
pub const WHITE: u8 = 0xFF;

/// Waveform set used by the next pushes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshMode {
    /// Slow, flashes the panel, removes ghosting.
    Full,
    /// Fast, only changed pixels move.
    Partial,
}

impl fmt::Display for RefreshMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefreshMode::Full => write!(f, "FULL"),
            RefreshMode::Partial => write!(f, "PARTIAL"),
        }
    }
}

/// Optional driver operations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    /// [`PanelDriver::display_partial`] is available; otherwise partial
    /// pushes go through [`PanelDriver::display`].
    pub partial_display: bool,
    /// [`PanelDriver::set_base_image`] is available.
    pub base_image: bool,
}

/// Failure reported by a panel driver.
#[derive(Debug)]
pub enum DriverError {
    /// Device node or driver module could not be opened.
    Open(String),
    /// SPI transfer failed.
    Bus(String),
    /// GPIO line could not be requested or driven.
    Gpio(String),
    /// Operation the driver does not provide.
    Unsupported(&'static str),
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriverError::Open(msg) => write!(f, "open failed: {}", msg),
            DriverError::Bus(msg) => write!(f, "bus error: {}", msg),
            DriverError::Gpio(msg) => write!(f, "gpio error: {}", msg),
            DriverError::Unsupported(op) => write!(f, "{} not supported by driver", op),
        }
    }
}

impl std::error::Error for DriverError {}

/// Operations of an opened panel.
pub trait PanelDriver {
    /// Queried once right after opening.
    fn capabilities(&self) -> Capabilities;

    fn init(&mut self, mode: RefreshMode) -> Result<(), DriverError>;

    /// Fills the whole panel with `fill` and refreshes.
    fn clear(&mut self, fill: u8) -> Result<(), DriverError>;

    /// Converts a frame into the panel's native buffer layout.
    fn buffer(&self, frame: &Frame) -> Vec<u8>;

    fn display(&mut self, buffer: &[u8]) -> Result<(), DriverError>;

    fn display_partial(&mut self, _buffer: &[u8]) -> Result<(), DriverError> {
        Err(DriverError::Unsupported("display_partial"))
    }

    /// Registers the baseline partial updates are diffed against.
    fn set_base_image(&mut self, _buffer: &[u8]) -> Result<(), DriverError> {
        Err(DriverError::Unsupported("set_base_image"))
    }

    fn sleep(&mut self) -> Result<(), DriverError>;

    /// Shuts the driver down and releases the bus and GPIO lines.
    fn release(self) -> Result<(), DriverError>
    where
        Self: Sized;
}

/// Opens the panel driver on demand.
pub trait DriverLoader {
    type Driver: PanelDriver;

    fn open(&mut self) -> Result<Self::Driver, DriverError>;
}

#[cfg(test)]
pub(crate) mod fake {
    //! Recording driver for tests.

    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Op {
        Open,
        Capabilities,
        Init(RefreshMode),
        Clear(u8),
        Display,
        DisplayPartial,
        SetBase,
        Sleep,
        Release,
    }

    #[derive(Debug, Default)]
    struct Bench {
        ops: Vec<Op>,
        failing: Vec<Op>,
        live: usize,
        max_live: usize,
    }

    /// Loader handing out [`FakeDriver`]s that share one operation log.
    #[derive(Debug, Clone)]
    pub struct FakeLoader {
        bench: Rc<RefCell<Bench>>,
        capabilities: Capabilities,
    }

    impl FakeLoader {
        pub fn new(capabilities: Capabilities) -> Self {
            Self {
                bench: Rc::default(),
                capabilities,
            }
        }

        /// Driver offering every optional operation.
        pub fn capable() -> Self {
            Self::new(Capabilities {
                partial_display: true,
                base_image: true,
            })
        }

        pub fn ops(&self) -> Vec<Op> {
            self.bench.borrow().ops.clone()
        }

        pub fn count(&self, op: Op) -> usize {
            self.bench.borrow().ops.iter().filter(|o| **o == op).count()
        }

        pub fn clear_ops(&self) {
            self.bench.borrow_mut().ops.clear();
        }

        /// Makes every later `op` fail, including [`Op::Open`].
        pub fn fail(&self, op: Op) {
            self.bench.borrow_mut().failing.push(op);
        }

        pub fn heal(&self) {
            self.bench.borrow_mut().failing.clear();
        }

        /// Drivers opened and not yet released.
        pub fn live(&self) -> usize {
            self.bench.borrow().live
        }

        pub fn max_live(&self) -> usize {
            self.bench.borrow().max_live
        }
    }

    impl DriverLoader for FakeLoader {
        type Driver = FakeDriver;

        fn open(&mut self) -> Result<FakeDriver, DriverError> {
            {
                let mut bench = self.bench.borrow_mut();
                bench.ops.push(Op::Open);
                if bench.failing.contains(&Op::Open) {
                    return Err(DriverError::Open("no such device".to_string()));
                }
                bench.live += 1;
                bench.max_live = bench.max_live.max(bench.live);
            }

            Ok(FakeDriver {
                bench: Rc::clone(&self.bench),
                capabilities: self.capabilities,
            })
        }
    }

    pub struct FakeDriver {
        bench: Rc<RefCell<Bench>>,
        capabilities: Capabilities,
    }

    impl FakeDriver {
        fn record(&self, op: Op) -> Result<(), DriverError> {
            let mut bench = self.bench.borrow_mut();
            bench.ops.push(op);
            if bench.failing.contains(&op) {
                Err(DriverError::Bus(format!("{:?} failed", op)))
            } else {
                Ok(())
            }
        }
    }

    impl PanelDriver for FakeDriver {
        fn capabilities(&self) -> Capabilities {
            self.bench.borrow_mut().ops.push(Op::Capabilities);
            self.capabilities
        }

        fn init(&mut self, mode: RefreshMode) -> Result<(), DriverError> {
            self.record(Op::Init(mode))
        }

        fn clear(&mut self, fill: u8) -> Result<(), DriverError> {
            self.record(Op::Clear(fill))
        }

        fn buffer(&self, frame: &Frame) -> Vec<u8> {
            frame.bytes().to_vec()
        }

        fn display(&mut self, _buffer: &[u8]) -> Result<(), DriverError> {
            self.record(Op::Display)
        }

        fn display_partial(&mut self, _buffer: &[u8]) -> Result<(), DriverError> {
            self.record(Op::DisplayPartial)
        }

        fn set_base_image(&mut self, _buffer: &[u8]) -> Result<(), DriverError> {
            self.record(Op::SetBase)
        }

        fn sleep(&mut self) -> Result<(), DriverError> {
            self.record(Op::Sleep)
        }

        fn release(self) -> Result<(), DriverError> {
            let result = self.record(Op::Release);
            self.bench.borrow_mut().live -= 1;
            result
        }
    }
}
