//! Everything that ends up as pixels.
//!
//! [`layout::LayoutEngine`] draws into a [`frame::Frame`] using the helpers
//! next to it: font resolution, text fitting, the month grid and paging.

pub mod calendar;
pub mod font;
pub mod frame;
pub mod layout;
pub mod paginate;
pub mod text;

pub use frame::Frame;
pub use layout::{LayoutEngine, RenderedPage};
