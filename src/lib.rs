//! E-paper agenda and calendar
//!
//! Renders today's schedule next to a month calendar and a clock on a
//! 250x122 e-paper panel, refreshing it with partial updates.
//!
//! ### Usage
//!
//! 1. build a [`config::Config`], usually with [`config::Config::from_env`]
//! 1. pick a [`schedule::ScheduleSource`] for today's items
//! 1. hand both with a [`epd::DriverLoader`] to [`runner::Runner`] and call
//!    [`runner::Runner::run`]
//!
//! [`runner::dry_run`] renders a single frame to PNG instead.

pub mod config;
pub mod epd;
pub mod render;
pub mod runner;
pub mod schedule;
