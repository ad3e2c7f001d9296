// src/lib.rs

//! RS485 protocol engine for Flexit ventilation-unit controllers.
//!
//! The crate synchronizes to the controller's unframed byte stream, decodes
//! status frames into [`Reading`]s through data-driven layouts, and gets
//! register writes onto a half-duplex bus the controller may be driving on
//! its own. Hardware access goes through the [`Rs485Serial`] and [`BusTimer`]
//! traits so the whole engine runs against a virtual clock in tests.
//!
//! [`BusArbiter`] owns the transceiver and all mutable state; drive it by
//! calling [`BusArbiter::service`] from the application loop.

#![cfg_attr(not(test), no_std)]

pub mod arbiter;
pub mod common;

// Re-export key types for convenience
pub use arbiter::{ArbiterConfig, BusArbiter, BusMode, BusState, CycleReport};
pub use common::{
    BusError, BusTimer, DecodeError, Direction, FrameLayout, OutboundCommand, Reading,
    ReadingState, Rs485Serial, Temperature,
};
