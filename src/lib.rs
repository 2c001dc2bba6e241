//! Alarm clock controller for a Raspberry Pi: one alarm, one sound, one button.
//!
//! The implementation lives in [`riseberry_core`]; this crate re-exports it.

pub use riseberry_core::*;
