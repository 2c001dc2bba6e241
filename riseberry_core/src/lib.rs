//! Core of the riseberry alarm clock: the alarm and playback actors, the
//! HTTP adapter and the GPIO stop button.

pub mod actor;
pub mod alarm;
pub mod button;
pub mod config;
pub mod config_loader;
pub mod error;
pub mod http;
pub mod process;

#[cfg(test)]
mod testing;
