use serde::Deserialize;
use serde_with::{serde_as, DurationMilliSeconds};
use std::{path::PathBuf, time::Duration};

use crate::error::{Result, RiseberryError};

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub player: PlayerConfig,
    pub button: Option<ButtonConfig>,
}

// ========================
// HTTP server
// ========================
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub addr: String,
    pub assets: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            addr: "0.0.0.0:80".to_string(),
            assets: PathBuf::from("./public"),
        }
    }
}

// ========================
// Sound player
// ========================

/// `command` is run through `/bin/sh -c`; `{file}` is replaced with the
/// shell-quoted sound path.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    pub command: String,
    pub sound: PathBuf,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "term_grace_ms")]
    pub term_grace: Duration,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        PlayerConfig {
            command: "aplay -q {file}".to_string(),
            sound: PathBuf::from("alarm.wav"),
            term_grace: Duration::from_secs(2),
        }
    }
}

// ========================
// GPIO button
// ========================
#[serde_as]
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ButtonConfig {
    pub pin: u32,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "sample_interval_ms", default = "default_sample_interval")]
    pub sample_interval: Duration,
}

impl ButtonConfig {
    pub fn new(pin: u32) -> Self {
        ButtonConfig {
            pin,
            sample_interval: default_sample_interval(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.sample_interval.is_zero() {
            Err(RiseberryError::InvalidConfig(
                "button sample_interval_ms must be greater than 0".to_string(),
            ))?
        }
        Ok(())
    }
}

fn default_sample_interval() -> Duration {
    Duration::from_millis(50)
}
