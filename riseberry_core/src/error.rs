use thiserror::Error;

#[derive(Error, Debug)]
pub enum RiseberryError {
    #[error("Invalid alarm: {0}")]
    InvalidAlarm(String),

    #[error("Invalid player command: {0}")]
    InvalidCommand(String),

    #[error("Failed to start player process: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("Failed to wait for player process: {0}")]
    Wait(std::io::Error),

    #[error("Player exited with {status}: {output}")]
    PlaybackFailed { status: String, output: String },

    #[error("Failed to signal player process: {0}")]
    Signal(#[from] nix::errno::Errno),

    #[error("GPIO error: {0}")]
    Gpio(String),

    #[error("{0} is closed")]
    Closed(&'static str),

    #[error("Failed to read config file: {0}")]
    ConfigRead(String),

    #[error("Unable to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = error_stack::Result<T, RiseberryError>;
