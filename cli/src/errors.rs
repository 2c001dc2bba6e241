use error_stack::Result;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CLIError {
    #[error("Failed to load config: {0}")]
    Config(String),

    #[error("Failed to set up logging: {0}")]
    Logging(String),

    #[error("Failed to start {0}")]
    Startup(&'static str),

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    #[error("HTTP server error: {0}")]
    Server(#[from] std::io::Error),
}

pub type CLIResult<T> = Result<T, CLIError>;
