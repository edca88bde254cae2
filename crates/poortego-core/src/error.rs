use thiserror::Error;

/// Top-level error type for the Poortego core crate.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
}
