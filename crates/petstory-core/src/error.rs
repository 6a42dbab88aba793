//! Configuration error type.
//!
//! Component-level errors (transform, compose, render) live next to the code
//! that produces them in the service and processing crates; this crate only
//! owns the error surface of configuration loading.

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("invalid value for {name}: {value:?}")]
    InvalidVar { name: &'static str, value: String },
}
