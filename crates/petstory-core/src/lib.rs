//! Core types for the PetStory order pipeline: configuration, error types,
//! domain models and the slug/path allocator.
//!
//! This crate is a leaf; the service, processing and worker crates all build
//! on it.

pub mod config;
pub mod error;
pub mod models;
pub mod slug;

pub use config::Config;
pub use error::ConfigError;
pub use models::{
    DeliveryOutcome, Order, PhotoUpload, PipelineOutcome, PipelineResult, PipelineStage,
};
