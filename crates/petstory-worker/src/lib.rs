//! Background order processing: the pipeline that turns an accepted order
//! into artifacts on disk and an outgoing email.

pub mod pipeline;

pub use pipeline::OrderPipeline;
