//! Domain models: orders, pipeline outcomes and delivery outcomes.

use std::path::PathBuf;

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Timestamp format shared by the order directory and every file written for
/// the order. Second resolution; the request boundary generates a fresh one
/// per submission, which is what keeps working directories disjoint.
pub const ORDER_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// One uploaded photo, captured in memory by the request boundary.
#[derive(Clone)]
pub struct PhotoUpload {
    pub bytes: Vec<u8>,
    pub original_filename: String,
    pub content_type: String,
}

impl PhotoUpload {
    /// Extension for the copy persisted in the working directory, taken from
    /// the original filename with a jpg fallback.
    pub fn extension(&self) -> &str {
        std::path::Path::new(&self.original_filename)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("jpg")
    }
}

/// One end-to-end customer submission.
#[derive(Clone)]
pub struct Order {
    pub email: String,
    pub pet_name: String,
    pub pet_date: String,
    pub pet_story: String,
    /// 1..=10 raw photos, in submission order.
    pub photos: Vec<PhotoUpload>,
    /// Creation instant in [`ORDER_TIMESTAMP_FORMAT`]; also namespaces the
    /// working directory.
    pub timestamp: String,
}

impl Order {
    pub fn new(
        email: String,
        pet_name: String,
        pet_date: String,
        pet_story: String,
        photos: Vec<PhotoUpload>,
    ) -> Self {
        Self {
            email,
            pet_name,
            pet_date,
            pet_story,
            photos,
            timestamp: Utc::now().format(ORDER_TIMESTAMP_FORMAT).to_string(),
        }
    }

    /// Same order with a caller-supplied timestamp. Tests and retried
    /// submissions use this; a retry must supply a fresh timestamp.
    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = timestamp.into();
        self
    }
}

/// Outcome of the single notification attempt for an order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeliveryOutcome {
    Delivered,
    /// SMTP credentials absent; no network call was attempted.
    NotConfigured,
    Failed(String),
}

/// Pipeline stage, for failure attribution in the terminal record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineStage {
    GeneratingArt,
    Composing,
    Rendering,
    /// Never present on a failure record: notification failures are folded
    /// into the success record's [`DeliveryOutcome`], so the order stays
    /// successful. Listed so the taxonomy names every stage of a run.
    Notifying,
}

/// Terminal, immutable record of one order's processing. Exactly one is
/// produced per order.
#[derive(Clone, Debug, Serialize)]
pub struct PipelineResult {
    pub pet_name: String,
    pub email: String,
    pub outcome: PipelineOutcome,
}

#[derive(Clone, Debug, Serialize)]
pub enum PipelineOutcome {
    Success {
        pdf_path: PathBuf,
        tribute_path: PathBuf,
        photos_received: usize,
        arts_generated: usize,
        delivery: DeliveryOutcome,
    },
    Failure {
        stage: PipelineStage,
        reason: String,
    },
}

impl PipelineResult {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, PipelineOutcome::Success { .. })
    }
}
