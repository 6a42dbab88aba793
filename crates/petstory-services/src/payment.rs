//! Payment approval store.
//!
//! Consulted by the request boundary as a gate before an order may be
//! submitted; the pipeline itself never touches payments. The store is a
//! trait so the in-memory map can be swapped for a real database without
//! touching either the boundary or the pipeline.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PaymentStatus {
    Approved,
    Pending,
    Rejected,
}

impl PaymentStatus {
    /// Provider status strings as reported by the webhook.
    pub fn parse(status: &str) -> Self {
        match status {
            "approved" => Self::Approved,
            "pending" | "in_process" => Self::Pending,
            _ => Self::Rejected,
        }
    }
}

#[derive(Clone, Debug)]
pub struct PaymentRecord {
    pub payment_id: String,
    pub status: PaymentStatus,
    pub email: String,
    pub pet_name: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// Record or update a payment's status.
    async fn record(&self, record: PaymentRecord);

    /// Whether this payment identifier has an approved capture.
    async fn is_approved(&self, payment_id: &str) -> bool;

    /// Whether this (email, pet name) pair has an approved payment newer
    /// than `within`.
    async fn has_recent_approval(&self, email: &str, pet_name: &str, within: Duration) -> bool;
}

/// Process-local map keyed by payment id. Good enough for a single instance;
/// deployments wanting durability implement [`PaymentStore`] over a database.
#[derive(Default)]
pub struct InMemoryPaymentStore {
    records: RwLock<HashMap<String, PaymentRecord>>,
}

impl InMemoryPaymentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PaymentStore for InMemoryPaymentStore {
    async fn record(&self, record: PaymentRecord) {
        tracing::info!(
            payment_id = %record.payment_id,
            status = ?record.status,
            email = %record.email,
            "payment status recorded"
        );
        self.records
            .write()
            .await
            .insert(record.payment_id.clone(), record);
    }

    async fn is_approved(&self, payment_id: &str) -> bool {
        self.records
            .read()
            .await
            .get(payment_id)
            .map(|r| r.status == PaymentStatus::Approved)
            .unwrap_or(false)
    }

    async fn has_recent_approval(&self, email: &str, pet_name: &str, within: Duration) -> bool {
        let cutoff = Utc::now() - within;
        self.records.read().await.values().any(|r| {
            r.status == PaymentStatus::Approved
                && r.recorded_at >= cutoff
                && r.email.eq_ignore_ascii_case(email)
                && r.pet_name
                    .as_deref()
                    .map(|n| n.eq_ignore_ascii_case(pet_name))
                    .unwrap_or(false)
        })
    }
}
