//! External collaborators of the order pipeline: the generative image API,
//! the SMTP notification dispatcher and the payment approval store.
//!
//! Each collaborator is fronted by a trait so the worker can be exercised
//! with mocks; the concrete implementations here talk to the real services.

pub mod email;
pub mod generate;
pub mod payment;

pub use email::{EmailService, KitNotifier};
pub use generate::{GeminiGenerator, ImageGenerator, TransformError};
pub use payment::{InMemoryPaymentStore, PaymentRecord, PaymentStatus, PaymentStore};
