//! Validating admission webhooks for Shoots.
//!
//! Requests are dispatched to a policy by what they change:
//! - Spec: full create/update validation
//! - Status: identity and advertised address checks

pub mod policies;
mod server;

pub use policies::{ValidationContext, ValidationResult};
pub use server::{ReviewOutcome, WebhookState, create_webhook_router, operation_label, review_shoot, run_webhook_server};

// Re-export kube-rs admission types for contract testing
pub use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview, Operation};
