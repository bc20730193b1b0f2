//! shoot-admission library crate
//!
//! Validation and lifecycle-transition rules for Gardener Shoot clusters,
//! plus the admission webhook that serves them.

pub mod config;
pub mod crd;
pub mod error;
pub mod features;
pub mod health;
pub mod validation;
pub mod webhooks;

pub use config::Config;
pub use error::{Error, Result};
pub use health::HealthState;
pub use validation::{
    ErrorList, ErrorType, FieldError, Path, validate_shoot, validate_shoot_status_update,
    validate_shoot_update,
};
pub use webhooks::run_webhook_server;
