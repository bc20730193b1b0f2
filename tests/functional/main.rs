// Test code is allowed to panic on failure
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic,
    clippy::string_slice
)]

//! Functional tests for the Shoot lifecycle.
//!
//! These tests walk a Shoot through creation, updates, credential rotation
//! and deletion WITHOUT a Kubernetes API server. Each step builds the object
//! an API server would hand to the webhook and checks the admission decision.
//!
//! ```bash
//! # Run all functional tests
//! cargo test --test functional
//!
//! # Run specific test
//! cargo test --test functional test_ca_rotation_sequence
//! ```

#[path = "../common/mod.rs"]
mod common;

mod admission_tests;
mod lifecycle_tests;
