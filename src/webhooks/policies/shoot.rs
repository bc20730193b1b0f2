//! Spec admission policy.
//!
//! CREATE runs the full Shoot validation; UPDATE additionally checks the
//! transition from the stored object.

use super::{ValidationContext, ValidationResult};
use crate::validation::{validate_shoot, validate_shoot_update};

pub const REASON: &str = "ShootInvalid";

pub fn validate(ctx: &ValidationContext<'_>) -> ValidationResult {
    let errors = match ctx.old_shoot {
        Some(old) => validate_shoot_update(ctx.shoot, old),
        None => validate_shoot(ctx.shoot),
    };
    ValidationResult::from_errors(REASON, ctx.name(), errors)
}
