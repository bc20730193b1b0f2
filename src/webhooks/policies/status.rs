//! Status subresource admission policy.

use super::{ValidationContext, ValidationResult};
use crate::crd::ShootStatus;
use crate::validation::validate_shoot_status_update;

pub const REASON: &str = "ShootStatusInvalid";

pub fn validate(ctx: &ValidationContext<'_>) -> ValidationResult {
    let Some(old) = ctx.old_shoot else {
        return ValidationResult::allowed();
    };

    let unset = ShootStatus::default();
    let new_status = ctx.shoot.status.as_ref().unwrap_or(&unset);
    let old_status = old.status.as_ref().unwrap_or(&unset);

    ValidationResult::from_errors(
        REASON,
        ctx.name(),
        validate_shoot_status_update(new_status, old_status),
    )
}
