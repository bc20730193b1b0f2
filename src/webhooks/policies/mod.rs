//! Validation policies for Shoot admission webhooks.
//!
//! Policies are selected by what the request changes:
//! - Spec: create and update of the Shoot object itself
//! - Status: updates through the `status` subresource

pub mod shoot;
pub mod status;

use crate::crd::Shoot;
use crate::validation::{ErrorList, FieldError};

/// Subresource name of status updates.
pub const STATUS_SUBRESOURCE: &str = "status";

/// Result of a validation check
#[derive(Debug)]
pub struct ValidationResult {
    /// Whether the validation passed
    pub allowed: bool,
    /// Reason for denial (if not allowed)
    pub reason: Option<String>,
    /// Detailed message (if not allowed)
    pub message: Option<String>,
    /// Every field error behind a denial
    pub errors: ErrorList,
}

impl ValidationResult {
    pub fn allowed() -> Self {
        Self {
            allowed: true,
            reason: None,
            message: None,
            errors: ErrorList::new(),
        }
    }

    /// Allowed iff `errors` is empty; otherwise denied with the rendering
    /// `kubectl` shows for API server validation failures.
    pub fn from_errors(reason: &str, name: &str, errors: ErrorList) -> Self {
        if errors.is_empty() {
            return Self::allowed();
        }
        Self {
            allowed: false,
            reason: Some(reason.to_string()),
            message: Some(invalid_message(name, &errors)),
            errors,
        }
    }
}

/// `Shoot.core.gardener.cloud "<name>" is invalid: <errors>`
fn invalid_message(name: &str, errors: &[FieldError]) -> String {
    let rendered: Vec<String> = errors.iter().map(ToString::to_string).collect();
    let details = match rendered.as_slice() {
        [single] => single.clone(),
        many => format!("[{}]", many.join(", ")),
    };
    format!("Shoot.core.gardener.cloud {:?} is invalid: {}", name, details)
}

/// Context for validation
pub struct ValidationContext<'a> {
    /// The shoot being admitted
    pub shoot: &'a Shoot,
    /// The stored shoot (for UPDATE operations)
    pub old_shoot: Option<&'a Shoot>,
    /// Requested subresource, if any
    pub subresource: Option<&'a str>,
    /// Whether this is a dry-run request
    pub dry_run: bool,
    /// The namespace of the shoot
    pub namespace: Option<&'a str>,
}

impl<'a> ValidationContext<'a> {
    /// Check if this is an UPDATE operation
    pub fn is_update(&self) -> bool {
        self.old_shoot.is_some()
    }

    pub fn is_status_update(&self) -> bool {
        self.is_update() && self.subresource == Some(STATUS_SUBRESOURCE)
    }

    pub fn name(&self) -> &str {
        self.shoot.metadata.name.as_deref().unwrap_or_default()
    }
}

/// Run the policy matching the request
pub fn validate_all(ctx: &ValidationContext<'_>) -> ValidationResult {
    if ctx.is_status_update() {
        return status::validate(ctx);
    }
    shoot::validate(ctx)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::validation::Path;

    #[test]
    fn test_from_errors_message() {
        let single = vec![FieldError::required(
            Path::new("spec").child("region"),
            "must specify a region",
        )];
        let result = ValidationResult::from_errors("ShootInvalid", "foo", single);
        assert!(!result.allowed);
        assert_eq!(
            result.message.unwrap(),
            "Shoot.core.gardener.cloud \"foo\" is invalid: spec.region: Required value: must specify a region"
        );

        let many = vec![
            FieldError::required(Path::new("spec").child("region"), "must specify a region"),
            FieldError::forbidden(Path::new("spec").child("addons"), "nope"),
        ];
        let result = ValidationResult::from_errors("ShootInvalid", "foo", many);
        assert_eq!(result.errors.len(), 2);
        assert!(result.message.unwrap().ends_with("spec.addons: Forbidden: nope]"));

        assert!(ValidationResult::from_errors("ShootInvalid", "foo", vec![]).allowed);
    }
}
