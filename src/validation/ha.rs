//! Control plane high availability.

use super::field::{ErrorList, FieldError, Path, validate_immutable_field};
use crate::crd::Shoot;

pub const FAILURE_TOLERANCE_TYPE_NODE: &str = "node";
pub const FAILURE_TOLERANCE_TYPE_ZONE: &str = "zone";
const AVAILABLE_FAILURE_TOLERANCE_TYPES: &[&str] =
    &[FAILURE_TOLERANCE_TYPE_NODE, FAILURE_TOLERANCE_TYPE_ZONE];

fn failure_tolerance_type_path() -> Path {
    Path::new("spec")
        .child("controlPlane")
        .child("highAvailability")
        .child("failureTolerance")
        .child("type")
}

pub fn validate_failure_tolerance_type_value(value: &str, path: &Path) -> ErrorList {
    if AVAILABLE_FAILURE_TOLERANCE_TYPES.contains(&value) {
        return ErrorList::new();
    }
    vec![FieldError::not_supported(
        path.clone(),
        value,
        AVAILABLE_FAILURE_TOLERANCE_TYPES,
    )]
}

pub fn validate_shoot_ha_config(shoot: &Shoot) -> ErrorList {
    match shoot.spec.failure_tolerance_type() {
        Some(value) => validate_failure_tolerance_type_value(value, &failure_tolerance_type_path()),
        None => ErrorList::new(),
    }
}

/// HA cannot be switched on while hibernated, and the tolerance type is
/// fixed once the shoot has been scheduled.
pub fn validate_shoot_ha_config_update(new: &Shoot, old: &Shoot) -> ErrorList {
    let mut errs = ErrorList::new();
    let path = failure_tolerance_type_path();

    let old_value = old.spec.failure_tolerance_type();
    let new_value = new.spec.failure_tolerance_type();

    if new_value.is_some() && old_value.is_none() && new.is_in_hibernation() {
        errs.push(FieldError::forbidden(
            path.clone(),
            "Shoot is currently hibernated and cannot be scaled up to HA. Please make sure your cluster has woken up before scaling it up to HA",
        ));
    }

    if let Some(old_value) = old_value {
        if new.spec.seed_name.is_some() {
            errs.extend(validate_immutable_field(
                new_value.unwrap_or_default(),
                old_value,
                &path,
            ));
        }
    }

    errs
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::crd::{ControlPlane, FailureTolerance, HighAvailability, ShootStatus};
    use crate::validation::field::ErrorType;

    fn shoot(failure_tolerance: Option<&str>) -> Shoot {
        let mut shoot = Shoot::new("test", Default::default());
        shoot.spec.control_plane = failure_tolerance.map(|t| ControlPlane {
            high_availability: Some(HighAvailability {
                failure_tolerance: FailureTolerance {
                    r#type: t.to_string(),
                },
            }),
        });
        shoot
    }

    #[test]
    fn test_failure_tolerance_values() {
        assert!(validate_shoot_ha_config(&shoot(Some("zone"))).is_empty());
        assert!(validate_shoot_ha_config(&shoot(None)).is_empty());
        let errs = validate_shoot_ha_config(&shoot(Some("region")));
        assert_eq!(errs[0].error_type, ErrorType::NotSupported);
        assert_eq!(
            errs[0].field.to_string(),
            "spec.controlPlane.highAvailability.failureTolerance.type"
        );
    }

    #[test]
    fn test_enable_ha_while_hibernated() {
        let old = shoot(None);
        let mut new = shoot(Some("node"));
        assert!(validate_shoot_ha_config_update(&new, &old).is_empty());

        new.status = Some(ShootStatus {
            hibernated: true,
            ..Default::default()
        });
        let errs = validate_shoot_ha_config_update(&new, &old);
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].error_type, ErrorType::Forbidden);
    }

    #[test]
    fn test_failure_tolerance_immutable_once_scheduled() {
        let old = shoot(Some("node"));
        let mut new = shoot(Some("zone"));
        assert!(validate_shoot_ha_config_update(&new, &old).is_empty());

        new.spec.seed_name = Some("aws-eu1".to_string());
        let errs = validate_shoot_ha_config_update(&new, &old);
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].detail, "field is immutable");

        let mut removed = shoot(None);
        removed.spec.seed_name = Some("aws-eu1".to_string());
        assert_eq!(validate_shoot_ha_config_update(&removed, &old).len(), 1);
    }
}
