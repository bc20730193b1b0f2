//! Multi-step lifecycle scenarios validated through the public API.

use jiff::Timestamp;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;

use crate::common::fixtures::{ShootBuilder, worker};
use shoot_admission::crd::{CredentialsRotationPhase, LastOperationState, LastOperationType};
use shoot_admission::validation::operations::{
    OPERATION_ANNOTATION, OPERATION_ROTATE_CA_COMPLETE, OPERATION_ROTATE_CA_START,
    OPERATION_ROTATE_KUBECONFIG_CREDENTIALS,
};
use shoot_admission::{ErrorType, validate_shoot, validate_shoot_update};

fn details(errs: &shoot_admission::ErrorList) -> Vec<String> {
    errs.iter().map(|e| e.detail.clone()).collect()
}

// ============================================================================
// Create and update
// ============================================================================

/// Create, scale and upgrade one minor at a time.
#[test]
fn test_create_scale_upgrade() {
    let created = ShootBuilder::new("crazy-botany").build();
    assert!(validate_shoot(&created).is_empty());

    let scaled = ShootBuilder::new("crazy-botany")
        .workers(vec![worker("cpu-worker", 2, 5), worker("gpu-worker", 0, 2)])
        .build();
    let errs = validate_shoot_update(&scaled, &created);
    assert!(errs.is_empty(), "{:?}", errs);

    let upgraded = ShootBuilder::new("crazy-botany")
        .workers(vec![worker("cpu-worker", 2, 5), worker("gpu-worker", 0, 2)])
        .kubernetes_version("1.28.2")
        .build();
    let errs = validate_shoot_update(&upgraded, &scaled);
    assert!(errs.is_empty(), "{:?}", errs);

    let skipped = ShootBuilder::new("crazy-botany")
        .workers(vec![worker("cpu-worker", 2, 5), worker("gpu-worker", 0, 2)])
        .kubernetes_version("1.30.0")
        .build();
    let errs = validate_shoot_update(&skipped, &upgraded);
    assert!(details(&errs).contains(&"kubernetes version upgrade cannot skip a minor version".to_string()));
}

/// A shoot cannot lose all of its pools.
#[test]
fn test_switch_to_workerless_rejected() {
    let old = ShootBuilder::new("crazy-botany").build();
    let new = ShootBuilder::new("crazy-botany")
        .workers(vec![])
        .networking(None)
        .build();
    let errs = validate_shoot_update(&new, &old);
    assert!(errs.iter().any(|e| {
        e.field.to_string() == "spec.provider.workers"
            && e.detail == "cannot switch from a Shoot with workers to a workerless Shoot"
    }));
}

// ============================================================================
// Credential rotation
// ============================================================================

fn rotating(phase: Option<CredentialsRotationPhase>, operation: Option<&str>) -> ShootBuilder {
    let mut builder = ShootBuilder::new("crazy-botany")
        .last_operation(LastOperationType::Reconcile, LastOperationState::Succeeded);
    if let Some(phase) = phase {
        builder = builder.ca_rotation_phase(phase);
    }
    if let Some(operation) = operation {
        builder = builder.annotation(OPERATION_ANNOTATION, operation);
    }
    builder
}

/// Start, prepare, complete and restart a CA rotation.
#[test]
fn test_ca_rotation_sequence() {
    let steps: &[(Option<CredentialsRotationPhase>, &str, bool)] = &[
        (None, OPERATION_ROTATE_CA_START, true),
        (None, OPERATION_ROTATE_CA_COMPLETE, false),
        (Some(CredentialsRotationPhase::Preparing), OPERATION_ROTATE_CA_COMPLETE, false),
        (Some(CredentialsRotationPhase::Prepared), OPERATION_ROTATE_CA_COMPLETE, true),
        (Some(CredentialsRotationPhase::Prepared), OPERATION_ROTATE_CA_START, false),
        (Some(CredentialsRotationPhase::Completing), OPERATION_ROTATE_CA_START, false),
        (Some(CredentialsRotationPhase::Completed), OPERATION_ROTATE_CA_START, true),
    ];

    for (phase, operation, admitted) in steps {
        let old = rotating(*phase, None).build();
        let new = rotating(*phase, Some(*operation)).build();
        let errs = validate_shoot_update(&new, &old);
        assert_eq!(
            errs.is_empty(),
            *admitted,
            "{} with phase {:?}: {:?}",
            operation,
            phase,
            errs
        );
    }
}

/// A start needs a successful creation or an ongoing reconciliation.
#[test]
fn test_rotation_requires_ready_shoot() {
    let failed = ShootBuilder::new("crazy-botany")
        .last_operation(LastOperationType::Create, LastOperationState::Failed)
        .annotation(OPERATION_ANNOTATION, OPERATION_ROTATE_CA_START)
        .build();
    let errs = validate_shoot(&failed);
    assert_eq!(errs.len(), 1);
    assert_eq!(errs[0].error_type, ErrorType::Forbidden);

    let restored = ShootBuilder::new("crazy-botany")
        .last_operation(LastOperationType::Restore, LastOperationState::Succeeded)
        .annotation(OPERATION_ANNOTATION, OPERATION_ROTATE_CA_START)
        .build();
    assert!(validate_shoot(&restored).is_empty());
}

// ============================================================================
// Deletion
// ============================================================================

fn deleting() -> ShootBuilder {
    ShootBuilder::new("crazy-botany").deletion_timestamp(Time(Timestamp::UNIX_EPOCH))
}

/// Once deletion started, the spec is frozen.
#[test]
fn test_spec_frozen_in_deletion() {
    let old = deleting().build();
    assert!(validate_shoot_update(&old, &old).is_empty());

    let new = deleting().worker("cpu-worker", 1, 5).build();
    let errs = validate_shoot_update(&new, &old);
    assert_eq!(errs.len(), 1);
    assert_eq!(errs[0].field.to_string(), "spec");
    assert_eq!(errs[0].error_type, ErrorType::Forbidden);
    assert!(errs[0].detail.contains("maximum"), "{}", errs[0].detail);
}

/// Kubeconfig rotation cannot be requested while deleting.
#[test]
fn test_kubeconfig_rotation_in_deletion() {
    let old = deleting().build();
    let new = deleting()
        .annotation(OPERATION_ANNOTATION, OPERATION_ROTATE_KUBECONFIG_CREDENTIALS)
        .build();
    let errs = validate_shoot_update(&new, &old);
    assert_eq!(
        details(&errs),
        vec!["kubeconfig rotations is not allowed for clusters in deletion".to_string()]
    );

    // already requested before deletion started
    let errs = validate_shoot_update(&new, &new);
    assert!(errs.is_empty(), "{:?}", errs);
}
