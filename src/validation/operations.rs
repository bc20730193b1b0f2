//! Admission of the `gardener.cloud/operation` and
//! `maintenance.gardener.cloud/operation` annotations.

use super::field::{ErrorList, FieldError, Path};
use super::rotation::{Credential, ROTATION, Rejection, RotationContext, RotationEvent, TransitionResult};
use crate::crd::Shoot;

pub const OPERATION_ANNOTATION: &str = "gardener.cloud/operation";
pub const MAINTENANCE_OPERATION_ANNOTATION: &str = "maintenance.gardener.cloud/operation";

pub const OPERATION_MAINTAIN: &str = "maintain";
pub const OPERATION_RETRY: &str = "retry";
pub const OPERATION_RECONCILE: &str = "reconcile";
pub const OPERATION_ROTATE_CA_START: &str = "rotate-ca-start";
pub const OPERATION_ROTATE_CA_COMPLETE: &str = "rotate-ca-complete";
pub const OPERATION_ROTATE_KUBECONFIG_CREDENTIALS: &str = "rotate-kubeconfig-credentials";
pub const OPERATION_ROTATE_OBSERVABILITY_CREDENTIALS: &str = "rotate-observability-credentials";
pub const OPERATION_ROTATE_SSH_KEYPAIR: &str = "rotate-ssh-keypair";
pub const OPERATION_ROTATE_CREDENTIALS_START: &str = "rotate-credentials-start";
pub const OPERATION_ROTATE_CREDENTIALS_COMPLETE: &str = "rotate-credentials-complete";
pub const OPERATION_ROTATE_ETCD_ENCRYPTION_KEY_START: &str = "rotate-etcd-encryption-key-start";
pub const OPERATION_ROTATE_ETCD_ENCRYPTION_KEY_COMPLETE: &str = "rotate-etcd-encryption-key-complete";
pub const OPERATION_ROTATE_SERVICE_ACCOUNT_KEY_START: &str = "rotate-serviceaccount-key-start";
pub const OPERATION_ROTATE_SERVICE_ACCOUNT_KEY_COMPLETE: &str = "rotate-serviceaccount-key-complete";

/// Operations that would touch the control plane of a sleeping cluster.
const FORBIDDEN_OPERATIONS_WHEN_HIBERNATED: &[&str] = &[
    OPERATION_ROTATE_CREDENTIALS_COMPLETE,
    OPERATION_ROTATE_CREDENTIALS_START,
    OPERATION_ROTATE_ETCD_ENCRYPTION_KEY_COMPLETE,
    OPERATION_ROTATE_ETCD_ENCRYPTION_KEY_START,
    OPERATION_ROTATE_SERVICE_ACCOUNT_KEY_COMPLETE,
    OPERATION_ROTATE_SERVICE_ACCOUNT_KEY_START,
];

// Sorted, as reported in NotSupported errors.
const AVAILABLE_MAINTENANCE_OPERATIONS: &[&str] = &[
    OPERATION_RECONCILE,
    OPERATION_ROTATE_CA_COMPLETE,
    OPERATION_ROTATE_CA_START,
    OPERATION_ROTATE_CREDENTIALS_COMPLETE,
    OPERATION_ROTATE_CREDENTIALS_START,
    OPERATION_ROTATE_ETCD_ENCRYPTION_KEY_COMPLETE,
    OPERATION_ROTATE_ETCD_ENCRYPTION_KEY_START,
    OPERATION_ROTATE_KUBECONFIG_CREDENTIALS,
    OPERATION_ROTATE_OBSERVABILITY_CREDENTIALS,
    OPERATION_ROTATE_SERVICE_ACCOUNT_KEY_COMPLETE,
    OPERATION_ROTATE_SERVICE_ACCOUNT_KEY_START,
    OPERATION_ROTATE_SSH_KEYPAIR,
];

const AVAILABLE_OPERATIONS: &[&str] = &[
    OPERATION_MAINTAIN,
    OPERATION_RECONCILE,
    OPERATION_RETRY,
    OPERATION_ROTATE_CA_COMPLETE,
    OPERATION_ROTATE_CA_START,
    OPERATION_ROTATE_CREDENTIALS_COMPLETE,
    OPERATION_ROTATE_CREDENTIALS_START,
    OPERATION_ROTATE_ETCD_ENCRYPTION_KEY_COMPLETE,
    OPERATION_ROTATE_ETCD_ENCRYPTION_KEY_START,
    OPERATION_ROTATE_KUBECONFIG_CREDENTIALS,
    OPERATION_ROTATE_OBSERVABILITY_CREDENTIALS,
    OPERATION_ROTATE_SERVICE_ACCOUNT_KEY_COMPLETE,
    OPERATION_ROTATE_SERVICE_ACCOUNT_KEY_START,
    OPERATION_ROTATE_SSH_KEYPAIR,
];

pub fn is_forbidden_when_hibernated(operation: &str) -> bool {
    FORBIDDEN_OPERATIONS_WHEN_HIBERNATED.contains(&operation)
}

/// Rotation request encoded by an operation, if any.
struct RotationRequest {
    credentials: &'static [Credential],
    event: RotationEvent,
    subject: &'static str,
}

const ALL_CREDENTIALS: &[Credential] = &Credential::ALL;
const CA: &[Credential] = &[Credential::CertificateAuthorities];
const SERVICE_ACCOUNT_KEY: &[Credential] = &[Credential::ServiceAccountKey];
const ETCD_ENCRYPTION_KEY: &[Credential] = &[Credential::EtcdEncryptionKey];

fn rotation_request(operation: &str) -> Option<RotationRequest> {
    let (credentials, event, subject) = match operation {
        OPERATION_ROTATE_CREDENTIALS_START => {
            (ALL_CREDENTIALS, RotationEvent::StartRequested, "rotation of all credentials")
        }
        OPERATION_ROTATE_CREDENTIALS_COMPLETE => {
            (ALL_CREDENTIALS, RotationEvent::CompleteRequested, "rotation of all credentials")
        }
        OPERATION_ROTATE_CA_START => (
            CA,
            RotationEvent::StartRequested,
            Credential::CertificateAuthorities.description(),
        ),
        OPERATION_ROTATE_CA_COMPLETE => (
            CA,
            RotationEvent::CompleteRequested,
            Credential::CertificateAuthorities.description(),
        ),
        OPERATION_ROTATE_SERVICE_ACCOUNT_KEY_START => (
            SERVICE_ACCOUNT_KEY,
            RotationEvent::StartRequested,
            Credential::ServiceAccountKey.description(),
        ),
        OPERATION_ROTATE_SERVICE_ACCOUNT_KEY_COMPLETE => (
            SERVICE_ACCOUNT_KEY,
            RotationEvent::CompleteRequested,
            Credential::ServiceAccountKey.description(),
        ),
        OPERATION_ROTATE_ETCD_ENCRYPTION_KEY_START => (
            ETCD_ENCRYPTION_KEY,
            RotationEvent::StartRequested,
            Credential::EtcdEncryptionKey.description(),
        ),
        OPERATION_ROTATE_ETCD_ENCRYPTION_KEY_COMPLETE => (
            ETCD_ENCRYPTION_KEY,
            RotationEvent::CompleteRequested,
            Credential::EtcdEncryptionKey.description(),
        ),
        _ => return None,
    };
    Some(RotationRequest {
        credentials,
        event,
        subject,
    })
}

/// Checks a rotation request against the phases observed in the status.
fn validate_operation_context(operation: &str, shoot: &Shoot, path: &Path) -> ErrorList {
    let mut errs = ErrorList::new();
    let Some(request) = rotation_request(operation) else {
        return errs;
    };

    let status = shoot.status.as_ref();
    let ctx = RotationContext::from_status(status);
    let verb = match request.event {
        RotationEvent::StartRequested => "start",
        _ => "complete",
    };

    let mut not_ready = false;
    let mut phase_errs = ErrorList::new();
    for credential in request.credentials {
        let TransitionResult::Rejected(rejections) =
            ROTATION.transition(credential.phase(status), request.event, &ctx)
        else {
            continue;
        };
        for rejection in rejections {
            match rejection {
                Rejection::NotReady => not_ready = true,
                Rejection::InvalidPhase { required, .. } => phase_errs.push(FieldError::forbidden(
                    path.clone(),
                    format!(
                        "cannot {} {} if .status.credentials.rotation.{}.phase is not '{}'",
                        verb,
                        request.subject,
                        credential.status_field(),
                        required
                    ),
                )),
            }
        }
    }

    if not_ready {
        errs.push(FieldError::forbidden(
            path.clone(),
            format!(
                "cannot {} {} if shoot was not yet created successfully or is not ready for reconciliation",
                verb, request.subject
            ),
        ));
    }
    errs.extend(phase_errs);
    errs
}

/// Validates both operation annotations of `shoot` below `path` (`metadata.annotations`).
pub fn validate_shoot_operation(shoot: &Shoot, path: &Path) -> ErrorList {
    let mut errs = ErrorList::new();
    let operation = shoot.annotation(OPERATION_ANNOTATION).unwrap_or_default();
    let maintenance_operation = shoot
        .annotation(MAINTENANCE_OPERATION_ANNOTATION)
        .unwrap_or_default();

    if operation.is_empty() && maintenance_operation.is_empty() {
        return errs;
    }

    let op_path = path.key(OPERATION_ANNOTATION);
    let maintenance_op_path = path.key(MAINTENANCE_OPERATION_ANNOTATION);

    if operation == maintenance_operation {
        errs.push(FieldError::forbidden(
            path.clone(),
            format!("annotations {} and {} must not be equal", op_path, maintenance_op_path),
        ));
    }

    let hibernated = shoot.is_in_hibernation();
    for (value, value_path, allowed) in [
        (operation, &op_path, AVAILABLE_OPERATIONS),
        (maintenance_operation, &maintenance_op_path, AVAILABLE_MAINTENANCE_OPERATIONS),
    ] {
        if value.is_empty() {
            continue;
        }
        if !allowed.contains(&value) {
            errs.push(FieldError::not_supported(value_path.clone(), value, allowed));
        }
        if hibernated && is_forbidden_when_hibernated(value) {
            errs.push(FieldError::forbidden(
                value_path.clone(),
                "operation is not permitted when shoot is hibernated",
            ));
        }
    }

    errs.extend(validate_operation_context(operation, shoot, &op_path));
    errs.extend(validate_operation_context(maintenance_operation, shoot, &maintenance_op_path));

    errs
}
