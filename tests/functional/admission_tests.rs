//! Admission reviews as the API server sends them.

use serde_json::{Value, json};

use crate::common::fixtures::ShootBuilder;
use shoot_admission::crd::Shoot;
use shoot_admission::webhooks::{AdmissionRequest, AdmissionReview, review_shoot};

fn review(operation: &str, new: &Shoot, old: Option<&Shoot>, sub_resource: Option<&str>) -> AdmissionRequest<Shoot> {
    let mut request = json!({
        "uid": "e911857d-c318-11e8-bbad-025000000001",
        "kind": {"group": "core.gardener.cloud", "version": "v1beta1", "kind": "Shoot"},
        "resource": {"group": "core.gardener.cloud", "version": "v1beta1", "resource": "shoots"},
        "operation": operation,
        "userInfo": {"username": "admin"},
        "name": new.metadata.name.clone().unwrap_or_default(),
        "namespace": "garden-dev",
        "dryRun": false,
        "object": serde_json::to_value(new).unwrap(),
    });
    if let Some(old) = old {
        request["oldObject"] = serde_json::to_value(old).unwrap();
    }
    if let Some(sub) = sub_resource {
        request["subResource"] = Value::from(sub);
    }
    let review: AdmissionReview<Shoot> = serde_json::from_value(json!({
        "apiVersion": "admission.k8s.io/v1",
        "kind": "AdmissionReview",
        "request": request,
    }))
    .unwrap();
    review.try_into().unwrap()
}

/// Create, update and delete through the webhook entry point.
#[test]
fn test_admission_lifecycle() {
    let created = ShootBuilder::new("crazy-botany").build();
    let outcome = review_shoot(&review("CREATE", &created, None, None), false);
    assert!(outcome.allowed);

    let moved = ShootBuilder::new("crazy-botany").region("us-east-1").build();
    let outcome = review_shoot(&review("UPDATE", &moved, Some(&created), None), false);
    assert!(!outcome.allowed);
    assert_eq!(outcome.errors.len(), 1);
    assert_eq!(outcome.errors[0].field.to_string(), "spec.region");

    let outcome = review_shoot(&review("DELETE", &moved, Some(&created), None), false);
    assert!(outcome.allowed);
}

/// Status writes go through the status policy only.
#[test]
fn test_status_subresource_skips_spec_rules() {
    // spec errors are not re-checked on status writes
    let old = ShootBuilder::new("crazy-botany").region("").build();
    let mut new = old.clone();
    new.status = Some(shoot_admission::crd::ShootStatus {
        hibernated: true,
        ..Default::default()
    });
    let outcome = review_shoot(&review("UPDATE", &new, Some(&old), Some("status")), false);
    assert!(outcome.allowed, "{:?}", outcome.errors);

    let outcome = review_shoot(&review("UPDATE", &new, Some(&old), None), false);
    assert!(!outcome.allowed);
}
