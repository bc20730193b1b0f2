// Test code is allowed to panic on failure
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]

//! Unit tests for shoot-admission.
//!
//! These tests exercise the public validation API without a webhook server
//! or a Kubernetes cluster.

#[path = "../common/mod.rs"]
mod common;

fn fields(errs: &shoot_admission::ErrorList) -> Vec<String> {
    errs.iter().map(|e| e.field.to_string()).collect()
}

mod field_tests {
    use shoot_admission::{ErrorType, FieldError, Path};

    #[test]
    fn test_path_rendering() {
        let path = Path::new("spec")
            .child("provider")
            .child("workers")
            .index(0)
            .child("labels")
            .key("worker.gardener.cloud/pool");
        assert_eq!(
            path.to_string(),
            "spec.provider.workers[0].labels[worker.gardener.cloud/pool]"
        );
    }

    #[test]
    fn test_error_rendering() {
        let err = FieldError::not_supported(
            Path::new("spec").child("purpose"),
            "fun",
            &["development", "production"],
        );
        assert_eq!(err.error_type, ErrorType::NotSupported);
        assert_eq!(
            err.to_string(),
            "spec.purpose: Unsupported value: \"fun\": supported values: \"development\", \"production\""
        );
    }
}

mod shoot_tests {
    use super::common::fixtures::{ShootBuilder, worker};
    use super::fields;
    use shoot_admission::crd::Networking;
    use shoot_admission::validation::validate_total_node_count_with_pod_cidr;
    use shoot_admission::{ErrorType, validate_shoot, validate_shoot_update};

    #[test]
    fn test_valid_shoot() {
        let errs = validate_shoot(&ShootBuilder::new("crazy-botany").build());
        assert!(errs.is_empty(), "{:?}", errs);
    }

    #[test]
    fn test_workerless_networking_type_forbidden() {
        let shoot = ShootBuilder::new("crazy-botany")
            .workerless()
            .networking(Some(Networking {
                r#type: Some("calico".to_string()),
                ..Default::default()
            }))
            .build();
        let errs = validate_shoot(&shoot);
        assert_eq!(fields(&errs), vec!["spec.networking.type"]);
        assert_eq!(errs[0].error_type, ErrorType::Forbidden);
        assert_eq!(
            errs[0].detail,
            "this field should not be set for workerless Shoot clusters"
        );
    }

    #[test]
    fn test_worker_maximum_below_minimum() {
        let shoot = ShootBuilder::new("crazy-botany").worker("cpu-worker", 3, 1).build();
        let errs = validate_shoot(&shoot);
        let err = errs
            .iter()
            .find(|e| e.field.to_string() == "spec.provider.workers[0].maximum")
            .expect("maximum error");
        assert_eq!(err.error_type, ErrorType::Forbidden);
        assert_eq!(err.detail, "maximum value must not be less than minimum value");
    }

    #[test]
    fn test_duplicate_worker_names() {
        let shoot = ShootBuilder::new("crazy-botany")
            .workers(vec![worker("pool", 1, 2), worker("pool", 1, 2)])
            .build();
        let errs = validate_shoot(&shoot);
        assert!(errs.iter().any(|e| e.error_type == ErrorType::Duplicate));
    }

    #[test]
    fn test_pod_cidr_capacity() {
        // a /24 pod network with /24 node masks holds exactly one node
        let shoot = ShootBuilder::new("crazy-botany")
            .pods_cidr("100.96.0.0/24")
            .worker("cpu-worker", 1, 2)
            .build();
        let errs = validate_total_node_count_with_pod_cidr(&shoot);
        assert_eq!(fields(&errs), vec!["spec.provider.workers"]);
        assert!(errs[0].detail.contains("can only support a maximum of 1 nodes"));

        let fits = ShootBuilder::new("crazy-botany")
            .pods_cidr("100.96.0.0/23")
            .worker("cpu-worker", 1, 2)
            .build();
        assert!(validate_total_node_count_with_pod_cidr(&fits).is_empty());
    }

    #[test]
    fn test_region_immutable() {
        let old = ShootBuilder::new("crazy-botany").build();
        let new = ShootBuilder::new("crazy-botany").region("eu-central-1").build();
        let errs = validate_shoot_update(&new, &old);
        assert_eq!(fields(&errs), vec!["spec.region"]);
        assert_eq!(errs[0].error_type, ErrorType::Invalid);
        assert_eq!(errs[0].detail, "field is immutable");
    }

    #[test]
    fn test_kubernetes_version_update() {
        let old = ShootBuilder::new("crazy-botany").kubernetes_version("1.27.3").build();

        let patch = ShootBuilder::new("crazy-botany").kubernetes_version("1.27.5").build();
        assert!(validate_shoot_update(&patch, &old).is_empty());

        let minor = ShootBuilder::new("crazy-botany").kubernetes_version("1.28.0").build();
        assert!(validate_shoot_update(&minor, &old).is_empty());

        let downgrade = ShootBuilder::new("crazy-botany").kubernetes_version("1.26.9").build();
        let errs = validate_shoot_update(&downgrade, &old);
        assert!(errs.iter().any(|e| e.detail == "kubernetes version downgrade is not supported"));

        let skip = ShootBuilder::new("crazy-botany").kubernetes_version("1.29.0").build();
        let errs = validate_shoot_update(&skip, &old);
        assert!(
            errs.iter()
                .any(|e| e.detail == "kubernetes version upgrade cannot skip a minor version")
        );
    }

    #[test]
    fn test_dns_primary_type_changeable_only_on_seed_assignment() {
        let unscheduled = ShootBuilder::new("crazy-botany").primary_dns("aws-route53").build();
        let scheduled = ShootBuilder::new("crazy-botany")
            .primary_dns("aws-route53")
            .seed_name("aws-eu1")
            .build();

        let assigned = ShootBuilder::new("crazy-botany")
            .primary_dns("gcp")
            .seed_name("aws-eu1")
            .build();
        let errs = validate_shoot_update(&assigned, &unscheduled);
        assert!(errs.is_empty(), "{:?}", errs);

        let errs = validate_shoot_update(&assigned, &scheduled);
        assert_eq!(fields(&errs), vec!["spec.dns.providers"]);
        assert_eq!(errs[0].error_type, ErrorType::Forbidden);
        assert_eq!(errs[0].detail, "changing primary provider type is not allowed");

        let still_unscheduled = ShootBuilder::new("crazy-botany").primary_dns("gcp").build();
        let errs = validate_shoot_update(&still_unscheduled, &unscheduled);
        assert_eq!(fields(&errs), vec!["spec.dns.providers"]);
    }

    #[test]
    fn test_failure_tolerance_fixed_once_scheduled() {
        const PATH: &str = "spec.controlPlane.highAvailability.failureTolerance.type";

        let unscheduled = ShootBuilder::new("crazy-botany").failure_tolerance("node").build();
        let scheduled = ShootBuilder::new("crazy-botany")
            .failure_tolerance("node")
            .seed_name("aws-eu1")
            .build();

        let changed = ShootBuilder::new("crazy-botany").failure_tolerance("zone").build();
        assert!(validate_shoot_update(&changed, &unscheduled).is_empty());

        let changed_on_assignment = ShootBuilder::new("crazy-botany")
            .failure_tolerance("zone")
            .seed_name("aws-eu1")
            .build();
        for old in [&unscheduled, &scheduled] {
            let errs = validate_shoot_update(&changed_on_assignment, old);
            assert_eq!(fields(&errs), vec![PATH]);
            assert_eq!(errs[0].error_type, ErrorType::Invalid);
            assert_eq!(errs[0].detail, "field is immutable");
        }

        let unchanged = scheduled.clone();
        assert!(validate_shoot_update(&unchanged, &scheduled).is_empty());
    }
}

mod operation_tests {
    use super::common::fixtures::ShootBuilder;
    use super::fields;
    use shoot_admission::crd::{CredentialsRotationPhase, LastOperationState, LastOperationType, ShootStatus};
    use shoot_admission::validation::operations::{
        OPERATION_ANNOTATION, OPERATION_ROTATE_CA_COMPLETE, OPERATION_ROTATE_CA_START,
        OPERATION_ROTATE_CREDENTIALS_START, is_forbidden_when_hibernated,
    };
    use shoot_admission::{ErrorType, validate_shoot};

    #[test]
    fn test_unknown_operation() {
        let shoot = ShootBuilder::new("crazy-botany")
            .annotation(OPERATION_ANNOTATION, "explode")
            .build();
        let errs = validate_shoot(&shoot);
        assert_eq!(
            fields(&errs),
            vec!["metadata.annotations[gardener.cloud/operation]"]
        );
        assert_eq!(errs[0].error_type, ErrorType::NotSupported);
    }

    #[test]
    fn test_rotation_during_hibernation() {
        let shoot = ShootBuilder::new("crazy-botany")
            .annotation(OPERATION_ANNOTATION, OPERATION_ROTATE_CREDENTIALS_START)
            .status(ShootStatus {
                hibernated: true,
                ..Default::default()
            })
            .last_operation(LastOperationType::Reconcile, LastOperationState::Succeeded)
            .build();
        let errs = validate_shoot(&shoot);
        assert!(
            errs.iter()
                .any(|e| e.detail == "operation is not permitted when shoot is hibernated")
        );
        assert!(is_forbidden_when_hibernated(OPERATION_ROTATE_CREDENTIALS_START));
    }

    #[test]
    fn test_ca_rotation_gating() {
        let start = ShootBuilder::new("crazy-botany")
            .annotation(OPERATION_ANNOTATION, OPERATION_ROTATE_CA_START)
            .build();
        let errs = validate_shoot(&start);
        assert_eq!(errs.len(), 1);
        assert_eq!(
            errs[0].detail,
            "cannot start CA rotation if shoot was not yet created successfully or is not ready for reconciliation"
        );

        let complete = ShootBuilder::new("crazy-botany")
            .annotation(OPERATION_ANNOTATION, OPERATION_ROTATE_CA_COMPLETE)
            .last_operation(LastOperationType::Reconcile, LastOperationState::Succeeded)
            .ca_rotation_phase(CredentialsRotationPhase::Preparing)
            .build();
        let errs = validate_shoot(&complete);
        assert_eq!(errs.len(), 1);
        assert_eq!(
            errs[0].detail,
            "cannot complete CA rotation if .status.credentials.rotation.certificateAuthorities.phase is not 'Prepared'"
        );
    }
}

mod status_tests {
    use shoot_admission::crd::{ShootAdvertisedAddress, ShootStatus};
    use shoot_admission::validate_shoot_status_update;

    #[test]
    fn test_advertised_address_must_be_https() {
        let new = ShootStatus {
            advertised_addresses: vec![ShootAdvertisedAddress {
                name: "external".to_string(),
                url: "http://api.example.com".to_string(),
            }],
            ..Default::default()
        };
        let errs = validate_shoot_status_update(&new, &ShootStatus::default());
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].field.to_string(), "status.advertisedAddresses[0].url");
    }
}

mod config_tests {
    use shoot_admission::config::{DEFAULT_HEALTH_PORT, DEFAULT_WEBHOOK_PORT};
    use shoot_admission::features::Feature;
    use shoot_admission::{Config, Error};

    #[test]
    fn test_defaults_without_environment() {
        let config = Config::from_lookup(|_| None).unwrap();
        assert_eq!(config.webhook_port, DEFAULT_WEBHOOK_PORT);
        assert_eq!(config.health_port, DEFAULT_HEALTH_PORT);
        assert!(!config.feature_gates.enabled(Feature::MutableShootSpecNetworkingNodes));
    }

    #[test]
    fn test_invalid_port() {
        let result = Config::from_lookup(|key| (key == "HEALTH_PORT").then(|| "eighty".to_string()));
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
