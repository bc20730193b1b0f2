// Test code is allowed to panic on failure
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic,
    clippy::string_slice
)]

//! Property-based tests for shoot-admission.
//!
//! Uses proptest to generate random inputs and verify invariants.

#[path = "../common/mod.rs"]
mod common;

use std::collections::BTreeSet;

use proptest::prelude::*;

use common::fixtures::ShootBuilder;
use shoot_admission::crd::{
    Addons, ClusterAutoscaler, CredentialsRotationPhase, KubeProxyConfig, KubeSchedulerConfig,
    KubeletConfig, LastOperation, LastOperationState, LastOperationType, Networking, SshAccess,
    SystemComponents, WorkersSettings,
};
use shoot_admission::validation::kubernetes::validate_kubernetes_version_update;
use shoot_admission::validation::rotation::{
    ROTATION, RotationContext, RotationEvent, RotationState, TransitionResult,
};
use shoot_admission::validation::{
    ErrorType, Path, WORKERLESS_ERROR_MSG, validate_total_node_count_with_pod_cidr,
};
use shoot_admission::{validate_shoot, validate_shoot_update};

/// Strategy for generating `1.<minor>.<patch>` versions.
fn version() -> impl Strategy<Value = (u64, u64)> {
    (20..=32u64, 0..=15u64)
}

fn any_rotation_state() -> impl Strategy<Value = RotationState> {
    prop_oneof![
        Just(None),
        Just(Some(CredentialsRotationPhase::Preparing)),
        Just(Some(CredentialsRotationPhase::Prepared)),
        Just(Some(CredentialsRotationPhase::Completing)),
        Just(Some(CredentialsRotationPhase::Completed)),
    ]
}

fn any_rotation_event() -> impl Strategy<Value = RotationEvent> {
    prop_oneof![
        Just(RotationEvent::StartRequested),
        Just(RotationEvent::PreparationDone),
        Just(RotationEvent::CompleteRequested),
        Just(RotationEvent::CompletionDone),
    ]
}

fn any_last_operation() -> impl Strategy<Value = Option<(LastOperationType, LastOperationState)>> {
    let types = prop_oneof![
        Just(LastOperationType::Create),
        Just(LastOperationType::Reconcile),
        Just(LastOperationType::Delete),
        Just(LastOperationType::Migrate),
        Just(LastOperationType::Restore),
    ];
    let states = prop_oneof![
        Just(LastOperationState::Processing),
        Just(LastOperationState::Succeeded),
        Just(LastOperationState::Error),
        Just(LastOperationState::Failed),
    ];
    proptest::option::of((types, states))
}

proptest! {
    /// Property: patch upgrades within a minor are always accepted.
    #[test]
    fn test_patch_upgrade_accepted((minor, patch) in version(), bump in 0..=10u64) {
        let old = format!("1.{}.{}", minor, patch);
        let new = format!("1.{}.{}", minor, patch + bump);
        let errs = validate_kubernetes_version_update(&new, &old, &Path::new("version"));
        prop_assert!(errs.is_empty(), "{} -> {}: {:?}", old, new, errs);
    }

    /// Property: any move to a lower minor is a downgrade.
    #[test]
    fn test_downgrade_forbidden((minor, patch) in version(), back in 1..=5u64, new_patch in 0..=15u64) {
        let old = format!("1.{}.{}", minor, patch);
        let new = format!("1.{}.{}", minor - back, new_patch);
        let errs = validate_kubernetes_version_update(&new, &old, &Path::new("version"));
        prop_assert!(errs.iter().any(|e| e.error_type == ErrorType::Forbidden
            && e.detail == "kubernetes version downgrade is not supported"));
    }

    /// Property: upgrades may move at most one minor forward.
    #[test]
    fn test_minor_skip_forbidden((minor, patch) in version(), ahead in 1..=4u64) {
        let old = format!("1.{}.{}", minor, patch);
        let new = format!("1.{}.0", minor + ahead);
        let errs = validate_kubernetes_version_update(&new, &old, &Path::new("version"));
        prop_assert_eq!(ahead >= 2, !errs.is_empty(), "{} -> {}: {:?}", old, new, errs);
    }

    /// Property: a pod network of prefix p with /24 node masks fits 2^(24-p) nodes.
    #[test]
    fn test_pod_cidr_capacity(prefix in 14..=24u32, maximum in 1..=2000i32) {
        let shoot = ShootBuilder::new("capacity")
            .pods_cidr(format!("100.96.0.0/{}", prefix))
            .worker("cpu-worker", 1, maximum)
            .build();
        let capacity = 1i64 << (24 - prefix);
        let errs = validate_total_node_count_with_pod_cidr(&shoot);
        prop_assert_eq!(i64::from(maximum) > capacity, !errs.is_empty());
    }

    /// Property: validation is a pure function of its input.
    #[test]
    fn test_validation_idempotent((minor, patch) in version(), maximum in 1..=10i32) {
        let shoot = ShootBuilder::new("idempotent")
            .kubernetes_version(format!("1.{}.{}", minor, patch))
            .worker("cpu-worker", 1, maximum)
            .build();
        let first = validate_shoot(&shoot);
        let second = validate_shoot(&shoot);
        prop_assert_eq!(&first, &second);
        // an unchanged object adds no transition errors
        prop_assert_eq!(validate_shoot_update(&shoot, &shoot), first);
    }

    /// Property: a rotation step succeeds iff the table has it and, for a
    /// start, the last operation allows it.
    #[test]
    fn test_rotation_gating(
        state in any_rotation_state(),
        event in any_rotation_event(),
        last in any_last_operation(),
    ) {
        let last_operation = last.map(|(r#type, state)| LastOperation {
            r#type,
            state,
            description: String::new(),
            progress: 0,
            last_update_time: None,
        });
        let ctx = RotationContext { last_operation: last_operation.as_ref() };
        let ready = event != RotationEvent::StartRequested || ctx.ready_for_rotation_start();
        let result = ROTATION.transition(state, event, &ctx);
        let succeeded = matches!(result, TransitionResult::Success { .. });
        prop_assert_eq!(succeeded, ROTATION.can_transition(state, event) && ready);
    }

    /// Property: every networking field set on a workerless shoot is
    /// reported, and nothing else is.
    #[test]
    fn test_workerless_exclusivity(
        set_type in any::<bool>(),
        set_pods in any::<bool>(),
        set_nodes in any::<bool>(),
        set_provider_config in any::<bool>(),
    ) {
        let networking = Networking {
            r#type: set_type.then(|| "calico".to_string()),
            pods: set_pods.then(|| "100.96.0.0/11".to_string()),
            nodes: set_nodes.then(|| "10.250.0.0/16".to_string()),
            provider_config: set_provider_config.then(|| serde_json::json!({})),
            ..Default::default()
        };
        let shoot = ShootBuilder::new("workerless")
            .workerless()
            .networking(Some(networking))
            .build();

        let reported: BTreeSet<String> = validate_shoot(&shoot)
            .iter()
            .filter(|e| e.detail == WORKERLESS_ERROR_MSG)
            .map(|e| e.field.to_string())
            .collect();
        let expected: BTreeSet<String> = [
            ("type", set_type),
            ("pods", set_pods),
            ("nodes", set_nodes),
            ("providerConfig", set_provider_config),
        ]
        .into_iter()
        .filter(|(_, set)| *set)
        .map(|(name, _)| format!("spec.networking.{}", name))
        .collect();
        prop_assert_eq!(reported, expected);
    }

    /// Property: node-level components and addons set on a workerless shoot
    /// are each forbidden exactly once.
    #[test]
    fn test_workerless_component_exclusivity(
        set_addons in any::<bool>(),
        set_system_components in any::<bool>(),
        set_scheduler in any::<bool>(),
        set_proxy in any::<bool>(),
        set_kubelet in any::<bool>(),
        set_autoscaler in any::<bool>(),
        set_workers_settings in any::<bool>(),
        set_infrastructure_config in any::<bool>(),
    ) {
        let mut shoot = ShootBuilder::new("workerless").workerless().build();
        shoot.spec.addons = set_addons.then(Addons::default);
        shoot.spec.system_components = set_system_components.then(SystemComponents::default);
        let kubernetes = &mut shoot.spec.kubernetes;
        kubernetes.kube_scheduler = set_scheduler.then(KubeSchedulerConfig::default);
        kubernetes.kube_proxy = set_proxy.then(KubeProxyConfig::default);
        kubernetes.kubelet = set_kubelet.then(KubeletConfig::default);
        kubernetes.cluster_autoscaler = set_autoscaler.then(ClusterAutoscaler::default);
        let provider = &mut shoot.spec.provider;
        provider.workers_settings = set_workers_settings.then(|| WorkersSettings {
            ssh_access: Some(SshAccess { enabled: true }),
        });
        provider.infrastructure_config = set_infrastructure_config.then(|| serde_json::json!({}));

        let candidates = [
            ("spec.addons", set_addons),
            ("spec.systemComponents", set_system_components),
            ("spec.kubernetes.kubeScheduler", set_scheduler),
            ("spec.kubernetes.kubeProxy", set_proxy),
            ("spec.kubernetes.kubelet", set_kubelet),
            ("spec.kubernetes.clusterAutoscaler", set_autoscaler),
            ("spec.provider.workersSettings", set_workers_settings),
            ("spec.provider.infrastructureConfig", set_infrastructure_config),
        ];
        let errs = validate_shoot(&shoot);
        for (field, set) in candidates {
            let forbidden = errs
                .iter()
                .filter(|e| e.error_type == ErrorType::Forbidden && e.field.to_string() == field)
                .count();
            prop_assert_eq!(forbidden, usize::from(set), "{}: {:?}", field, errs);
        }
    }
}
