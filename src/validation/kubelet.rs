//! Kubelet configuration, shared by the shoot-wide and the per-pool settings.

use std::collections::BTreeSet;

use super::field::{ErrorList, FieldError, Path};
use super::kube_features::validate_feature_gates;
use super::primitives::{
    validate_non_negative, validate_non_negative_duration, validate_resource_quantity_or_percent,
    validate_resource_quantity_value,
};
use super::version;
use crate::crd::{
    Duration, KubeletConfig, KubeletEviction, KubeletEvictionMinimumReclaim,
    KubeletEvictionSoftGracePeriod, KubeletReserved,
};

pub const POD_PIDS_LIMIT_MINIMUM: i64 = 100;

const ENFORCE_NODE_ALLOCATABLE_NONE: &str = "none";
const VALID_ENFORCE_NODE_ALLOCATABLE: &[&str] =
    &["kube-reserved", ENFORCE_NODE_ALLOCATABLE_NONE, "pods", "system-reserved"];

const STREAMING_IDLE_TIMEOUT_MIN: Duration = Duration::from_secs(30);
const STREAMING_IDLE_TIMEOUT_MAX: Duration = Duration::from_hours(4);

const CONTAINERD_ONLY_MSG: &str =
    "can only be configured with containerd runtime. This setting has no effect for docker container runtime.";

pub fn validate_kubelet_config(
    kubelet: &KubeletConfig,
    kubernetes_version: &str,
    docker_configured: bool,
    path: &Path,
) -> ErrorList {
    let mut errs = ErrorList::new();

    if let Some(max_pods) = kubelet.max_pods {
        errs.extend(validate_non_negative(i64::from(max_pods), &path.child("maxPods")));
    }
    if let Some(limit) = kubelet.pod_pids_limit {
        if limit < POD_PIDS_LIMIT_MINIMUM {
            errs.push(FieldError::invalid(
                path.child("podPIDsLimit"),
                &limit,
                format!("podPIDsLimit value must be at least {}", POD_PIDS_LIMIT_MINIMUM),
            ));
        }
    }
    if let Some(deadline) = &kubelet.image_pull_progress_deadline {
        if !docker_configured {
            errs.push(FieldError::forbidden(
                path.child("imagePullProgressDeadline"),
                "can only be configured when a worker pool is configured with 'docker'. This setting has no effect for other container runtimes.",
            ));
        }
        errs.extend(validate_non_negative_duration(
            Some(deadline),
            &path.child("imagePullProgressDeadline"),
        ));
    }
    if let Some(values) = &kubelet.enforce_node_allocatable {
        errs.extend(validate_enforce_node_allocatable(
            values,
            &path.child("enforceNodeAllocatable"),
        ));
    }
    errs.extend(validate_non_negative_duration(
        kubelet.eviction_pressure_transition_period.as_ref(),
        &path.child("evictionPressureTransitionPeriod"),
    ));
    if let Some(grace) = kubelet.eviction_max_pod_grace_period {
        errs.extend(validate_non_negative(
            i64::from(grace),
            &path.child("evictionMaxPodGracePeriod"),
        ));
    }
    if let Some(eviction) = &kubelet.eviction_hard {
        errs.extend(validate_eviction(eviction, &path.child("evictionHard")));
    }
    if let Some(eviction) = &kubelet.eviction_soft {
        errs.extend(validate_eviction(eviction, &path.child("evictionSoft")));
    }
    if let Some(reclaim) = &kubelet.eviction_minimum_reclaim {
        errs.extend(validate_eviction_minimum_reclaim(
            reclaim,
            &path.child("evictionMinimumReclaim"),
        ));
    }
    if let Some(grace) = &kubelet.eviction_soft_grace_period {
        errs.extend(validate_eviction_soft_grace_period(
            grace,
            &path.child("evictionSoftGracePeriod"),
        ));
    }
    if let Some(reserved) = &kubelet.kube_reserved {
        errs.extend(validate_reserved(reserved, &path.child("kubeReserved")));
    }
    if let Some(reserved) = &kubelet.system_reserved {
        errs.extend(validate_reserved(reserved, &path.child("systemReserved")));
    }

    errs.extend(validate_image_gc_thresholds(kubelet, path));
    errs.extend(validate_feature_gates(
        &kubelet.feature_gates,
        kubernetes_version,
        &path.child("featureGates"),
    ));

    if let Some(qps) = kubelet.registry_pull_qps {
        errs.extend(validate_non_negative(i64::from(qps), &path.child("registryPullQPS")));
    }
    if let Some(burst) = kubelet.registry_burst {
        errs.extend(validate_non_negative(i64::from(burst), &path.child("registryBurst")));
    }

    if let Some(seccomp_default) = kubelet.seccomp_default {
        if version::is_below(kubernetes_version, "1.25") {
            errs.push(FieldError::forbidden(
                path.child("seccompDefault"),
                "seccomp defaulting is not available for kubernetes versions < 1.25",
            ));
        }
        if kubelet.feature_gates.get("SeccompDefault") == Some(&false) && seccomp_default {
            errs.push(FieldError::forbidden(
                path.child("seccompDefault"),
                "seccomp defaulting is not available when kubelet's 'SeccompDefault' feature gate is disabled",
            ));
        }
    }

    if kubelet.container_log_max_size.is_some() && docker_configured {
        errs.push(FieldError::forbidden(path.child("containerLogMaxSize"), CONTAINERD_ONLY_MSG));
    }
    if let Some(max_files) = kubelet.container_log_max_files {
        if docker_configured {
            errs.push(FieldError::forbidden(path.child("containerLogMaxFiles"), CONTAINERD_ONLY_MSG));
        }
        if max_files < 2 {
            errs.push(FieldError::invalid(
                path.child("containerLogMaxFiles"),
                &max_files,
                "value must be >= 2.",
            ));
        }
    }

    if let Some(timeout) = &kubelet.streaming_connection_idle_timeout {
        if *timeout < STREAMING_IDLE_TIMEOUT_MIN || *timeout > STREAMING_IDLE_TIMEOUT_MAX {
            errs.push(FieldError::invalid(
                path.child("streamingConnectionIdleTimeout"),
                &timeout.to_string(),
                "value must be between 30s and 4h",
            ));
        }
    }

    if let Some(swap) = &kubelet.memory_swap {
        let swap_path = path.child("memorySwap");
        if version::is_below(kubernetes_version, "1.22") {
            errs.push(FieldError::forbidden(
                swap_path.clone(),
                "configuring swap behaviour is not available for kubernetes versions < 1.22",
            ));
        }
        if kubelet.fail_swap_on.unwrap_or(false) {
            errs.push(FieldError::forbidden(
                swap_path.clone(),
                "configuring swap behaviour is not available when the kubelet is configured with 'FailSwapOn=true'",
            ));
        }
        let node_swap_blocks = match kubelet.feature_gates.get("NodeSwap") {
            None => true,
            Some(enabled) => !enabled && swap.swap_behavior.is_some(),
        };
        if node_swap_blocks {
            errs.push(FieldError::forbidden(
                swap_path,
                "configuring swap behaviour is not available when kubelet's 'NodeSwap' feature gate is not set",
            ));
        }
    }

    errs
}

fn validate_image_gc_thresholds(kubelet: &KubeletConfig, path: &Path) -> ErrorList {
    let mut errs = ErrorList::new();
    let high = kubelet.image_gc_high_threshold_percent;
    let low = kubelet.image_gc_low_threshold_percent;

    for (name, value) in [
        ("imageGCHighThresholdPercent", high),
        ("imageGCLowThresholdPercent", low),
    ] {
        if let Some(v) = value.filter(|v| !(0..=100).contains(v)) {
            errs.push(FieldError::invalid(path.child(name), &v, "value must be in [0,100]"));
        }
    }
    if let (Some(high), Some(low)) = (high, low) {
        if low >= high {
            errs.push(FieldError::forbidden(
                path.child("imageGCLowThresholdPercent"),
                "imageGCLowThresholdPercent must be less than imageGCHighThresholdPercent",
            ));
        }
    }
    errs
}

fn validate_enforce_node_allocatable(values: &[String], path: &Path) -> ErrorList {
    let mut errs = ErrorList::new();

    if values.len() > 1 && values.iter().any(|v| v == ENFORCE_NODE_ALLOCATABLE_NONE) {
        errs.push(FieldError::invalid(
            path.clone(),
            values,
            "If none is specified, no additional options must be set",
        ));
        return errs;
    }

    let mut seen = BTreeSet::new();
    for (i, value) in values.iter().enumerate() {
        if !seen.insert(value.as_str()) {
            errs.push(FieldError::duplicate(path.index(i), value));
        }
        if !VALID_ENFORCE_NODE_ALLOCATABLE.contains(&value.as_str()) {
            errs.push(FieldError::not_supported(
                path.index(i),
                value,
                VALID_ENFORCE_NODE_ALLOCATABLE,
            ));
        }
    }
    errs
}

// Eviction signals keep the kubelet's own spelling in error paths.
const MEMORY_AVAILABLE: &str = "memoryAvailable";
const IMAGE_FS_AVAILABLE: &str = "imagefsAvailable";
const IMAGE_FS_INODES_FREE: &str = "imagefsInodesFree";
const NODE_FS_AVAILABLE: &str = "nodefsAvailable";
const NODE_FS_INODES_FREE: &str = "nodefsInodesFree";

fn validate_eviction(eviction: &KubeletEviction, path: &Path) -> ErrorList {
    [
        (MEMORY_AVAILABLE, &eviction.memory_available),
        (IMAGE_FS_AVAILABLE, &eviction.image_fs_available),
        (IMAGE_FS_INODES_FREE, &eviction.image_fs_inodes_free),
        (NODE_FS_AVAILABLE, &eviction.node_fs_available),
        (NODE_FS_INODES_FREE, &eviction.node_fs_inodes_free),
    ]
    .into_iter()
    .flat_map(|(key, value)| validate_resource_quantity_or_percent(value.as_deref(), path, key))
    .collect()
}

fn validate_eviction_minimum_reclaim(reclaim: &KubeletEvictionMinimumReclaim, path: &Path) -> ErrorList {
    [
        (MEMORY_AVAILABLE, &reclaim.memory_available),
        (IMAGE_FS_AVAILABLE, &reclaim.image_fs_available),
        (IMAGE_FS_INODES_FREE, &reclaim.image_fs_inodes_free),
        (NODE_FS_AVAILABLE, &reclaim.node_fs_available),
        (NODE_FS_INODES_FREE, &reclaim.node_fs_inodes_free),
    ]
    .into_iter()
    .filter_map(|(key, value)| value.as_ref().map(|q| (key, q)))
    .flat_map(|(key, quantity)| validate_resource_quantity_value(key, quantity, &path.child(key)))
    .collect()
}

fn validate_eviction_soft_grace_period(grace: &KubeletEvictionSoftGracePeriod, path: &Path) -> ErrorList {
    [
        (MEMORY_AVAILABLE, &grace.memory_available),
        (IMAGE_FS_AVAILABLE, &grace.image_fs_available),
        (IMAGE_FS_INODES_FREE, &grace.image_fs_inodes_free),
        (NODE_FS_AVAILABLE, &grace.node_fs_available),
        (NODE_FS_INODES_FREE, &grace.node_fs_inodes_free),
    ]
    .into_iter()
    .flat_map(|(key, value)| validate_non_negative_duration(value.as_ref(), &path.child(key)))
    .collect()
}

fn validate_reserved(reserved: &KubeletReserved, path: &Path) -> ErrorList {
    [
        ("cpu", &reserved.cpu),
        ("memory", &reserved.memory),
        ("ephemeralStorage", &reserved.ephemeral_storage),
        ("pid", &reserved.pid),
    ]
    .into_iter()
    .filter_map(|(key, value)| value.as_ref().map(|q| (key, q)))
    .flat_map(|(key, quantity)| validate_resource_quantity_value(key, quantity, &path.child(key)))
    .collect()
}
