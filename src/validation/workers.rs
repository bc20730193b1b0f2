//! Provider block and worker pools.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use ipnet::IpNet;
use k8s_openapi::api::core::v1::Taint;
use regex::Regex;

use super::cidr::is_ipv6_single_stack;
use super::field::{ErrorList, FieldError, Path};
use super::kubelet::validate_kubelet_config;
use super::kubernetes::validate_worker_group_and_control_plane_kubernetes_version;
use super::primitives::{
    int_or_percent_value, is_not_more_than_100_percent, is_valid_label_value,
    parse_certificate_bundle, validate_annotations, validate_dns1123_label, validate_label_name,
    validate_labels, validate_positive_int_or_percent,
};
use super::{WORKERLESS_ERROR_MSG, version};
use crate::crd::{ContainerRuntime, Cri, Kubernetes, Networking, Provider, Shoot, Worker};

pub const MAX_WORKER_NAME_LENGTH: usize = 15;
pub const MAX_VOLUME_NAME_LENGTH: usize = 15;

/// kubelet's default `--max-pods`.
pub const DEFAULT_MAX_PODS: i32 = 110;
/// kube-controller-manager's default `--node-cidr-mask-size` for IPv4.
pub const DEFAULT_NODE_CIDR_MASK_SIZE_V4: i32 = 24;
/// kube-controller-manager's default `--node-cidr-mask-size` for IPv6.
pub const DEFAULT_NODE_CIDR_MASK_SIZE_V6: i32 = 64;
pub const DEFAULT_POD_NETWORK_CIDR: &str = "100.96.0.0/11";

pub const CRI_NAME_CONTAINERD: &str = "containerd";
pub const CRI_NAME_DOCKER: &str = "docker";
const AVAILABLE_CRI_NAMES: &[&str] = &[CRI_NAME_CONTAINERD, CRI_NAME_DOCKER];

const VALID_ARCHITECTURES: &[&str] = &["amd64", "arm64"];

const TAINT_EFFECTS: &[&str] = &["NoSchedule", "PreferNoSchedule", "NoExecute"];

/// Taint keys managed by Gardener itself.
pub const RESERVED_TAINT_KEYS: &[&str] = &["node.gardener.cloud/critical-components-not-ready"];

const VOLUME_SIZE_PATTERN: &str = r"^(\d)+Gi$";

static VOLUME_SIZE_REGEX: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(VOLUME_SIZE_PATTERN).ok());

fn is_valid_volume_size(size: &str) -> bool {
    VOLUME_SIZE_REGEX.as_ref().is_some_and(|r| r.is_match(size))
}

/// Pools without an explicit CRI run docker.
pub fn is_docker_configured(workers: &[Worker]) -> bool {
    workers
        .iter()
        .any(|w| w.cri.as_ref().is_none_or(|cri| cri.name == CRI_NAME_DOCKER))
}

pub fn validate_provider(
    provider: &Provider,
    kubernetes: &Kubernetes,
    networking: Option<&Networking>,
    workerless: bool,
    path: &Path,
    in_template: bool,
) -> ErrorList {
    let mut errs = ErrorList::new();
    let mut max_pod = 0;

    if provider.r#type.is_empty() {
        errs.push(FieldError::required(path.child("type"), "must specify a provider type"));
    }

    if workerless {
        if provider.infrastructure_config.is_some() {
            errs.push(FieldError::forbidden(
                path.child("infrastructureConfig"),
                WORKERLESS_ERROR_MSG,
            ));
        }
        if provider.control_plane_config.is_some() {
            errs.push(FieldError::forbidden(
                path.child("controlPlaneConfig"),
                WORKERLESS_ERROR_MSG,
            ));
        }
        if provider.workers_settings.is_some() {
            errs.push(FieldError::forbidden(
                path.child("workersSettings"),
                WORKERLESS_ERROR_MSG,
            ));
        }
    } else {
        if let Some(max_pods) = kubernetes.kubelet.as_ref().and_then(|k| k.max_pods) {
            max_pod = max_pods;
        }

        let workers_path = path.child("workers");
        for (i, worker) in provider.workers.iter().enumerate() {
            errs.extend(validate_worker(worker, kubernetes, &workers_path.index(i), in_template));
            if let Some(pool_max) = worker.kubelet().and_then(|k| k.max_pods) {
                max_pod = max_pod.max(pool_max);
            }
        }

        errs.extend(validate_workers(&provider.workers, &workers_path));
        errs.extend(validate_system_component_workers(
            &provider.workers,
            &kubernetes.version,
            &workers_path,
        ));
    }

    if let (Some(mask_size), Some(networking)) = (kubernetes.node_cidr_mask_size(), networking) {
        if max_pod == 0 {
            max_pod = DEFAULT_MAX_PODS;
        }
        errs.extend(validate_node_cidr_mask_with_max_pod(max_pod, mask_size, networking));
    }

    errs
}

pub fn validate_worker(
    worker: &Worker,
    kubernetes: &Kubernetes,
    path: &Path,
    in_template: bool,
) -> ErrorList {
    let mut errs = ErrorList::new();
    let mut kubernetes_version = kubernetes.version.as_str();

    errs.extend(validate_dns1123_label(&worker.name, &path.child("name")));
    if worker.name.len() > MAX_WORKER_NAME_LENGTH {
        errs.push(FieldError::too_long(path.child("name"), &worker.name, MAX_WORKER_NAME_LENGTH));
    }

    let machine_path = path.child("machine");
    if worker.machine.r#type.is_empty() {
        errs.push(FieldError::required(
            machine_path.child("type"),
            "must specify a machine type",
        ));
    }
    if let Some(image) = &worker.machine.image {
        if image.name.is_empty() {
            errs.push(FieldError::required(
                machine_path.child("image").child("name"),
                "must specify a machine image name",
            ));
        }
        if !in_template && image.version.is_empty() {
            errs.push(FieldError::required(
                machine_path.child("image").child("version"),
                "must specify a machine image version",
            ));
        }
    }

    if worker.minimum < 0 {
        errs.push(FieldError::invalid(
            path.child("minimum"),
            &worker.minimum,
            "minimum value must not be negative",
        ));
    }
    if worker.maximum < 0 {
        errs.push(FieldError::invalid(
            path.child("maximum"),
            &worker.maximum,
            "maximum value must not be negative",
        ));
    }
    if worker.maximum < worker.minimum {
        errs.push(FieldError::forbidden(
            path.child("maximum"),
            "maximum value must not be less than minimum value",
        ));
    }

    errs.extend(validate_positive_int_or_percent(worker.max_surge.as_ref(), &path.child("maxSurge")));
    errs.extend(validate_positive_int_or_percent(
        worker.max_unavailable.as_ref(),
        &path.child("maxUnavailable"),
    ));
    errs.extend(is_not_more_than_100_percent(
        worker.max_unavailable.as_ref(),
        &path.child("maxUnavailable"),
    ));
    let unavailable_zero = worker
        .max_unavailable
        .as_ref()
        .is_none_or(|v| int_or_percent_value(v) == 0);
    let surge_zero = worker
        .max_surge
        .as_ref()
        .is_some_and(|v| int_or_percent_value(v) == 0);
    if unavailable_zero && surge_zero {
        errs.push(FieldError::invalid(
            path.child("maxUnavailable"),
            &worker.max_unavailable,
            "may not be 0 when `maxSurge` is 0",
        ));
    }

    errs.extend(validate_labels(&worker.labels, &path.child("labels")));
    errs.extend(validate_annotations(&worker.annotations, &path.child("annotations")));
    if !worker.taints.is_empty() {
        errs.extend(validate_taints(&worker.taints, &path.child("taints")));
    }

    if let Some(pool_kubernetes) = &worker.kubernetes {
        let kubernetes_path = path.child("kubernetes");
        if let Some(pool_version) = pool_kubernetes.version.as_deref() {
            errs.extend(validate_worker_group_and_control_plane_kubernetes_version(
                &kubernetes.version,
                pool_version,
                &kubernetes_path.child("version"),
            ));
            kubernetes_version = pool_version;
        }

        let kubelet = pool_kubernetes.kubelet.as_ref().or(kubernetes.kubelet.as_ref());
        if let Some(kubelet) = kubelet {
            errs.extend(validate_kubelet_config(
                kubelet,
                kubernetes_version,
                is_docker_configured(std::slice::from_ref(worker)),
                &kubernetes_path.child("kubelet"),
            ));
        }
    }

    if let Some(bundle) = &worker.ca_bundle {
        if parse_certificate_bundle(bundle).is_err() {
            errs.push(FieldError::invalid(
                path.child("caBundle"),
                bundle,
                "caBundle is not a valid PEM-encoded certificate",
            ));
        }
    }

    errs.extend(validate_volumes(worker, path));

    if let Some(cri) = &worker.cri {
        errs.extend(validate_cri(cri, kubernetes_version, &path.child("cri")));
    }
    if let Some(arch) = &worker.machine.architecture {
        errs.extend(validate_architecture(arch, &machine_path.child("architecture")));
    }

    errs
}

fn validate_volumes(worker: &Worker, path: &Path) -> ErrorList {
    let mut errs = ErrorList::new();

    if let Some(volume) = &worker.volume {
        if !is_valid_volume_size(&volume.volume_size) {
            errs.push(FieldError::invalid(
                path.child("volume").child("size"),
                &volume.volume_size,
                format!("volume size must match the regex {}", VOLUME_SIZE_PATTERN),
            ));
        }
    }

    if !worker.data_volumes.is_empty() && worker.volume.is_none() {
        errs.push(FieldError::required(
            path.child("volume"),
            "a worker volume must be defined if data volumes are defined",
        ));
    }

    let mut names = BTreeSet::new();
    for (i, volume) in worker.data_volumes.iter().enumerate() {
        let idx_path = path.child("dataVolumes").index(i);
        if volume.name.is_empty() {
            errs.push(FieldError::required(idx_path.child("name"), "must specify a name"));
        } else {
            errs.extend(validate_dns1123_label(&volume.name, &idx_path.child("name")));
        }
        if volume.name.len() > MAX_VOLUME_NAME_LENGTH {
            errs.push(FieldError::too_long(
                idx_path.child("name"),
                &volume.name,
                MAX_VOLUME_NAME_LENGTH,
            ));
        }
        if !names.insert(volume.name.as_str()) {
            errs.push(FieldError::duplicate(idx_path.child("name"), &volume.name));
        }
        if !is_valid_volume_size(&volume.volume_size) {
            errs.push(FieldError::invalid(
                idx_path.child("size"),
                &volume.volume_size,
                format!("data volume size must match the regex {}", VOLUME_SIZE_PATTERN),
            ));
        }
    }

    if let Some(name) = &worker.kubelet_data_volume_name {
        if !worker.data_volumes.iter().any(|v| &v.name == name) {
            errs.push(FieldError::invalid(
                path.child("kubeletDataVolumeName"),
                name,
                format!("KubeletDataVolumeName refers to unrecognized data volume {}", name),
            ));
        }
    }

    errs
}

/// Pool names must be unique.
pub fn validate_workers(workers: &[Worker], path: &Path) -> ErrorList {
    let mut errs = ErrorList::new();
    let mut names = BTreeSet::new();
    for (i, worker) in workers.iter().enumerate() {
        if !names.insert(worker.name.as_str()) {
            errs.push(FieldError::duplicate(path.index(i).child("name"), &worker.name));
        }
    }
    errs
}

/// At least one active pool must accept system components. From 1.27 on, every such
/// pool needs a maximum covering its zones so system components can spread.
pub fn validate_system_component_workers(
    workers: &[Worker],
    kubernetes_version: &str,
    path: &Path,
) -> ErrorList {
    let mut errs = ErrorList::new();
    let mut any_active = false;

    // Pools with the same zone set share one entry.
    let mut sufficient: BTreeSet<String> = BTreeSet::new();
    let mut insufficient: BTreeMap<String, usize> = BTreeMap::new();

    for (i, worker) in workers.iter().enumerate() {
        if !worker.allows_system_components() || worker.minimum == 0 || worker.maximum == 0 {
            continue;
        }
        any_active = true;

        let zones: BTreeSet<&str> = worker.zones.iter().map(String::as_str).collect();
        let key = zones.into_iter().collect::<Vec<_>>().join("--");

        let covers_zones = usize::try_from(worker.maximum).is_ok_and(|max| max >= worker.zones.len());
        if covers_zones {
            insufficient.remove(&key);
            sufficient.insert(key);
        } else if !sufficient.contains(&key) {
            insufficient.insert(key, i);
        }
    }

    if version::is_at_least(kubernetes_version, "1.27") {
        let mut indices: Vec<usize> = insufficient.into_values().collect();
        indices.sort_unstable();
        for i in indices {
            errs.push(FieldError::forbidden(
                path.index(i).child("maximum"),
                "maximum node count should be greater than or equal to the number of zones specified for this pool",
            ));
        }
    }

    if !any_active {
        errs.push(FieldError::forbidden(
            path.clone(),
            "at least one active worker pool with allowSystemComponents=true needed",
        ));
    }

    errs
}

fn node_cidr_mask_size_path() -> Path {
    Path::new("spec")
        .child("kubernetes")
        .child("kubeControllerManager")
        .child("nodeCIDRMaskSize")
}

/// `2^exponent`, with non-positive exponents yielding 1 and saturation past `i128`.
fn pow2(exponent: i64) -> i128 {
    match u32::try_from(exponent) {
        Ok(e) if e < 127 => 1i128 << e,
        Ok(_) => i128::MAX,
        Err(_) => 1,
    }
}

/// Each node receives a pod subnet of `nodeCIDRMaskSize`; it must fit the highest `maxPods`.
pub fn validate_node_cidr_mask_with_max_pod(
    max_pod: i32,
    node_cidr_mask_size: i32,
    networking: &Networking,
) -> ErrorList {
    let (total_bits, default_mask) = if is_ipv6_single_stack(&networking.ip_families) {
        (128i64, DEFAULT_NODE_CIDR_MASK_SIZE_V6)
    } else {
        (32i64, DEFAULT_NODE_CIDR_MASK_SIZE_V4)
    };

    if node_cidr_mask_size < 0 {
        return vec![FieldError::invalid(
            node_cidr_mask_size_path(),
            &node_cidr_mask_size,
            "nodeCIDRMaskSize must not be negative",
        )];
    }

    let available = pow2(total_bits - i64::from(node_cidr_mask_size)).saturating_sub(2);
    if available < i128::from(max_pod) {
        return vec![FieldError::invalid(
            node_cidr_mask_size_path(),
            &node_cidr_mask_size,
            format!(
                "kubelet or kube-controller-manager configuration incorrect. Please adjust the nodeCIDRMaskSize to support the highest maxPod on any worker pool. The nodeCIDRMaskSize of {} (default: {}) only supports {} IP addresses. The highest maxPod setting is {} (default: {}). Please choose a nodeCIDRMaskSize that at least supports {} IP addresses",
                node_cidr_mask_size, default_mask, available, max_pod, DEFAULT_MAX_PODS, max_pod
            ),
        )];
    }
    ErrorList::new()
}

/// The pod network must hold one node subnet per possible node across all pools.
pub fn validate_total_node_count_with_pod_cidr(shoot: &Shoot) -> ErrorList {
    let networking = shoot.spec.networking.as_ref();
    let ip_families = networking.map(|n| n.ip_families.as_slice()).unwrap_or_default();

    let node_mask = shoot.spec.kubernetes.node_cidr_mask_size().unwrap_or(
        if is_ipv6_single_stack(ip_families) {
            DEFAULT_NODE_CIDR_MASK_SIZE_V6
        } else {
            DEFAULT_NODE_CIDR_MASK_SIZE_V4
        },
    );

    let total_nodes: i64 = shoot
        .spec
        .provider
        .workers
        .iter()
        .map(|w| i64::from(w.maximum))
        .sum();

    let pods = networking
        .and_then(|n| n.pods.as_deref())
        .unwrap_or(DEFAULT_POD_NETWORK_CIDR);
    let pods_path = Path::new("spec").child("networking").child("pods");

    let Ok(pod_network) = pods.parse::<IpNet>() else {
        return vec![FieldError::invalid(
            pods_path,
            pods,
            format!("cannot parse shoot's pod network cidr : {}", pods),
        )];
    };
    let pod_network = pod_network.trunc();
    if pod_network.prefix_len() == 0 {
        return vec![FieldError::invalid(
            pods_path,
            &pod_network.to_string(),
            format!(
                "incorrect pod network mask : {}. Please ensure the mask is in proper form",
                pod_network
            ),
        )];
    }

    let max_nodes = pow2(i64::from(node_mask) - i64::from(pod_network.prefix_len()));
    if max_nodes < i128::from(total_nodes) {
        return vec![FieldError::invalid(
            Path::new("spec").child("provider").child("workers"),
            &total_nodes,
            format!(
                "worker configuration incorrect. The podCIDRs in `spec.networking.pod` can only support a maximum of {} nodes. The total number of worker pool nodes should be less than {} ",
                max_nodes, max_nodes
            ),
        )];
    }
    ErrorList::new()
}

/// Taint keys are label names, unique per effect and not reserved.
pub fn validate_taints(taints: &[Taint], path: &Path) -> ErrorList {
    let mut errs = ErrorList::new();
    let mut unique: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();

    for (i, taint) in taints.iter().enumerate() {
        let idx_path = path.index(i);
        errs.extend(validate_label_name(&taint.key, &idx_path.child("key")));
        if RESERVED_TAINT_KEYS.contains(&taint.key.as_str()) {
            errs.push(FieldError::forbidden(
                idx_path.child("key"),
                "taint key is reserved by gardener",
            ));
        }

        let value = taint.value.as_deref().unwrap_or_default();
        let value_errs = is_valid_label_value(value);
        if !value_errs.is_empty() {
            errs.push(FieldError::invalid(idx_path.child("value"), value, value_errs.join(";")));
        }

        let effect_path = idx_path.child("effect");
        if taint.effect.is_empty() {
            errs.push(FieldError::required(effect_path, ""));
        } else if !TAINT_EFFECTS.contains(&taint.effect.as_str()) {
            errs.push(FieldError::not_supported(effect_path, &taint.effect, TAINT_EFFECTS));
        }

        let keys = unique.entry(taint.effect.as_str()).or_default();
        if !keys.insert(taint.key.as_str()) {
            let mut duplicate = FieldError::duplicate(idx_path, taint);
            duplicate.detail = "taints must be unique by key and effect pair".to_string();
            errs.push(duplicate);
        }
    }
    errs
}

pub fn validate_cri(cri: &Cri, kubernetes_version: &str, path: &Path) -> ErrorList {
    let mut errs = ErrorList::new();

    if version::is_at_least(kubernetes_version, "1.23") && cri.name == CRI_NAME_DOCKER {
        errs.push(FieldError::forbidden(
            path.child("name"),
            "'docker' is only allowed for kubernetes versions < 1.23",
        ));
    }
    if !AVAILABLE_CRI_NAMES.contains(&cri.name.as_str()) {
        errs.push(FieldError::not_supported(path.child("name"), &cri.name, AVAILABLE_CRI_NAMES));
    }
    errs.extend(validate_container_runtimes(
        &cri.container_runtimes,
        &path.child("containerruntimes"),
    ));
    errs
}

pub fn validate_container_runtimes(runtimes: &[ContainerRuntime], path: &Path) -> ErrorList {
    let mut errs = ErrorList::new();
    let mut seen = BTreeSet::new();
    for (i, runtime) in runtimes.iter().enumerate() {
        let type_path = path.index(i).child("type");
        if runtime.r#type.is_empty() {
            errs.push(FieldError::required(
                type_path.clone(),
                "must specify a container runtime type",
            ));
        }
        if !seen.insert(runtime.r#type.as_str()) {
            errs.push(FieldError::duplicate(
                type_path,
                &format!("must specify different type, {} already exist", runtime.r#type),
            ));
        }
    }
    errs
}

pub fn validate_architecture(arch: &str, path: &Path) -> ErrorList {
    if VALID_ARCHITECTURES.contains(&arch) {
        return ErrorList::new();
    }
    vec![FieldError::not_supported(path.clone(), arch, VALID_ARCHITECTURES)]
}
