//! The `spec.kubernetes` block: control-plane components, autoscalers and
//! version transitions.

use std::collections::BTreeSet;

use super::admission_plugins::validate_admission_plugins;
use super::cidr::is_ipv4_single_stack;
use super::field::{ErrorList, FieldError, Path, validate_immutable_field};
use super::kube_features::validate_feature_gates;
use super::kubelet::validate_kubelet_config;
use super::primitives::{parse_certificate_bundle, validate_label_name, validate_non_negative};
use super::workers::RESERVED_TAINT_KEYS;
use super::{WORKERLESS_ERROR_MSG, version};
use crate::crd::{
    ClusterAutoscaler, Duration, KubeApiServerConfig, KubeControllerManagerConfig,
    KubeProxyConfig, KubeSchedulerConfig, Kubernetes, LastOperationState, Networking, OidcConfig,
    Shoot, VerticalPodAutoscaler,
};

const AVAILABLE_PROXY_MODES: &[&str] = &["IPTables", "IPVS"];
const AVAILABLE_SCHEDULING_PROFILES: &[&str] = &["balanced", "bin-packing"];
const AVAILABLE_EXPANDER_MODES: &[&str] = &["least-waste", "most-pods", "priority", "random"];

// Asymmetric algorithms of RFC 7518 section 3.1.
const AVAILABLE_OIDC_SIGNING_ALGS: &[&str] = &[
    "ES256", "ES384", "ES512", "PS256", "PS384", "PS512", "RS256", "RS384", "RS512", "none",
];

const MAX_NON_MUTATING_REQUESTS_INFLIGHT: i32 = 800;
const MAX_MUTATING_REQUESTS_INFLIGHT: i32 = 400;

const MIN_MAX_TOKEN_EXPIRATION: Duration = Duration::from_hours(720);
const MAX_MAX_TOKEN_EXPIRATION: Duration = Duration::from_hours(2160);
const MAX_EVENT_TTL: Duration = Duration::from_hours(24 * 7);
const ONE_SECOND: Duration = Duration::from_secs(1);

pub const POD_SECURITY_POLICY_PLUGIN: &str = "PodSecurityPolicy";

pub fn validate_kubernetes(
    kubernetes: &Kubernetes,
    networking: Option<&Networking>,
    docker_configured: bool,
    workerless: bool,
    path: &Path,
) -> ErrorList {
    let mut errs = ErrorList::new();
    let version = kubernetes.version.as_str();

    if version.is_empty() {
        errs.push(FieldError::required(
            path.child("version"),
            "kubernetes version must not be empty",
        ));
        return errs;
    }

    if version::is_at_least(version, "1.27")
        && kubernetes.enable_static_token_kubeconfig.unwrap_or(false)
    {
        errs.push(FieldError::invalid(
            path.child("enableStaticTokenKubeconfig"),
            &kubernetes.enable_static_token_kubeconfig,
            "for Kubernetes versions >= 1.27, enableStaticTokenKubeconfig field cannot not be set to true, please see https://github.com/gardener/gardener/blob/master/docs/usage/shoot_access.md#static-token-kubeconfig",
        ));
    }

    errs.extend(validate_kube_api_server(
        kubernetes.kube_api_server.as_ref(),
        version,
        false,
        &path.child("kubeAPIServer"),
    ));
    errs.extend(validate_kube_controller_manager(
        kubernetes.kube_controller_manager.as_ref(),
        networking,
        version,
        workerless,
        &path.child("kubeControllerManager"),
    ));

    if workerless {
        errs.extend(validate_kubernetes_for_workerless_shoot(kubernetes, path));
        return errs;
    }

    errs.extend(validate_kube_scheduler(
        kubernetes.kube_scheduler.as_ref(),
        version,
        &path.child("kubeScheduler"),
    ));
    errs.extend(validate_kube_proxy(
        kubernetes.kube_proxy.as_ref(),
        version,
        &path.child("kubeProxy"),
    ));
    if let Some(kubelet) = &kubernetes.kubelet {
        errs.extend(validate_kubelet_config(
            kubelet,
            version,
            docker_configured,
            &path.child("kubelet"),
        ));
    }
    if let Some(autoscaler) = &kubernetes.cluster_autoscaler {
        errs.extend(validate_cluster_autoscaler(autoscaler, &path.child("clusterAutoscaler")));
    }
    if let Some(vpa) = &kubernetes.vertical_pod_autoscaler {
        errs.extend(validate_vertical_pod_autoscaler(vpa, &path.child("verticalPodAutoscaler")));
    }
    if version::is_at_least(version, "1.25") && kubernetes.allow_privileged_containers.is_some() {
        errs.push(FieldError::forbidden(
            path.child("allowPrivilegedContainers"),
            "for Kubernetes versions >= 1.25, allowPrivilegedContainers field should not be set, please see https://github.com/gardener/gardener/blob/master/docs/usage/pod-security.md#speckubernetesallowprivilegedcontainers-in-the-shoot-spec",
        ));
    }

    errs
}

/// Node-related components make no sense without nodes.
fn validate_kubernetes_for_workerless_shoot(kubernetes: &Kubernetes, path: &Path) -> ErrorList {
    [
        ("kubeScheduler", kubernetes.kube_scheduler.is_some()),
        ("kubeProxy", kubernetes.kube_proxy.is_some()),
        ("kubelet", kubernetes.kubelet.is_some()),
        ("clusterAutoscaler", kubernetes.cluster_autoscaler.is_some()),
        ("verticalPodAutoscaler", kubernetes.vertical_pod_autoscaler.is_some()),
        ("allowPrivilegedContainers", kubernetes.allow_privileged_containers.is_some()),
    ]
    .into_iter()
    .filter(|(_, set)| *set)
    .map(|(name, _)| FieldError::forbidden(path.child(name), WORKERLESS_ERROR_MSG))
    .collect()
}

fn nil_or_empty(value: Option<&String>) -> bool {
    value.is_none_or(|v| v.is_empty())
}

/// Scheme and host of an URL as a lenient parser would see them.
fn scheme_and_host(raw: &str) -> (String, String) {
    match url::Url::parse(raw) {
        Ok(parsed) => (
            parsed.scheme().to_string(),
            parsed.host_str().unwrap_or_default().to_string(),
        ),
        Err(_) => {
            let scheme = raw.split_once("://").map(|(s, _)| s).unwrap_or_default();
            (scheme.to_lowercase(), String::new())
        }
    }
}

fn validate_oidc_config(oidc: &OidcConfig, path: &Path) -> ErrorList {
    let mut errs = ErrorList::new();
    let client_id_path = path.child("clientID");
    let issuer_path = path.child("issuerURL");

    if nil_or_empty(oidc.client_id.as_ref()) {
        if oidc.client_id.is_some() {
            errs.push(FieldError::invalid(
                client_id_path.clone(),
                &oidc.client_id,
                "clientID cannot be empty when key is provided",
            ));
        }
        if !nil_or_empty(oidc.issuer_url.as_ref()) {
            errs.push(FieldError::invalid(
                client_id_path,
                &oidc.client_id,
                "clientID must be set when issuerURL is provided",
            ));
        }
    }

    match oidc.issuer_url.as_deref() {
        Some(issuer) if !issuer.is_empty() => {
            let (scheme, host) = scheme_and_host(issuer);
            if host.is_empty() {
                errs.push(FieldError::invalid(
                    issuer_path.clone(),
                    issuer,
                    "must be a valid URL and have https scheme",
                ));
            }
            if scheme != "https" {
                errs.push(FieldError::invalid(issuer_path, issuer, "must have https scheme"));
            }
        }
        _ => {
            if oidc.issuer_url.is_some() {
                errs.push(FieldError::invalid(
                    issuer_path.clone(),
                    &oidc.issuer_url,
                    "issuerURL cannot be empty when key is provided",
                ));
            }
            if !nil_or_empty(oidc.client_id.as_ref()) {
                errs.push(FieldError::invalid(
                    issuer_path,
                    &oidc.issuer_url,
                    "issuerURL must be set when clientID is provided",
                ));
            }
        }
    }

    if let Some(bundle) = &oidc.ca_bundle {
        if parse_certificate_bundle(bundle).is_err() {
            errs.push(FieldError::invalid(
                path.child("caBundle"),
                bundle,
                "caBundle is not a valid PEM-encoded certificate",
            ));
        }
    }

    for (name, value) in [
        ("groupsClaim", &oidc.groups_claim),
        ("groupsPrefix", &oidc.groups_prefix),
    ] {
        if let Some(v) = value.as_deref().filter(|v| v.is_empty()) {
            errs.push(FieldError::invalid(
                path.child(name),
                v,
                format!("{} cannot be empty when key is provided", name),
            ));
        }
    }

    for (i, alg) in oidc.signing_algs.iter().enumerate() {
        if !AVAILABLE_OIDC_SIGNING_ALGS.contains(&alg.as_str()) {
            errs.push(FieldError::not_supported(
                path.child("signingAlgs").index(i),
                alg,
                AVAILABLE_OIDC_SIGNING_ALGS,
            ));
        }
    }

    for (name, value) in [
        ("usernameClaim", &oidc.username_claim),
        ("usernamePrefix", &oidc.username_prefix),
    ] {
        if let Some(v) = value.as_deref().filter(|v| v.is_empty()) {
            errs.push(FieldError::invalid(
                path.child(name),
                v,
                format!("{} cannot be empty when key is provided", name),
            ));
        }
    }

    errs
}

pub fn validate_kube_api_server(
    kube_api_server: Option<&KubeApiServerConfig>,
    version: &str,
    kubeconfig_allowed_for_admission_plugins: bool,
    path: &Path,
) -> ErrorList {
    let mut errs = ErrorList::new();
    let Some(kas) = kube_api_server else {
        return errs;
    };

    if let Some(oidc) = &kas.oidc_config {
        errs.extend(validate_oidc_config(oidc, &path.child("oidcConfig")));
    }

    errs.extend(validate_admission_plugins(
        &kas.admission_plugins,
        version,
        kubeconfig_allowed_for_admission_plugins,
        &path.child("admissionPlugins"),
    ));

    let config_map_ref = kas
        .audit_config
        .as_ref()
        .and_then(|a| a.audit_policy.as_ref())
        .and_then(|p| p.config_map_ref.as_ref());
    if let Some(config_map_ref) = config_map_ref {
        if config_map_ref.name.is_empty() {
            errs.push(FieldError::required(
                path.child("auditConfig")
                    .child("auditPolicy")
                    .child("configMapRef")
                    .child("name"),
                "must provide a name",
            ));
        }
    }

    if let Some(sizes) = &kas.watch_cache_sizes {
        let sizes_path = path.child("watchCacheSizes");
        if let Some(default) = sizes.default {
            errs.extend(validate_non_negative(i64::from(default), &sizes_path.child("default")));
        }
        for (i, resource) in sizes.resources.iter().enumerate() {
            let idx_path = sizes_path.child("resources").index(i);
            if resource.resource.is_empty() {
                errs.push(FieldError::required(idx_path.child("resource"), "must not be empty"));
            }
            errs.extend(validate_non_negative(i64::from(resource.size), &idx_path.child("size")));
        }
    }

    if let Some(logging) = &kas.logging {
        let logging_path = path.child("logging");
        if let Some(v) = logging.verbosity {
            errs.extend(validate_non_negative(i64::from(v), &logging_path.child("verbosity")));
        }
        if let Some(v) = logging.http_access_verbosity {
            errs.extend(validate_non_negative(
                i64::from(v),
                &logging_path.child("httpAccessVerbosity"),
            ));
        }
    }

    if let Some(seconds) = kas.default_not_ready_toleration_seconds {
        errs.extend(validate_non_negative(seconds, &path.child("defaultNotReadyTolerationSeconds")));
    }
    if let Some(seconds) = kas.default_unreachable_toleration_seconds {
        errs.extend(validate_non_negative(
            seconds,
            &path.child("defaultUnreachableTolerationSeconds"),
        ));
    }

    if let Some(requests) = &kas.requests {
        let requests_path = path.child("requests");
        for (name, value, max) in [
            (
                "maxNonMutatingInflight",
                requests.max_non_mutating_inflight,
                MAX_NON_MUTATING_REQUESTS_INFLIGHT,
            ),
            (
                "maxMutatingInflight",
                requests.max_mutating_inflight,
                MAX_MUTATING_REQUESTS_INFLIGHT,
            ),
        ] {
            let Some(value) = value else { continue };
            let value_path = requests_path.child(name);
            errs.extend(validate_non_negative(i64::from(value), &value_path));
            if value > max {
                errs.push(FieldError::invalid(
                    value_path,
                    &value,
                    format!("cannot set higher than {}", max),
                ));
            }
        }
    }

    if let Some(sa) = &kas.service_account_config {
        let sa_path = path.child("serviceAccountConfig");
        if let Some(expiration) = &sa.max_token_expiration {
            let expiration_path = sa_path.child("maxTokenExpiration");
            if expiration.is_negative() {
                errs.push(FieldError::invalid(
                    expiration_path.clone(),
                    &expiration.to_string(),
                    "can not be negative",
                ));
            }
            if *expiration > Duration::ZERO && *expiration < MIN_MAX_TOKEN_EXPIRATION {
                errs.push(FieldError::forbidden(
                    expiration_path.clone(),
                    "must be at least 720h (30d)",
                ));
            }
            if *expiration > MAX_MAX_TOKEN_EXPIRATION {
                errs.push(FieldError::forbidden(expiration_path, "must be at most 2160h (90d)"));
            }
        }
        if sa.accepted_issuers.is_some() && !version::is_at_least(version, "1.22") {
            errs.push(FieldError::forbidden(
                sa_path.child("acceptedIssuers"),
                "this field is only available in Kubernetes v1.22+",
            ));
        }
    }

    if let Some(ttl) = &kas.event_ttl {
        if ttl.is_negative() {
            errs.push(FieldError::invalid(path.child("eventTTL"), &ttl.to_string(), "can not be negative"));
        }
        if *ttl > MAX_EVENT_TTL {
            errs.push(FieldError::invalid(
                path.child("eventTTL"),
                &ttl.to_string(),
                "can not be longer than 7d",
            ));
        }
    }

    errs.extend(validate_feature_gates(&kas.feature_gates, version, &path.child("featureGates")));

    errs
}

pub fn validate_kube_controller_manager(
    kcm: Option<&KubeControllerManagerConfig>,
    networking: Option<&Networking>,
    version: &str,
    workerless: bool,
    path: &Path,
) -> ErrorList {
    let mut errs = ErrorList::new();
    let Some(kcm) = kcm else {
        return errs;
    };

    if workerless {
        for (name, set) in [
            ("nodeCIDRMaskSize", kcm.node_cidr_mask_size.is_some()),
            ("horizontalPodAutoscaler", kcm.horizontal_pod_autoscaler.is_some()),
            ("podEvictionTimeout", kcm.pod_eviction_timeout.is_some()),
            ("nodeMonitorGracePeriod", kcm.node_monitor_grace_period.is_some()),
        ] {
            if set {
                errs.push(FieldError::forbidden(path.child(name), WORKERLESS_ERROR_MSG));
            }
        }
    } else {
        if let (Some(mask), Some(networking)) = (kcm.node_cidr_mask_size, networking) {
            if is_ipv4_single_stack(&networking.ip_families) && !(16..=28).contains(&mask) {
                errs.push(FieldError::invalid(
                    path.child("nodeCIDRMaskSize"),
                    &mask,
                    "nodeCIDRMaskSize must be between 16 and 28",
                ));
            }
        }

        for (name, value) in [
            ("podEvictionTimeout", &kcm.pod_eviction_timeout),
            ("nodeMonitorGracePeriod", &kcm.node_monitor_grace_period),
        ] {
            if let Some(d) = value.filter(|d| *d <= Duration::ZERO) {
                errs.push(FieldError::invalid(
                    path.child(name),
                    &d.to_string(),
                    format!("{} must be larger than 0", name),
                ));
            }
        }

        if let Some(hpa) = &kcm.horizontal_pod_autoscaler {
            let hpa_path = path.child("horizontalPodAutoscaler");
            if let Some(d) = hpa.sync_period.filter(|d| *d < ONE_SECOND) {
                errs.push(FieldError::invalid(
                    hpa_path.child("syncPeriod"),
                    &d.to_string(),
                    "syncPeriod must not be less than a second",
                ));
            }
            if let Some(t) = hpa.tolerance.filter(|t| *t <= 0.0) {
                errs.push(FieldError::invalid(
                    hpa_path.child("tolerance"),
                    &t,
                    "tolerance must be greater than 0",
                ));
            }
            if let Some(d) = hpa.downscale_stabilization.filter(|d| *d < ONE_SECOND) {
                errs.push(FieldError::invalid(
                    hpa_path.child("downscaleStabilization"),
                    &d.to_string(),
                    "downScale stabilization must not be less than a second",
                ));
            }
            if let Some(d) = hpa.initial_readiness_delay.filter(|d| *d <= Duration::ZERO) {
                errs.push(FieldError::invalid(
                    hpa_path.child("initialReadinessDelay"),
                    &d.to_string(),
                    "initial readiness delay must be greater than 0",
                ));
            }
            if let Some(d) = hpa.cpu_initialization_period.filter(|d| *d < ONE_SECOND) {
                errs.push(FieldError::invalid(
                    hpa_path.child("cpuInitializationPeriod"),
                    &d.to_string(),
                    "cpu initialization period must not be less than a second",
                ));
            }
        }
    }

    errs.extend(validate_feature_gates(&kcm.feature_gates, version, &path.child("featureGates")));
    errs
}

pub fn validate_kube_scheduler(
    scheduler: Option<&KubeSchedulerConfig>,
    version: &str,
    path: &Path,
) -> ErrorList {
    let mut errs = ErrorList::new();
    let Some(scheduler) = scheduler else {
        return errs;
    };
    if let Some(profile) = &scheduler.profile {
        if !AVAILABLE_SCHEDULING_PROFILES.contains(&profile.as_str()) {
            errs.push(FieldError::not_supported(
                path.child("profile"),
                profile,
                AVAILABLE_SCHEDULING_PROFILES,
            ));
        }
    }
    errs.extend(validate_feature_gates(&scheduler.feature_gates, version, &path.child("featureGates")));
    errs
}

pub fn validate_kube_proxy(proxy: Option<&KubeProxyConfig>, version: &str, path: &Path) -> ErrorList {
    let mut errs = ErrorList::new();
    let Some(proxy) = proxy else {
        return errs;
    };
    match &proxy.mode {
        None => errs.push(FieldError::required(
            path.child("mode"),
            "must be set when .spec.kubernetes.kubeProxy is set",
        )),
        Some(mode) if !AVAILABLE_PROXY_MODES.contains(&mode.as_str()) => errs.push(
            FieldError::not_supported(path.child("mode"), mode, AVAILABLE_PROXY_MODES),
        ),
        Some(_) => {}
    }
    errs.extend(validate_feature_gates(&proxy.feature_gates, version, &path.child("featureGates")));
    errs
}

pub fn validate_cluster_autoscaler(autoscaler: &ClusterAutoscaler, path: &Path) -> ErrorList {
    let mut errs = ErrorList::new();

    if let Some(threshold) = autoscaler.scale_down_utilization_threshold {
        let threshold_path = path.child("scaleDownUtilizationThreshold");
        if threshold < 0.0 {
            errs.push(FieldError::invalid(threshold_path.clone(), &threshold, "can not be negative"));
        }
        if threshold > 1.0 {
            errs.push(FieldError::invalid(threshold_path, &threshold, "can not be greater than 1.0"));
        }
    }
    if let Some(d) = autoscaler.max_node_provision_time.filter(Duration::is_negative) {
        errs.push(FieldError::invalid(
            path.child("maxNodeProvisionTime"),
            &d.to_string(),
            "can not be negative",
        ));
    }
    if let Some(seconds) = autoscaler.max_graceful_termination_seconds.filter(|s| *s < 0) {
        errs.push(FieldError::invalid(
            path.child("maxGracefulTerminationSeconds"),
            &seconds,
            "can not be negative",
        ));
    }
    if let Some(expander) = &autoscaler.expander {
        if !AVAILABLE_EXPANDER_MODES.contains(&expander.as_str()) {
            errs.push(FieldError::not_supported(
                path.child("expander"),
                expander,
                AVAILABLE_EXPANDER_MODES,
            ));
        }
    }
    errs.extend(validate_cluster_autoscaler_ignore_taints(
        &autoscaler.ignore_taints,
        &path.child("ignoreTaints"),
    ));

    errs
}

fn validate_cluster_autoscaler_ignore_taints(taints: &[String], path: &Path) -> ErrorList {
    let mut errs = ErrorList::new();
    let mut seen = BTreeSet::new();
    for (i, taint) in taints.iter().enumerate() {
        let idx_path = path.index(i);
        errs.extend(validate_label_name(taint, &idx_path));
        if RESERVED_TAINT_KEYS.contains(&taint.as_str()) {
            errs.push(FieldError::forbidden(idx_path.clone(), "taint key is reserved by gardener"));
        }
        if !seen.insert(taint.as_str()) {
            errs.push(FieldError::duplicate(idx_path, taint));
        }
    }
    errs
}

pub fn validate_vertical_pod_autoscaler(vpa: &VerticalPodAutoscaler, path: &Path) -> ErrorList {
    [
        ("evictAfterOOMThreshold", vpa.evict_after_oom_threshold),
        ("updaterInterval", vpa.updater_interval),
        ("recommenderInterval", vpa.recommender_interval),
    ]
    .into_iter()
    .filter_map(|(name, d)| d.filter(Duration::is_negative).map(|d| (name, d)))
    .map(|(name, d)| FieldError::invalid(path.child(name), &d.to_string(), "can not be negative"))
    .collect()
}

/// Upgrades go forward by at most one minor: `1.24.x` may become any `1.25.y`, never `1.26.0`.
pub fn validate_kubernetes_version_update(new: &str, old: &str, path: &Path) -> ErrorList {
    let mut errs = ErrorList::new();

    if new.is_empty() {
        errs.push(FieldError::invalid(
            path.clone(),
            new,
            "cannot validate kubernetes version upgrade because it is unset",
        ));
        return errs;
    }

    match version::compare_versions(new, "<", old) {
        Ok(true) => errs.push(FieldError::forbidden(
            path.clone(),
            "kubernetes version downgrade is not supported",
        )),
        Ok(false) => {}
        Err(e) => errs.push(FieldError::invalid(path.clone(), new, e.to_string())),
    }

    let old_version = match version::parse(old) {
        Ok(v) => v,
        Err(e) => {
            errs.push(FieldError::invalid(path.clone(), old, e.to_string()));
            return errs;
        }
    };
    let next_minor = version::bump_minor(&old_version, 2);
    match version::compare_versions(new, ">=", &next_minor.to_string()) {
        Ok(true) => errs.push(FieldError::forbidden(
            path.clone(),
            "kubernetes version upgrade cannot skip a minor version",
        )),
        Ok(false) => {}
        Err(e) => errs.push(FieldError::invalid(path.clone(), new, e.to_string())),
    }

    errs
}

/// A pool may trail the control plane by at most two minors and never lead it.
pub fn validate_worker_group_and_control_plane_kubernetes_version(
    control_plane_version: &str,
    worker_group_version: &str,
    path: &Path,
) -> ErrorList {
    let mut errs = ErrorList::new();

    match version::compare_versions(worker_group_version, ">", control_plane_version) {
        Ok(true) => errs.push(FieldError::forbidden(
            path.clone(),
            "worker group kubernetes version must not be higher than control plane version",
        )),
        Ok(false) => {}
        Err(e) => errs.push(FieldError::invalid(path.clone(), control_plane_version, e.to_string())),
    }

    let worker_version = match version::parse(worker_group_version) {
        Ok(v) => v,
        Err(e) => {
            errs.push(FieldError::invalid(path.clone(), worker_group_version, e.to_string()));
            return errs;
        }
    };
    let skew_limit = version::bump_minor(&worker_version, 3);
    match version::compare_versions(control_plane_version, ">=", &skew_limit.to_string()) {
        Ok(true) => errs.push(FieldError::forbidden(
            path.clone(),
            "worker group kubernetes version must be at most two minor versions behind control plane version",
        )),
        Ok(false) => {}
        Err(e) => errs.push(FieldError::invalid(path.clone(), control_plane_version, e.to_string())),
    }

    errs
}

fn is_psp_disabled(kube_api_server: Option<&KubeApiServerConfig>) -> bool {
    kube_api_server
        .and_then(|kas| kas.admission_plugin(POD_SECURITY_POLICY_PLUGIN))
        .is_some_and(|plugin| plugin.disabled.unwrap_or(false))
}

/// Whether the last reconciliation of `shoot` finished for its current generation.
pub fn shoot_reconciliation_successful(shoot: &Shoot) -> Result<(), String> {
    let generation = shoot.metadata.generation.unwrap_or_default();
    let status = shoot.status.as_ref();
    if generation != status.map(|s| s.observed_generation).unwrap_or_default() {
        return Err("shoot was not yet synced".to_string());
    }
    let Some(last_operation) = status.and_then(|s| s.last_operation.as_ref()) else {
        return Err("last operation is not set".to_string());
    };
    if last_operation.state != LastOperationState::Succeeded {
        return Err(format!(
            "last operation({}) did not succeed: {}",
            last_operation.r#type, last_operation.state
        ));
    }
    Ok(())
}

/// Crossing into 1.25 requires PodSecurityPolicy to be switched off beforehand.
pub fn validate_kubernetes_version_update_125(new: &Shoot, old: &Shoot) -> ErrorList {
    let mut errs = ErrorList::new();
    let path = Path::new("spec").child("kubernetes").child("version");

    let new_version = &new.spec.kubernetes.version;
    let old_version = &old.spec.kubernetes.version;

    let new_at_least_125 = version::check_version_meets_constraint(new_version, ">= 1.25")
        .unwrap_or_else(|_| {
            errs.push(FieldError::invalid(path.clone(), new_version, "Invalid new kubernetes version"));
            false
        });
    let old_below_125 = version::check_version_meets_constraint(old_version, "< 1.25")
        .unwrap_or_else(|_| {
            errs.push(FieldError::invalid(path.clone(), old_version, "Invalid old kubernetes version"));
            false
        });

    if new.spec.is_workerless() || !new_at_least_125 || !old_below_125 {
        return errs;
    }

    let psp_disabled = is_psp_disabled(new.spec.kubernetes.kube_api_server.as_ref())
        && is_psp_disabled(old.spec.kubernetes.kube_api_server.as_ref());
    if !psp_disabled {
        errs.push(FieldError::forbidden(
            path,
            r#"admission plugin "PodSecurityPolicy" should be disabled for Kubernetes versions >=1.25, please check https://github.com/gardener/gardener/blob/master/docs/usage/pod-security.md#migrating-from-podsecuritypolicys-to-podsecurity-admission-controller"#,
        ));
    } else if let Err(msg) = shoot_reconciliation_successful(old) {
        errs.push(FieldError::forbidden(
            path,
            format!(
                "Shoot should have been reconciled successfully before upgrading to v1.25; error: {}",
                msg
            ),
        ));
    }

    errs
}

pub fn validate_kube_controller_manager_update(
    new: Option<&KubeControllerManagerConfig>,
    old: Option<&KubeControllerManagerConfig>,
    path: &Path,
) -> ErrorList {
    let new_mask = new.and_then(|kcm| kcm.node_cidr_mask_size);
    let old_mask = old.and_then(|kcm| kcm.node_cidr_mask_size);
    validate_immutable_field(&new_mask, &old_mask, &path.child("nodeCIDRMaskSize"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::crd::{
        AdmissionPlugin, ApiServerRequests, HorizontalPodAutoscalerConfig, KubeletConfig,
        LastOperation, LastOperationType, ServiceAccountConfig, ShootStatus, Worker,
    };
    use crate::validation::field::ErrorType;

    fn kubernetes(version: &str) -> Kubernetes {
        Kubernetes {
            version: version.to_string(),
            ..Default::default()
        }
    }

    fn path() -> Path {
        Path::new("spec").child("kubernetes")
    }

    #[test]
    fn test_empty_version() {
        let errs = validate_kubernetes(&kubernetes(""), None, false, false, &path());
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].field.to_string(), "spec.kubernetes.version");
    }

    #[test]
    fn test_static_token_kubeconfig() {
        let mut k = kubernetes("1.27.0");
        k.enable_static_token_kubeconfig = Some(true);
        assert_eq!(validate_kubernetes(&k, None, false, false, &path()).len(), 1);
        k.version = "1.26.5".to_string();
        assert!(validate_kubernetes(&k, None, false, false, &path()).is_empty());
    }

    #[test]
    fn test_allow_privileged_containers() {
        let mut k = kubernetes("1.25.0");
        k.allow_privileged_containers = Some(true);
        let errs = validate_kubernetes(&k, None, false, false, &path());
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].field.to_string(), "spec.kubernetes.allowPrivilegedContainers");
        k.version = "1.24.0".to_string();
        assert!(validate_kubernetes(&k, None, false, false, &path()).is_empty());
    }

    #[test]
    fn test_workerless_forbids_node_components() {
        let mut k = kubernetes("1.27.0");
        k.kubelet = Some(KubeletConfig::default());
        k.cluster_autoscaler = Some(ClusterAutoscaler::default());
        let errs = validate_kubernetes(&k, None, false, true, &path());
        let fields: Vec<String> = errs.iter().map(|e| e.field.to_string()).collect();
        assert_eq!(
            fields,
            vec!["spec.kubernetes.kubelet", "spec.kubernetes.clusterAutoscaler"]
        );
        assert!(errs.iter().all(|e| e.error_type == ErrorType::Forbidden));
    }

    #[test]
    fn test_oidc() {
        let oidc = OidcConfig {
            client_id: Some("client".to_string()),
            issuer_url: Some("https://issuer.example.com".to_string()),
            ..Default::default()
        };
        assert!(validate_oidc_config(&oidc, &Path::new("oidc")).is_empty());

        let oidc = OidcConfig {
            client_id: Some("client".to_string()),
            issuer_url: Some("http://issuer.example.com".to_string()),
            ..Default::default()
        };
        let errs = validate_oidc_config(&oidc, &Path::new("oidc"));
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].detail, "must have https scheme");

        let oidc = OidcConfig {
            issuer_url: Some("issuer".to_string()),
            ..Default::default()
        };
        let errs = validate_oidc_config(&oidc, &Path::new("oidc"));
        let details: Vec<&str> = errs.iter().map(|e| e.detail.as_str()).collect();
        assert_eq!(
            details,
            vec![
                "clientID must be set when issuerURL is provided",
                "must be a valid URL and have https scheme",
                "must have https scheme",
            ]
        );

        let oidc = OidcConfig {
            groups_claim: Some(String::new()),
            signing_algs: vec!["HS256".to_string()],
            ca_bundle: Some("garbage".to_string()),
            ..Default::default()
        };
        let errs = validate_oidc_config(&oidc, &Path::new("oidc"));
        let fields: Vec<String> = errs.iter().map(|e| e.field.to_string()).collect();
        assert_eq!(
            fields,
            vec!["oidc.caBundle", "oidc.groupsClaim", "oidc.signingAlgs[0]"]
        );
    }

    #[test]
    fn test_api_server_requests_and_tokens() {
        let kas = KubeApiServerConfig {
            requests: Some(ApiServerRequests {
                max_non_mutating_inflight: Some(801),
                max_mutating_inflight: Some(-1),
            }),
            service_account_config: Some(ServiceAccountConfig {
                max_token_expiration: Some(Duration::from_hours(24)),
                ..Default::default()
            }),
            event_ttl: Some(Duration::from_hours(24 * 8)),
            ..Default::default()
        };
        let errs = validate_kube_api_server(Some(&kas), "1.27.0", false, &Path::new("kas"));
        let fields: Vec<String> = errs.iter().map(|e| e.field.to_string()).collect();
        assert_eq!(
            fields,
            vec![
                "kas.requests.maxNonMutatingInflight",
                "kas.requests.maxMutatingInflight",
                "kas.serviceAccountConfig.maxTokenExpiration",
                "kas.eventTTL",
            ]
        );
    }

    #[test]
    fn test_api_server_admission_plugins_kubeconfig_forbidden() {
        let kas = KubeApiServerConfig {
            admission_plugins: vec![AdmissionPlugin {
                name: "ImagePolicyWebhook".to_string(),
                kubeconfig_secret_name: Some("secret".to_string()),
                ..Default::default()
            }],
            ..Default::default()
        };
        let k = Kubernetes {
            version: "1.27.0".to_string(),
            kube_api_server: Some(kas),
            ..Default::default()
        };
        let errs = validate_kubernetes(&k, None, false, false, &path());
        assert_eq!(errs.len(), 1);
        assert_eq!(
            errs[0].field.to_string(),
            "spec.kubernetes.kubeAPIServer.admissionPlugins[0].kubeconfigSecretName"
        );
    }

    #[test]
    fn test_kube_controller_manager() {
        let kcm = KubeControllerManagerConfig {
            node_cidr_mask_size: Some(30),
            pod_eviction_timeout: Some(Duration::ZERO),
            horizontal_pod_autoscaler: Some(HorizontalPodAutoscalerConfig {
                tolerance: Some(0.0),
                ..Default::default()
            }),
            ..Default::default()
        };
        let networking = Networking::default();
        let p = Path::new("kcm");
        let errs = validate_kube_controller_manager(Some(&kcm), Some(&networking), "1.27.0", false, &p);
        let fields: Vec<String> = errs.iter().map(|e| e.field.to_string()).collect();
        assert_eq!(
            fields,
            vec![
                "kcm.nodeCIDRMaskSize",
                "kcm.podEvictionTimeout",
                "kcm.horizontalPodAutoscaler.tolerance",
            ]
        );

        let errs = validate_kube_controller_manager(Some(&kcm), None, "1.27.0", true, &p);
        assert_eq!(errs.len(), 3);
        assert!(errs.iter().all(|e| e.error_type == ErrorType::Forbidden));
    }

    #[test]
    fn test_scheduler_and_proxy() {
        let scheduler = KubeSchedulerConfig {
            profile: Some("fast".to_string()),
            ..Default::default()
        };
        let errs = validate_kube_scheduler(Some(&scheduler), "1.27.0", &Path::new("ks"));
        assert_eq!(errs[0].error_type, ErrorType::NotSupported);

        let proxy = KubeProxyConfig::default();
        let errs = validate_kube_proxy(Some(&proxy), "1.27.0", &Path::new("kp"));
        assert_eq!(errs[0].error_type, ErrorType::Required);

        let proxy = KubeProxyConfig {
            mode: Some("IPVS".to_string()),
            ..Default::default()
        };
        assert!(validate_kube_proxy(Some(&proxy), "1.27.0", &Path::new("kp")).is_empty());
    }

    #[test]
    fn test_cluster_autoscaler() {
        let ca = ClusterAutoscaler {
            scale_down_utilization_threshold: Some(1.5),
            max_graceful_termination_seconds: Some(-1),
            expander: Some("cheapest".to_string()),
            ignore_taints: vec![
                "a".to_string(),
                "a".to_string(),
                RESERVED_TAINT_KEYS[0].to_string(),
            ],
            ..Default::default()
        };
        let errs = validate_cluster_autoscaler(&ca, &Path::new("ca"));
        let kinds: Vec<ErrorType> = errs.iter().map(|e| e.error_type).collect();
        assert_eq!(
            kinds,
            vec![
                ErrorType::Invalid,
                ErrorType::Invalid,
                ErrorType::NotSupported,
                ErrorType::Duplicate,
                ErrorType::Forbidden,
            ]
        );
    }

    #[test]
    fn test_vertical_pod_autoscaler() {
        let vpa = VerticalPodAutoscaler {
            updater_interval: Some(Duration::from_secs(-1)),
            ..Default::default()
        };
        let errs = validate_vertical_pod_autoscaler(&vpa, &Path::new("vpa"));
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].field.to_string(), "vpa.updaterInterval");
    }

    #[test]
    fn test_version_update() {
        let p = Path::new("spec").child("kubernetes").child("version");
        assert!(validate_kubernetes_version_update("1.25.3", "1.24.9", &p).is_empty());
        assert!(validate_kubernetes_version_update("1.24.9", "1.24.9", &p).is_empty());

        let errs = validate_kubernetes_version_update("1.24.1", "1.24.9", &p);
        assert_eq!(errs[0].detail, "kubernetes version downgrade is not supported");

        let errs = validate_kubernetes_version_update("1.26.0", "1.24.9", &p);
        assert_eq!(errs[0].detail, "kubernetes version upgrade cannot skip a minor version");

        let errs = validate_kubernetes_version_update("", "1.24.9", &p);
        assert_eq!(errs[0].error_type, ErrorType::Invalid);

        let errs = validate_kubernetes_version_update("1.25.0", "foo", &p);
        assert!(errs.iter().all(|e| e.error_type == ErrorType::Invalid));
    }

    #[test]
    fn test_worker_group_version() {
        let p = Path::new("v");
        assert!(validate_worker_group_and_control_plane_kubernetes_version("1.27.3", "1.25.0", &p)
            .is_empty());
        let errs = validate_worker_group_and_control_plane_kubernetes_version("1.27.3", "1.24.9", &p);
        assert_eq!(errs.len(), 1);
        assert!(errs[0].detail.contains("at most two minor versions behind"));
        let errs = validate_worker_group_and_control_plane_kubernetes_version("1.27.3", "1.28.0", &p);
        assert_eq!(errs.len(), 1);
        assert!(errs[0].detail.contains("must not be higher"));
    }

    fn shoot(version: &str, psp_disabled: bool) -> Shoot {
        let mut shoot = Shoot::new("s", Default::default());
        shoot.spec.kubernetes.version = version.to_string();
        shoot.spec.provider.workers = vec![Worker::default()];
        if psp_disabled {
            shoot.spec.kubernetes.kube_api_server = Some(KubeApiServerConfig {
                admission_plugins: vec![AdmissionPlugin {
                    name: POD_SECURITY_POLICY_PLUGIN.to_string(),
                    disabled: Some(true),
                    ..Default::default()
                }],
                ..Default::default()
            });
        }
        shoot
    }

    #[test]
    fn test_version_update_125() {
        let new = shoot("1.25.0", true);
        let mut old = shoot("1.24.8", false);
        let errs = validate_kubernetes_version_update_125(&new, &old);
        assert_eq!(errs.len(), 1);
        assert!(errs[0].detail.contains("PodSecurityPolicy"));

        old = shoot("1.24.8", true);
        let errs = validate_kubernetes_version_update_125(&new, &old);
        assert_eq!(errs.len(), 1);
        assert!(errs[0].detail.contains("last operation is not set"));

        old.status = Some(ShootStatus {
            last_operation: Some(LastOperation {
                r#type: LastOperationType::Reconcile,
                state: LastOperationState::Succeeded,
                description: String::new(),
                progress: 100,
                last_update_time: None,
            }),
            ..Default::default()
        });
        assert!(validate_kubernetes_version_update_125(&new, &old).is_empty());

        // no crossing, nothing to check
        assert!(validate_kubernetes_version_update_125(&shoot("1.26.0", false), &shoot("1.25.0", false))
            .is_empty());
    }

    #[test]
    fn test_kube_controller_manager_update() {
        let old = KubeControllerManagerConfig {
            node_cidr_mask_size: Some(24),
            ..Default::default()
        };
        let p = Path::new("kcm");
        assert!(validate_kube_controller_manager_update(Some(&old), Some(&old), &p).is_empty());
        assert_eq!(validate_kube_controller_manager_update(None, Some(&old), &p).len(), 1);
    }
}
