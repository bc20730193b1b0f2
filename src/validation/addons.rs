//! Optional addons and the system components running on worker nodes.

use std::collections::BTreeSet;

use super::field::{ErrorList, FieldError, Path};
use super::{WORKERLESS_ERROR_MSG, version};
use crate::crd::{Addons, CoreDns, SystemComponents};

const AVAILABLE_NGINX_INGRESS_EXTERNAL_TRAFFIC_POLICIES: &[&str] = &["Cluster", "Local"];
const AVAILABLE_DASHBOARD_AUTHENTICATION_MODES: &[&str] = &["token"];
const AVAILABLE_CORE_DNS_AUTOSCALING_MODES: &[&str] = &["cluster-proportional", "horizontal"];

pub const PURPOSE_EVALUATION: &str = "evaluation";

fn nginx_ingress_enabled(addons: Option<&Addons>) -> bool {
    addons
        .and_then(|a| a.nginx_ingress.as_ref())
        .is_some_and(|n| n.enabled)
}

fn dashboard_enabled(addons: Option<&Addons>) -> bool {
    addons
        .and_then(|a| a.kubernetes_dashboard.as_ref())
        .is_some_and(|d| d.enabled)
}

pub fn validate_addons(
    addons: Option<&Addons>,
    kubernetes_version: &str,
    purpose: Option<&str>,
    workerless: bool,
    path: &Path,
) -> ErrorList {
    let mut errs = ErrorList::new();

    if workerless && addons.is_some() {
        errs.push(FieldError::forbidden(
            path.clone(),
            "addons cannot be enabled for Workerless Shoot clusters",
        ));
        return errs;
    }

    let any_enabled = nginx_ingress_enabled(addons) || dashboard_enabled(addons);
    let at_least_122 = version::check_version_meets_constraint(kubernetes_version, ">= 1.22")
        .unwrap_or(false);
    if any_enabled && at_least_122 && purpose.is_some_and(|p| p != PURPOSE_EVALUATION) {
        errs.push(FieldError::forbidden(
            path.clone(),
            "for Kubernetes versions >= 1.22 addons can only be enabled on shoots with .spec.purpose=evaluation",
        ));
    }

    let Some(addons) = addons else {
        return errs;
    };

    if let Some(nginx) = addons.nginx_ingress.as_ref().filter(|n| n.enabled) {
        if let Some(policy) = &nginx.external_traffic_policy {
            if !AVAILABLE_NGINX_INGRESS_EXTERNAL_TRAFFIC_POLICIES.contains(&policy.as_str()) {
                errs.push(FieldError::not_supported(
                    path.child("nginxIngress").child("externalTrafficPolicy"),
                    policy,
                    AVAILABLE_NGINX_INGRESS_EXTERNAL_TRAFFIC_POLICIES,
                ));
            }
        }
    }

    if let Some(dashboard) = addons.kubernetes_dashboard.as_ref().filter(|d| d.enabled) {
        if let Some(mode) = &dashboard.authentication_mode {
            if !AVAILABLE_DASHBOARD_AUTHENTICATION_MODES.contains(&mode.as_str()) {
                errs.push(FieldError::not_supported(
                    path.child("kubernetesDashboard").child("authenticationMode"),
                    mode,
                    AVAILABLE_DASHBOARD_AUTHENTICATION_MODES,
                ));
            }
        }
    }

    errs
}

pub fn validate_system_components(
    system_components: Option<&SystemComponents>,
    workerless: bool,
    path: &Path,
) -> ErrorList {
    let Some(system_components) = system_components else {
        return ErrorList::new();
    };
    if workerless {
        return vec![FieldError::forbidden(path.clone(), WORKERLESS_ERROR_MSG)];
    }
    match &system_components.core_dns {
        Some(core_dns) => validate_core_dns(core_dns, &path.child("coreDNS")),
        None => ErrorList::new(),
    }
}

fn validate_core_dns(core_dns: &CoreDns, path: &Path) -> ErrorList {
    let mut errs = ErrorList::new();

    if let Some(autoscaling) = &core_dns.autoscaling {
        if !AVAILABLE_CORE_DNS_AUTOSCALING_MODES.contains(&autoscaling.mode.as_str()) {
            errs.push(FieldError::not_supported(
                path.child("autoscaling").child("mode"),
                &autoscaling.mode,
                AVAILABLE_CORE_DNS_AUTOSCALING_MODES,
            ));
        }
    }
    if let Some(rewriting) = &core_dns.rewriting {
        errs.extend(validate_core_dns_rewriting_common_suffixes(
            &rewriting.common_suffixes,
            &path.child("rewriting"),
        ));
    }

    errs
}

/// Suffixes need a dot that is not the leading one; `.example.com` and
/// `example.com` count as the same suffix.
pub fn validate_core_dns_rewriting_common_suffixes(suffixes: &[String], path: &Path) -> ErrorList {
    let mut errs = ErrorList::new();
    let mut seen = BTreeSet::new();

    for (i, suffix) in suffixes.iter().enumerate() {
        let idx_path = path.child("commonSuffixes").index(i);
        let dots = suffix.matches('.').count();
        if dots < 1 || (suffix.starts_with('.') && dots < 2) {
            errs.push(FieldError::invalid(
                idx_path.clone(),
                suffix,
                "must contain at least one non-leading dot ('.')",
            ));
        }
        let trimmed = suffix.strip_prefix('.').unwrap_or(suffix);
        if !seen.insert(trimmed) {
            errs.push(FieldError::duplicate(idx_path, trimmed));
        }
    }

    errs
}
