//! API server admission plugins and the versions supporting them.

use super::field::{ErrorList, FieldError, Path};
use super::version;
use crate::crd::AdmissionPlugin;

struct PluginRange {
    name: &'static str,
    added_in: Option<&'static str>,
    removed_in: Option<&'static str>,
    /// Plugins the control plane relies on; they cannot be disabled.
    required: bool,
}

const fn plugin(name: &'static str) -> PluginRange {
    PluginRange {
        name,
        added_in: None,
        removed_in: None,
        required: false,
    }
}

const fn since(mut range: PluginRange, v: &'static str) -> PluginRange {
    range.added_in = Some(v);
    range
}

const fn until(mut range: PluginRange, v: &'static str) -> PluginRange {
    range.removed_in = Some(v);
    range
}

const fn required(mut range: PluginRange) -> PluginRange {
    range.required = true;
    range
}

static ADMISSION_PLUGINS: &[PluginRange] = &[
    plugin("AlwaysAdmit"),
    plugin("AlwaysDeny"),
    plugin("AlwaysPullImages"),
    plugin("CertificateApproval"),
    plugin("CertificateSigning"),
    plugin("CertificateSubjectRestriction"),
    since(plugin("ClusterTrustBundleAttest"), "1.27"),
    plugin("DefaultIngressClass"),
    plugin("DefaultStorageClass"),
    plugin("DefaultTolerationSeconds"),
    since(plugin("DenyServiceExternalIPs"), "1.21"),
    plugin("EventRateLimit"),
    plugin("ExtendedResourceToleration"),
    plugin("ImagePolicyWebhook"),
    plugin("LimitPodHardAntiAffinityTopology"),
    plugin("LimitRanger"),
    required(plugin("MutatingAdmissionWebhook")),
    plugin("NamespaceAutoProvision"),
    plugin("NamespaceExists"),
    required(plugin("NamespaceLifecycle")),
    required(plugin("NodeRestriction")),
    plugin("OwnerReferencesPermissionEnforcement"),
    plugin("PersistentVolumeClaimResize"),
    plugin("PersistentVolumeLabel"),
    plugin("PodNodeSelector"),
    since(plugin("PodSecurity"), "1.22"),
    until(plugin("PodSecurityPolicy"), "1.25"),
    plugin("PodTolerationRestriction"),
    plugin("Priority"),
    plugin("ResourceQuota"),
    plugin("RuntimeClass"),
    plugin("SecurityContextDeny"),
    plugin("ServiceAccount"),
    plugin("StorageObjectInUseProtection"),
    plugin("TaintNodesByCondition"),
    since(plugin("ValidatingAdmissionPolicy"), "1.26"),
    required(plugin("ValidatingAdmissionWebhook")),
];

fn lookup(name: &str) -> Option<&'static PluginRange> {
    ADMISSION_PLUGINS.iter().find(|p| p.name == name)
}

pub fn is_admission_plugin_supported(name: &str, kubernetes_version: &str) -> Result<bool, String> {
    let range = lookup(name).ok_or_else(|| format!("unknown admission plugin {:?}", name))?;
    let check = |op: &str, bound: &str| {
        version::compare_versions(kubernetes_version, op, bound).map_err(|e| e.to_string())
    };
    if let Some(added) = range.added_in {
        if !check(">=", added)? {
            return Ok(false);
        }
    }
    if let Some(removed) = range.removed_in {
        if !check("<", removed)? {
            return Ok(false);
        }
    }
    Ok(true)
}

pub fn validate_admission_plugins(
    plugins: &[AdmissionPlugin],
    kubernetes_version: &str,
    kubeconfig_allowed: bool,
    path: &Path,
) -> ErrorList {
    let mut errs = ErrorList::new();
    for (i, plugin) in plugins.iter().enumerate() {
        let idx_path = path.index(i);
        if plugin.name.is_empty() {
            errs.push(FieldError::required(idx_path.child("name"), "must provide a name"));
            return errs;
        }

        let disabled = plugin.disabled.unwrap_or(false);
        match is_admission_plugin_supported(&plugin.name, kubernetes_version) {
            Err(msg) => errs.push(FieldError::invalid(idx_path.child("name"), &plugin.name, msg)),
            Ok(false) if !disabled => errs.push(FieldError::forbidden(
                idx_path.child("name"),
                format!(
                    "admission plugin {:?} is not supported in Kubernetes version {}",
                    plugin.name, kubernetes_version
                ),
            )),
            Ok(_) => {
                if disabled && lookup(&plugin.name).is_some_and(|p| p.required) {
                    errs.push(FieldError::forbidden(
                        idx_path.clone(),
                        format!("admission plugin {:?} cannot be disabled", plugin.name),
                    ));
                }
                if !kubeconfig_allowed && plugin.kubeconfig_secret_name.is_some() {
                    errs.push(FieldError::forbidden(
                        idx_path.child("kubeconfigSecretName"),
                        "admission plugin kubeconfig secret name is not allowed for this resource",
                    ));
                }
            }
        }
    }
    errs
}
