//! Kubernetes component feature gates and the versions supporting them.

use std::collections::BTreeMap;

use super::field::{ErrorList, FieldError, Path};
use super::version;

/// Lifetime of a component feature gate across Kubernetes releases.
#[derive(Clone, Copy, Debug)]
struct FeatureGateRange {
    name: &'static str,
    added_in: Option<&'static str>,
    removed_in: Option<&'static str>,
    /// Value the gate is locked to and the release the lock starts in.
    locked: Option<(bool, &'static str)>,
}

const fn gate(name: &'static str) -> FeatureGateRange {
    FeatureGateRange {
        name,
        added_in: None,
        removed_in: None,
        locked: None,
    }
}

const fn added(mut range: FeatureGateRange, v: &'static str) -> FeatureGateRange {
    range.added_in = Some(v);
    range
}

const fn removed(mut range: FeatureGateRange, v: &'static str) -> FeatureGateRange {
    range.removed_in = Some(v);
    range
}

const fn locked(mut range: FeatureGateRange, value: bool, v: &'static str) -> FeatureGateRange {
    range.locked = Some((value, v));
    range
}

static FEATURE_GATES: &[FeatureGateRange] = &[
    gate("AnyVolumeDataSource"),
    locked(removed(gate("APIListChunking"), "1.32"), true, "1.29"),
    locked(removed(gate("APIPriorityAndFairness"), "1.31"), true, "1.29"),
    locked(removed(gate("CPUManager"), "1.33"), true, "1.26"),
    added(gate("CPUManagerPolicyOptions"), "1.22"),
    locked(removed(gate("CSIMigration"), "1.27"), true, "1.25"),
    locked(removed(added(gate("CronJobTimeZone"), "1.24"), "1.29"), true, "1.27"),
    gate("CustomCPUCFSQuotaPeriod"),
    removed(gate("DynamicKubeletConfig"), "1.26"),
    locked(removed(gate("EphemeralContainers"), "1.27"), true, "1.25"),
    added(gate("ExpandedDNSConfig"), "1.22"),
    gate("GracefulNodeShutdown"),
    gate("HPAContainerMetrics"),
    added(gate("InPlacePodVerticalScaling"), "1.27"),
    locked(removed(added(gate("JobTrackingWithFinalizers"), "1.22"), "1.28"), true, "1.26"),
    locked(removed(gate("KubeletCredentialProviders"), "1.28"), true, "1.26"),
    locked(
        removed(added(gate("LegacyServiceAccountTokenNoAutoGeneration"), "1.24"), "1.29"),
        true,
        "1.27",
    ),
    added(gate("MemoryQoS"), "1.22"),
    added(gate("MinDomainsInPodTopologySpread"), "1.24"),
    added(gate("NodeSwap"), "1.22"),
    added(gate("PodDisruptionConditions"), "1.25"),
    locked(removed(added(gate("PodSecurity"), "1.22"), "1.28"), true, "1.25"),
    locked(removed(gate("ProbeTerminationGracePeriod"), "1.28"), true, "1.25"),
    locked(removed(added(gate("SeccompDefault"), "1.22"), "1.29"), true, "1.27"),
    locked(removed(gate("ServerSideApply"), "1.32"), true, "1.26"),
    added(gate("StatefulSetAutoDeletePVC"), "1.23"),
    gate("TopologyAwareHints"),
    removed(added(gate("UserNamespacesStatelessPodsSupport"), "1.25"), "1.28"),
    added(gate("ValidatingAdmissionPolicy"), "1.26"),
    locked(removed(added(gate("WindowsHostProcessContainers"), "1.22"), "1.28"), true, "1.26"),
];

fn lookup(name: &str) -> Option<&'static FeatureGateRange> {
    FEATURE_GATES.iter().find(|g| g.name == name)
}

fn in_range(version: &str, range: &FeatureGateRange) -> Result<bool, version::VersionError> {
    if let Some(added) = range.added_in {
        if !version::compare_versions(version, ">=", added)? {
            return Ok(false);
        }
    }
    if let Some(removed) = range.removed_in {
        if !version::compare_versions(version, "<", removed)? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Whether `name` is a known gate that exists in `version`.
pub fn is_feature_gate_supported(name: &str, version: &str) -> Result<bool, String> {
    let range = lookup(name).ok_or_else(|| format!("unknown feature gate {}", name))?;
    in_range(version, range).map_err(|e| e.to_string())
}

/// Value the gate is pinned to in `version`, if any.
fn locked_value(range: &FeatureGateRange, version: &str) -> Option<bool> {
    let (value, since) = range.locked?;
    version::is_at_least(version, since).then_some(value)
}

pub fn validate_feature_gates(
    feature_gates: &BTreeMap<String, bool>,
    version: &str,
    path: &Path,
) -> ErrorList {
    let mut errs = ErrorList::new();
    for (name, enabled) in feature_gates {
        let gate_path = path.child(name);
        match is_feature_gate_supported(name, version) {
            Err(msg) => errs.push(FieldError::invalid(gate_path, name, msg)),
            Ok(false) => errs.push(FieldError::forbidden(
                gate_path,
                format!("not supported in Kubernetes version {}", version),
            )),
            Ok(true) => {
                let locked_to = lookup(name).and_then(|range| locked_value(range, version));
                if let Some(locked_to) = locked_to {
                    if locked_to != *enabled {
                        errs.push(FieldError::forbidden(
                            gate_path,
                            format!(
                                "cannot set feature gate to {}, feature is locked to {}",
                                enabled, locked_to
                            ),
                        ));
                    }
                }
            }
        }
    }
    errs
}
