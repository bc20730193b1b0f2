//! Shoot networking: IP families and the node, pod and service ranges.

use std::collections::BTreeSet;

use super::cidr::{Cidr, IPV4_FAMILY, IPV6_FAMILY, primary_ip_family};
use super::field::{ErrorList, FieldError, Path, validate_immutable_field};
use super::WORKERLESS_ERROR_MSG;
use crate::crd::Networking;
use crate::features::{Feature, FeatureGates};

const AVAILABLE_IP_FAMILIES: &[&str] = &[IPV4_FAMILY, IPV6_FAMILY];

/// Every entry must be a known family and appear once; only single-stack is accepted.
pub fn validate_ip_families(ip_families: &[String], path: &Path) -> ErrorList {
    let mut errs = ErrorList::new();
    let mut seen = BTreeSet::new();
    for (i, family) in ip_families.iter().enumerate() {
        if !seen.insert(family.as_str()) {
            errs.push(FieldError::duplicate(path.index(i), family));
        }
        if !AVAILABLE_IP_FAMILIES.contains(&family.as_str()) {
            errs.push(FieldError::not_supported(path.index(i), family, AVAILABLE_IP_FAMILIES));
        }
    }
    if errs.is_empty() && seen.len() > 1 {
        errs.push(FieldError::invalid(
            path.clone(),
            ip_families,
            "dual-stack networking is not supported",
        ));
    }
    errs
}

pub fn validate_networking(networking: Option<&Networking>, workerless: bool, path: &Path) -> ErrorList {
    let mut errs = ErrorList::new();

    let Some(networking) = networking else {
        if !workerless {
            errs.push(FieldError::required(
                path.clone(),
                "networking should not be nil for a Shoot with workers",
            ));
        }
        return errs;
    };

    if workerless {
        let set_fields = [
            ("type", networking.r#type.is_some()),
            ("providerConfig", networking.provider_config.is_some()),
            ("pods", networking.pods.is_some()),
            ("nodes", networking.nodes.is_some()),
        ];
        for (name, _) in set_fields.iter().filter(|(_, set)| *set) {
            errs.push(FieldError::forbidden(path.child(name), WORKERLESS_ERROR_MSG));
        }
    } else if networking.r#type.as_deref().unwrap_or_default().is_empty() {
        errs.push(FieldError::required(path.child("type"), "networking type must be provided"));
    }

    let family_errs = validate_ip_families(&networking.ip_families, &path.child("ipFamilies"));
    if !family_errs.is_empty() {
        errs.extend(family_errs);
        return errs;
    }

    let primary = primary_ip_family(&networking.ip_families);
    let ranges = [
        ("nodes", networking.nodes.as_deref()),
        ("pods", networking.pods.as_deref()),
        ("services", networking.services.as_deref()),
    ];
    for (name, value) in ranges {
        let Some(value) = value else { continue };
        let cidr = Cidr::new(value, path.child(name));
        errs.extend(cidr.validate_parse());
        errs.extend(cidr.validate_ip_family(primary));
        errs.extend(cidr.validate_canonical());
    }

    errs
}

/// Set ranges are immutable; `nodes` may change only with `MutableShootSpecNetworkingNodes`.
pub fn validate_networking_update(
    new: Option<&Networking>,
    old: Option<&Networking>,
    gates: &FeatureGates,
    path: &Path,
) -> ErrorList {
    let mut errs = ErrorList::new();

    let Some(old) = old else {
        return errs;
    };
    let Some(new) = new else {
        errs.push(FieldError::forbidden(
            path.clone(),
            "networking cannot be set to nil if it's already set",
        ));
        return errs;
    };

    errs.extend(validate_immutable_field(&new.r#type, &old.r#type, &path.child("type")));
    errs.extend(validate_immutable_field(
        &new.ip_families,
        &old.ip_families,
        &path.child("ipFamilies"),
    ));
    if old.pods.is_some() {
        errs.extend(validate_immutable_field(&new.pods, &old.pods, &path.child("pods")));
    }
    if old.services.is_some() {
        errs.extend(validate_immutable_field(
            &new.services,
            &old.services,
            &path.child("services"),
        ));
    }
    if !gates.enabled(Feature::MutableShootSpecNetworkingNodes) && old.nodes.is_some() {
        errs.extend(validate_immutable_field(&new.nodes, &old.nodes, &path.child("nodes")));
    }

    errs
}
