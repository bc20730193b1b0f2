//! Entry points composing every Shoot rule into create, update and template
//! validation.

use std::collections::BTreeSet;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use tracing::debug;

use super::field::{self, ErrorList, FieldError, Path, validate_immutable_field};
use super::operations::{OPERATION_ANNOTATION, OPERATION_ROTATE_KUBECONFIG_CREDENTIALS, validate_shoot_operation};
use super::primitives::{validate_annotations, validate_dns1123_label, validate_label_name, validate_labels};
use super::{
    WORKERLESS_ERROR_MSG, addons, dns, ha, hibernation, kubernetes, maintenance, networking, workers,
};
use crate::crd::{
    CrossVersionObjectReference, Extension, NamedResourceReference, Shoot, ShootSpec, ShootTemplate,
    Toleration,
};
use crate::features;

pub const GARDEN_NAMESPACE: &str = "garden";

pub const PURPOSE_INFRASTRUCTURE: &str = "infrastructure";
const AVAILABLE_PURPOSES: &[&str] = &["development", "evaluation", "production", "testing"];
const AVAILABLE_PURPOSES_WITH_INFRASTRUCTURE: &[&str] =
    &["development", "evaluation", PURPOSE_INFRASTRUCTURE, "production", "testing"];

const SELECTOR_OPERATOR_IN: &str = "In";
const SELECTOR_OPERATOR_NOT_IN: &str = "NotIn";
const SELECTOR_OPERATOR_EXISTS: &str = "Exists";
const SELECTOR_OPERATOR_DOES_NOT_EXIST: &str = "DoesNotExist";

fn name_of(meta: &ObjectMeta) -> &str {
    meta.name.as_deref().unwrap_or_default()
}

/// Validates a Shoot on creation. Also applied to the new object on update.
pub fn validate_shoot(shoot: &Shoot) -> ErrorList {
    let mut errs = ErrorList::new();
    let meta_path = Path::new("metadata");

    errs.extend(validate_object_meta(&shoot.metadata, &meta_path));
    errs.extend(validate_name_consecutive_hyphens(
        name_of(&shoot.metadata),
        &meta_path.child("name"),
    ));
    errs.extend(validate_shoot_operation(shoot, &meta_path.child("annotations")));
    errs.extend(validate_shoot_spec(&shoot.metadata, &shoot.spec, &Path::new("spec"), false));
    errs.extend(ha::validate_shoot_ha_config(shoot));

    debug!(
        shoot = %name_of(&shoot.metadata),
        errors = errs.len(),
        "Validated shoot"
    );
    errs
}

pub fn validate_shoot_update(new: &Shoot, old: &Shoot) -> ErrorList {
    let mut errs = ErrorList::new();
    let meta_path = Path::new("metadata");

    errs.extend(validate_object_meta_update(&new.metadata, &old.metadata, &meta_path));
    errs.extend(validate_kubeconfig_rotation(&new.metadata, &old.metadata, &meta_path));
    errs.extend(validate_shoot_spec_update(
        &new.spec,
        &old.spec,
        &new.metadata,
        &Path::new("spec"),
    ));
    errs.extend(kubernetes::validate_kubernetes_version_update_125(new, old));
    errs.extend(validate_shoot(new));
    errs.extend(ha::validate_shoot_ha_config_update(new, old));

    debug!(
        shoot = %name_of(&new.metadata),
        errors = errs.len(),
        "Validated shoot update"
    );
    errs
}

pub fn validate_shoot_template(template: &ShootTemplate, path: &Path) -> ErrorList {
    let mut errs = ErrorList::new();
    let meta_path = path.child("metadata");

    if let Some(labels) = &template.metadata.labels {
        errs.extend(validate_labels(labels, &meta_path.child("labels")));
    }
    if let Some(annotations) = &template.metadata.annotations {
        errs.extend(validate_annotations(annotations, &meta_path.child("annotations")));
    }
    errs.extend(validate_shoot_spec(
        &template.metadata,
        &template.spec,
        &path.child("spec"),
        true,
    ));

    errs
}

pub fn validate_shoot_template_update(new: &ShootTemplate, old: &ShootTemplate, path: &Path) -> ErrorList {
    let mut errs = validate_shoot_spec_update(&new.spec, &old.spec, &new.metadata, &path.child("spec"));

    let old_nodes = old.spec.networking.as_ref().and_then(|n| n.nodes.as_ref());
    if old_nodes.is_some() {
        let new_nodes = new.spec.networking.as_ref().and_then(|n| n.nodes.as_ref());
        errs.extend(validate_immutable_field(
            &new_nodes,
            &old_nodes,
            &path.child("spec").child("networking").child("nodes"),
        ));
    }

    errs
}

fn validate_object_meta(meta: &ObjectMeta, path: &Path) -> ErrorList {
    let mut errs = ErrorList::new();

    let name = name_of(meta);
    let generate_name = meta.generate_name.as_deref().unwrap_or_default();
    if !generate_name.is_empty() {
        // validated as a prefix, a trailing hyphen is allowed
        errs.extend(validate_dns1123_label(
            generate_name.trim_end_matches('-'),
            &path.child("generateName"),
        ));
    }
    if name.is_empty() && generate_name.is_empty() {
        errs.push(FieldError::required(
            path.child("name"),
            "name or generateName is required",
        ));
    } else if !name.is_empty() {
        errs.extend(validate_dns1123_label(name, &path.child("name")));
    }

    match meta.namespace.as_deref().unwrap_or_default() {
        "" => errs.push(FieldError::required(path.child("namespace"), "")),
        namespace => errs.extend(validate_dns1123_label(namespace, &path.child("namespace"))),
    }

    if let Some(labels) = &meta.labels {
        errs.extend(validate_labels(labels, &path.child("labels")));
    }
    if let Some(annotations) = &meta.annotations {
        errs.extend(validate_annotations(annotations, &path.child("annotations")));
    }

    errs
}

fn validate_object_meta_update(new: &ObjectMeta, old: &ObjectMeta, path: &Path) -> ErrorList {
    let mut errs = ErrorList::new();
    errs.extend(validate_immutable_field(&new.name, &old.name, &path.child("name")));
    errs.extend(validate_immutable_field(
        &new.namespace,
        &old.namespace,
        &path.child("namespace"),
    ));
    errs.extend(validate_immutable_field(&new.uid, &old.uid, &path.child("uid")));
    errs
}

fn validate_name_consecutive_hyphens(name: &str, path: &Path) -> ErrorList {
    if !name.contains("--") {
        return ErrorList::new();
    }
    vec![FieldError::invalid(
        path.clone(),
        name,
        "name may not contain two consecutive hyphens",
    )]
}

/// A shoot in deletion may keep but not newly request a kubeconfig rotation.
fn validate_kubeconfig_rotation(new: &ObjectMeta, old: &ObjectMeta, path: &Path) -> ErrorList {
    let mut errs = ErrorList::new();
    if new.deletion_timestamp.is_none() {
        return errs;
    }

    let operation = |meta: &ObjectMeta| {
        meta.annotations
            .as_ref()
            .and_then(|a| a.get(OPERATION_ANNOTATION))
            .cloned()
    };
    if operation(old).as_deref() == Some(OPERATION_ROTATE_KUBECONFIG_CREDENTIALS) {
        return errs;
    }
    if operation(new).as_deref() == Some(OPERATION_ROTATE_KUBECONFIG_CREDENTIALS) {
        errs.push(FieldError::invalid(
            path.child("annotations").key(OPERATION_ANNOTATION),
            OPERATION_ROTATE_KUBECONFIG_CREDENTIALS,
            "kubeconfig rotations is not allowed for clusters in deletion",
        ));
    }
    errs
}

pub fn validate_shoot_spec(meta: &ObjectMeta, spec: &ShootSpec, path: &Path, in_template: bool) -> ErrorList {
    let mut errs = ErrorList::new();
    let workerless = spec.is_workerless();

    errs.extend(workers::validate_provider(
        &spec.provider,
        &spec.kubernetes,
        spec.networking.as_ref(),
        workerless,
        &path.child("provider"),
        in_template,
    ));
    errs.extend(addons::validate_addons(
        spec.addons.as_ref(),
        &spec.kubernetes.version,
        spec.purpose.as_deref(),
        workerless,
        &path.child("addons"),
    ));
    errs.extend(dns::validate_dns(spec.dns.as_ref(), &path.child("dns")));
    errs.extend(validate_extensions(&spec.extensions, &path.child("extensions")));
    errs.extend(validate_resources(&spec.resources, &path.child("resources")));
    errs.extend(kubernetes::validate_kubernetes(
        &spec.kubernetes,
        spec.networking.as_ref(),
        workers::is_docker_configured(&spec.provider.workers),
        workerless,
        &path.child("kubernetes"),
    ));
    errs.extend(networking::validate_networking(
        spec.networking.as_ref(),
        workerless,
        &path.child("networking"),
    ));
    errs.extend(maintenance::validate_maintenance(
        spec.maintenance.as_ref(),
        &path.child("maintenance"),
        workerless,
    ));
    errs.extend(maintenance::validate_monitoring(
        spec.monitoring.as_ref(),
        &path.child("monitoring"),
    ));
    errs.extend(hibernation::validate_hibernation(
        meta.annotations.as_ref(),
        spec.hibernation.as_ref(),
        &path.child("hibernation"),
    ));

    if spec.region.is_empty() {
        errs.push(FieldError::required(path.child("region"), "must specify a region"));
    }
    if spec.cloud_profile_name.is_empty() {
        errs.push(FieldError::required(
            path.child("cloudProfileName"),
            "must specify a cloud profile",
        ));
    }
    if spec.secret_binding_name.is_some() && workerless {
        errs.push(FieldError::forbidden(
            path.child("secretBindingName"),
            WORKERLESS_ERROR_MSG,
        ));
    } else if spec.secret_binding_name.as_deref().unwrap_or_default().is_empty() && !workerless {
        errs.push(FieldError::required(path.child("secretBindingName"), "must specify a name"));
    }
    if spec.seed_name.as_deref() == Some("") {
        errs.push(FieldError::invalid(
            path.child("seedName"),
            &spec.seed_name,
            "seed name must not be empty when providing the key",
        ));
    }
    if let Some(selector) = &spec.seed_selector {
        errs.extend(validate_label_selector(&selector.label_selector, &path.child("seedSelector")));
    }
    if let Some(purpose) = spec.purpose.as_deref() {
        let allowed = if in_template || meta.namespace.as_deref() == Some(GARDEN_NAMESPACE) {
            AVAILABLE_PURPOSES_WITH_INFRASTRUCTURE
        } else {
            AVAILABLE_PURPOSES
        };
        if !allowed.contains(&purpose) {
            errs.push(FieldError::not_supported(path.child("purpose"), purpose, allowed));
        }
    }
    errs.extend(validate_tolerations(&spec.tolerations, &path.child("tolerations")));
    errs.extend(addons::validate_system_components(
        spec.system_components.as_ref(),
        workerless,
        &path.child("systemComponents"),
    ));

    errs
}

/// Rules for changing an existing spec. The new spec must also pass
/// [`validate_shoot_spec`].
pub fn validate_shoot_spec_update(
    new: &ShootSpec,
    old: &ShootSpec,
    new_meta: &ObjectMeta,
    path: &Path,
) -> ErrorList {
    let mut errs = ErrorList::new();

    if new_meta.deletion_timestamp.is_some() && new != old {
        let changes = field::diff(new, old);
        if changes.is_empty() {
            return validate_immutable_field(new, old, path);
        }
        return vec![FieldError::forbidden(path.clone(), changes.join(","))];
    }

    errs.extend(validate_immutable_field(&new.region, &old.region, &path.child("region")));
    errs.extend(validate_immutable_field(
        &new.cloud_profile_name,
        &old.cloud_profile_name,
        &path.child("cloudProfileName"),
    ));
    errs.extend(validate_immutable_field(
        &new.secret_binding_name,
        &old.secret_binding_name,
        &path.child("secretBindingName"),
    ));
    errs.extend(validate_immutable_field(
        &new.exposure_class_name,
        &old.exposure_class_name,
        &path.child("exposureClassName"),
    ));

    errs.extend(dns::validate_dns_update(
        new.dns.as_ref(),
        old.dns.as_ref(),
        old.seed_name.is_none() && new.seed_name.is_some(),
        &path.child("dns"),
    ));

    let kubernetes_path = path.child("kubernetes");
    errs.extend(kubernetes::validate_kubernetes_version_update(
        &new.kubernetes.version,
        &old.kubernetes.version,
        &kubernetes_path.child("version"),
    ));
    errs.extend(kubernetes::validate_kube_controller_manager_update(
        new.kubernetes.kube_controller_manager.as_ref(),
        old.kubernetes.kube_controller_manager.as_ref(),
        &kubernetes_path.child("kubeControllerManager"),
    ));

    let provider_path = path.child("provider");
    let workers_path = provider_path.child("workers");
    if let Some(err) = validate_worker_switch(!new.is_workerless(), !old.is_workerless(), &workers_path) {
        errs.push(err);
        return errs;
    }

    errs.extend(validate_immutable_field(
        &new.provider.r#type,
        &old.provider.r#type,
        &provider_path.child("type"),
    ));

    for (i, new_worker) in new.provider.workers.iter().enumerate() {
        let old_worker = old
            .provider
            .workers
            .iter()
            .find(|w| w.name == new_worker.name)
            .unwrap_or(new_worker);

        let old_version = old_worker
            .kubernetes_version()
            .unwrap_or(&old.kubernetes.version);
        let new_version = new_worker
            .kubernetes_version()
            .unwrap_or(&new.kubernetes.version);

        errs.extend(kubernetes::validate_kubernetes_version_update(
            new_version,
            old_version,
            &workers_path.index(i).child("kubernetes").child("version"),
        ));
    }

    errs.extend(networking::validate_networking_update(
        new.networking.as_ref(),
        old.networking.as_ref(),
        features::default_feature_gate(),
        &path.child("networking"),
    ));

    errs
}

fn validate_worker_switch(new_has_workers: bool, old_has_workers: bool, path: &Path) -> Option<FieldError> {
    match (old_has_workers, new_has_workers) {
        (true, false) => Some(FieldError::forbidden(
            path.clone(),
            "cannot switch from a Shoot with workers to a workerless Shoot",
        )),
        (false, true) => Some(FieldError::forbidden(
            path.clone(),
            "cannot switch from a workerless Shoot to a Shoot with workers",
        )),
        _ => None,
    }
}

fn validate_extensions(extensions: &[Extension], path: &Path) -> ErrorList {
    extensions
        .iter()
        .enumerate()
        .filter(|(_, extension)| extension.r#type.is_empty())
        .map(|(i, _)| FieldError::required(path.index(i).child("type"), "field must not be empty"))
        .collect()
}

fn validate_resources(resources: &[NamedResourceReference], path: &Path) -> ErrorList {
    let mut errs = ErrorList::new();
    let mut names = BTreeSet::new();

    for (i, resource) in resources.iter().enumerate() {
        let idx_path = path.index(i);
        if resource.name.is_empty() {
            errs.push(FieldError::required(idx_path.child("name"), "field must not be empty"));
        } else if !names.insert(resource.name.as_str()) {
            errs.push(FieldError::duplicate(idx_path.child("name"), &resource.name));
        }
        errs.extend(validate_cross_version_object_reference(
            &resource.resource_ref,
            &idx_path.child("resourceRef"),
        ));
    }

    errs
}

fn validate_cross_version_object_reference(reference: &CrossVersionObjectReference, path: &Path) -> ErrorList {
    let mut errs = ErrorList::new();
    if reference.kind.is_empty() {
        errs.push(FieldError::required(path.child("kind"), "must specify a kind"));
    }
    if reference.name.is_empty() {
        errs.push(FieldError::required(path.child("name"), "must specify a name"));
    }
    if reference.api_version.is_empty() {
        errs.push(FieldError::required(path.child("apiVersion"), "must specify an apiVersion"));
    }
    errs
}

/// Tolerations are identified by `key`, or `key=value` when a value is given.
pub fn validate_tolerations(tolerations: &[Toleration], path: &Path) -> ErrorList {
    let mut errs = ErrorList::new();
    let mut seen = BTreeSet::new();

    for (i, toleration) in tolerations.iter().enumerate() {
        let idx_path = path.index(i);
        if toleration.key.is_empty() {
            errs.push(FieldError::required(idx_path.child("key"), "cannot be empty"));
        }

        let id = match &toleration.value {
            Some(value) => format!("{}={}", toleration.key, value),
            None => toleration.key.clone(),
        };
        if seen.contains(&id) {
            errs.push(FieldError::duplicate(idx_path, &id));
        } else {
            seen.insert(id);
        }
    }

    errs
}

/// Label values in expressions are not checked so that selectors can match
/// values that would be invalid as labels.
fn validate_label_selector(selector: &LabelSelector, path: &Path) -> ErrorList {
    let mut errs = ErrorList::new();

    if let Some(labels) = &selector.match_labels {
        errs.extend(validate_labels(labels, &path.child("matchLabels")));
    }

    let expressions_path = path.child("matchExpressions");
    for (i, requirement) in selector.match_expressions.iter().flatten().enumerate() {
        let idx_path = expressions_path.index(i);
        let has_values = requirement.values.as_ref().is_some_and(|v| !v.is_empty());
        match requirement.operator.as_str() {
            SELECTOR_OPERATOR_IN | SELECTOR_OPERATOR_NOT_IN if !has_values => {
                errs.push(FieldError::required(
                    idx_path.child("values"),
                    "must be specified when `operator` is 'In' or 'NotIn'",
                ));
            }
            SELECTOR_OPERATOR_EXISTS | SELECTOR_OPERATOR_DOES_NOT_EXIST if has_values => {
                errs.push(FieldError::forbidden(
                    idx_path.child("values"),
                    "may not be specified when `operator` is 'Exists' or 'DoesNotExist'",
                ));
            }
            SELECTOR_OPERATOR_IN
            | SELECTOR_OPERATOR_NOT_IN
            | SELECTOR_OPERATOR_EXISTS
            | SELECTOR_OPERATOR_DOES_NOT_EXIST => {}
            operator => errs.push(FieldError::invalid(
                idx_path.child("operator"),
                operator,
                "not a valid selector operator",
            )),
        }
        errs.extend(validate_label_name(&requirement.key, &idx_path.child("key")));
    }

    errs
}
