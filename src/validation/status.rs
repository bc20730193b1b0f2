//! Updates of the Shoot status subresource.

use std::collections::BTreeSet;

use url::Url;

use super::field::{ErrorList, FieldError, Path, validate_immutable_field};
use crate::crd::{ShootAdvertisedAddress, ShootStatus};

const ADVERTISED_URL_FORM: &str = "; desired format: https://host[:port]";

/// Identity fields stay fixed once set; advertised addresses must be unique
/// bare `https` endpoints.
pub fn validate_shoot_status_update(new: &ShootStatus, old: &ShootStatus) -> ErrorList {
    let mut errs = ErrorList::new();
    let path = Path::new("status");

    if let Some(old_uid) = old.uid.as_deref().filter(|uid| !uid.is_empty()) {
        errs.extend(validate_immutable_field(
            new.uid.as_deref().unwrap_or_default(),
            old_uid,
            &path.child("uid"),
        ));
    }
    if !old.technical_id.is_empty() {
        errs.extend(validate_immutable_field(
            &new.technical_id,
            &old.technical_id,
            &path.child("technicalID"),
        ));
    }
    if old.cluster_identity.is_some() && old.cluster_identity != new.cluster_identity {
        errs.extend(validate_immutable_field(
            &new.cluster_identity,
            &old.cluster_identity,
            &path.child("clusterIdentity"),
        ));
    }

    if !new.advertised_addresses.is_empty() {
        errs.extend(validate_advertised_addresses(
            &new.advertised_addresses,
            &path.child("advertisedAddresses"),
        ));
    }

    errs
}

pub fn validate_advertised_addresses(addresses: &[ShootAdvertisedAddress], path: &Path) -> ErrorList {
    let mut errs = ErrorList::new();
    let mut names = BTreeSet::new();

    for (i, address) in addresses.iter().enumerate() {
        let idx_path = path.index(i);
        if address.name.is_empty() {
            errs.push(FieldError::required(idx_path.child("name"), "field must not be empty"));
        } else if !names.insert(address.name.as_str()) {
            errs.push(FieldError::duplicate(idx_path.child("name"), &address.name));
        } else {
            errs.extend(validate_advertised_url(&address.url, &idx_path.child("url")));
        }
    }

    errs
}

fn validate_advertised_url(raw: &str, path: &Path) -> ErrorList {
    let mut errs = ErrorList::new();
    let u = match Url::parse(raw) {
        Ok(u) => u,
        Err(e) => {
            errs.push(FieldError::required(
                path.clone(),
                format!("url must be a valid URL: {}{}", e, ADVERTISED_URL_FORM),
            ));
            return errs;
        }
    };

    let invalid = |value: &str, detail: &str| {
        FieldError::invalid(path.clone(), value, format!("{}{}", detail, ADVERTISED_URL_FORM))
    };

    if u.scheme() != "https" {
        errs.push(invalid(u.scheme(), "'https' is the only allowed URL scheme"));
    }
    let host = u.host_str().unwrap_or_default();
    if host.is_empty() {
        errs.push(invalid(host, "host must be provided"));
    }
    // the parser normalizes an absent path to "/"
    if !matches!(u.path(), "" | "/") {
        errs.push(invalid(u.path(), "path is not permitted in the URL"));
    }
    if !u.username().is_empty() || u.password().is_some() {
        let user = match u.password() {
            Some(password) => format!("{}:{}", u.username(), password),
            None => u.username().to_string(),
        };
        errs.push(invalid(&user, "user information is not permitted in the URL"));
    }
    if let Some(fragment) = u.fragment().filter(|f| !f.is_empty()) {
        errs.push(invalid(fragment, "fragments are not permitted in the URL"));
    }
    if let Some(query) = u.query().filter(|q| !q.is_empty()) {
        errs.push(invalid(query, "query parameters are not permitted in the URL"));
    }

    errs
}
