//! External DNS configuration of a shoot.

use std::collections::BTreeSet;

use super::field::{ErrorList, FieldError, Path, validate_immutable_field};
use super::primitives::{is_dns1123_subdomain, validate_dns1123_subdomain};
use crate::crd::Dns;

/// Provider type meaning "records are managed outside of Gardener".
pub const DNS_UNMANAGED: &str = "unmanaged";

/// Name under which the DNS record controller tracks a provider.
pub fn dns_provider_name(secret_name: &str, provider_type: &str) -> String {
    format!("{}-{}", provider_type, secret_name)
}

pub fn validate_dns(dns: Option<&Dns>, path: &Path) -> ErrorList {
    let mut errs = ErrorList::new();
    let Some(dns) = dns else {
        return errs;
    };

    if let Some(domain) = &dns.domain {
        errs.extend(validate_dns1123_subdomain(domain, &path.child("domain")));
    }

    let primary_type = dns.primary_provider().and_then(|p| p.r#type.as_deref());
    if primary_type.is_some_and(|t| t != DNS_UNMANAGED) && dns.domain.is_none() {
        errs.push(FieldError::required(
            path.child("domain"),
            format!(
                "domain must be set when primary provider type is not set to {:?}",
                DNS_UNMANAGED
            ),
        ));
    }

    let mut names = BTreeSet::new();
    let mut primary_found = false;
    for (i, provider) in dns.providers.iter().enumerate() {
        let idx_path = path.child("providers").index(i);

        if let (Some(secret_name), Some(provider_type)) = (&provider.secret_name, &provider.r#type) {
            let name = dns_provider_name(secret_name, provider_type);
            if names.contains(&name) {
                errs.push(FieldError::invalid(
                    idx_path,
                    &name,
                    "combination of .secretName and .type must be unique across dns providers",
                ));
                continue;
            }
            for msg in is_dns1123_subdomain(&name) {
                errs.push(FieldError::invalid(
                    idx_path.clone(),
                    &name,
                    format!("combination of .secretName and .type is invalid: {:?}", msg),
                ));
            }
            names.insert(name);
        }

        if provider.primary.unwrap_or(false) {
            if primary_found {
                errs.push(FieldError::forbidden(
                    idx_path.child("primary"),
                    "multiple primary DNS providers are not supported",
                ));
                continue;
            }
            primary_found = true;
        }

        if provider.r#type.as_deref() == Some(DNS_UNMANAGED) && provider.secret_name.is_some() {
            errs.push(FieldError::invalid(
                idx_path.child("secretName"),
                &provider.secret_name,
                format!("secretName must not be set when type is {:?}", DNS_UNMANAGED),
            ));
            continue;
        }

        if provider.secret_name.is_some() && provider.r#type.is_none() {
            errs.push(FieldError::required(
                idx_path.child("type"),
                "type must be set when secretName is set",
            ));
        }
    }

    errs
}

/// The primary provider may still change while the shoot is being assigned to a seed.
pub fn validate_dns_update(
    new: Option<&Dns>,
    old: Option<&Dns>,
    seed_got_assigned: bool,
    path: &Path,
) -> ErrorList {
    let mut errs = ErrorList::new();

    let (new, old) = match (new, old) {
        (None, Some(old)) => {
            errs.extend(validate_immutable_field(&None, &Some(old), path));
            return errs;
        }
        (Some(new), Some(old)) => (new, old),
        _ => return errs,
    };

    if old.domain.is_some() && new.domain != old.domain {
        errs.extend(validate_immutable_field(&new.domain, &old.domain, &path.child("domain")));
    }

    if seed_got_assigned {
        return errs;
    }

    let primary_old = old.primary_provider();
    let primary_new = new.primary_provider();
    let providers_path = path.child("providers");
    match (primary_old, primary_new) {
        (Some(_), None) => errs.push(FieldError::forbidden(
            providers_path,
            "removing a primary provider is not allowed",
        )),
        (Some(old_primary), Some(new_primary)) => match (&old_primary.r#type, &new_primary.r#type) {
            (Some(_), None) => errs.push(FieldError::forbidden(
                providers_path,
                "removing the primary provider type is not allowed",
            )),
            (Some(old_type), Some(new_type)) if old_type != new_type => {
                errs.push(FieldError::forbidden(
                    providers_path,
                    "changing primary provider type is not allowed",
                ))
            }
            _ => {}
        },
        _ => {}
    }

    errs
}
