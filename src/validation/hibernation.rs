//! Hibernation schedules.

use std::collections::{BTreeMap, BTreeSet};

use croner::Cron;
use jiff::tz::TimeZone;

use super::field::{ErrorList, FieldError, Path};
use super::operations::{MAINTENANCE_OPERATION_ANNOTATION, is_forbidden_when_hibernated};
use crate::crd::{Hibernation, HibernationSchedule};

pub fn validate_hibernation(
    annotations: Option<&BTreeMap<String, String>>,
    hibernation: Option<&Hibernation>,
    path: &Path,
) -> ErrorList {
    let mut errs = ErrorList::new();
    let Some(hibernation) = hibernation else {
        return errs;
    };

    let maintenance_op = annotations
        .and_then(|a| a.get(MAINTENANCE_OPERATION_ANNOTATION))
        .map(String::as_str)
        .unwrap_or_default();
    if is_forbidden_when_hibernated(maintenance_op) && hibernation.enabled.unwrap_or(false) {
        errs.push(FieldError::forbidden(
            path.child("enabled"),
            format!(
                "shoot cannot be hibernated when {}={} annotation is set",
                MAINTENANCE_OPERATION_ANNOTATION, maintenance_op
            ),
        ));
    }

    errs.extend(validate_hibernation_schedules(&hibernation.schedules, &path.child("schedules")));
    errs
}

/// Cron specs must be unique across all schedules, start and end alike.
pub fn validate_hibernation_schedules(schedules: &[HibernationSchedule], path: &Path) -> ErrorList {
    let mut seen = BTreeSet::new();
    schedules
        .iter()
        .enumerate()
        .flat_map(|(i, schedule)| validate_hibernation_schedule(&mut seen, schedule, &path.index(i)))
        .collect()
}

pub fn validate_hibernation_schedule(
    seen: &mut BTreeSet<String>,
    schedule: &HibernationSchedule,
    path: &Path,
) -> ErrorList {
    let mut errs = ErrorList::new();

    if schedule.start.is_none() && schedule.end.is_none() {
        errs.push(FieldError::required(
            path.child("start/end"),
            "either start or end has to be provided",
        ));
    }
    if let Some(start) = &schedule.start {
        errs.extend(validate_hibernation_cron_spec(seen, start, &path.child("start")));
    }
    if let Some(end) = &schedule.end {
        errs.extend(validate_hibernation_cron_spec(seen, end, &path.child("end")));
    }
    if let Some(location) = &schedule.location {
        errs.extend(validate_hibernation_schedule_location(location, &path.child("location")));
    }

    errs
}

const CRON_NAMES: &[&str] = &[
    "JAN", "FEB", "MAR", "APR", "MAY", "JUN", "JUL", "AUG", "SEP", "OCT", "NOV", "DEC", "SUN", "MON",
    "TUE", "WED", "THU", "FRI", "SAT",
];

/// First token outside the standard five-field grammar, such as `L`, `5L`,
/// `15W` or `1#2`. Descriptors like `@daily` are left to the parser.
fn unsupported_cron_token(spec: &str) -> Option<&str> {
    if spec.trim_start().starts_with('@') {
        return None;
    }
    spec.split_whitespace()
        .flat_map(|field| field.split([',', '-', '/']))
        .find(|atom| {
            let standard = atom.is_empty()
                || matches!(*atom, "*" | "?")
                || atom.bytes().all(|b| b.is_ascii_digit())
                || CRON_NAMES.iter().any(|name| name.eq_ignore_ascii_case(atom));
            !standard
        })
}

pub fn validate_hibernation_cron_spec(seen: &mut BTreeSet<String>, spec: &str, path: &Path) -> ErrorList {
    let mut errs = ErrorList::new();
    let parsed = Cron::new(spec).parse().map_err(|e| e.to_string()).and_then(|cron| {
        match unsupported_cron_token(spec) {
            Some(token) => Err(format!("unsupported token {:?}", token)),
            None => Ok(cron),
        }
    });
    match parsed {
        Err(e) => errs.push(FieldError::invalid(
            path.clone(),
            spec,
            format!("not a valid cron spec: {}", e),
        )),
        Ok(_) if seen.contains(spec) => errs.push(FieldError::duplicate(path.clone(), spec)),
        Ok(_) => {
            seen.insert(spec.to_string());
        }
    }
    errs
}

/// Empty, `UTC` and `Local` resolve without consulting the time zone database.
pub fn validate_hibernation_schedule_location(location: &str, path: &Path) -> ErrorList {
    if matches!(location, "" | "UTC" | "Local") {
        return ErrorList::new();
    }
    match TimeZone::get(location) {
        Ok(_) => ErrorList::new(),
        Err(e) => vec![FieldError::invalid(
            path.clone(),
            location,
            format!("not a valid location: {}", e),
        )],
    }
}
