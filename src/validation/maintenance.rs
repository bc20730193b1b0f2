//! Maintenance window and monitoring settings.

use std::collections::BTreeSet;

use jiff::fmt::strtime;
use thiserror::Error;

use super::field::{ErrorList, FieldError, Path};
use super::primitives::is_valid_email;
use super::WORKERLESS_ERROR_MSG;
use crate::crd::{Alerting, Duration, Maintenance, Monitoring};

pub const MAINTENANCE_TIME_WINDOW_DURATION_MINIMUM: Duration = Duration::from_mins(30);
pub const MAINTENANCE_TIME_WINDOW_DURATION_MAXIMUM: Duration = Duration::from_hours(6);

const TIME_LAYOUT: &str = "%H%M%S%z";
const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

#[derive(Debug, Error, PartialEq)]
pub enum TimeWindowError {
    #[error("could not parse begin time: {0}")]
    Begin(String),
    #[error("could not parse end time: {0}")]
    End(String),
}

/// A daily window between two UTC times of day. Windows may wrap around midnight.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimeWindow {
    begin: i64,
    end: i64,
}

/// Seconds since UTC midnight for a `HHMMSS+ZZZZ` timestamp.
fn parse_time_of_day(value: &str) -> Result<i64, String> {
    let tm = strtime::parse(TIME_LAYOUT, value).map_err(|e| e.to_string())?;
    let (Some(hour), Some(minute), Some(second)) = (tm.hour(), tm.minute(), tm.second()) else {
        return Err(format!("{:?} is missing a time of day", value));
    };
    let offset = tm.offset().map(|o| i64::from(o.seconds())).unwrap_or_default();
    let local = i64::from(hour) * 3600 + i64::from(minute) * 60 + i64::from(second);
    Ok((local - offset).rem_euclid(SECONDS_PER_DAY))
}

impl TimeWindow {
    pub fn parse(begin: &str, end: &str) -> Result<Self, TimeWindowError> {
        let begin = parse_time_of_day(begin).map_err(TimeWindowError::Begin)?;
        let end = parse_time_of_day(end).map_err(TimeWindowError::End)?;
        Ok(Self { begin, end })
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs((self.end - self.begin).rem_euclid(SECONDS_PER_DAY))
    }
}

pub fn validate_maintenance(maintenance: Option<&Maintenance>, path: &Path, workerless: bool) -> ErrorList {
    let mut errs = ErrorList::new();
    let Some(maintenance) = maintenance else {
        return errs;
    };

    let machine_image_auto_update = maintenance
        .auto_update
        .as_ref()
        .and_then(|a| a.machine_image_version);
    if workerless && machine_image_auto_update.is_some() {
        errs.push(FieldError::forbidden(
            path.child("autoUpdate").child("machineImageVersion"),
            WORKERLESS_ERROR_MSG,
        ));
    }

    let Some(time_window) = &maintenance.time_window else {
        return errs;
    };
    match TimeWindow::parse(&time_window.begin, &time_window.end) {
        Err(e) => errs.push(FieldError::invalid(
            path.child("timeWindow").child("begin/end"),
            time_window,
            e.to_string(),
        )),
        Ok(window) => {
            let duration = window.duration();
            if duration > MAINTENANCE_TIME_WINDOW_DURATION_MAXIMUM {
                errs.push(FieldError::invalid(
                    path.child("timeWindow"),
                    &duration.to_string(),
                    format!(
                        "time window must not be greater than {}",
                        MAINTENANCE_TIME_WINDOW_DURATION_MAXIMUM
                    ),
                ));
            } else if duration < MAINTENANCE_TIME_WINDOW_DURATION_MINIMUM {
                errs.push(FieldError::invalid(
                    path.child("timeWindow"),
                    &duration.to_string(),
                    format!(
                        "time window must not be smaller than {}",
                        MAINTENANCE_TIME_WINDOW_DURATION_MINIMUM
                    ),
                ));
            }
        }
    }

    errs
}

pub fn validate_monitoring(monitoring: Option<&Monitoring>, path: &Path) -> ErrorList {
    match monitoring.and_then(|m| m.alerting.as_ref()) {
        Some(alerting) => validate_alerting(alerting, &path.child("alerting")),
        None => ErrorList::new(),
    }
}

fn validate_alerting(alerting: &Alerting, path: &Path) -> ErrorList {
    let mut errs = ErrorList::new();
    let mut seen = BTreeSet::new();
    for (i, email) in alerting.emailreceivers.iter().enumerate() {
        let idx_path = path.child("emailReceivers").index(i);
        if !is_valid_email(email) {
            errs.push(FieldError::invalid(idx_path.clone(), email, "must provide a valid email"));
        }
        if !seen.insert(email.as_str()) {
            errs.push(FieldError::duplicate(idx_path, email));
        }
    }
    errs
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::crd::{MaintenanceAutoUpdate, MaintenanceTimeWindow};
    use crate::validation::field::ErrorType;

    fn maintenance(begin: &str, end: &str) -> Maintenance {
        Maintenance {
            time_window: Some(MaintenanceTimeWindow {
                begin: begin.to_string(),
                end: end.to_string(),
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_time_window_duration() {
        let window = TimeWindow::parse("220000+0100", "230000+0100").unwrap();
        assert_eq!(window.duration(), Duration::from_hours(1));

        // wraps around midnight
        let window = TimeWindow::parse("230000+0000", "010000+0000").unwrap();
        assert_eq!(window.duration(), Duration::from_hours(2));

        // offsets are applied before comparing
        let window = TimeWindow::parse("220000+0200", "220000+0000").unwrap();
        assert_eq!(window.duration(), Duration::from_hours(2));
    }

    #[test]
    fn test_time_window_parse_errors() {
        assert!(matches!(
            TimeWindow::parse("25", "230000+0100"),
            Err(TimeWindowError::Begin(_))
        ));
        assert!(matches!(
            TimeWindow::parse("220000+0100", "garbage"),
            Err(TimeWindowError::End(_))
        ));
    }

    #[test]
    fn test_validate_maintenance_window() {
        let p = Path::new("spec").child("maintenance");
        assert!(validate_maintenance(Some(&maintenance("220000+0100", "230000+0100")), &p, false).is_empty());

        let errs = validate_maintenance(Some(&maintenance("220000+0100", "221000+0100")), &p, false);
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].detail, "time window must not be smaller than 30m");

        let errs = validate_maintenance(Some(&maintenance("000000+0000", "080000+0000")), &p, false);
        assert_eq!(errs[0].detail, "time window must not be greater than 6h");

        let errs = validate_maintenance(Some(&maintenance("foo", "bar")), &p, false);
        assert_eq!(errs[0].field.to_string(), "spec.maintenance.timeWindow.begin/end");
    }

    #[test]
    fn test_workerless_machine_image_auto_update() {
        let m = Maintenance {
            auto_update: Some(MaintenanceAutoUpdate {
                kubernetes_version: true,
                machine_image_version: Some(true),
            }),
            ..Default::default()
        };
        let p = Path::new("spec").child("maintenance");
        let errs = validate_maintenance(Some(&m), &p, true);
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].error_type, ErrorType::Forbidden);
        assert!(validate_maintenance(Some(&m), &p, false).is_empty());
    }

    #[test]
    fn test_alerting() {
        let monitoring = Monitoring {
            alerting: Some(Alerting {
                emailreceivers: vec![
                    "ops@example.com".to_string(),
                    "not-an-email".to_string(),
                    "ops@example.com".to_string(),
                ],
            }),
        };
        let errs = validate_monitoring(Some(&monitoring), &Path::new("spec.monitoring"));
        let kinds: Vec<ErrorType> = errs.iter().map(|e| e.error_type).collect();
        assert_eq!(kinds, vec![ErrorType::Invalid, ErrorType::Duplicate]);
        assert_eq!(errs[1].field.to_string(), "spec.monitoring.alerting.emailReceivers[2]");
    }
}
