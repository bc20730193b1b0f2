//! Kubernetes version comparison.
//!
//! Versions are normalized before comparison: a leading `v` is dropped, any
//! pre-release or build suffix is cut, and missing components become zero
//! (`1.25` compares as `1.25.0`).

use std::cmp::Ordering;

use semver::Version;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum VersionError {
    #[error("invalid semantic version {0:?}")]
    InvalidVersion(String),
    #[error("improper constraint: {0}")]
    InvalidConstraint(String),
}

pub type Result<T> = std::result::Result<T, VersionError>;

/// Parses `v1.25`, `1.25.3` or `1.26.0-rc.1` into a release version.
///
/// The pre-release is dropped, so `1.26.0-rc.1` admits and compares exactly
/// like `1.26.0`.
pub fn parse(version: &str) -> Result<Version> {
    let trimmed = version.trim();
    let trimmed = trimmed.strip_prefix('v').unwrap_or(trimmed);
    let core = trimmed
        .split(['-', '+'])
        .next()
        .unwrap_or_default();

    let parts: Vec<&str> = core.split('.').collect();
    if parts.is_empty() || parts.len() > 3 || parts.iter().any(|p| p.is_empty()) {
        return Err(VersionError::InvalidVersion(version.to_string()));
    }
    let mut numbers = [0u64; 3];
    for (slot, part) in numbers.iter_mut().zip(parts.iter()) {
        *slot = part
            .parse()
            .map_err(|_| VersionError::InvalidVersion(version.to_string()))?;
    }
    let [major, minor, patch] = numbers;
    Ok(Version::new(major, minor, patch))
}

pub fn compare(a: &str, b: &str) -> Result<Ordering> {
    Ok(parse(a)?.cmp(&parse(b)?))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operator {
    Equal,
    NotEqual,
    Greater,
    GreaterOrEqual,
    Less,
    LessOrEqual,
}

impl Operator {
    fn parse(op: &str) -> Option<Self> {
        match op {
            "=" | "==" | "" => Some(Operator::Equal),
            "!=" => Some(Operator::NotEqual),
            ">" => Some(Operator::Greater),
            ">=" => Some(Operator::GreaterOrEqual),
            "<" => Some(Operator::Less),
            "<=" => Some(Operator::LessOrEqual),
            _ => None,
        }
    }

    fn holds(&self, ordering: Ordering) -> bool {
        match self {
            Operator::Equal => ordering == Ordering::Equal,
            Operator::NotEqual => ordering != Ordering::Equal,
            Operator::Greater => ordering == Ordering::Greater,
            Operator::GreaterOrEqual => ordering != Ordering::Less,
            Operator::Less => ordering == Ordering::Less,
            Operator::LessOrEqual => ordering != Ordering::Greater,
        }
    }
}

/// A conjunction of comparisons such as `>= 1.25, < 1.27`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Constraint {
    clauses: Vec<(Operator, Version)>,
}

impl Constraint {
    pub fn parse(constraint: &str) -> Result<Self> {
        let mut clauses = Vec::new();
        for clause in constraint.split(',') {
            let clause = clause.trim();
            let split = clause
                .find(|c: char| c.is_ascii_digit() || c == 'v')
                .ok_or_else(|| VersionError::InvalidConstraint(constraint.to_string()))?;
            let (op, version) = clause.split_at(split);
            let op = Operator::parse(op.trim())
                .ok_or_else(|| VersionError::InvalidConstraint(constraint.to_string()))?;
            let version = parse(version)
                .map_err(|_| VersionError::InvalidConstraint(constraint.to_string()))?;
            clauses.push((op, version));
        }
        Ok(Self { clauses })
    }

    pub fn matches(&self, version: &Version) -> bool {
        self.clauses
            .iter()
            .all(|(op, bound)| op.holds(version.cmp(bound)))
    }
}

/// `check_version_meets_constraint("1.26.1", ">= 1.25")` is `Ok(true)`.
pub fn check_version_meets_constraint(version: &str, constraint: &str) -> Result<bool> {
    let constraint = Constraint::parse(constraint)?;
    Ok(constraint.matches(&parse(version)?))
}

/// `compare_versions("1.24.3", "<", "1.25")` is `Ok(true)`.
pub fn compare_versions(a: &str, operator: &str, b: &str) -> Result<bool> {
    let op = Operator::parse(operator.trim())
        .ok_or_else(|| VersionError::InvalidConstraint(format!("{} {}", operator, b)))?;
    Ok(op.holds(compare(a, b)?))
}

/// Shorthand for `>=` checks where an unparsable version counts as not meeting it.
pub fn is_at_least(version: &str, minimum: &str) -> bool {
    compare_versions(version, ">=", minimum).unwrap_or(false)
}

/// Shorthand for `<` checks where an unparsable version counts as not below it.
pub fn is_below(version: &str, bound: &str) -> bool {
    compare_versions(version, "<", bound).unwrap_or(false)
}

/// The version `n` minors above `version`, with the patch reset.
pub fn bump_minor(version: &Version, n: u64) -> Version {
    Version::new(version.major, version.minor + n, 0)
}
