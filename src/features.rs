//! Gardener feature gates.
//!
//! The table is parsed once at startup from `FEATURE_GATES` and then only read.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Feature {
    /// Allows changing `spec.networking.nodes` of an existing shoot.
    MutableShootSpecNetworkingNodes,
}

impl Feature {
    pub const ALL: &'static [Feature] = &[Feature::MutableShootSpecNetworkingNodes];

    pub fn as_str(&self) -> &'static str {
        match self {
            Feature::MutableShootSpecNetworkingNodes => "MutableShootSpecNetworkingNodes",
        }
    }

    pub fn default_enabled(&self) -> bool {
        match self {
            Feature::MutableShootSpecNetworkingNodes => false,
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Feature {
    type Err = FeatureGateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Feature::ALL
            .iter()
            .copied()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| FeatureGateError::Unknown(s.to_string()))
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum FeatureGateError {
    #[error("unknown feature gate {0:?}")]
    Unknown(String),
    #[error("missing bool value for feature gate {0:?}")]
    MissingValue(String),
    #[error("invalid value {value:?} for feature gate {name:?}")]
    InvalidValue { name: String, value: String },
    #[error("feature gates already initialized")]
    AlreadyInitialized,
}

/// Resolved state of every known feature gate.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FeatureGates {
    overrides: BTreeMap<Feature, bool>,
}

impl FeatureGates {
    /// Parses `Name=true,Other=false`. Whitespace around entries is ignored.
    pub fn parse(spec: &str) -> Result<Self, FeatureGateError> {
        let mut overrides = BTreeMap::new();
        for entry in spec.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (name, value) = entry
                .split_once('=')
                .ok_or_else(|| FeatureGateError::MissingValue(entry.to_string()))?;
            let feature: Feature = name.trim().parse()?;
            let enabled = value.trim().parse::<bool>().map_err(|_| {
                FeatureGateError::InvalidValue {
                    name: name.trim().to_string(),
                    value: value.trim().to_string(),
                }
            })?;
            overrides.insert(feature, enabled);
        }
        Ok(Self { overrides })
    }

    pub fn with(mut self, feature: Feature, enabled: bool) -> Self {
        self.overrides.insert(feature, enabled);
        self
    }

    pub fn enabled(&self, feature: Feature) -> bool {
        self.overrides
            .get(&feature)
            .copied()
            .unwrap_or_else(|| feature.default_enabled())
    }
}

static DEFAULT_FEATURE_GATE: OnceLock<FeatureGates> = OnceLock::new();

/// Installs the process-wide table. Only the first call succeeds.
pub fn init(gates: FeatureGates) -> Result<(), FeatureGateError> {
    DEFAULT_FEATURE_GATE
        .set(gates)
        .map_err(|_| FeatureGateError::AlreadyInitialized)
}

/// The process-wide table, or all defaults if [`init`] was never called.
pub fn default_feature_gate() -> &'static FeatureGates {
    DEFAULT_FEATURE_GATE.get_or_init(FeatureGates::default)
}
