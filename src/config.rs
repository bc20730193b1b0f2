//! Service configuration read from the environment.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::features::FeatureGates;

/// Default webhook server port
pub const DEFAULT_WEBHOOK_PORT: u16 = 9443;
/// Default health and metrics server port
pub const DEFAULT_HEALTH_PORT: u16 = 8080;
/// Default path to webhook TLS certificate
pub const DEFAULT_WEBHOOK_CERT_PATH: &str = "/etc/webhook/certs/tls.crt";
/// Default path to webhook TLS private key
pub const DEFAULT_WEBHOOK_KEY_PATH: &str = "/etc/webhook/certs/tls.key";

#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub webhook_port: u16,
    pub health_port: u16,
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
    pub feature_gates: FeatureGates,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            webhook_port: DEFAULT_WEBHOOK_PORT,
            health_port: DEFAULT_HEALTH_PORT,
            cert_path: PathBuf::from(DEFAULT_WEBHOOK_CERT_PATH),
            key_path: PathBuf::from(DEFAULT_WEBHOOK_KEY_PATH),
            feature_gates: FeatureGates::default(),
        }
    }
}

impl Config {
    /// Reads `WEBHOOK_PORT`, `HEALTH_PORT`, `WEBHOOK_CERT_PATH`,
    /// `WEBHOOK_KEY_PATH` and `FEATURE_GATES`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Ok(Self {
            webhook_port: parse_port(&lookup, "WEBHOOK_PORT", defaults.webhook_port)?,
            health_port: parse_port(&lookup, "HEALTH_PORT", defaults.health_port)?,
            cert_path: lookup("WEBHOOK_CERT_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.cert_path),
            key_path: lookup("WEBHOOK_KEY_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.key_path),
            feature_gates: match lookup("FEATURE_GATES") {
                Some(spec) => FeatureGates::parse(&spec)?,
                None => defaults.feature_gates,
            },
        })
    }

    /// Whether both TLS files are mounted.
    pub fn tls_available(&self) -> bool {
        Path::new(&self.cert_path).exists() && Path::new(&self.key_path).exists()
    }
}

fn parse_port<F>(lookup: &F, key: &str, default: u16) -> Result<u16>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| Error::Config(format!("{} must be a port number, got {:?}", key, raw))),
    }
}
