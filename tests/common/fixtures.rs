//! Test fixtures and builder patterns for Shoot.

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use shoot_admission::crd::{
    ControlPlane, CredentialRotation, CredentialsRotationPhase, Dns, DnsProvider, FailureTolerance,
    HighAvailability, Kubernetes, LastOperation, LastOperationState, LastOperationType, Machine, Networking,
    Provider, Shoot, ShootMachineImage, ShootSpec, ShootStatus, Worker,
};

/// Builder for creating Shoot test fixtures.
///
/// The default build is a valid single-pool AWS shoot in `garden-dev`.
///
/// # Example
/// ```
/// let shoot = ShootBuilder::new("crazy-botany")
///     .kubernetes_version("1.28.2")
///     .worker("cpu-worker", 1, 3)
///     .build();
/// ```
#[derive(Clone, Debug)]
pub struct ShootBuilder {
    name: String,
    namespace: Option<String>,
    region: String,
    kubernetes_version: String,
    workers: Vec<Worker>,
    networking: Option<Networking>,
    secret_binding_name: Option<String>,
    seed_name: Option<String>,
    dns: Option<Dns>,
    failure_tolerance_type: Option<String>,
    annotations: BTreeMap<String, String>,
    deletion_timestamp: Option<Time>,
    status: Option<ShootStatus>,
}

/// A valid worker pool with the given bounds.
pub fn worker(name: &str, minimum: i32, maximum: i32) -> Worker {
    Worker {
        name: name.to_string(),
        machine: Machine {
            r#type: "m5.large".to_string(),
            image: Some(ShootMachineImage {
                name: "gardenlinux".to_string(),
                version: "1312.3.0".to_string(),
                provider_config: None,
            }),
            ..Default::default()
        },
        minimum,
        maximum,
        ..Default::default()
    }
}

impl ShootBuilder {
    /// Create a new builder with the given shoot name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: Some("garden-dev".to_string()),
            region: "eu-west-1".to_string(),
            kubernetes_version: "1.27.3".to_string(),
            workers: vec![worker("cpu-worker", 1, 3)],
            networking: Some(Networking {
                r#type: Some("calico".to_string()),
                nodes: Some("10.250.0.0/16".to_string()),
                ..Default::default()
            }),
            secret_binding_name: Some("my-provider-account".to_string()),
            seed_name: None,
            dns: None,
            failure_tolerance_type: None,
            annotations: BTreeMap::new(),
            deletion_timestamp: None,
            status: None,
        }
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    pub fn kubernetes_version(mut self, version: impl Into<String>) -> Self {
        self.kubernetes_version = version.into();
        self
    }

    /// Replace all pools with a single one.
    pub fn worker(mut self, name: &str, minimum: i32, maximum: i32) -> Self {
        self.workers = vec![worker(name, minimum, maximum)];
        self
    }

    pub fn workers(mut self, workers: Vec<Worker>) -> Self {
        self.workers = workers;
        self
    }

    /// No pools, no networking and no secret binding.
    pub fn workerless(mut self) -> Self {
        self.workers.clear();
        self.networking = None;
        self.secret_binding_name = None;
        self
    }

    pub fn networking(mut self, networking: Option<Networking>) -> Self {
        self.networking = networking;
        self
    }

    pub fn pods_cidr(mut self, pods: impl Into<String>) -> Self {
        let mut networking = self.networking.unwrap_or_default();
        networking.pods = Some(pods.into());
        self.networking = Some(networking);
        self
    }

    pub fn seed_name(mut self, seed: impl Into<String>) -> Self {
        self.seed_name = Some(seed.into());
        self
    }

    /// Managed DNS under `shoot.example.com` with a single primary provider.
    pub fn primary_dns(mut self, provider_type: impl Into<String>) -> Self {
        self.dns = Some(Dns {
            domain: Some("shoot.example.com".to_string()),
            providers: vec![DnsProvider {
                primary: Some(true),
                r#type: Some(provider_type.into()),
                secret_name: Some("dns-secret".to_string()),
            }],
        });
        self
    }

    pub fn failure_tolerance(mut self, r#type: impl Into<String>) -> Self {
        self.failure_tolerance_type = Some(r#type.into());
        self
    }

    pub fn annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }

    pub fn deletion_timestamp(mut self, ts: Time) -> Self {
        self.deletion_timestamp = Some(ts);
        self
    }

    pub fn last_operation(mut self, r#type: LastOperationType, state: LastOperationState) -> Self {
        let mut status = self.status.unwrap_or_default();
        status.last_operation = Some(LastOperation {
            r#type,
            state,
            description: String::new(),
            progress: 100,
            last_update_time: None,
        });
        self.status = Some(status);
        self
    }

    /// Set the CA rotation phase in the status.
    pub fn ca_rotation_phase(mut self, phase: CredentialsRotationPhase) -> Self {
        let mut status = self.status.unwrap_or_default();
        let mut credentials = status.credentials.unwrap_or_default();
        let mut rotation = credentials.rotation.unwrap_or_default();
        rotation.certificate_authorities = Some(CredentialRotation {
            phase: Some(phase),
            ..Default::default()
        });
        credentials.rotation = Some(rotation);
        status.credentials = Some(credentials);
        self.status = Some(status);
        self
    }

    pub fn status(mut self, status: ShootStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Build the Shoot.
    pub fn build(self) -> Shoot {
        let mut shoot = Shoot::new(
            &self.name,
            ShootSpec {
                cloud_profile_name: "aws".to_string(),
                region: self.region,
                secret_binding_name: self.secret_binding_name,
                seed_name: self.seed_name,
                provider: Provider {
                    r#type: "aws".to_string(),
                    workers: self.workers,
                    ..Default::default()
                },
                kubernetes: Kubernetes {
                    version: self.kubernetes_version,
                    ..Default::default()
                },
                networking: self.networking,
                dns: self.dns,
                control_plane: self.failure_tolerance_type.map(|r#type| ControlPlane {
                    high_availability: Some(HighAvailability {
                        failure_tolerance: FailureTolerance { r#type },
                    }),
                }),
                ..Default::default()
            },
        );
        shoot.metadata.namespace = self.namespace;
        shoot.metadata.deletion_timestamp = self.deletion_timestamp;
        if !self.annotations.is_empty() {
            shoot.metadata.annotations = Some(self.annotations);
        }
        shoot.status = self.status;
        shoot
    }
}
