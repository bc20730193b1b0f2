//! Shoot admission rules.
//!
//! Every validator is a pure function returning an [`ErrorList`]; an empty
//! list admits the object. Sub-validators are composed by the orchestrators
//! in [`shoot`] and never mutate their input.

pub mod addons;
pub mod admission_plugins;
pub mod cidr;
pub mod dns;
pub mod field;
pub mod ha;
pub mod hibernation;
pub mod kube_features;
pub mod kubelet;
pub mod kubernetes;
pub mod maintenance;
pub mod networking;
pub mod operations;
pub mod primitives;
pub mod rotation;
pub mod shoot;
pub mod status;
pub mod version;
pub mod workers;

pub use field::{ErrorList, ErrorType, FieldError, Path};
pub use shoot::{
    validate_shoot, validate_shoot_spec, validate_shoot_spec_update, validate_shoot_template,
    validate_shoot_template_update, validate_shoot_update,
};
pub use status::validate_shoot_status_update;
pub use workers::validate_total_node_count_with_pod_cidr;

pub const WORKERLESS_ERROR_MSG: &str = "this field should not be set for workerless Shoot clusters";
