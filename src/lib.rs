//! meshconf - Istio configuration aggregation over the Kubernetes API
//!
//! - [`resource`] - The configuration service: list bundles, details with
//!   permissions, create/update/delete, and the kind registry
//! - [`kube`] - The cluster API contract and its REST implementation
//! - [`models`] - Raw and typed Istio objects
//! - [`config`] - Persistent settings and client construction

pub mod config;
pub mod error;
pub mod kube;
pub mod models;
pub mod resource;

pub use error::{ConfigError, ConfigResult};
pub use resource::{get_istio_api, parse_json_for_create, IstioConfigCriteria, IstioConfigService};
