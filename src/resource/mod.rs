//! Istio configuration service
//!
//! Aggregates, inspects and mutates the ten Istio configuration kinds
//! through an [`IstioClient`].
//!
//! # Architecture
//!
//! - [`registry`] - Kind → API group/version/schema tables, loaded from embedded JSON
//! - [`fetcher`] - Concurrent list aggregation and detail + permission co-query
//! - [`dispatch`] - Create/update/delete routing with subtype indirection
//! - [`payload`] - Validation and normalization of create payloads
//!
//! # Example
//!
//! ```ignore
//! use meshconf::resource::{IstioConfigCriteria, IstioConfigService};
//!
//! async fn list_routing(service: &IstioConfigService) -> meshconf::error::ConfigResult<()> {
//!     let criteria = IstioConfigCriteria::from_object_types("bookinfo", "virtualservices,destinationrules")?;
//!     let list = service.get_istio_config_list(&criteria).await?;
//!     println!("{} virtual services", list.virtual_services.unwrap_or_default().len());
//!     Ok(())
//! }
//! ```

pub mod dispatch;
pub mod fetcher;
pub mod payload;
mod registry;
#[cfg(test)]
mod testing;

pub use fetcher::IstioConfigCriteria;
pub use payload::parse_json_for_create;
pub use registry::*;

use crate::kube::IstioClient;
use std::sync::Arc;

/// Entry point for list, detail and CRUD operations
#[derive(Clone)]
pub struct IstioConfigService {
    client: Arc<dyn IstioClient>,
}

impl IstioConfigService {
    pub fn new(client: Arc<dyn IstioClient>) -> Self {
        Self { client }
    }
}
