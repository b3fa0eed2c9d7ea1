//! Device model and the repository adapter trait.
//!
//! The repository is an external collaborator; the core only relies on the
//! two index keys (`deviceId`, `accountId`) and treats every descriptive
//! attribute as opaque payload.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::identity::{AccountId, DeviceId};

#[derive(Debug, Error)]
#[error("repository failure: {0}")]
pub struct RepositoryError(pub String);

/// A monitored device. Name, model, serial, network identifiers, status
/// and timestamps all ride in the flattened attribute map; the core never
/// interprets them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Device {
    #[serde(rename = "deviceId")]
    pub device_id: DeviceId,
    #[serde(rename = "accountId")]
    pub account_id: AccountId,
    #[serde(flatten)]
    pub attrs: Map<String, Value>,
}

/// External device repository. Result ordering for listings is owned by
/// the adapter, not by the query service.
#[async_trait]
pub trait DeviceRepository: Send + Sync {
    async fn list_by_account(&self, account_id: &str) -> Result<Vec<Device>, RepositoryError>;

    /// Fetch by device id alone; account filtering happens in the query
    /// service against the caller's grant.
    async fn get_by_id(&self, device_id: &str) -> Result<Option<Device>, RepositoryError>;
}
