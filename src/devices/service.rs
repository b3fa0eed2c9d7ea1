//! Device query service: the only reader of the device repository.
//!
//! Every operation takes a `ScopeGrant`, so the repository cannot be
//! reached on any code path that skipped the access enforcer.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::identity::ScopeGrant;
use super::repository::{Device, DeviceRepository};

#[derive(Debug, Error)]
pub enum DeviceError {
    /// Unknown device id, or a device owned by an account outside the
    /// caller's grant — deliberately the same outcome for both.
    #[error("device not found")]
    NotFound,

    #[error("repository failure: {0}")]
    Repository(String),
}

pub struct DeviceQueryService {
    repo: Arc<dyn DeviceRepository>,
    adapter_timeout: Duration,
}

impl DeviceQueryService {
    pub fn new(repo: Arc<dyn DeviceRepository>, adapter_timeout: Duration) -> Self {
        Self { repo, adapter_timeout }
    }

    /// All devices belonging to the granted account, in repository order.
    pub async fn list_devices(&self, grant: &ScopeGrant) -> Result<Vec<Device>, DeviceError> {
        let fut = self.repo.list_by_account(grant.account_id());
        let devices = tokio::time::timeout(self.adapter_timeout, fut)
            .await
            .map_err(|_| DeviceError::Repository("device repository timed out".into()))?
            .map_err(|e| DeviceError::Repository(e.to_string()))?;
        tracing::debug!(
            subject = %grant.subject(),
            account = %grant.account_id(),
            count = devices.len(),
            "devices.list"
        );
        Ok(devices)
    }

    /// Fetch a device by id within the granted account.
    pub async fn get_device(&self, grant: &ScopeGrant, device_id: &str) -> Result<Device, DeviceError> {
        let fut = self.repo.get_by_id(device_id);
        let fetched = tokio::time::timeout(self.adapter_timeout, fut)
            .await
            .map_err(|_| DeviceError::Repository("device repository timed out".into()))?
            .map_err(|e| DeviceError::Repository(e.to_string()))?;

        match fetched {
            Some(d) if d.account_id == *grant.account_id() => Ok(d),
            Some(_) => {
                // Exists under another account. Audit internally, answer
                // exactly as if the id did not exist.
                tracing::warn!(
                    subject = %grant.subject(),
                    account = %grant.account_id(),
                    device = %device_id,
                    "devices.get cross-account id reported as not found"
                );
                Err(DeviceError::NotFound)
            }
            None => Err(DeviceError::NotFound),
        }
    }
}
