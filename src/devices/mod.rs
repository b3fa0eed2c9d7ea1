//! Device metadata queries, always scoped to an enforcer-approved account.

mod repository;
mod service;

pub use repository::{Device, DeviceRepository, RepositoryError};
pub use service::{DeviceError, DeviceQueryService};
