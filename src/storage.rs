//! File-backed reference adapters for the credential store and the device
//! repository, plus first-run bootstrap helpers.
//!
//! Layout under the data root:
//! - `users.json`   — operator accounts with Argon2 PHC password hashes
//! - `devices.json` — the device inventory, one record per device
//!
//! Production deployments substitute their own `CredentialStore` /
//! `DeviceRepository` implementations; these adapters keep the server
//! usable out of the box and back the integration tests.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use password_hash::{PasswordHash, SaltString};
use serde::{Deserialize, Serialize};

use crate::devices::{Device, DeviceRepository, RepositoryError};
use crate::identity::{AccountRef, CredentialError, CredentialStore, Principal};

fn users_path(root: &Path) -> PathBuf { root.join("users.json") }
fn devices_path(root: &Path) -> PathBuf { root.join("devices.json") }

/// One row of users.json.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub username: String,
    #[serde(rename = "passwordHash")]
    pub password_hash: String,
    #[serde(default)]
    pub accounts: Vec<AccountRef>,
}

pub fn hash_password(password: &str) -> Result<String> {
    let mut salt_bytes = [0u8; 16];
    getrandom::getrandom(&mut salt_bytes).map_err(|e| anyhow!(e.to_string()))?;
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| anyhow!(e.to_string()))?;
    let argon2 = Argon2::default();
    let phc = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow!(e.to_string()))?
        .to_string();
    Ok(phc)
}

pub fn verify_password(hash: &str, password: &str) -> bool {
    if let Ok(parsed) = PasswordHash::new(hash) {
        let argon2 = Argon2::default();
        argon2.verify_password(password.as_bytes(), &parsed).is_ok()
    } else {
        false
    }
}

// Verified against when the username is unknown, so the miss path costs a
// real Argon2 verification and stays timing-aligned with the hit path.
static DUMMY_PHC: Lazy<String> =
    Lazy::new(|| hash_password("fleetgate-dummy-password").unwrap_or_default());

// Serializes read-modify-write cycles on the JSON files within this
// process.
static FILE_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

fn read_users(path: &Path) -> Result<Vec<UserRecord>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let users: Vec<UserRecord> =
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;
    Ok(users)
}

fn write_users(path: &Path, users: &[UserRecord]) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).ok();
    }
    let raw = serde_json::to_string_pretty(users)?;
    std::fs::write(path, raw).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

/// Create or replace a user row. Usernames are matched case-insensitively.
pub fn add_user(root: &Path, username: &str, password: &str, accounts: Vec<AccountRef>) -> Result<()> {
    let _guard = FILE_LOCK.lock();
    let path = users_path(root);
    let mut users = read_users(&path)?;
    users.retain(|u| !u.username.eq_ignore_ascii_case(username));
    users.push(UserRecord {
        username: username.to_string(),
        password_hash: hash_password(password)?,
        accounts,
    });
    write_users(&path, &users)
}

pub fn delete_user(root: &Path, username: &str) -> Result<()> {
    let _guard = FILE_LOCK.lock();
    let path = users_path(root);
    let mut users = read_users(&path)?;
    users.retain(|u| !u.username.eq_ignore_ascii_case(username));
    write_users(&path, &users)
}

/// Replace the device inventory wholesale. Listing order follows the order
/// written here.
pub fn write_devices(root: &Path, devices: &[Device]) -> Result<()> {
    let _guard = FILE_LOCK.lock();
    let path = devices_path(root);
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).ok();
    }
    let raw = serde_json::to_string_pretty(devices)?;
    std::fs::write(&path, raw).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

fn read_devices(path: &Path) -> Result<Vec<Device>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let devices: Vec<Device> =
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;
    Ok(devices)
}

/// Seed a default operator on first run so the server is reachable before
/// any real users are provisioned.
pub fn ensure_default_operator(root: &Path) -> Result<()> {
    let path = users_path(root);
    if path.exists() {
        return Ok(());
    }
    tracing::info!("no users.json found, creating default operator account");
    add_user(
        root,
        "operator",
        "fleetgate",
        vec![
            AccountRef { account_id: "acct-ops".into(), account_name: "Operations".into() },
            AccountRef { account_id: "acct-lab".into(), account_name: "Field Lab".into() },
        ],
    )
}

/// Write a small demo fleet on first run when no inventory exists.
pub fn seed_demo_fleet(root: &Path) -> Result<()> {
    let path = devices_path(root);
    if path.exists() {
        return Ok(());
    }
    tracing::info!("no devices.json found, seeding demo fleet");
    let mk = |id: &str, account: &str, name: &str, model: &str, ip: &str, status: &str| Device {
        device_id: id.into(),
        account_id: account.into(),
        attrs: serde_json::json!({
            "name": name,
            "model": model,
            "serial": format!("SN-{}", id.to_uppercase()),
            "ip": ip,
            "status": status,
        })
        .as_object()
        .cloned()
        .unwrap_or_default(),
    };
    write_devices(
        root,
        &[
            mk("gw-0001", "acct-ops", "east gateway", "FG-100", "10.0.0.10", "online"),
            mk("gw-0002", "acct-ops", "west gateway", "FG-100", "10.0.0.11", "online"),
            mk("cam-0107", "acct-ops", "loading dock camera", "FG-CAM2", "10.0.1.17", "offline"),
            mk("lab-0001", "acct-lab", "bench router", "FG-50", "192.168.7.1", "online"),
        ],
    )
}

/// Credential store backed by users.json.
pub struct FileCredentialStore {
    root: PathBuf,
}

impl FileCredentialStore {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn verify_credentials(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Principal, CredentialError> {
        let users = read_users(&users_path(&self.root))
            .map_err(|e| CredentialError::Unavailable(e.to_string()))?;

        let Some(user) = users.iter().find(|u| u.username.eq_ignore_ascii_case(username)) else {
            // Unknown user: burn a verification anyway so the caller cannot
            // tell this apart from a wrong password.
            let _ = verify_password(&DUMMY_PHC, password);
            return Err(CredentialError::InvalidCredentials);
        };

        if !verify_password(&user.password_hash, password) {
            return Err(CredentialError::InvalidCredentials);
        }

        Ok(Principal {
            subject: user.username.clone(),
            accounts: user.accounts.clone(),
        })
    }
}

/// Device repository backed by devices.json. Listing order is file order.
pub struct FileDeviceRepository {
    root: PathBuf,
}

impl FileDeviceRepository {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl DeviceRepository for FileDeviceRepository {
    async fn list_by_account(&self, account_id: &str) -> Result<Vec<Device>, RepositoryError> {
        let devices = read_devices(&devices_path(&self.root))
            .map_err(|e| RepositoryError(e.to_string()))?;
        Ok(devices.into_iter().filter(|d| d.account_id == account_id).collect())
    }

    async fn get_by_id(&self, device_id: &str) -> Result<Option<Device>, RepositoryError> {
        let devices = read_devices(&devices_path(&self.root))
            .map_err(|e| RepositoryError(e.to_string()))?;
        Ok(devices.into_iter().find(|d| d.device_id == device_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn password_hash_round_trip() {
        let phc = hash_password("s3cr3t!").unwrap();
        assert!(verify_password(&phc, "s3cr3t!"));
        assert!(!verify_password(&phc, "wrong"));
        assert!(!verify_password("not-a-phc", "s3cr3t!"));
    }

    #[test]
    fn add_user_replaces_case_insensitive_duplicates() {
        let tmp = tempdir().unwrap();
        add_user(tmp.path(), "Alice", "one", Vec::new()).unwrap();
        add_user(tmp.path(), "alice", "two", Vec::new()).unwrap();
        let users = read_users(&users_path(tmp.path())).unwrap();
        assert_eq!(users.len(), 1);
        assert!(verify_password(&users[0].password_hash, "two"));
    }

    #[tokio::test]
    async fn file_repository_preserves_file_order() {
        let tmp = tempdir().unwrap();
        let devices = vec![
            Device { device_id: "z-9".into(), account_id: "acc-a".into(), attrs: Default::default() },
            Device { device_id: "a-1".into(), account_id: "acc-a".into(), attrs: Default::default() },
        ];
        write_devices(tmp.path(), &devices).unwrap();
        let repo = FileDeviceRepository::new(tmp.path());
        let listed = repo.list_by_account("acc-a").await.unwrap();
        let ids: Vec<&str> = listed.iter().map(|d| d.device_id.as_str()).collect();
        assert_eq!(ids, vec!["z-9", "a-1"]);
    }

    #[tokio::test]
    async fn missing_inventory_reads_as_empty() {
        let tmp = tempdir().unwrap();
        let repo = FileDeviceRepository::new(tmp.path());
        assert!(repo.list_by_account("acc-a").await.unwrap().is_empty());
        assert!(repo.get_by_id("dev-1").await.unwrap().is_none());
    }
}
