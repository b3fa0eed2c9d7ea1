//! Account-scoping integration tests over the file-backed adapters: the
//! enforcer gate, tenant isolation on listings, and the uniform not-found
//! behavior that hides cross-tenant device existence.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tempfile::tempdir;

use fleetgate::config::Config;
use fleetgate::devices::{Device, DeviceError, DeviceQueryService};
use fleetgate::identity::{authorize, AccountRef, Authenticator, TokenCodec, VerifiedClaims};
use fleetgate::storage::{add_user, write_devices, FileCredentialStore, FileDeviceRepository};

fn test_config(data_root: &str) -> Config {
    Config {
        data_root: data_root.into(),
        signing_secret: b"device-scope-test-secret-01234567".to_vec(),
        token_ttl_secs: 3600,
        clock_leeway_secs: 0,
        ..Config::default()
    }
}

fn device(id: &str, account: &str) -> Device {
    let mut attrs = serde_json::Map::new();
    attrs.insert("name".into(), serde_json::json!(format!("device {id}")));
    attrs.insert("status".into(), serde_json::json!("online"));
    Device { device_id: id.into(), account_id: account.into(), attrs }
}

/// Seed a user authorized for accounts A and B, plus devices spread over
/// accounts A, B and C, then log in and return the verified claims.
async fn login_for_a_and_b(root: &std::path::Path, config: &Config) -> Result<VerifiedClaims> {
    add_user(
        root,
        "alice",
        "s3cr3t!",
        vec![
            AccountRef { account_id: "acc-a".into(), account_name: "Alpha".into() },
            AccountRef { account_id: "acc-b".into(), account_name: "Beta".into() },
        ],
    )?;
    write_devices(
        root,
        &[
            device("dev-1", "acc-b"),
            device("dev-2", "acc-a"),
            device("dev-3", "acc-a"),
            device("dev-4", "acc-c"),
        ],
    )?;

    let auth = Authenticator::new(
        Arc::new(FileCredentialStore::new(root)),
        TokenCodec::new(config),
        Duration::from_millis(config.adapter_timeout_ms),
    );
    let outcome = auth.login("alice", "s3cr3t!").await.expect("login");
    Ok(auth.verify_token(&outcome.token)?)
}

fn service_for(root: &std::path::Path, config: &Config) -> DeviceQueryService {
    DeviceQueryService::new(
        Arc::new(FileDeviceRepository::new(root)),
        Duration::from_millis(config.adapter_timeout_ms),
    )
}

#[tokio::test]
async fn listing_is_scoped_to_the_granted_account() -> Result<()> {
    let tmp = tempdir()?;
    let config = test_config(tmp.path().to_str().unwrap());
    let claims = login_for_a_and_b(tmp.path(), &config).await?;
    let devices = service_for(tmp.path(), &config);

    let grant = authorize(&claims, "acc-a").expect("member account allows");
    let listed = devices.list_devices(&grant).await?;
    let ids: Vec<&str> = listed.iter().map(|d| d.device_id.as_str()).collect();
    assert_eq!(ids, vec!["dev-2", "dev-3"]);
    assert!(listed.iter().all(|d| d.account_id == "acc-a"));
    Ok(())
}

#[tokio::test]
async fn unauthorized_account_is_denied_before_any_lookup() -> Result<()> {
    let tmp = tempdir()?;
    let config = test_config(tmp.path().to_str().unwrap());
    let claims = login_for_a_and_b(tmp.path(), &config).await?;

    // acc-c has real devices; acc-nope does not exist. Both denials are
    // identical because the check never consults the repository.
    assert!(authorize(&claims, "acc-c").is_err());
    assert!(authorize(&claims, "acc-nope").is_err());
    Ok(())
}

#[tokio::test]
async fn cross_account_get_matches_missing_device_exactly() -> Result<()> {
    let tmp = tempdir()?;
    let config = test_config(tmp.path().to_str().unwrap());
    let claims = login_for_a_and_b(tmp.path(), &config).await?;
    let devices = service_for(tmp.path(), &config);
    let grant = authorize(&claims, "acc-a").expect("member account allows");

    // dev-1 exists but belongs to acc-b; dev-x does not exist anywhere.
    let cross = devices.get_device(&grant, "dev-1").await.unwrap_err();
    let missing = devices.get_device(&grant, "dev-x").await.unwrap_err();

    assert!(matches!(cross, DeviceError::NotFound));
    assert!(matches!(missing, DeviceError::NotFound));
    assert_eq!(cross.to_string(), missing.to_string());
    Ok(())
}

#[tokio::test]
async fn get_within_grant_returns_the_device() -> Result<()> {
    let tmp = tempdir()?;
    let config = test_config(tmp.path().to_str().unwrap());
    let claims = login_for_a_and_b(tmp.path(), &config).await?;
    let devices = service_for(tmp.path(), &config);

    let grant = authorize(&claims, "acc-b").expect("member account allows");
    let d = devices.get_device(&grant, "dev-1").await?;
    assert_eq!(d.device_id, "dev-1");
    assert_eq!(d.account_id, "acc-b");
    assert_eq!(d.attrs.get("name"), Some(&serde_json::json!("device dev-1")));
    Ok(())
}

/// The full scenario from the access-control contract: a token scoped to
/// {A, B} can list A, is denied on C, and sees a B-owned device as absent
/// when asking through A.
#[tokio::test]
async fn account_scope_scenario_end_to_end() -> Result<()> {
    let tmp = tempdir()?;
    let config = test_config(tmp.path().to_str().unwrap());
    let claims = login_for_a_and_b(tmp.path(), &config).await?;
    let devices = service_for(tmp.path(), &config);

    let grant_a = authorize(&claims, "acc-a").expect("A is in scope");
    assert_eq!(devices.list_devices(&grant_a).await?.len(), 2);

    assert!(authorize(&claims, "acc-c").is_err());

    let err = devices.get_device(&grant_a, "dev-1").await.unwrap_err();
    assert!(matches!(err, DeviceError::NotFound));
    Ok(())
}
