use serde::{Deserialize, Serialize};

/// Opaque tenant identifier. Never parsed; format is owned by the account
/// provisioning system.
pub type AccountId = String;

/// Opaque device identifier, unique across the repository.
pub type DeviceId = String;

/// Display pair for an account a principal may access. The name is for
/// presentation only and plays no part in access decisions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccountRef {
    #[serde(rename = "accountId")]
    pub account_id: AccountId,
    #[serde(rename = "accountName")]
    pub account_name: String,
}

/// An authenticated identity together with the accounts it was authorized
/// for at verification time. Immutable once produced by the credential
/// store; scope changes take effect on the next login.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Principal {
    pub subject: String,
    #[serde(default)]
    pub accounts: Vec<AccountRef>,
}

impl Principal {
    /// Sorted, deduplicated account ids — the set embedded into tokens.
    pub fn account_ids(&self) -> Vec<AccountId> {
        let mut ids: Vec<AccountId> =
            self.accounts.iter().map(|a| a.account_id.clone()).collect();
        ids.sort();
        ids.dedup();
        ids
    }
}
