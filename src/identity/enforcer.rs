//! Access enforcer: the single gate between a verified token and any
//! account-scoped operation.
//!
//! `authorize` is a pure set-membership check over the claims embedded at
//! issuance — no repository access, no trust in any client-asserted account
//! ownership. It runs before a query service ever touches an adapter, so a
//! denial has the same shape and timing whether or not the account exists.

use thiserror::Error;

use super::principal::AccountId;
use super::token::VerifiedClaims;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("access denied")]
pub struct AccessDenied;

/// Proof that the enforcer approved `subject` for `account_id`.
///
/// The fields are private and the only constructor lives in `authorize`, so
/// every repository-touching code path must have passed the membership
/// check to hold one. New endpoints cannot forget the gate; they cannot
/// call the device query service without it.
#[derive(Debug, Clone)]
pub struct ScopeGrant {
    subject: String,
    account_id: AccountId,
}

impl ScopeGrant {
    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn account_id(&self) -> &AccountId {
        &self.account_id
    }
}

/// Allow iff `account_id` is a member of the token's authorized set.
pub fn authorize(claims: &VerifiedClaims, account_id: &str) -> Result<ScopeGrant, AccessDenied> {
    if claims.0.accounts.iter().any(|a| a == account_id) {
        Ok(ScopeGrant {
            subject: claims.0.sub.clone(),
            account_id: account_id.to_string(),
        })
    } else {
        Err(AccessDenied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::token::Claims;

    fn claims_with(accounts: &[&str]) -> VerifiedClaims {
        VerifiedClaims(Claims {
            sub: "alice".into(),
            accounts: accounts.iter().map(|s| s.to_string()).collect(),
            iss: "fleetgate-test".into(),
            iat: 0,
            exp: i64::MAX,
            jti: "t-test".into(),
        })
    }

    #[test]
    fn member_account_is_allowed() {
        let claims = claims_with(&["acc-a", "acc-b"]);
        let grant = authorize(&claims, "acc-a").unwrap();
        assert_eq!(grant.subject(), "alice");
        assert_eq!(grant.account_id(), "acc-a");
    }

    #[test]
    fn non_member_account_is_denied() {
        let claims = claims_with(&["acc-a", "acc-b"]);
        // Denied whether or not the account exists anywhere.
        assert!(matches!(authorize(&claims, "acc-c"), Err(AccessDenied)));
        assert!(matches!(authorize(&claims, "no-such-account"), Err(AccessDenied)));
    }

    #[test]
    fn empty_set_denies_everything() {
        let claims = claims_with(&[]);
        assert!(matches!(authorize(&claims, "acc-a"), Err(AccessDenied)));
        assert!(matches!(authorize(&claims, ""), Err(AccessDenied)));
    }

    #[test]
    fn membership_is_exact_match() {
        let claims = claims_with(&["acc-a"]);
        assert!(matches!(authorize(&claims, "acc-a "), Err(AccessDenied)));
        assert!(matches!(authorize(&claims, "ACC-A"), Err(AccessDenied)));
        assert!(matches!(authorize(&claims, "acc"), Err(AccessDenied)));
    }
}
