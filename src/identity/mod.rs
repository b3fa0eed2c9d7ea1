//! Authentication and account-scope authorization for fleetgate.
//! Keep the public surface thin and split implementation across sub-modules.

mod principal;
mod token;
mod provider;
mod enforcer;

pub use principal::{AccountId, AccountRef, DeviceId, Principal};
pub use token::{Claims, IssuedToken, TokenCodec, TokenError, VerifiedClaims};
pub use provider::{AuthError, Authenticator, CredentialError, CredentialStore, LoginOutcome};
pub use enforcer::{authorize, AccessDenied, ScopeGrant};
