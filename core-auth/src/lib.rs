//! # Authentication Module
//!
//! Credential handling shared by the providers:
//!
//! - [`SessionToken`] - bearer token plus expiry, with the renewal checks used
//!   by the daemon to decide when a version-control session must be replaced
//! - [`ServiceAccountAuthenticator`] - Google service-account (JWT bearer)
//!   access tokens, cached and refreshed before expiry
//! - [`AccessTokenProvider`] - seam through which API clients obtain tokens

pub mod error;
pub mod service_account;
pub mod types;

pub use error::{AuthError, Result};
pub use service_account::{
    build_assertion, AccessTokenProvider, ServiceAccountAuthenticator, ServiceAccountKey,
    StaticToken,
};
pub use types::{session_renewal_threshold, SessionToken, SESSION_RENEWAL_THRESHOLD_SECS};
