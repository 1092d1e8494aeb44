use bridge_traits::error::BridgeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Provider {provider} authentication failed: {reason}")]
    AuthenticationFailed { provider: String, reason: String },

    #[error("Token refresh failed: {0}")]
    TokenRefreshFailed(String),

    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("HTTP error: {0}")]
    Http(#[from] BridgeError),
}

impl From<AuthError> for BridgeError {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::Http(inner) => inner,
            other => BridgeError::Authentication(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, AuthError>;
