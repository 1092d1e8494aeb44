//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop and server hosts:
//! - `HttpClient` using `reqwest`
//! - `StorageBackend` for a local destination directory using `tokio::fs`
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{LocalBackend, ReqwestHttpClient};
//!
//! #[tokio::main]
//! async fn main() -> bridge_traits::error::Result<()> {
//!     let http_client = ReqwestHttpClient::new()?;
//!     let backend = LocalBackend::new("/srv/media").await?;
//!     Ok(())
//! }
//! ```

mod filesystem;
mod http;

pub use filesystem::LocalBackend;
pub use http::ReqwestHttpClient;
