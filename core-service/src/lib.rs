//! Core service façade and bootstrap helpers.
//!
//! This crate wires the host bridges (HTTP client, clock) into the sync
//! engine: it selects the storage backend from the configuration, logs in
//! to Mergin and runs either a single cycle or the daemon loop. The
//! `media-sync` and `media-sync-daemon` binaries are thin wrappers around
//! [`run_once`] and [`start_daemon`].

pub mod backend;
pub mod cli;
pub mod error;

pub use backend::Backend;
pub use error::{CoreError, Result};

use std::sync::Arc;

use bridge_desktop::ReqwestHttpClient;
use bridge_traits::{
    http::HttpClient,
    time::{Clock, SystemClock},
    vcs::VcsConnector,
};
use core_runtime::config::MediaSyncConfig;
use core_sync::{CycleReport, SyncConfig, SyncCoordinator, SyncDaemon};
use provider_mergin::MerginConnector;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Aggregated handle to the bridge dependencies the core requires.
#[derive(Clone)]
pub struct CoreDependencies {
    pub http_client: Arc<dyn HttpClient>,
    pub clock: Arc<dyn Clock>,
}

impl CoreDependencies {
    /// Construct a dependency bundle from explicit bridge handles.
    pub fn new(http_client: Arc<dyn HttpClient>, clock: Arc<dyn Clock>) -> Self {
        Self { http_client, clock }
    }

    /// `reqwest` HTTP client and the system clock.
    pub fn desktop() -> Result<Self> {
        let http_client = ReqwestHttpClient::new()?;
        Ok(Self::new(Arc::new(http_client), Arc::new(SystemClock)))
    }
}

/// Primary façade exposed to the binaries.
#[derive(Clone)]
pub struct CoreService {
    config: Arc<MediaSyncConfig>,
    deps: CoreDependencies,
}

impl CoreService {
    pub fn new(config: MediaSyncConfig, deps: CoreDependencies) -> Self {
        Self {
            config: Arc::new(config),
            deps,
        }
    }

    pub fn config(&self) -> &MediaSyncConfig {
        &self.config
    }

    /// Connector creating authenticated Mergin sessions.
    pub fn connector(&self) -> Arc<dyn VcsConnector> {
        let mergin = &self.config.mergin;
        Arc::new(MerginConnector::new(
            Arc::clone(&self.deps.http_client),
            &mergin.url,
            &mergin.username,
            &mergin.password,
        ))
    }

    /// Initialize the backend and build a coordinator around it.
    pub async fn coordinator(&self) -> Result<SyncCoordinator> {
        let backend = Backend::connect(
            &self.config.driver,
            Arc::clone(&self.deps.http_client),
            Arc::clone(&self.deps.clock),
        )
        .await?;
        Ok(SyncCoordinator::new(
            SyncConfig::from_config(&self.config),
            Arc::new(backend),
        ))
    }

    /// Run a single cycle: download the project when missing, pull otherwise.
    pub async fn run_once(&self) -> Result<CycleReport> {
        let coordinator = self.coordinator().await?;
        info!("Logging in to Mergin...");
        let session = self
            .connector()
            .connect()
            .await
            .map_err(core_sync::SyncError::from)?;
        Ok(coordinator.run_cycle(session.as_ref()).await?)
    }

    /// Run the daemon until `cancel` fires.
    ///
    /// Errors are returned only for startup failures: backend
    /// initialization, login or the bootstrap cycle.
    pub async fn start_daemon(&self, cancel: CancellationToken) -> Result<()> {
        let coordinator = self.coordinator().await?;
        let mut daemon = SyncDaemon::start(
            self.connector(),
            coordinator,
            Arc::clone(&self.deps.clock),
            self.config.daemon.sleep_time,
        )
        .await?;

        daemon.bootstrap().await?;
        daemon.run(cancel).await;
        Ok(())
    }
}

/// One-shot sync with the desktop bridges.
pub async fn run_once(config: MediaSyncConfig) -> Result<CycleReport> {
    CoreService::new(config, CoreDependencies::desktop()?)
        .run_once()
        .await
}

/// Daemon with the desktop bridges, stopped by `cancel`.
pub async fn start_daemon(config: MediaSyncConfig, cancel: CancellationToken) -> Result<()> {
    CoreService::new(config, CoreDependencies::desktop()?)
        .start_daemon(cancel)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::http::{HttpRequest, HttpResponse};
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Answers every request with the same status and body, recording URLs.
    struct CannedHttp {
        status: u16,
        body: &'static str,
        urls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl HttpClient for CannedHttp {
        async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse> {
            self.urls.lock().unwrap().push(request.url);
            Ok(HttpResponse {
                status: self.status,
                headers: HashMap::new(),
                body: self.body.as_bytes().to_vec().into(),
            })
        }
    }

    fn config(tmp: &TempDir) -> MediaSyncConfig {
        let yaml = format!(
            r#"
mergin:
  url: https://mergin.example.com/
  username: sync-bot
  password: secret
  project_name: test/mediasync
project_working_dir: {work}
operation_mode: copy
driver: local
local:
  dest: {dest}
allowed_extensions: [png, jpg]
"#,
            work = tmp.path().join("project").display(),
            dest = tmp.path().join("dest").display(),
        );
        MediaSyncConfig::from_yaml_str(&yaml).unwrap()
    }

    #[tokio::test]
    async fn test_rejected_login_fails_run_once() {
        let tmp = TempDir::new().unwrap();
        let http = Arc::new(CannedHttp {
            status: 401,
            body: r#"{"detail": "Invalid username or password"}"#,
            urls: Mutex::new(Vec::new()),
        });
        let service = CoreService::new(
            config(&tmp),
            CoreDependencies::new(http.clone(), Arc::new(SystemClock)),
        );

        let err = service.run_once().await.unwrap_err();

        assert!(err.to_string().contains("Have you specified correct credentials?"));
        assert_eq!(
            *http.urls.lock().unwrap(),
            vec!["https://mergin.example.com/v1/auth/login".to_string()]
        );
        assert!(!tmp.path().join("project").exists());
        assert!(tmp.path().join("dest").is_dir());
    }

    #[tokio::test]
    async fn test_daemon_does_not_start_without_login() {
        let tmp = TempDir::new().unwrap();
        let http = Arc::new(CannedHttp {
            status: 401,
            body: "{}",
            urls: Mutex::new(Vec::new()),
        });
        let service = CoreService::new(config(&tmp), CoreDependencies::new(http, Arc::new(SystemClock)));

        let result = service.start_daemon(CancellationToken::new()).await;

        assert!(matches!(result, Err(CoreError::Sync(_))));
    }
}
