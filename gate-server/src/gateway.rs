//! Process wiring: configuration to a running manager plus HTTP API.

use crate::config::{Config, PolicyKind};
use crate::error::{Result, ServerError};
use crate::http::{build_router, health, AppState};
use gate_client::{FileCredentialStore, LifecycleManager, ManagerError, MessageRouter, Transport};
use gate_core::{ExponentialBackoff, Immediate, InboundFilter};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinError;

/// A configured gateway, ready to run.
pub struct Gateway {
    config: Config,
    manager: LifecycleManager,
}

impl Gateway {
    /// Wire `transport` to file-backed credentials and the configured
    /// policy and router.
    pub fn new<T: Transport + 'static>(config: Config, transport: T) -> Self {
        let store = FileCredentialStore::new(config.storage.data_path.clone());
        let router = MessageRouter::new(InboundFilter {
            ignore_broadcast: config.router.ignore_broadcast,
        });

        let manager = LifecycleManager::new(transport, store)
            .with_router(router)
            .with_challenge_ttl(Duration::from_secs(config.storage.challenge_ttl_secs));

        let manager = match config.reconnect.policy {
            PolicyKind::Immediate => manager.with_policy(Immediate),
            PolicyKind::Backoff => manager.with_policy(ExponentialBackoff {
                max_attempts: config.reconnect.max_attempts,
                ..ExponentialBackoff::default()
            }),
        };

        Self { config, manager }
    }

    /// Serve the HTTP API and keep the session alive until `shutdown`
    /// resolves, then close the session.
    pub async fn run(self, shutdown: impl Future<Output = ()> + Send + 'static) -> Result<()> {
        health::init_start_time();

        tracing::info!(
            "Credentials directory: {}",
            self.config.storage.data_path.display()
        );

        let (handle, mut task) = self.manager.spawn();
        let state = Arc::new(AppState {
            manager: handle.clone(),
            send_timeout: Duration::from_secs(self.config.server.send_timeout_secs),
        });
        let app = build_router(state);

        let addr = self.config.http_addr();
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.clone(),
                source,
            })?;
        tracing::info!("HTTP API listening on {}", addr);

        let server = async move { axum::serve(listener, app).with_graceful_shutdown(shutdown).await };

        let served = tokio::select! {
            result = server => Some(result),
            result = &mut task => {
                flatten(result)?;
                None
            }
        };

        match served {
            Some(result) => {
                result?;
                handle.shutdown().await;
                flatten(task.await)
            }
            None => Err(ServerError::ManagerStopped),
        }
    }
}

fn flatten(
    result: std::result::Result<std::result::Result<(), ManagerError>, JoinError>,
) -> Result<()> {
    result
        .map_err(|e| ServerError::Task(e.to_string()))?
        .map_err(ServerError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gate_client::MockTransport;
    use gate_types::Jid;
    use tempfile::tempdir;

    #[tokio::test]
    async fn run_stops_on_shutdown_signal() {
        let dir = tempdir().unwrap();
        let mut config = Config::default();
        config.server.bind_address = "127.0.0.1".to_string();
        config.server.port = 0;
        config.storage.data_path = dir.path().join("auth_info");

        let me = Jid::parse("15550001111@s.whatsapp.net").unwrap();
        let transport = MockTransport::with_autopilot(me, Duration::from_millis(10));
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();

        let gateway = Gateway::new(config, transport.clone());
        let running = tokio::spawn(gateway.run(async move {
            let _ = rx.await;
        }));

        tokio::time::timeout(Duration::from_secs(5), async {
            while !transport.is_connected() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(5), running)
            .await
            .unwrap()
            .unwrap()
            .unwrap();

        assert!(!transport.is_connected());
    }

    #[tokio::test]
    async fn corrupt_credentials_fail_fast() {
        let dir = tempdir().unwrap();
        let data_path = dir.path().join("auth_info");
        std::fs::create_dir_all(&data_path).unwrap();
        std::fs::write(data_path.join("creds.json"), b"garbage").unwrap();

        let mut config = Config::default();
        config.server.bind_address = "127.0.0.1".to_string();
        config.server.port = 0;
        config.storage.data_path = data_path;

        let result = Gateway::new(config, MockTransport::new())
            .run(std::future::pending())
            .await;

        assert!(matches!(result, Err(ServerError::Manager(_))));
    }
}
