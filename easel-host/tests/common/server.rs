//! Test server harness for integration tests.
//!
//! Spins up the real host router on a random port, backed by a temporary
//! settings file and project directory.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::OnceLock;

use easel_bridge::{Bridge, ProjectDir, Services};
use easel_core::SettingsStore;
use easel_host::{metrics, router, AppState};
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// The global recorder can only be installed once per test binary.
fn metrics_handle() -> PrometheusHandle {
    static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();
    HANDLE
        .get_or_init(|| metrics::init_metrics().expect("install recorder"))
        .clone()
}

/// A test server instance with control handles.
pub struct TestServer {
    addr: SocketAddr,
    store: SettingsStore,
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl TestServer {
    /// Start a test server storing its files under `dir`.
    ///
    /// # Panics
    ///
    /// Panics if no port is available or server fails to bind.
    pub async fn start(dir: &Path, services: Services) -> Self {
        let port = portpicker::pick_unused_port().expect("no available port");
        let addr = SocketAddr::from(([127, 0, 0, 1], port));

        let store = SettingsStore::new(dir.join("config.json"));
        let bridge = Bridge::new(store.clone(), ProjectDir::new(dir.join("projects")), services);
        let app = router(AppState::new(bridge), metrics_handle(), port);

        let listener = TcpListener::bind(addr).await.expect("failed to bind");
        let actual_addr = listener.local_addr().expect("failed to get local addr");

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let handle = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .expect("server error");
        });

        // Give the server a moment to start
        tokio::time::sleep(tokio::time::Duration::from_millis(10)).await;

        Self {
            addr: actual_addr,
            store,
            shutdown_tx: Some(shutdown_tx),
            handle,
        }
    }

    /// Get the server's socket address.
    #[allow(dead_code)]
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Full URL for a path on the server.
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    /// Settings store backing the server (for test assertions).
    #[allow(dead_code)]
    pub fn settings_store(&self) -> &SettingsStore {
        &self.store
    }

    /// Gracefully shut down the server.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        let _ = tokio::time::timeout(tokio::time::Duration::from_secs(5), self.handle).await;
    }
}
