//! Server lifecycle: the [`ConfigServer`] seam and the built-in [`ZeroServer`].

use std::net::SocketAddr;
use std::sync::{mpsc, Arc};
use std::thread::JoinHandle;

use tokio::net::TcpListener;
use tokio::sync::oneshot;

use pantry_core::ServerEndpoint;

use crate::api::build_router;
use crate::error::ServerError;
use crate::store::{DataStore, MemoryStore};

/// The embedded configuration server as seen by the daemon controller.
pub trait ConfigServer {
    /// Bind `endpoint` and serve.
    ///
    /// With `blocking = true` this does not return until the server is told
    /// to stop (SIGTERM or ctrl-c). With `blocking = false` it returns once
    /// the listener is bound and serves on a background thread.
    fn start(&mut self, endpoint: &ServerEndpoint, blocking: bool) -> Result<(), ServerError>;

    /// Shut down a server started in this process; a no-op otherwise.
    fn stop(&mut self) -> Result<(), ServerError>;
}

struct Background {
    addr: SocketAddr,
    shutdown_tx: oneshot::Sender<()>,
    thread: JoinHandle<Result<(), ServerError>>,
}

/// HTTP content server backed by a [`DataStore`].
pub struct ZeroServer {
    store: Arc<dyn DataStore>,
    background: Option<Background>,
}

impl Default for ZeroServer {
    fn default() -> Self {
        Self::new()
    }
}

impl ZeroServer {
    /// A server backed by a fresh, non-persistent [`MemoryStore`].
    pub fn new() -> Self {
        Self::with_store(Arc::new(MemoryStore::new()))
    }

    pub fn with_store(store: Arc<dyn DataStore>) -> Self {
        Self {
            store,
            background: None,
        }
    }

    pub fn store(&self) -> Arc<dyn DataStore> {
        self.store.clone()
    }

    /// Bound address of a non-blocking server, once started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.background.as_ref().map(|bg| bg.addr)
    }

    /// Base URL of a non-blocking server, once started.
    pub fn url(&self) -> Option<String> {
        self.local_addr().map(|addr| format!("http://{addr}"))
    }

    fn start_background(&mut self, addr: SocketAddr) -> Result<(), ServerError> {
        let store = self.store.clone();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<SocketAddr, ServerError>>();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let thread = std::thread::spawn(move || -> Result<(), ServerError> {
            let runtime = match build_runtime() {
                Ok(runtime) => runtime,
                Err(err) => {
                    let _ = ready_tx.send(Err(err));
                    return Ok(());
                }
            };
            runtime.block_on(async move {
                let listener = match bind(addr).await {
                    Ok(listener) => listener,
                    Err(err) => {
                        let _ = ready_tx.send(Err(err));
                        return Ok(());
                    }
                };
                let bound = listener.local_addr().unwrap_or(addr);
                let _ = ready_tx.send(Ok(bound));
                serve(listener, store, async {
                    let _ = shutdown_rx.await;
                })
                .await
            })
        });

        let bound = ready_rx.recv().map_err(|_| ServerError::ThreadExited)??;
        tracing::info!(addr = %bound, "pantry server listening (background)");
        self.background = Some(Background {
            addr: bound,
            shutdown_tx,
            thread,
        });
        Ok(())
    }
}

impl ConfigServer for ZeroServer {
    fn start(&mut self, endpoint: &ServerEndpoint, blocking: bool) -> Result<(), ServerError> {
        if endpoint.use_ssl {
            return Err(ServerError::SslUnsupported);
        }
        if let Some(addr) = self.local_addr() {
            return Err(ServerError::AlreadyStarted(addr));
        }
        let addr = SocketAddr::new(endpoint.host, endpoint.port);

        if !blocking {
            return self.start_background(addr);
        }

        let runtime = build_runtime()?;
        let store = self.store.clone();
        runtime.block_on(async move {
            let listener = bind(addr).await?;
            tracing::info!(addr = %addr, "pantry server listening");
            serve(listener, store, termination_signal()).await
        })
    }

    fn stop(&mut self) -> Result<(), ServerError> {
        let Some(bg) = self.background.take() else {
            return Ok(());
        };
        let _ = bg.shutdown_tx.send(());
        let result = bg.thread.join().map_err(|_| ServerError::ThreadExited)?;
        tracing::info!(addr = %bg.addr, "pantry server stopped");
        result
    }
}

impl Drop for ZeroServer {
    fn drop(&mut self) {
        if let Err(err) = self.stop() {
            tracing::warn!(error = %err, "error stopping pantry server");
        }
    }
}

fn build_runtime() -> Result<tokio::runtime::Runtime, ServerError> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(ServerError::Runtime)
}

async fn bind(addr: SocketAddr) -> Result<TcpListener, ServerError> {
    TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })
}

async fn serve(
    listener: TcpListener,
    store: Arc<dyn DataStore>,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> Result<(), ServerError> {
    axum::serve(listener, build_router(store))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(ServerError::Serve)
}

/// Resolves on ctrl-c or SIGTERM, whichever comes first.
async fn termination_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %err, "ctrl-c handler failed");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::warn!(error = %err, "SIGTERM handler failed");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received ctrl-c, shutting down server"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down server"),
    }
}
