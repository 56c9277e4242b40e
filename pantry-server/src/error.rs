//! Error types for pantry-server.

use std::net::SocketAddr;

use thiserror::Error;

/// Everything that can stop the embedded server from serving.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to build async runtime: {0}")]
    Runtime(#[source] std::io::Error),

    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),

    #[error("SSL is not supported by the built-in server")]
    SslUnsupported,

    #[error("server is already started on {0}")]
    AlreadyStarted(SocketAddr),

    #[error("server thread exited unexpectedly")]
    ThreadExited,
}
