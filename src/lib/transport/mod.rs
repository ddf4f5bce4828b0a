pub mod tls;

pub use tls::*;

use std::net::SocketAddr;

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;

use crate::config::ServerConfig;

#[cfg(feature = "tracing")]
use tracing::info;

/// Serves `router` on the configured address, over TLS when a certificate
/// and key are both configured.
pub async fn serve(router: Router, config: &ServerConfig) -> anyhow::Result<()> {
    let addr: SocketAddr = config
        .bind_addr
        .parse()
        .with_context(|| format!("invalid bind address {}", config.bind_addr))?;

    match config.tls_paths() {
        Some((cert, key)) => {
            let tls = configure_tls(cert.to_path_buf(), key.to_path_buf()).await?;
            #[cfg(feature = "tracing")]
            info!(addr = %addr, "HTTPS server started");
            axum_server::bind_rustls(addr, tls)
                .serve(router.into_make_service())
                .await
                .context("received error from running server")?;
        }
        None => {
            let listener = TcpListener::bind(addr)
                .await
                .with_context(|| format!("failed to listen on {addr}"))?;
            #[cfg(feature = "tracing")]
            info!(addr = %addr, "HTTP server started");
            axum::serve(listener, router)
                .await
                .context("received error from running server")?;
        }
    }
    Ok(())
}
