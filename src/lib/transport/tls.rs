use axum_server::tls_rustls::RustlsConfig;
use std::path::PathBuf;

pub async fn configure_tls(
    cert_path: PathBuf,
    key_path: PathBuf,
) -> Result<RustlsConfig, anyhow::Error> {
    // reqwest links its own provider, so rustls cannot pick one on its own.
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
    RustlsConfig::from_pem_file(&cert_path, &key_path)
        .await
        .map_err(|e| {
            anyhow::anyhow!(
                "loading TLS pair {} / {}: {e}",
                cert_path.display(),
                key_path.display()
            )
        })
}
