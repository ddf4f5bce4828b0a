use std::sync::Arc;

use todo_images::adapters::router;
use todo_images::blob::{AzureBlobStore, MemoryBlobStore};
use todo_images::config::{BlobBackend, Config};
use todo_images::core::TodoService;
use todo_images::storage::sqlite::SqliteTodoStore;
use todo_images::transport::serve;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    #[cfg(feature = "tracing")]
    {
        tracing_subscriber::fmt()
            .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()))
            .init();
    }

    let config = Config::load()?;
    let store = Arc::new(SqliteTodoStore::new(&config.database.url).await?);
    let signer = config.storage_signer()?;
    let base_uri = config.base_uri()?;

    let app = match config.azure.storage.backend {
        BlobBackend::Azure => {
            let blobs = AzureBlobStore::new(signer, config.azure.storage.endpoint.as_deref())?;
            router(TodoService::new(store, Arc::new(blobs), base_uri))
        }
        BlobBackend::Memory => {
            let blobs = MemoryBlobStore::new(signer);
            router(TodoService::new(store, Arc::new(blobs), base_uri))
        }
    };

    serve(app, &config.server).await
}
