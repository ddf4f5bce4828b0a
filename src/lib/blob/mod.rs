pub mod azure;
pub mod memory;
pub mod signature;

pub use azure::AzureBlobStore;
pub use memory::MemoryBlobStore;
pub use signature::{SasProtocol, SharedKeySigner};

use async_trait::async_trait;
use bytes::Bytes;

use crate::core::TodoError;

/// Container every todo image lives in.
pub const IMAGE_CONTAINER: &str = "images";

/// The storage emulator's well-known development account.
pub const DEVELOPMENT_ACCOUNT_NAME: &str = "devstoreaccount1";
pub const DEVELOPMENT_ACCOUNT_KEY: &str =
    "Eby8vdM02xNOcqFlqUwJPLlmEtlCDXJ1OUzFT50uSRZ6IFsuFq2UVErCz4I6tq/K1SZFPTOtr/KBHBeksoGMGw==";

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Creates the image container unless it already exists.
    async fn ensure_container(&self) -> Result<(), TodoError>;
    /// Writes `bytes` to `blob_id`, replacing any previous content.
    async fn upload(&self, blob_id: &str, bytes: Bytes) -> Result<(), TodoError>;
    /// `base_uri + "images/" + blob_id + "?<read signature>"`, minted fresh on
    /// every call.
    fn signed_read_url(&self, blob_id: &str, base_uri: &str) -> String;
}

pub(crate) fn compose_read_url(base_uri: &str, blob_id: &str, signature: &str) -> String {
    format!("{base_uri}{IMAGE_CONTAINER}/{blob_id}{signature}")
}
