use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use tokio::sync::Mutex;

use crate::blob::signature::SasProtocol;
use crate::blob::{BlobStore, IMAGE_CONTAINER, SharedKeySigner, compose_read_url};
use crate::core::TodoError;

/// Keeps blobs in process memory. Links it hands out are signed exactly as
/// the Azure store signs them, but nothing serves them.
pub struct MemoryBlobStore {
    signer: SharedKeySigner,
    container: Mutex<Option<HashMap<String, Bytes>>>,
}

impl MemoryBlobStore {
    pub fn new(signer: SharedKeySigner) -> Self {
        Self {
            signer,
            container: Mutex::new(None),
        }
    }

    pub async fn contains(&self, blob_id: &str) -> bool {
        self.get(blob_id).await.is_some()
    }

    pub async fn get(&self, blob_id: &str) -> Option<Bytes> {
        self.container
            .lock()
            .await
            .as_ref()
            .and_then(|blobs| blobs.get(blob_id).cloned())
    }

    pub async fn len(&self) -> usize {
        self.container.lock().await.as_ref().map_or(0, HashMap::len)
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn ensure_container(&self) -> Result<(), TodoError> {
        self.container.lock().await.get_or_insert_with(HashMap::new);
        Ok(())
    }

    async fn upload(&self, blob_id: &str, bytes: Bytes) -> Result<(), TodoError> {
        match self.container.lock().await.as_mut() {
            Some(blobs) => {
                blobs.insert(blob_id.to_string(), bytes);
                Ok(())
            }
            None => Err(TodoError::Blob(format!(
                "container {IMAGE_CONTAINER} does not exist"
            ))),
        }
    }

    fn signed_read_url(&self, blob_id: &str, base_uri: &str) -> String {
        let protocol = SasProtocol::for_url(base_uri);
        let signature = self
            .signer
            .container_read_sas(IMAGE_CONTAINER, protocol, Utc::now());
        compose_read_url(base_uri, blob_id, &signature)
    }
}
