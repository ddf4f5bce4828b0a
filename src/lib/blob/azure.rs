use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use reqwest::{Client, StatusCode};
use url::Url;

use crate::blob::signature::{SAS_VERSION, SasProtocol, SharedKeySigner};
use crate::blob::{BlobStore, IMAGE_CONTAINER, compose_read_url};
use crate::core::TodoError;

#[cfg(feature = "tracing")]
use tracing::{debug, info, instrument};

/// Blob store backed by an Azure storage account, spoken to over the Blob
/// service REST API.
pub struct AzureBlobStore {
    client: Client,
    endpoint: Url,
    signer: SharedKeySigner,
}

impl AzureBlobStore {
    /// `endpoint` overrides the account's public blob endpoint, e.g. to point
    /// at a local emulator. A plain-http endpoint gets write signatures that
    /// allow http.
    pub fn new(signer: SharedKeySigner, endpoint: Option<&str>) -> Result<Self, TodoError> {
        let endpoint = match endpoint {
            Some(endpoint) if endpoint.ends_with('/') => Url::parse(endpoint)?,
            Some(endpoint) => Url::parse(&format!("{endpoint}/"))?,
            None => Url::parse(&format!(
                "https://{}.blob.core.windows.net/",
                signer.account_name()
            ))?,
        };
        Ok(Self {
            client: Client::new(),
            endpoint,
            signer,
        })
    }

    fn signed_url(&self, path: &str, extra_query: Option<&str>) -> Result<Url, TodoError> {
        let mut url = self.endpoint.join(path)?;
        let protocol = SasProtocol::for_url(self.endpoint.as_str());
        let sas = self.signer.account_write_sas(protocol, Utc::now());
        let query = match extra_query {
            Some(extra) => format!("{extra}&{sas}"),
            None => sas,
        };
        url.set_query(Some(&query));
        Ok(url)
    }
}

#[async_trait]
impl BlobStore for AzureBlobStore {
    #[cfg_attr(feature = "tracing", instrument(skip(self)))]
    async fn ensure_container(&self) -> Result<(), TodoError> {
        let url = self.signed_url(IMAGE_CONTAINER, Some("restype=container"))?;
        let response = self
            .client
            .put(url)
            .header("x-ms-version", SAS_VERSION)
            .header(reqwest::header::CONTENT_LENGTH, 0)
            .send()
            .await?;

        match response.status() {
            StatusCode::CREATED => {
                #[cfg(feature = "tracing")]
                info!(container = IMAGE_CONTAINER, "Created blob container");
                Ok(())
            }
            StatusCode::CONFLICT => {
                #[cfg(feature = "tracing")]
                debug!(container = IMAGE_CONTAINER, "Blob container already exists");
                Ok(())
            }
            status => Err(TodoError::Blob(format!(
                "creating container {IMAGE_CONTAINER} failed with {status}: {}",
                response.text().await.unwrap_or_default()
            ))),
        }
    }

    #[cfg_attr(feature = "tracing", instrument(skip(self, bytes), fields(len = bytes.len())))]
    async fn upload(&self, blob_id: &str, bytes: Bytes) -> Result<(), TodoError> {
        let url = self.signed_url(&format!("{IMAGE_CONTAINER}/{blob_id}"), None)?;
        let response = self
            .client
            .put(url)
            .header("x-ms-version", SAS_VERSION)
            .header("x-ms-blob-type", "BlockBlob")
            .body(bytes)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TodoError::Blob(format!(
                "uploading blob {blob_id} failed with {status}: {}",
                response.text().await.unwrap_or_default()
            )));
        }
        #[cfg(feature = "tracing")]
        debug!(blob_id = %blob_id, "Uploaded blob");
        Ok(())
    }

    fn signed_read_url(&self, blob_id: &str, base_uri: &str) -> String {
        let protocol = SasProtocol::for_url(base_uri);
        let signature = self
            .signer
            .container_read_sas(IMAGE_CONTAINER, protocol, Utc::now());
        compose_read_url(base_uri, blob_id, &signature)
    }
}
