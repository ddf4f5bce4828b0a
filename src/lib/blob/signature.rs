//! Shared access signatures for Azure blob storage.
//!
//! Two flavours are minted here. A container-scoped service SAS grants read
//! access and is appended to image links handed to browsers. An account SAS
//! grants create/write access and authorises this process's own uploads, so
//! the account key never leaves the signer.
//!
//! Both are HMAC-SHA256 over a newline-joined string-to-sign, keyed with the
//! base64-decoded account key, and valid from `now - 15min` to `now + 15min`
//! to tolerate clock skew between this host and the storage service.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use url::form_urlencoded;

use crate::core::TodoError;

type HmacSha256 = Hmac<Sha256>;

pub const SAS_VERSION: &str = "2018-11-09";
pub const SKEW_MINUTES: i64 = 15;

/// The `spr` field: which schemes a SAS may be presented over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SasProtocol {
    Https,
    HttpsAndHttp,
}

impl SasProtocol {
    /// Plain-http URLs (a local emulator) need `https,http`; anything else
    /// stays https-only.
    pub fn for_url(url: &str) -> Self {
        match url.split_once("://") {
            Some((scheme, _)) if scheme.eq_ignore_ascii_case("http") => Self::HttpsAndHttp,
            _ => Self::Https,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Https => "https",
            Self::HttpsAndHttp => "https,http",
        }
    }
}

#[derive(Clone)]
pub struct SharedKeySigner {
    account_name: String,
    key: Vec<u8>,
}

impl std::fmt::Debug for SharedKeySigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedKeySigner")
            .field("account_name", &self.account_name)
            .finish_non_exhaustive()
    }
}

impl SharedKeySigner {
    pub fn new(account_name: impl Into<String>, account_key: &str) -> Result<Self, TodoError> {
        let key = STANDARD
            .decode(account_key.trim())
            .map_err(|e| TodoError::Blob(format!("storage account key is not valid base64: {e}")))?;
        Ok(Self {
            account_name: account_name.into(),
            key,
        })
    }

    pub fn account_name(&self) -> &str {
        &self.account_name
    }

    /// Read-only service SAS over a whole container, as a query string with a
    /// leading `?`.
    pub fn container_read_sas(
        &self,
        container: &str,
        protocol: SasProtocol,
        now: DateTime<Utc>,
    ) -> String {
        let (start, expiry) = validity_window(now);
        let resource = format!("/blob/{}/{}", self.account_name, container);
        let string_to_sign = [
            "r",
            start.as_str(),
            expiry.as_str(),
            resource.as_str(),
            "", // signed identifier
            "", // signed ip
            protocol.as_str(),
            SAS_VERSION,
            "c",
            "", // snapshot time
            "", // rscc
            "", // rscd
            "", // rsce
            "", // rscl
            "", // rsct
        ]
        .join("\n");

        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair("sv", SAS_VERSION)
            .append_pair("sr", "c")
            .append_pair("sp", "r")
            .append_pair("st", &start)
            .append_pair("se", &expiry)
            .append_pair("spr", protocol.as_str())
            .append_pair("sig", &self.sign(&string_to_sign))
            .finish();
        format!("?{query}")
    }

    /// Account SAS allowing containers and blobs to be created and written.
    /// Returned without the leading `?` so it can be joined to other query
    /// parameters.
    pub fn account_write_sas(&self, protocol: SasProtocol, now: DateTime<Utc>) -> String {
        let (start, expiry) = validity_window(now);
        let mut string_to_sign = [
            self.account_name.as_str(),
            "cw",
            "b",
            "co",
            start.as_str(),
            expiry.as_str(),
            "", // signed ip
            protocol.as_str(),
            SAS_VERSION,
        ]
        .join("\n");
        string_to_sign.push('\n');

        form_urlencoded::Serializer::new(String::new())
            .append_pair("sv", SAS_VERSION)
            .append_pair("ss", "b")
            .append_pair("srt", "co")
            .append_pair("sp", "cw")
            .append_pair("st", &start)
            .append_pair("se", &expiry)
            .append_pair("spr", protocol.as_str())
            .append_pair("sig", &self.sign(&string_to_sign))
            .finish()
    }

    fn sign(&self, string_to_sign: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(&self.key).expect("HMAC accepts any key length");
        mac.update(string_to_sign.as_bytes());
        STANDARD.encode(mac.finalize().into_bytes())
    }
}

fn validity_window(now: DateTime<Utc>) -> (String, String) {
    let skew = Duration::minutes(SKEW_MINUTES);
    (sas_time(now - skew), sas_time(now + skew))
}

fn sas_time(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}
