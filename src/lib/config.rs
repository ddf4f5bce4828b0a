//! Application settings.
//!
//! Settings are read from a TOML file (`appsettings.toml` unless
//! `TODOS_CONFIG` names another), then from an optional per-environment
//! file next to it (`appsettings.{TODOS_ENV}.toml`), and finally overridden
//! by environment variables, a `.env` file included. The base file is
//! optional when it is the default one.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use crate::blob::{DEVELOPMENT_ACCOUNT_KEY, DEVELOPMENT_ACCOUNT_NAME, SharedKeySigner};

pub const DEFAULT_CONFIG_PATH: &str = "appsettings.toml";
pub const CONFIG_PATH_ENV: &str = "TODOS_CONFIG";
pub const ENVIRONMENT_ENV: &str = "TODOS_ENV";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub azure: AzureConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default)]
    pub tls_cert_path: Option<PathBuf>,
    #[serde(default)]
    pub tls_key_path: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            tls_cert_path: None,
            tls_key_path: None,
        }
    }
}

impl ServerConfig {
    /// Both halves of the TLS pair, or nothing.
    pub fn tls_paths(&self) -> Option<(&Path, &Path)> {
        match (&self.tls_cert_path, &self.tls_key_path) {
            (Some(cert), Some(key)) => Some((cert.as_path(), key.as_path())),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AzureConfig {
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlobBackend {
    #[default]
    Azure,
    Memory,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: BlobBackend,
    pub base_uri: Option<String>,
    pub account_name: Option<String>,
    pub key: Option<String>,
    /// Blob service endpoint override, e.g. a local emulator.
    pub endpoint: Option<String>,
}

fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_database_url() -> String {
    "sqlite://todos.db".to_string()
}

/// Where the local storage emulator serves the development account.
const DEVELOPMENT_BASE_URI: &str = "http://127.0.0.1:10000/devstoreaccount1/";

fn read_layer(path: &Path) -> Result<toml::Table> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// `appsettings.toml` + `staging` gives `appsettings.staging.toml`, in the
/// same directory.
fn environment_path(base: &Path, environment: &str) -> PathBuf {
    let stem = base
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("appsettings");
    base.with_file_name(format!("{stem}.{environment}.toml"))
}

fn merge_table(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        let value = match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge_table(existing, incoming);
                continue;
            }
            (_, value) => value,
        };
        base.insert(key, value);
    }
}

impl Config {
    /// Loads the file named by `TODOS_CONFIG` (required) or
    /// `appsettings.toml` (optional), layers the `TODOS_ENV` file over it when
    /// one exists, then applies the environment.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        let (base, required) = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => (PathBuf::from(path), true),
            Err(_) => (PathBuf::from(DEFAULT_CONFIG_PATH), false),
        };

        let mut layers = Vec::new();
        if required || base.exists() {
            layers.push(read_layer(&base)?);
        }
        if let Ok(environment) = std::env::var(ENVIRONMENT_ENV) {
            let path = environment_path(&base, &environment);
            if path.exists() {
                layers.push(read_layer(&path)?);
            }
        }

        let mut config = Self::from_layers(layers)?;
        config.apply_overrides(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_layers([read_layer(path.as_ref())?])
    }

    /// Merges TOML tables in order, later tables winning key by key, and
    /// deserializes the result.
    pub fn from_layers<I>(layers: I) -> Result<Self>
    where
        I: IntoIterator<Item = toml::Table>,
    {
        let mut merged = toml::Table::new();
        for layer in layers {
            merge_table(&mut merged, layer);
        }
        toml::Value::Table(merged)
            .try_into()
            .context("Failed to parse merged configuration")
    }

    /// Overlays values found through `lookup`, keyed by environment variable
    /// name.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("DATABASE_URL") {
            self.database.url = url;
        }
        if let Some(addr) = lookup("BIND_ADDR") {
            self.server.bind_addr = addr;
        }
        if let Some(cert) = lookup("TLS_CERT_PATH") {
            self.server.tls_cert_path = Some(cert.into());
        }
        if let Some(key) = lookup("TLS_KEY_PATH") {
            self.server.tls_key_path = Some(key.into());
        }

        let storage = &mut self.azure.storage;
        if let Some(backend) = lookup("AZURE_STORAGE_BACKEND") {
            match backend.to_ascii_lowercase().as_str() {
                "memory" => storage.backend = BlobBackend::Memory,
                "azure" => storage.backend = BlobBackend::Azure,
                other => bail!("AZURE_STORAGE_BACKEND must be azure or memory, got {other:?}"),
            }
        }
        if let Some(base_uri) = lookup("AZURE_STORAGE_BASE_URI") {
            storage.base_uri = Some(base_uri);
        }
        if let Some(account_name) = lookup("AZURE_STORAGE_ACCOUNT_NAME") {
            storage.account_name = Some(account_name);
        }
        if let Some(key) = lookup("AZURE_STORAGE_KEY") {
            storage.key = Some(key);
        }
        if let Some(endpoint) = lookup("AZURE_STORAGE_ENDPOINT") {
            storage.endpoint = Some(endpoint);
        }
        Ok(())
    }

    /// The prefix image links are composed on, always ending in `/`. Without
    /// an explicit one the blob endpoint is used, configured or implied.
    pub fn base_uri(&self) -> Result<String> {
        let storage = &self.azure.storage;
        let base_uri = match (&storage.base_uri, &storage.endpoint, storage.backend) {
            (Some(base_uri), _, _) => base_uri.clone(),
            (None, Some(endpoint), _) => endpoint.clone(),
            (None, None, BlobBackend::Memory) => DEVELOPMENT_BASE_URI.to_string(),
            (None, None, BlobBackend::Azure) => match &storage.account_name {
                Some(account) => format!("https://{account}.blob.core.windows.net/"),
                None => bail!("azure.storage.base_uri is not configured"),
            },
        };
        if base_uri.ends_with('/') {
            Ok(base_uri)
        } else {
            Ok(format!("{base_uri}/"))
        }
    }

    /// The memory backend falls back to the emulator's development account;
    /// a real account needs both its name and key.
    pub fn storage_signer(&self) -> Result<SharedKeySigner> {
        let storage = &self.azure.storage;
        let (account_name, key) = match (&storage.account_name, &storage.key, storage.backend) {
            (Some(name), Some(key), _) => (name.as_str(), key.as_str()),
            (None, None, BlobBackend::Memory) => {
                (DEVELOPMENT_ACCOUNT_NAME, DEVELOPMENT_ACCOUNT_KEY)
            }
            (None, _, _) => bail!("azure.storage.account_name is not configured"),
            (_, None, _) => bail!("azure.storage.key is not configured"),
        };
        SharedKeySigner::new(account_name, key).context("Invalid storage account key")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn empty_file_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.bind_addr, "0.0.0.0:8080");
        assert_eq!(config.database.url, "sqlite://todos.db");
        assert_eq!(config.azure.storage.backend, BlobBackend::Azure);
        assert!(config.server.tls_paths().is_none());
    }

    #[test]
    fn environment_wins_over_file() {
        let mut config: Config = toml::from_str(
            r#"
            [database]
            url = "sqlite://file.db"

            [azure.storage]
            base_uri = "https://file.example.com"
            account_name = "fileaccount"
            "#,
        )
        .unwrap();
        let env: HashMap<&str, &str> = HashMap::from([
            ("DATABASE_URL", "sqlite://env.db"),
            ("AZURE_STORAGE_ACCOUNT_NAME", "envaccount"),
            ("AZURE_STORAGE_KEY", DEVELOPMENT_ACCOUNT_KEY),
        ]);
        config
            .apply_overrides(|name| env.get(name).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.database.url, "sqlite://env.db");
        assert_eq!(config.base_uri().unwrap(), "https://file.example.com/");
        assert_eq!(config.storage_signer().unwrap().account_name(), "envaccount");
    }

    #[test]
    fn azure_backend_needs_a_key() {
        let config: Config = toml::from_str(
            r#"
            [azure.storage]
            account_name = "acct"
            "#,
        )
        .unwrap();
        assert_eq!(
            config.base_uri().unwrap(),
            "https://acct.blob.core.windows.net/"
        );
        assert!(config.storage_signer().is_err());
    }

    #[test]
    fn memory_backend_runs_without_credentials() {
        let mut config = Config::default();
        config
            .apply_overrides(|name| (name == "AZURE_STORAGE_BACKEND").then(|| "memory".to_string()))
            .unwrap();
        assert_eq!(config.azure.storage.backend, BlobBackend::Memory);
        assert_eq!(
            config.storage_signer().unwrap().account_name(),
            DEVELOPMENT_ACCOUNT_NAME
        );
        assert_eq!(config.base_uri().unwrap(), DEVELOPMENT_BASE_URI);
    }

    #[test]
    fn misspelled_backend_is_rejected() {
        let mut config = Config::default();
        let err = config
            .apply_overrides(|name| (name == "AZURE_STORAGE_BACKEND").then(|| "memroy".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("memroy"));
        assert_eq!(config.azure.storage.backend, BlobBackend::Azure);
    }

    #[test]
    fn backend_override_ignores_case() {
        let mut config = Config::default();
        config
            .apply_overrides(|name| (name == "AZURE_STORAGE_BACKEND").then(|| "Memory".to_string()))
            .unwrap();
        assert_eq!(config.azure.storage.backend, BlobBackend::Memory);
    }

    #[test]
    fn links_follow_an_overridden_endpoint() {
        let mut config: Config = toml::from_str(
            r#"
            [azure.storage]
            account_name = "acct"
            "#,
        )
        .unwrap();
        config
            .apply_overrides(|name| {
                let endpoint = "http://localhost:10000/acct";
                (name == "AZURE_STORAGE_ENDPOINT").then(|| endpoint.to_string())
            })
            .unwrap();
        assert_eq!(config.base_uri().unwrap(), "http://localhost:10000/acct/");

        config.azure.storage.base_uri = Some("https://cdn.example.com/".to_string());
        assert_eq!(config.base_uri().unwrap(), "https://cdn.example.com/");
    }

    fn layer(content: &str) -> toml::Table {
        toml::from_str(content).unwrap()
    }

    #[test]
    fn environment_file_overlays_the_base_file() {
        let base = layer(
            r#"
            [server]
            bind_addr = "0.0.0.0:8080"

            [database]
            url = "sqlite://todos.db"

            [azure.storage]
            account_name = "prodaccount"
            base_uri = "https://prodaccount.blob.core.windows.net/"
            "#,
        );
        let development = layer(
            r#"
            [database]
            url = "sqlite://dev.db"

            [azure.storage]
            backend = "memory"
            "#,
        );

        let config = Config::from_layers([base, development]).unwrap();
        assert_eq!(config.server.bind_addr, "0.0.0.0:8080");
        assert_eq!(config.database.url, "sqlite://dev.db");
        assert_eq!(config.azure.storage.backend, BlobBackend::Memory);
        assert_eq!(
            config.azure.storage.account_name.as_deref(),
            Some("prodaccount")
        );
    }

    #[test]
    fn no_layers_is_the_default_config() {
        let config = Config::from_layers(Vec::new()).unwrap();
        assert_eq!(config.database.url, "sqlite://todos.db");
    }

    #[test]
    fn environment_file_sits_next_to_the_base_file() {
        assert_eq!(
            environment_path(Path::new("appsettings.toml"), "Development"),
            PathBuf::from("appsettings.Development.toml")
        );
        assert_eq!(
            environment_path(Path::new("/etc/todos/settings.toml"), "prod"),
            PathBuf::from("/etc/todos/settings.prod.toml")
        );
    }

    #[test]
    fn tls_requires_both_paths() {
        let mut config = Config::default();
        config
            .apply_overrides(|name| (name == "TLS_CERT_PATH").then(|| "cert.pem".to_string()))
            .unwrap();
        assert!(config.server.tls_paths().is_none());
        config
            .apply_overrides(|name| (name == "TLS_KEY_PATH").then(|| "key.pem".to_string()))
            .unwrap();
        assert!(config.server.tls_paths().is_some());
    }
}
