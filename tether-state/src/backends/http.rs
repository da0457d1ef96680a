//! HTTP backend: named states stored as documents under one base address
//!
//! Layout on the server, for base address `A` and state `N`:
//!
//! - `GET A` lists the stored documents
//! - `A/N.state` holds the document
//! - `A/N.lock` is the lock resource (under the lock/unlock addresses when
//!   those are configured separately)

use std::sync::Arc;

use async_trait::async_trait;
use log::debug;

use crate::backend::{BackendConfig, BackendError, BackendResult, RemoteClient, StateBackend};
use crate::catalog::{check_deletable, parse_listing};
use crate::client::HttpClient;
use crate::config::HttpBackendConfig;
use crate::transport::build_client;

/// HTTP-based state backend
///
/// Cheap to clone; clones share one connection pool.
#[derive(Clone)]
pub struct HttpBackend {
    config: Arc<HttpBackendConfig>,
    http: reqwest::Client,
}

impl HttpBackend {
    /// Create a backend, building the transport from the configuration
    pub fn new(config: HttpBackendConfig) -> BackendResult<Self> {
        let http = build_client(&config)?;
        Ok(Self::with_client(config, http))
    }

    /// Create a backend around an already configured HTTP client
    pub fn with_client(config: HttpBackendConfig, http: reqwest::Client) -> Self {
        Self {
            config: Arc::new(config),
            http,
        }
    }

    /// Create a new HttpBackend from configuration
    pub fn from_config(config: &BackendConfig) -> BackendResult<Self> {
        Self::new(HttpBackendConfig::from_config(config)?)
    }

    pub fn config(&self) -> &HttpBackendConfig {
        &self.config
    }

    /// Build a client scoped to one named state
    pub fn remote_client(&self, name: &str) -> BackendResult<HttpClient> {
        if name.is_empty() {
            return Err(BackendError::invalid_name("missing state name"));
        }
        Ok(HttpClient::new(
            self.http.clone(),
            Arc::clone(&self.config),
            name,
        ))
    }
}

#[async_trait]
impl StateBackend for HttpBackend {
    async fn list_states(&self) -> BackendResult<Vec<String>> {
        let client = HttpClient::for_address(self.http.clone(), Arc::clone(&self.config));
        let body = client
            .get()
            .await?
            .map(|listing| String::from_utf8_lossy(listing.as_bytes()).into_owned())
            .unwrap_or_default();

        let names = parse_listing(&body);
        debug!("listed {} states at {}", names.len(), self.config.address);
        Ok(names)
    }

    async fn delete_state(&self, name: &str) -> BackendResult<()> {
        check_deletable(name)?;
        self.remote_client(name)?.delete().await
    }

    fn client(&self, name: &str) -> BackendResult<Box<dyn RemoteClient>> {
        Ok(Box::new(self.remote_client(name)?))
    }
}
