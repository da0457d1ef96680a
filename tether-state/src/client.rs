//! HTTP client for one named state

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use log::debug;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, Response, StatusCode};
use serde::Serialize;
use tokio::sync::Mutex;

use crate::backend::{BackendError, BackendResult, RemoteClient};
use crate::config::HttpBackendConfig;
use crate::lock::LockInfo;
use crate::paths::{lock_path, state_path};
use crate::state::StatePayload;

/// Unlock body for a lock this client did not acquire itself
#[derive(Serialize)]
struct UnlockRecord<'a> {
    #[serde(rename = "ID")]
    id: &'a str,
}

/// Client for the state document and lock resource of one named state
pub struct HttpClient {
    http: reqwest::Client,
    config: Arc<HttpBackendConfig>,
    state_url: String,
    lock_url: String,
    unlock_url: String,
    /// Lock info sent with each successful lock, by lock ID, replayed on unlock
    held_locks: Mutex<HashMap<String, LockInfo>>,
}

impl HttpClient {
    /// Client scoped to the named state `name`
    pub fn new(http: reqwest::Client, config: Arc<HttpBackendConfig>, name: &str) -> Self {
        Self {
            state_url: state_path(&config.address, name),
            lock_url: lock_path(&config.lock_address, name),
            unlock_url: lock_path(&config.unlock_address, name),
            held_locks: Mutex::new(HashMap::new()),
            http,
            config,
        }
    }

    /// Client whose document URL is the bare base address, used for listings
    pub fn for_address(http: reqwest::Client, config: Arc<HttpBackendConfig>) -> Self {
        Self {
            state_url: config.address.clone(),
            lock_url: config.lock_address.clone(),
            unlock_url: config.unlock_address.clone(),
            held_locks: Mutex::new(HashMap::new()),
            http,
            config,
        }
    }

    pub fn state_url(&self) -> &str {
        &self.state_url
    }

    pub fn lock_url(&self) -> &str {
        &self.lock_url
    }

    pub fn unlock_url(&self) -> &str {
        &self.unlock_url
    }

    async fn send(
        &self,
        operation: &'static str,
        method: Method,
        url: &str,
        body: Option<Vec<u8>>,
    ) -> BackendResult<Response> {
        let mut request = self.http.request(method.clone(), url);
        if let Some(credentials) = &self.config.credentials {
            request = request.basic_auth(&credentials.username, credentials.password.as_ref());
        }
        if let Some(body) = body {
            request = request.header(CONTENT_TYPE, "application/json").body(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| BackendError::transport(operation, url, e))?;
        debug!("{} {} -> {}", method, url, response.status());
        Ok(response)
    }

    async fn read_body(
        operation: &'static str,
        url: &str,
        response: Response,
    ) -> BackendResult<Vec<u8>> {
        let bytes = response
            .bytes()
            .await
            .map_err(|e| BackendError::transport(operation, url, e))?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl RemoteClient for HttpClient {
    async fn get(&self) -> BackendResult<Option<StatePayload>> {
        let url = &self.state_url;
        let response = self.send("read", Method::GET, url, None).await?;

        match response.status() {
            StatusCode::OK => {
                let data = Self::read_body("read", url, response).await?;
                if data.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(StatePayload::new(data)))
                }
            }
            StatusCode::NO_CONTENT | StatusCode::NOT_FOUND => Ok(None),
            status => Err(BackendError::unexpected_status("read", url, status.as_u16())),
        }
    }

    async fn put(&self, data: &[u8]) -> BackendResult<()> {
        let url = &self.state_url;
        let method = self.config.methods.update.clone();
        let response = self.send("write", method, url, Some(data.to_vec())).await?;

        match response.status() {
            StatusCode::OK | StatusCode::CREATED | StatusCode::NO_CONTENT => Ok(()),
            status => Err(BackendError::unexpected_status("write", url, status.as_u16())),
        }
    }

    async fn delete(&self) -> BackendResult<()> {
        let url = &self.state_url;
        let response = self.send("delete", Method::DELETE, url, None).await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(BackendError::unexpected_status("delete", url, status.as_u16()))
        }
    }

    async fn lock(&self, info: &LockInfo) -> BackendResult<String> {
        let url = &self.lock_url;
        let mut info = info.clone();
        if info.path.is_empty() {
            info.path = self.state_url.clone();
        }
        let body = serde_json::to_vec(&info)
            .map_err(|e| BackendError::Serialization(format!("Failed to serialize lock: {}", e)))?;

        let method = self.config.methods.lock.clone();
        let response = self.send("lock", method, url, Some(body)).await?;

        match response.status() {
            StatusCode::OK => {
                let lock_id = info.id.clone();
                self.held_locks.lock().await.insert(lock_id.clone(), info);
                Ok(lock_id)
            }
            StatusCode::CONFLICT | StatusCode::LOCKED => {
                let body = Self::read_body("lock", url, response).await?;
                let holder = serde_json::from_slice::<LockInfo>(&body).ok();
                Err(BackendError::locked(url.as_str(), holder))
            }
            status => Err(BackendError::unexpected_status("lock", url, status.as_u16())),
        }
    }

    async fn unlock(&self, lock_id: &str) -> BackendResult<()> {
        let url = &self.unlock_url;
        let held = self.held_locks.lock().await.get(lock_id).cloned();

        let body = match &held {
            Some(info) => serde_json::to_vec(info),
            None => serde_json::to_vec(&UnlockRecord { id: lock_id }),
        }
        .map_err(|e| BackendError::Serialization(format!("Failed to serialize lock: {}", e)))?;

        let method = self.config.methods.unlock.clone();
        let response = self.send("unlock", method, url, Some(body)).await?;

        match response.status() {
            StatusCode::OK | StatusCode::NO_CONTENT => {
                self.held_locks.lock().await.remove(lock_id);
                Ok(())
            }
            StatusCode::CONFLICT | StatusCode::LOCKED => {
                let body = Self::read_body("unlock", url, response).await?;
                let held = serde_json::from_slice::<LockInfo>(&body)
                    .ok()
                    .map(|info| info.id)
                    .filter(|id| !id.is_empty());
                Err(BackendError::LockMismatch {
                    url: url.clone(),
                    lock_id: lock_id.to_string(),
                    held,
                })
            }
            status => Err(BackendError::unexpected_status("unlock", url, status.as_u16())),
        }
    }
}
