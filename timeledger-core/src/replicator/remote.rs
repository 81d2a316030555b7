use async_trait::async_trait;
use reqwest::StatusCode;
use thiserror::Error;
use uuid::Uuid;

use crate::replicator::types::WorkspaceDocument;

/// Errors a remote store can fail with.
#[derive(Debug, Error)]
pub enum RemoteStoreError {
    /// The request never completed (connect, timeout, body errors)
    #[error("remote sync request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The remote answered with a non-success status
    #[error("remote sync rejected the document: {0}")]
    Rejected(StatusCode),
}

/// Where workspace documents get pushed.
///
/// The replicator only ever overwrites whole documents, so one method is the
/// entire protocol.
#[async_trait]
pub trait RemoteStore: Send + Sync + 'static {
    async fn store_workspace(&self, document: &WorkspaceDocument) -> Result<(), RemoteStoreError>;
}

/// HTTP implementation storing each workspace under
/// `{base_url}/workspaces/{user_id}`.
#[derive(Clone)]
pub struct HttpRemoteStore {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpRemoteStore {
    pub fn new(http: reqwest::Client, base_url: String, token: Option<String>) -> Self {
        HttpRemoteStore {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    fn workspace_url(&self, user_id: Uuid) -> String {
        format!("{}/workspaces/{}", self.base_url, user_id)
    }
}

#[async_trait]
impl RemoteStore for HttpRemoteStore {
    async fn store_workspace(&self, document: &WorkspaceDocument) -> Result<(), RemoteStoreError> {
        let mut request = self
            .http
            .put(self.workspace_url(document.user_id))
            .json(document);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(RemoteStoreError::Rejected(response.status()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workspace_urls_tolerate_trailing_slashes() {
        let store = HttpRemoteStore::new(
            reqwest::Client::new(),
            "https://sync.example.com/".to_string(),
            None,
        );
        let user = Uuid::nil();
        assert_eq!(
            store.workspace_url(user),
            format!("https://sync.example.com/workspaces/{user}")
        );
    }
}
