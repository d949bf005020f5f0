//! HTTP client for the remote collaborative service.
//!
//! Implements [`engine::RemoteService`] over reqwest. Status codes map onto
//! [`engine::RemoteError`]: the engine treats anything except an invalid
//! collaboration code as a recoverable sync failure.

use api_types::{
    budget::{BudgetPush, BudgetPushOutcome},
    collaboration::{BudgetSnapshot, JoinRequest, ShareRequest, ShareResponse},
    entry::{EntryPull, EntryPush, EntryPushOutcome},
};
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tracing::debug;
use uuid::Uuid;

use engine::{RemoteError, RemoteService};

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug, Clone)]
pub struct Client {
    base_url: Url,
    http: reqwest::Client,
    username: String,
    password: String,
}

impl Client {
    pub fn new(base_url: &str, username: &str, password: &str) -> Result<Self, RemoteError> {
        let base_url = Url::parse(base_url)
            .map_err(|err| RemoteError::Server(format!("invalid base_url: {err}")))?;
        Ok(Self {
            base_url,
            http: reqwest::Client::new(),
            username: username.to_string(),
            password: password.to_string(),
        })
    }

    async fn post<B, T>(&self, path: &str, payload: &B) -> Result<T, RemoteError>
    where
        B: Serialize,
        T: DeserializeOwned,
    {
        let endpoint = self
            .base_url
            .join(path)
            .map_err(|err| RemoteError::Server(format!("invalid base_url: {err}")))?;
        debug!(%endpoint, "remote call");

        let res = self
            .http
            .post(endpoint)
            .basic_auth(&self.username, Some(&self.password))
            .json(payload)
            .send()
            .await
            .map_err(|err| RemoteError::Transport(err.to_string()))?;

        if res.status().is_success() {
            return res
                .json::<T>()
                .await
                .map_err(|err| RemoteError::Transport(err.to_string()));
        }

        let status = res.status();
        let body = res
            .json::<ErrorResponse>()
            .await
            .map(|err| err.error)
            .unwrap_or_else(|_| "unknown error".to_string());

        let err = match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => RemoteError::Unauthorized,
            StatusCode::NOT_FOUND | StatusCode::GONE => RemoteError::InvalidCode,
            _ => RemoteError::Server(body),
        };
        Err(err)
    }
}

impl RemoteService for Client {
    async fn push_budget(&self, push: BudgetPush) -> Result<BudgetPushOutcome, RemoteError> {
        self.post("budgets/push", &push).await
    }

    async fn push_entry(&self, push: EntryPush) -> Result<EntryPushOutcome, RemoteError> {
        self.post("entries/push", &push).await
    }

    async fn pull_entries(
        &self,
        budget: Uuid,
    ) -> Result<Vec<api_types::entry::EntryView>, RemoteError> {
        self.post("entries/pull", &EntryPull { budget }).await
    }

    async fn join(&self, request: JoinRequest) -> Result<BudgetSnapshot, RemoteError> {
        self.post("collaboration/join", &request).await
    }

    async fn share(&self, request: ShareRequest) -> Result<ShareResponse, RemoteError> {
        self.post("collaboration/share", &request).await
    }
}
