//! HTTP client for the Taskflow API.
//!
//! [`ApiClient`] is the network-backed [`TaskStore`] the board controller
//! persists through. Every failure is folded into [`SyncError`] so the
//! engine can decide between resync and snapshot restore.

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::api::types::{AuthResponse, LoginRequest, RegisterRequest, UserProfile};
use crate::board::{SyncError, TaskStore};
use crate::model::{List, ListId, ListPatch, NewList, NewTask, Task, TaskId, TaskPatch};

/// Client for one server and, once signed in, one user.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    /// `base_url` is the server root, e.g. `http://127.0.0.1:5000`.
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/api{}", self.base_url, path)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.client.request(method, self.api_url(path));
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Create an account and keep its token.
    pub async fn register(
        &mut self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<UserProfile, SyncError> {
        let body = RegisterRequest {
            name: name.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        };
        let auth: AuthResponse =
            decode(send(self.request(Method::POST, "/auth/register").json(&body)).await?)?;
        self.token = Some(auth.token);
        Ok(auth.user)
    }

    /// Sign in and keep the token.
    pub async fn login(&mut self, email: &str, password: &str) -> Result<UserProfile, SyncError> {
        let body = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        let auth: AuthResponse =
            decode(send(self.request(Method::POST, "/auth/login").json(&body)).await?)?;
        self.token = Some(auth.token);
        Ok(auth.user)
    }

    pub async fn me(&self) -> Result<UserProfile, SyncError> {
        decode(send(self.request(Method::GET, "/auth/me")).await?)
    }

    /// Forget the token. Tokens are stateless, so nothing is sent.
    pub fn logout(&mut self) {
        self.token = None;
    }

    async fn send_json<B, T>(&self, method: Method, path: &str, body: &B) -> Result<T, SyncError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        decode(send(self.request(method, path).json(body)).await?)
    }
}

/// Send and turn transport failures and non-2xx statuses into [`SyncError`].
async fn send(builder: RequestBuilder) -> Result<String, SyncError> {
    let resp = builder.send().await.map_err(|e| {
        let kind = if e.is_timeout() {
            "request timed out"
        } else if e.is_connect() {
            "connection failed"
        } else {
            "request failed"
        };
        SyncError::Network(format!("{}: {}", kind, e))
    })?;

    let status = resp.status();
    let text = resp
        .text()
        .await
        .map_err(|e| SyncError::Network(format!("failed to read response: {}", e)))?;

    if !status.is_success() {
        tracing::debug!("API returned {}: {}", status, text);
        return Err(SyncError::from_status(status.as_u16(), text));
    }
    Ok(text)
}

fn decode<T: DeserializeOwned>(text: String) -> Result<T, SyncError> {
    serde_json::from_str(&text).map_err(|e| SyncError::Decode(e.to_string()))
}

#[async_trait]
impl TaskStore for ApiClient {
    async fn fetch_lists(&self) -> Result<Vec<List>, SyncError> {
        decode(send(self.request(Method::GET, "/lists")).await?)
    }

    async fn create_list(&self, list: &NewList) -> Result<List, SyncError> {
        self.send_json(Method::POST, "/lists", list).await
    }

    async fn update_list(&self, id: ListId, patch: &ListPatch) -> Result<List, SyncError> {
        self.send_json(Method::PATCH, &format!("/lists/{}", id), patch)
            .await
    }

    async fn delete_list(&self, id: ListId) -> Result<(), SyncError> {
        send(self.request(Method::DELETE, &format!("/lists/{}", id))).await?;
        Ok(())
    }

    async fn create_task(&self, list_id: ListId, task: &NewTask) -> Result<Task, SyncError> {
        self.send_json(Method::POST, &format!("/lists/{}/tasks", list_id), task)
            .await
    }

    async fn update_task(&self, id: TaskId, patch: &TaskPatch) -> Result<Task, SyncError> {
        self.send_json(Method::PATCH, &format!("/tasks/{}", id), patch)
            .await
    }

    async fn delete_task(&self, id: TaskId) -> Result<(), SyncError> {
        send(self.request(Method::DELETE, &format!("/tasks/{}", id))).await?;
        Ok(())
    }
}
