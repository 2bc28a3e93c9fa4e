//! Best-effort server API.
//!
//! Every endpoint answers `{"success": bool, ...}`. Callers treat any failure
//! (transport error, non-2xx, `success: false`) as "server unavailable" and fall
//! back to local data.

use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};

use crate::error::{DataError, DataResult};
use kopilka_core::{EntityId, User, UserData};

/// `{success, message?, ...body}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(flatten)]
    pub body: T,
}

impl<T> ApiResponse<T> {
    /// The body when `success` is true, otherwise a network error carrying the
    /// server's message.
    pub fn into_result(self) -> DataResult<T> {
        if self.success {
            Ok(self.body)
        } else {
            Err(DataError::Network(
                self.message.unwrap_or_else(|| "server reported failure".to_string()),
            ))
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserBody {
    #[serde(default)]
    pub user: Option<User>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Empty {}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

/// The four endpoints the app talks to.
pub trait RemoteApi {
    /// `POST /api/login`
    fn login(&self, email: &str, password: &str) -> impl Future<Output = DataResult<User>> + Send;
    /// `POST /api/register`
    fn register(&self, user: &User) -> impl Future<Output = DataResult<User>> + Send;
    /// `GET /api/user/:id/data`
    fn fetch_user_data(&self, user_id: &EntityId) -> impl Future<Output = DataResult<UserData>> + Send;
    /// `POST /api/user/:id/data`
    fn push_user_data(&self, user_id: &EntityId, data: &UserData) -> impl Future<Output = DataResult<()>> + Send;
}

/// No server configured: every call fails fast.
#[derive(Debug, Clone, Copy, Default)]
pub struct Offline;

impl RemoteApi for Offline {
    async fn login(&self, _email: &str, _password: &str) -> DataResult<User> {
        Err(offline())
    }

    async fn register(&self, _user: &User) -> DataResult<User> {
        Err(offline())
    }

    async fn fetch_user_data(&self, _user_id: &EntityId) -> DataResult<UserData> {
        Err(offline())
    }

    async fn push_user_data(&self, _user_id: &EntityId, _data: &UserData) -> DataResult<()> {
        Err(offline())
    }
}

fn offline() -> DataError {
    DataError::Network("no server configured".to_string())
}

/// reqwest-backed client for a server rooted at `base_url`.
#[derive(Debug, Clone)]
pub struct HttpRemote {
    base_url: String,
    client: reqwest::Client,
}

impl HttpRemote {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers
    }

    async fn post<B: Serialize + ?Sized, T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &B,
    ) -> DataResult<ApiResponse<T>> {
        let resp = self
            .client
            .post(self.url(path))
            .headers(Self::headers())
            .json(body)
            .send()
            .await?;
        Self::decode(path, resp).await
    }

    async fn decode<T: for<'de> Deserialize<'de>>(
        path: &str,
        resp: reqwest::Response,
    ) -> DataResult<ApiResponse<T>> {
        let status = resp.status();
        if !status.is_success() {
            let txt = resp.text().await.unwrap_or_default();
            return Err(DataError::Network(format!("{path}: {status} {txt}")));
        }
        Ok(resp.json().await?)
    }

    fn missing_user(path: &str) -> DataError {
        DataError::Network(format!("{path}: response has no user"))
    }
}

impl RemoteApi for HttpRemote {
    async fn login(&self, email: &str, password: &str) -> DataResult<User> {
        let resp: ApiResponse<UserBody> = self.post("/api/login", &LoginRequest { email, password }).await?;
        resp.into_result()?
            .user
            .ok_or_else(|| Self::missing_user("/api/login"))
    }

    async fn register(&self, user: &User) -> DataResult<User> {
        let resp: ApiResponse<UserBody> = self.post("/api/register", user).await?;
        resp.into_result()?
            .user
            .ok_or_else(|| Self::missing_user("/api/register"))
    }

    async fn fetch_user_data(&self, user_id: &EntityId) -> DataResult<UserData> {
        let path = format!("/api/user/{user_id}/data");
        let resp = self.client.get(self.url(&path)).send().await?;
        Self::decode::<UserData>(&path, resp).await?.into_result()
    }

    async fn push_user_data(&self, user_id: &EntityId, data: &UserData) -> DataResult<()> {
        let path = format!("/api/user/{user_id}/data");
        let resp: ApiResponse<Empty> = self.post(&path, data).await?;
        resp.into_result().map(|_| ())
    }
}

/// The remote picked at startup: a configured server, or none.
#[derive(Debug, Clone)]
pub enum Remote {
    Http(HttpRemote),
    Offline(Offline),
}

impl Remote {
    pub fn from_base_url(base_url: Option<&str>) -> Self {
        match base_url.map(str::trim).filter(|u| !u.is_empty()) {
            Some(url) => Remote::Http(HttpRemote::new(url)),
            None => Remote::Offline(Offline),
        }
    }

    pub fn is_configured(&self) -> bool {
        matches!(self, Remote::Http(_))
    }
}

impl RemoteApi for Remote {
    async fn login(&self, email: &str, password: &str) -> DataResult<User> {
        match self {
            Remote::Http(r) => r.login(email, password).await,
            Remote::Offline(r) => r.login(email, password).await,
        }
    }

    async fn register(&self, user: &User) -> DataResult<User> {
        match self {
            Remote::Http(r) => r.register(user).await,
            Remote::Offline(r) => r.register(user).await,
        }
    }

    async fn fetch_user_data(&self, user_id: &EntityId) -> DataResult<UserData> {
        match self {
            Remote::Http(r) => r.fetch_user_data(user_id).await,
            Remote::Offline(r) => r.fetch_user_data(user_id).await,
        }
    }

    async fn push_user_data(&self, user_id: &EntityId, data: &UserData) -> DataResult<()> {
        match self {
            Remote::Http(r) => r.push_user_data(user_id, data).await,
            Remote::Offline(r) => r.push_user_data(user_id, data).await,
        }
    }
}
