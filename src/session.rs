//! Login and session verification against the remote backend

use crate::{
    constants::{keys, SESSION_TIMEOUT_SECS, USER_AGENT},
    error::RequestError,
    sources::remote::{check_error, send},
    store::KeyValueStore,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

const LOGIN_ENDPOINT: &str = "accounts/login.php";

/// Credentials for the remote backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Normalized API base URL, always ending in `/`
    pub api: String,
    pub token: String,
    pub username: String,
}

impl Session {
    /// Loads the stored session, if all of its keys are present
    pub async fn load(store: &dyn KeyValueStore) -> Result<Option<Self>, RequestError> {
        let api = store.get_non_empty(keys::API).await?;
        let token = store.get_non_empty(keys::TOKEN).await?;
        let username = store.get_non_empty(keys::USERNAME).await?;

        Ok(match (api, token, username) {
            (Some(api), Some(token), Some(username)) => Some(Self {
                api,
                token,
                username,
            }),
            _ => None,
        })
    }

    /// Persists the session so later launches can reuse it
    pub async fn persist(&self, store: &dyn KeyValueStore) -> Result<(), RequestError> {
        store.set(keys::API, &self.api).await?;
        store.set(keys::TOKEN, &self.token).await?;
        store.set(keys::USERNAME, &self.username).await?;
        Ok(())
    }
}

/// Prefixes `http://` when no scheme is given and ensures a trailing slash
pub fn normalize_api_url(url: &str) -> String {
    let mut url = url.trim().to_string();
    if !url.contains("http://") && !url.contains("https://") {
        url = format!("http://{}", url);
    }
    if !url.ends_with('/') {
        url.push('/');
    }
    url
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    #[serde(default)]
    valid: bool,
    token: Option<String>,
    username: Option<String>,
}

/// Client for the backend's account endpoints
pub struct SessionClient {
    client: Client,
}

impl SessionClient {
    pub fn new() -> Result<Self, RequestError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(RequestError::NetworkError)?;
        Ok(Self { client })
    }

    /// Logs in and returns a session for the normalized API URL
    pub async fn login(&self, url: &str, username: &str, password: &str) -> Result<Session, RequestError> {
        if [url, username, password].iter().any(|field| field.trim().is_empty()) {
            return Err(RequestError::validation("All fields must be filled out."));
        }

        let api = normalize_api_url(url);
        let request = self
            .client
            .post(format!("{}{}", api, LOGIN_ENDPOINT))
            .query(&[("platform", "app")])
            .json(&json!({ "username": username, "password": password }));

        let response = check_error(send(request, SESSION_TIMEOUT_SECS).await?)?;
        let session = Self::parse_login(response, api)?;

        tracing::info!(username = %session.username, api = %session.api, "Logged in");
        Ok(session)
    }

    /// Verifies a stored session; an invalid token is removed from `store`
    pub async fn verify(&self, store: &dyn KeyValueStore) -> Result<(), RequestError> {
        let token = store.get_non_empty(keys::TOKEN).await?;
        let Some(token) = token else {
            return Err(RequestError::validation("Token not found."));
        };
        let api = store.get(keys::API).await?.unwrap_or_default();
        let username = store.get(keys::USERNAME).await?.unwrap_or_default();

        let request = self
            .client
            .post(format!("{}{}", normalize_api_url(&api), LOGIN_ENDPOINT))
            .query(&[("platform", "app")])
            .json(&json!({ "token": token, "username": username }));

        let response = send(request, SESSION_TIMEOUT_SECS).await?;
        if response.get("valid").and_then(Value::as_bool) == Some(true) {
            return Ok(());
        }

        tracing::warn!(username = %username, "Stored session is no longer valid");
        store.remove(keys::TOKEN).await?;
        Err(RequestError::api("Invalid token."))
    }

    fn parse_login(response: Value, api: String) -> Result<Session, RequestError> {
        let login: LoginResponse = serde_json::from_value(response)
            .map_err(|e| RequestError::invalid_response(format!("Malformed login response: {}", e)))?;

        match (login.valid, login.token, login.username) {
            (true, Some(token), Some(username)) => Ok(Session {
                api,
                token,
                username,
            }),
            _ => Err(RequestError::api("Login failed.")),
        }
    }
}
