use crate::models::{Bill, JoinRequest, JoinResponse, Tab, TabImage, TabMember, TabSettlement};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::env;
use std::fmt;
use tracing::warn;

pub fn resolve_api_base_url() -> String {
    env::var("API_BASE_URL").unwrap_or_else(|_| "http://localhost:8080".to_string())
}

/// Outcome of a single request to the backend. `Transient` covers anything
/// worth retrying: connection failures, non-2xx statuses other than 403/404,
/// and undecodable bodies.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiError {
    InvalidToken,
    NotFound,
    Transient(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::InvalidToken => write!(f, "invalid access token"),
            ApiError::NotFound => write!(f, "resource not found"),
            ApiError::Transient(reason) => write!(f, "{reason}"),
        }
    }
}

/// Thin client for the bill backend. Every call carries the access token as
/// the `t` query parameter; the backend does all validation.
#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    http: reqwest::Client,
}

impl ApiClient {
    pub fn new(base_url: String) -> Self {
        Self {
            base_url,
            http: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn get_bill(&self, id: i64, token: &str) -> Result<Bill, ApiError> {
        self.get_resource(format!("{}/api/bills/{id}", self.base_url), token)
            .await
    }

    pub async fn get_tab(&self, id: i64, token: &str) -> Result<Tab, ApiError> {
        self.get_resource(format!("{}/api/tabs/{id}", self.base_url), token)
            .await
    }

    pub async fn get_tab_images(&self, id: i64, token: &str) -> Vec<TabImage> {
        self.get_list(format!("{}/api/tabs/{id}/images", self.base_url), token)
            .await
    }

    pub async fn get_settlements(&self, id: i64, token: &str) -> Vec<TabSettlement> {
        self.get_list(format!("{}/api/tabs/{id}/settlements", self.base_url), token)
            .await
    }

    pub async fn get_tab_members(&self, id: i64, token: &str) -> Vec<TabMember> {
        self.get_list(format!("{}/api/tabs/{id}/members", self.base_url), token)
            .await
    }

    /// Joins a tab under the given display name. Any failure collapses to
    /// `None`; the caller surfaces it as an inline form error.
    pub async fn join_tab(&self, id: i64, token: &str, display_name: &str) -> Option<JoinResponse> {
        let url = format!("{}/api/tabs/{id}/join", self.base_url);
        let body = JoinRequest {
            display_name: display_name.to_string(),
        };
        let response = match self
            .http
            .post(&url)
            .query(&[("t", token)])
            .json(&body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => {
                warn!("join request to {url} failed: {err}");
                return None;
            }
        };
        if !response.status().is_success() {
            warn!("join request to {url} returned {}", response.status());
            return None;
        }
        match response.json().await {
            Ok(joined) => Some(joined),
            Err(err) => {
                warn!("undecodable join response from {url}: {err}");
                None
            }
        }
    }

    /// One attempt at a primary resource. 403 and 404 are terminal; anything
    /// else unexpected is reported as transient so the caller may retry.
    async fn get_resource<T: DeserializeOwned>(&self, url: String, token: &str) -> Result<T, ApiError> {
        let response = self
            .http
            .get(&url)
            .query(&[("t", token)])
            .send()
            .await
            .map_err(|err| ApiError::Transient(err.to_string()))?;

        match response.status() {
            StatusCode::FORBIDDEN => Err(ApiError::InvalidToken),
            StatusCode::NOT_FOUND => Err(ApiError::NotFound),
            status if !status.is_success() => {
                Err(ApiError::Transient(format!("server error: {status}")))
            }
            _ => response
                .json()
                .await
                .map_err(|err| ApiError::Transient(err.to_string())),
        }
    }

    /// Secondary data degrades silently: any failure yields an empty list and
    /// never blocks the primary render.
    async fn get_list<T: DeserializeOwned>(&self, url: String, token: &str) -> Vec<T> {
        let response = match self.http.get(&url).query(&[("t", token)]).send().await {
            Ok(response) => response,
            Err(err) => {
                warn!("request to {url} failed: {err}");
                return Vec::new();
            }
        };
        if !response.status().is_success() {
            warn!("request to {url} returned {}", response.status());
            return Vec::new();
        }
        match response.json().await {
            Ok(list) => list,
            Err(err) => {
                warn!("undecodable response from {url}: {err}");
                Vec::new()
            }
        }
    }
}
