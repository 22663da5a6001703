//! Garmin Connect API client for authenticated requests
//!
//! Thin wrapper over `reqwest` that attaches the OAuth2 bearer token and maps
//! HTTP status codes onto [`GarminError`].

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, USER_AGENT};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::client::tokens::OAuth2Token;
use crate::error::{GarminError, Result};

/// User agent for Connect API requests
pub(crate) const API_USER_AGENT: &str = "GCM-iOS-5.7.2.1";

/// Request timeout shared by all Garmin clients
pub(crate) const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Garmin Connect API client
#[derive(Debug, Clone)]
pub struct GarminClient {
    client: Client,
    base_url: String,
}

impl GarminClient {
    /// Create a client for `connectapi.<domain>`
    pub fn new(domain: &str) -> Result<Self> {
        Self::new_with_base_url(&format!("https://connectapi.{}", domain))
    }

    /// Create a client against an arbitrary base URL (mock servers in tests)
    pub fn new_with_base_url(base_url: &str) -> Result<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn build_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn build_headers(&self, token: &OAuth2Token) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(API_USER_AGENT));
        let bearer = HeaderValue::from_str(&token.authorization_header())
            .map_err(|_| GarminError::auth("access token is not a valid header value"))?;
        headers.insert(AUTHORIZATION, bearer);
        Ok(headers)
    }

    /// Authenticated GET with query parameters
    pub async fn get(
        &self,
        token: &OAuth2Token,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Response> {
        let url = self.build_url(path);
        tracing::trace!(%url, ?query, "GET");

        let response = self
            .client
            .get(&url)
            .headers(self.build_headers(token)?)
            .query(query)
            .send()
            .await?;

        handle_response_status(response).await
    }

    /// Authenticated GET, deserializing the JSON body
    pub async fn get_json<T: DeserializeOwned>(&self, token: &OAuth2Token, path: &str) -> Result<T> {
        self.get_json_with_query(token, path, &[]).await
    }

    /// Authenticated GET with query parameters, deserializing the JSON body
    pub async fn get_json_with_query<T: DeserializeOwned>(
        &self,
        token: &OAuth2Token,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let response = self.get(token, path, query).await?;
        if response.status() == StatusCode::NO_CONTENT {
            return serde_json::from_str("null").map_err(|e| {
                GarminError::invalid_response(format!("Empty response for {}: {}", path, e))
            });
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| {
            GarminError::invalid_response(format!("Failed to parse JSON from {}: {}", path, e))
        })
    }
}

/// Map non-success status codes to errors
async fn handle_response_status(response: Response) -> Result<Response> {
    let status = response.status();

    if status.is_success() {
        return Ok(response);
    }

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(GarminError::NotAuthenticated),
        StatusCode::TOO_MANY_REQUESTS => Err(GarminError::RateLimited),
        _ => {
            let body = response.text().await.unwrap_or_default();
            Err(GarminError::Api {
                status: status.as_u16(),
                message: body.chars().take(200).collect(),
            })
        }
    }
}
