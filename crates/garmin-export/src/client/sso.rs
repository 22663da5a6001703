//! Garmin SSO authentication
//!
//! Mirrors garth's login: the embedded sign-in widget yields a service ticket,
//! the ticket is traded for an OAuth1 token, and the OAuth1 token is exchanged
//! for the OAuth2 bearer token used by the Connect API.

use crate::client::api::{API_USER_AGENT, REQUEST_TIMEOUT};
use crate::client::oauth1::{parse_oauth_response, OAuth1Signer, OAuthConsumer, OAuthToken};
use crate::client::tokens::{OAuth1Token, OAuth2Token};
use crate::error::{GarminError, Result};
use regex::Regex;
use reqwest::cookie::Jar;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE, REFERER, USER_AGENT};
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;

/// Default Garmin domain
pub const DEFAULT_DOMAIN: &str = "garmin.com";

/// User agent of the Garmin mobile app, required by the OAuth service
const MOBILE_USER_AGENT: &str = "com.garmin.android.apps.connectmobile";

/// Where garth publishes the OAuth consumer key pair
const OAUTH_CONSUMER_URL: &str = "https://thegarth.s3.amazonaws.com/oauth_consumer.json";

#[derive(Debug, Deserialize)]
struct OAuthConsumerResponse {
    consumer_key: String,
    consumer_secret: String,
}

impl From<OAuthConsumerResponse> for OAuthConsumer {
    fn from(value: OAuthConsumerResponse) -> Self {
        OAuthConsumer {
            key: value.consumer_key,
            secret: value.consumer_secret,
        }
    }
}

/// Hosts involved in a login. Tests point all three at one mock server.
#[derive(Debug, Clone)]
pub struct SsoEndpoints {
    pub domain: String,
    /// e.g. `https://sso.garmin.com/sso`
    pub sso_base: String,
    /// e.g. `https://connectapi.garmin.com`
    pub connectapi_base: String,
    pub consumer_url: String,
}

impl SsoEndpoints {
    pub fn for_domain(domain: &str) -> Self {
        Self {
            domain: domain.to_string(),
            sso_base: format!("https://sso.{}/sso", domain),
            connectapi_base: format!("https://connectapi.{}", domain),
            consumer_url: OAUTH_CONSUMER_URL.to_string(),
        }
    }

    /// Serve every endpoint from `base_url`, keeping the SSO paths
    pub fn with_base_url(base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        Self {
            domain: DEFAULT_DOMAIN.to_string(),
            sso_base: format!("{}/sso", base),
            connectapi_base: base.to_string(),
            consumer_url: format!("{}/oauth_consumer.json", base),
        }
    }

    fn embed_url(&self) -> String {
        format!("{}/embed", self.sso_base)
    }

    fn signin_params(&self) -> Vec<(&'static str, String)> {
        let embed = self.embed_url();
        vec![
            ("id", "gauth-widget".to_string()),
            ("embedWidget", "true".to_string()),
            ("gauthHost", embed.clone()),
            ("service", embed.clone()),
            ("source", embed.clone()),
            ("redirectAfterAccountLoginUrl", embed.clone()),
            ("redirectAfterAccountCreationUrl", embed),
        ]
    }
}

impl Default for SsoEndpoints {
    fn default() -> Self {
        Self::for_domain(DEFAULT_DOMAIN)
    }
}

/// SSO client; holds the cookie jar for one login attempt
pub struct SsoClient {
    client: Client,
    endpoints: SsoEndpoints,
    last_url: Option<String>,
}

enum LoginResult {
    Ticket(String),
    MfaRequired,
}

impl SsoClient {
    pub fn new(endpoints: SsoEndpoints) -> Result<Self> {
        let client = Client::builder()
            .cookie_provider(Arc::new(Jar::default()))
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            endpoints,
            last_url: None,
        })
    }

    /// Run the full login. `mfa_code` is only called when Garmin asks for a
    /// one-time code.
    pub async fn login<F>(
        &mut self,
        email: &str,
        password: &str,
        mfa_code: Option<F>,
    ) -> Result<(OAuth1Token, OAuth2Token)>
    where
        F: FnOnce() -> Result<String>,
    {
        let csrf_token = self.init_session_and_get_csrf().await?;

        let ticket = match self.submit_login(email, password, &csrf_token).await? {
            LoginResult::Ticket(ticket) => ticket,
            LoginResult::MfaRequired => {
                tracing::info!("Garmin Connect requested a one-time code");
                let prompt = mfa_code.ok_or(GarminError::MfaRequired)?;
                let code = prompt()?;
                self.submit_mfa(code.trim(), &csrf_token).await?
            }
        };

        let consumer: OAuthConsumer = self.fetch_oauth_consumer().await?.into();
        let oauth1 = self.get_oauth1_token(&consumer, &ticket).await?;
        let oauth2 = exchange_oauth1_for_oauth2(&self.endpoints, &consumer, &oauth1).await?;

        Ok((oauth1, oauth2))
    }

    /// Mint a new OAuth2 token from a stored OAuth1 token
    pub async fn refresh_oauth2(&self, oauth1: &OAuth1Token) -> Result<OAuth2Token> {
        let consumer: OAuthConsumer = self.fetch_oauth_consumer().await?.into();
        exchange_oauth1_for_oauth2(&self.endpoints, &consumer, oauth1).await
    }

    async fn init_session_and_get_csrf(&mut self) -> Result<String> {
        let embed_params = [
            ("id", "gauth-widget"),
            ("embedWidget", "true"),
            ("gauthHost", self.endpoints.sso_base.as_str()),
        ];

        // Sets the session cookies; body is irrelevant
        let _ = self
            .client
            .get(self.endpoints.embed_url())
            .query(&embed_params)
            .header(USER_AGENT, API_USER_AGENT)
            .send()
            .await?
            .text()
            .await;

        let response = self
            .client
            .get(format!("{}/signin", self.endpoints.sso_base))
            .query(&self.endpoints.signin_params())
            .header(USER_AGENT, API_USER_AGENT)
            .send()
            .await?;

        self.last_url = Some(response.url().to_string());
        let html = response.text().await?;

        extract_csrf_token(&html)
    }

    fn form_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(API_USER_AGENT));
        if let Some(referer) = self
            .last_url
            .as_deref()
            .and_then(|url| HeaderValue::from_str(url).ok())
        {
            headers.insert(REFERER, referer);
        }
        headers
    }

    async fn submit_login(&mut self, email: &str, password: &str, csrf_token: &str) -> Result<LoginResult> {
        let form_data = [
            ("username", email),
            ("password", password),
            ("embed", "true"),
            ("_csrf", csrf_token),
        ];

        let response = self
            .client
            .post(format!("{}/signin", self.endpoints.sso_base))
            .query(&self.endpoints.signin_params())
            .headers(self.form_headers())
            .form(&form_data)
            .send()
            .await?;

        self.last_url = Some(response.url().to_string());
        let html = response.text().await?;
        let title = extract_title(&html)?;

        if title.contains("MFA") {
            Ok(LoginResult::MfaRequired)
        } else if title == "Success" {
            Ok(LoginResult::Ticket(extract_ticket(&html)?))
        } else {
            Err(GarminError::auth(format!("Unexpected login response: {}", title)))
        }
    }

    async fn submit_mfa(&mut self, code: &str, csrf_token: &str) -> Result<String> {
        let form_data = [
            ("mfa-code", code),
            ("embed", "true"),
            ("_csrf", csrf_token),
            ("fromPage", "setupEnterMfaCode"),
        ];

        let response = self
            .client
            .post(format!("{}/verifyMFA/loginEnterMfaCode", self.endpoints.sso_base))
            .query(&self.endpoints.signin_params())
            .headers(self.form_headers())
            .form(&form_data)
            .send()
            .await?;

        let html = response.text().await?;
        let title = extract_title(&html)?;

        if title == "Success" {
            extract_ticket(&html)
        } else {
            Err(GarminError::auth(format!("MFA verification failed: {}", title)))
        }
    }

    async fn get_oauth1_token(&self, consumer: &OAuthConsumer, ticket: &str) -> Result<OAuth1Token> {
        let url = format!(
            "{}/oauth-service/oauth/preauthorized?ticket={}&login-url={}&accepts-mfa-tokens=true",
            self.endpoints.connectapi_base,
            urlencoding::encode(ticket),
            urlencoding::encode(&self.endpoints.embed_url()),
        );

        let auth_header = OAuth1Signer::new(consumer.clone()).sign("GET", &url, &[])?;

        // The OAuth service must not see the SSO cookies
        let response = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?
            .get(&url)
            .header(USER_AGENT, MOBILE_USER_AGENT)
            .header(AUTHORIZATION, auth_header)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(GarminError::auth(format!("Failed to get OAuth1 token: {}", status)));
        }

        let params = parse_oauth_response(&response.text().await?);
        let oauth_token = params
            .get("oauth_token")
            .cloned()
            .ok_or_else(|| GarminError::invalid_response("Missing oauth_token"))?;
        let oauth_token_secret = params
            .get("oauth_token_secret")
            .cloned()
            .ok_or_else(|| GarminError::invalid_response("Missing oauth_token_secret"))?;

        let mut token =
            OAuth1Token::new(oauth_token, oauth_token_secret).with_domain(&self.endpoints.domain);
        if let Some(mfa) = params.get("mfa_token") {
            token = token.with_mfa(mfa.clone(), None);
        }

        Ok(token)
    }

    async fn fetch_oauth_consumer(&self) -> Result<OAuthConsumerResponse> {
        let response = self.client.get(&self.endpoints.consumer_url).send().await?;
        response.json().await.map_err(|e| {
            GarminError::invalid_response(format!("Failed to parse OAuth consumer: {}", e))
        })
    }
}

async fn exchange_oauth1_for_oauth2(
    endpoints: &SsoEndpoints,
    consumer: &OAuthConsumer,
    oauth1: &OAuth1Token,
) -> Result<OAuth2Token> {
    let url = format!(
        "{}/oauth-service/oauth/exchange/user/2.0",
        endpoints.connectapi_base
    );

    let signer = OAuth1Signer::new(consumer.clone()).with_token(OAuthToken {
        token: oauth1.oauth_token.clone(),
        secret: oauth1.oauth_token_secret.clone(),
    });

    let body: Vec<(String, String)> = oauth1
        .mfa_token
        .iter()
        .map(|mfa| ("mfa_token".to_string(), mfa.clone()))
        .collect();

    let auth_header = signer.sign("POST", &url, &body)?;

    let response = Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()?
        .post(&url)
        .header(USER_AGENT, MOBILE_USER_AGENT)
        .header(AUTHORIZATION, auth_header)
        .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
        .form(&body)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        return Err(GarminError::auth(format!(
            "Failed to exchange OAuth1 for OAuth2: {}",
            status
        )));
    }

    let mut token: OAuth2Token = response.json().await.map_err(|e| {
        GarminError::invalid_response(format!("Failed to parse OAuth2 token: {}", e))
    })?;
    token.stamp_expiry(chrono::Utc::now().timestamp());

    Ok(token)
}

fn capture(pattern: &str, html: &str, what: &str) -> Result<String> {
    let re = Regex::new(pattern)
        .map_err(|e| GarminError::invalid_response(format!("bad {} pattern: {}", what, e)))?;
    re.captures(html)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| GarminError::invalid_response(format!("Could not find {}", what)))
}

fn extract_csrf_token(html: &str) -> Result<String> {
    capture(r#"name="_csrf"\s+value="([^"]+)""#, html, "CSRF token")
}

fn extract_title(html: &str) -> Result<String> {
    capture(r"<title>([^<]+)</title>", html, "page title")
}

fn extract_ticket(html: &str) -> Result<String> {
    capture(r#"embed\?ticket=([^"]+)""#, html, "ticket")
}
