use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Long-lived OAuth1 token issued after SSO login. Used only to mint OAuth2
/// tokens; persisted as `oauth1_token.json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OAuth1Token {
    pub oauth_token: String,
    pub oauth_token_secret: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mfa_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mfa_expiration_timestamp: Option<DateTime<Utc>>,
    #[serde(default = "default_domain")]
    pub domain: String,
}

fn default_domain() -> String {
    "garmin.com".to_string()
}

impl OAuth1Token {
    pub fn new(oauth_token: String, oauth_token_secret: String) -> Self {
        Self {
            oauth_token,
            oauth_token_secret,
            mfa_token: None,
            mfa_expiration_timestamp: None,
            domain: default_domain(),
        }
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into();
        self
    }

    pub fn with_mfa(mut self, mfa_token: String, expiration: Option<DateTime<Utc>>) -> Self {
        self.mfa_token = Some(mfa_token);
        self.mfa_expiration_timestamp = expiration;
        self
    }
}

/// Bearer token sent with every Connect API request; persisted as
/// `oauth2_token.json`.
///
/// The exchange endpoint only returns relative lifetimes (`expires_in`), so the
/// absolute `*_at` fields are filled in by [`OAuth2Token::stamp_expiry`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OAuth2Token {
    pub scope: String,
    pub jti: String,
    pub token_type: String,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    #[serde(default)]
    pub expires_at: i64,
    pub refresh_token_expires_in: i64,
    #[serde(default)]
    pub refresh_token_expires_at: i64,
}

impl OAuth2Token {
    /// Fill absolute expiry timestamps from the relative lifetimes, counted from `now`
    pub fn stamp_expiry(&mut self, now: i64) {
        self.expires_at = now + self.expires_in;
        self.refresh_token_expires_at = now + self.refresh_token_expires_in;
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now().timestamp()
    }

    pub fn is_refresh_expired(&self) -> bool {
        self.refresh_token_expires_at < Utc::now().timestamp()
    }

    /// Seconds until the access token expires (negative once expired)
    pub fn seconds_remaining(&self) -> i64 {
        self.expires_at - Utc::now().timestamp()
    }

    /// Value for the `Authorization` header
    pub fn authorization_header(&self) -> String {
        format!("{} {}", self.token_type, self.access_token)
    }
}
