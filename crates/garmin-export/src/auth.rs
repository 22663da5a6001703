//! Session setup: resume from the token store, or log in with credentials.

use crate::client::{GarminClient, OAuth1Token, OAuth2Token, SsoClient, SsoEndpoints};
use crate::config::TokenStore;
use crate::error::{GarminError, Result};
use std::io::{self, BufRead, Write};

const PROFILE_PATH: &str = "/userprofile-service/socialProfile";

/// Source of interactive input during login
pub trait CredentialPrompt {
    fn username(&mut self) -> Result<String>;
    fn password(&mut self) -> Result<String>;
    fn mfa_code(&mut self) -> Result<String>;
}

/// Reads credentials from the terminal; the password is not echoed.
#[derive(Debug, Default)]
pub struct TerminalPrompt;

impl CredentialPrompt for TerminalPrompt {
    fn username(&mut self) -> Result<String> {
        read_line("Login e-mail: ")
    }

    fn password(&mut self) -> Result<String> {
        rpassword::prompt_password("Enter password: ").map_err(GarminError::Io)
    }

    fn mfa_code(&mut self) -> Result<String> {
        read_line("Enter the MFA one-time code: ")
    }
}

fn read_line(prompt: &str) -> Result<String> {
    print!("{}", prompt);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().lock().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

/// An authenticated Connect API session
#[derive(Debug, Clone)]
pub struct Session {
    client: GarminClient,
    token: OAuth2Token,
    display_name: String,
}

impl Session {
    pub fn new(client: GarminClient, token: OAuth2Token, display_name: impl Into<String>) -> Self {
        Self {
            client,
            token,
            display_name: display_name.into(),
        }
    }

    pub fn client(&self) -> &GarminClient {
        &self.client
    }

    pub fn token(&self) -> &OAuth2Token {
        &self.token
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }
}

/// Produces a [`Session`], preferring stored tokens over a fresh login.
pub struct Authenticator {
    store: TokenStore,
    endpoints: SsoEndpoints,
}

impl Authenticator {
    pub fn new(store: TokenStore) -> Self {
        Self {
            store,
            endpoints: SsoEndpoints::default(),
        }
    }

    pub fn with_endpoints(mut self, endpoints: SsoEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn store(&self) -> &TokenStore {
        &self.store
    }

    /// Resume from the token store; on any failure log in with `username` /
    /// `password`, prompting for whatever is missing, and persist the new tokens.
    pub async fn authenticate(
        &self,
        username: Option<String>,
        password: Option<String>,
        prompt: &mut dyn CredentialPrompt,
    ) -> Result<Session> {
        tracing::info!(
            "Trying to login to Garmin Connect using token data from directory '{}'...",
            self.store.dir().display()
        );

        match self.resume().await {
            Ok(session) => return Ok(session),
            Err(e) => {
                tracing::debug!(error = %e, "token resume failed");
                if matches!(e, GarminError::NotAuthenticated) {
                    self.store.clear()?;
                }
                tracing::info!(
                    "Login tokens not present, login with your Garmin Connect credentials to generate them. \
                     They will be stored in '{}' for future use.",
                    self.store.dir().display()
                );
            }
        }

        self.login(username, password, prompt).await
    }

    /// Build a session from stored tokens, refreshing an expired access token.
    pub async fn resume(&self) -> Result<Session> {
        let (oauth1, mut oauth2) = self
            .store
            .load_tokens()?
            .ok_or_else(|| GarminError::auth("no stored tokens"))?;

        if oauth2.is_expired() {
            tracing::debug!(
                refresh_expired = oauth2.is_refresh_expired(),
                "access token expired, exchanging OAuth1 token for a new one"
            );
            let sso = SsoClient::new(self.endpoints_for(&oauth1))?;
            oauth2 = sso.refresh_oauth2(&oauth1).await?;
            self.store.save_oauth2(&oauth2)?;
        } else {
            tracing::debug!(seconds_remaining = oauth2.seconds_remaining(), "access token valid");
        }

        self.open_session(&oauth1, oauth2).await
    }

    async fn login(
        &self,
        username: Option<String>,
        password: Option<String>,
        prompt: &mut dyn CredentialPrompt,
    ) -> Result<Session> {
        let username = match username.filter(|u| !u.trim().is_empty()) {
            Some(u) => u,
            None => prompt.username()?,
        };
        let password = match password.filter(|p| !p.is_empty()) {
            Some(p) => p,
            None => prompt.password()?,
        };
        if username.is_empty() || password.is_empty() {
            return Err(GarminError::auth("e-mail and password are required"));
        }

        let mut sso = SsoClient::new(self.endpoints.clone())?;
        let (oauth1, oauth2) = sso
            .login(&username, &password, Some(|| prompt.mfa_code()))
            .await?;

        self.store.save_tokens(&oauth1, &oauth2)?;
        tracing::info!(
            "Oauth tokens stored in '{}' directory for future use.",
            self.store.dir().display()
        );

        self.open_session(&oauth1, oauth2).await
    }

    /// Verify the access token by fetching the social profile
    async fn open_session(&self, oauth1: &OAuth1Token, oauth2: OAuth2Token) -> Result<Session> {
        let client = GarminClient::new_with_base_url(&self.endpoints_for(oauth1).connectapi_base)?;
        let profile: serde_json::Value = client.get_json(&oauth2, PROFILE_PATH).await?;
        let display_name = profile
            .get("displayName")
            .and_then(|v| v.as_str())
            .ok_or_else(|| GarminError::invalid_response("Could not get display name"))?
            .to_string();

        tracing::debug!(display_name = %display_name, "session ready");
        Ok(Session::new(client, oauth2, display_name))
    }

    /// Tokens issued for another Garmin domain (garmin.cn) talk to that domain
    fn endpoints_for(&self, oauth1: &OAuth1Token) -> SsoEndpoints {
        if oauth1.domain == self.endpoints.domain {
            self.endpoints.clone()
        } else {
            SsoEndpoints::for_domain(&oauth1.domain)
        }
    }
}
