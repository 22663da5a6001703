//! OAuth1 HMAC-SHA1 request signing
//!
//! Garmin only uses OAuth1 for two calls: trading the SSO ticket for an OAuth1
//! token, and exchanging that token for an OAuth2 bearer token.

use hmac::{Hmac, Mac};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use sha1::Sha1;
use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};
use url::Url;

use crate::error::{GarminError, Result};

/// RFC 5849 encoding: everything except unreserved characters
const ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

#[derive(Debug, Clone)]
pub struct OAuthConsumer {
    pub key: String,
    pub secret: String,
}

#[derive(Debug, Clone, Default)]
pub struct OAuthToken {
    pub token: String,
    pub secret: String,
}

/// Builds `Authorization: OAuth ...` header values
pub struct OAuth1Signer {
    consumer: OAuthConsumer,
    token: Option<OAuthToken>,
}

impl OAuth1Signer {
    pub fn new(consumer: OAuthConsumer) -> Self {
        Self {
            consumer,
            token: None,
        }
    }

    pub fn with_token(mut self, token: OAuthToken) -> Self {
        self.token = Some(token);
        self
    }

    /// Sign a request. Query parameters in `url` take part in the signature;
    /// `extra_params` carries form-encoded body parameters.
    pub fn sign(&self, method: &str, url: &str, extra_params: &[(String, String)]) -> Result<String> {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default()
            .to_string();

        self.sign_with(method, url, extra_params, &timestamp, &generate_nonce())
    }

    /// Sign with a fixed timestamp and nonce
    pub fn sign_with(
        &self,
        method: &str,
        url: &str,
        extra_params: &[(String, String)],
        timestamp: &str,
        nonce: &str,
    ) -> Result<String> {
        let parsed = Url::parse(url)
            .map_err(|e| GarminError::invalid_param(format!("cannot sign {}: {}", url, e)))?;
        let port = parsed
            .port()
            .map(|p| format!(":{}", p))
            .unwrap_or_default();
        let base_url = format!(
            "{}://{}{}{}",
            parsed.scheme(),
            parsed.host_str().unwrap_or(""),
            port,
            parsed.path()
        );

        let mut oauth_params: BTreeMap<String, String> = BTreeMap::new();
        oauth_params.insert("oauth_consumer_key".to_string(), self.consumer.key.clone());
        oauth_params.insert("oauth_nonce".to_string(), nonce.to_string());
        oauth_params.insert("oauth_signature_method".to_string(), "HMAC-SHA1".to_string());
        oauth_params.insert("oauth_timestamp".to_string(), timestamp.to_string());
        oauth_params.insert("oauth_version".to_string(), "1.0".to_string());
        if let Some(ref token) = self.token {
            oauth_params.insert("oauth_token".to_string(), token.token.clone());
        }

        let mut signed: Vec<(String, String)> = oauth_params
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        signed.extend(
            parsed
                .query_pairs()
                .map(|(k, v)| (k.into_owned(), v.into_owned())),
        );
        signed.extend(extra_params.iter().cloned());

        let signature = self.signature(method, &base_url, signed)?;
        oauth_params.insert("oauth_signature".to_string(), signature);

        let header = oauth_params
            .iter()
            .map(|(k, v)| format!("{}=\"{}\"", k, percent_encode(v)))
            .collect::<Vec<_>>()
            .join(", ");

        Ok(format!("OAuth {}", header))
    }

    fn signature(&self, method: &str, base_url: &str, params: Vec<(String, String)>) -> Result<String> {
        // Parameters are sorted by encoded key, then encoded value
        let mut encoded: Vec<(String, String)> = params
            .iter()
            .map(|(k, v)| (percent_encode(k), percent_encode(v)))
            .collect();
        encoded.sort();

        let param_string = encoded
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");

        let base_string = format!(
            "{}&{}&{}",
            method.to_uppercase(),
            percent_encode(base_url),
            percent_encode(&param_string)
        );

        let token_secret = self.token.as_ref().map(|t| t.secret.as_str()).unwrap_or("");
        let signing_key = format!(
            "{}&{}",
            percent_encode(&self.consumer.secret),
            percent_encode(token_secret)
        );

        let mut mac = Hmac::<Sha1>::new_from_slice(signing_key.as_bytes())
            .map_err(|e| GarminError::auth(format!("invalid signing key: {}", e)))?;
        mac.update(base_string.as_bytes());

        Ok(base64::Engine::encode(
            &base64::engine::general_purpose::STANDARD,
            mac.finalize().into_bytes(),
        ))
    }
}

fn percent_encode(s: &str) -> String {
    utf8_percent_encode(s, ENCODE_SET).to_string()
}

fn generate_nonce() -> String {
    let bytes: [u8; 16] = rand::random();
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Parse a form-encoded OAuth response body (`oauth_token=...&oauth_token_secret=...`)
pub fn parse_oauth_response(body: &str) -> BTreeMap<String, String> {
    body.trim()
        .split('&')
        .filter_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            Some((
                urlencoding::decode(key).ok()?.into_owned(),
                urlencoding::decode(value).ok()?.into_owned(),
            ))
        })
        .collect()
}
