use thiserror::Error;

/// Main error type for garmin-export
#[derive(Error, Debug)]
pub enum GarminError {
    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Session rejected by Garmin Connect")]
    NotAuthenticated,

    #[error("MFA required")]
    MfaRequired,

    #[error("Rate limited by Garmin Connect")]
    RateLimited,

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid date format: {0}. Expected YYYY-MM-DD")]
    InvalidDateFormat(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

pub type Result<T> = std::result::Result<T, GarminError>;

impl GarminError {
    /// Create an authentication error from a message
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a configuration error from a message
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid response error from a message
    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }

    /// Create an invalid parameter error from a message
    pub fn invalid_param(msg: impl Into<String>) -> Self {
        Self::InvalidParameter(msg.into())
    }

    /// Whether the error means the stored session can no longer be used and a
    /// fresh credential login is needed.
    pub fn is_session_rejected(&self) -> bool {
        matches!(self, Self::NotAuthenticated | Self::Authentication(_))
    }
}

/// Render an error for the terminal, adding a hint where one helps.
pub fn format_user_error(err: &GarminError) -> String {
    match err {
        GarminError::MfaRequired => {
            format!("{}. Run interactively so the one-time code can be entered.", err)
        }
        GarminError::RateLimited => format!("{}. Wait a few minutes and retry.", err),
        GarminError::NotAuthenticated => format!(
            "{}. Remove the token directory (GARMINTOKENS) and log in again.",
            err
        ),
        _ => err.to_string(),
    }
}
