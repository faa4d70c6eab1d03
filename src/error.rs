//! Error type shared by the spreadsheet store, repositories and the bot loop.

/// Main bot error type
#[derive(Debug, thiserror::Error)]
pub enum BotError {
    /// Missing or malformed environment configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// Service-account credentials could not be used
    #[error("credentials error: {0}")]
    Credentials(String),

    /// Transport failure talking to the spreadsheet API
    #[error("spreadsheet request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The spreadsheet API answered with a non-success status
    #[error("spreadsheet api returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("jwt signing failed: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("url error: {0}")]
    Url(#[from] url::ParseError),

    /// Telegram request failed
    #[error("telegram error: {0}")]
    Telegram(#[from] teloxide::RequestError),

    /// A referenced row does not exist
    #[error("{0} not found")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, BotError>;

impl BotError {
    /// Hint printed next to startup failures
    pub fn startup_hint(&self) -> &'static str {
        match self {
            BotError::Credentials(_) | BotError::Jwt(_) => {
                "Your Google credentials file appears to be invalid. Check that it is a service-account JSON key."
            }
            BotError::Io(_) => "Make sure GOOGLE_CREDENTIALS_FILE points to an existing file",
            BotError::Config(msg) if msg.contains("SPREADSHEET_ID") => {
                "Make sure your .env file contains your Google Spreadsheet ID"
            }
            BotError::Config(_) => "Check the variables in your .env file",
            _ => "If the error persists, check your internet connection and Google API access",
        }
    }
}
