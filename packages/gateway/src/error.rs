#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Invalid argument: {message}")]
    Argument { message: String },

    #[error("Forbidden: {message}")]
    Forbidden { message: String },

    #[error("Not found: {message}")]
    NotFound { message: String },

    #[error("Server response: {status} - {message}")]
    Service { status: u16, message: String },

    #[error("No ETag received from the service after the upload")]
    MissingEtag,

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn argument(message: impl Into<String>) -> Self {
        Error::Argument {
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Error::NotFound {
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }
}

/// Fail with [`Error::Argument`] unless `value` parses as a UUID.
pub(crate) fn validate_uuid(field: &str, value: &str) -> Result<(), Error> {
    uuid::Uuid::parse_str(value)
        .map(|_| ())
        .map_err(|_| Error::argument(format!("Invalid UUID for {}: {}", field, value)))
}
