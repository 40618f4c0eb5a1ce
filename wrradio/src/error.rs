//! Error types for the WebRadio core

/// Result type alias for WebRadio operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while loading, crawling or persisting the catalog
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A required resource (station list, config directory) cannot be located
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A sectioned document is malformed
    #[error("Cannot parse {document}: {message}")]
    Parse { document: String, message: String },

    /// Non-success HTTP status
    #[error("Fetching {uri} failed with status {status}")]
    Fetch { uri: String, status: u16 },

    /// Writing a persisted document failed
    #[error("Cannot persist {path}: {source}")]
    Persistence {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Unknown equalizer profile
    #[error("Unknown equalizer profile: {0}")]
    UnknownProfile(String),

    /// HTTP transport failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Invalid noise filter pattern
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing failed
    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration layer error (from wrconfig/anyhow)
    #[error("Configuration error: {0}")]
    Config(#[from] anyhow::Error),
}

impl Error {
    /// Create a configuration error
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a parse error for `document`
    pub fn parse(document: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            document: document.into(),
            message: message.into(),
        }
    }

    /// Create a fetch error
    pub fn fetch(uri: impl Into<String>, status: u16) -> Self {
        Self::Fetch {
            uri: uri.into(),
            status,
        }
    }

    /// Create a persistence error
    pub fn persistence(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Persistence {
            path: path.display().to_string(),
            source,
        }
    }
}
