use thiserror::Error;

/// A request/response exchange with the backend failed.
///
/// Covers every way a fetch can go wrong: the transport, the status line,
/// or the payload. Callers treat all of them the same way (report and keep
/// the last known-good state), so the variants exist for messages, not for
/// branching.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("Request to {endpoint} failed: {reason}")]
    Transport { endpoint: String, reason: String },

    #[error("Request to {endpoint} timed out")]
    Timeout { endpoint: String },

    #[error("{endpoint} returned HTTP {status}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("Malformed response from {endpoint}: {reason}")]
    Decode { endpoint: String, reason: String },
}

impl FetchError {
    /// The endpoint the failed request was sent to.
    pub fn endpoint(&self) -> &str {
        match self {
            FetchError::Transport { endpoint, .. }
            | FetchError::Timeout { endpoint }
            | FetchError::Status { endpoint, .. }
            | FetchError::Decode { endpoint, .. } => endpoint,
        }
    }
}

#[derive(Error, Debug)]
pub enum VolError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Event stream '{stream}' closed: {reason}")]
    StreamClosed { stream: String, reason: String },

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl VolError {
    /// Returns a user-friendly suggestion for how to fix the error.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            VolError::Fetch(FetchError::Transport { .. }) | VolError::Fetch(FetchError::Timeout { .. }) => {
                Some("Check that the backend service is running and the --backend URL is correct.")
            }
            VolError::Fetch(FetchError::Status { status: 404, .. }) => {
                Some("Check the volume name with `volkeeper ls`.")
            }
            VolError::Fetch(FetchError::Decode { .. }) => {
                Some("The backend version may not match this client.")
            }
            VolError::StreamClosed { .. } => {
                Some("Check that the container engine is running and its CLI is on PATH.")
            }
            VolError::Config(_) => {
                Some("Check the [backend], [events] and [poll] sections of config.toml.")
            }
            _ => None,
        }
    }

    /// Whether this is a backend fetch failure.
    pub fn is_fetch(&self) -> bool {
        matches!(self, VolError::Fetch(_))
    }
}

impl From<toml::de::Error> for VolError {
    fn from(err: toml::de::Error) -> Self {
        VolError::Config(format!("Invalid config.toml: {}", err))
    }
}

impl From<url::ParseError> for VolError {
    fn from(err: url::ParseError) -> Self {
        VolError::Config(format!("Invalid backend URL: {}", err))
    }
}
