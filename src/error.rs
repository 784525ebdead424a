// Error types for the library surface. The binary and the UI wrap these in
// `anyhow` with context; the API layer returns them directly so callers can
// match on the interesting cases (bad password, pending friend request, ...).

use std::path::PathBuf;
use thiserror::Error;

/// Error code the service returns for a wrong username/password pair.
pub const CODE_INVALID_CREDENTIALS: i64 = 264;
/// Error code the service returns when the login needs a one-time code.
pub const CODE_TWO_FACTOR_REQUIRED: i64 = 81109;
/// Error code for a friend request that already exists.
pub const CODE_FRIEND_REQUEST_PENDING: i64 = 2208;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("response was not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// The service answered with an `{"error": {...}}` envelope.
    #[error("service error {code}: {message}")]
    Service { code: i64, message: String },

    #[error("incorrect credentials")]
    InvalidCredentials,

    #[error("two-factor login failed: {0}")]
    TwoFactor(String),

    #[error("friend request already pending")]
    FriendRequestPending,

    #[error("user `{0}` not found")]
    UserNotFound(String),

    #[error("malformed response: missing or invalid `{0}`")]
    MalformedResponse(&'static str),

    #[error("unexpected HTTP status {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("not logged in")]
    NotAuthenticated,

    #[error("invalid header value for `{0}`")]
    InvalidHeader(&'static str),
}

#[derive(Debug, Error)]
pub enum CredentialsError {
    #[error("no credential file at {0}")]
    Missing(PathBuf),

    #[error("credential file {0} has an empty username or password")]
    Incomplete(PathBuf),

    #[error("credential file {path} is not valid JSON: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("could not encode credentials: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("credential file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CredentialsError {
    /// Whether the user should be asked for fresh credentials instead of
    /// aborting. Only I/O and encoding failures are fatal.
    pub fn needs_prompt(&self) -> bool {
        !matches!(self, CredentialsError::Io { .. } | CredentialsError::Encode(_))
    }
}
