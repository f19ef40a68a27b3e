use thiserror::Error;

/// Failures talking to the hosted backend.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("gateway returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Auth failures carry the backend's message verbatim so forms can show it.
    #[error("{0}")]
    Auth(String),

    #[error("row not found in {table}")]
    NotFound { table: &'static str },

    #[error("not signed in")]
    NotAuthenticated,
}

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Client-side form validation. `Display` is the inline text shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Please fill in all fields")]
    MissingFields,

    #[error("Passwords do not match")]
    PasswordMismatch,

    #[error("Please enter a valid email address")]
    InvalidEmail,
}

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("message text is empty")]
    EmptyMessage,

    #[error("no target user given")]
    MissingTarget,

    #[error("Failed to create conversation")]
    ConversationCreate(#[source] GatewayError),

    #[error("Failed to add participants to conversation")]
    Participants(#[source] GatewayError),
}
