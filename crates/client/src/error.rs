use reqwest::StatusCode;
use roomchat_shared::error::{ErrorBody, ErrorKind};
use roomchat_shared::membership::TransitionError;
use roomchat_shared::permissions::Denial;

pub type SyncResult<T> = Result<T, SyncError>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    ValidationFailed(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Transient(String),
}

impl SyncError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::Unauthorized(_) => ErrorKind::Unauthorized,
            SyncError::NotFound(_) => ErrorKind::NotFound,
            SyncError::ValidationFailed(_) => ErrorKind::ValidationFailed,
            SyncError::Conflict(_) => ErrorKind::Conflict,
            SyncError::Transient(_) => ErrorKind::Transient,
        }
    }

    /// Only transport-level failures are worth retrying.
    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }

    pub fn from_kind(kind: ErrorKind, message: String) -> Self {
        match kind {
            ErrorKind::Unauthenticated | ErrorKind::Unauthorized => SyncError::Unauthorized(message),
            ErrorKind::NotFound => SyncError::NotFound(message),
            ErrorKind::ValidationFailed => SyncError::ValidationFailed(message),
            ErrorKind::Conflict => SyncError::Conflict(message),
            ErrorKind::Transient => SyncError::Transient(message),
        }
    }

    /// Maps a failed response. The body's `kind` wins over the status code.
    pub fn from_response(status: StatusCode, body: Option<ErrorBody>) -> Self {
        if let Some(body) = body {
            return Self::from_kind(body.kind, body.error);
        }
        let message = status
            .canonical_reason()
            .unwrap_or("Request failed")
            .to_string();
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => SyncError::Unauthorized(message),
            StatusCode::NOT_FOUND => SyncError::NotFound(message),
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                SyncError::ValidationFailed(message)
            }
            StatusCode::CONFLICT => SyncError::Conflict(message),
            _ => SyncError::Transient(message),
        }
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(e: reqwest::Error) -> Self {
        SyncError::Transient(e.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for SyncError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        SyncError::Transient(e.to_string())
    }
}

impl From<Denial> for SyncError {
    fn from(denial: Denial) -> Self {
        match denial {
            Denial::NotMember | Denial::Forbidden => {
                SyncError::Unauthorized(denial.message().to_string())
            }
            Denial::Protected(reason) => SyncError::Conflict(reason.to_string()),
        }
    }
}

impl From<TransitionError> for SyncError {
    fn from(err: TransitionError) -> Self {
        match err {
            TransitionError::NotAMember => SyncError::Unauthorized(err.message().to_string()),
            TransitionError::AlreadyMember | TransitionError::LastAdmin => {
                SyncError::Conflict(err.message().to_string())
            }
        }
    }
}
