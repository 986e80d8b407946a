use serde::{Deserialize, Serialize};

/// Failure categories shared by the server's error bodies and the client's
/// error type. Serialized as the `kind` field next to `error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Unauthenticated,
    Unauthorized,
    NotFound,
    ValidationFailed,
    Conflict,
    Transient,
}

impl ErrorKind {
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorKind::Transient)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub kind: ErrorKind,
}
