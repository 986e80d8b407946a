use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use roomchat_shared::error::{ErrorBody, ErrorKind};
use roomchat_shared::membership::TransitionError;
use roomchat_shared::permissions::Denial;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not authenticated")]
    Unauthenticated,

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

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Unauthenticated => ErrorKind::Unauthenticated,
            AppError::Unauthorized(_) => ErrorKind::Unauthorized,
            AppError::NotFound(_) => ErrorKind::NotFound,
            AppError::ValidationFailed(_) => ErrorKind::ValidationFailed,
            AppError::Conflict(_) => ErrorKind::Conflict,
            AppError::Transient(_) | AppError::Database(_) => ErrorKind::Transient,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::Unauthenticated => StatusCode::UNAUTHORIZED,
            ErrorKind::Unauthorized => StatusCode::FORBIDDEN,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::ValidationFailed => StatusCode::BAD_REQUEST,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::Transient => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    pub fn not_found(what: &str) -> Self {
        AppError::NotFound(format!("{} not found", what))
    }
}

impl From<Denial> for AppError {
    fn from(denial: Denial) -> Self {
        match denial {
            Denial::NotMember | Denial::Forbidden => {
                AppError::Unauthorized(denial.message().to_string())
            }
            Denial::Protected(reason) => AppError::Conflict(reason.to_string()),
        }
    }
}

impl From<TransitionError> for AppError {
    fn from(err: TransitionError) -> Self {
        match err {
            TransitionError::NotAMember => AppError::Unauthorized(err.message().to_string()),
            TransitionError::AlreadyMember | TransitionError::LastAdmin => {
                AppError::Conflict(err.message().to_string())
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let message = match &self {
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                "Database error".to_string()
            }
            other => other.to_string(),
        };
        (
            self.status(),
            Json(ErrorBody {
                error: message,
                kind: self.kind(),
            }),
        )
            .into_response()
    }
}
