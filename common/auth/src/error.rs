use axum::http::{header::WWW_AUTHENTICATE, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

pub type AuthResult<T> = Result<T, AuthError>;

#[derive(Debug, Error)]
pub enum AuthError {
    /// Local login failed. The message never says which half was wrong.
    #[error("could not validate local credentials")]
    InvalidCredentials,
    /// Bearer token was malformed, expired or carried a bad signature.
    /// The reason is for logs only.
    #[error("could not validate credentials")]
    InvalidToken(String),
    #[error("Role \"{role}\" is required to perform this action")]
    Forbidden { role: String },
    #[error("identity provider unreachable: {0}")]
    ProviderUnreachable(String),
    #[error("identity provider does not advertise '{0}'")]
    MissingEndpoint(&'static str),
    #[error("user table unavailable: {0}")]
    Config(String),
}

impl AuthError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            AuthError::InvalidCredentials | AuthError::InvalidToken(_)
        )
    }

    pub fn is_forbidden(&self) -> bool {
        matches!(self, AuthError::Forbidden { .. })
    }
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(value: jsonwebtoken::errors::Error) -> Self {
        Self::InvalidToken(value.to_string())
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            AuthError::InvalidCredentials => (StatusCode::UNAUTHORIZED, "AUTH_CREDENTIALS"),
            AuthError::InvalidToken(_) => (StatusCode::UNAUTHORIZED, "AUTH_TOKEN"),
            AuthError::Forbidden { .. } => (StatusCode::FORBIDDEN, "AUTH_ROLE"),
            AuthError::ProviderUnreachable(_) | AuthError::MissingEndpoint(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "AUTH_PROVIDER")
            }
            AuthError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "AUTH_CONFIG"),
        };

        let body = ErrorBody {
            code,
            message: self.to_string(),
        };
        if status == StatusCode::UNAUTHORIZED {
            (status, [(WWW_AUTHENTICATE, "Bearer")], Json(body)).into_response()
        } else {
            (status, Json(body)).into_response()
        }
    }
}
