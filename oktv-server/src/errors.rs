use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use oktv_collab::{RoomError, SearchError, SessionError};
use oktv_collab::store::StoreError;
use thiserror::Error;

pub type ServerResult<T> = Result<T, ServerError>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Room {0} not found")]
    RoomNotFound(String),
    #[error("A display name is required to join a room")]
    NameRequired,
    #[error("{0}")]
    Forbidden(String),
    #[error("{resource}:{identifier} not found")]
    NotFound {
        resource: &'static str,
        identifier: String,
    },
    #[error("{0}")]
    BadRequest(String),
    #[error("Search failed: {0}")]
    SearchFailed(String),
    #[error("Unknown internal error: {0}")]
    Unknown(String),
}

impl ServerError {
    fn as_status_code(&self) -> StatusCode {
        match self {
            Self::RoomNotFound(_) => StatusCode::NOT_FOUND,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::NameRequired => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::SearchFailed(_) => StatusCode::BAD_GATEWAY,
            Self::Unknown(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        (self.as_status_code(), self.to_string()).into_response()
    }
}

impl From<RoomError> for ServerError {
    fn from(value: RoomError) -> Self {
        match value {
            // Malformed and unknown codes both redirect clients to the
            // not-found page.
            RoomError::InvalidCode(_) => Self::RoomNotFound(value.to_string()),
            RoomError::RoomNotFound(code) => Self::RoomNotFound(code),
            RoomError::AdminOnly | RoomError::NotAuthorized => Self::Forbidden(value.to_string()),
            RoomError::SongNotFound => Self::NotFound {
                resource: "song",
                identifier: "queue entry".to_string(),
            },
            RoomError::Store(e) => e.into(),
        }
    }
}

impl From<SessionError> for ServerError {
    fn from(value: SessionError) -> Self {
        match value {
            SessionError::NameRequired => Self::NameRequired,
            SessionError::Store(e) => e.into(),
        }
    }
}

impl From<StoreError> for ServerError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound {
                resource,
                identifier,
            } => Self::NotFound {
                resource,
                identifier,
            },
            e => Self::Unknown(e.to_string()),
        }
    }
}

impl From<SearchError> for ServerError {
    fn from(value: SearchError) -> Self {
        match value {
            SearchError::EmptyQuery => Self::BadRequest(value.to_string()),
            e => Self::SearchFailed(e.to_string()),
        }
    }
}
