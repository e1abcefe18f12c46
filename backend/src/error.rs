use rocket::http::Status;
use rocket::response::Responder;
use rocket::serde::json::Json;
use thiserror::Error;
use tracing::error;
use shared::error::{Error as ErrorBody, ErrorCode};
use shared::validation::ValidationError;
use crate::engine::VoteError;
use crate::rate_limiter::RateLimited;
use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),
    #[error("Invalid ID: {0}")]
    InvalidId(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    RateLimited(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> Status {
        match self {
            ApiError::NotFound(_) => Status::NotFound,
            ApiError::InvalidId(_) => Status::BadRequest,
            ApiError::BadRequest(_) => Status::BadRequest,
            ApiError::Conflict(_) => Status::Conflict,
            ApiError::Forbidden(_) => Status::Forbidden,
            ApiError::RateLimited(_) => Status::TooManyRequests,
            ApiError::Internal(_) => Status::InternalServerError,
        }
    }

    fn code(&self) -> ErrorCode {
        match self {
            ApiError::NotFound(_) => ErrorCode::NotFound,
            ApiError::InvalidId(_) | ApiError::BadRequest(_) => ErrorCode::InvalidInput,
            ApiError::Conflict(_) => ErrorCode::Conflict,
            ApiError::Forbidden(_) => ErrorCode::Forbidden,
            ApiError::RateLimited(_) => ErrorCode::RateLimited,
            ApiError::Internal(_) => ErrorCode::SystemError,
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => ApiError::NotFound("Resource not found".into()),
            StoreError::DuplicateVote => ApiError::Conflict(e.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<VoteError> for ApiError {
    fn from(e: VoteError) -> Self {
        match e {
            VoteError::PollOrOptionNotFound | VoteError::VoteNotFound => ApiError::NotFound(e.to_string()),
            VoteError::AlreadyAccounted | VoteError::Contended => ApiError::Conflict(e.to_string()),
            VoteError::Storage(store) => store.into(),
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        ApiError::BadRequest(e.to_string())
    }
}

impl From<ErrorBody> for ApiError {
    fn from(e: ErrorBody) -> Self {
        // Pagination only reports bad bounds or an empty page.
        match e.code {
            ErrorCode::NotFound => ApiError::NotFound(e.message),
            _ => ApiError::BadRequest(e.message),
        }
    }
}

impl From<RateLimited> for ApiError {
    fn from(e: RateLimited) -> Self {
        ApiError::RateLimited(e.to_string())
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for ApiError {
    fn respond_to(self, req: &'r rocket::Request<'_>) -> rocket::response::Result<'o> {
        let status = self.status();
        let message = match &self {
            ApiError::Internal(detail) => {
                error!(path = %req.uri(), "Request failed: {}", detail);
                "An internal error occurred".to_string()
            }
            other => other.to_string(),
        };

        rocket::Response::build_from(Json(ErrorBody::new(self.code(), message)).respond_to(req)?)
            .status(status)
            .ok()
    }
}
