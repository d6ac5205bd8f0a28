use axum::http::StatusCode;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    db::reviewdb::StoreError,
    error::{ErrorMessage, HttpError},
};

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Validation failed for fields: {}", fields.join(", "))]
    Validation { fields: Vec<String> },

    #[error("Review by {reviewer_id} for contract {contract_id} already exists")]
    DuplicateReview {
        reviewer_id: String,
        contract_id: String,
    },

    #[error("Review {0} not found")]
    ReviewNotFound(Uuid),

    #[error("Review {0} has not been released yet")]
    NotReleased(Uuid),

    #[error("Only the reviewee can reply to review {0}")]
    NotReviewee(Uuid),

    #[error("Review {0} already has a reply")]
    ReplyExists(Uuid),

    #[error("Could not serialize review submission after {attempts} attempts")]
    ConcurrencyConflict { attempts: u32 },

    #[error("Upstream service error: {0}")]
    Upstream(String),

    #[error("Database error: {0}")]
    Database(sqlx::Error),
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate {
                reviewer_id,
                contract_id,
            } => ServiceError::DuplicateReview {
                reviewer_id,
                contract_id,
            },
            StoreError::Conflict => ServiceError::ConcurrencyConflict { attempts: 1 },
            StoreError::Database(e) => ServiceError::Database(e),
        }
    }
}

impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        ServiceError::Upstream(err.to_string())
    }
}

impl From<ServiceError> for HttpError {
    fn from(error: ServiceError) -> Self {
        let status = error.status_code();
        match error {
            // Storage details stay in the logs.
            ServiceError::Database(_) => {
                tracing::error!("Database failure: {}", error);
                HttpError::server_error(ErrorMessage::ServerError.to_string())
            }
            _ => HttpError::new(error.to_string(), status),
        }
    }
}

impl ServiceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::Validation { .. } => StatusCode::BAD_REQUEST,

            ServiceError::DuplicateReview { .. }
            | ServiceError::NotReleased(_)
            | ServiceError::ReplyExists(_) => StatusCode::CONFLICT,

            ServiceError::ReviewNotFound(_) => StatusCode::NOT_FOUND,

            ServiceError::NotReviewee(_) => StatusCode::FORBIDDEN,

            ServiceError::ConcurrencyConflict { .. } => StatusCode::SERVICE_UNAVAILABLE,

            ServiceError::Upstream(_) => StatusCode::BAD_GATEWAY,

            ServiceError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
