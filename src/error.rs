use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::data::store::StoreError;

#[derive(Error, Debug)]
pub enum RecorderError {
    #[error("invalid input: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("household {qr_code} kept changing underneath {attempts} aggregate writes")]
    Conflict { qr_code: String, attempts: u32 },
}

impl IntoResponse for RecorderError {
    fn into_response(self) -> Response {
        let status = match self {
            RecorderError::Validation { .. } => StatusCode::BAD_REQUEST,
            RecorderError::NotFound { .. } => StatusCode::NOT_FOUND,
            RecorderError::Conflict { .. } => StatusCode::CONFLICT,
            RecorderError::Store(StoreError::UnknownSortField(_)) => StatusCode::BAD_REQUEST,
            RecorderError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, self.to_string()).into_response()
    }
}
