//! HTTP error mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use snafu::prelude::*;
use tracing::error;

use super::types::{ErrorBody, ErrorObject};
use crate::error::{CatalogError, SessionError};

/// Errors returned by API handlers.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ApiError {
    /// The request is malformed or not permitted.
    #[snafu(display("{message}"))]
    BadRequest { message: String },

    /// The engine no longer accepts deltas.
    #[snafu(display("Service is shutting down"))]
    ShuttingDown,

    /// Listing files failed.
    #[snafu(display("Failed to retrieve delta files"))]
    Catalog { source: CatalogError },

    /// Storing a session grant failed.
    #[snafu(display("Something went wrong"))]
    Session { source: SessionError },
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
            Self::Catalog { .. } | Self::Session { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match &self {
            Self::Catalog { source } => error!(error = %source, "Catalog query failed"),
            Self::Session { source } => error!(error = %source, "Login failed"),
            Self::BadRequest { .. } | Self::ShuttingDown => {}
        }

        let body = ErrorBody {
            errors: vec![ErrorObject {
                status: status.as_u16().to_string(),
                title: self.to_string(),
            }],
        };
        (status, Json(body)).into_response()
    }
}
