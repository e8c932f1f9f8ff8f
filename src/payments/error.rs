use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Payment-flow error taxonomy. Validation and configuration problems are
/// detected before any network call; provider errors surface the provider's
/// own description and nothing else.
#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("{0}")]
    Validation(String),

    #[error("M-Pesa configuration is incomplete: {}", .0.join(", "))]
    Configuration(Vec<&'static str>),

    #[error("{0}")]
    ProviderAuth(String),

    #[error("{0}")]
    Initiation(String),

    #[error("Invalid callback payload.")]
    MalformedCallback,

    #[error("Internal server error.")]
    Internal(#[from] anyhow::Error),
}

impl PaymentError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::MalformedCallback => StatusCode::BAD_REQUEST,
            Self::Configuration(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ProviderAuth(_) | Self::Initiation(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for PaymentError {
    fn into_response(self) -> Response {
        if let Self::Internal(err) = &self {
            tracing::error!(error = %err, "internal error");
        }
        (self.status(), Json(json!({ "message": self.to_string() }))).into_response()
    }
}
