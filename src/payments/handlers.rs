use axum::{extract::State, routing::post, Json, Router};
use tracing::{debug, instrument};

use crate::payments::dto::{CallbackAck, CallbackEnvelope, InitiateRequest, InitiateResponse};
use crate::payments::error::PaymentError;
use crate::payments::services;
use crate::state::AppState;

pub fn payment_routes() -> Router<AppState> {
    Router::new()
        .route("/payments/initiate", post(initiate))
        .route("/payments/callback", post(callback))
}

#[instrument(skip(state, payload))]
pub async fn initiate(
    State(state): State<AppState>,
    Json(payload): Json<InitiateRequest>,
) -> Result<Json<InitiateResponse>, PaymentError> {
    if let Some(count) = payload.cart_items {
        debug!(cart_items = count, "cart snapshot at checkout");
    }

    let transaction =
        services::initiate_payment(&state, &payload.phone_number, payload.amount).await?;

    Ok(Json(InitiateResponse {
        message: transaction.customer_message.clone().unwrap_or_else(|| {
            "M-Pesa prompt sent. Complete payment on your phone.".to_string()
        }),
        checkout_request_id: transaction.checkout_request_id,
        merchant_request_id: transaction.merchant_request_id,
        receiver_phone: transaction.receiver_phone,
    }))
}

#[instrument(skip(state, payload))]
pub async fn callback(
    State(state): State<AppState>,
    Json(payload): Json<CallbackEnvelope>,
) -> Result<Json<CallbackAck>, PaymentError> {
    let callback = payload
        .body
        .and_then(|b| b.stk_callback)
        .ok_or(PaymentError::MalformedCallback)?;

    services::reconcile_callback(&state, &callback).await?;
    Ok(Json(CallbackAck::accepted()))
}
