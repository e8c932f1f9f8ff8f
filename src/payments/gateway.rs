use std::time::Duration;

use axum::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::MpesaConfig;
use crate::payments::error::PaymentError;

/// STK push request body, field names as the Daraja API expects them.
#[derive(Debug, Clone, Serialize)]
pub struct StkPushRequest {
    #[serde(rename = "BusinessShortCode")]
    pub business_short_code: String,
    #[serde(rename = "Password")]
    pub password: String,
    #[serde(rename = "Timestamp")]
    pub timestamp: String,
    #[serde(rename = "TransactionType")]
    pub transaction_type: String,
    #[serde(rename = "Amount")]
    pub amount: u64,
    #[serde(rename = "PartyA")]
    pub party_a: String,
    #[serde(rename = "PartyB")]
    pub party_b: String,
    #[serde(rename = "PhoneNumber")]
    pub phone_number: String,
    #[serde(rename = "CallBackURL")]
    pub call_back_url: String,
    #[serde(rename = "AccountReference")]
    pub account_reference: String,
    #[serde(rename = "TransactionDesc")]
    pub transaction_desc: String,
}

/// Synchronous acknowledgment from the provider. A 2xx ack only means the
/// request was accepted for asynchronous processing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StkPushAck {
    #[serde(rename = "MerchantRequestID", default)]
    pub merchant_request_id: Option<String>,
    #[serde(rename = "CheckoutRequestID", default)]
    pub checkout_request_id: Option<String>,
    #[serde(rename = "ResponseCode", default)]
    pub response_code: Option<String>,
    #[serde(rename = "ResponseDescription", default)]
    pub response_description: Option<String>,
    #[serde(rename = "CustomerMessage", default)]
    pub customer_message: Option<String>,
}

#[derive(Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
}

#[derive(Default, Deserialize)]
struct ProviderErrorBody {
    #[serde(rename = "errorMessage", default)]
    error_message: Option<String>,
    #[serde(rename = "ResponseDescription", default)]
    response_description: Option<String>,
}

/// Seam to the provider API so the workflow can run against a fake in tests.
#[async_trait]
pub trait MpesaGateway: Send + Sync {
    /// Exchange the configured consumer key/secret for a short-lived bearer
    /// token. Fresh on every call, no caching.
    async fn access_token(&self) -> Result<String, PaymentError>;

    /// Submit an STK push authenticated with `token`.
    async fn stk_push(
        &self,
        token: &str,
        request: &StkPushRequest,
    ) -> Result<StkPushAck, PaymentError>;
}

pub struct HttpMpesaGateway {
    http: reqwest::Client,
    config: MpesaConfig,
}

impl HttpMpesaGateway {
    pub fn new(config: MpesaConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self { http, config })
    }
}

#[async_trait]
impl MpesaGateway for HttpMpesaGateway {
    async fn access_token(&self) -> Result<String, PaymentError> {
        let url = format!(
            "{}/oauth/v1/generate?grant_type=client_credentials",
            self.config.base_url
        );
        let response = self
            .http
            .get(&url)
            .basic_auth(&self.config.consumer_key, Some(&self.config.consumer_secret))
            .send()
            .await
            .map_err(|e| PaymentError::ProviderAuth(format!("token endpoint unreachable: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body: ProviderErrorBody = response.json().await.unwrap_or_default();
            warn!(%status, "token request rejected");
            return Err(PaymentError::ProviderAuth(
                body.error_message
                    .unwrap_or_else(|| "Could not get M-Pesa access token.".to_string()),
            ));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| PaymentError::ProviderAuth(format!("invalid token response: {e}")))?;
        body.access_token.ok_or_else(|| {
            PaymentError::ProviderAuth("Could not get M-Pesa access token.".to_string())
        })
    }

    async fn stk_push(
        &self,
        token: &str,
        request: &StkPushRequest,
    ) -> Result<StkPushAck, PaymentError> {
        let url = format!("{}/mpesa/stkpush/v1/processrequest", self.config.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .json(request)
            .send()
            .await
            .map_err(|e| PaymentError::Initiation(format!("provider unreachable: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body: ProviderErrorBody = response.json().await.unwrap_or_default();
            let message = body
                .error_message
                .or(body.response_description)
                .unwrap_or_else(|| format!("M-Pesa request failed ({}).", status.as_u16()));
            warn!(%status, "stk push rejected");
            return Err(PaymentError::Initiation(message));
        }

        let ack: StkPushAck = response
            .json()
            .await
            .map_err(|e| PaymentError::Initiation(format!("invalid provider response: {e}")))?;
        debug!(
            checkout_request_id = ?ack.checkout_request_id,
            merchant_request_id = ?ack.merchant_request_id,
            "stk push accepted"
        );
        Ok(ack)
    }
}
