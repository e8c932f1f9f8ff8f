use base64ct::{Base64, Encoding};
use time::macros::format_description;
use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use crate::payments::dto::StkCallback;
use crate::payments::error::PaymentError;
use crate::payments::gateway::StkPushRequest;
use crate::payments::ledger::{Transaction, TxStatus};
use crate::payments::phone::{normalize_amount, normalize_phone};
use crate::state::AppState;

/// Provider timestamp in `YYYYMMDDHHmmss` form.
fn provider_timestamp(now: OffsetDateTime) -> anyhow::Result<String> {
    let format = format_description!("[year][month][day][hour][minute][second]");
    Ok(now.format(&format)?)
}

/// base64(shortcode + passkey + timestamp), the provider's request password.
fn stk_password(shortcode: &str, passkey: &str, timestamp: &str) -> String {
    Base64::encode_string(format!("{shortcode}{passkey}{timestamp}").as_bytes())
}

/// Run the push-payment initiation workflow: fail fast on missing
/// configuration or bad input, fetch a fresh provider token, submit the STK
/// push, and append a PENDING ledger record correlated by the provider's
/// checkout-request id. The returned record reflects only the synchronous
/// acknowledgment; final status arrives via the callback.
pub async fn initiate_payment(
    state: &AppState,
    raw_phone: &str,
    raw_amount: f64,
) -> Result<Transaction, PaymentError> {
    let mpesa = &state.config.mpesa;

    let missing = mpesa.missing_settings();
    if !missing.is_empty() {
        return Err(PaymentError::Configuration(missing));
    }

    let phone = normalize_phone(raw_phone).ok_or_else(|| {
        PaymentError::Validation("Use a valid Kenyan phone number (07XXXXXXXX).".to_string())
    })?;
    let amount = normalize_amount(raw_amount)
        .ok_or_else(|| PaymentError::Validation("Amount must be at least 1.".to_string()))?;

    let now = OffsetDateTime::now_utc();
    let timestamp = provider_timestamp(now)?;
    let password = stk_password(&mpesa.shortcode, &mpesa.passkey, &timestamp);
    let account_reference = format!("URBANCART-{}", now.unix_timestamp_nanos() / 1_000_000);

    let request = StkPushRequest {
        business_short_code: mpesa.shortcode.clone(),
        password,
        timestamp,
        transaction_type: mpesa.transaction_type.clone(),
        amount,
        party_a: phone.clone(),
        party_b: mpesa.party_b.clone(),
        phone_number: phone.clone(),
        call_back_url: mpesa.callback_url.clone(),
        account_reference,
        transaction_desc: format!("Pay to {}", mpesa.receiver_msisdn),
    };

    let token = state.gateway.access_token().await?;
    let ack = state.gateway.stk_push(&token, &request).await?;

    let transaction = Transaction {
        id: Uuid::new_v4(),
        created_at: now,
        amount,
        payer_phone: phone,
        receiver_phone: mpesa.receiver_msisdn.clone(),
        checkout_request_id: ack.checkout_request_id,
        merchant_request_id: ack.merchant_request_id,
        response_code: ack.response_code,
        response_description: ack.response_description,
        customer_message: ack.customer_message,
        status: TxStatus::Pending,
        result_code: None,
        result_desc: None,
        metadata: None,
        callback_received_at: None,
    };
    state.ledger.append(transaction.clone()).await?;

    info!(
        transaction_id = %transaction.id,
        checkout_request_id = ?transaction.checkout_request_id,
        amount,
        "payment initiated"
    );
    Ok(transaction)
}

/// Reconcile an asynchronous provider callback against the ledger. An
/// unmatched checkout-request id is dropped after logging; the caller still
/// acknowledges so the provider stops retrying. Replays re-apply the same
/// terminal state.
pub async fn reconcile_callback(
    state: &AppState,
    callback: &StkCallback,
) -> Result<(), PaymentError> {
    let existing = state
        .ledger
        .find_by_checkout_id(&callback.checkout_request_id)
        .await?;
    let Some(mut transaction) = existing else {
        warn!(
            checkout_request_id = %callback.checkout_request_id,
            "callback matched no ledger entry, dropping"
        );
        return Ok(());
    };

    let mut metadata = serde_json::Map::new();
    if let Some(items) = callback.callback_metadata.as_ref() {
        for item in &items.item {
            metadata.insert(
                item.name.clone(),
                item.value.clone().unwrap_or(serde_json::Value::Null),
            );
        }
    }

    transaction.result_code = Some(callback.result_code);
    transaction.result_desc = callback.result_desc.clone();
    transaction.metadata = Some(serde_json::Value::Object(metadata));
    transaction.callback_received_at = Some(OffsetDateTime::now_utc());
    transaction.status = if callback.result_code == 0 {
        TxStatus::Success
    } else {
        TxStatus::Failed
    };

    let status = transaction.status;
    let replaced = state
        .ledger
        .replace(&callback.checkout_request_id, transaction)
        .await?;
    if replaced {
        info!(
            checkout_request_id = %callback.checkout_request_id,
            result_code = callback.result_code,
            status = ?status,
            "transaction reconciled"
        );
    } else {
        warn!(
            checkout_request_id = %callback.checkout_request_id,
            "ledger entry vanished before reconciliation"
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AppConfig, JwtConfig, MpesaConfig};
    use crate::payments::gateway::{MpesaGateway, StkPushAck};
    use crate::store::{MemoryStore, Store};
    use axum::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use time::macros::datetime;

    /// Gateway double that counts every network-shaped call.
    struct CountingGateway {
        calls: AtomicUsize,
        ack: StkPushAck,
    }

    impl CountingGateway {
        fn new(ack: StkPushAck) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                ack,
            })
        }

        fn accepted() -> Arc<Self> {
            Self::new(StkPushAck {
                merchant_request_id: Some("mr-1".into()),
                checkout_request_id: Some("ws_CO_1".into()),
                response_code: Some("0".into()),
                response_description: Some("Success. Request accepted for processing".into()),
                customer_message: Some("M-Pesa prompt sent.".into()),
            })
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl MpesaGateway for CountingGateway {
        async fn access_token(&self) -> Result<String, PaymentError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok("token".into())
        }

        async fn stk_push(
            &self,
            _token: &str,
            _request: &StkPushRequest,
        ) -> Result<StkPushAck, PaymentError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.ack.clone())
        }
    }

    fn mpesa_config() -> MpesaConfig {
        MpesaConfig {
            base_url: "https://sandbox.invalid".into(),
            consumer_key: "key".into(),
            consumer_secret: "secret".into(),
            passkey: "passkey".into(),
            shortcode: "174379".into(),
            party_b: "174379".into(),
            callback_url: "https://example.com/payments/callback".into(),
            transaction_type: "CustomerPayBillOnline".into(),
            receiver_msisdn: "254710236087".into(),
        }
    }

    fn state_with(mpesa: MpesaConfig, gateway: Arc<CountingGateway>) -> AppState {
        let config = Arc::new(AppConfig {
            data_dir: "unused".into(),
            jwt: JwtConfig {
                secret: "test".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
                ttl_minutes: 5,
                refresh_ttl_minutes: 60,
            },
            mpesa,
        });
        let store = Arc::new(MemoryStore::default()) as Arc<dyn Store>;
        AppState::from_parts(config, store, gateway)
    }

    fn success_callback(checkout_request_id: &str) -> StkCallback {
        serde_json::from_value(serde_json::json!({
            "MerchantRequestID": "mr-1",
            "CheckoutRequestID": checkout_request_id,
            "ResultCode": 0,
            "ResultDesc": "The service request is processed successfully.",
            "CallbackMetadata": {
                "Item": [
                    { "Name": "Amount", "Value": 1500 },
                    { "Name": "MpesaReceiptNumber", "Value": "QK12ABC3DE" },
                    { "Name": "PhoneNumber", "Value": 254710236087u64 }
                ]
            }
        }))
        .expect("callback")
    }

    #[test]
    fn provider_timestamp_is_fourteen_digits() {
        let stamp = provider_timestamp(datetime!(2026-08-24 09:05:03 UTC)).expect("format");
        assert_eq!(stamp, "20260824090503");
    }

    #[test]
    fn stk_password_is_base64_of_the_concatenation() {
        let password = stk_password("174379", "passkey", "20260824090503");
        assert_eq!(
            password,
            Base64::encode_string(b"174379passkey20260824090503")
        );
    }

    #[tokio::test]
    async fn missing_configuration_fails_fast_with_no_network_calls() {
        let mut mpesa = mpesa_config();
        mpesa.passkey = String::new();
        let gateway = CountingGateway::accepted();
        let state = state_with(mpesa, gateway.clone());

        let err = initiate_payment(&state, "0710236087", 100.0)
            .await
            .unwrap_err();
        match err {
            PaymentError::Configuration(missing) => {
                assert_eq!(missing, vec!["MPESA_PASSKEY"]);
            }
            other => panic!("expected configuration error, got {other:?}"),
        }
        assert_eq!(gateway.call_count(), 0);
        assert!(state.ledger.list().await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn invalid_phone_fails_before_any_network_call() {
        let gateway = CountingGateway::accepted();
        let state = state_with(mpesa_config(), gateway.clone());

        let err = initiate_payment(&state, "12345", 100.0).await.unwrap_err();
        assert!(matches!(err, PaymentError::Validation(_)));
        assert_eq!(gateway.call_count(), 0);
    }

    #[tokio::test]
    async fn invalid_amount_fails_before_any_network_call() {
        let gateway = CountingGateway::accepted();
        let state = state_with(mpesa_config(), gateway.clone());

        for bad in [0.0, -5.0, f64::NAN] {
            let err = initiate_payment(&state, "0710236087", bad)
                .await
                .unwrap_err();
            assert!(matches!(err, PaymentError::Validation(_)));
        }
        assert_eq!(gateway.call_count(), 0);
    }

    #[tokio::test]
    async fn accepted_push_creates_exactly_one_pending_entry() {
        let gateway = CountingGateway::accepted();
        let state = state_with(mpesa_config(), gateway.clone());

        let transaction = initiate_payment(&state, "0710236087", 1500.0)
            .await
            .expect("initiate");
        assert_eq!(transaction.status, TxStatus::Pending);
        assert_eq!(transaction.payer_phone, "254710236087");
        assert_eq!(transaction.amount, 1500);
        assert_eq!(transaction.checkout_request_id.as_deref(), Some("ws_CO_1"));
        // token fetch + push
        assert_eq!(gateway.call_count(), 2);

        let all = state.ledger.list().await.expect("list");
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].status, TxStatus::Pending);
        assert!(all[0].checkout_request_id.is_some());
        assert!(all[0].callback_received_at.is_none());
    }

    #[tokio::test]
    async fn matching_callback_transitions_to_success_and_stores_metadata() {
        let state = state_with(mpesa_config(), CountingGateway::accepted());
        initiate_payment(&state, "0710236087", 1500.0)
            .await
            .expect("initiate");

        reconcile_callback(&state, &success_callback("ws_CO_1"))
            .await
            .expect("reconcile");

        let reconciled = state
            .ledger
            .find_by_checkout_id("ws_CO_1")
            .await
            .expect("find")
            .expect("present");
        assert_eq!(reconciled.status, TxStatus::Success);
        assert_eq!(reconciled.result_code, Some(0));
        assert!(reconciled.callback_received_at.is_some());
        let metadata = reconciled.metadata.expect("metadata");
        assert_eq!(metadata["MpesaReceiptNumber"], "QK12ABC3DE");
        assert_eq!(metadata["Amount"], 1500);
    }

    #[tokio::test]
    async fn replayed_callback_is_idempotent() {
        let state = state_with(mpesa_config(), CountingGateway::accepted());
        initiate_payment(&state, "0710236087", 1500.0)
            .await
            .expect("initiate");

        let callback = success_callback("ws_CO_1");
        reconcile_callback(&state, &callback).await.expect("first");
        reconcile_callback(&state, &callback).await.expect("replay");

        let all = state.ledger.list().await.expect("list");
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].status, TxStatus::Success);
        assert_eq!(all[0].result_code, Some(0));
    }

    #[tokio::test]
    async fn nonzero_result_code_marks_the_transaction_failed() {
        let state = state_with(mpesa_config(), CountingGateway::accepted());
        initiate_payment(&state, "0710236087", 1500.0)
            .await
            .expect("initiate");

        let callback: StkCallback = serde_json::from_value(serde_json::json!({
            "CheckoutRequestID": "ws_CO_1",
            "ResultCode": 1032,
            "ResultDesc": "Request cancelled by user"
        }))
        .expect("callback");
        reconcile_callback(&state, &callback).await.expect("reconcile");

        let reconciled = state
            .ledger
            .find_by_checkout_id("ws_CO_1")
            .await
            .expect("find")
            .expect("present");
        assert_eq!(reconciled.status, TxStatus::Failed);
        assert_eq!(reconciled.result_code, Some(1032));
        assert_eq!(
            reconciled.result_desc.as_deref(),
            Some("Request cancelled by user")
        );
    }

    #[tokio::test]
    async fn unmatched_callback_leaves_the_ledger_untouched() {
        let state = state_with(mpesa_config(), CountingGateway::accepted());
        initiate_payment(&state, "0710236087", 1500.0)
            .await
            .expect("initiate");
        let before = serde_json::to_value(state.ledger.list().await.expect("list"))
            .expect("snapshot");

        reconcile_callback(&state, &success_callback("ws_CO_unknown"))
            .await
            .expect("reconcile");

        let after = serde_json::to_value(state.ledger.list().await.expect("list"))
            .expect("snapshot");
        assert_eq!(before, after);
    }
}
