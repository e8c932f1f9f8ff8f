use std::sync::Arc;

use crate::auth::repo::UserDirectory;
use crate::config::AppConfig;
use crate::payments::gateway::{HttpMpesaGateway, MpesaGateway};
use crate::payments::ledger::Ledger;
use crate::store::{JsonFileStore, Store};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<UserDirectory>,
    pub ledger: Arc<Ledger>,
    pub gateway: Arc<dyn MpesaGateway>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);
        let store = Arc::new(JsonFileStore::open(&config.data_dir).await?) as Arc<dyn Store>;
        let gateway =
            Arc::new(HttpMpesaGateway::new(config.mpesa.clone())?) as Arc<dyn MpesaGateway>;
        Ok(Self::from_parts(config, store, gateway))
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        store: Arc<dyn Store>,
        gateway: Arc<dyn MpesaGateway>,
    ) -> Self {
        Self {
            config,
            users: Arc::new(UserDirectory::new(store.clone())),
            ledger: Arc::new(Ledger::new(store)),
            gateway,
        }
    }

    pub fn fake() -> Self {
        use crate::config::{JwtConfig, MpesaConfig};
        use crate::payments::gateway::{StkPushAck, StkPushRequest};
        use crate::payments::error::PaymentError;
        use crate::store::MemoryStore;
        use axum::async_trait;

        #[derive(Clone)]
        struct FakeGateway;
        #[async_trait]
        impl MpesaGateway for FakeGateway {
            async fn access_token(&self) -> Result<String, PaymentError> {
                Ok("fake-token".into())
            }
            async fn stk_push(
                &self,
                _token: &str,
                _request: &StkPushRequest,
            ) -> Result<StkPushAck, PaymentError> {
                Ok(StkPushAck {
                    merchant_request_id: Some("fake-merchant".into()),
                    checkout_request_id: Some("fake-checkout".into()),
                    response_code: Some("0".into()),
                    response_description: Some("Success. Request accepted for processing".into()),
                    customer_message: Some("Success. Request accepted for processing".into()),
                })
            }
        }

        let config = Arc::new(AppConfig {
            data_dir: "unused".into(),
            jwt: JwtConfig {
                secret: "test".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
                ttl_minutes: 5,
                refresh_ttl_minutes: 60,
            },
            mpesa: MpesaConfig {
                base_url: "https://sandbox.invalid".into(),
                consumer_key: "key".into(),
                consumer_secret: "secret".into(),
                passkey: "passkey".into(),
                shortcode: "174379".into(),
                party_b: "174379".into(),
                callback_url: "https://example.com/payments/callback".into(),
                transaction_type: "CustomerPayBillOnline".into(),
                receiver_msisdn: "254710236087".into(),
            },
        });

        let store = Arc::new(MemoryStore::default()) as Arc<dyn Store>;
        Self::from_parts(config, store, Arc::new(FakeGateway))
    }
}
