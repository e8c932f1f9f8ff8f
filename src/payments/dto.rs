use serde::{Deserialize, Serialize};

/// Client request to start an STK push. `cartItems` is a cart-size snapshot
/// the client sends for logging; it does not affect the charge.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiateRequest {
    pub phone_number: String,
    pub amount: f64,
    #[serde(default)]
    pub cart_items: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiateResponse {
    pub message: String,
    pub checkout_request_id: Option<String>,
    pub merchant_request_id: Option<String>,
    pub receiver_phone: String,
}

/// Asynchronous provider notification. Both wrapper levels are optional so
/// the handler can reject a payload missing the nested callback object with
/// a 400 instead of a generic parse failure.
#[derive(Debug, Deserialize)]
pub struct CallbackEnvelope {
    #[serde(rename = "Body", default)]
    pub body: Option<CallbackBody>,
}

#[derive(Debug, Deserialize)]
pub struct CallbackBody {
    #[serde(rename = "stkCallback", default)]
    pub stk_callback: Option<StkCallback>,
}

#[derive(Debug, Deserialize)]
pub struct StkCallback {
    #[serde(rename = "MerchantRequestID", default)]
    pub merchant_request_id: Option<String>,
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: String,
    #[serde(rename = "ResultCode")]
    pub result_code: i64,
    #[serde(rename = "ResultDesc", default)]
    pub result_desc: Option<String>,
    #[serde(rename = "CallbackMetadata", default)]
    pub callback_metadata: Option<CallbackMetadata>,
}

#[derive(Debug, Deserialize)]
pub struct CallbackMetadata {
    #[serde(rename = "Item", default)]
    pub item: Vec<MetadataItem>,
}

#[derive(Debug, Deserialize)]
pub struct MetadataItem {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Value", default)]
    pub value: Option<serde_json::Value>,
}

/// Fixed acknowledgment body; the provider retries until it sees this shape,
/// so it is returned for every syntactically valid callback.
#[derive(Debug, Serialize)]
pub struct CallbackAck {
    #[serde(rename = "ResultCode")]
    pub result_code: i64,
    #[serde(rename = "ResultDesc")]
    pub result_desc: &'static str,
}

impl CallbackAck {
    pub fn accepted() -> Self {
        Self {
            result_code: 0,
            result_desc: "Accepted",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initiate_request_parses_camel_case() {
        let request: InitiateRequest = serde_json::from_str(
            r#"{"phoneNumber":"0710236087","amount":1500,"cartItems":3}"#,
        )
        .expect("parse");
        assert_eq!(request.phone_number, "0710236087");
        assert_eq!(request.amount, 1500.0);
        assert_eq!(request.cart_items, Some(3));
    }

    #[test]
    fn initiate_request_tolerates_missing_cart_items() {
        let request: InitiateRequest =
            serde_json::from_str(r#"{"phoneNumber":"0710236087","amount":1}"#).expect("parse");
        assert_eq!(request.cart_items, None);
    }

    #[test]
    fn callback_envelope_parses_the_full_provider_shape() {
        let envelope: CallbackEnvelope = serde_json::from_str(
            r#"{
                "Body": {
                    "stkCallback": {
                        "MerchantRequestID": "mr-1",
                        "CheckoutRequestID": "ws_CO_1",
                        "ResultCode": 0,
                        "ResultDesc": "The service request is processed successfully.",
                        "CallbackMetadata": {
                            "Item": [
                                { "Name": "Amount", "Value": 1500 },
                                { "Name": "MpesaReceiptNumber", "Value": "QK12ABC3DE" },
                                { "Name": "Balance" },
                                { "Name": "PhoneNumber", "Value": 254710236087 }
                            ]
                        }
                    }
                }
            }"#,
        )
        .expect("parse");
        let callback = envelope
            .body
            .and_then(|b| b.stk_callback)
            .expect("callback present");
        assert_eq!(callback.checkout_request_id, "ws_CO_1");
        assert_eq!(callback.result_code, 0);
        let items = callback.callback_metadata.expect("metadata").item;
        assert_eq!(items.len(), 4);
        assert_eq!(items[1].name, "MpesaReceiptNumber");
        assert!(items[2].value.is_none());
    }

    #[test]
    fn envelope_without_nested_callback_still_parses() {
        let envelope: CallbackEnvelope = serde_json::from_str(r#"{"Body":{}}"#).expect("parse");
        assert!(envelope.body.expect("body").stk_callback.is_none());

        let empty: CallbackEnvelope = serde_json::from_str("{}").expect("parse");
        assert!(empty.body.is_none());
    }

    #[test]
    fn ack_has_the_fixed_shape() {
        let json = serde_json::to_string(&CallbackAck::accepted()).expect("serialize");
        assert_eq!(json, r#"{"ResultCode":0,"ResultDesc":"Accepted"}"#);
    }
}
