use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Layout of `TransactionDate` inside the callback metadata.
const DARAJA_DATE_FORMAT: &str = "%Y%m%d%H%M%S";
const DISPLAY_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// Every field defaults when absent or null; only a wrongly typed field fails
// decoding.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CallbackData {
    #[serde(rename = "Body", deserialize_with = "null_as_default")]
    pub body: CallbackBody,
}

impl CallbackData {
    /// Decodes a callback body; a bare `null` is an empty callback.
    pub fn from_slice(body: &[u8]) -> serde_json::Result<Self> {
        Ok(serde_json::from_slice::<Option<Self>>(body)?.unwrap_or_default())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CallbackBody {
    #[serde(rename = "stkCallback", deserialize_with = "null_as_default")]
    pub stk_callback: StkCallback,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct StkCallback {
    #[serde(rename = "MerchantRequestID", deserialize_with = "null_as_default")]
    pub merchant_request_id: String,
    #[serde(rename = "CheckoutRequestID", deserialize_with = "null_as_default")]
    pub checkout_request_id: String,
    #[serde(rename = "ResultCode", deserialize_with = "null_as_default")]
    pub result_code: i64,
    #[serde(rename = "ResultDesc", deserialize_with = "null_as_default")]
    pub result_desc: String,
    #[serde(rename = "CallbackMetadata", deserialize_with = "null_as_default")]
    pub callback_metadata: CallbackMetadata,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CallbackMetadata {
    #[serde(rename = "Item", deserialize_with = "items_skipping_null")]
    pub items: Vec<MetadataItem>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct MetadataItem {
    #[serde(rename = "Name", deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(rename = "Value")]
    pub value: Value,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// A null entry carries no name, so it could never match a known field.
fn items_skipping_null<'de, D>(deserializer: D) -> Result<Vec<MetadataItem>, D::Error>
where
    D: Deserializer<'de>,
{
    let items = Option::<Vec<Option<MetadataItem>>>::deserialize(deserializer)?;
    Ok(items.unwrap_or_default().into_iter().flatten().collect())
}

/// A metadata value narrowed to the shapes Daraja sends.
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataValue {
    Number(serde_json::Number),
    Text(String),
    Absent,
}

impl From<&Value> for MetadataValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Number(n) => MetadataValue::Number(n.clone()),
            Value::String(s) => MetadataValue::Text(s.clone()),
            _ => MetadataValue::Absent,
        }
    }
}

impl MetadataValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetadataValue::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            MetadataValue::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            MetadataValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// Fields of a successful payment pulled out of `CallbackMetadata.Item`.
///
/// An item whose value has the wrong type resets its field to the default
/// instead of failing; when a name repeats, the last item wins.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TransactionDetails {
    pub amount: f64,
    pub receipt_number: String,
    pub transaction_date: i64,
    pub phone_number: i64,
}

impl TransactionDetails {
    pub fn from_items(items: &[MetadataItem]) -> Self {
        let mut details = TransactionDetails::default();

        for item in items {
            let value = MetadataValue::from(&item.value);
            match item.name.as_str() {
                "Amount" => details.amount = value.as_f64().unwrap_or_default(),
                "MpesaReceiptNumber" => {
                    details.receipt_number = value.as_text().unwrap_or_default().to_string()
                }
                "TransactionDate" => {
                    details.transaction_date = value.as_i64().unwrap_or_default()
                }
                "PhoneNumber" => details.phone_number = value.as_i64().unwrap_or_default(),
                _ => {}
            }
        }

        details
    }

    /// `20191219102115` rendered as `2019-12-19 10:21:15`.
    pub fn formatted_date(&self) -> Option<String> {
        NaiveDateTime::parse_from_str(&self.transaction_date.to_string(), DARAJA_DATE_FORMAT)
            .ok()
            .map(|date| date.format(DISPLAY_DATE_FORMAT).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn items(value: Value) -> Vec<MetadataItem> {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn decodes_daraja_success_callback() {
        let data: CallbackData = serde_json::from_value(json!({
            "Body": {
                "stkCallback": {
                    "MerchantRequestID": "29115-34620561-1",
                    "CheckoutRequestID": "ws_CO_191220191020363925",
                    "ResultCode": 0,
                    "ResultDesc": "The service request is processed successfully.",
                    "CallbackMetadata": {
                        "Item": [
                            { "Name": "Amount", "Value": 1.00 },
                            { "Name": "MpesaReceiptNumber", "Value": "NLJ7RT61SV" },
                            { "Name": "Balance" },
                            { "Name": "TransactionDate", "Value": 20191219102115u64 },
                            { "Name": "PhoneNumber", "Value": 254708374149u64 }
                        ]
                    }
                }
            }
        }))
        .unwrap();

        let callback = &data.body.stk_callback;
        assert_eq!(callback.result_code, 0);
        assert_eq!(callback.checkout_request_id, "ws_CO_191220191020363925");

        let details = TransactionDetails::from_items(&callback.callback_metadata.items);
        assert_eq!(details.amount, 1.0);
        assert_eq!(details.receipt_number, "NLJ7RT61SV");
        assert_eq!(details.transaction_date, 20191219102115);
        assert_eq!(details.phone_number, 254708374149);
        assert_eq!(details.formatted_date().as_deref(), Some("2019-12-19 10:21:15"));
    }

    #[test]
    fn failed_callback_without_metadata() {
        let data: CallbackData = serde_json::from_value(json!({
            "Body": { "stkCallback": { "ResultCode": 1032, "ResultDesc": "Request cancelled by user" } }
        }))
        .unwrap();

        assert_eq!(data.body.stk_callback.result_code, 1032);
        assert!(data.body.stk_callback.callback_metadata.items.is_empty());
    }

    #[test]
    fn null_levels_decode_as_empty() {
        for body in [
            "null",
            r#"{"Body":null}"#,
            r#"{"Body":{"stkCallback":null}}"#,
            r#"{"Body":{"stkCallback":{"ResultCode":null,"ResultDesc":null,"CallbackMetadata":null}}}"#,
            r#"{"Body":{"stkCallback":{"CallbackMetadata":{"Item":null}}}}"#,
        ] {
            let data = CallbackData::from_slice(body.as_bytes()).unwrap();
            assert_eq!(data.body.stk_callback.result_code, 0, "body {body}");
            assert!(data.body.stk_callback.callback_metadata.items.is_empty());
        }
    }

    #[test]
    fn null_items_are_skipped() {
        let data = CallbackData::from_slice(
            br#"{"Body":{"stkCallback":{"CallbackMetadata":{"Item":[null,{"Name":"MpesaReceiptNumber","Value":"ABC123"}]}}}}"#,
        )
        .unwrap();

        let details = TransactionDetails::from_items(&data.body.stk_callback.callback_metadata.items);
        assert_eq!(details.receipt_number, "ABC123");
    }

    #[test]
    fn mistyped_result_code_is_rejected() {
        let result = serde_json::from_value::<CallbackData>(json!({
            "Body": { "stkCallback": { "ResultCode": "zero" } }
        }));
        assert!(result.is_err());
    }

    #[test]
    fn wrong_value_types_fall_back_to_defaults() {
        let details = TransactionDetails::from_items(&items(json!([
            { "Name": "Amount", "Value": "100" },
            { "Name": "MpesaReceiptNumber", "Value": 12345 },
            { "Name": "TransactionDate", "Value": "20191219102115" },
            { "Name": "PhoneNumber", "Value": 2547.5 }
        ])));

        assert_eq!(details, TransactionDetails::default());
    }

    #[test]
    fn later_items_override_earlier_ones() {
        let details = TransactionDetails::from_items(&items(json!([
            { "Name": "MpesaReceiptNumber", "Value": "FIRST" },
            { "Name": "MpesaReceiptNumber", "Value": "SECOND" },
            { "Name": "Amount", "Value": 50 },
            { "Name": "Amount", "Value": null }
        ])));

        assert_eq!(details.receipt_number, "SECOND");
        assert_eq!(details.amount, 0.0);
    }

    #[test]
    fn unparseable_date_is_left_unformatted() {
        let details = TransactionDetails {
            transaction_date: 20191399999999,
            ..Default::default()
        };
        assert_eq!(details.formatted_date(), None);
        assert_eq!(TransactionDetails::default().formatted_date(), None);
    }
}
