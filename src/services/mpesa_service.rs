// services/mpesa_service.rs
use base64::{engine::general_purpose::STANDARD as base64, Engine as _};
use chrono::Local;
use reqwest::{header, Client};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{error, info};

use crate::config::AppConfig;
use crate::errors::{AppError, Result};
use crate::models::payment::ValidatedPayment;

const TRANSACTION_TYPE: &str = "CustomerPayBillOnline";
const ACCOUNT_REFERENCE: &str = "Marps Africa";
const TRANSACTION_DESC: &str = "Payment Testing";

#[derive(Debug, Serialize)]
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
    pub amount: String,
    #[serde(rename = "PartyA")]
    pub party_a: String,
    #[serde(rename = "PartyB")]
    pub party_b: String,
    #[serde(rename = "PhoneNumber")]
    pub phone_number: String,
    #[serde(rename = "CallBackURL")]
    pub callback_url: String,
    #[serde(rename = "AccountReference")]
    pub account_reference: String,
    #[serde(rename = "TransactionDesc")]
    pub transaction_desc: String,
}

/// Daraja's answer to an STK push, relayed to the caller as-is.
#[derive(Debug)]
pub struct ProviderResponse {
    pub status: u16,
    /// `None` when Daraja answered with a JSON `null`.
    pub body: Option<Map<String, Value>>,
}

#[derive(Debug, Clone)]
pub struct MpesaService {
    config: AppConfig,
    client: Client,
}

impl MpesaService {
    pub fn new(config: AppConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.upstream_timeout)
            .build()
            .map_err(|e| {
                error!("Failed to create HTTP client: {}", e);
                AppError::RequestBuild
            })?;

        Ok(MpesaService { config, client })
    }

    /// Fetches a fresh OAuth token. Tokens are never cached: every push gets
    /// its own.
    pub async fn get_access_token(&self) -> Result<String> {
        let response = self
            .client
            .get(&self.config.mpesa_token_url)
            .basic_auth(
                &self.config.mpesa_consumer_key,
                Some(&self.config.mpesa_consumer_secret),
            )
            .send()
            .await
            .map_err(|e| token_failure("Failed to send request", e))?;

        info!("Token response status: {}", response.status());

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("Failed to get access token: {} - {}", status, body);
            return Err(AppError::TokenRetrieval);
        }

        let body: Map<String, Value> = response
            .json()
            .await
            .map_err(|e| token_failure("Failed to decode token response", e))?;

        match body.get("access_token").and_then(Value::as_str) {
            Some(token) => Ok(token.to_string()),
            None => {
                error!("Access token not found in response: {:?}", body);
                Err(AppError::TokenRetrieval)
            }
        }
    }

    pub async fn initiate_stk_push(&self, payment: &ValidatedPayment) -> Result<ProviderResponse> {
        info!("STK push for {} - KSh {}", payment.phone, payment.amount);

        let access_token = self.get_access_token().await?;
        let timestamp = Local::now().format("%Y%m%d%H%M%S").to_string();
        let stk_request = self.build_stk_request(payment, &timestamp);

        info!("Sending payload: {:?}", stk_request);

        let request = self
            .client
            .post(&self.config.mpesa_stk_push_url)
            .header(header::AUTHORIZATION, format!("Bearer {}", access_token))
            .json(&stk_request)
            .build()
            .map_err(|e| {
                error!("Failed to create request: {}", e);
                AppError::RequestBuild
            })?;

        let response = self.client.execute(request).await.map_err(|e| {
            error!("Failed to send request: {}", e);
            AppError::RequestSend
        })?;

        let status = response.status().as_u16();
        let bytes = response.bytes().await.map_err(|e| {
            error!("Failed to read response body: {}", e);
            AppError::ResponseRead
        })?;

        let body: Option<Map<String, Value>> = serde_json::from_slice(&bytes).map_err(|e| {
            error!("Failed to unmarshal response: {}", e);
            AppError::ResponseDecode
        })?;

        info!("STK push answered with {}", status);
        Ok(ProviderResponse { status, body })
    }

    pub fn build_stk_request(&self, payment: &ValidatedPayment, timestamp: &str) -> StkPushRequest {
        StkPushRequest {
            business_short_code: self.config.mpesa_short_code.clone(),
            password: self.generate_password(timestamp),
            timestamp: timestamp.to_string(),
            transaction_type: TRANSACTION_TYPE.to_string(),
            amount: payment.amount.clone(),
            party_a: payment.phone.clone(),
            party_b: self.config.mpesa_short_code.clone(),
            phone_number: payment.phone.clone(),
            callback_url: self.config.callback_url(),
            account_reference: ACCOUNT_REFERENCE.to_string(),
            transaction_desc: TRANSACTION_DESC.to_string(),
        }
    }

    fn generate_password(&self, timestamp: &str) -> String {
        let password_string = format!(
            "{}{}{}",
            self.config.mpesa_short_code, self.config.mpesa_passkey, timestamp
        );
        base64.encode(password_string)
    }
}

fn token_failure(context: &str, err: reqwest::Error) -> AppError {
    error!("{}: {}", context, err);
    AppError::TokenRetrieval
}

#[cfg(test)]
mod tests {
    use super::*;
    use ::base64::Engine as _;
    use crate::config::{CallbackMode, STK_PUSH_URL, UPSTREAM_TIMEOUT};

    fn service() -> MpesaService {
        MpesaService::new(AppConfig {
            mpesa_consumer_key: "key".into(),
            mpesa_consumer_secret: "secret".into(),
            mpesa_short_code: "174379".into(),
            mpesa_passkey: "passkey".into(),
            mpesa_token_url: "http://localhost/oauth".into(),
            mpesa_stk_push_url: STK_PUSH_URL.into(),
            callback_base_url: "https://relay.example".into(),
            callback_mode: CallbackMode::Structured,
            port: 3000,
            upstream_timeout: UPSTREAM_TIMEOUT,
        })
        .unwrap()
    }

    fn payment() -> ValidatedPayment {
        ValidatedPayment {
            phone: "254712345678".into(),
            amount: "10".into(),
        }
    }

    #[test]
    fn password_embeds_shortcode_passkey_and_timestamp() {
        let password = service().generate_password("20240101120000");
        let decoded = base64.decode(password).unwrap();
        assert_eq!(decoded, b"174379passkey20240101120000");
    }

    #[test]
    fn password_changes_with_timestamp() {
        let service = service();
        assert_ne!(
            service.generate_password("20240101120000"),
            service.generate_password("20240101120001")
        );
    }

    #[test]
    fn stk_request_wire_format() {
        let request = service().build_stk_request(&payment(), "20240101120000");
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["BusinessShortCode"], "174379");
        assert_eq!(json["Timestamp"], "20240101120000");
        assert_eq!(json["TransactionType"], "CustomerPayBillOnline");
        assert_eq!(json["Amount"], "10");
        assert_eq!(json["PartyA"], "254712345678");
        assert_eq!(json["PartyB"], "174379");
        assert_eq!(json["PhoneNumber"], "254712345678");
        assert_eq!(json["CallBackURL"], "https://relay.example/callback");
        assert_eq!(json["AccountReference"], "Marps Africa");
        assert_eq!(json["TransactionDesc"], "Payment Testing");
        assert_eq!(json.as_object().unwrap().len(), 11);
    }
}
