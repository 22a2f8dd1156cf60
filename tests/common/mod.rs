#![allow(dead_code)]

use axum::body::Body;
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;

use mpesa_express::build_router;
use mpesa_express::config::{AppConfig, CallbackMode, UPSTREAM_TIMEOUT};
use mpesa_express::state::AppState;

pub const TOKEN_PATH: &str = "/oauth/v1/generate";
pub const STK_PUSH_PATH: &str = "/mpesa/stkpush/v1/processrequest";

/// Config pointing both Daraja endpoints at `base_url`.
pub fn test_config(base_url: &str, callback_mode: CallbackMode) -> AppConfig {
    AppConfig {
        mpesa_consumer_key: "test-key".into(),
        mpesa_consumer_secret: "test-secret".into(),
        mpesa_short_code: "174379".into(),
        mpesa_passkey: "test-passkey".into(),
        mpesa_token_url: format!("{base_url}{TOKEN_PATH}?grant_type=client_credentials"),
        mpesa_stk_push_url: format!("{base_url}{STK_PUSH_PATH}"),
        callback_base_url: "https://relay.example".into(),
        callback_mode,
        port: 3000,
        upstream_timeout: UPSTREAM_TIMEOUT,
    }
}

pub fn test_app(config: AppConfig) -> Router {
    build_router(AppState::new(config).expect("state"))
}

pub async fn body_json(resp: Response<Body>) -> Value {
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn body_text(resp: Response<Body>) -> String {
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}
