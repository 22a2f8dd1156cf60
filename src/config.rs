// config.rs
use std::env;
use std::time::Duration;

use thiserror::Error;

/// Daraja sandbox endpoint for M-Pesa Express requests.
pub const STK_PUSH_URL: &str = "https://sandbox.safaricom.co.ke/mpesa/stkpush/v1/processrequest";

/// Ceiling on every outbound Daraja call.
pub const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Error loading .env file: {0}")]
    EnvFile(#[from] dotenvy::Error),

    #[error("{0} must be set")]
    MissingVar(&'static str),
}

/// How `/callback` treats the provider's notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackMode {
    /// Decode the STK callback, pull out the receipt and acknowledge it.
    Structured,
    /// Log whatever JSON object arrives and send it straight back.
    Echo,
}

/// Deployment profiles of the relay. Each one pins its own port, public
/// callback host and callback handling; none of these come from the
/// environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deployment {
    Structured,
    Echo,
}

impl Deployment {
    pub fn current() -> Self {
        if cfg!(feature = "echo-callback") {
            Deployment::Echo
        } else {
            Deployment::Structured
        }
    }

    pub fn port(self) -> u16 {
        match self {
            Deployment::Structured => 3000,
            Deployment::Echo => 5000,
        }
    }

    pub fn callback_base_url(self) -> &'static str {
        match self {
            Deployment::Structured => "https://webhook.site/9e1a6307-9adc-465b-a37b-78db245785a7",
            Deployment::Echo => "https://sms-api.marps.co.ke",
        }
    }

    pub fn callback_mode(self) -> CallbackMode {
        match self {
            Deployment::Structured => CallbackMode::Structured,
            Deployment::Echo => CallbackMode::Echo,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub mpesa_consumer_key: String,
    pub mpesa_consumer_secret: String,
    pub mpesa_short_code: String,
    pub mpesa_passkey: String,
    pub mpesa_token_url: String,
    pub mpesa_stk_push_url: String,
    pub callback_base_url: String,
    pub callback_mode: CallbackMode,
    pub port: u16,
    pub upstream_timeout: Duration,
}

impl AppConfig {
    /// Loads `.env` and reads the Daraja credentials for the given profile.
    pub fn from_env(deployment: Deployment) -> Result<Self, ConfigError> {
        dotenvy::dotenv()?;

        Ok(AppConfig {
            mpesa_consumer_key: required("MPESA_CONSUMER_KEY")?,
            mpesa_consumer_secret: required("MPESA_CONSUMER_SECRET")?,
            mpesa_short_code: required("MPESA_SHORTCODE")?,
            mpesa_passkey: required("MPESA_PASS_KEY")?,
            mpesa_token_url: required("MPESA_TOKEN_URL")?,
            mpesa_stk_push_url: STK_PUSH_URL.to_string(),
            callback_base_url: deployment.callback_base_url().to_string(),
            callback_mode: deployment.callback_mode(),
            port: deployment.port(),
            upstream_timeout: UPSTREAM_TIMEOUT,
        })
    }

    pub fn callback_url(&self) -> String {
        format!("{}/callback", self.callback_base_url)
    }

    pub fn get_config_info(&self) -> serde_json::Value {
        serde_json::json!({
            "business_shortcode": self.mpesa_short_code,
            "token_url": self.mpesa_token_url,
            "stk_push_url": self.mpesa_stk_push_url,
            "callback_url": self.callback_url(),
            "callback_mode": format!("{:?}", self.callback_mode),
            "consumer_key_set": !self.mpesa_consumer_key.is_empty(),
            "consumer_secret_set": !self.mpesa_consumer_secret.is_empty(),
            "port": self.port,
            "upstream_timeout_secs": self.upstream_timeout.as_secs(),
        })
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::MissingVar(name))
}
