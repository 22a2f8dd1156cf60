use serde::Deserialize;

use crate::errors::{AppError, Result};

/// Raw `/pay` parameters, from the query string or an urlencoded form.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PaymentQuery {
    pub phone: String,
    pub amount: String,
}

/// A `/pay` request that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedPayment {
    /// Normalized to the `254XXXXXXXXX` international form.
    pub phone: String,
    /// Forwarded to Daraja exactly as the caller sent it.
    pub amount: String,
}

impl PaymentQuery {
    /// Checks run in a fixed order and the first failure wins.
    pub fn validate(&self) -> Result<ValidatedPayment> {
        if self.phone.is_empty() || self.amount.is_empty() {
            return Err(AppError::MissingFields);
        }

        let phone = normalize_phone(&self.phone);

        if !phone.bytes().all(|b| b.is_ascii_digit()) {
            return Err(AppError::PhoneNotNumeric);
        }

        // TODO: a normalized number is always 12 digits; tighten the lower bound
        // once merchants confirm no shorter numbers are sent.
        if phone.len() < 9 || phone.len() > 12 {
            return Err(AppError::InvalidPhone);
        }

        match self.amount.parse::<f64>() {
            Ok(value) if value.is_finite() && value > 0.0 => {}
            _ => return Err(AppError::InvalidAmount),
        }

        Ok(ValidatedPayment {
            phone,
            amount: self.amount.clone(),
        })
    }
}

/// `0712...` becomes `254712...`, `254...` is kept, anything else gets `254`
/// prepended.
pub fn normalize_phone(phone: &str) -> String {
    if let Some(rest) = phone.strip_prefix('0') {
        format!("254{}", rest)
    } else if phone.starts_with("254") {
        phone.to_string()
    } else {
        format!("254{}", phone)
    }
}
