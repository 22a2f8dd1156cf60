// handlers/mpesa_handlers.rs
use axum::{
    body::Bytes,
    extract::{Form, FromRequest, Multipart, Query, Request, State},
    http::{header, Method, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use crate::config::CallbackMode;
use crate::errors::{AppError, Result};
use crate::models::mpesa_transactions::{CallbackData, TransactionDetails};
use crate::models::payment::PaymentQuery;
use crate::state::AppState;

/// `GET /pay?phone=..&amount=..` or `POST /pay` with an urlencoded or
/// multipart form.
pub async fn initiate_payment(State(state): State<AppState>, request: Request) -> Result<Response> {
    let query = payment_params(&state, request).await;

    let payment = query.validate().map_err(|e| {
        warn!("Rejected payment request {:?}: {}", query, e);
        e
    })?;

    let response = state.mpesa_service.initiate_stk_push(&payment).await?;
    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::BAD_GATEWAY);

    Ok((status, Json(response.body)).into_response())
}

// GET reads the query string, POST the form body; nothing else carries params.
async fn payment_params(state: &AppState, request: Request) -> PaymentQuery {
    let method = request.method().clone();

    if method == Method::GET {
        Query::<PaymentQuery>::try_from_uri(request.uri())
            .map(|Query(query)| query)
            .unwrap_or_default()
    } else if method == Method::POST && is_multipart(&request) {
        match Multipart::from_request(request, state).await {
            Ok(multipart) => multipart_params(multipart).await,
            Err(e) => {
                warn!("Unreadable multipart form: {}", e);
                PaymentQuery::default()
            }
        }
    } else if method == Method::POST {
        Form::<PaymentQuery>::from_request(request, state)
            .await
            .map(|Form(query)| query)
            .unwrap_or_default()
    } else {
        PaymentQuery::default()
    }
}

fn is_multipart(request: &Request) -> bool {
    request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.starts_with("multipart/form-data"))
        .unwrap_or(false)
}

// First text value per name wins; file parts are skipped. A malformed body
// keeps whatever was read before the error.
async fn multipart_params(mut multipart: Multipart) -> PaymentQuery {
    let mut phone = None;
    let mut amount = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                warn!("Unreadable multipart field: {}", e);
                break;
            }
        };

        if field.file_name().is_some() {
            continue;
        }

        let slot = match field.name() {
            Some("phone") => &mut phone,
            Some("amount") => &mut amount,
            _ => continue,
        };

        if slot.is_none() {
            *slot = field.text().await.ok();
        }
    }

    PaymentQuery {
        phone: phone.unwrap_or_default(),
        amount: amount.unwrap_or_default(),
    }
}

pub async fn mpesa_callback(State(state): State<AppState>, body: Bytes) -> Result<Response> {
    match state.config.callback_mode {
        CallbackMode::Structured => structured_callback(&body),
        CallbackMode::Echo => echo_callback(&body),
    }
}

fn structured_callback(body: &[u8]) -> Result<Response> {
    let callback_data = CallbackData::from_slice(body).map_err(|_| AppError::InvalidJson)?;

    info!("Callback data received: {:?}", callback_data);

    let callback = &callback_data.body.stk_callback;
    if callback.result_code != 0 {
        return Ok(Json(json!({
            "status": "failed",
            "message": callback.result_desc,
        }))
        .into_response());
    }

    let details = TransactionDetails::from_items(&callback.callback_metadata.items);
    info!("Amount: {}", details.amount);
    info!("Receipt Number: {}", details.receipt_number);
    info!("Transaction Date: {}", details.transaction_date);
    info!("Phone Number: {}", details.phone_number);

    match details.formatted_date() {
        Some(date) => info!("Formatted Date: {}", date),
        None => warn!("Unparseable transaction date: {}", details.transaction_date),
    }

    Ok(Json(json!({
        "status": "success",
        "message": "Payment processed successfully",
        "receipt": details.receipt_number,
    }))
    .into_response())
}

fn echo_callback(body: &[u8]) -> Result<Response> {
    let payload: Map<String, Value> =
        serde_json::from_slice(body).map_err(|_| AppError::InvalidJson)?;

    info!("Callback data received: {:?}", payload);

    Ok((StatusCode::OK, Json(payload)).into_response())
}
