use std::sync::Arc;

use axum::{
    body::Bytes,
    http::{HeaderMap, StatusCode},
    routing::post,
    Extension, Json, Router,
};
use chrono::Utc;
use serde::Serialize;

use crate::billing::{handle_billing_event, parse_event, verify_signature, SIGNATURE_HEADER};
use crate::{AppState, Error, Result};

pub fn router() -> Router {
    Router::new()
        .route("/billing-webhook", post(handle_webhook))
        .route("/webhook", post(handle_webhook))
}

#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub received: bool,
}

fn webhook_error(error: impl std::fmt::Display) -> Error {
    Error::http(StatusCode::BAD_REQUEST, format!("Webhook Error: {error}"))
}

/// Receives billing-provider events. Authenticated by signature rather than by session.
async fn handle_webhook(
    Extension(app): Extension<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookResponse>> {
    let now = Utc::now();
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());
    verify_signature(
        &body,
        signature,
        app.config.stripe_webhook_secret.as_deref(),
        now,
        app.config.stripe_webhook_tolerance(),
    )
    .map_err(webhook_error)?;

    let event = parse_event(&body).map_err(webhook_error)?;

    if let Err(error) = handle_billing_event(&app, &event, now).await {
        tracing::error!(
            target: "billing",
            event_id = %event.id,
            event_type = %event.event_type,
            ?error,
            "failed to apply billing event"
        );
        return Err(Error::http(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Webhook handler failed",
        ));
    }

    Ok(Json(WebhookResponse { received: true }))
}
