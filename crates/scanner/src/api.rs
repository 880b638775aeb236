pub mod billing;
pub mod competitor_scans;
pub mod sales_tracking;
pub mod scans;
pub mod usage;
pub mod voice_scans;

use crate::{auth::Principal, db::user, AppState, Error, Result};
use axum::{body::Body, http::StatusCode, middleware, Extension, Router};
use chrono::{DateTime, NaiveDateTime, TimeZone as _, Utc};
use std::sync::Arc;
use tower::ServiceBuilder;

pub fn routes(state: Arc<AppState>) -> Router<(), Body> {
    let authenticated = Router::new()
        .merge(scans::router())
        .merge(competitor_scans::router())
        .merge(voice_scans::router())
        .merge(sales_tracking::router())
        .merge(usage::router())
        .layer(
            ServiceBuilder::new()
                .layer(Extension(state.clone()))
                .layer(middleware::from_fn(crate::auth::resolve_principal)),
        );

    let public = Router::new()
        .merge(billing::router())
        .merge(usage::public_router())
        .layer(Extension(state));

    authenticated.merge(public)
}

/// Loads the user behind the request's principal.
async fn current_user(app: &AppState, principal: &Principal) -> Result<user::Model> {
    app.db
        .get_user_by_email(&principal.email)
        .await?
        .ok_or_else(|| Error::http(StatusCode::NOT_FOUND, "User not found"))
}

/// Returns the trimmed value, treating blank strings as missing.
fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

/// Timestamps are stored as naive UTC.
fn utc(timestamp: NaiveDateTime) -> DateTime<Utc> {
    Utc.from_utc_datetime(&timestamp)
}
