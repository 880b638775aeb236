use std::sync::Arc;

use axum::{routing::get, Extension, Json, Router};
use chrono::Utc;
use entitlements::{plan_details, Plan, PlanDetails};
use serde::Serialize;
use strum::IntoEnumIterator as _;

use super::current_user;
use crate::auth::Principal;
use crate::metering::{usage_summary, UsageSummary};
use crate::{AppState, Result};

pub fn router() -> Router {
    Router::new().route("/usage", get(get_usage))
}

/// Routes that don't require a signed-in user.
pub fn public_router() -> Router {
    Router::new().route("/plans", get(list_plans))
}

async fn get_usage(
    Extension(app): Extension<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<UsageSummary>> {
    let user = current_user(&app, &principal).await?;
    let summary = usage_summary(&app.db, &user, Utc::now()).await?;
    Ok(Json(summary))
}

#[derive(Debug, Serialize)]
pub struct ListPlansResponse {
    pub plans: Vec<PlanDetails>,
}

async fn list_plans() -> Json<ListPlansResponse> {
    Json(ListPlansResponse {
        plans: Plan::iter().map(plan_details).collect(),
    })
}
