use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use entitlements::ResourceKind;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{current_user, non_blank, utc};
use crate::auth::Principal;
use crate::db::{user, voice_scan, CreateVoiceScanParams, Database, VoiceScanId};
use crate::insights::{Insight, VoiceScanInsight, VoiceScanRequest};
use crate::metering::{perform_metered_action, MeteredAction};
use crate::{AppState, Error, Result};

const RECENT_VOICE_SCANS_LIMIT: u64 = 20;

pub fn router() -> Router {
    Router::new()
        .route("/voice-scan", post(create_voice_scan))
        .route("/scan/voice", post(create_voice_scan))
        .route("/voice-search-optimizer", post(create_voice_scan))
        .route("/user/voice-scans", get(list_voice_scans))
}

#[async_trait]
impl MeteredAction for VoiceScanRequest {
    const KIND: ResourceKind = ResourceKind::VoiceScan;

    type Record = voice_scan::Model;

    async fn persist(
        &self,
        db: &Database,
        user: &user::Model,
        insight: Insight<VoiceScanInsight>,
        now: DateTime<Utc>,
    ) -> Result<voice_scan::Model> {
        let degraded = insight.is_degraded();
        let payload = insight.payload();
        db.create_voice_scan(
            &CreateVoiceScanParams {
                user_id: user.id,
                url: self.url.clone(),
                voice_score: payload.voice_score.round().clamp(0.0, 100.0) as i32,
                analysis: serde_json::to_string(payload)?,
                degraded,
            },
            now,
        )
        .await
    }
}

#[derive(Debug, Deserialize)]
struct CreateVoiceScanBody {
    url: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceScanResponse {
    pub id: VoiceScanId,
    pub url: String,
    pub voice_score: i32,
    /// The full voice-search analysis.
    pub recommendations: Value,
    pub degraded: bool,
    pub created_at: DateTime<Utc>,
}

impl From<voice_scan::Model> for VoiceScanResponse {
    fn from(scan: voice_scan::Model) -> Self {
        Self {
            id: scan.id,
            url: scan.url,
            voice_score: scan.voice_score,
            recommendations: serde_json::from_str(&scan.analysis).unwrap_or(Value::Null),
            degraded: scan.degraded,
            created_at: utc(scan.created_at),
        }
    }
}

async fn create_voice_scan(
    Extension(app): Extension<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    body: std::result::Result<Json<CreateVoiceScanBody>, JsonRejection>,
) -> Result<Json<VoiceScanResponse>> {
    let Json(body) = body?;
    let url = non_blank(body.url.as_deref())
        .ok_or_else(|| Error::http(StatusCode::BAD_REQUEST, "URL is required"))?;
    let user = current_user(&app, &principal).await?;

    let request = VoiceScanRequest {
        url: url.to_string(),
    };
    let scan = perform_metered_action(&app, &user, &request, Utc::now()).await?;

    Ok(Json(scan.into()))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListVoiceScansResponse {
    pub voice_scans: Vec<VoiceScanResponse>,
}

async fn list_voice_scans(
    Extension(app): Extension<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<ListVoiceScansResponse>> {
    let user = current_user(&app, &principal).await?;
    let scans = app
        .db
        .get_recent_voice_scans(user.id, RECENT_VOICE_SCANS_LIMIT)
        .await?;

    Ok(Json(ListVoiceScansResponse {
        voice_scans: scans.into_iter().map(Into::into).collect(),
    }))
}
