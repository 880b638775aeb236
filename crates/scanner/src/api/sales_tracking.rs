use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{rejection::JsonRejection, Path, Query},
    http::StatusCode,
    routing::{delete, get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use entitlements::ResourceKind;
use sea_orm::SqlErr;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{current_user, non_blank, utc};
use crate::alerts::{derive_alerts, Alert};
use crate::auth::Principal;
use crate::db::{
    competitor_tracking, tracking_snapshot, user, CreateTrackingParams, Database, SnapshotId,
    TrackingId, TrackingMetrics,
};
use crate::insights::{generate_insight, Insight, SalesTrackingRequest};
use crate::metering::{perform_metered_action, MeteredAction};
use crate::{AppState, Error, Result};

/// Roughly a quarter of weekly observations.
const ANALYSIS_HISTORY_LIMIT: u64 = 12;

pub fn router() -> Router {
    Router::new()
        .route("/sales-tracking/add-competitor", post(add_competitor))
        .route(
            "/sales-tracking/watchlist",
            get(get_watchlist).post(add_competitor),
        )
        .route("/sales-tracking/analyze", get(analyze))
        .route("/sales-tracking/history", get(get_history))
        .route("/sales-tracking/alerts", get(get_alerts))
        .route("/sales-tracking/:id", delete(stop_tracking))
        .route("/sales-tracking/:id/snapshots", post(record_snapshot))
}

#[async_trait]
impl MeteredAction for SalesTrackingRequest {
    const KIND: ResourceKind = ResourceKind::TrackingSlot;

    type Record = (competitor_tracking::Model, tracking_snapshot::Model);

    /// Runs after the quota gate, so a user at their limit sees the limit error first.
    async fn preflight(&self, db: &Database, user: &user::Model) -> Result<()> {
        if db
            .get_tracking_by_url(user.id, &self.competitor_url)
            .await?
            .is_some()
        {
            return Err(already_tracking());
        }
        Ok(())
    }

    async fn persist(
        &self,
        db: &Database,
        user: &user::Model,
        insight: Insight<TrackingMetrics>,
        now: DateTime<Utc>,
    ) -> Result<Self::Record> {
        let degraded = insight.is_degraded();
        db.create_tracking_with_snapshot(
            &CreateTrackingParams {
                user_id: user.id,
                competitor_url: self.competitor_url.clone(),
                company_name: self.company_name.clone(),
                metrics: insight.into_payload(),
                degraded,
            },
            now,
        )
        .await
        .map_err(|error| match error {
            // A concurrent request for the same URL won the insert after our preflight.
            Error::Database(error)
                if matches!(error.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) =>
            {
                already_tracking()
            }
            error => error,
        })
    }
}

fn already_tracking() -> Error {
    Error::http(StatusCode::BAD_REQUEST, "Already tracking this competitor")
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentMetrics {
    pub ai_mentions: i32,
    pub recommendation_frequency: f64,
    pub citation_rate: f64,
    pub shopping_presence: f64,
    pub brand_trust_score: f64,
    pub estimated_traffic: i32,
}

impl From<&competitor_tracking::Model> for CurrentMetrics {
    fn from(tracking: &competitor_tracking::Model) -> Self {
        Self {
            ai_mentions: tracking.ai_mentions,
            recommendation_frequency: tracking.recommendation_frequency,
            citation_rate: tracking.citation_rate,
            shopping_presence: tracking.shopping_presence,
            brand_trust_score: tracking.brand_trust_score,
            estimated_traffic: tracking.estimated_traffic,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingResponse {
    pub id: TrackingId,
    pub competitor_url: String,
    pub company_name: String,
    pub metrics: CurrentMetrics,
    pub degraded: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<competitor_tracking::Model> for TrackingResponse {
    fn from(tracking: competitor_tracking::Model) -> Self {
        Self {
            id: tracking.id,
            metrics: CurrentMetrics::from(&tracking),
            competitor_url: tracking.competitor_url,
            company_name: tracking.company_name,
            degraded: tracking.degraded,
            created_at: utc(tracking.created_at),
            updated_at: utc(tracking.updated_at),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotResponse {
    pub id: SnapshotId,
    pub tracking_id: TrackingId,
    pub week: DateTime<Utc>,
    pub metrics: Value,
    pub created_at: DateTime<Utc>,
}

impl From<tracking_snapshot::Model> for SnapshotResponse {
    fn from(snapshot: tracking_snapshot::Model) -> Self {
        Self {
            id: snapshot.id,
            tracking_id: snapshot.tracking_id,
            week: utc(snapshot.week),
            metrics: serde_json::from_str(&snapshot.metrics).unwrap_or(Value::Null),
            created_at: utc(snapshot.created_at),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddCompetitorBody {
    competitor_url: Option<String>,
    company_name: Option<String>,
}

async fn add_competitor(
    Extension(app): Extension<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    body: std::result::Result<Json<AddCompetitorBody>, JsonRejection>,
) -> Result<Json<TrackingResponse>> {
    let Json(body) = body?;
    let (Some(competitor_url), Some(company_name)) = (
        non_blank(body.competitor_url.as_deref()),
        non_blank(body.company_name.as_deref()),
    ) else {
        return Err(Error::http(
            StatusCode::BAD_REQUEST,
            "Competitor URL and company name are required",
        ));
    };
    let user = current_user(&app, &principal).await?;

    let request = SalesTrackingRequest {
        competitor_url: competitor_url.to_string(),
        company_name: company_name.to_string(),
    };
    let (tracking, _snapshot) = perform_metered_action(&app, &user, &request, Utc::now()).await?;

    Ok(Json(tracking.into()))
}

#[derive(Debug, Serialize)]
pub struct WatchlistResponse {
    pub competitors: Vec<TrackingResponse>,
}

async fn get_watchlist(
    Extension(app): Extension<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<WatchlistResponse>> {
    let user = current_user(&app, &principal).await?;
    let trackings = app.db.get_trackings_for_user(user.id).await?;

    Ok(Json(WatchlistResponse {
        competitors: trackings.into_iter().map(Into::into).collect(),
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompetitorAnalysis {
    pub id: TrackingId,
    pub company_name: String,
    pub competitor_url: String,
    pub current_metrics: CurrentMetrics,
    /// Newest first.
    pub history: Vec<SnapshotResponse>,
}

#[derive(Debug, Serialize)]
pub struct AnalysisResponse {
    pub competitors: Vec<CompetitorAnalysis>,
}

async fn analyze(
    Extension(app): Extension<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<AnalysisResponse>> {
    let user = current_user(&app, &principal).await?;
    let trackings = app.db.get_trackings_for_user(user.id).await?;

    let histories = futures::future::try_join_all(
        trackings
            .iter()
            .map(|tracking| app.db.get_recent_snapshots(tracking.id, ANALYSIS_HISTORY_LIMIT)),
    )
    .await?;

    let competitors = trackings
        .into_iter()
        .zip(histories)
        .map(|(tracking, history)| CompetitorAnalysis {
            id: tracking.id,
            current_metrics: CurrentMetrics::from(&tracking),
            company_name: tracking.company_name,
            competitor_url: tracking.competitor_url,
            history: history.into_iter().map(Into::into).collect(),
        })
        .collect();

    Ok(Json(AnalysisResponse { competitors }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HistoryParams {
    tracking_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub snapshots: Vec<SnapshotResponse>,
}

fn tracking_not_found() -> Error {
    Error::http(StatusCode::NOT_FOUND, "Tracking entry not found")
}

async fn get_history(
    Extension(app): Extension<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<HistoryResponse>> {
    let tracking_id = non_blank(params.tracking_id.as_deref())
        .ok_or_else(|| Error::http(StatusCode::BAD_REQUEST, "Tracking ID is required"))?;
    let user = current_user(&app, &principal).await?;

    let tracking_id = tracking_id
        .parse::<TrackingId>()
        .map_err(|_| tracking_not_found())?;
    let tracking = app
        .db
        .get_tracking_for_user(tracking_id, user.id)
        .await?
        .ok_or_else(tracking_not_found)?;

    let snapshots = app.db.get_snapshot_history(tracking.id).await?;
    Ok(Json(HistoryResponse {
        snapshots: snapshots.into_iter().map(Into::into).collect(),
    }))
}

#[derive(Debug, Serialize)]
pub struct RecordSnapshotResponse {
    pub tracking: TrackingResponse,
    pub snapshot: SnapshotResponse,
}

/// Takes a fresh observation of a tracked competitor. The slot is already held, so this
/// doesn't count against the plan.
async fn record_snapshot(
    Extension(app): Extension<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(tracking_id): Path<TrackingId>,
) -> Result<Json<RecordSnapshotResponse>> {
    let user = current_user(&app, &principal).await?;
    let tracking = app
        .db
        .get_tracking_for_user(tracking_id, user.id)
        .await?
        .ok_or_else(tracking_not_found)?;

    let request = SalesTrackingRequest {
        competitor_url: tracking.competitor_url,
        company_name: tracking.company_name,
    };
    let insight = generate_insight(app.insight_generator.as_ref(), &request).await;
    let degraded = insight.is_degraded();
    let (tracking, snapshot) = app
        .db
        .record_tracking_snapshot(tracking.id, insight.payload(), degraded, Utc::now())
        .await?;

    Ok(Json(RecordSnapshotResponse {
        tracking: tracking.into(),
        snapshot: snapshot.into(),
    }))
}

async fn stop_tracking(
    Extension(app): Extension<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(tracking_id): Path<TrackingId>,
) -> Result<StatusCode> {
    let user = current_user(&app, &principal).await?;
    if !app.db.delete_tracking(tracking_id, user.id).await? {
        return Err(tracking_not_found());
    }

    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize)]
pub struct AlertsResponse {
    pub alerts: Vec<Alert>,
}

async fn get_alerts(
    Extension(app): Extension<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<AlertsResponse>> {
    let user = current_user(&app, &principal).await?;
    let trackings = app.db.get_trackings_for_user(user.id).await?;

    let latest_snapshots = futures::future::try_join_all(
        trackings
            .iter()
            .map(|tracking| app.db.get_recent_snapshots(tracking.id, 2)),
    )
    .await?;

    let mut alerts = Vec::new();
    for (tracking, snapshots) in trackings.iter().zip(latest_snapshots) {
        let [current, previous] = snapshots.as_slice() else {
            continue;
        };
        let (Some(current), Some(previous)) =
            (snapshot_metrics(current), snapshot_metrics(previous))
        else {
            continue;
        };
        alerts.extend(derive_alerts(
            &tracking.company_name,
            &current,
            &previous,
            utc(tracking.updated_at),
        ));
    }

    Ok(Json(AlertsResponse { alerts }))
}

fn snapshot_metrics(snapshot: &tracking_snapshot::Model) -> Option<TrackingMetrics> {
    serde_json::from_str(&snapshot.metrics)
        .map_err(|error| {
            tracing::warn!(
                snapshot_id = %snapshot.id,
                %error,
                "skipping snapshot with unreadable metrics"
            );
        })
        .ok()
}
