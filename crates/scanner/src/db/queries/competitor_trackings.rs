use super::*;
use serde::{Deserialize, Serialize};

/// A point-in-time metrics bundle for a tracked competitor, as stored in snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingMetrics {
    pub ai_mentions: i32,
    pub recommendation_frequency: f64,
    pub citation_rate: f64,
    pub shopping_presence: f64,
    pub brand_trust_score: f64,
    pub estimated_traffic: i32,
    #[serde(default)]
    pub insights: Vec<String>,
}

#[derive(Debug)]
pub struct CreateTrackingParams {
    pub user_id: UserId,
    pub competitor_url: String,
    pub company_name: String,
    pub metrics: TrackingMetrics,
    pub degraded: bool,
}

impl Database {
    /// Creates a tracking entry together with its initial snapshot.
    pub async fn create_tracking_with_snapshot(
        &self,
        params: &CreateTrackingParams,
        now: DateTimeUtc,
    ) -> Result<(competitor_tracking::Model, tracking_snapshot::Model)> {
        let snapshot_metrics = serde_json::to_string(&params.metrics)?;
        let now = now.naive_utc();
        self.transaction(|tx| {
            let snapshot_metrics = snapshot_metrics.clone();
            async move {
                let metrics = &params.metrics;
                let tracking = competitor_tracking::Entity::insert(competitor_tracking::ActiveModel {
                    user_id: ActiveValue::set(params.user_id),
                    competitor_url: ActiveValue::set(params.competitor_url.clone()),
                    company_name: ActiveValue::set(params.company_name.clone()),
                    ai_mentions: ActiveValue::set(metrics.ai_mentions),
                    recommendation_frequency: ActiveValue::set(metrics.recommendation_frequency),
                    citation_rate: ActiveValue::set(metrics.citation_rate),
                    shopping_presence: ActiveValue::set(metrics.shopping_presence),
                    brand_trust_score: ActiveValue::set(metrics.brand_trust_score),
                    estimated_traffic: ActiveValue::set(metrics.estimated_traffic),
                    degraded: ActiveValue::set(params.degraded),
                    created_at: ActiveValue::set(now),
                    updated_at: ActiveValue::set(now),
                    ..Default::default()
                })
                .exec_with_returning(&*tx)
                .await?;

                let snapshot = insert_snapshot(&tx, tracking.id, snapshot_metrics, now).await?;

                Ok((tracking, snapshot))
            }
        })
        .await
    }

    /// Replaces the entry's current metrics and appends them as a new snapshot.
    pub async fn record_tracking_snapshot(
        &self,
        tracking_id: TrackingId,
        metrics: &TrackingMetrics,
        degraded: bool,
        now: DateTimeUtc,
    ) -> Result<(competitor_tracking::Model, tracking_snapshot::Model)> {
        let snapshot_metrics = serde_json::to_string(metrics)?;
        let now = now.naive_utc();
        self.transaction(|tx| {
            let snapshot_metrics = snapshot_metrics.clone();
            async move {
                let tracking = competitor_tracking::ActiveModel {
                    id: ActiveValue::unchanged(tracking_id),
                    ai_mentions: ActiveValue::set(metrics.ai_mentions),
                    recommendation_frequency: ActiveValue::set(metrics.recommendation_frequency),
                    citation_rate: ActiveValue::set(metrics.citation_rate),
                    shopping_presence: ActiveValue::set(metrics.shopping_presence),
                    brand_trust_score: ActiveValue::set(metrics.brand_trust_score),
                    estimated_traffic: ActiveValue::set(metrics.estimated_traffic),
                    degraded: ActiveValue::set(degraded),
                    updated_at: ActiveValue::set(now),
                    ..Default::default()
                }
                .update(&*tx)
                .await?;

                let snapshot = insert_snapshot(&tx, tracking.id, snapshot_metrics, now).await?;

                Ok((tracking, snapshot))
            }
        })
        .await
    }

    /// Returns the user's tracking entry for the given competitor URL, if any.
    pub async fn get_tracking_by_url(
        &self,
        user_id: UserId,
        competitor_url: &str,
    ) -> Result<Option<competitor_tracking::Model>> {
        self.transaction(|tx| async move {
            Ok(competitor_tracking::Entity::find()
                .filter(competitor_tracking::Column::UserId.eq(user_id))
                .filter(competitor_tracking::Column::CompetitorUrl.eq(competitor_url))
                .one(&*tx)
                .await?)
        })
        .await
    }

    /// Returns the tracking entry with the given ID, but only if it belongs to the user.
    pub async fn get_tracking_for_user(
        &self,
        tracking_id: TrackingId,
        user_id: UserId,
    ) -> Result<Option<competitor_tracking::Model>> {
        self.transaction(|tx| async move {
            Ok(competitor_tracking::Entity::find_by_id(tracking_id)
                .filter(competitor_tracking::Column::UserId.eq(user_id))
                .one(&*tx)
                .await?)
        })
        .await
    }

    /// Returns all of the user's tracking entries, most recently updated first.
    pub async fn get_trackings_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<competitor_tracking::Model>> {
        self.transaction(|tx| async move {
            Ok(competitor_tracking::Entity::find()
                .filter(competitor_tracking::Column::UserId.eq(user_id))
                .order_by_desc(competitor_tracking::Column::UpdatedAt)
                .order_by_desc(competitor_tracking::Column::Id)
                .all(&*tx)
                .await?)
        })
        .await
    }

    /// Returns up to `limit` of the entry's snapshots, newest first.
    pub async fn get_recent_snapshots(
        &self,
        tracking_id: TrackingId,
        limit: u64,
    ) -> Result<Vec<tracking_snapshot::Model>> {
        self.transaction(|tx| async move {
            Ok(tracking_snapshot::Entity::find()
                .filter(tracking_snapshot::Column::TrackingId.eq(tracking_id))
                .order_by_desc(tracking_snapshot::Column::Week)
                .order_by_desc(tracking_snapshot::Column::Id)
                .limit(limit)
                .all(&*tx)
                .await?)
        })
        .await
    }

    /// Returns every snapshot of the entry, oldest first.
    pub async fn get_snapshot_history(
        &self,
        tracking_id: TrackingId,
    ) -> Result<Vec<tracking_snapshot::Model>> {
        self.transaction(|tx| async move {
            Ok(tracking_snapshot::Entity::find()
                .filter(tracking_snapshot::Column::TrackingId.eq(tracking_id))
                .order_by_asc(tracking_snapshot::Column::Week)
                .order_by_asc(tracking_snapshot::Column::Id)
                .all(&*tx)
                .await?)
        })
        .await
    }

    /// Deletes the user's tracking entry and its snapshots, releasing the slot.
    ///
    /// Returns `false` if the user has no such entry.
    pub async fn delete_tracking(&self, tracking_id: TrackingId, user_id: UserId) -> Result<bool> {
        self.transaction(|tx| async move {
            let Some(tracking) = competitor_tracking::Entity::find_by_id(tracking_id)
                .filter(competitor_tracking::Column::UserId.eq(user_id))
                .one(&*tx)
                .await?
            else {
                return Ok(false);
            };

            tracking_snapshot::Entity::delete_many()
                .filter(tracking_snapshot::Column::TrackingId.eq(tracking.id))
                .exec(&*tx)
                .await?;
            competitor_tracking::Entity::delete_by_id(tracking.id)
                .exec(&*tx)
                .await?;

            Ok(true)
        })
        .await
    }
}

async fn insert_snapshot(
    tx: &DatabaseTransaction,
    tracking_id: TrackingId,
    metrics: String,
    now: DateTime,
) -> Result<tracking_snapshot::Model> {
    Ok(
        tracking_snapshot::Entity::insert(tracking_snapshot::ActiveModel {
            tracking_id: ActiveValue::set(tracking_id),
            week: ActiveValue::set(now),
            metrics: ActiveValue::set(metrics),
            created_at: ActiveValue::set(now),
            ..Default::default()
        })
        .exec_with_returning(tx)
        .await?,
    )
}
