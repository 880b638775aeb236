use super::*;

#[derive(Debug)]
pub struct CreateScanParams {
    pub user_id: UserId,
    pub url: String,
    pub score: i32,
    /// JSON array of recommendations.
    pub recommendations: String,
    pub degraded: bool,
}

impl Database {
    pub async fn create_scan(
        &self,
        params: &CreateScanParams,
        now: DateTimeUtc,
    ) -> Result<scan::Model> {
        self.transaction(|tx| async move {
            let scan = scan::Entity::insert(scan::ActiveModel {
                user_id: ActiveValue::set(params.user_id),
                url: ActiveValue::set(params.url.clone()),
                score: ActiveValue::set(params.score),
                recommendations: ActiveValue::set(params.recommendations.clone()),
                degraded: ActiveValue::set(params.degraded),
                created_at: ActiveValue::set(now.naive_utc()),
                ..Default::default()
            })
            .exec_with_returning(&*tx)
            .await?;

            Ok(scan)
        })
        .await
    }

    /// Returns the scan with the given ID, but only if it belongs to the user.
    pub async fn get_scan_for_user(
        &self,
        scan_id: ScanId,
        user_id: UserId,
    ) -> Result<Option<scan::Model>> {
        self.transaction(|tx| async move {
            Ok(scan::Entity::find_by_id(scan_id)
                .filter(scan::Column::UserId.eq(user_id))
                .one(&*tx)
                .await?)
        })
        .await
    }

    /// Returns the user's most recent scans, newest first.
    pub async fn get_recent_scans(&self, user_id: UserId, limit: u64) -> Result<Vec<scan::Model>> {
        self.transaction(|tx| async move {
            Ok(scan::Entity::find()
                .filter(scan::Column::UserId.eq(user_id))
                .order_by_desc(scan::Column::CreatedAt)
                .order_by_desc(scan::Column::Id)
                .limit(limit)
                .all(&*tx)
                .await?)
        })
        .await
    }
}
