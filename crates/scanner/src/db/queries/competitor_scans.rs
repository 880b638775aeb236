use super::*;

#[derive(Debug)]
pub struct CreateCompetitorScanParams {
    pub user_id: UserId,
    pub user_url: String,
    pub competitor_urls: Vec<String>,
    /// JSON comparison document.
    pub results: String,
    pub degraded: bool,
}

impl Database {
    pub async fn create_competitor_scan(
        &self,
        params: &CreateCompetitorScanParams,
        now: DateTimeUtc,
    ) -> Result<competitor_scan::Model> {
        let competitor_urls = serde_json::to_string(&params.competitor_urls)?;
        self.transaction(|tx| {
            let competitor_urls = competitor_urls.clone();
            async move {
                let scan = competitor_scan::Entity::insert(competitor_scan::ActiveModel {
                    user_id: ActiveValue::set(params.user_id),
                    user_url: ActiveValue::set(params.user_url.clone()),
                    competitor_urls: ActiveValue::set(competitor_urls),
                    results: ActiveValue::set(params.results.clone()),
                    degraded: ActiveValue::set(params.degraded),
                    created_at: ActiveValue::set(now.naive_utc()),
                    ..Default::default()
                })
                .exec_with_returning(&*tx)
                .await?;

                Ok(scan)
            }
        })
        .await
    }

    /// Returns the user's most recent competitor comparisons, newest first.
    pub async fn get_recent_competitor_scans(
        &self,
        user_id: UserId,
        limit: u64,
    ) -> Result<Vec<competitor_scan::Model>> {
        self.transaction(|tx| async move {
            Ok(competitor_scan::Entity::find()
                .filter(competitor_scan::Column::UserId.eq(user_id))
                .order_by_desc(competitor_scan::Column::CreatedAt)
                .order_by_desc(competitor_scan::Column::Id)
                .limit(limit)
                .all(&*tx)
                .await?)
        })
        .await
    }
}
