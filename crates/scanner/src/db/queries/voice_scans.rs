use super::*;

#[derive(Debug)]
pub struct CreateVoiceScanParams {
    pub user_id: UserId,
    pub url: String,
    pub voice_score: i32,
    /// JSON voice-search analysis.
    pub analysis: String,
    pub degraded: bool,
}

impl Database {
    pub async fn create_voice_scan(
        &self,
        params: &CreateVoiceScanParams,
        now: DateTimeUtc,
    ) -> Result<voice_scan::Model> {
        self.transaction(|tx| async move {
            let scan = voice_scan::Entity::insert(voice_scan::ActiveModel {
                user_id: ActiveValue::set(params.user_id),
                url: ActiveValue::set(params.url.clone()),
                voice_score: ActiveValue::set(params.voice_score),
                analysis: ActiveValue::set(params.analysis.clone()),
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

    pub async fn get_recent_voice_scans(
        &self,
        user_id: UserId,
        limit: u64,
    ) -> Result<Vec<voice_scan::Model>> {
        self.transaction(|tx| async move {
            Ok(voice_scan::Entity::find()
                .filter(voice_scan::Column::UserId.eq(user_id))
                .order_by_desc(voice_scan::Column::CreatedAt)
                .order_by_desc(voice_scan::Column::Id)
                .limit(limit)
                .all(&*tx)
                .await?)
        })
        .await
    }
}
