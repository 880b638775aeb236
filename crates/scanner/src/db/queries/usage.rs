use super::*;

impl Database {
    /// Counts the user's rows of the given kind created at or after `since`.
    ///
    /// With `since` set to `None` every row counts, which is how concurrently held resources
    /// such as tracking slots are measured.
    pub async fn usage_since(
        &self,
        user_id: UserId,
        kind: ResourceKind,
        since: Option<DateTimeUtc>,
    ) -> Result<u64> {
        let since = since.map(|since| since.naive_utc());
        self.transaction(|tx| async move {
            match kind {
                ResourceKind::SiteScan => {
                    count_owned::<scan::Entity>(
                        &tx,
                        scan::Column::UserId,
                        scan::Column::CreatedAt,
                        user_id,
                        since,
                    )
                    .await
                }
                ResourceKind::CompetitorComparison => {
                    count_owned::<competitor_scan::Entity>(
                        &tx,
                        competitor_scan::Column::UserId,
                        competitor_scan::Column::CreatedAt,
                        user_id,
                        since,
                    )
                    .await
                }
                ResourceKind::VoiceScan => {
                    count_owned::<voice_scan::Entity>(
                        &tx,
                        voice_scan::Column::UserId,
                        voice_scan::Column::CreatedAt,
                        user_id,
                        since,
                    )
                    .await
                }
                ResourceKind::TrackingSlot => {
                    count_owned::<competitor_tracking::Entity>(
                        &tx,
                        competitor_tracking::Column::UserId,
                        competitor_tracking::Column::CreatedAt,
                        user_id,
                        since,
                    )
                    .await
                }
            }
        })
        .await
    }
}

async fn count_owned<E>(
    tx: &DatabaseTransaction,
    user_id_column: E::Column,
    created_at_column: E::Column,
    user_id: UserId,
    since: Option<DateTime>,
) -> Result<u64>
where
    E: EntityTrait,
    E::Model: Sync,
{
    let mut condition = Condition::all().add(user_id_column.eq(user_id));
    if let Some(since) = since {
        condition = condition.add(created_at_column.gte(since));
    }

    Ok(E::find().filter(condition).count(tx).await?)
}
