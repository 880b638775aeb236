use crate::db::{SnapshotId, TrackingId};
use sea_orm::entity::prelude::*;

/// A point-in-time observation of a tracked competitor.
#[derive(Clone, Debug, Default, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "tracking_snapshots")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: SnapshotId,
    pub tracking_id: TrackingId,
    pub week: DateTime,
    /// JSON metrics bundle, see [`crate::db::TrackingMetrics`].
    pub metrics: String,
    pub created_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::competitor_tracking::Entity",
        from = "Column::TrackingId",
        to = "super::competitor_tracking::Column::Id"
    )]
    CompetitorTracking,
}

impl Related<super::competitor_tracking::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CompetitorTracking.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
