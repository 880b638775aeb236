use crate::db::{TrackingId, UserId};
use sea_orm::entity::prelude::*;

/// A competitor the user is tracking. Each entry holds one tracking slot.
///
/// The metric columns hold the most recent observation; the full history lives in
/// [`super::tracking_snapshot`].
#[derive(Clone, Debug, Default, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "competitor_trackings")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: TrackingId,
    pub user_id: UserId,
    pub competitor_url: String,
    pub company_name: String,
    pub ai_mentions: i32,
    pub recommendation_frequency: f64,
    pub citation_rate: f64,
    pub shopping_presence: f64,
    pub brand_trust_score: f64,
    pub estimated_traffic: i32,
    pub degraded: bool,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
    #[sea_orm(has_many = "super::tracking_snapshot::Entity")]
    Snapshot,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::tracking_snapshot::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Snapshot.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
