use crate::db::{CompetitorScanId, UserId};
use sea_orm::entity::prelude::*;

/// A side-by-side comparison of the user's site against up to five competitors.
#[derive(Clone, Debug, Default, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "competitor_scans")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: CompetitorScanId,
    pub user_id: UserId,
    pub user_url: String,
    /// JSON array of URLs.
    pub competitor_urls: String,
    /// JSON comparison document.
    pub results: String,
    pub degraded: bool,
    pub created_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
