use crate::db::{ScanId, UserId};
use sea_orm::entity::prelude::*;

/// A single-site AI visibility scan.
#[derive(Clone, Debug, Default, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "scans")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: ScanId,
    pub user_id: UserId,
    pub url: String,
    pub score: i32,
    /// JSON array of recommendations.
    pub recommendations: String,
    /// Whether the payload is the fallback rather than generated output.
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
