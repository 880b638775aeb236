use crate::db::{UserId, VoiceScanId};
use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, Default, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "voice_scans")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: VoiceScanId,
    pub user_id: UserId,
    pub url: String,
    pub voice_score: i32,
    /// JSON voice-search analysis, including recommendations and keywords.
    pub analysis: String,
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
