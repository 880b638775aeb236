use crate::db::UserId;
use entitlements::Plan;
use sea_orm::entity::prelude::*;

/// A user of the service.
#[derive(Clone, Debug, Default, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: UserId,
    pub email: String,
    pub name: Option<String>,
    /// The raw plan name. Read it through [`Model::plan`].
    pub plan: String,
    pub created_at: DateTime,
}

impl Model {
    pub fn plan(&self) -> Plan {
        Plan::from_str_lossy(&self.plan)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_one = "super::billing_subscription::Entity")]
    BillingSubscription,
    #[sea_orm(has_many = "super::scan::Entity")]
    Scan,
    #[sea_orm(has_many = "super::competitor_scan::Entity")]
    CompetitorScan,
    #[sea_orm(has_many = "super::voice_scan::Entity")]
    VoiceScan,
    #[sea_orm(has_many = "super::competitor_tracking::Entity")]
    CompetitorTracking,
}

impl Related<super::billing_subscription::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BillingSubscription.def()
    }
}

impl Related<super::scan::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Scan.def()
    }
}

impl Related<super::competitor_scan::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CompetitorScan.def()
    }
}

impl Related<super::voice_scan::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::VoiceScan.def()
    }
}

impl Related<super::competitor_tracking::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CompetitorTracking.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
