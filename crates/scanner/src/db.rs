mod ids;
mod queries;
mod tables;

use crate::Result;
use anyhow::anyhow;
use entitlements::{Plan, ResourceKind};
use sea_orm::{
    entity::prelude::*, ActiveValue, Condition, DatabaseConnection, DatabaseTransaction,
    QueryOrder, QuerySelect, TransactionTrait,
};
use std::{future::Future, ops::Deref, sync::Arc};

pub use ids::*;
pub use queries::billing_subscriptions::{PlanTransition, SubscriptionChange};
pub use queries::competitor_scans::CreateCompetitorScanParams;
pub use queries::competitor_trackings::{CreateTrackingParams, TrackingMetrics};
pub use queries::scans::CreateScanParams;
pub use queries::voice_scans::CreateVoiceScanParams;
pub use sea_orm::ConnectOptions;
pub use tables::billing_subscription::StripeSubscriptionStatus;
pub use tables::*;

/// The database backing the scanner service.
pub struct Database {
    pool: DatabaseConnection,
}

impl Database {
    /// Connects to the database with the given options.
    pub async fn new(options: ConnectOptions) -> Result<Self> {
        Ok(Self {
            pool: sea_orm::Database::connect(options).await?,
        })
    }

    /// Runs `f` inside a transaction, committing if it succeeds and rolling back otherwise.
    async fn transaction<F, Fut, T>(&self, f: F) -> Result<T>
    where
        F: Send + Fn(TransactionHandle) -> Fut,
        Fut: Send + Future<Output = Result<T>>,
    {
        let tx = Arc::new(self.pool.begin().await?);
        let result = f(TransactionHandle(tx.clone())).await;

        let tx = Arc::try_unwrap(tx)
            .map_err(|_| anyhow!("couldn't complete transaction because it's still in use"))?;

        match result {
            Ok(value) => {
                tx.commit().await?;
                Ok(value)
            }
            Err(error) => {
                tx.rollback().await?;
                Err(error)
            }
        }
    }
}

pub struct TransactionHandle(Arc<DatabaseTransaction>);

impl Deref for TransactionHandle {
    type Target = DatabaseTransaction;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
