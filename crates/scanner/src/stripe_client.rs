#[cfg(test)]
mod fake_stripe_client;
mod real_stripe_client;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::db::StripeSubscriptionStatus;

#[cfg(test)]
pub use fake_stripe_client::*;
pub use real_stripe_client::*;

#[derive(Debug, PartialEq, Eq, Hash, Clone)]
pub struct StripeCustomerId(pub Arc<str>);

#[derive(Debug, PartialEq, Eq, Hash, Clone)]
pub struct StripeSubscriptionId(pub Arc<str>);

#[derive(Debug, PartialEq, Eq, Hash, Clone)]
pub struct StripePriceId(pub Arc<str>);

#[derive(Debug, Clone)]
pub struct StripeSubscription {
    pub id: StripeSubscriptionId,
    pub customer: StripeCustomerId,
    pub status: StripeSubscriptionStatus,
    pub items: Vec<StripeSubscriptionItem>,
}

impl StripeSubscription {
    /// The price of the first subscription item, which is what determines the plan.
    pub fn price_id(&self) -> Option<&StripePriceId> {
        self.items.first()?.price.as_ref()
    }
}

#[derive(Debug, Clone)]
pub struct StripeSubscriptionItem {
    pub price: Option<StripePriceId>,
}

#[async_trait]
pub trait StripeClient: Send + Sync {
    async fn get_subscription(
        &self,
        subscription_id: &StripeSubscriptionId,
    ) -> Result<StripeSubscription>;
}
