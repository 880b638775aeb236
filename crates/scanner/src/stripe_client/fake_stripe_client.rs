use std::collections::HashMap;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use parking_lot::Mutex;

use crate::stripe_client::{StripeClient, StripeSubscription, StripeSubscriptionId};

pub struct FakeStripeClient {
    pub subscriptions: Mutex<HashMap<StripeSubscriptionId, StripeSubscription>>,
}

impl FakeStripeClient {
    pub fn new() -> Self {
        Self {
            subscriptions: Mutex::new(HashMap::default()),
        }
    }
}

#[async_trait]
impl StripeClient for FakeStripeClient {
    async fn get_subscription(
        &self,
        subscription_id: &StripeSubscriptionId,
    ) -> Result<StripeSubscription> {
        self.subscriptions
            .lock()
            .get(subscription_id)
            .cloned()
            .ok_or_else(|| anyhow!("no subscription found for {subscription_id:?}"))
    }
}
