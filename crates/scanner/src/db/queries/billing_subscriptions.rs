use super::*;

/// The subscription state carried by a billing event.
#[derive(Debug, Clone)]
pub struct SubscriptionChange {
    pub stripe_customer_id: String,
    pub stripe_subscription_id: Option<String>,
    pub stripe_price_id: Option<String>,
    pub status: StripeSubscriptionStatus,
}

/// Moves a user to `plan` and records the subscription that caused it.
#[derive(Debug, Clone)]
pub struct PlanTransition {
    pub user_id: UserId,
    pub plan: Plan,
    pub subscription: SubscriptionChange,
}

impl Database {
    /// Returns the billing subscription for the given Stripe customer ID.
    pub async fn get_billing_subscription_by_stripe_customer_id(
        &self,
        stripe_customer_id: &str,
    ) -> Result<Option<billing_subscription::Model>> {
        self.transaction(|tx| async move {
            Ok(billing_subscription::Entity::find()
                .filter(billing_subscription::Column::StripeCustomerId.eq(stripe_customer_id))
                .one(&*tx)
                .await?)
        })
        .await
    }

    /// Returns the billing subscription for the user with the given ID.
    pub async fn get_billing_subscription_by_user_id(
        &self,
        user_id: UserId,
    ) -> Result<Option<billing_subscription::Model>> {
        self.transaction(|tx| async move {
            Ok(billing_subscription::Entity::find()
                .filter(billing_subscription::Column::UserId.eq(user_id))
                .one(&*tx)
                .await?)
        })
        .await
    }

    /// Upserts the user's subscription (keyed by Stripe customer ID) and sets the user's plan.
    ///
    /// Both writes happen in one transaction, so a failure leaves neither applied. Applying the
    /// same transition twice yields the same state.
    pub async fn apply_plan_transition(
        &self,
        transition: &PlanTransition,
        now: DateTimeUtc,
    ) -> Result<billing_subscription::Model> {
        let now = now.naive_utc();
        self.transaction(|tx| async move {
            let change = &transition.subscription;

            let existing = match billing_subscription::Entity::find()
                .filter(
                    billing_subscription::Column::StripeCustomerId
                        .eq(change.stripe_customer_id.as_str()),
                )
                .one(&*tx)
                .await?
            {
                Some(subscription) => Some(subscription),
                None => {
                    billing_subscription::Entity::find()
                        .filter(billing_subscription::Column::UserId.eq(transition.user_id))
                        .one(&*tx)
                        .await?
                }
            };

            let subscription = match existing {
                Some(existing) => {
                    let mut subscription: billing_subscription::ActiveModel = existing.into();
                    subscription.user_id = ActiveValue::set(transition.user_id);
                    subscription.stripe_customer_id =
                        ActiveValue::set(change.stripe_customer_id.clone());
                    if let Some(subscription_id) = &change.stripe_subscription_id {
                        subscription.stripe_subscription_id =
                            ActiveValue::set(Some(subscription_id.clone()));
                    }
                    if let Some(price_id) = &change.stripe_price_id {
                        subscription.stripe_price_id = ActiveValue::set(Some(price_id.clone()));
                    }
                    subscription.stripe_subscription_status = ActiveValue::set(change.status);
                    subscription.updated_at = ActiveValue::set(now);
                    subscription.update(&*tx).await?
                }
                None => {
                    billing_subscription::Entity::insert(billing_subscription::ActiveModel {
                        user_id: ActiveValue::set(transition.user_id),
                        stripe_customer_id: ActiveValue::set(change.stripe_customer_id.clone()),
                        stripe_subscription_id: ActiveValue::set(
                            change.stripe_subscription_id.clone(),
                        ),
                        stripe_price_id: ActiveValue::set(change.stripe_price_id.clone()),
                        stripe_subscription_status: ActiveValue::set(change.status),
                        created_at: ActiveValue::set(now),
                        updated_at: ActiveValue::set(now),
                        ..Default::default()
                    })
                    .exec_with_returning(&*tx)
                    .await?
                }
            };

            super::users::set_user_plan(&tx, transition.user_id, transition.plan).await?;

            Ok(subscription)
        })
        .await
    }
}
