mod webhook_signature;

use std::collections::HashMap;

use anyhow::Context as _;
use chrono::{DateTime, Utc};
use entitlements::Plan;
use serde::Deserialize;

use crate::db::{user, PlanTransition, StripeSubscriptionStatus, SubscriptionChange, UserId};
use crate::stripe_client::StripeSubscriptionId;
use crate::{AppState, Config, Result};

#[cfg(test)]
pub use webhook_signature::signature_header;
pub use webhook_signature::{verify_signature, WebhookSignatureError, SIGNATURE_HEADER};

/// Maps billing price IDs to the plan they grant.
#[derive(Debug, Default, Clone)]
pub struct PlanPrices {
    plans_by_price_id: HashMap<String, Plan>,
}

impl PlanPrices {
    pub fn from_config(config: &Config) -> Self {
        let mut plans_by_price_id = HashMap::default();
        for (price_id, plan) in [
            (&config.stripe_price_id_pro_monthly, Plan::Pro),
            (&config.stripe_price_id_pro_yearly, Plan::Pro),
            (&config.stripe_price_id_premium_monthly, Plan::Premium),
            (&config.stripe_price_id_premium_yearly, Plan::Premium),
        ] {
            if let Some(price_id) = price_id.as_ref().filter(|id| !id.is_empty()) {
                plans_by_price_id.insert(price_id.clone(), plan);
            }
        }
        Self { plans_by_price_id }
    }

    /// Resolves a price to a plan. Unknown or missing prices grant the free plan.
    pub fn plan_for_price(&self, price_id: Option<&str>) -> Plan {
        price_id
            .and_then(|price_id| self.plans_by_price_id.get(price_id))
            .copied()
            .unwrap_or_default()
    }
}

/// A reference to a billing object that may be sent either as a bare ID or expanded.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ObjectRef {
    Id(String),
    Expanded { id: String },
}

impl ObjectRef {
    pub fn id(&self) -> &str {
        match self {
            Self::Id(id) | Self::Expanded { id } => id,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSessionObject {
    #[serde(default)]
    pub customer: Option<ObjectRef>,
    #[serde(default)]
    pub subscription: Option<ObjectRef>,
    /// Set by the checkout page to the ID of the user who started checkout.
    #[serde(default)]
    pub client_reference_id: Option<String>,
    #[serde(default)]
    pub customer_email: Option<String>,
    #[serde(default)]
    pub customer_details: Option<CheckoutCustomerDetails>,
}

impl CheckoutSessionObject {
    fn email(&self) -> Option<&str> {
        self.customer_details
            .as_ref()
            .and_then(|details| details.email.as_deref())
            .or(self.customer_email.as_deref())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutCustomerDetails {
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionObject {
    pub id: String,
    pub customer: ObjectRef,
    pub status: StripeSubscriptionStatus,
    pub items: SubscriptionItems,
}

impl SubscriptionObject {
    fn price_id(&self) -> Option<&str> {
        self.items.data.first()?.price.as_ref().map(|price| price.id.as_str())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionItems {
    #[serde(default)]
    pub data: Vec<SubscriptionItemObject>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionItemObject {
    #[serde(default)]
    pub price: Option<PriceObject>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PriceObject {
    pub id: String,
}

#[derive(Debug, Clone)]
pub enum BillingEvent {
    CheckoutSessionCompleted(CheckoutSessionObject),
    /// A subscription was created or updated.
    SubscriptionUpdated(SubscriptionObject),
    SubscriptionDeleted(SubscriptionObject),
    /// Any event type that doesn't affect plans.
    Ignored,
}

#[derive(Debug, Clone)]
pub struct WebhookEvent {
    pub id: String,
    pub event_type: String,
    pub event: BillingEvent,
}

#[derive(Deserialize)]
struct RawWebhookEvent {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    data: RawWebhookEventData,
}

#[derive(Deserialize)]
struct RawWebhookEventData {
    object: serde_json::Value,
}

/// Parses a verified webhook payload.
pub fn parse_event(payload: &[u8]) -> serde_json::Result<WebhookEvent> {
    let raw = serde_json::from_slice::<RawWebhookEvent>(payload)?;
    let object = raw.data.object;
    let event = match raw.event_type.as_str() {
        "checkout.session.completed" => {
            BillingEvent::CheckoutSessionCompleted(serde_json::from_value(object)?)
        }
        "customer.subscription.created" | "customer.subscription.updated" => {
            BillingEvent::SubscriptionUpdated(serde_json::from_value(object)?)
        }
        "customer.subscription.deleted" => {
            BillingEvent::SubscriptionDeleted(serde_json::from_value(object)?)
        }
        _ => BillingEvent::Ignored,
    };

    Ok(WebhookEvent {
        id: raw.id,
        event_type: raw.event_type,
        event,
    })
}

/// Applies a verified billing event to users' plans.
///
/// Events that can't be attributed to a user are acknowledged without changing anything. Any
/// error leaves the event unapplied so that the provider's redelivery can retry it.
pub async fn handle_billing_event(
    app: &AppState,
    event: &WebhookEvent,
    now: DateTime<Utc>,
) -> Result<()> {
    tracing::info!(
        target: "billing",
        event_id = %event.id,
        event_type = %event.event_type,
        "received billing event"
    );

    let prices = PlanPrices::from_config(&app.config);
    match &event.event {
        BillingEvent::CheckoutSessionCompleted(session) => {
            handle_checkout_session_completed(app, &prices, session, now).await
        }
        BillingEvent::SubscriptionUpdated(subscription) => {
            let plan = prices.plan_for_price(subscription.price_id());
            handle_subscription_change(app, subscription, plan, subscription.status, now).await
        }
        BillingEvent::SubscriptionDeleted(subscription) => {
            handle_subscription_change(
                app,
                subscription,
                Plan::Free,
                StripeSubscriptionStatus::Canceled,
                now,
            )
            .await
        }
        BillingEvent::Ignored => Ok(()),
    }
}

async fn handle_checkout_session_completed(
    app: &AppState,
    prices: &PlanPrices,
    session: &CheckoutSessionObject,
    now: DateTime<Utc>,
) -> Result<()> {
    let (Some(customer), Some(subscription_id)) = (&session.customer, &session.subscription)
    else {
        tracing::info!(target: "billing", "checkout session has no subscription, ignoring");
        return Ok(());
    };

    let Some(user) = find_checkout_user(app, customer.id(), session).await? else {
        tracing::warn!(
            target: "billing",
            stripe_customer_id = customer.id(),
            "checkout completed for unknown user"
        );
        return Ok(());
    };

    let stripe_client = app
        .stripe_client
        .as_ref()
        .context("Stripe client is not configured")?;
    let subscription = stripe_client
        .get_subscription(&StripeSubscriptionId(subscription_id.id().into()))
        .await?;
    let price_id = subscription.price_id().map(|price_id| price_id.0.to_string());
    let plan = prices.plan_for_price(price_id.as_deref());

    app.db
        .apply_plan_transition(
            &PlanTransition {
                user_id: user.id,
                plan,
                subscription: SubscriptionChange {
                    stripe_customer_id: customer.id().to_string(),
                    stripe_subscription_id: Some(subscription.id.0.to_string()),
                    stripe_price_id: price_id,
                    status: subscription.status,
                },
            },
            now,
        )
        .await?;

    tracing::info!(target: "billing", user_id = %user.id, %plan, "plan changed after checkout");
    Ok(())
}

/// Resolves who completed a checkout: the known owner of the customer, then the user the
/// checkout was started for, then the user with the customer's email address.
async fn find_checkout_user(
    app: &AppState,
    stripe_customer_id: &str,
    session: &CheckoutSessionObject,
) -> Result<Option<user::Model>> {
    if let Some(subscription) = app
        .db
        .get_billing_subscription_by_stripe_customer_id(stripe_customer_id)
        .await?
    {
        return app.db.get_user_by_id(subscription.user_id).await;
    }

    if let Some(user_id) = session
        .client_reference_id
        .as_deref()
        .and_then(|id| id.parse::<UserId>().ok())
    {
        if let Some(user) = app.db.get_user_by_id(user_id).await? {
            return Ok(Some(user));
        }
    }

    match session.email() {
        Some(email) => app.db.get_user_by_email(email).await,
        None => Ok(None),
    }
}

async fn handle_subscription_change(
    app: &AppState,
    subscription: &SubscriptionObject,
    plan: Plan,
    status: StripeSubscriptionStatus,
    now: DateTime<Utc>,
) -> Result<()> {
    let stripe_customer_id = subscription.customer.id();
    let Some(existing) = app
        .db
        .get_billing_subscription_by_stripe_customer_id(stripe_customer_id)
        .await?
    else {
        tracing::warn!(
            target: "billing",
            stripe_customer_id,
            "subscription event for unknown customer"
        );
        return Ok(());
    };

    app.db
        .apply_plan_transition(
            &PlanTransition {
                user_id: existing.user_id,
                plan,
                subscription: SubscriptionChange {
                    stripe_customer_id: stripe_customer_id.to_string(),
                    stripe_subscription_id: Some(subscription.id.clone()),
                    stripe_price_id: subscription.price_id().map(str::to_string),
                    status,
                },
            },
            now,
        )
        .await?;

    tracing::info!(
        target: "billing",
        user_id = %existing.user_id,
        %plan,
        ?status,
        "plan changed by subscription event"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_plan_for_price() {
        let prices = PlanPrices::from_config(&Config::test());
        assert_eq!(prices.plan_for_price(Some("price_pro_monthly")), Plan::Pro);
        assert_eq!(prices.plan_for_price(Some("price_pro_yearly")), Plan::Pro);
        assert_eq!(
            prices.plan_for_price(Some("price_premium_yearly")),
            Plan::Premium
        );
        assert_eq!(prices.plan_for_price(Some("price_unknown")), Plan::Free);
        assert_eq!(prices.plan_for_price(None), Plan::Free);
    }

    #[test]
    fn test_parse_subscription_event() {
        let payload = json!({
            "id": "evt_1",
            "type": "customer.subscription.updated",
            "data": {
                "object": {
                    "id": "sub_1",
                    "customer": { "id": "cus_1", "object": "customer" },
                    "status": "past_due",
                    "items": { "data": [{ "price": { "id": "price_pro_monthly" } }] }
                }
            }
        });

        let event = parse_event(payload.to_string().as_bytes()).unwrap();
        assert_eq!(event.id, "evt_1");
        let BillingEvent::SubscriptionUpdated(subscription) = event.event else {
            panic!("unexpected event: {:?}", event.event);
        };
        assert_eq!(subscription.customer.id(), "cus_1");
        assert_eq!(subscription.status, StripeSubscriptionStatus::PastDue);
        assert_eq!(subscription.price_id(), Some("price_pro_monthly"));
    }

    #[test]
    fn test_parse_unhandled_and_malformed_events() {
        let payload = json!({
            "id": "evt_2",
            "type": "invoice.paid",
            "data": { "object": { "id": "in_1" } }
        });
        let event = parse_event(payload.to_string().as_bytes()).unwrap();
        assert!(matches!(event.event, BillingEvent::Ignored));

        let payload = json!({
            "id": "evt_3",
            "type": "customer.subscription.deleted",
            "data": { "object": { "id": "sub_1" } }
        });
        assert!(parse_event(payload.to_string().as_bytes()).is_err());
        assert!(parse_event(b"not json").is_err());
    }
}
