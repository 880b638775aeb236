use super::*;
use pretty_assertions::assert_eq;

fn transition(
    user_id: UserId,
    plan: Plan,
    price_id: Option<&str>,
    status: StripeSubscriptionStatus,
) -> PlanTransition {
    PlanTransition {
        user_id,
        plan,
        subscription: SubscriptionChange {
            stripe_customer_id: "cus_1".into(),
            stripe_subscription_id: Some("sub_1".into()),
            stripe_price_id: price_id.map(str::to_string),
            status,
        },
    }
}

#[tokio::test]
async fn test_apply_plan_transition() {
    let test_db = TestDb::sqlite().await;
    let db = test_db.db();

    let user = db
        .create_user("ada@example.com", None, timestamp(2025, 1, 1, 0))
        .await
        .unwrap();
    assert_eq!(
        db.get_billing_subscription_by_user_id(user.id).await.unwrap(),
        None
    );

    let subscription = db
        .apply_plan_transition(
            &transition(
                user.id,
                Plan::Pro,
                Some("price_pro_monthly"),
                StripeSubscriptionStatus::Active,
            ),
            timestamp(2025, 1, 2, 0),
        )
        .await
        .unwrap();
    assert_eq!(subscription.user_id, user.id);
    assert_eq!(subscription.stripe_customer_id, "cus_1");
    assert_eq!(
        subscription.stripe_price_id.as_deref(),
        Some("price_pro_monthly")
    );
    assert_eq!(
        db.get_user_by_id(user.id).await.unwrap().unwrap().plan(),
        Plan::Pro
    );
    assert_eq!(
        db.get_billing_subscription_by_stripe_customer_id("cus_1")
            .await
            .unwrap(),
        Some(subscription.clone())
    );

    // A later event without a price keeps the stored one.
    let updated = db
        .apply_plan_transition(
            &transition(user.id, Plan::Free, None, StripeSubscriptionStatus::Canceled),
            timestamp(2025, 2, 2, 0),
        )
        .await
        .unwrap();
    assert_eq!(updated.id, subscription.id);
    assert_eq!(
        updated.stripe_subscription_status,
        StripeSubscriptionStatus::Canceled
    );
    assert_eq!(updated.stripe_price_id.as_deref(), Some("price_pro_monthly"));
    assert_eq!(updated.created_at, subscription.created_at);
    assert_eq!(
        db.get_user_by_id(user.id).await.unwrap().unwrap().plan(),
        Plan::Free
    );
}

#[tokio::test]
async fn test_plan_transition_is_idempotent() {
    let test_db = TestDb::sqlite().await;
    let db = test_db.db();

    let user = db
        .create_user("ada@example.com", None, timestamp(2025, 1, 1, 0))
        .await
        .unwrap();
    let deleted = transition(user.id, Plan::Free, None, StripeSubscriptionStatus::Canceled);

    let first = db
        .apply_plan_transition(&deleted, timestamp(2025, 1, 2, 0))
        .await
        .unwrap();
    let second = db
        .apply_plan_transition(&deleted, timestamp(2025, 1, 2, 0))
        .await
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(
        db.get_user_by_id(user.id).await.unwrap().unwrap().plan(),
        Plan::Free
    );
}

#[tokio::test]
async fn test_plan_transition_for_missing_user_is_rolled_back() {
    let test_db = TestDb::sqlite().await;
    let db = test_db.db();

    let result = db
        .apply_plan_transition(
            &transition(UserId(42), Plan::Pro, None, StripeSubscriptionStatus::Active),
            timestamp(2025, 1, 2, 0),
        )
        .await;
    assert!(result.is_err());

    assert_eq!(
        db.get_billing_subscription_by_stripe_customer_id("cus_1")
            .await
            .unwrap(),
        None
    );
}
