use crate::{
    db::{user, Database},
    insights::{generate_insight, Insight, InsightRequest},
    AppState, Error, Result,
};
use async_trait::async_trait;
use axum::http::StatusCode;
use chrono::{DateTime, Local, Utc};
use entitlements::{allowance, decide, Allowance, Plan, QuotaDecision, ResourceKind};
use serde::Serialize;

/// Counts the user's usage of `kind` in its current window.
///
/// Monthly windows start at the beginning of the calendar month in the server's local time.
pub async fn usage_for(
    db: &Database,
    user: &user::Model,
    kind: ResourceKind,
    now: DateTime<Utc>,
) -> Result<u64> {
    let since = kind.window().start(now, &Local);
    db.usage_since(user.id, kind, since).await
}

/// Decides whether the user may perform one more action of `kind`.
pub async fn check_quota(
    db: &Database,
    user: &user::Model,
    kind: ResourceKind,
    now: DateTime<Utc>,
) -> Result<QuotaDecision> {
    let plan = user.plan();
    if allowance(plan, kind) == Allowance::Unlimited {
        return Ok(QuotaDecision::Allow);
    }

    let usage = usage_for(db, user, kind, now).await?;
    Ok(decide(plan, kind, usage))
}

/// An action that consumes a unit of a plan allowance and produces an insight-backed record.
#[async_trait]
pub trait MeteredAction: InsightRequest {
    const KIND: ResourceKind;

    type Record: Send;

    /// Checks that run once the quota gate has passed, before any insight is generated.
    async fn preflight(&self, _db: &Database, _user: &user::Model) -> Result<()> {
        Ok(())
    }

    async fn persist(
        &self,
        db: &Database,
        user: &user::Model,
        insight: Insight<Self::Payload>,
        now: DateTime<Utc>,
    ) -> Result<Self::Record>;
}

/// Gates, generates and persists a metered action.
///
/// The quota check and the insert in [`MeteredAction::persist`] are separate operations, so
/// concurrent requests from one user can each pass the gate and briefly exceed the allowance.
/// A degraded insight is persisted and counted like any other.
pub async fn perform_metered_action<A: MeteredAction>(
    app: &AppState,
    user: &user::Model,
    action: &A,
    now: DateTime<Utc>,
) -> Result<A::Record> {
    if let QuotaDecision::Deny { reason } = check_quota(&app.db, user, A::KIND, now).await? {
        tracing::info!(
            target: "quota",
            user_id = %user.id,
            plan = %user.plan(),
            kind = %A::KIND,
            "denied metered action"
        );
        return Err(Error::http(StatusCode::FORBIDDEN, reason));
    }

    action.preflight(&app.db, user).await?;

    let insight = generate_insight(app.insight_generator.as_ref(), action).await;
    let degraded = insight.is_degraded();
    let record = action.persist(&app.db, user, insight, now).await?;

    tracing::info!(
        target: "quota",
        user_id = %user.id,
        kind = %A::KIND,
        degraded,
        "recorded metered action"
    );

    Ok(record)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KindUsage {
    pub used: u64,
    /// `None` when the plan is unlimited for this kind.
    pub limit: Option<u32>,
    pub remaining: Option<u64>,
}

impl KindUsage {
    fn new(plan: Plan, kind: ResourceKind, used: u64) -> Self {
        let allowance = allowance(plan, kind);
        Self {
            used,
            limit: allowance.limit(),
            remaining: allowance.remaining(used),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageSummary {
    pub plan: Plan,
    pub scans: KindUsage,
    pub competitor_comparisons: KindUsage,
    pub voice_scans: KindUsage,
    pub competitors_tracked: KindUsage,
}

/// Reads the user's usage of every kind at once.
pub async fn usage_summary(
    db: &Database,
    user: &user::Model,
    now: DateTime<Utc>,
) -> Result<UsageSummary> {
    let plan = user.plan();
    let (scans, competitor_comparisons, voice_scans, competitors_tracked) = futures::try_join!(
        usage_for(db, user, ResourceKind::SiteScan, now),
        usage_for(db, user, ResourceKind::CompetitorComparison, now),
        usage_for(db, user, ResourceKind::VoiceScan, now),
        usage_for(db, user, ResourceKind::TrackingSlot, now),
    )?;

    Ok(UsageSummary {
        plan,
        scans: KindUsage::new(plan, ResourceKind::SiteScan, scans),
        competitor_comparisons: KindUsage::new(
            plan,
            ResourceKind::CompetitorComparison,
            competitor_comparisons,
        ),
        voice_scans: KindUsage::new(plan, ResourceKind::VoiceScan, voice_scans),
        competitors_tracked: KindUsage::new(
            plan,
            ResourceKind::TrackingSlot,
            competitors_tracked,
        ),
    })
}
