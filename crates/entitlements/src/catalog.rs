use serde::Serialize;

use crate::{allowance, Plan, ResourceKind};

/// Customer-facing description of a plan, as shown on the pricing page.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanDetails {
    pub plan: Plan,
    pub name: &'static str,
    /// List price in whole US dollars.
    pub price_monthly: u32,
    pub price_yearly: u32,
    pub limits: PlanLimits,
    pub features: &'static [&'static str],
}

/// Per-kind allowances, with `None` meaning unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanLimits {
    pub scans: Option<u32>,
    pub competitor_comparisons: Option<u32>,
    pub voice_scans: Option<u32>,
    pub competitors_tracked: Option<u32>,
}

impl PlanLimits {
    pub fn for_plan(plan: Plan) -> Self {
        Self {
            scans: allowance(plan, ResourceKind::SiteScan).limit(),
            competitor_comparisons: allowance(plan, ResourceKind::CompetitorComparison).limit(),
            voice_scans: allowance(plan, ResourceKind::VoiceScan).limit(),
            competitors_tracked: allowance(plan, ResourceKind::TrackingSlot).limit(),
        }
    }
}

pub fn plan_details(plan: Plan) -> PlanDetails {
    let (name, price_monthly, price_yearly, features): (_, _, _, &'static [&'static str]) =
        match plan {
            Plan::Free => (
                "Free",
                0,
                0,
                &[
                    "5 scans per month",
                    "1 competitor comparison",
                    "1 voice optimization scan",
                    "Track 2 competitors",
                    "Basic reports",
                ],
            ),
            Plan::Pro => (
                "Pro",
                99,
                999,
                &[
                    "50 scans per month",
                    "10 competitor comparisons",
                    "10 voice optimization scans",
                    "Track 10 competitors",
                    "Weekly sales reports",
                    "Priority support",
                    "Advanced analytics",
                ],
            ),
            Plan::Premium => (
                "Premium",
                199,
                1999,
                &[
                    "Unlimited scans",
                    "Unlimited competitor comparisons",
                    "Unlimited voice optimization scans",
                    "Track unlimited competitors",
                    "Daily sales alerts",
                    "White-label reports",
                    "API access",
                    "Predictive AI sales forecasting",
                    "Dedicated account manager",
                ],
            ),
        };

    PlanDetails {
        plan,
        name,
        price_monthly,
        price_yearly,
        limits: PlanLimits::for_plan(plan),
        features,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_plan_limits_follow_allowances() {
        assert_eq!(
            PlanLimits::for_plan(Plan::Free),
            PlanLimits {
                scans: Some(5),
                competitor_comparisons: Some(1),
                voice_scans: Some(1),
                competitors_tracked: Some(2),
            }
        );
        assert_eq!(
            PlanLimits::for_plan(Plan::Premium),
            PlanLimits {
                scans: None,
                competitor_comparisons: None,
                voice_scans: None,
                competitors_tracked: None,
            }
        );
    }

    #[test]
    fn test_plan_details_prices() {
        let pro = plan_details(Plan::Pro);
        assert_eq!((pro.price_monthly, pro.price_yearly), (99, 999));
        assert_eq!(pro.features[0], "50 scans per month");
    }
}
