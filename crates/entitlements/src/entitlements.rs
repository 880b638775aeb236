mod catalog;

use chrono::{DateTime, Datelike, Days, Duration, NaiveDateTime, NaiveTime, TimeZone, Utc};
use serde::Serialize;

pub use catalog::*;

/// The subscription tier a user is on.
///
/// Plans only change in response to billing events; every user starts on [`Plan::Free`].
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, strum::EnumIter, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Plan {
    #[default]
    Free,
    Pro,
    Premium,
}

impl Plan {
    /// Parses a stored plan name.
    ///
    /// Unrecognized names resolve to [`Plan::Free`] rather than failing, so a corrupt or
    /// legacy value can never grant more than the free allowance.
    pub fn from_str_lossy(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "pro" => Self::Pro,
            "premium" => Self::Premium,
            // "free" and anything we don't know about.
            _ => Self::Free,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Pro => "pro",
            Self::Premium => "premium",
        }
    }
}

/// A kind of action that counts against a plan's allowance.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, strum::EnumIter, strum::Display,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "snake_case")]
pub enum ResourceKind {
    SiteScan,
    CompetitorComparison,
    VoiceScan,
    TrackingSlot,
}

impl ResourceKind {
    pub const ALL: [Self; 4] = [
        Self::SiteScan,
        Self::CompetitorComparison,
        Self::VoiceScan,
        Self::TrackingSlot,
    ];

    /// How usage of this kind is counted.
    ///
    /// Tracking slots are held concurrently, so they are counted as a live total rather
    /// than per calendar month.
    pub fn window(self) -> UsageWindow {
        match self {
            Self::SiteScan | Self::CompetitorComparison | Self::VoiceScan => {
                UsageWindow::CalendarMonth
            }
            Self::TrackingSlot => UsageWindow::Unwindowed,
        }
    }

    pub fn limit_reached_message(self) -> &'static str {
        match self {
            Self::SiteScan => "Scan limit reached. Please upgrade your plan.",
            Self::CompetitorComparison => {
                "Competitor comparison limit reached. Please upgrade your plan."
            }
            Self::VoiceScan => "Voice scan limit reached. Please upgrade your plan.",
            Self::TrackingSlot => "Competitor tracking limit reached. Please upgrade your plan.",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageWindow {
    /// Rows created since the first instant of the current calendar month.
    CalendarMonth,
    /// Every row, regardless of when it was created.
    Unwindowed,
}

impl UsageWindow {
    /// Returns the earliest creation time that still counts, or `None` when every row counts.
    pub fn start<Tz: TimeZone>(self, now: DateTime<Utc>, tz: &Tz) -> Option<DateTime<Utc>> {
        match self {
            Self::CalendarMonth => Some(month_window_start(now, tz)),
            Self::Unwindowed => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Allowance {
    Limited(u32),
    Unlimited,
}

impl Allowance {
    pub fn limit(self) -> Option<u32> {
        match self {
            Self::Limited(limit) => Some(limit),
            Self::Unlimited => None,
        }
    }

    pub fn is_exhausted_by(self, usage: u64) -> bool {
        match self {
            Self::Limited(limit) => usage >= u64::from(limit),
            Self::Unlimited => false,
        }
    }

    pub fn remaining(self, usage: u64) -> Option<u64> {
        self.limit()
            .map(|limit| u64::from(limit).saturating_sub(usage))
    }
}

/// The allowance a plan grants for a resource kind.
pub fn allowance(plan: Plan, kind: ResourceKind) -> Allowance {
    use Allowance::*;
    use ResourceKind::*;

    match plan {
        Plan::Free => match kind {
            SiteScan => Limited(5),
            CompetitorComparison => Limited(1),
            VoiceScan => Limited(1),
            TrackingSlot => Limited(2),
        },
        Plan::Pro => match kind {
            SiteScan => Limited(50),
            CompetitorComparison => Limited(10),
            VoiceScan => Limited(10),
            TrackingSlot => Limited(10),
        },
        Plan::Premium => Unlimited,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuotaDecision {
    Allow,
    Deny { reason: &'static str },
}

impl QuotaDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

/// Decides whether one more action of `kind` fits in the plan, given the current usage.
pub fn decide(plan: Plan, kind: ResourceKind, usage: u64) -> QuotaDecision {
    if allowance(plan, kind).is_exhausted_by(usage) {
        QuotaDecision::Deny {
            reason: kind.limit_reached_message(),
        }
    } else {
        QuotaDecision::Allow
    }
}

/// The first instant of the calendar month containing `now`, as observed in `tz`.
///
/// If local midnight on the 1st doesn't exist (a DST gap), the first valid local time after
/// it is used.
pub fn month_window_start<Tz: TimeZone>(now: DateTime<Utc>, tz: &Tz) -> DateTime<Utc> {
    let local = now.with_timezone(tz);
    let first_day = local.date_naive() - Days::new(u64::from(local.day0()));
    let midnight = first_day.and_time(NaiveTime::MIN);

    first_valid_local_instant(tz, midnight)
        .unwrap_or_else(|| Utc.from_utc_datetime(&midnight))
}

fn first_valid_local_instant<Tz: TimeZone>(
    tz: &Tz,
    local: NaiveDateTime,
) -> Option<DateTime<Utc>> {
    (0..=12)
        .map(|step| local + Duration::minutes(15 * step))
        .find_map(|candidate| tz.from_local_datetime(&candidate).earliest())
        .map(|instant| instant.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;
    use pretty_assertions::assert_eq;
    use strum::IntoEnumIterator as _;

    #[test]
    fn test_allowance_table() {
        use Allowance::*;

        let expected = [
            (ResourceKind::SiteScan, [Limited(5), Limited(50), Unlimited]),
            (
                ResourceKind::CompetitorComparison,
                [Limited(1), Limited(10), Unlimited],
            ),
            (ResourceKind::VoiceScan, [Limited(1), Limited(10), Unlimited]),
            (ResourceKind::TrackingSlot, [Limited(2), Limited(10), Unlimited]),
        ];

        for (kind, allowances) in expected {
            for (plan, expected_allowance) in Plan::iter().zip(allowances) {
                assert_eq!(
                    allowance(plan, kind),
                    expected_allowance,
                    "{plan} / {kind}"
                );
            }
        }
    }

    #[test]
    fn test_plan_parsing() {
        assert_eq!(Plan::from_str_lossy("pro"), Plan::Pro);
        assert_eq!(Plan::from_str_lossy(" Premium "), Plan::Premium);
        assert_eq!(Plan::from_str_lossy("free"), Plan::Free);
        assert_eq!(Plan::from_str_lossy("enterprise"), Plan::Free);
        assert_eq!(Plan::from_str_lossy(""), Plan::Free);

        for plan in Plan::iter() {
            assert_eq!(Plan::from_str_lossy(plan.as_str()), plan);
        }
    }

    #[test]
    fn test_decide() {
        assert_eq!(
            decide(Plan::Free, ResourceKind::SiteScan, 4),
            QuotaDecision::Allow
        );
        assert_eq!(
            decide(Plan::Free, ResourceKind::SiteScan, 5),
            QuotaDecision::Deny {
                reason: "Scan limit reached. Please upgrade your plan."
            }
        );
        assert_eq!(
            decide(Plan::Pro, ResourceKind::TrackingSlot, 10),
            QuotaDecision::Deny {
                reason: "Competitor tracking limit reached. Please upgrade your plan."
            }
        );

        for kind in ResourceKind::ALL {
            assert!(decide(Plan::Premium, kind, u64::MAX).is_allowed());
        }
    }

    #[test]
    fn test_remaining() {
        assert_eq!(Allowance::Limited(5).remaining(3), Some(2));
        assert_eq!(Allowance::Limited(5).remaining(7), Some(0));
        assert_eq!(Allowance::Unlimited.remaining(100), None);
    }

    #[test]
    fn test_month_window_start() {
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 13, 45, 12).unwrap();
        assert_eq!(
            month_window_start(now, &Utc),
            Utc.with_ymd_and_hms(2026, 10, 1, 0, 0, 0).unwrap()
        );

        let first_instant = Utc.with_ymd_and_hms(2026, 11, 1, 0, 0, 0).unwrap();
        assert_eq!(month_window_start(first_instant, &Utc), first_instant);
    }

    #[test]
    fn test_month_window_start_uses_local_calendar() {
        // Still February in UTC-5 when it's already March in UTC.
        let tz = FixedOffset::west_opt(5 * 3600).unwrap();
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 2, 0, 0).unwrap();
        assert_eq!(
            month_window_start(now, &tz),
            Utc.with_ymd_and_hms(2026, 2, 1, 5, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_tracking_slots_are_not_windowed() {
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 0, 0, 0).unwrap();
        assert_eq!(ResourceKind::TrackingSlot.window().start(now, &Utc), None);
        assert!(ResourceKind::SiteScan.window().start(now, &Utc).is_some());
    }
}
