use crate::db::TrackingMetrics;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Relative change, in percent, above which a metric movement is reported.
const ALERT_THRESHOLD_PERCENT: f64 = 20.0;
/// Relative change, in percent, above which an alert is high severity.
const HIGH_SEVERITY_THRESHOLD_PERCENT: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertKind {
    Increase,
    Decrease,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub competitor_name: String,
    #[serde(rename = "type")]
    pub kind: AlertKind,
    pub metric: &'static str,
    pub change: String,
    pub message: String,
    pub severity: AlertSeverity,
    pub date: DateTime<Utc>,
}

struct WatchedMetric {
    label: &'static str,
    /// How the metric reads in an alert message.
    phrase: &'static str,
    value: fn(&TrackingMetrics) -> f64,
}

fn ai_mentions(metrics: &TrackingMetrics) -> f64 {
    f64::from(metrics.ai_mentions)
}

fn recommendation_frequency(metrics: &TrackingMetrics) -> f64 {
    metrics.recommendation_frequency
}

const WATCHED_METRICS: [WatchedMetric; 2] = [
    WatchedMetric {
        label: "AI Mentions",
        phrase: "AI mentions",
        value: ai_mentions,
    },
    WatchedMetric {
        label: "Visibility Score",
        phrase: "AI visibility",
        value: recommendation_frequency,
    },
];

/// Compares a competitor's two most recent snapshots and reports every watched metric that
/// moved by more than the alert threshold.
pub fn derive_alerts(
    company_name: &str,
    current: &TrackingMetrics,
    previous: &TrackingMetrics,
    date: DateTime<Utc>,
) -> Vec<Alert> {
    WATCHED_METRICS
        .iter()
        .filter_map(|metric| {
            let change = percent_change((metric.value)(previous), (metric.value)(current))?;
            let magnitude = change.abs();
            if magnitude <= ALERT_THRESHOLD_PERCENT {
                return None;
            }

            let (kind, verb) = if change > 0.0 {
                (AlertKind::Increase, "increased")
            } else {
                (AlertKind::Decrease, "decreased")
            };
            let severity = if magnitude > HIGH_SEVERITY_THRESHOLD_PERCENT {
                AlertSeverity::High
            } else {
                AlertSeverity::Medium
            };

            Some(Alert {
                competitor_name: company_name.to_string(),
                kind,
                metric: metric.label,
                change: format!("{magnitude:.1}%"),
                message: format!(
                    "{company_name} {verb} {} by {magnitude:.1}%",
                    metric.phrase
                ),
                severity,
                date,
            })
        })
        .collect()
}

/// `None` when there is no meaningful baseline to compare against.
fn percent_change(previous: f64, current: f64) -> Option<f64> {
    if previous == 0.0 || !previous.is_finite() || !current.is_finite() {
        return None;
    }
    Some((current - previous) / previous * 100.0)
}
