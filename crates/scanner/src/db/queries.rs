use super::*;

pub mod billing_subscriptions;
pub mod competitor_scans;
pub mod competitor_trackings;
pub mod scans;
pub mod usage;
pub mod users;
pub mod voice_scans;
