pub mod billing_subscription;
pub mod competitor_scan;
pub mod competitor_tracking;
pub mod scan;
pub mod tracking_snapshot;
pub mod user;
pub mod voice_scan;
