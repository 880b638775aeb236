use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::time::Duration;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "stripe-signature";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WebhookSignatureError {
    #[error("webhook signing secret is not configured")]
    MissingSecret,
    #[error("invalid webhook signing secret")]
    InvalidSecret,
    #[error("missing Stripe-Signature header")]
    MissingHeader,
    #[error("malformed Stripe-Signature header")]
    MalformedHeader,
    #[error("timestamp outside the tolerance zone")]
    TimestampOutsideTolerance,
    #[error("no signatures found matching the expected signature for payload")]
    NoMatchingSignature,
}

struct SignatureHeader<'a> {
    timestamp: i64,
    /// The timestamp exactly as sent, which is what was signed.
    signed_timestamp: &'a str,
    signatures: Vec<Vec<u8>>,
}

/// Parses `t=<unix seconds>,v1=<hex>[,v1=<hex>...]`, ignoring schemes other than `v1`.
fn parse_header(header: &str) -> Result<SignatureHeader<'_>, WebhookSignatureError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            continue;
        };
        match key {
            "t" => {
                let parsed = value
                    .parse::<i64>()
                    .map_err(|_| WebhookSignatureError::MalformedHeader)?;
                timestamp = Some((parsed, value));
            }
            "v1" => {
                if let Ok(signature) = hex::decode(value) {
                    signatures.push(signature);
                }
            }
            _ => {}
        }
    }

    match timestamp {
        Some((timestamp, signed_timestamp)) if !signatures.is_empty() => Ok(SignatureHeader {
            timestamp,
            signed_timestamp,
            signatures,
        }),
        _ => Err(WebhookSignatureError::MalformedHeader),
    }
}

fn signed_payload_mac(
    secret: &str,
    timestamp: &str,
    payload: &[u8],
) -> Result<HmacSha256, WebhookSignatureError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| WebhookSignatureError::InvalidSecret)?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(mac)
}

/// Verifies a webhook payload against its signature header.
///
/// The signed content is `"{timestamp}.{payload}"`; any `v1` signature in the header may match.
pub fn verify_signature(
    payload: &[u8],
    header: Option<&str>,
    secret: Option<&str>,
    now: DateTime<Utc>,
    tolerance: Duration,
) -> Result<(), WebhookSignatureError> {
    let secret = secret
        .filter(|secret| !secret.is_empty())
        .ok_or(WebhookSignatureError::MissingSecret)?;
    let header = parse_header(header.ok_or(WebhookSignatureError::MissingHeader)?)?;

    if (now.timestamp() - header.timestamp).unsigned_abs() > tolerance.as_secs() {
        return Err(WebhookSignatureError::TimestampOutsideTolerance);
    }

    let mac = signed_payload_mac(secret, header.signed_timestamp, payload)?;
    header
        .signatures
        .iter()
        .any(|signature| mac.clone().verify_slice(signature).is_ok())
        .then_some(())
        .ok_or(WebhookSignatureError::NoMatchingSignature)
}

/// Builds a header value the way the billing provider does.
#[cfg(test)]
pub fn signature_header(payload: &[u8], secret: &str, timestamp: i64) -> String {
    let signature = signed_payload_mac(secret, &timestamp.to_string(), payload)
        .unwrap()
        .finalize()
        .into_bytes();
    format!("t={timestamp},v1={}", hex::encode(signature))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    const SECRET: &str = "whsec_test";
    const TOLERANCE: Duration = Duration::from_secs(300);
    const PAYLOAD: &[u8] = br#"{"id":"evt_1","type":"customer.subscription.deleted"}"#;

    fn now() -> DateTime<Utc> {
        Utc.timestamp_opt(1_750_000_000, 0).unwrap()
    }

    fn verify(header: &str) -> Result<(), WebhookSignatureError> {
        verify_signature(PAYLOAD, Some(header), Some(SECRET), now(), TOLERANCE)
    }

    #[test]
    fn test_valid_signature() {
        let header = signature_header(PAYLOAD, SECRET, now().timestamp() - 10);
        assert_eq!(verify(&header), Ok(()));
    }

    #[test]
    fn test_any_v1_signature_may_match() {
        let valid = signature_header(PAYLOAD, SECRET, now().timestamp());
        let (timestamp, signature) = valid.split_once(',').unwrap();
        let header = format!("{timestamp},v0=abc,v1={},{signature}", "00".repeat(32));
        assert_eq!(verify(&header), Ok(()));
    }

    #[test]
    fn test_rejected_signatures() {
        let timestamp = now().timestamp();

        let wrong_secret = signature_header(PAYLOAD, "whsec_other", timestamp);
        assert_eq!(
            verify(&wrong_secret),
            Err(WebhookSignatureError::NoMatchingSignature)
        );

        let tampered = signature_header(b"{\"id\":\"evt_2\"}", SECRET, timestamp);
        assert_eq!(
            verify(&tampered),
            Err(WebhookSignatureError::NoMatchingSignature)
        );

        let stale = signature_header(PAYLOAD, SECRET, timestamp - 301);
        assert_eq!(
            verify(&stale),
            Err(WebhookSignatureError::TimestampOutsideTolerance)
        );

        assert_eq!(
            verify("v1=deadbeef"),
            Err(WebhookSignatureError::MalformedHeader)
        );
        assert_eq!(
            verify(&format!("t={timestamp}")),
            Err(WebhookSignatureError::MalformedHeader)
        );
    }

    #[test]
    fn test_missing_secret_or_header() {
        let header = signature_header(PAYLOAD, SECRET, now().timestamp());
        assert_eq!(
            verify_signature(PAYLOAD, Some(&header), None, now(), TOLERANCE),
            Err(WebhookSignatureError::MissingSecret)
        );
        assert_eq!(
            verify_signature(PAYLOAD, Some(&header), Some(""), now(), TOLERANCE),
            Err(WebhookSignatureError::MissingSecret)
        );
        assert_eq!(
            verify_signature(PAYLOAD, None, Some(SECRET), now(), TOLERANCE),
            Err(WebhookSignatureError::MissingHeader)
        );
    }
}
