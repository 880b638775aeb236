use super::*;
use crate::db::{tests::timestamp, CreateScanParams};
use crate::metering::{check_quota, usage_summary};
use entitlements::{QuotaDecision, ResourceKind};
use pretty_assertions::assert_eq;
use serde_json::json;

const SITE_SCAN_RESPONSE: &str =
    r#"{"score": 82, "recommendations": ["Add FAQ schema", "Answer questions directly"]}"#;

#[tokio::test]
async fn test_free_plan_scan_quota() {
    let server = TestServer::new(FakeInsightGenerator::responding(SITE_SCAN_RESPONSE)).await;
    let (_, token) = server.sign_up("ada@example.com", Plan::Free).await;

    for _ in 0..5 {
        let (status, body) = server
            .post("/scan", &token, json!({ "url": "https://example.com" }))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["score"], 82);
        assert_eq!(body["degraded"], false);
    }

    let (status, body) = server
        .post("/scan", &token, json!({ "url": "https://example.com" }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(
        error_message(&body),
        "Scan limit reached. Please upgrade your plan."
    );

    // A denied request never reaches the generator.
    assert_eq!(server.insight_generator.prompts().len(), 5);

    let (status, usage) = server.get("/usage", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(usage["plan"], "free");
    assert_eq!(
        usage["scans"],
        json!({ "used": 5, "limit": 5, "remaining": 0 })
    );
    assert_eq!(
        usage["voiceScans"],
        json!({ "used": 0, "limit": 1, "remaining": 1 })
    );
}

#[tokio::test]
async fn test_premium_plan_is_unlimited() {
    let server = TestServer::new(FakeInsightGenerator::responding(SITE_SCAN_RESPONSE)).await;
    let (_, token) = server.sign_up("ada@example.com", Plan::Premium).await;

    for _ in 0..8 {
        let (status, _) = server
            .post("/scan", &token, json!({ "url": "https://example.com" }))
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (_, usage) = server.get("/usage", &token).await;
    assert_eq!(usage["plan"], "premium");
    assert_eq!(
        usage["scans"],
        json!({ "used": 8, "limit": null, "remaining": null })
    );
}

#[tokio::test]
async fn test_degraded_insights_are_counted() {
    let server = TestServer::new(FakeInsightGenerator::failing()).await;
    let (_, token) = server.sign_up("ada@example.com", Plan::Free).await;

    let (status, body) = server
        .post("/voice-scan", &token, json!({ "url": "https://example.com" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["degraded"], true);
    assert_eq!(body["voiceScore"], 65);

    let (status, body) = server
        .post(
            "/voice-search-optimizer",
            &token,
            json!({ "url": "https://example.com" }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(
        error_message(&body),
        "Voice scan limit reached. Please upgrade your plan."
    );
}

#[tokio::test]
async fn test_comparison_quota_shares_aliases() {
    let server = TestServer::new(FakeInsightGenerator::failing()).await;
    let (_, token) = server.sign_up("ada@example.com", Plan::Free).await;
    let body = json!({
        "userUrl": "https://mine.example",
        "competitorUrls": ["https://a.example", "https://b.example"]
    });

    let (status, comparison) = server.post("/competitor-scan", &token, body.clone()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(comparison["degraded"], true);
    assert_eq!(
        comparison["results"]["results"]
            .as_array()
            .map(|results| results.len()),
        Some(3)
    );

    let (status, _) = server.post("/scan/competitor", &token, body).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, list) = server.get("/user/competitors", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["competitorScans"].as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn test_monthly_quota_resets_at_month_start() {
    let server = TestServer::new(FakeInsightGenerator::failing()).await;
    let (user, _) = server.sign_up("ada@example.com", Plan::Free).await;
    let db = &server.app.db;

    for _ in 0..5 {
        db.create_scan(
            &CreateScanParams {
                user_id: user.id,
                url: "https://example.com".into(),
                score: 70,
                recommendations: "[]".into(),
                degraded: false,
            },
            timestamp(2025, 1, 15, 12),
        )
        .await
        .unwrap();
    }

    assert_eq!(
        check_quota(db, &user, ResourceKind::SiteScan, timestamp(2025, 1, 20, 12))
            .await
            .unwrap(),
        QuotaDecision::Deny {
            reason: "Scan limit reached. Please upgrade your plan."
        }
    );
    assert_eq!(
        check_quota(db, &user, ResourceKind::SiteScan, timestamp(2025, 2, 2, 12))
            .await
            .unwrap(),
        QuotaDecision::Allow
    );

    let summary = usage_summary(db, &user, timestamp(2025, 2, 2, 12))
        .await
        .unwrap();
    assert_eq!(summary.scans.used, 0);
    assert_eq!(summary.scans.remaining, Some(5));
}

#[tokio::test]
async fn test_authentication_and_validation_errors() {
    let server = TestServer::new(FakeInsightGenerator::failing()).await;

    let (status, body) = server
        .request(Method::GET, "/usage", None, None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(error_message(&body), "Unauthorized");

    let (status, _) = server.get("/usage", "not-a-token").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // A valid session for someone without an account.
    let token = SessionTokenClaims::create(
        "ghost@example.com",
        Utc::now(),
        &server.app.config.session_token_secret,
    )
    .unwrap();
    let (status, body) = server.get("/usage", &token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error_message(&body), "User not found");

    let (_, token) = server.sign_up("ada@example.com", Plan::Free).await;
    let (status, body) = server.post("/scan", &token, json!({ "url": "  " })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_message(&body), "URL is required");

    let (status, body) = server
        .post(
            "/competitor-scan",
            &token,
            json!({ "userUrl": "https://mine.example", "competitorUrls": [] }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_message(&body), "Please provide 1-5 competitor URLs");

    // Rejected requests don't use up the allowance.
    let (_, usage) = server.get("/usage", &token).await;
    assert_eq!(usage["scans"]["used"], 0);
    assert_eq!(usage["competitorComparisons"]["used"], 0);
}

#[tokio::test]
async fn test_malformed_request_bodies() {
    let server = TestServer::new(FakeInsightGenerator::failing()).await;
    let (_, token) = server.sign_up("ada@example.com", Plan::Free).await;

    for (uri, body) in [
        ("/scan", json!({ "url": 123 })),
        ("/voice-scan", json!({ "url": ["https://example.com"] })),
        (
            "/competitor-scan",
            json!({ "userUrl": 7, "competitorUrls": ["https://rival.example"] }),
        ),
        (
            "/sales-tracking/add-competitor",
            json!({ "competitorUrl": 5, "companyName": "Rival" }),
        ),
    ] {
        let (status, body) = server.post(uri, &token, body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert!(!error_message(&body).is_empty(), "{uri}: {body}");
    }

    let request = Request::builder()
        .method(Method::POST)
        .uri("/scan")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::from(json!({ "url": "https://example.com" }).to_string()))
        .unwrap();
    let (status, body) = server.send(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(error_message(&body).contains("Content-Type"), "{body}");

    let (status, body) = server
        .request(Method::POST, "/scan", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");

    let (_, usage) = server.get("/usage", &token).await;
    assert_eq!(usage["scans"]["used"], 0);
}

#[tokio::test]
async fn test_plans_are_public() {
    let server = TestServer::new(FakeInsightGenerator::failing()).await;

    let (status, body) = server.request(Method::GET, "/plans", None, None).await;
    assert_eq!(status, StatusCode::OK);

    let plans = body["plans"].as_array().unwrap();
    assert_eq!(
        plans
            .iter()
            .map(|plan| plan["plan"].as_str().unwrap())
            .collect::<Vec<_>>(),
        vec!["free", "pro", "premium"]
    );
    assert_eq!(plans[0]["limits"]["scans"], 5);
    assert_eq!(plans[2]["limits"]["scans"], Value::Null);
}
