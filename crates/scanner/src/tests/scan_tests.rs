use super::*;
use pretty_assertions::assert_eq;
use serde_json::json;

#[tokio::test]
async fn test_scan_round_trip() {
    let server = TestServer::new(FakeInsightGenerator::responding(
        r#"Here you go: {"score": 67.6, "recommendations": ["Add FAQ schema", "Use headings", "Cite sources"]}"#,
    ))
    .await;
    let (_, token) = server.sign_up("ada@example.com", Plan::Free).await;
    let (_, other_token) = server.sign_up("grace@example.com", Plan::Free).await;

    let (status, scan) = server
        .post("/scan", &token, json!({ "url": " https://example.com " }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(scan["url"], "https://example.com");
    assert_eq!(scan["score"], 68);
    assert_eq!(
        scan["recommendations"],
        json!(["Add FAQ schema", "Use headings", "Cite sources"])
    );
    assert!(server.insight_generator.prompts()[0].contains("https://example.com"));

    let id = scan["id"].as_i64().unwrap();
    let (status, detail) = server.get(&format!("/scans/{id}"), &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["score"], 68);
    assert_eq!(
        detail["recommendations"]
            .as_array()
            .unwrap()
            .iter()
            .map(|recommendation| recommendation["severity"].as_str().unwrap())
            .collect::<Vec<_>>(),
        vec!["high", "high", "medium"]
    );
    let technical_seo = detail["metrics"]["technicalSEO"].as_i64().unwrap();
    assert!((70..80).contains(&technical_seo), "{technical_seo}");

    let (status, body) = server.get(&format!("/scans/{id}"), &other_token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error_message(&body), "Scan not found");

    let (status, list) = server.get("/scans", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["scans"].as_array().map(Vec::len), Some(1));

    let (_, list) = server.get("/scans", &other_token).await;
    assert_eq!(list["scans"], json!([]));
}

#[tokio::test]
async fn test_scan_falls_back_when_generator_fails() {
    let server = TestServer::new(FakeInsightGenerator::failing()).await;
    let (_, token) = server.sign_up("ada@example.com", Plan::Free).await;

    let (status, scan) = server
        .post("/scan", &token, json!({ "url": "https://example.com" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(scan["score"], 50);
    assert_eq!(scan["degraded"], true);
    assert_eq!(scan["recommendations"].as_array().map(Vec::len), Some(5));
}

#[tokio::test]
async fn test_voice_scan_lists() {
    let server = TestServer::new(FakeInsightGenerator::failing()).await;
    let (_, token) = server.sign_up("ada@example.com", Plan::Pro).await;

    for path in ["/voice-scan", "/scan/voice"] {
        let (status, _) = server
            .post(path, &token, json!({ "url": "https://example.com" }))
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body) = server.get("/user/voice-scans", &token).await;
    assert_eq!(status, StatusCode::OK);
    let scans = body["voiceScans"].as_array().unwrap();
    assert_eq!(scans.len(), 2);
    assert_eq!(scans[0]["recommendations"]["voiceScore"], 65.0);
}
