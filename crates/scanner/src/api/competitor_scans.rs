use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use entitlements::ResourceKind;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{current_user, non_blank, utc};
use crate::auth::Principal;
use crate::db::{competitor_scan, user, CompetitorScanId, CreateCompetitorScanParams, Database};
use crate::insights::{CompetitorComparisonInsight, CompetitorComparisonRequest, Insight};
use crate::metering::{perform_metered_action, MeteredAction};
use crate::{AppState, Error, Result};

const MAX_COMPETITOR_URLS: usize = 5;
const RECENT_COMPARISONS_LIMIT: u64 = 20;

pub fn router() -> Router {
    Router::new()
        .route("/competitor-scan", post(create_competitor_scan))
        .route("/scan/competitor", post(create_competitor_scan))
        .route("/user/competitors", get(list_competitor_scans))
}

#[async_trait]
impl MeteredAction for CompetitorComparisonRequest {
    const KIND: ResourceKind = ResourceKind::CompetitorComparison;

    type Record = competitor_scan::Model;

    async fn persist(
        &self,
        db: &Database,
        user: &user::Model,
        insight: Insight<CompetitorComparisonInsight>,
        now: DateTime<Utc>,
    ) -> Result<competitor_scan::Model> {
        let degraded = insight.is_degraded();
        db.create_competitor_scan(
            &CreateCompetitorScanParams {
                user_id: user.id,
                user_url: self.user_url.clone(),
                competitor_urls: self.competitor_urls.clone(),
                results: serde_json::to_string(insight.payload())?,
                degraded,
            },
            now,
        )
        .await
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateCompetitorScanBody {
    user_url: Option<String>,
    /// Left untyped so that a malformed list is reported as a validation error.
    competitor_urls: Option<Value>,
}

impl CreateCompetitorScanBody {
    fn into_request(self) -> Result<CompetitorComparisonRequest> {
        let required =
            || Error::http(StatusCode::BAD_REQUEST, "User URL and competitor URLs are required");

        let user_url = non_blank(self.user_url.as_deref()).ok_or_else(required)?;
        let Some(Value::Array(entries)) = self.competitor_urls else {
            return Err(required());
        };
        let competitor_urls = entries
            .iter()
            .map(|entry| non_blank(entry.as_str()).map(str::to_string))
            .collect::<Option<Vec<_>>>()
            .ok_or_else(required)?;

        if competitor_urls.is_empty() || competitor_urls.len() > MAX_COMPETITOR_URLS {
            return Err(Error::http(
                StatusCode::BAD_REQUEST,
                "Please provide 1-5 competitor URLs",
            ));
        }

        Ok(CompetitorComparisonRequest {
            user_url: user_url.to_string(),
            competitor_urls,
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompetitorScanResponse {
    pub id: CompetitorScanId,
    pub user_url: String,
    pub competitor_urls: Vec<String>,
    pub results: Value,
    pub degraded: bool,
    pub created_at: DateTime<Utc>,
}

impl From<competitor_scan::Model> for CompetitorScanResponse {
    fn from(scan: competitor_scan::Model) -> Self {
        Self {
            id: scan.id,
            user_url: scan.user_url,
            competitor_urls: serde_json::from_str(&scan.competitor_urls).unwrap_or_default(),
            results: serde_json::from_str(&scan.results).unwrap_or(Value::Null),
            degraded: scan.degraded,
            created_at: utc(scan.created_at),
        }
    }
}

async fn create_competitor_scan(
    Extension(app): Extension<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    body: std::result::Result<Json<CreateCompetitorScanBody>, JsonRejection>,
) -> Result<Json<CompetitorScanResponse>> {
    let Json(body) = body?;
    let request = body.into_request()?;
    let user = current_user(&app, &principal).await?;

    let scan = perform_metered_action(&app, &user, &request, Utc::now()).await?;

    Ok(Json(scan.into()))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListCompetitorScansResponse {
    pub competitor_scans: Vec<CompetitorScanResponse>,
}

async fn list_competitor_scans(
    Extension(app): Extension<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<ListCompetitorScansResponse>> {
    let user = current_user(&app, &principal).await?;
    let scans = app
        .db
        .get_recent_competitor_scans(user.id, RECENT_COMPARISONS_LIMIT)
        .await?;

    Ok(Json(ListCompetitorScansResponse {
        competitor_scans: scans.into_iter().map(Into::into).collect(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn parse(body: Value) -> Result<CompetitorComparisonRequest> {
        serde_json::from_value::<CreateCompetitorScanBody>(body)
            .unwrap()
            .into_request()
    }

    fn message(result: Result<CompetitorComparisonRequest>) -> String {
        match result {
            Err(Error::Http(StatusCode::BAD_REQUEST, message, _)) => message,
            Err(error) => panic!("unexpected error: {error}"),
            Ok(_) => panic!("expected a validation error"),
        }
    }

    #[test]
    fn test_comparison_body_validation() {
        let request = parse(json!({
            "userUrl": "https://mine.example",
            "competitorUrls": ["https://a.example", " https://b.example "]
        }))
        .unwrap();
        assert_eq!(request.user_url, "https://mine.example");
        assert_eq!(
            request.competitor_urls,
            vec!["https://a.example", "https://b.example"]
        );

        assert_eq!(
            message(parse(json!({ "competitorUrls": ["https://a.example"] }))),
            "User URL and competitor URLs are required"
        );
        assert_eq!(
            message(parse(json!({
                "userUrl": "https://mine.example",
                "competitorUrls": "https://a.example"
            }))),
            "User URL and competitor URLs are required"
        );
        assert_eq!(
            message(parse(json!({
                "userUrl": "https://mine.example",
                "competitorUrls": []
            }))),
            "Please provide 1-5 competitor URLs"
        );
        assert_eq!(
            message(parse(json!({
                "userUrl": "https://mine.example",
                "competitorUrls": ["1", "2", "3", "4", "5", "6"]
            }))),
            "Please provide 1-5 competitor URLs"
        );
    }
}
