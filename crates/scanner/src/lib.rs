pub mod alerts;
pub mod api;
pub mod auth;
pub mod billing;
pub mod db;
pub mod env;
pub mod insights;
pub mod metering;
pub mod stripe_client;


use anyhow::Context as _;
use auth::{PrincipalResolver, SessionTokenResolver};
use axum::{
    extract::rejection::JsonRejection,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use db::Database;
use insights::{GoogleAiInsightGenerator, InsightGenerator};
use serde::Deserialize;
use std::{sync::Arc, time::Duration};
use stripe_client::{RealStripeClient, StripeClient};

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The body returned for any failure the caller can't act on.
const INTERNAL_SERVER_ERROR_MESSAGE: &str = "Internal server error";

pub enum Error {
    Http(StatusCode, String, HeaderMap),
    Database(sea_orm::error::DbErr),
    Internal(anyhow::Error),
}

impl From<anyhow::Error> for Error {
    fn from(error: anyhow::Error) -> Self {
        Self::Internal(error)
    }
}

impl From<sea_orm::error::DbErr> for Error {
    fn from(error: sea_orm::error::DbErr) -> Self {
        Self::Database(error)
    }
}

impl From<axum::Error> for Error {
    fn from(error: axum::Error) -> Self {
        Self::Internal(error.into())
    }
}

impl From<axum::http::Error> for Error {
    fn from(error: axum::http::Error) -> Self {
        Self::Internal(error.into())
    }
}

/// Malformed request bodies are validation failures, reported with the usual error body.
impl From<JsonRejection> for Error {
    fn from(rejection: JsonRejection) -> Self {
        Self::http(StatusCode::BAD_REQUEST, rejection.body_text())
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Self::Internal(error.into())
    }
}

impl Error {
    pub fn http(code: StatusCode, message: impl Into<String>) -> Self {
        Self::Http(code, message.into(), HeaderMap::default())
    }
}

fn error_body(message: &str) -> Json<serde_json::Value> {
    Json(serde_json::json!({ "error": message }))
}

impl IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        match self {
            Error::Http(code, message, headers) => {
                if code.is_server_error() {
                    log::error!("HTTP error {}: {}", code, &message);
                } else {
                    log::warn!("HTTP error {}: {}", code, &message);
                }
                (code, headers, error_body(&message)).into_response()
            }
            Error::Database(error) => {
                log::error!(
                    "HTTP error {}: {:?}",
                    StatusCode::INTERNAL_SERVER_ERROR,
                    &error
                );
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    error_body(INTERNAL_SERVER_ERROR_MESSAGE),
                )
                    .into_response()
            }
            Error::Internal(error) => {
                log::error!(
                    "HTTP error {}: {:?}",
                    StatusCode::INTERNAL_SERVER_ERROR,
                    &error
                );
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    error_body(INTERNAL_SERVER_ERROR_MESSAGE),
                )
                    .into_response()
            }
        }
    }
}

impl std::fmt::Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Http(code, message, _headers) => (code, message).fmt(f),
            Error::Database(error) => error.fmt(f),
            Error::Internal(error) => error.fmt(f),
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Http(code, message, _) => write!(f, "{code}: {message}"),
            Error::Database(error) => error.fmt(f),
            Error::Internal(error) => error.fmt(f),
        }
    }
}

impl std::error::Error for Error {}

#[derive(Clone, Deserialize)]
pub struct Config {
    pub http_port: u16,
    pub database_url: String,
    pub database_max_connections: u32,
    pub session_token_secret: String,
    pub google_ai_api_key: Option<Arc<str>>,
    pub google_ai_api_url: Option<String>,
    pub google_ai_model: Option<String>,
    pub insight_timeout_secs: Option<u64>,
    pub stripe_api_key: Option<String>,
    pub stripe_webhook_secret: Option<String>,
    pub stripe_webhook_tolerance_secs: Option<u64>,
    pub stripe_price_id_pro_monthly: Option<String>,
    pub stripe_price_id_pro_yearly: Option<String>,
    pub stripe_price_id_premium_monthly: Option<String>,
    pub stripe_price_id_premium_yearly: Option<String>,
    pub rust_log: Option<String>,
    pub log_json: Option<bool>,
}

impl Config {
    pub fn google_ai_api_url(&self) -> &str {
        self.google_ai_api_url
            .as_deref()
            .unwrap_or(google_ai::API_URL)
    }

    pub fn google_ai_model(&self) -> &str {
        self.google_ai_model
            .as_deref()
            .unwrap_or(google_ai::DEFAULT_MODEL)
    }

    /// How long to wait on the insight generator before falling back.
    pub fn insight_timeout(&self) -> Duration {
        Duration::from_secs(self.insight_timeout_secs.unwrap_or(30))
    }

    /// How far a webhook's signed timestamp may drift from the current time.
    pub fn stripe_webhook_tolerance(&self) -> Duration {
        Duration::from_secs(self.stripe_webhook_tolerance_secs.unwrap_or(300))
    }

    #[cfg(any(test, feature = "test-support"))]
    pub fn test() -> Self {
        Self {
            http_port: 0,
            database_url: "".into(),
            database_max_connections: 0,
            session_token_secret: "test-session-secret".into(),
            google_ai_api_key: None,
            google_ai_api_url: None,
            google_ai_model: None,
            insight_timeout_secs: None,
            stripe_api_key: None,
            stripe_webhook_secret: Some("whsec_test".into()),
            stripe_webhook_tolerance_secs: None,
            stripe_price_id_pro_monthly: Some("price_pro_monthly".into()),
            stripe_price_id_pro_yearly: Some("price_pro_yearly".into()),
            stripe_price_id_premium_monthly: Some("price_premium_monthly".into()),
            stripe_price_id_premium_yearly: Some("price_premium_yearly".into()),
            rust_log: None,
            log_json: None,
        }
    }
}

pub struct AppState {
    pub db: Arc<Database>,
    pub principal_resolver: Arc<dyn PrincipalResolver>,
    pub insight_generator: Arc<dyn InsightGenerator>,
    pub stripe_client: Option<Arc<dyn StripeClient>>,
    pub config: Config,
}

impl AppState {
    pub async fn new(config: Config) -> Result<Arc<Self>> {
        let mut db_options = db::ConnectOptions::new(config.database_url.clone());
        db_options.max_connections(config.database_max_connections);
        let db = Database::new(db_options).await?;

        let http_client = reqwest::Client::builder()
            .timeout(config.insight_timeout())
            .build()
            .context("failed to build HTTP client")?;
        let insight_generator = Arc::new(GoogleAiInsightGenerator::new(
            http_client,
            config.google_ai_api_url().to_string(),
            config.google_ai_api_key.clone(),
            config.google_ai_model().to_string(),
        ));
        if config.google_ai_api_key.is_none() {
            tracing::warn!("no Google AI API key configured; insights will use fallback data");
        }

        let stripe_client = config.stripe_api_key.as_ref().map(|api_key| {
            Arc::new(RealStripeClient::new(Arc::new(stripe::Client::new(
                api_key.clone(),
            )))) as Arc<dyn StripeClient>
        });

        let principal_resolver = Arc::new(SessionTokenResolver::new(
            config.session_token_secret.clone(),
        ));

        let this = Self {
            db: Arc::new(db),
            principal_resolver,
            insight_generator,
            stripe_client,
            config,
        };
        Ok(Arc::new(this))
    }
}
