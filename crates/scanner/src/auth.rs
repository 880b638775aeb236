use crate::{AppState, Error};
use anyhow::anyhow;
use async_trait::async_trait;
use axum::{
    http::{self, HeaderMap, Request, StatusCode},
    middleware::Next,
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::{sync::Arc, time::Duration};
use thiserror::Error;

/// The authenticated caller of a request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Principal {
    pub email: String,
}

/// Works out who is making a request.
///
/// Session issuance lives outside this service; implementations only have to recognize the
/// credentials it hands out.
#[async_trait]
pub trait PrincipalResolver: Send + Sync {
    /// Returns `None` when the request carries no valid credentials.
    async fn resolve(&self, headers: &HeaderMap) -> anyhow::Result<Option<Principal>>;
}

/// Middleware that rejects unauthenticated requests and attaches the [`Principal`] to the rest.
pub async fn resolve_principal<B>(mut req: Request<B>, next: Next<B>) -> impl IntoResponse {
    let state = req
        .extensions()
        .get::<Arc<AppState>>()
        .cloned()
        .ok_or_else(|| anyhow!("app state missing from request extensions"))?;
    let headers = req.headers().clone();

    let principal = state
        .principal_resolver
        .resolve(&headers)
        .await?
        .ok_or_else(|| Error::http(StatusCode::UNAUTHORIZED, "Unauthorized"))?;

    req.extensions_mut().insert(principal);
    Ok::<_, Error>(next.run(req).await)
}

const SESSION_TOKEN_LIFETIME: Duration = Duration::from_secs(30 * 24 * 60 * 60);

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionTokenClaims {
    pub iat: u64,
    pub exp: u64,
    /// The email address of the signed-in user.
    pub sub: String,
}

impl SessionTokenClaims {
    pub fn create(email: &str, now: DateTime<Utc>, secret: &str) -> anyhow::Result<String> {
        let claims = Self {
            iat: now.timestamp() as u64,
            exp: (now + SESSION_TOKEN_LIFETIME).timestamp() as u64,
            sub: email.to_string(),
        };

        Ok(jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )?)
    }

    pub fn validate(token: &str, secret: &str) -> Result<Self, ValidateSessionTokenError> {
        if secret.is_empty() {
            Err(anyhow!("no session token secret"))?;
        }

        match jsonwebtoken::decode::<Self>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        ) {
            Ok(token) => Ok(token.claims),
            Err(e) => {
                if e.kind() == &jsonwebtoken::errors::ErrorKind::ExpiredSignature {
                    Err(ValidateSessionTokenError::Expired)
                } else {
                    Err(ValidateSessionTokenError::JwtError(e))
                }
            }
        }
    }
}

#[derive(Error, Debug)]
pub enum ValidateSessionTokenError {
    #[error("session token is expired")]
    Expired,
    #[error("session token validation error: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Resolves principals from `Authorization: Bearer <token>` session tokens.
pub struct SessionTokenResolver {
    secret: String,
}

impl SessionTokenResolver {
    pub fn new(secret: String) -> Self {
        Self { secret }
    }
}

#[async_trait]
impl PrincipalResolver for SessionTokenResolver {
    async fn resolve(&self, headers: &HeaderMap) -> anyhow::Result<Option<Principal>> {
        let Some(token) = headers
            .get(http::header::AUTHORIZATION)
            .and_then(|header| header.to_str().ok())
            .and_then(|header| header.strip_prefix("Bearer "))
        else {
            return Ok(None);
        };

        match SessionTokenClaims::validate(token.trim(), &self.secret) {
            Ok(claims) => Ok(Some(Principal { email: claims.sub })),
            Err(ValidateSessionTokenError::Other(error)) => Err(error),
            Err(error) => {
                tracing::debug!(%error, "rejected session token");
                Ok(None)
            }
        }
    }
}
