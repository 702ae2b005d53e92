//! HTTP surface over [`UrlSigner`].
//!
//! Reports results only; it does not guard any other route.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, sync::Arc};

use crate::config::UrlSignerConfig;
use crate::key::StaticKey;
use crate::signature::EXPIRES_PARAM;
use crate::signer::{Expiration, UrlSigner, Verdict};
use crate::url::CanonicalUrl;
use crate::UrlSignerError;

struct AppState {
    signer: UrlSigner<StaticKey>,
    default_ttl: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct SignResponse {
    pub signed_url: String,
    pub expires: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ValidateQuery {
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct ValidateResponse {
    pub valid: bool,
    pub verdict: Verdict,
}

fn error_response(e: UrlSignerError) -> Response {
    let status = match e {
        UrlSignerError::EmptyInput | UrlSignerError::MalformedUrl(_) => StatusCode::BAD_REQUEST,
        UrlSignerError::KeyUnavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, e.to_string()).into_response()
}

// `url` and `ttl` are the handler's own controls and are never signed; a
// target needing parameters with those names must carry them in `url`'s own
// query string. Every other query pair is signed along.
async fn sign_handler(
    State(state): State<Arc<AppState>>,
    Query(mut query): Query<BTreeMap<String, String>>,
) -> Response {
    let Some(url) = query.remove("url") else {
        return (StatusCode::BAD_REQUEST, "Missing url").into_response();
    };
    let ttl = match query.remove("ttl") {
        Some(raw) => match raw.parse::<u64>() {
            Ok(ttl) => Some(ttl),
            Err(_) => return (StatusCode::BAD_REQUEST, "Invalid ttl").into_response(),
        },
        None => state.default_ttl,
    };

    match state.signer.sign(&url, query, ttl.map(Expiration::Seconds)) {
        Ok(signed_url) => {
            let expires = CanonicalUrl::new(&signed_url)
                .ok()
                .and_then(|u| u.query_str(EXPIRES_PARAM).and_then(|s| s.parse().ok()));
            Json(SignResponse { signed_url, expires }).into_response()
        }
        Err(e) => {
            tracing::warn!("Failed to sign url={}: {}", url, e);
            error_response(e)
        }
    }
}

async fn validate_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ValidateQuery>,
) -> Response {
    match state.signer.check(&query.url) {
        Ok(verdict) => Json(ValidateResponse { valid: verdict.is_valid(), verdict }).into_response(),
        Err(e) => {
            tracing::warn!("Failed to validate url={}: {}", query.url, e);
            error_response(e)
        }
    }
}

async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "urlsigner"
    }))
}

pub fn router(config: UrlSignerConfig) -> Router {
    let state = Arc::new(AppState {
        signer: UrlSigner::new(StaticKey::new(config.secret)),
        default_ttl: config.default_ttl,
    });

    Router::new()
        .route("/health", get(health_handler))
        .route("/sign", get(sign_handler))
        .route("/validate", get(validate_handler))
        .with_state(state)
}
