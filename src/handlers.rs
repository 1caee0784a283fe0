use crate::config::{preview, Config};
use crate::errors::AppError;
use crate::models::{FailureTokenInfo, QuoteFailureDebug, QuoteParams, QuoteRequest};
use crate::normalizer::{extract_price, to_iso};
use crate::quote_gateway::QuoteGateway;
use crate::token_manager::{TokenManager, TokenProvenance};
use crate::upstream_client::{UpstreamClient, DIAGNOSTIC_REQUEST_TIMEOUT, HEADER_STRATEGIES};
use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// Client for the upstream quoting API.
    pub upstream: UpstreamClient,
    /// Owner of the current upstream token.
    pub tokens: Arc<TokenManager>,
    /// Quote workflow.
    pub gateway: QuoteGateway,
}

impl AppState {
    /// Wires the upstream client, token manager and gateway from config.
    pub fn from_config(config: Config) -> Result<Self, AppError> {
        let upstream = UpstreamClient::new(&config.api_base_url)?;
        let credentials = config.credentials();
        let tokens = Arc::new(TokenManager::new(
            upstream.clone(),
            credentials.clone(),
            config.token_max_age(),
        ));
        let gateway = QuoteGateway::new(upstream.clone(), tokens.clone(), &credentials);

        Ok(Self {
            config,
            upstream,
            tokens,
            gateway,
        })
    }
}

/// Quote route, kept apart so the binary can give it a stricter rate limit.
pub fn quote_routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/cotizar", post(quote))
}

/// Diagnostic and passthrough routes.
pub fn diagnostic_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/test", get(test_quote))
        .route("/api/test-generate-token", post(test_generate_token))
        .route("/api/info", get(info))
        .route("/api/soat", get(soat_proxy))
}

/// All routes, without process-level middleware.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(quote_routes())
        .merge(diagnostic_routes())
        .with_state(state)
}

/// Health check endpoint.
pub async fn health() -> (StatusCode, Json<Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

/// POST /api/cotizar
///
/// Main quote endpoint consumed by the front-end.
///
/// # Returns
///
/// * `Response` - The normalized quote, a 400 for missing fields, or the
///   last upstream failure with a `debug` block.
pub async fn quote(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<QuoteRequest>, JsonRejection>,
) -> Response {
    tracing::info!("=== POST /api/cotizar ===");

    let request = match payload {
        Ok(Json(request)) => request,
        Err(e) => {
            tracing::warn!("Rejected quote body: {}", e);
            return AppError::BadRequest(format!(
                "Cuerpo de solicitud inválido: {}",
                e.body_text()
            ))
            .into_response();
        }
    };

    match state.gateway.quote(&request).await {
        Ok(response) => {
            tracing::info!(
                "✓ Quote succeeded: {} price={}",
                response.metadata.reference,
                response.precio
            );
            Json(response).into_response()
        }
        Err(e @ AppError::BadRequest(_)) => e.into_response(),
        Err(e) => {
            tracing::error!(
                "Quote failed - status: {:?}, message: {}",
                e.upstream_status(),
                e.public_message()
            );
            let debug = failure_debug(&state, &request).await;
            let mut body = e.response_body();
            if let (Some(fields), Ok(debug)) = (body.as_object_mut(), serde_json::to_value(debug)) {
                fields.insert("debug".to_string(), debug);
            }
            (e.status_code(), Json(body)).into_response()
        }
    }
}

/// Token state, target URL and query of a failed quote.
async fn failure_debug(state: &AppState, request: &QuoteRequest) -> QuoteFailureDebug {
    let token = state.tokens.snapshot().await;

    QuoteFailureDebug {
        token_info: FailureTokenInfo {
            has_token: !token.value.is_empty(),
            token_type: token.provenance.label().to_string(),
            token_age: format!("{} min", token.age_minutes()),
        },
        url: format!("{}soat", state.upstream.base_url()),
        params: request
            .validate()
            .ok()
            .map(|valid| QuoteParams::new(&valid, state.config.product_code)),
    }
}

/// GET /api/test
///
/// Single-strategy diagnostic against a fixed sample plate.
pub async fn test_quote(State(state): State<Arc<AppState>>) -> Response {
    tracing::info!("=== GET /api/test ===");

    let token = state.tokens.get_valid_token().await;
    let params = QuoteParams::diagnostic_sample(state.config.product_code);
    let token_info = json!({
        "type": token.provenance.label(),
        "preview": format!("{}...", token.preview()),
    });

    match state
        .upstream
        .fetch_quote(&params, &HEADER_STRATEGIES[0], &token.value, DIAGNOSTIC_REQUEST_TIMEOUT)
        .await
    {
        Ok(data) => {
            tracing::info!("✓ Diagnostic quote succeeded");
            Json(json!({
                "success": true,
                "message": "Test exitoso con credenciales correctas",
                "status": StatusCode::OK.as_u16(),
                "extractedPrice": extract_price(&data),
                "data": data,
                "tokenInfo": token_info,
            }))
            .into_response()
        }
        Err(e) => {
            tracing::error!("Diagnostic quote failed: {}", e);
            (
                e.status_code(),
                Json(json!({
                    "success": false,
                    "error": e.to_string(),
                    "details": e.upstream_body(),
                    "tokenInfo": token_info,
                })),
            )
                .into_response()
        }
    }
}

/// POST /api/test-generate-token
///
/// Forces an issuance round and reports the outcome.
pub async fn test_generate_token(State(state): State<Arc<AppState>>) -> Json<Value> {
    tracing::info!("=== POST /api/test-generate-token ===");

    let token = state.tokens.issue_new_token().await;
    let token_type = match token.provenance {
        TokenProvenance::Issued => "GENERADO",
        TokenProvenance::Fallback => "FIJO (no se pudo generar)",
    };

    Json(json!({
        "success": true,
        "message": "Test de generación completado",
        "newToken": format!("{}...", token.preview()),
        "tokenType": token_type,
    }))
}

/// GET /api/info
///
/// Process and credential snapshot. Secrets are truncated.
pub async fn info(State(state): State<Arc<AppState>>) -> Json<Value> {
    let credentials = state.tokens.credentials();
    let token = state.tokens.snapshot().await;

    Json(json!({
        "status": "READY",
        "server": "Badelco SOAT API",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": to_iso(Utc::now()),
        "credentials": {
            "apiKey": format!("{}...", preview(&credentials.api_key, 10)),
            "secretKey": format!("{}...", preview(&credentials.secret_key, 20)),
            "authToken": format!("{}...", preview(&credentials.auth_token, 30)),
            "configured": !credentials.api_key.is_empty()
                && !credentials.secret_key.is_empty()
                && !credentials.auth_token.is_empty(),
        },
        "token": {
            "current": format!("{}...", token.preview()),
            "type": token.provenance.label(),
            "age": token.age_label(),
        },
        "endpoints": {
            "test": "GET /api/test - Test simple",
            "testGenerateToken": "POST /api/test-generate-token - Generar token",
            "cotizar": "POST /api/cotizar - Cotización SOAT",
            "soat": "GET /api/soat - Proxy directo",
            "info": "GET /api/info",
        }
    }))
}

/// GET /api/soat
///
/// Passthrough of the caller's query string to the upstream quoting endpoint.
pub async fn soat_proxy(
    State(state): State<Arc<AppState>>,
    Query(params): Query<Vec<(String, String)>>,
) -> Response {
    let token = state.tokens.get_valid_token().await;

    match state.upstream.proxy_quote(&params, &token.value).await {
        Ok(data) => Json(data).into_response(),
        Err(e) => {
            tracing::warn!("Proxy request failed: {}", e);
            (
                e.status_code(),
                Json(json!({
                    "error": e.to_string(),
                    "details": e.upstream_body(),
                })),
            )
                .into_response()
        }
    }
}
