use crate::config::{preview, Credentials};
use crate::errors::AppError;
use crate::models::QuoteParams;
use reqwest::Response;
use serde_json::{json, Value};
use std::time::Duration;
use url::Url;

/// Per-attempt bound for token issuance probes.
pub const TOKEN_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
/// Per-attempt bound for quote requests and the passthrough proxy.
pub const QUOTE_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
/// Bound for the `/api/test` diagnostic call.
pub const DIAGNOSTIC_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Body fields that may carry an issued token, checked in order.
pub const TOKEN_FIELDS: &[&str] = &["AuthToken", "authToken", "token"];

/// One way of presenting the token to the upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderStrategy {
    pub name: &'static str,
    pub header: &'static str,
    /// Prefix placed before the token, e.g. `Bearer `.
    pub prefix: &'static str,
}

impl HeaderStrategy {
    pub fn header_value(&self, token: &str) -> String {
        format!("{}{}", self.prefix, token)
    }
}

/// Header conventions in fixed priority order.
pub const HEADER_STRATEGIES: &[HeaderStrategy] = &[
    HeaderStrategy {
        name: "Auth-Token",
        header: "Auth-Token",
        prefix: "",
    },
    HeaderStrategy {
        name: "Authorization Bearer",
        header: "Authorization",
        prefix: "Bearer ",
    },
    HeaderStrategy {
        name: "AuthToken",
        header: "AuthToken",
        prefix: "",
    },
    HeaderStrategy {
        name: "Token",
        header: "Token",
        prefix: "",
    },
    HeaderStrategy {
        name: "X-Auth-Token",
        header: "X-Auth-Token",
        prefix: "",
    },
    HeaderStrategy {
        name: "X-Token",
        header: "X-Token",
        prefix: "",
    },
];

/// How an issuance probe carries the credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssuanceMethod {
    /// GET with `secretkey` / `apikey` headers.
    HeaderGet,
    /// POST with a JSON body `{secretkey, apikey}`.
    BodyPost,
}

impl IssuanceMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssuanceMethod::HeaderGet => "GET con headers",
            IssuanceMethod::BodyPost => "POST con body",
        }
    }
}

/// Client for the third-party SOAT quoting API.
#[derive(Clone)]
pub struct UpstreamClient {
    client: reqwest::Client,
    base_url: Url,
}

impl UpstreamClient {
    /// Creates a new `UpstreamClient`.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Root of the upstream API. A trailing slash is added if
    ///   missing so relative endpoints resolve beneath it.
    pub fn new(base_url: &str) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create upstream client: {}", e)))?;

        let mut normalized = base_url.trim().to_string();
        if !normalized.ends_with('/') {
            normalized.push('/');
        }
        let base_url = Url::parse(&normalized)
            .map_err(|e| AppError::Internal(format!("Invalid upstream base URL: {}", e)))?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, AppError> {
        self.base_url
            .join(path)
            .map_err(|e| AppError::Internal(format!("Failed to build URL for '{}': {}", path, e)))
    }

    /// Probes one issuance endpoint with one method.
    ///
    /// # Returns
    ///
    /// * `Ok(token)` when the upstream answered with success and a recognizable
    ///   token field, `Err(AppError::TokenIssuance)` otherwise.
    pub async fn request_token(
        &self,
        endpoint: &str,
        method: IssuanceMethod,
        credentials: &Credentials,
    ) -> Result<String, AppError> {
        let url = self.endpoint(endpoint)?;
        tracing::info!("Probing token endpoint {} ({})", url, method.as_str());

        let request = match method {
            IssuanceMethod::HeaderGet => self
                .client
                .get(url)
                .header("secretkey", &credentials.secret_key)
                .header("apikey", &credentials.api_key)
                .header("Content-Type", "application/json"),
            IssuanceMethod::BodyPost => self.client.post(url).json(&json!({
                "secretkey": credentials.secret_key,
                "apikey": credentials.api_key,
            })),
        };

        let response = request
            .timeout(TOKEN_REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| AppError::TokenIssuance(format!("{} request failed: {}", endpoint, e)))?;

        let status = response.status();
        tracing::info!("   Status: {}", status);
        if !status.is_success() {
            return Err(AppError::TokenIssuance(format!(
                "{} answered {}",
                endpoint, status
            )));
        }

        let body: Value = response.json().await.map_err(|e| {
            AppError::TokenIssuance(format!("{} returned a non-JSON body: {}", endpoint, e))
        })?;

        token_from_body(&body).ok_or_else(|| {
            AppError::TokenIssuance(format!("{} response carries no token field", endpoint))
        })
    }

    /// One quote attempt with one header strategy.
    pub async fn fetch_quote(
        &self,
        params: &QuoteParams,
        strategy: &HeaderStrategy,
        token: &str,
        timeout: Duration,
    ) -> Result<Value, AppError> {
        let url = self.endpoint("soat")?;
        tracing::info!(
            "Trying strategy '{}' against {} (token {}***)",
            strategy.name,
            url,
            preview(token, 30)
        );

        let response = self
            .client
            .get(url)
            .header(strategy.header, strategy.header_value(token))
            .header("Content-Type", "application/json")
            .header("Accept", "application/json")
            .query(params)
            .timeout(timeout)
            .send()
            .await?;

        read_json(response).await
    }

    /// Forwards arbitrary query parameters to the quoting endpoint.
    pub async fn proxy_quote(
        &self,
        query: &[(String, String)],
        token: &str,
    ) -> Result<Value, AppError> {
        let url = self.endpoint("soat")?;
        tracing::info!("Proxying {} query parameter(s) to {}", query.len(), url);

        let response = self
            .client
            .get(url)
            .header("Auth-Token", token)
            .header("Content-Type", "application/json")
            .query(query)
            .timeout(QUOTE_REQUEST_TIMEOUT)
            .send()
            .await?;

        read_json(response).await
    }
}

/// First non-empty string under one of [`TOKEN_FIELDS`].
pub fn token_from_body(body: &Value) -> Option<String> {
    TOKEN_FIELDS.iter().find_map(|field| {
        body.get(*field)
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    })
}

/// Maps a response to its JSON body or to the matching upstream error.
async fn read_json(response: Response) -> Result<Value, AppError> {
    let status = response.status();
    let text = response.text().await?;
    let body = parse_body(&text);

    if !status.is_success() {
        tracing::warn!("Upstream returned {}: {}", status, text);
        return Err(AppError::from_upstream_status(status.as_u16(), body));
    }

    Ok(body.unwrap_or(Value::Null))
}

/// JSON when possible, raw text otherwise, nothing for an empty body.
fn parse_body(text: &str) -> Option<Value> {
    if text.trim().is_empty() {
        return None;
    }
    Some(serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string())))
}
