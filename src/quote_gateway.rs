/// Quote workflow shared by the HTTP handlers
///
/// 1. Validate the request (no outbound call on failure)
/// 2. Obtain a token from the token manager
/// 3. Try each header strategy against the upstream, in order
/// 4. On the first 401 with the fallback token, force issuance and retry once
/// 5. Normalize the successful payload into the stable response
use crate::config::Credentials;
use crate::errors::AppError;
use crate::models::{
    Payer, QuoteDebug, QuoteMetadata, QuoteParams, QuoteRequest, QuoteResponse,
    ValidQuoteRequest, BANK_ACCOUNTS, PAYMENT_INSTRUCTIONS,
};
use crate::normalizer::{
    available_fields, extract_dates, extract_payer_name, extract_price, extract_vehicle_info,
    lookup_value, response_type, to_iso, NOT_AVAILABLE,
};
use crate::token_manager::{Token, TokenManager};
use crate::upstream_client::{
    HeaderStrategy, UpstreamClient, HEADER_STRATEGIES, QUOTE_REQUEST_TIMEOUT,
};
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;

/// Successful upstream answer together with how it was obtained.
#[derive(Debug, Clone)]
pub struct UpstreamQuote {
    pub payload: Value,
    pub strategy: &'static str,
    pub token: Token,
}

#[derive(Clone)]
pub struct QuoteGateway {
    client: UpstreamClient,
    tokens: Arc<TokenManager>,
    product_code: u32,
}

impl QuoteGateway {
    pub fn new(client: UpstreamClient, tokens: Arc<TokenManager>, credentials: &Credentials) -> Self {
        Self {
            client,
            tokens,
            product_code: credentials.product_code,
        }
    }

    pub fn tokens(&self) -> &Arc<TokenManager> {
        &self.tokens
    }

    /// Validates, fetches and normalizes a quote.
    pub async fn quote(&self, request: &QuoteRequest) -> Result<QuoteResponse, AppError> {
        let request = request.validate()?;
        tracing::info!(
            "New quote: plate={}, document_type={}",
            request.plate,
            request.document_type
        );

        let upstream = self.fetch(&request).await?;
        Ok(self.normalize(&request, upstream))
    }

    /// Runs the header-strategy loop for an already validated request.
    pub async fn fetch(&self, request: &ValidQuoteRequest) -> Result<UpstreamQuote, AppError> {
        let params = QuoteParams::new(request, self.product_code);
        let mut token = self.tokens.get_valid_token().await;
        tracing::debug!(
            "Quote params: {:?}, token {}*** ({})",
            params,
            token.preview(),
            token.provenance
        );

        let mut reissued = false;
        let mut last_error: Option<AppError> = None;

        for strategy in HEADER_STRATEGIES {
            let result = self.attempt(strategy, &params, &token).await;
            let err = match result {
                Ok(payload) => return Ok(UpstreamQuote { payload, strategy: strategy.name, token }),
                Err(err) => err,
            };

            if err.is_auth_rejection() && token.is_fallback() && !reissued {
                reissued = true;
                tracing::info!("401 with the fallback token, issuing a new token");
                token = self.tokens.issue_new_token().await;

                let retry = self.attempt(strategy, &params, &token).await;
                match retry {
                    Ok(payload) => {
                        tracing::info!("✓ Succeeded with new token and strategy '{}'", strategy.name);
                        return Ok(UpstreamQuote { payload, strategy: strategy.name, token });
                    }
                    Err(retry_err) => {
                        tracing::warn!("Retry with new token failed: {}", retry_err);
                        last_error = Some(retry_err);
                        continue;
                    }
                }
            }

            last_error = Some(err);
        }

        Err(last_error.unwrap_or_else(|| {
            AppError::Internal("no header strategy was attempted".to_string())
        }))
    }

    async fn attempt(
        &self,
        strategy: &HeaderStrategy,
        params: &QuoteParams,
        token: &Token,
    ) -> Result<Value, AppError> {
        match self
            .client
            .fetch_quote(params, strategy, &token.value, QUOTE_REQUEST_TIMEOUT)
            .await
        {
            Ok(payload) => {
                tracing::info!("✓ Strategy '{}' succeeded", strategy.name);
                Ok(payload)
            }
            Err(e) => {
                tracing::warn!(
                    "Strategy '{}' failed - status: {:?}, token: {}***",
                    strategy.name,
                    e.upstream_status(),
                    token.preview()
                );
                Err(e)
            }
        }
    }

    /// Builds the stable response from a successful upstream answer.
    pub fn normalize(&self, request: &ValidQuoteRequest, upstream: UpstreamQuote) -> QuoteResponse {
        let payload = &upstream.payload;
        let price = extract_price(payload);
        let vehicle = extract_vehicle_info(payload);
        let dates = extract_dates(payload);
        tracing::info!("Extracted price: {}, vehicle: {:?}", price, vehicle);

        let now = Utc::now();
        let payer = Payer {
            name: payer_field(&request.name, || extract_payer_name(payload)),
            document_number: request.document_number.clone(),
            document_type: request.document_type.clone(),
            email: payer_field(&request.email, || lookup_value(payload, &["email"])),
            phone: payer_field(&request.phone, || lookup_value(payload, &["telefono"])),
        };

        QuoteResponse {
            success: true,
            placa: request.plate.clone(),
            precio: price,
            vehicle_type: vehicle.vehicle_type.clone(),
            marca: vehicle.brand.clone(),
            modelo: vehicle.model.clone(),
            cilindraje: vehicle.displacement.clone(),
            validity_start: dates.start,
            validity_end: dates.end,
            tomador: payer,
            bank_accounts: BANK_ACCOUNTS.to_vec(),
            payment_instructions: PAYMENT_INSTRUCTIONS.to_vec(),
            metadata: QuoteMetadata {
                timestamp: to_iso(now),
                reference: reference_number(&request.plate, now.timestamp_millis()),
                token_type: upstream.token.provenance.label().to_string(),
                token_age: upstream.token.age_label(),
            },
            debug: QuoteDebug {
                original_response: payload.clone(),
                extracted_price: price,
                vehicle_info: vehicle,
                available_fields: available_fields(payload),
                response_type: response_type(payload),
                strategy: upstream.strategy.to_string(),
            },
        }
    }
}

/// Request value first, then the upstream's, then `N/A`.
fn payer_field(requested: &Option<String>, upstream: impl FnOnce() -> Option<Value>) -> Value {
    requested
        .clone()
        .map(Value::String)
        .or_else(upstream)
        .unwrap_or_else(|| Value::String(NOT_AVAILABLE.to_string()))
}

/// `SOAT-<PLATE>-<epoch-ms>`
pub fn reference_number(plate: &str, epoch_ms: i64) -> String {
    format!("SOAT-{}-{}", plate.to_uppercase(), epoch_ms)
}
