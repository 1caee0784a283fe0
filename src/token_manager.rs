/// Owner of the single upstream credential used for quoting.
///
/// The upstream's token contract is not reliably known, so issuance probes a
/// fixed list of endpoints and methods and adopts the first token it gets.
/// The state starts as the configured fallback token and is only ever
/// replaced wholesale. Concurrent issuances are not serialized: the last
/// writer wins and the other issued token is dropped.
use crate::config::{preview, Credentials};
use crate::errors::AppError;
use crate::upstream_client::{IssuanceMethod, UpstreamClient};
use chrono::{DateTime, Duration, Utc};
use std::fmt;
use tokio::sync::RwLock;

/// Issuance endpoints, probed in order.
pub const TOKEN_ENDPOINTS: &[&str] = &["token", "auth/token", "authenticate", "login"];

/// Methods tried against each endpoint, in order.
pub const ISSUANCE_METHODS: &[IssuanceMethod] =
    &[IssuanceMethod::HeaderGet, IssuanceMethod::BodyPost];

/// Where the current token came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenProvenance {
    /// The long-lived token from configuration.
    Fallback,
    /// A token issued by the upstream at runtime.
    Issued,
}

impl TokenProvenance {
    /// Wire label used by the front-end.
    pub fn label(&self) -> &'static str {
        match self {
            TokenProvenance::Fallback => "FIJO",
            TokenProvenance::Issued => "GENERADO",
        }
    }
}

impl fmt::Display for TokenProvenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Snapshot of the token state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub value: String,
    pub issued_at: DateTime<Utc>,
    pub provenance: TokenProvenance,
}

impl Token {
    pub fn fallback(value: impl Into<String>, issued_at: DateTime<Utc>) -> Self {
        Self {
            value: value.into(),
            issued_at,
            provenance: TokenProvenance::Fallback,
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.provenance == TokenProvenance::Fallback
    }

    pub fn age(&self) -> Duration {
        Utc::now() - self.issued_at
    }

    /// Whole minutes since issuance, never negative.
    pub fn age_minutes(&self) -> i64 {
        self.age().num_minutes().max(0)
    }

    /// Age rendered for the front-end, e.g. `"12 minutos"`.
    pub fn age_label(&self) -> String {
        format!("{} minutos", self.age_minutes())
    }

    /// First 30 characters, for logs and diagnostics.
    pub fn preview(&self) -> String {
        preview(&self.value, 30)
    }
}

pub struct TokenManager {
    client: UpstreamClient,
    credentials: Credentials,
    max_age: Duration,
    /// When the configured fallback token came into use, normally start-up.
    fallback_since: DateTime<Utc>,
    state: RwLock<Token>,
}

impl TokenManager {
    /// Starts from the configured fallback token, issued now.
    pub fn new(client: UpstreamClient, credentials: Credentials, max_age: Duration) -> Self {
        let initial = Token::fallback(credentials.auth_token.clone(), Utc::now());
        Self::with_state(client, credentials, max_age, initial)
    }

    /// Starts from an explicit state.
    pub fn with_state(
        client: UpstreamClient,
        credentials: Credentials,
        max_age: Duration,
        initial: Token,
    ) -> Self {
        let fallback_since = if initial.is_fallback() {
            initial.issued_at
        } else {
            Utc::now()
        };
        Self {
            client,
            credentials,
            max_age,
            fallback_since,
            state: RwLock::new(initial),
        }
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Current state, without side effects.
    pub async fn snapshot(&self) -> Token {
        self.state.read().await.clone()
    }

    /// Returns a usable token.
    ///
    /// A fallback token older than the max age triggers an issuance attempt
    /// first. Issuance failure is not an error: the fallback is returned.
    pub async fn get_valid_token(&self) -> Token {
        let current = self.snapshot().await;

        if current.is_fallback() && current.age() > self.max_age {
            tracing::info!(
                "Fallback token is {} old, trying to issue a new one",
                current.age_label()
            );
            return self.issue_new_token().await;
        }

        tracing::debug!("Using current {} token", current.provenance);
        current
    }

    /// Probes every issuance candidate and adopts the first token obtained.
    ///
    /// When every probe fails the state is left untouched and the configured
    /// fallback token is returned.
    pub async fn issue_new_token(&self) -> Token {
        match self.probe_candidates().await {
            Ok(value) => {
                let issued = Token {
                    value,
                    issued_at: Utc::now(),
                    provenance: TokenProvenance::Issued,
                };
                *self.state.write().await = issued.clone();
                tracing::info!("✓ New token adopted: {}***", issued.preview());
                issued
            }
            Err(e) => {
                tracing::warn!("{}; keeping the fallback token", e);
                let current = self.snapshot().await;
                if current.is_fallback() {
                    current
                } else {
                    Token::fallback(self.credentials.auth_token.clone(), self.fallback_since)
                }
            }
        }
    }

    async fn probe_candidates(&self) -> Result<String, AppError> {
        tracing::info!("Issuing a new token with API key and secret key");

        for endpoint in TOKEN_ENDPOINTS {
            for method in ISSUANCE_METHODS {
                match self
                    .client
                    .request_token(endpoint, *method, &self.credentials)
                    .await
                {
                    Ok(token) => {
                        tracing::info!(
                            "✓ Token issued by '{}' ({})",
                            endpoint,
                            method.as_str()
                        );
                        return Ok(token);
                    }
                    Err(e) => tracing::debug!("   {}", e),
                }
            }
        }

        Err(AppError::TokenIssuance(
            "no issuance endpoint returned a token".to_string(),
        ))
    }
}
