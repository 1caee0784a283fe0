use serde::Deserialize;

/// Default upstream quoting API root.
pub const DEFAULT_API_BASE_URL: &str = "https://pagoalafija.co/api/public/";

/// Default SOAT product code expected by the upstream.
pub const DEFAULT_PRODUCT_CODE: u32 = 63;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub port: u16,
    pub api_base_url: String,
    pub api_key: String,
    pub secret_key: String,
    pub auth_token: String,
    pub product_code: u32,
    /// Seconds after which a fallback token is considered stale.
    pub token_max_age_secs: u64,
    pub allowed_origins: Vec<String>,
    pub static_dir: String,
}

/// Immutable upstream credential set, derived once from [`Config`].
#[derive(Debug, Clone)]
pub struct Credentials {
    pub api_key: String,
    pub secret_key: String,
    pub auth_token: String,
    pub product_code: u32,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            api_base_url: std::env::var("API_BASE_URL")
                .or_else(|_| Ok::<_, anyhow::Error>(DEFAULT_API_BASE_URL.to_string()))
                .and_then(|url| {
                    if url.trim().is_empty() {
                        anyhow::bail!("API_BASE_URL cannot be empty");
                    }
                    if !url.starts_with("http://") && !url.starts_with("https://") {
                        anyhow::bail!("API_BASE_URL must start with http:// or https://");
                    }
                    Ok(url)
                })?,
            api_key: required_env("API_KEY")?,
            secret_key: required_env("SECRET_KEY")?,
            auth_token: required_env("AUTH_TOKEN")?,
            product_code: std::env::var("COD_PRODUCTO")
                .unwrap_or_else(|_| DEFAULT_PRODUCT_CODE.to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("COD_PRODUCTO must be a positive integer"))?,
            token_max_age_secs: std::env::var("TOKEN_MAX_AGE_SECS")
                .unwrap_or_else(|_| "3600".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("TOKEN_MAX_AGE_SECS must be a number of seconds"))?,
            allowed_origins: parse_origins(&std::env::var("ALLOWED_ORIGINS").unwrap_or_default()),
            static_dir: std::env::var("STATIC_DIR")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| "public".to_string()),
        };

        // Never log secrets in full
        tracing::info!("Configuration loaded successfully");
        tracing::debug!("API Base URL: {}", config.api_base_url);
        tracing::debug!("API Key: {}***", preview(&config.api_key, 10));
        tracing::debug!("Secret Key: {}***", preview(&config.secret_key, 20));
        tracing::debug!("Auth Token: {}***", preview(&config.auth_token, 10));
        tracing::debug!("Product code: {}", config.product_code);
        tracing::debug!("Server Port: {}", config.port);

        Ok(config)
    }

    pub fn credentials(&self) -> Credentials {
        Credentials {
            api_key: self.api_key.clone(),
            secret_key: self.secret_key.clone(),
            auth_token: self.auth_token.clone(),
            product_code: self.product_code,
        }
    }

    pub fn token_max_age(&self) -> chrono::Duration {
        chrono::Duration::from_std(std::time::Duration::from_secs(self.token_max_age_secs))
            .unwrap_or_else(|_| chrono::Duration::days(36_500))
    }
}

fn required_env(name: &str) -> anyhow::Result<String> {
    let value = std::env::var(name)
        .map_err(|_| anyhow::anyhow!("{} environment variable required", name))?;
    if value.trim().is_empty() {
        anyhow::bail!("{} cannot be empty", name);
    }
    Ok(value)
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// First `len` characters of a secret, for logs and diagnostics.
pub fn preview(secret: &str, len: usize) -> String {
    secret.chars().take(len).collect()
}
