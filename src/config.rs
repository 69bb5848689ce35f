use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    /// Secret key for the payment processor, passed via HTTP basic auth.
    pub stripe_secret_key: String,
    pub stripe_api_base: String,
    /// Hard timeout applied to every payment-processor call.
    pub payment_timeout: Duration,
    pub media_upload_url: String,
    pub media_api_key: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(3000);
        let stripe_secret_key = env::var("STRIPE_SECRET_KEY")?;
        let stripe_api_base = env::var("STRIPE_API_BASE")
            .unwrap_or_else(|_| "https://api.stripe.com".to_string());
        let payment_timeout = env::var("PAYMENT_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(10));
        let media_upload_url = env::var("MEDIA_UPLOAD_URL")?;
        let media_api_key = env::var("MEDIA_API_KEY").ok();
        Ok(Self {
            database_url,
            host,
            port,
            stripe_secret_key,
            stripe_api_base,
            payment_timeout,
            media_upload_url,
            media_api_key,
        })
    }
}
