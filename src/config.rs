use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Base URL of the hosted data/auth/storage platform.
    pub platform_url: String,
    /// Public (anon) API key sent as `apikey` on every platform call.
    pub platform_anon_key: String,
    /// Storage bucket holding uploaded logos and covers.
    pub storage_bucket: String,
    /// Canonical public site URL, used for page metadata.
    pub site_url: String,
    pub port: u16,
    /// How long a resolved session stays memoized.
    pub session_cache_ttl_secs: u64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            platform_url: std::env::var("PLATFORM_URL")
                .map_err(|_| anyhow::anyhow!("PLATFORM_URL environment variable required"))
                .and_then(|url| validate_http_url("PLATFORM_URL", url))?,
            platform_anon_key: std::env::var("PLATFORM_ANON_KEY")
                .map_err(|_| anyhow::anyhow!("PLATFORM_ANON_KEY environment variable required"))
                .and_then(|key| {
                    if key.trim().is_empty() {
                        anyhow::bail!("PLATFORM_ANON_KEY cannot be empty");
                    }
                    Ok(key)
                })?,
            storage_bucket: std::env::var("STORAGE_BUCKET")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| "public".to_string()),
            site_url: match std::env::var("SITE_URL") {
                Ok(url) if !url.trim().is_empty() => validate_http_url("SITE_URL", url)?,
                _ => "https://agentdex.com.br".to_string(),
            },
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            session_cache_ttl_secs: std::env::var("SESSION_CACHE_TTL_SECS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("SESSION_CACHE_TTL_SECS must be a number of seconds"))?,
        };

        // Log successful configuration load (without sensitive values)
        tracing::info!("Configuration loaded successfully");
        tracing::debug!("Platform URL: {}", config.platform_url);
        tracing::debug!("Storage bucket: {}", config.storage_bucket);
        tracing::debug!("Site URL: {}", config.site_url);
        tracing::debug!("Server Port: {}", config.port);

        Ok(config)
    }
}

fn validate_http_url(name: &str, url: String) -> anyhow::Result<String> {
    if url.trim().is_empty() {
        anyhow::bail!("{} cannot be empty", name);
    }
    if !url.starts_with("http://") && !url.starts_with("https://") {
        anyhow::bail!("{} must start with http:// or https://", name);
    }
    Ok(url.trim_end_matches('/').to_string())
}
