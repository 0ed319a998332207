use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub dataforseo_base_url: String,
    pub dataforseo_login: Option<String>,
    pub dataforseo_password: Option<String>,
    pub firecrawl_base_url: String,
    pub firecrawl_api_key: Option<String>,
    pub provider_timeout_secs: u64,
    pub worker_count: usize,
    pub staleness_hours: i64,
    pub sweep_interval_secs: u64,
    pub report_dir: String,
    pub completion_webhook_url: Option<String>, // Optional; completions are logged when absent
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            database_url: std::env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable required"))
                .and_then(|url| {
                    if url.trim().is_empty() {
                        anyhow::bail!("DATABASE_URL cannot be empty");
                    }
                    if !url.starts_with("postgresql://") && !url.starts_with("postgres://") {
                        anyhow::bail!("DATABASE_URL must start with postgresql:// or postgres://");
                    }
                    Ok(url)
                })?,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            dataforseo_base_url: std::env::var("DATAFORSEO_BASE_URL")
                .unwrap_or_else(|_| "https://api.dataforseo.com".to_string()),
            dataforseo_login: std::env::var("DATAFORSEO_LOGIN")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            dataforseo_password: std::env::var("DATAFORSEO_PASSWORD")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            firecrawl_base_url: std::env::var("FIRECRAWL_BASE_URL")
                .unwrap_or_else(|_| "https://api.firecrawl.dev".to_string()),
            firecrawl_api_key: std::env::var("FIRECRAWL_API_KEY")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            provider_timeout_secs: std::env::var("PROVIDER_TIMEOUT_SECS")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PROVIDER_TIMEOUT_SECS must be a number"))
                .and_then(|secs: u64| {
                    if !(1..=120).contains(&secs) {
                        anyhow::bail!("PROVIDER_TIMEOUT_SECS must be between 1 and 120");
                    }
                    Ok(secs)
                })?,
            worker_count: std::env::var("WORKER_COUNT")
                .unwrap_or_else(|_| "1".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("WORKER_COUNT must be a number"))
                .and_then(|count: usize| {
                    if count == 0 {
                        anyhow::bail!("WORKER_COUNT must be at least 1");
                    }
                    Ok(count)
                })?,
            staleness_hours: std::env::var("STALENESS_HOURS")
                .unwrap_or_else(|_| "24".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("STALENESS_HOURS must be a number"))
                .and_then(|hours: i64| {
                    if hours < 1 {
                        anyhow::bail!("STALENESS_HOURS must be at least 1");
                    }
                    Ok(hours)
                })?,
            sweep_interval_secs: std::env::var("SWEEP_INTERVAL_SECS")
                .unwrap_or_else(|_| "900".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("SWEEP_INTERVAL_SECS must be a number"))?,
            report_dir: std::env::var("REPORT_DIR").unwrap_or_else(|_| "reports".to_string()),
            completion_webhook_url: std::env::var("COMPLETION_WEBHOOK_URL")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(|url| {
                    if !url.starts_with("http://") && !url.starts_with("https://") {
                        anyhow::bail!("COMPLETION_WEBHOOK_URL must start with http:// or https://");
                    }
                    Ok(url)
                })
                .transpose()?,
        };

        // Log successful configuration load (without sensitive values)
        tracing::info!("Configuration loaded successfully");
        tracing::debug!(
            "Database URL: {}...",
            &config.database_url[..20.min(config.database_url.len())]
        );
        tracing::debug!("DataForSEO base URL: {}", config.dataforseo_base_url);
        tracing::debug!("Firecrawl base URL: {}", config.firecrawl_base_url);
        if config.dataforseo_login.is_none() || config.firecrawl_api_key.is_none() {
            tracing::warn!(
                "Provider credentials incomplete; audits will run on synthetic fallback data"
            );
        }
        if let Some(ref webhook) = config.completion_webhook_url {
            tracing::info!("Completion webhook configured: {}", webhook);
        }
        tracing::debug!("Server port: {}", config.port);
        tracing::debug!("Workers: {}", config.worker_count);
        tracing::debug!("Staleness window: {}h", config.staleness_hours);

        Ok(config)
    }

    /// Bounded timeout applied to every live provider call.
    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_secs)
    }

    /// True when both providers have usable credentials.
    pub fn has_live_credentials(&self) -> bool {
        self.dataforseo_login.is_some()
            && self.dataforseo_password.is_some()
            && self.firecrawl_api_key.is_some()
    }
}
