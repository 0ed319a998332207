use crate::config::Config;
use crate::errors::AppError;
use crate::models::*;
use reqwest::Client;
use serde_json::{json, Value};

/// Pulls the first task result out of a DataForSEO response envelope.
///
/// Every DataForSEO endpoint wraps its payload as
/// `{ "tasks": [ { "result": [ ... ] } ] }`.
fn first_task_result(payload: &Value) -> Option<&Value> {
    payload.get("tasks")?.get(0)?.get("result")?.get(0)
}

pub struct DataForSeoService {
    client: Client,
    base_url: String,
    login: String,
    password: String,
}

impl DataForSeoService {
    pub fn new(config: &Config) -> Self {
        Self {
            client: Client::new(),
            base_url: config.dataforseo_base_url.clone(),
            login: config.dataforseo_login.clone().unwrap_or_default(),
            password: config.dataforseo_password.clone().unwrap_or_default(),
        }
    }

    async fn post_task(&self, path: &str, task: Value) -> Result<Value, AppError> {
        let url = format!("{}{}", self.base_url, path);

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.login, Some(&self.password))
            .json(&json!([task]))
            .send()
            .await
            .map_err(|e| AppError::Provider(format!("DataForSEO request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            tracing::error!("DataForSEO returned {} for {}: {}", status, path, error_text);
            return Err(AppError::Provider(format!(
                "DataForSEO returned status {}: {}",
                status, error_text
            )));
        }

        let payload: Value = response.json().await.map_err(|e| {
            AppError::Provider(format!("Failed to parse DataForSEO response: {}", e))
        })?;

        Ok(payload)
    }

    /// Backlink profile summary for a domain.
    pub async fn backlinks_summary(&self, domain: &str) -> Result<BacklinkData, AppError> {
        tracing::info!("DataForSEO: backlinks summary for {}", domain);

        let payload = self
            .post_task("/v3/backlinks/summary/live", json!({ "target": domain }))
            .await?;

        let result = first_task_result(&payload)
            .ok_or_else(|| AppError::Provider("DataForSEO backlinks result empty".to_string()))?;

        Ok(BacklinkData {
            source: DataSource::Live,
            total_backlinks: result
                .get("backlinks")
                .and_then(|v| v.as_u64())
                .unwrap_or(0),
            referring_domains: result
                .get("referring_domains")
                .and_then(|v| v.as_u64())
                .unwrap_or(0),
            domain_authority: result
                .get("rank")
                .and_then(|v| v.as_u64())
                .map(|r| r.min(100) as u8)
                .unwrap_or(0),
        })
    }

    /// Ranked keywords for a domain, filtered down to the customer's target
    /// list when one is configured.
    pub async fn ranked_keywords(
        &self,
        domain: &str,
        targets: &[String],
    ) -> Result<KeywordData, AppError> {
        tracing::info!("DataForSEO: ranked keywords for {}", domain);

        let payload = self
            .post_task(
                "/v3/dataforseo_labs/google/ranked_keywords/live",
                json!({ "target": domain, "limit": 100 }),
            )
            .await?;

        let result = first_task_result(&payload)
            .ok_or_else(|| AppError::Provider("DataForSEO keywords result empty".to_string()))?;

        let empty = Vec::new();
        let items = result
            .get("items")
            .and_then(|v| v.as_array())
            .unwrap_or(&empty);

        let mut tracked: Vec<TrackedKeyword> = items
            .iter()
            .filter_map(|item| {
                let keyword = item
                    .get("keyword_data")
                    .and_then(|kd| kd.get("keyword"))
                    .and_then(|v| v.as_str())?
                    .to_string();

                Some(TrackedKeyword {
                    position: item
                        .get("ranked_serp_element")
                        .and_then(|r| r.get("serp_item"))
                        .and_then(|s| s.get("rank_absolute"))
                        .and_then(|v| v.as_u64())
                        .map(|p| p as u32),
                    search_volume: item
                        .get("keyword_data")
                        .and_then(|kd| kd.get("keyword_info"))
                        .and_then(|ki| ki.get("search_volume"))
                        .and_then(|v| v.as_u64())
                        .unwrap_or(0),
                    difficulty: item
                        .get("keyword_data")
                        .and_then(|kd| kd.get("keyword_properties"))
                        .and_then(|kp| kp.get("keyword_difficulty"))
                        .and_then(|v| v.as_u64())
                        .map(|d| d.min(100) as u8)
                        .unwrap_or(0),
                    keyword,
                })
            })
            .collect();

        if !targets.is_empty() {
            let wanted: Vec<String> = targets.iter().map(|t| t.to_lowercase()).collect();
            tracked.retain(|kw| wanted.contains(&kw.keyword.to_lowercase()));

            // Targets the provider has never seen still appear, unranked
            for target in targets {
                if !tracked
                    .iter()
                    .any(|kw| kw.keyword.eq_ignore_ascii_case(target))
                {
                    tracked.push(TrackedKeyword {
                        keyword: target.clone(),
                        position: None,
                        search_volume: 0,
                        difficulty: 0,
                    });
                }
            }
        }

        Ok(KeywordData {
            source: DataSource::Live,
            ranking_distribution: RankingDistribution::from_keywords(&tracked),
            tracked_keywords: tracked,
        })
    }

    /// Rank overview metrics for one (competitor) domain.
    pub async fn domain_overview(&self, domain: &str) -> Result<CompetitorData, AppError> {
        tracing::info!("DataForSEO: domain overview for {}", domain);

        let payload = self
            .post_task(
                "/v3/dataforseo_labs/google/domain_rank_overview/live",
                json!({ "target": domain }),
            )
            .await?;

        let result = first_task_result(&payload)
            .ok_or_else(|| AppError::Provider("DataForSEO overview result empty".to_string()))?;

        let metrics = result
            .get("items")
            .and_then(|v| v.get(0))
            .and_then(|item| item.get("metrics"))
            .and_then(|m| m.get("organic"));

        let backlinks = self.backlinks_summary(domain).await.unwrap_or(BacklinkData {
            source: DataSource::Live,
            total_backlinks: 0,
            referring_domains: 0,
            domain_authority: 0,
        });

        Ok(CompetitorData {
            source: DataSource::Live,
            domain: domain.to_string(),
            domain_authority: backlinks.domain_authority,
            total_backlinks: backlinks.total_backlinks,
            referring_domains: backlinks.referring_domains,
            estimated_traffic: metrics
                .and_then(|m| m.get("etv"))
                .and_then(|v| v.as_f64())
                .unwrap_or(0.0) as u64,
            common_keywords: metrics
                .and_then(|m| m.get("count"))
                .and_then(|v| v.as_u64())
                .map(|c| c.min(u32::MAX as u64) as u32)
                .unwrap_or(0),
        })
    }

    /// Lighthouse performance audit, desktop and mobile.
    pub async fn lighthouse(&self, domain: &str) -> Result<PerformanceData, AppError> {
        tracing::info!("DataForSEO: lighthouse audit for {}", domain);
        let url = format!("https://{}/", domain);

        let desktop = self
            .post_task(
                "/v3/on_page/lighthouse/live/json",
                json!({ "url": url, "for_mobile": false }),
            )
            .await?;
        let mobile = self
            .post_task(
                "/v3/on_page/lighthouse/live/json",
                json!({ "url": url, "for_mobile": true }),
            )
            .await?;

        fn score_of(payload: &Value) -> u8 {
            first_task_result(payload)
                .and_then(|r| r.get("categories"))
                .and_then(|c| c.get("performance"))
                .and_then(|p| p.get("score"))
                .and_then(|v| v.as_f64())
                .map(|s| (s * 100.0).round().clamp(0.0, 100.0) as u8)
                .unwrap_or(0)
        }

        fn audit_value(payload: &Value, audit: &str) -> f64 {
            first_task_result(payload)
                .and_then(|r| r.get("audits"))
                .and_then(|a| a.get(audit))
                .and_then(|a| a.get("numericValue"))
                .and_then(|v| v.as_f64())
                .unwrap_or(0.0)
        }

        Ok(PerformanceData {
            source: DataSource::Live,
            desktop_score: score_of(&desktop),
            mobile_score: score_of(&mobile),
            core_web_vitals: CoreWebVitals {
                lcp_ms: audit_value(&mobile, "largest-contentful-paint"),
                inp_ms: audit_value(&mobile, "interaction-to-next-paint"),
                cls: audit_value(&mobile, "cumulative-layout-shift"),
                ttfb_ms: audit_value(&mobile, "server-response-time"),
            },
        })
    }

    /// Instant on-page checks for the root URL.
    pub async fn on_page_checks(&self, domain: &str) -> Result<TechnicalSeoData, AppError> {
        tracing::info!("DataForSEO: on-page checks for {}", domain);
        let url = format!("https://{}/", domain);

        let payload = self
            .post_task("/v3/on_page/instant_pages", json!({ "url": url }))
            .await?;

        let item = first_task_result(&payload)
            .and_then(|r| r.get("items"))
            .and_then(|v| v.get(0))
            .ok_or_else(|| AppError::Provider("DataForSEO on-page result empty".to_string()))?;

        let checks = item.get("checks");
        let meta = item.get("meta");

        fn check(checks: Option<&Value>, name: &str) -> bool {
            checks
                .and_then(|c| c.get(name))
                .and_then(|v| v.as_bool())
                .unwrap_or(false)
        }

        let images = meta
            .and_then(|m| m.get("images_count"))
            .and_then(|v| v.as_u64())
            .unwrap_or(0);
        let images_without_alt = meta
            .and_then(|m| m.get("images_without_alt"))
            .and_then(|v| v.as_u64())
            .unwrap_or(0);
        let image_alt_coverage = if images == 0 {
            1.0
        } else {
            1.0 - images_without_alt as f64 / images as f64
        };

        Ok(TechnicalSeoData {
            source: DataSource::Live,
            https: item
                .get("url")
                .and_then(|v| v.as_str())
                .map(|u| u.starts_with("https://"))
                .unwrap_or(false),
            mobile_responsive: check(checks, "is_mobile_friendly"),
            sitemap: check(checks, "sitemap"),
            robots_txt: check(checks, "robots_txt"),
            canonical: check(checks, "canonical"),
            meta_description: meta
                .and_then(|m| m.get("description"))
                .and_then(|v| v.as_str())
                .map(|d| !d.is_empty())
                .unwrap_or(false),
            schema_markup: check(checks, "has_micromarkup"),
            heading_structure: meta
                .and_then(|m| m.get("htags"))
                .and_then(|h| h.get("h1"))
                .and_then(|v| v.as_array())
                .map(|h1| h1.len() == 1)
                .unwrap_or(false),
            image_alt_coverage,
        })
    }
}

// ============ Firecrawl Integration ============

pub struct FirecrawlService {
    client: Client,
    base_url: String,
    api_key: String,
}

impl FirecrawlService {
    pub fn new(config: &Config) -> Self {
        Self {
            client: Client::new(),
            base_url: config.firecrawl_base_url.clone(),
            api_key: config.firecrawl_api_key.clone().unwrap_or_default(),
        }
    }

    async fn post(&self, path: &str, body: Value) -> Result<Value, AppError> {
        let url = format!("{}{}", self.base_url, path);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Provider(format!("Firecrawl request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            tracing::error!("Firecrawl returned {} for {}: {}", status, path, error_text);
            return Err(AppError::Provider(format!(
                "Firecrawl returned status {}: {}",
                status, error_text
            )));
        }

        let payload: Value = response.json().await.map_err(|e| {
            AppError::Provider(format!("Failed to parse Firecrawl response: {}", e))
        })?;

        Ok(payload)
    }

    /// Discover a representative page set for a domain.
    pub async fn map_site(&self, domain: &str) -> Result<CrawlData, AppError> {
        tracing::info!("Firecrawl: mapping {}", domain);

        let payload = self
            .post(
                "/v1/map",
                json!({ "url": format!("https://{}", domain), "limit": 50 }),
            )
            .await?;

        let links: Vec<String> = payload
            .get("links")
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|l| l.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default();

        if links.is_empty() {
            return Err(AppError::Provider(format!(
                "Firecrawl found no pages for {}",
                domain
            )));
        }

        let pages_discovered = links.len().min(u32::MAX as usize) as u32;
        tracing::info!("Firecrawl: {} pages for {}", pages_discovered, domain);

        Ok(CrawlData {
            source: DataSource::Live,
            // Keep a representative sample; the full set can be large
            pages: links.into_iter().take(10).collect(),
            pages_discovered,
        })
    }

    /// Detect social media presence from homepage outbound links.
    ///
    /// Follower counts are not observable from a crawl; live presence data
    /// carries zero followers rather than an invented estimate.
    pub async fn scrape_social(
        &self,
        company_name: &str,
        website: &str,
    ) -> Result<SocialData, AppError> {
        tracing::info!("Firecrawl: scraping {} for social links", website);

        let payload = self
            .post(
                "/v1/scrape",
                json!({ "url": website, "formats": ["links"] }),
            )
            .await?;

        let links: Vec<String> = payload
            .get("data")
            .and_then(|d| d.get("links"))
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|l| l.as_str().map(str::to_lowercase))
                    .collect()
            })
            .unwrap_or_default();

        let platform_hosts = [
            ("facebook", "facebook.com"),
            ("instagram", "instagram.com"),
            ("linkedin", "linkedin.com"),
            ("x", "x.com"),
            ("youtube", "youtube.com"),
        ];

        let platforms: Vec<SocialPlatform> = platform_hosts
            .iter()
            .map(|(platform, host)| {
                let profile_url = links.iter().find(|l| l.contains(host)).cloned();
                SocialPlatform {
                    platform: platform.to_string(),
                    present: profile_url.is_some(),
                    followers: 0,
                    profile_url,
                }
            })
            .collect();

        tracing::debug!(
            "Firecrawl: {} social platforms detected for {}",
            platforms.iter().filter(|p| p.present).count(),
            company_name
        );

        Ok(SocialData {
            source: DataSource::Live,
            platforms,
        })
    }
}
