//! Data provider adapter interface.
//!
//! Each adapter turns heterogeneous provider responses into the fixed
//! internal section shapes; all defaulting lives inside the adapter. The
//! collector picks an adapter via dependency injection, so synthetic data is
//! never silently mixed into the live code path: it is a provider of its
//! own, and every section carries its `source` marker.

use crate::config::Config;
use crate::errors::AppError;
use crate::models::{
    BacklinkData, CompetitorData, CrawlData, KeywordData, PerformanceData, SocialData,
    TechnicalSeoData,
};
use crate::services::{DataForSeoService, FirecrawlService};
use crate::synthetic::SyntheticDataGenerator;
use async_trait::async_trait;

/// One entry point per data domain, each taking a bare domain.
#[async_trait]
pub trait SeoDataProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn crawl(&self, domain: &str) -> Result<CrawlData, AppError>;

    async fn performance(&self, domain: &str) -> Result<PerformanceData, AppError>;

    async fn technical_seo(&self, domain: &str) -> Result<TechnicalSeoData, AppError>;

    async fn backlinks(&self, domain: &str) -> Result<BacklinkData, AppError>;

    async fn keywords(&self, domain: &str, targets: &[String]) -> Result<KeywordData, AppError>;

    async fn competitor(&self, domain: &str) -> Result<CompetitorData, AppError>;

    async fn social(&self, company_name: &str, website: &str) -> Result<SocialData, AppError>;
}

/// Live adapter composing DataForSEO (metrics) and Firecrawl (crawling,
/// social link detection).
pub struct LiveProvider {
    dataforseo: DataForSeoService,
    firecrawl: FirecrawlService,
}

impl LiveProvider {
    pub fn new(config: &Config) -> Self {
        Self {
            dataforseo: DataForSeoService::new(config),
            firecrawl: FirecrawlService::new(config),
        }
    }
}

#[async_trait]
impl SeoDataProvider for LiveProvider {
    fn name(&self) -> &'static str {
        "live"
    }

    async fn crawl(&self, domain: &str) -> Result<CrawlData, AppError> {
        self.firecrawl.map_site(domain).await
    }

    async fn performance(&self, domain: &str) -> Result<PerformanceData, AppError> {
        self.dataforseo.lighthouse(domain).await
    }

    async fn technical_seo(&self, domain: &str) -> Result<TechnicalSeoData, AppError> {
        self.dataforseo.on_page_checks(domain).await
    }

    async fn backlinks(&self, domain: &str) -> Result<BacklinkData, AppError> {
        self.dataforseo.backlinks_summary(domain).await
    }

    async fn keywords(&self, domain: &str, targets: &[String]) -> Result<KeywordData, AppError> {
        self.dataforseo.ranked_keywords(domain, targets).await
    }

    async fn competitor(&self, domain: &str) -> Result<CompetitorData, AppError> {
        self.dataforseo.domain_overview(domain).await
    }

    async fn social(&self, company_name: &str, website: &str) -> Result<SocialData, AppError> {
        self.firecrawl.scrape_social(company_name, website).await
    }
}

/// Adapter serving the synthetic generator directly. Selected when no live
/// credentials are configured, and by tests.
pub struct SyntheticProvider {
    generator: SyntheticDataGenerator,
}

impl SyntheticProvider {
    pub fn new() -> Self {
        Self {
            generator: SyntheticDataGenerator::new(),
        }
    }
}

impl Default for SyntheticProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SeoDataProvider for SyntheticProvider {
    fn name(&self) -> &'static str {
        "synthetic"
    }

    async fn crawl(&self, domain: &str) -> Result<CrawlData, AppError> {
        Ok(self.generator.crawl(domain))
    }

    async fn performance(&self, domain: &str) -> Result<PerformanceData, AppError> {
        Ok(self.generator.performance(domain))
    }

    async fn technical_seo(&self, domain: &str) -> Result<TechnicalSeoData, AppError> {
        Ok(self.generator.technical_seo(domain))
    }

    async fn backlinks(&self, domain: &str) -> Result<BacklinkData, AppError> {
        Ok(self.generator.backlinks(domain))
    }

    async fn keywords(&self, domain: &str, targets: &[String]) -> Result<KeywordData, AppError> {
        Ok(self.generator.keywords(domain, targets))
    }

    async fn competitor(&self, domain: &str) -> Result<CompetitorData, AppError> {
        Ok(self.generator.competitor(domain))
    }

    async fn social(&self, company_name: &str, website: &str) -> Result<SocialData, AppError> {
        Ok(self.generator.social(company_name, website))
    }
}
