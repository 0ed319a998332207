//! Data Collector: one entry point per data domain.
//!
//! Every call attempts the configured provider first, bounded by a timeout
//! and a circuit breaker; on any provider error it logs the failure and
//! substitutes synthetic data matching the same schema. Provider errors are
//! never propagated; callers have no retry or circuit-breaker logic of
//! their own. The reason for a fallback is reported alongside the data so
//! the job processor can record it as a stage error.

use crate::circuit_breaker::{create_provider_circuit_breaker, ProviderCircuitBreaker};
use crate::errors::AppError;
use crate::models::{
    BacklinkData, CompetitorData, CrawlData, KeywordData, PerformanceData, SocialData,
    TechnicalSeoData,
};
use crate::provider::SeoDataProvider;
use crate::synthetic::SyntheticDataGenerator;
use failsafe::futures::CircuitBreaker;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Section data plus, when the provider failed, the reason the synthetic
/// fallback was used.
#[derive(Debug, Clone)]
pub struct Collected<T> {
    pub data: T,
    pub fallback_reason: Option<String>,
}

impl<T> Collected<T> {
    fn live(data: T) -> Self {
        Self {
            data,
            fallback_reason: None,
        }
    }

    fn fallback(data: T, reason: String) -> Self {
        Self {
            data,
            fallback_reason: Some(reason),
        }
    }
}

pub struct DataCollector {
    provider: Arc<dyn SeoDataProvider>,
    synthetic: SyntheticDataGenerator,
    breaker: ProviderCircuitBreaker,
    timeout: Duration,
}

impl DataCollector {
    pub fn new(provider: Arc<dyn SeoDataProvider>, timeout: Duration) -> Self {
        Self {
            provider,
            synthetic: SyntheticDataGenerator::new(),
            breaker: create_provider_circuit_breaker(),
            timeout,
        }
    }

    /// Run one provider call under the timeout and circuit breaker; on any
    /// failure return the synthetic substitute with the failure reason.
    async fn guarded<T, F>(
        &self,
        what: &str,
        call: F,
        fallback: impl FnOnce(&SyntheticDataGenerator) -> T,
    ) -> Collected<T>
    where
        F: Future<Output = Result<T, AppError>>,
    {
        let timeout = self.timeout;
        let bounded = async {
            tokio::time::timeout(timeout, call)
                .await
                .map_err(|_| AppError::Provider(format!("{} call timed out", what)))?
        };

        match self.breaker.call(bounded).await {
            Ok(data) => Collected::live(data),
            Err(failsafe::Error::Inner(e)) => {
                let reason = format!("{} provider failed: {}", what, e);
                tracing::warn!("{}; using synthetic fallback", reason);
                Collected::fallback(fallback(&self.synthetic), reason)
            }
            Err(failsafe::Error::Rejected) => {
                let reason = format!("{} provider circuit open", what);
                tracing::warn!("{}; using synthetic fallback", reason);
                Collected::fallback(fallback(&self.synthetic), reason)
            }
        }
    }

    pub async fn collect_crawl(&self, domain: &str) -> Collected<CrawlData> {
        self.guarded("crawl", self.provider.crawl(domain), |s| s.crawl(domain))
            .await
    }

    pub async fn collect_performance(&self, domain: &str) -> Collected<PerformanceData> {
        self.guarded("performance", self.provider.performance(domain), |s| {
            s.performance(domain)
        })
        .await
    }

    pub async fn collect_technical_seo(&self, domain: &str) -> Collected<TechnicalSeoData> {
        self.guarded("technical SEO", self.provider.technical_seo(domain), |s| {
            s.technical_seo(domain)
        })
        .await
    }

    pub async fn collect_backlinks(&self, domain: &str) -> Collected<BacklinkData> {
        self.guarded("backlinks", self.provider.backlinks(domain), |s| {
            s.backlinks(domain)
        })
        .await
    }

    pub async fn collect_keywords(
        &self,
        domain: &str,
        targets: &[String],
    ) -> Collected<KeywordData> {
        self.guarded("keywords", self.provider.keywords(domain, targets), |s| {
            s.keywords(domain, targets)
        })
        .await
    }

    pub async fn collect_competitors(&self, domain: &str) -> Collected<CompetitorData> {
        self.guarded("competitor", self.provider.competitor(domain), |s| {
            s.competitor(domain)
        })
        .await
    }

    pub async fn collect_social(&self, company_name: &str, website: &str) -> Collected<SocialData> {
        self.guarded(
            "social",
            self.provider.social(company_name, website),
            |s| s.social(company_name, website),
        )
        .await
    }

    /// The generator backing the fallback path; the processor uses it to
    /// pre-populate every result section before any stage runs.
    pub fn synthetic(&self) -> &SyntheticDataGenerator {
        &self.synthetic
    }
}
