use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============ Customer Lifecycle ============

/// Lifecycle status of a customer record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CustomerStatus {
    /// Created, audit not yet started.
    Queued,
    /// An audit job is running.
    Processing,
    /// Latest audit finished and a result is stored.
    Completed,
    /// The audit aborted (missing record, cancellation).
    Failed,
    /// The stored record is malformed.
    Error,
}

impl CustomerStatus {
    /// Stable textual form used in storage and API payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            CustomerStatus::Queued => "queued",
            CustomerStatus::Processing => "processing",
            CustomerStatus::Completed => "completed",
            CustomerStatus::Failed => "failed",
            CustomerStatus::Error => "error",
        }
    }
}

impl fmt::Display for CustomerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CustomerStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(CustomerStatus::Queued),
            "processing" => Ok(CustomerStatus::Processing),
            "completed" => Ok(CustomerStatus::Completed),
            "failed" => Ok(CustomerStatus::Failed),
            "error" => Ok(CustomerStatus::Error),
            other => Err(format!("unknown customer status: {}", other)),
        }
    }
}

/// A customer being audited, the central durable record.
///
/// Creation is idempotent keyed on case-insensitive company name OR email;
/// status/progress are mutated only by the job processor and the result
/// completion path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    /// Unique identifier.
    pub id: Uuid,
    /// URL-safe slug derived from the company name.
    pub slug: String,
    /// Company name.
    pub company_name: String,
    /// Contact person name.
    pub contact_name: Option<String>,
    /// Contact email.
    pub email: String,
    /// Contact phone (free text).
    pub phone: Option<String>,
    /// Primary website URL.
    pub website: String,
    /// Industry sector.
    pub industry: Option<String>,
    /// Geographic location.
    pub location: Option<String>,
    /// Competitor website URLs.
    pub competitors: Vec<String>,
    /// Keywords the customer wants tracked.
    pub target_keywords: Vec<String>,
    /// Lifecycle status.
    pub status: CustomerStatus,
    /// Progress percentage of the current/last audit (0-100).
    pub progress: u8,
    /// Human-readable status message.
    pub status_message: Option<String>,
    /// Timestamp of creation.
    pub created_at: DateTime<Utc>,
    /// Timestamp of last update.
    pub updated_at: DateTime<Utc>,
    /// When the most recent audit started.
    pub audit_started_at: Option<DateTime<Utc>>,
    /// When the most recent audit completed.
    pub audit_completed_at: Option<DateTime<Utc>>,
    /// The most recent completed audit result, if any.
    pub latest_result_id: Option<Uuid>,
}

// ============ API Request/Response Models ============

/// Inbound intake request creating (or returning) a customer and queueing
/// an audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntakeRequest {
    /// Company name (required, non-empty).
    pub company_name: String,
    /// Contact person name.
    #[serde(default)]
    pub contact_name: Option<String>,
    /// Contact email (required).
    pub email: String,
    /// Contact phone.
    #[serde(default)]
    pub phone: Option<String>,
    /// Primary website URL (required, parseable).
    pub website: String,
    /// Industry sector.
    #[serde(default)]
    pub industry: Option<String>,
    /// Geographic location.
    #[serde(default)]
    pub location: Option<String>,
    /// Competitor website URLs (each must parse).
    #[serde(default)]
    pub competitors: Vec<String>,
    /// Keywords to track.
    #[serde(default)]
    pub target_keywords: Vec<String>,
}

/// Response payload for an intake request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntakeResponse {
    /// Customer identifier (existing or newly created).
    pub customer_id: Uuid,
    /// Current lifecycle status.
    pub status: CustomerStatus,
    /// Where the rendered report will be available once the audit completes.
    pub report_url_when_ready: String,
}

/// Query parameters for customer listing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CustomerFilter {
    /// Filter by lifecycle status.
    pub status: Option<CustomerStatus>,
    /// Free-text search over name/email/website/industry/location.
    pub q: Option<String>,
    /// Only customers created at or after this instant.
    pub created_from: Option<DateTime<Utc>>,
    /// Only customers created at or before this instant.
    pub created_to: Option<DateTime<Utc>>,
}

// ============ Audit Pipeline ============

/// One ordered step of an audit job. Each stage fills one section of the
/// audit result; weights sum to 100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditStage {
    Initializing,
    Crawling,
    Performance,
    Seo,
    Competitors,
    Keywords,
    Social,
    Report,
}

impl AuditStage {
    /// All stages in execution order.
    pub const ALL: [AuditStage; 8] = [
        AuditStage::Initializing,
        AuditStage::Crawling,
        AuditStage::Performance,
        AuditStage::Seo,
        AuditStage::Competitors,
        AuditStage::Keywords,
        AuditStage::Social,
        AuditStage::Report,
    ];

    /// Contribution of this stage to cumulative progress.
    pub fn weight(&self) -> u8 {
        match self {
            AuditStage::Initializing => 5,
            AuditStage::Crawling => 10,
            AuditStage::Performance => 20,
            AuditStage::Seo => 20,
            AuditStage::Competitors => 20,
            AuditStage::Keywords => 15,
            AuditStage::Social => 5,
            AuditStage::Report => 5,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AuditStage::Initializing => "initializing",
            AuditStage::Crawling => "crawling",
            AuditStage::Performance => "performance",
            AuditStage::Seo => "seo",
            AuditStage::Competitors => "competitors",
            AuditStage::Keywords => "keywords",
            AuditStage::Social => "social",
            AuditStage::Report => "report",
        }
    }
}

impl fmt::Display for AuditStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cumulative progress after the given stages have been attempted.
pub fn cumulative_progress(attempted: &[AuditStage]) -> u8 {
    attempted.iter().map(|s| s.weight()).sum()
}

/// Status of an audit job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    /// Reserved for the fatal initializing case (customer record missing).
    Failed,
    /// Cooperative cancellation took effect at a stage boundary.
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }
}

/// A non-fatal stage failure recorded on the job; the affected section keeps
/// its fallback value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageFailure {
    /// The stage that failed.
    pub stage: AuditStage,
    /// What went wrong.
    pub message: String,
    /// When it was recorded.
    pub at: DateTime<Utc>,
}

/// One audit job moving a customer through the stage pipeline.
///
/// At most one active (queued or processing) job exists per customer.
#[derive(Debug, Clone, Serialize)]
pub struct AuditJob {
    /// Unique identifier.
    pub id: Uuid,
    /// Owning customer.
    pub customer_id: Uuid,
    /// Job status.
    pub status: JobStatus,
    /// The stage currently executing, if processing.
    pub current_stage: Option<AuditStage>,
    /// Stages attempted so far, in order.
    pub stages_attempted: Vec<AuditStage>,
    /// Cumulative progress (0-100), non-decreasing.
    pub progress: u8,
    /// Non-fatal stage failures.
    pub errors: Vec<StageFailure>,
    /// Cooperative cancellation flag, honoured at stage boundaries.
    pub cancel_requested: bool,
    /// When the job was enqueued.
    pub created_at: DateTime<Utc>,
    /// When a worker claimed the job.
    pub started_at: Option<DateTime<Utc>>,
    /// When the job reached a terminal status.
    pub finished_at: Option<DateTime<Utc>>,
}

// ============ Audit Result Sections ============

/// Whether a section came from a live provider or the synthetic fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    Live,
    Synthetic,
}

/// Pages sampled during the crawl stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlData {
    pub source: DataSource,
    /// Representative page URLs; at minimum the root URL.
    pub pages: Vec<String>,
    /// Total pages the provider discovered.
    pub pages_discovered: u32,
}

/// Core web vitals, milliseconds unless noted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreWebVitals {
    /// Largest contentful paint.
    pub lcp_ms: f64,
    /// Interaction to next paint.
    pub inp_ms: f64,
    /// Cumulative layout shift (unitless).
    pub cls: f64,
    /// Time to first byte.
    pub ttfb_ms: f64,
}

/// Performance section: lighthouse-style scores plus vitals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceData {
    pub source: DataSource,
    /// Desktop score, 0-100.
    pub desktop_score: u8,
    /// Mobile score, 0-100.
    pub mobile_score: u8,
    pub core_web_vitals: CoreWebVitals,
}

/// Technical SEO checks for the audited site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TechnicalSeoData {
    pub source: DataSource,
    pub https: bool,
    pub mobile_responsive: bool,
    pub sitemap: bool,
    pub robots_txt: bool,
    pub canonical: bool,
    pub meta_description: bool,
    pub schema_markup: bool,
    pub heading_structure: bool,
    /// Fraction of images carrying alt text, 0.0-1.0.
    pub image_alt_coverage: f64,
}

/// Backlink profile summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacklinkData {
    pub source: DataSource,
    pub total_backlinks: u64,
    pub referring_domains: u64,
    /// Authority estimate, 0-100.
    pub domain_authority: u8,
}

/// A single tracked keyword with its current ranking data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackedKeyword {
    pub keyword: String,
    /// Current SERP position; None when unranked.
    pub position: Option<u32>,
    pub search_volume: u64,
    /// Difficulty estimate, 0-100.
    pub difficulty: u8,
}

/// Distribution of tracked keywords across ranking buckets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingDistribution {
    pub top_3: u32,
    pub top_10: u32,
    pub top_50: u32,
    pub unranked: u32,
}

impl RankingDistribution {
    /// Bucket counts for a keyword set. Positions beyond 50 count as
    /// unranked; bucket totals always sum to the keyword count.
    pub fn from_keywords(keywords: &[TrackedKeyword]) -> Self {
        let mut dist = RankingDistribution {
            top_3: 0,
            top_10: 0,
            top_50: 0,
            unranked: 0,
        };

        for kw in keywords {
            match kw.position {
                Some(p) if p <= 3 => dist.top_3 += 1,
                Some(p) if p <= 10 => dist.top_10 += 1,
                Some(p) if p <= 50 => dist.top_50 += 1,
                _ => dist.unranked += 1,
            }
        }

        dist
    }

    pub fn total(&self) -> u32 {
        self.top_3 + self.top_10 + self.top_50 + self.unranked
    }
}

/// Keyword section: per-keyword data plus distribution buckets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordData {
    pub source: DataSource,
    pub tracked_keywords: Vec<TrackedKeyword>,
    pub ranking_distribution: RankingDistribution,
}

/// Metrics for one competitor domain, mirroring a subset of the customer's
/// own metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompetitorData {
    pub source: DataSource,
    pub domain: String,
    pub domain_authority: u8,
    pub total_backlinks: u64,
    pub referring_domains: u64,
    pub estimated_traffic: u64,
    pub common_keywords: u32,
}

/// Presence and reach on a single social platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocialPlatform {
    pub platform: String,
    pub present: bool,
    pub followers: u64,
    pub profile_url: Option<String>,
}

/// Social media section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocialData {
    pub source: DataSource,
    pub platforms: Vec<SocialPlatform>,
}

/// Accumulated, normalized output of all stages for one audit job.
///
/// Every section is always present: a failed stage leaves its section at the
/// fallback value, so report rendering never needs null checks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditResult {
    pub customer_id: Uuid,
    pub job_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub crawl: CrawlData,
    pub performance: PerformanceData,
    pub technical_seo: TechnicalSeoData,
    pub backlinks: BacklinkData,
    pub keywords: KeywordData,
    /// One entry per configured competitor URL.
    pub competitors: Vec<CompetitorData>,
    pub social_media: SocialData,
    /// Stage failures carried over from the job for operator visibility.
    pub stage_failures: Vec<StageFailure>,
}
