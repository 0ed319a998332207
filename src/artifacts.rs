//! Report artifact storage.
//!
//! The pipeline only needs a `store(artifact, hint) -> url` capability; the
//! filesystem implementation is the reference target, tests use the
//! in-memory one.

use crate::errors::AppError;
use crate::report::ReportArtifact;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::RwLock;

#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Persist a rendered artifact and return a locator for it.
    async fn store(
        &self,
        artifact: &ReportArtifact,
        location_hint: &str,
    ) -> Result<String, AppError>;
}

/// Writes artifacts under `<root>/<hint>/`.
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn store(
        &self,
        artifact: &ReportArtifact,
        location_hint: &str,
    ) -> Result<String, AppError> {
        let dir = self.root.join(location_hint);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| AppError::InternalError(format!("Failed to create report dir: {}", e)))?;

        let files = [
            ("report.html", &artifact.html),
            ("technical-issues.csv", &artifact.technical_issues_csv),
            (
                "keyword-opportunities.csv",
                &artifact.keyword_opportunities_csv,
            ),
            (
                "competitor-comparison.csv",
                &artifact.competitor_comparison_csv,
            ),
        ];

        for (name, content) in files {
            tokio::fs::write(dir.join(name), content)
                .await
                .map_err(|e| {
                    AppError::InternalError(format!("Failed to write {}: {}", name, e))
                })?;
        }

        let url = dir.join("report.html").display().to_string();
        tracing::info!("Stored report artifact at {}", url);
        Ok(url)
    }
}

/// Keeps artifacts in memory, keyed by location hint.
#[derive(Default)]
pub struct MemoryArtifactStore {
    artifacts: RwLock<HashMap<String, ReportArtifact>>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, location_hint: &str) -> Option<ReportArtifact> {
        self.artifacts.read().await.get(location_hint).cloned()
    }
}

#[async_trait]
impl ArtifactStore for MemoryArtifactStore {
    async fn store(
        &self,
        artifact: &ReportArtifact,
        location_hint: &str,
    ) -> Result<String, AppError> {
        self.artifacts
            .write()
            .await
            .insert(location_hint.to_string(), artifact.clone());
        Ok(format!("memory://{}/report.html", location_hint))
    }
}
