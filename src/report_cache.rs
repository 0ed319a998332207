use chrono::{DateTime, Utc};
use hex;
use sha2::{Digest, Sha256};

/// Checksummed wrapper for cached rendered reports.
///
/// Rendered HTML sits in the report cache between audits; the checksum is
/// validated on every read so a corrupted or tampered entry is discarded and
/// the report re-rendered from the stored audit result instead.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CachedReport {
    /// The rendered HTML document.
    pub html: String,
    /// SHA-256 checksum of the HTML (hex encoded).
    pub checksum: String,
    /// When the report was rendered.
    pub rendered_at: DateTime<Utc>,
}

impl CachedReport {
    /// Wrap freshly rendered HTML with its checksum.
    pub fn new(html: String) -> Self {
        let checksum = Self::compute_checksum(&html);
        Self {
            html,
            checksum,
            rendered_at: Utc::now(),
        }
    }

    fn compute_checksum(html: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(html.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// True when the checksum still matches the HTML.
    pub fn is_valid(&self) -> bool {
        Self::compute_checksum(&self.html) == self.checksum
    }

    /// Serialize for storage in the cache.
    pub fn serialize(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Deserialize a cache entry and return the HTML only if the checksum
    /// holds; a poisoned entry yields `None` so the caller re-renders.
    pub fn deserialize_and_validate(serialized: &str) -> Option<String> {
        let entry: CachedReport = serde_json::from_str(serialized).ok()?;

        if entry.is_valid() {
            Some(entry.html)
        } else {
            tracing::warn!(
                "Report cache validation failed: checksum mismatch (length {})",
                entry.html.len()
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_entries_validate() {
        let html = "<html><body>report</body></html>".to_string();
        let entry = CachedReport::new(html.clone());

        assert!(entry.is_valid());
        assert_eq!(entry.html, html);
    }

    #[test]
    fn round_trips_through_serialization() {
        let entry = CachedReport::new("<p>audit</p>".to_string());

        let serialized = entry.serialize();
        let html = CachedReport::deserialize_and_validate(&serialized);

        assert_eq!(html, Some("<p>audit</p>".to_string()));
    }

    #[test]
    fn tampered_html_rejected() {
        let mut entry = CachedReport::new("<p>original</p>".to_string());
        entry.html = "<p>tampered</p>".to_string();

        assert!(!entry.is_valid());
    }

    #[test]
    fn tampered_serialized_entry_returns_none() {
        let entry = CachedReport::new("<p>original</p>".to_string());
        let tampered = entry.serialize().replace("original", "hacked");

        assert_eq!(CachedReport::deserialize_and_validate(&tampered), None);
    }

    #[test]
    fn checksums_are_stable() {
        let a = CachedReport::new("same html".to_string());
        let b = CachedReport::new("same html".to_string());

        assert_eq!(a.checksum, b.checksum);
    }
}
