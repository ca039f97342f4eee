//! Per-connector outcome of one aggregated search.

use std::fmt;

use serde::Serialize;

use altair_common::CatalogError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceSuccess {
    pub connector_id: String,
    pub display_name: String,
    pub count: usize,
}

/// A connector whose search failed or timed out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceFailure {
    pub connector_id: String,
    pub display_name: String,
    /// Error class, e.g. `network`, `timeout`, `auth_required`
    pub kind: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedSource {
    pub connector_id: String,
    pub display_name: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusSummary {
    pub succeeded: Vec<SourceSuccess>,
    pub failed: Vec<SourceFailure>,
    pub skipped: Vec<SkippedSource>,
}

impl StatusSummary {
    pub fn record_success(&mut self, connector_id: &str, display_name: &str, count: usize) {
        self.succeeded.push(SourceSuccess {
            connector_id: connector_id.to_string(),
            display_name: display_name.to_string(),
            count,
        });
    }

    pub fn record_failure(&mut self, connector_id: &str, display_name: &str, error: &CatalogError) {
        self.failed.push(SourceFailure {
            connector_id: connector_id.to_string(),
            display_name: display_name.to_string(),
            kind: error.kind().to_string(),
            reason: error.to_string(),
        });
    }

    pub fn record_skip(&mut self, connector_id: &str, display_name: &str, reason: &str) {
        self.skipped.push(SkippedSource {
            connector_id: connector_id.to_string(),
            display_name: display_name.to_string(),
            reason: reason.to_string(),
        });
    }

    pub fn total_items(&self) -> usize {
        self.succeeded.iter().map(|s| s.count).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.succeeded.is_empty() && self.failed.is_empty() && self.skipped.is_empty()
    }

    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }

    /// Order every section by `rank(connector_id)`.
    pub fn sort_by_key<F>(&mut self, rank: F)
    where
        F: Fn(&str) -> usize,
    {
        self.succeeded.sort_by_key(|s| rank(&s.connector_id));
        self.failed.sort_by_key(|s| rank(&s.connector_id));
        self.skipped.sort_by_key(|s| rank(&s.connector_id));
    }
}

impl fmt::Display for StatusSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("No connectors searched");
        }

        let mut sections = Vec::new();
        if !self.succeeded.is_empty() {
            let parts: Vec<String> = self
                .succeeded
                .iter()
                .map(|s| format!("{} ({})", s.display_name, s.count))
                .collect();
            sections.push(format!("Searched: {}", parts.join(", ")));
        }
        if !self.failed.is_empty() {
            let parts: Vec<String> = self
                .failed
                .iter()
                .map(|s| format!("{} ({})", s.display_name, s.reason))
                .collect();
            sections.push(format!("Failed: {}", parts.join(", ")));
        }
        if !self.skipped.is_empty() {
            let parts: Vec<String> = self
                .skipped
                .iter()
                .map(|s| format!("{} ({})", s.display_name, s.reason))
                .collect();
            sections.push(format!("Skipped: {}", parts.join(", ")));
        }
        f.write_str(&sections.join(" | "))
    }
}
