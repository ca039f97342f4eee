//! Capabilities a connector declares at registration time.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Feature flags a connector advertises.
///
/// All gating in the middleware is a set-membership test against these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    BboxSearch,
    DateRange,
    CloudCover,
    Collections,
    Pagination,
    CogSupport,
    /// Searches require a successful `authenticate` first.
    Authentication,
    Commercial,
    Preview,
    Download,
    Streaming,
    TextSearch,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::BboxSearch => "bbox_search",
            Capability::DateRange => "date_range",
            Capability::CloudCover => "cloud_cover",
            Capability::Collections => "collections",
            Capability::Pagination => "pagination",
            Capability::CogSupport => "cog_support",
            Capability::Authentication => "authentication",
            Capability::Commercial => "commercial",
            Capability::Preview => "preview",
            Capability::Download => "download",
            Capability::Streaming => "streaming",
            Capability::TextSearch => "text_search",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered set of capabilities.
pub type CapabilitySet = BTreeSet<Capability>;
