//! Asset priority scoring.
//!
//! Providers name their visualizable products differently (GEC, GEO,
//! "visual", plain COG media types). Scores are assigned by the first rule
//! that matches; preview images always score lowest.

use serde::{Deserialize, Serialize};

use crate::item::{AssetRef, PREVIEW_KEYS};

pub const SCORE_VISUAL: u32 = 30;
pub const SCORE_DATA: u32 = 20;
pub const SCORE_OTHER: u32 = 10;
pub const SCORE_PREVIEW: u32 = 0;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetMatch {
    /// Case-insensitive substring of the asset key.
    KeyContains(String),
    /// Substring of the media type (`image/tiff` also matches the COG profile).
    MediaTypeContains(String),
    Role(String),
}

impl AssetMatch {
    fn matches(&self, key: &str, asset: &AssetRef) -> bool {
        match self {
            AssetMatch::KeyContains(needle) => {
                key.to_ascii_uppercase().contains(&needle.to_ascii_uppercase())
            }
            AssetMatch::MediaTypeContains(needle) => asset
                .media_type
                .as_deref()
                .map(|t| t.to_ascii_lowercase().contains(&needle.to_ascii_lowercase()))
                .unwrap_or(false),
            AssetMatch::Role(role) => asset.has_role(role),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRule {
    #[serde(rename = "match")]
    pub matcher: AssetMatch,
    pub score: u32,
}

impl AssetRule {
    pub fn new(matcher: AssetMatch, score: u32) -> Self {
        Self { matcher, score }
    }
}

/// Ordered scoring rules; first match wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetPriorityRules {
    pub rules: Vec<AssetRule>,
    #[serde(default = "default_score")]
    pub default_score: u32,
}

fn default_score() -> u32 {
    SCORE_OTHER
}

impl Default for AssetPriorityRules {
    /// Generic STAC rules: COGs and `visual` assets first, `data` role next.
    fn default() -> Self {
        Self {
            rules: vec![
                AssetRule::new(AssetMatch::KeyContains("visual".into()), SCORE_VISUAL),
                AssetRule::new(AssetMatch::MediaTypeContains("image/tiff".into()), SCORE_VISUAL),
                AssetRule::new(AssetMatch::Role("visual".into()), SCORE_VISUAL),
                AssetRule::new(AssetMatch::Role("data".into()), SCORE_DATA),
            ],
            default_score: SCORE_OTHER,
        }
    }
}

impl AssetPriorityRules {
    /// Geocoded ellipsoid-corrected GeoTIFFs first, complex SAR formats next.
    pub fn geocoded_first() -> Self {
        Self {
            rules: vec![
                AssetRule::new(AssetMatch::KeyContains("GEC".into()), SCORE_VISUAL),
                AssetRule::new(AssetMatch::MediaTypeContains("image/tiff".into()), SCORE_VISUAL),
                AssetRule::new(AssetMatch::KeyContains("SICD".into()), SCORE_DATA),
                AssetRule::new(AssetMatch::KeyContains("SIDD".into()), SCORE_DATA),
                AssetRule::new(AssetMatch::KeyContains("CPHD".into()), SCORE_DATA),
            ],
            default_score: SCORE_OTHER,
        }
    }

    /// Terrain-corrected GEO products first, then GEC.
    pub fn terrain_corrected_first() -> Self {
        Self {
            rules: vec![
                AssetRule::new(AssetMatch::KeyContains("GEO".into()), SCORE_VISUAL),
                AssetRule::new(AssetMatch::MediaTypeContains("image/tiff".into()), SCORE_VISUAL),
                AssetRule::new(AssetMatch::KeyContains("GEC".into()), SCORE_DATA),
            ],
            default_score: SCORE_OTHER,
        }
    }

    pub fn score(&self, key: &str, asset: &AssetRef) -> u32 {
        if is_preview(key, asset) {
            return SCORE_PREVIEW;
        }
        self.rules
            .iter()
            .find(|rule| rule.matcher.matches(key, asset))
            .map(|rule| rule.score)
            .unwrap_or(self.default_score)
    }
}

fn is_preview(key: &str, asset: &AssetRef) -> bool {
    PREVIEW_KEYS.iter().any(|k| key.eq_ignore_ascii_case(k))
        || asset.has_role("thumbnail")
        || asset.has_role("overview")
}
