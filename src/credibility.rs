//! # Creator credibility
//!
//! Heuristic trust score in `[0.0, 1.0]` assigned when a creator is first
//! seen and refreshed when their follower count changes.
//!
//! - Follower banding: large and medium audiences get fixed scores.
//! - Known-good sources (case/punctuation-insensitive, with aliases and a
//!   substring fallback) get their configured score.
//! - Otherwise the platform base score applies.
//!
//! The highest applicable score wins.

use serde::Deserialize;
use std::collections::HashMap;

use crate::model::Platform;

#[derive(Debug, Clone, Deserialize)]
pub struct FollowerBand {
    pub min_followers: i64,
    pub score: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CredibilityConfig {
    #[serde(default = "default_base")]
    pub default_score: f64,
    /// Per-platform base score, keyed by platform name.
    #[serde(default)]
    pub platform_base: HashMap<String, f64>,
    /// Bands checked highest first; a count must reach `min_followers`.
    #[serde(default)]
    pub follower_bands: Vec<FollowerBand>,
    /// Known-good sources → score.
    #[serde(default)]
    pub known_sources: HashMap<String, f64>,
    /// Alternative spellings → canonical known source.
    #[serde(default)]
    pub aliases: HashMap<String, String>,
}

fn default_base() -> f64 {
    0.5
}

impl Default for CredibilityConfig {
    fn default() -> Self {
        Self::default_seed()
    }
}

impl CredibilityConfig {
    pub fn default_seed() -> Self {
        let mut platform_base = HashMap::new();
        platform_base.insert(Platform::Reddit.as_str().to_string(), 0.6);

        let mut known_sources = HashMap::new();
        for (k, v) in [("hyrox", 0.7), ("barbend", 0.7), ("boxrox", 0.7)] {
            known_sources.insert(k.to_string(), v);
        }

        let mut aliases = HashMap::new();
        for (a, c) in [("hyrox official", "hyrox"), ("bar bend", "barbend"), ("box rox", "boxrox")] {
            aliases.insert(a.to_string(), c.to_string());
        }

        Self {
            default_score: 0.5,
            platform_base,
            follower_bands: vec![
                FollowerBand {
                    min_followers: 100_000,
                    score: 0.9,
                },
                FollowerBand {
                    min_followers: 10_000,
                    score: 0.7,
                },
            ],
            known_sources,
            aliases,
        }
    }

    pub fn score_for(&self, name: &str, platform: Platform, followers: Option<i64>) -> f64 {
        let base = self
            .platform_base
            .get(platform.as_str())
            .copied()
            .unwrap_or(self.default_score);
        let banded = followers.and_then(|n| self.band_for(n));
        let known = self.known_score(name);
        clamp01(
            [Some(base), banded, known]
                .into_iter()
                .flatten()
                .fold(0.0, f64::max),
        )
    }

    fn band_for(&self, followers: i64) -> Option<f64> {
        let mut bands: Vec<&FollowerBand> = self.follower_bands.iter().collect();
        bands.sort_by(|a, b| b.min_followers.cmp(&a.min_followers));
        bands
            .into_iter()
            .find(|b| followers >= b.min_followers)
            .map(|b| b.score)
    }

    /// Alias → exact → substring.
    fn known_score(&self, name: &str) -> Option<f64> {
        let s = normalize(name);
        if s.is_empty() {
            return None;
        }
        if let Some(canon) = self.aliases.get(&s) {
            if let Some(&w) = self.known_sources.get(&normalize(canon)) {
                return Some(w);
            }
        }
        if let Some(&w) = self.known_sources.get(&s) {
            return Some(w);
        }
        let squashed = s.replace(' ', "");
        self.known_sources
            .iter()
            .filter(|(k, _)| s.contains(k.as_str()) || squashed.contains(&k.replace(' ', "")))
            .map(|(_, &w)| w)
            .reduce(f64::max)
    }
}

/// Lowercase, turn punctuation and dashes into spaces, collapse spaces.
fn normalize(s: &str) -> String {
    let mut out = s.trim().to_lowercase();
    for ch in ['—', '–', '-', '_', '/', '\\'] {
        out = out.replace(ch, " ");
    }
    out = out.replace(['\n', '\r', '\t', '.', ',', '’', '\'', '!', '?', ':', '|'], " ");
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn clamp01(x: f64) -> f64 {
    x.clamp(0.0, 1.0)
}
