// src/relevance.rs
//! Relevance gate: tiered keyword matching with priority and source-name bypass.
//!
//! - A primary keyword anywhere in `title + description` is enough.
//! - A secondary keyword counts only together with a context word.
//! - Candidates from active priority sources, or whose source name contains the
//!   topic keyword, are accepted without looking at the text.
//!
//! Matching is case-insensitive substring matching, so "hyrox" also hits
//! "#hyroxtraining".

use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::thread;
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};

use crate::model::ContentCandidate;

// --- env defaults & names ---
pub const DEFAULT_RELEVANCE_CONFIG_PATH: &str = "config/relevance.toml";
pub const ENV_RELEVANCE_CONFIG_PATH: &str = "RELEVANCE_CONFIG_PATH";

/* ----------------------------
Config schema (from TOML)
---------------------------- */

#[derive(Debug, Clone, Deserialize)]
pub struct RelevanceRoot {
    pub relevance: RelevanceSection,
    pub keywords: KeywordSets,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RelevanceSection {
    /// Primary topic keyword; a source name containing it bypasses classification.
    pub topic: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct KeywordSets {
    #[serde(default)]
    pub primary: Vec<String>,
    #[serde(default)]
    pub secondary: Vec<String>,
    #[serde(default)]
    pub context: Vec<String>,
}

/// Why a candidate was accepted or dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reason {
    PrioritySource,
    SourceName,
    Primary,
    SecondaryWithContext,
    SecondaryWithoutContext,
    NoMatch,
}

impl Reason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Reason::PrioritySource => "priority_source",
            Reason::SourceName => "source_name",
            Reason::Primary => "primary",
            Reason::SecondaryWithContext => "secondary_with_context",
            Reason::SecondaryWithoutContext => "secondary_without_context",
            Reason::NoMatch => "no_match",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub relevant: bool,
    pub reason: Reason,
    pub matched: Vec<String>,
}

impl Verdict {
    fn accept(reason: Reason, matched: Vec<String>) -> Self {
        Self {
            relevant: true,
            reason,
            matched,
        }
    }

    fn reject(reason: Reason, matched: Vec<String>) -> Self {
        Self {
            relevant: false,
            reason,
            matched,
        }
    }
}

/// Compiled keyword sets. All keywords are stored lowercased and trimmed.
#[derive(Debug, Clone)]
pub struct RelevanceClassifier {
    topic: String,
    primary: Vec<String>,
    secondary: Vec<String>,
    context: Vec<String>,
}

impl RelevanceClassifier {
    /// Load from `RELEVANCE_CONFIG_PATH` or `config/relevance.toml`.
    pub fn from_toml() -> anyhow::Result<Self> {
        let path = std::env::var(ENV_RELEVANCE_CONFIG_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_RELEVANCE_CONFIG_PATH));
        let content = fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("reading {}: {e}", path.display()))?;
        let c = Self::from_toml_str(&content)?;
        info!(
            target: "relevance",
            path = %path.display(),
            primary = c.primary.len(),
            secondary = c.secondary.len(),
            context = c.context.len(),
            "relevance keywords loaded"
        );
        Ok(c)
    }

    pub fn from_toml_str(toml_str: &str) -> anyhow::Result<Self> {
        let root: RelevanceRoot =
            toml::from_str(toml_str).map_err(|e| anyhow::anyhow!("parsing relevance toml: {e}"))?;
        let c = Self::from_sets(
            &root.relevance.topic,
            &root.keywords.primary,
            &root.keywords.secondary,
            &root.keywords.context,
        );
        if c.topic.is_empty() {
            anyhow::bail!("relevance.topic must not be empty");
        }
        if c.primary.is_empty() {
            anyhow::bail!("keywords.primary must contain at least one keyword");
        }
        Ok(c)
    }

    pub fn from_sets<S: AsRef<str>>(topic: &str, primary: &[S], secondary: &[S], context: &[S]) -> Self {
        Self {
            topic: topic.trim().to_lowercase(),
            primary: clean_set(primary),
            secondary: clean_set(secondary),
            context: clean_set(context),
        }
    }

    /// The built-in keyword sets for the hybrid fitness racing niche.
    pub fn default_seed() -> Self {
        Self::from_sets(
            "hyrox",
            &[
                "hyrox",
                "hybrid fitness race",
                "hunter mcintyre",
                "lauren weeks",
                "roxzone",
                "deka fit",
                "deka mile",
            ],
            &["hybrid athlete", "functional fitness race"],
            &["race", "competition", "training", "workout", "fitness"],
        )
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Text-only decision over `title + " " + description`.
    pub fn classify(&self, text: &str) -> Verdict {
        let text = text.to_lowercase();

        let primary = hits(&self.primary, &text);
        if !primary.is_empty() {
            return Verdict::accept(Reason::Primary, primary);
        }

        let secondary = hits(&self.secondary, &text);
        if secondary.is_empty() {
            return Verdict::reject(Reason::NoMatch, Vec::new());
        }

        let context = hits(&self.context, &text);
        if context.is_empty() {
            return Verdict::reject(Reason::SecondaryWithoutContext, secondary);
        }
        let mut matched = secondary;
        matched.extend(context);
        Verdict::accept(Reason::SecondaryWithContext, matched)
    }

    pub fn is_relevant(&self, text: &str) -> bool {
        self.classify(text).relevant
    }

    /// Full gate for a candidate: priority override, source-name bypass, then text.
    pub fn decide(&self, candidate: &ContentCandidate, priority_names: &HashSet<String>) -> Verdict {
        let source = candidate.source_name.trim().to_lowercase();
        let verdict = if candidate.is_priority || priority_names.contains(&source) {
            Verdict::accept(Reason::PrioritySource, Vec::new())
        } else if !self.topic.is_empty() && source.contains(&self.topic) {
            Verdict::accept(Reason::SourceName, vec![self.topic.clone()])
        } else {
            self.classify(&candidate.relevance_text())
        };
        debug!(
            target: "relevance",
            url = %candidate.canonical_url,
            relevant = verdict.relevant,
            reason = verdict.reason.as_str(),
            matched = ?verdict.matched,
        );
        verdict
    }
}

fn clean_set<S: AsRef<str>>(items: &[S]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(items.len());
    for it in items {
        let k = it.as_ref().trim().to_lowercase();
        if !k.is_empty() && !out.contains(&k) {
            out.push(k);
        }
    }
    out
}

fn hits(keywords: &[String], lowered: &str) -> Vec<String> {
    keywords
        .iter()
        .filter(|k| lowered.contains(k.as_str()))
        .cloned()
        .collect()
}

/// Lowercased name set used for the priority-by-name override.
pub fn priority_name_set<'a, I>(names: I) -> HashSet<String>
where
    I: IntoIterator<Item = &'a str>,
{
    names
        .into_iter()
        .map(|n| n.trim().to_lowercase())
        .filter(|n| !n.is_empty())
        .collect()
}

/* ----------------------------
Thread-safe handle + hot reload
---------------------------- */

/// A threadsafe handle that can hot-reload the underlying classifier in dev/local.
/// - Enable by setting RELEVANCE_HOT_RELOAD=1
/// - Dev-gated: active only if cfg!(debug_assertions) OR SHUTTLE_ENV is "local"/"development".
#[derive(Clone)]
pub struct RelevanceHandle {
    inner: Arc<RwLock<RelevanceClassifier>>,
}

impl RelevanceHandle {
    pub fn new(classifier: RelevanceClassifier) -> Self {
        Self {
            inner: Arc::new(RwLock::new(classifier)),
        }
    }

    /// Snapshot of the current classifier, so a run sees one consistent keyword set.
    pub fn snapshot(&self) -> RelevanceClassifier {
        match self.inner.read() {
            Ok(c) => c.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn replace(&self, classifier: RelevanceClassifier) {
        match self.inner.write() {
            Ok(mut guard) => *guard = classifier,
            Err(poisoned) => *poisoned.into_inner() = classifier,
        }
    }
}

/// Returns true if we should enable hot reload (dev/local only).
fn hot_reload_enabled() -> bool {
    let want = std::env::var("RELEVANCE_HOT_RELOAD")
        .ok()
        .map(|v| v == "1")
        .unwrap_or(false);
    if !want {
        return false;
    }
    if cfg!(debug_assertions) {
        return true;
    }
    matches!(
        std::env::var("SHUTTLE_ENV")
            .unwrap_or_default()
            .to_ascii_lowercase()
            .as_str(),
        "local" | "development" | "dev"
    )
}

/// Poll state for the keyword file: last mtime seen and whether the file is
/// currently missing.
#[derive(Debug, Default)]
struct MtimeWatch {
    last: Option<SystemTime>,
    missing: bool,
}

impl MtimeWatch {
    /// `(reappeared, changed)` for a readable file. The first sighting is
    /// never a change.
    fn seen(&mut self, mtime: SystemTime) -> (bool, bool) {
        let reappeared = std::mem::take(&mut self.missing);
        let changed = matches!(self.last, Some(prev) if mtime > prev);
        self.last = Some(self.last.map_or(mtime, |prev| prev.max(mtime)));
        (reappeared, changed)
    }

    /// `true` only on the first failed poll of a disappearance.
    fn lost(&mut self) -> bool {
        !std::mem::replace(&mut self.missing, true)
    }
}

/// Start a simple polling watcher on `path` to hot-reload into `handle`.
/// Polls mtime every 2s.
pub fn start_hot_reload_thread(handle: RelevanceHandle, path: PathBuf) {
    if !hot_reload_enabled() {
        return;
    }

    thread::spawn(move || {
        let poll = Duration::from_secs(2);
        let mut watch = MtimeWatch::default();

        loop {
            match fs::metadata(&path).and_then(|m| m.modified()) {
                Ok(mtime) => {
                    let (reappeared, changed) = watch.seen(mtime);
                    if reappeared {
                        info!(target: "relevance", path = %path.display(), "relevance config readable again");
                    }
                    if changed {
                        match fs::read_to_string(&path)
                            .map_err(anyhow::Error::from)
                            .and_then(|s| RelevanceClassifier::from_toml_str(&s))
                        {
                            Ok(next) => {
                                handle.replace(next);
                                info!(target: "relevance", path = %path.display(), "relevance keywords reloaded");
                            }
                            Err(e) => warn!(target: "relevance", error = %e, "relevance reload failed, keeping previous keywords"),
                        }
                    }
                }
                Err(e) => {
                    if watch.lost() {
                        warn!(target: "relevance", error = %e, path = %path.display(), "relevance config not readable");
                    }
                }
            }
            thread::sleep(poll);
        }
    });
}
