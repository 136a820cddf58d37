// src/ingest/types.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::ingest::http::FetchError;
use crate::model::{Category, ContentCandidate, Platform};

/// How an adapter should interpret `SourceTarget::locator`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    /// RSS/Atom feed URL.
    Feed,
    /// Free-text search query.
    Query,
    /// Platform channel/account id (YouTube channel id).
    Channel,
    /// Subreddit listing.
    Community,
    /// Instagram hashtag.
    Hashtag,
}

/// One query, feed, channel, subreddit or hashtag an adapter is asked to fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceTarget {
    pub name: String,
    pub locator: String,
    pub kind: TargetKind,
    pub is_priority: bool,
    pub category: Option<Category>,
    pub limit: usize,
    /// Restricts a query to one community (subreddit); `None` searches everywhere.
    pub scope: Option<String>,
}

impl SourceTarget {
    pub fn new(kind: TargetKind, name: impl Into<String>, locator: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            locator: locator.into(),
            kind,
            is_priority: false,
            category: None,
            limit: 50,
            scope: None,
        }
    }

    pub fn feed(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self::new(TargetKind::Feed, name, url)
    }

    pub fn query(q: impl Into<String>) -> Self {
        let q = q.into();
        Self::new(TargetKind::Query, q.clone(), q)
    }

    pub fn priority(mut self) -> Self {
        self.is_priority = true;
        self
    }

    pub fn with_category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn within(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Candidates inherit the priority flag only from direct targets; a priority
    /// name used as a search query matches by source name instead.
    pub fn marks_priority(&self) -> bool {
        self.is_priority && self.kind != TargetKind::Query
    }
}

/// A source-specific client: fetches raw records and maps them to candidates.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    type Raw: Send;

    fn name(&self) -> &'static str;

    fn platform(&self) -> Platform;

    /// Fetch raw records. Malformed single records are skipped, not errors.
    async fn fetch(&self, target: &SourceTarget) -> Result<Vec<Self::Raw>, FetchError>;

    /// `None` when the record lacks a title or a resolvable URL.
    fn normalize(
        &self,
        raw: Self::Raw,
        target: &SourceTarget,
        now: DateTime<Utc>,
    ) -> Option<ContentCandidate>;

    /// Last-moment enrichment for a candidate that is about to be stored.
    async fn enrich(&self, _candidate: &mut ContentCandidate) {}
}

/// Output of one fetch + normalize pass.
#[derive(Debug, Default)]
pub struct Collected {
    pub raw: usize,
    pub candidates: Vec<ContentCandidate>,
}

/// Object-safe view of a `SourceAdapter` used by the orchestrator.
#[async_trait]
pub trait CandidateSource: Send + Sync {
    fn label(&self) -> &'static str;

    async fn collect(&self, target: &SourceTarget, now: DateTime<Utc>) -> Result<Collected, FetchError>;

    async fn prepare(&self, candidate: &mut ContentCandidate);
}

#[async_trait]
impl<A> CandidateSource for A
where
    A: SourceAdapter,
{
    fn label(&self) -> &'static str {
        SourceAdapter::name(self)
    }

    async fn collect(&self, target: &SourceTarget, now: DateTime<Utc>) -> Result<Collected, FetchError> {
        let raws = self.fetch(target).await?;
        let raw = raws.len();
        let mut candidates = Vec::with_capacity(raw);
        for r in raws {
            match self.normalize(r, target, now) {
                Some(c) => candidates.push(c),
                None => tracing::debug!(adapter = SourceAdapter::name(self), target = %target.name, "record dropped by normalizer"),
            }
        }
        Ok(Collected { raw, candidates })
    }

    async fn prepare(&self, candidate: &mut ContentCandidate) {
        self.enrich(candidate).await;
    }
}
