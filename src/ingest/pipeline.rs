// src/ingest/pipeline.rs
//! Discovery run orchestration.
//!
//! One run = one platform over one window:
//! fetch every target (with a pause between requests) → normalize → dedupe by
//! URL → window filter → relevance (priority and source-name bypass) → rank by
//! engagement → persist. Every invocation appends exactly one `DiscoveryRun`.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use metrics::{counter, gauge};
use parking_lot::Mutex;

use crate::config::{Credentials, DiscoveryConfig};
use crate::credibility::CredibilityConfig;
use crate::entity;
use crate::ingest::http::{FetchError, HttpClient, RetryPolicy};
use crate::ingest::providers::{
    google_news,
    instagram::InstagramAdapter,
    podcast::ItunesAdapter,
    reddit::RedditAdapter,
    rss::{priority_feed_url, FeedAdapter},
    youtube::YoutubeAdapter,
};
use crate::ingest::types::{CandidateSource, SourceTarget, TargetKind};
use crate::ingest::{dedupe_by_url, ensure_metrics_described};
use crate::model::{
    Category, ContentCandidate, Entity, EntityKind, NewDiscoveryRun, Platform, PrioritySource, RunStatus,
    RunSummary,
};
use crate::persist::{PersistOutcome, PersistenceGate};
use crate::relevance::{priority_name_set, RelevanceHandle};
use crate::store::{ContentStore, StoreError};
use crate::window::{filter_recent, DiscoveryWindow};

/// Failures that abort a whole run.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Source(#[from] FetchError),
    #[error("timed out after {0:?}")]
    TimedOut(Duration),
}

#[derive(Clone)]
pub struct JobSource {
    pub source: Arc<dyn CandidateSource>,
    pub target: SourceTarget,
}

impl JobSource {
    pub fn new(source: Arc<dyn CandidateSource>, target: SourceTarget) -> Self {
        Self { source, target }
    }
}

/// Everything one platform run will fetch.
#[derive(Clone)]
pub struct DiscoveryJob {
    pub platform: Platform,
    pub sources: Vec<JobSource>,
    /// Overrides the runner's pause between requests.
    pub request_delay: Option<Duration>,
    /// Set for entity searches: results skip classification and are linked
    /// to this entity.
    pub entity: Option<i64>,
}

impl DiscoveryJob {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            sources: Vec::new(),
            request_delay: None,
            entity: None,
        }
    }

    pub fn for_entity(platform: Platform, entity_id: i64) -> Self {
        Self {
            entity: Some(entity_id),
            ..Self::new(platform)
        }
    }

    pub fn push(&mut self, source: &Arc<dyn CandidateSource>, target: SourceTarget) {
        self.sources.push(JobSource::new(source.clone(), target));
    }
}

/// Builds the per-platform job from configuration plus active priority sources.
pub trait SourceCatalog: Send + Sync {
    fn job(
        &self,
        platform: Platform,
        priority: &[PrioritySource],
        window: &DiscoveryWindow,
    ) -> Result<DiscoveryJob, FetchError>;

    /// Searches for one tracked entity. Platforms not searched for it yield
    /// an empty job.
    fn entity_job(&self, entity: &Entity, platform: Platform, window: &DiscoveryWindow) -> Result<DiscoveryJob, FetchError>;
}

/// Catalog backed by `DiscoveryConfig` and API credentials.
pub struct ConfiguredCatalog {
    cfg: DiscoveryConfig,
    creds: Credentials,
    http: HttpClient,
}

impl ConfiguredCatalog {
    pub fn new(cfg: DiscoveryConfig, creds: Credentials) -> Result<Self, FetchError> {
        let retry = RetryPolicy {
            max_retries: cfg.run.max_retries,
            base_delay: Duration::from_millis(cfg.run.retry_base_ms),
            ..RetryPolicy::default()
        };
        let http = HttpClient::new(Duration::from_secs(cfg.run.http_timeout_secs), retry)?;
        Ok(Self { cfg, creds, http })
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.cfg
    }

    pub fn http(&self) -> &HttpClient {
        &self.http
    }

    fn article_job(&self, priority: &[PrioritySource]) -> DiscoveryJob {
        let a = &self.cfg.article;
        let adapter: Arc<dyn CandidateSource> = Arc::new(FeedAdapter::articles(self.http.clone(), a.fetch_thumbnails));
        let mut job = DiscoveryJob::new(Platform::Article);
        let mut targets: Vec<SourceTarget> = a
            .feeds
            .iter()
            .map(|f| {
                let t = SourceTarget::feed(&f.name, &f.url).with_limit(a.items_per_feed);
                match f.category {
                    Some(c) => t.with_category(c),
                    None => t,
                }
            })
            .collect();
        for p in priority {
            let Some(url) = p.source_url.as_deref() else {
                continue;
            };
            let feed_url = priority_feed_url(url);
            match targets.iter_mut().find(|t| t.locator == feed_url) {
                Some(existing) => existing.is_priority = true,
                None => targets.push(
                    SourceTarget::feed(&p.source_name, feed_url)
                        .with_limit(a.items_per_feed)
                        .priority(),
                ),
            }
        }
        for t in targets {
            job.push(&adapter, t);
        }
        job
    }

    fn podcast_job(&self, priority: &[PrioritySource]) -> DiscoveryJob {
        let p = &self.cfg.podcast;
        let itunes: Arc<dyn CandidateSource> = Arc::new(ItunesAdapter::new(self.http.clone(), p.clone()));
        let feeds: Arc<dyn CandidateSource> = Arc::new(FeedAdapter::podcasts(self.http.clone()));
        let with_cat = |t: SourceTarget| match p.category {
            Some(c) => t.with_category(c),
            None => t,
        };
        let mut job = DiscoveryJob::new(Platform::Podcast);
        for term in &p.search_terms {
            job.push(&itunes, with_cat(SourceTarget::query(term).with_limit(p.limit)));
        }
        for f in &p.feeds {
            let t = SourceTarget::feed(&f.name, &f.url).with_limit(p.limit);
            let t = match f.category {
                Some(c) => t.with_category(c),
                None => with_cat(t),
            };
            job.push(&feeds, t);
        }
        for src in priority {
            match src.source_url.as_deref() {
                Some(url) => job.push(
                    &feeds,
                    with_cat(SourceTarget::feed(&src.source_name, priority_feed_url(url)).with_limit(p.limit).priority()),
                ),
                None => job.push(&itunes, with_cat(SourceTarget::query(&src.source_name).with_limit(p.limit).priority())),
            }
        }
        job
    }

    fn youtube_job(&self, priority: &[PrioritySource], window: &DiscoveryWindow) -> Result<DiscoveryJob, FetchError> {
        let key = self.youtube_key()?;
        let y = &self.cfg.youtube;
        let adapter: Arc<dyn CandidateSource> =
            Arc::new(YoutubeAdapter::new(self.http.clone(), y.clone(), key, Some(*window)));
        let mut job = DiscoveryJob::new(Platform::Youtube);
        for q in &y.queries {
            job.push(&adapter, SourceTarget::query(q).with_limit(y.max_results));
        }
        for p in priority {
            let t = match p.external_id.as_deref() {
                Some(channel_id) => SourceTarget::new(TargetKind::Channel, &p.source_name, channel_id),
                None => SourceTarget::query(&p.source_name),
            };
            job.push(&adapter, t.with_limit(y.max_results).priority());
        }
        Ok(job)
    }

    fn reddit_job(&self, priority: &[PrioritySource]) -> DiscoveryJob {
        let r = &self.cfg.reddit;
        let adapter: Arc<dyn CandidateSource> = Arc::new(RedditAdapter::new(self.http.clone(), r.clone()));
        let mut job = DiscoveryJob::new(Platform::Reddit);
        let mut communities: Vec<SourceTarget> = r
            .subreddits
            .iter()
            .map(|s| {
                let sub = s.name.trim_start_matches("r/");
                SourceTarget::new(TargetKind::Community, format!("r/{sub}"), sub).with_limit(s.limit)
            })
            .collect();
        for p in priority {
            let sub = p.source_name.trim().trim_start_matches("r/").to_string();
            match communities.iter_mut().find(|t| t.locator.eq_ignore_ascii_case(&sub)) {
                Some(existing) => existing.is_priority = true,
                None => communities.push(SourceTarget::new(TargetKind::Community, format!("r/{sub}"), sub).priority()),
            }
        }
        for t in communities {
            job.push(&adapter, t);
        }
        if let Some(q) = r.search_query.as_deref().filter(|q| !q.trim().is_empty()) {
            for sub in &r.search_subreddits {
                let sub = sub.trim_start_matches("r/");
                let t = SourceTarget::new(TargetKind::Query, format!("r/{sub} search"), q)
                    .within(sub)
                    .with_limit(r.search_limit);
                job.push(&adapter, t);
            }
        }
        if let Some(c) = r.category {
            for s in &mut job.sources {
                s.target.category.get_or_insert(c);
            }
        }
        job
    }

    fn youtube_key(&self) -> Result<String, FetchError> {
        self.creds
            .youtube_api_key
            .clone()
            .ok_or(FetchError::MissingCredentials("YOUTUBE_API_KEY"))
    }

    fn build_entity_job(&self, entity: &Entity, platform: Platform, window: &DiscoveryWindow) -> Result<DiscoveryJob, FetchError> {
        let e = &self.cfg.entity;
        let mut job = DiscoveryJob::for_entity(platform, entity.id);
        if !entity::platforms(entity.kind).contains(&platform) {
            return Ok(job);
        }
        let queries = entity::queries(entity, &e.scope_word);
        match platform {
            Platform::Youtube => {
                let adapter: Arc<dyn CandidateSource> = Arc::new(YoutubeAdapter::new(
                    self.http.clone(),
                    self.cfg.youtube.clone(),
                    self.youtube_key()?,
                    Some(*window),
                ));
                for q in queries.iter().take(e.youtube_terms) {
                    job.push(&adapter, SourceTarget::query(q).with_limit(e.max_results));
                }
                if let Some(channel) = entity.youtube_channel_id.as_deref().filter(|c| !c.trim().is_empty()) {
                    job.push(
                        &adapter,
                        SourceTarget::new(TargetKind::Channel, &entity.name, channel.trim()).with_limit(e.max_results),
                    );
                }
            }
            Platform::Podcast => {
                let itunes: Arc<dyn CandidateSource> =
                    Arc::new(ItunesAdapter::new(self.http.clone(), self.cfg.podcast.clone()));
                for q in queries.iter().take(e.search_terms) {
                    job.push(&itunes, SourceTarget::query(q).with_limit(e.max_results));
                }
            }
            Platform::Article => {
                let feeds: Arc<dyn CandidateSource> = Arc::new(FeedAdapter::articles(self.http.clone(), e.fetch_thumbnails));
                for q in queries.iter().take(e.search_terms) {
                    let url = google_news::search_url(&e.news_search_url, q);
                    job.push(&feeds, SourceTarget::feed(format!("Google News: {q}"), url).with_limit(e.max_results));
                }
            }
            Platform::Reddit => {
                let reddit: Arc<dyn CandidateSource> =
                    Arc::new(RedditAdapter::new(self.http.clone(), self.cfg.reddit.clone()));
                for q in queries.iter().take(e.search_terms) {
                    for sub in &e.reddit_subreddits {
                        let sub = sub.trim_start_matches("r/");
                        let t = SourceTarget::new(TargetKind::Query, format!("r/{sub} search"), q.as_str())
                            .within(sub)
                            .with_limit(e.reddit_limit);
                        job.push(&reddit, t);
                    }
                }
            }
            Platform::Instagram => {}
        }
        if entity.kind == EntityKind::Athlete {
            for s in &mut job.sources {
                s.target.category.get_or_insert(Category::AthleteNews);
            }
        }
        Ok(job)
    }

    fn instagram_job(&self) -> Result<DiscoveryJob, FetchError> {
        let key = self
            .creds
            .rapidapi_key
            .clone()
            .ok_or(FetchError::MissingCredentials("RAPIDAPI_KEY"))?;
        let i = &self.cfg.instagram;
        let adapter: Arc<dyn CandidateSource> = Arc::new(InstagramAdapter::new(self.http.clone(), i.clone(), key));
        let mut job = DiscoveryJob::new(Platform::Instagram);
        for tag in &i.hashtags {
            let tag = tag.trim_start_matches('#');
            job.push(&adapter, SourceTarget::new(TargetKind::Hashtag, format!("#{tag}"), tag));
        }
        job.request_delay = Some(Duration::from_millis(i.request_delay_ms));
        Ok(job)
    }
}

impl SourceCatalog for ConfiguredCatalog {
    fn job(
        &self,
        platform: Platform,
        priority: &[PrioritySource],
        window: &DiscoveryWindow,
    ) -> Result<DiscoveryJob, FetchError> {
        match platform {
            Platform::Article => Ok(self.article_job(priority)),
            Platform::Podcast => Ok(self.podcast_job(priority)),
            Platform::Youtube => self.youtube_job(priority, window),
            Platform::Reddit => Ok(self.reddit_job(priority)),
            // Accounts have no fetch endpoint here; they match by name.
            Platform::Instagram => self.instagram_job(),
        }
    }

    fn entity_job(&self, entity: &Entity, platform: Platform, window: &DiscoveryWindow) -> Result<DiscoveryJob, FetchError> {
        self.build_entity_job(entity, platform, window)
    }
}

/// Fixed jobs per platform, for embedding and tests.
#[derive(Clone, Default)]
pub struct FixedCatalog {
    jobs: HashMap<Platform, Vec<JobSource>>,
    entity_jobs: HashMap<Platform, Vec<JobSource>>,
}

impl FixedCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source(mut self, platform: Platform, source: Arc<dyn CandidateSource>, target: SourceTarget) -> Self {
        self.jobs
            .entry(platform)
            .or_default()
            .push(JobSource::new(source, target));
        self
    }

    /// Source answered for every entity searched on `platform`.
    pub fn with_entity_source(mut self, platform: Platform, source: Arc<dyn CandidateSource>, target: SourceTarget) -> Self {
        self.entity_jobs
            .entry(platform)
            .or_default()
            .push(JobSource::new(source, target));
        self
    }
}

impl SourceCatalog for FixedCatalog {
    fn job(&self, platform: Platform, _priority: &[PrioritySource], _window: &DiscoveryWindow) -> Result<DiscoveryJob, FetchError> {
        let mut job = DiscoveryJob::new(platform);
        job.sources = self.jobs.get(&platform).cloned().unwrap_or_default();
        Ok(job)
    }

    fn entity_job(&self, entity: &Entity, platform: Platform, _window: &DiscoveryWindow) -> Result<DiscoveryJob, FetchError> {
        let mut job = DiscoveryJob::for_entity(platform, entity.id);
        job.sources = self.entity_jobs.get(&platform).cloned().unwrap_or_default();
        Ok(job)
    }
}

/// Names that bypass classification, in the forms adapters use as source names.
pub fn priority_names(platform: Platform, priority: &[PrioritySource]) -> HashSet<String> {
    let mut names: Vec<String> = Vec::with_capacity(priority.len() * 2);
    for p in priority {
        let n = p.source_name.trim();
        names.push(n.to_string());
        match platform {
            Platform::Reddit if !n.starts_with("r/") => names.push(format!("r/{n}")),
            Platform::Instagram if !n.starts_with('@') => names.push(format!("@{n}")),
            _ => {}
        }
    }
    priority_name_set(names.iter().map(String::as_str))
}

/// Runs discovery for one platform at a time against a store.
#[derive(Clone)]
pub struct DiscoveryRunner {
    store: Arc<dyn ContentStore>,
    relevance: RelevanceHandle,
    credibility: Arc<CredibilityConfig>,
    request_delay: Duration,
}

impl DiscoveryRunner {
    pub fn new(store: Arc<dyn ContentStore>, relevance: RelevanceHandle, credibility: CredibilityConfig) -> Self {
        Self {
            store,
            relevance,
            credibility: Arc::new(credibility),
            request_delay: Duration::from_millis(500),
        }
    }

    pub fn with_request_delay(mut self, delay: Duration) -> Self {
        self.request_delay = delay;
        self
    }

    pub fn store(&self) -> &Arc<dyn ContentStore> {
        &self.store
    }

    /// Gate over this runner's store and credibility rules, for items that
    /// enter outside a run.
    pub fn gate(&self) -> PersistenceGate {
        PersistenceGate::new(self.store.clone(), self.credibility.clone())
    }

    pub async fn run(&self, platform: Platform, catalog: &dyn SourceCatalog, window: &DiscoveryWindow) -> RunSummary {
        self.run_at(platform, catalog, window, Utc::now()).await
    }

    /// `run` with an explicit clock, used for inferred dates, score decay and
    /// to anchor a trailing window.
    pub async fn run_at(
        &self,
        platform: Platform,
        catalog: &dyn SourceCatalog,
        window: &DiscoveryWindow,
        now: DateTime<Utc>,
    ) -> RunSummary {
        self.run_bounded(platform, catalog, window, now, None).await
    }

    /// `run` cut off after `limit`. An overrun is recorded as failed with the
    /// stage counts reached so far.
    pub async fn run_with_timeout(
        &self,
        platform: Platform,
        catalog: &dyn SourceCatalog,
        window: &DiscoveryWindow,
        limit: Duration,
    ) -> RunSummary {
        self.run_bounded(platform, catalog, window, Utc::now(), Some(limit)).await
    }

    pub(crate) async fn run_bounded(
        &self,
        platform: Platform,
        catalog: &dyn SourceCatalog,
        window: &DiscoveryWindow,
        now: DateTime<Utc>,
        limit: Option<Duration>,
    ) -> RunSummary {
        ensure_metrics_described();
        let started = Instant::now();
        let window = window.anchored(now);
        let progress = Mutex::new(RunSummary::empty(platform, &window));

        let work = self.execute(platform, catalog, &window, now, &progress);
        let outcome = match limit {
            Some(limit) => tokio::time::timeout(limit, work).await.unwrap_or_else(|_| {
                tracing::error!(%platform, timeout_secs = limit.as_secs(), "discovery run timed out");
                counter!("discovery_timeouts_total", "platform" => platform.as_str()).increment(1);
                Err(RunError::TimedOut(limit))
            }),
            None => work.await,
        };

        let mut summary = progress.into_inner();
        if let Err(e) = outcome {
            tracing::error!(%platform, error = %e, "discovery run failed");
            summary.status = RunStatus::Failed;
            summary.error = Some(e.to_string());
        }

        self.record(&summary, &window, started.elapsed()).await;
        gauge!("discovery_last_run_ts", "platform" => platform.as_str()).set(Utc::now().timestamp() as f64);
        tracing::info!(
            %platform,
            found = summary.found,
            unique = summary.unique,
            recent = summary.recent,
            relevant = summary.relevant,
            saved = summary.saved,
            skipped = summary.skipped,
            linked = summary.linked,
            failed = summary.failed,
            status = summary.status.as_str(),
            "discovery run finished"
        );
        summary
    }

    async fn record(&self, summary: &RunSummary, window: &DiscoveryWindow, elapsed: Duration) {
        let row = NewDiscoveryRun {
            platform: summary.platform,
            window: *window,
            items_found: summary.found as i64,
            items_saved: summary.saved as i64,
            items_skipped: summary.skipped as i64,
            status: summary.status,
            error_message: summary.error.clone(),
            execution_seconds: elapsed.as_secs_f64(),
        };
        if let Err(e) = self.store.record_run(&row).await {
            tracing::warn!(platform = %summary.platform, error = %e, "could not record discovery run");
        }
    }

    async fn execute(
        &self,
        platform: Platform,
        catalog: &dyn SourceCatalog,
        window: &DiscoveryWindow,
        now: DateTime<Utc>,
        progress: &Mutex<RunSummary>,
    ) -> Result<(), RunError> {
        let label = platform.as_str();
        self.store.ping().await?;
        let priority = self.store.active_priority_sources(platform).await?;
        let job = catalog.job(platform, &priority, window)?;
        let delay = job.request_delay.unwrap_or(self.request_delay);
        tracing::info!(%platform, sources = job.sources.len(), priority = priority.len(), entity = ?job.entity, "discovery run started");

        // Source index per URL, first seen, for the enrichment hook.
        let mut origin: HashMap<String, usize> = HashMap::new();
        let mut all: Vec<ContentCandidate> = Vec::new();
        for (idx, js) in job.sources.iter().enumerate() {
            if idx > 0 && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            match js.source.collect(&js.target, now).await {
                Ok(collected) => {
                    tracing::debug!(%platform, source = %js.target.name, raw = collected.raw, kept = collected.candidates.len(), "source fetched");
                    for c in &collected.candidates {
                        origin.entry(c.canonical_url.clone()).or_insert(idx);
                    }
                    all.extend(collected.candidates);
                }
                Err(e) => {
                    progress.lock().source_errors += 1;
                    counter!("discovery_source_errors_total", "platform" => label).increment(1);
                    tracing::warn!(%platform, source = %js.target.name, adapter = js.source.label(), error = %e, "source failed, continuing");
                }
            }
        }
        progress.lock().found = all.len();
        counter!("discovery_candidates_total", "platform" => label).increment(all.len() as u64);

        let (unique, _dropped) = dedupe_by_url(all);
        progress.lock().unique = unique.len();
        counter!("discovery_unique_total", "platform" => label).increment(unique.len() as u64);

        let recent = filter_recent(unique, window);
        progress.lock().recent = recent.len();
        counter!("discovery_recent_total", "platform" => label).increment(recent.len() as u64);

        // Entity searches are already targeted; the keyword classifier would
        // drop results that name the athlete but not the sport.
        let mut relevant: Vec<ContentCandidate> = match job.entity {
            Some(_) => recent,
            None => {
                let classifier = self.relevance.snapshot();
                let names = priority_names(platform, &priority);
                recent
                    .into_iter()
                    .filter(|c| classifier.decide(c, &names).relevant)
                    .collect()
            }
        };
        progress.lock().relevant = relevant.len();
        counter!("discovery_relevant_total", "platform" => label).increment(relevant.len() as u64);

        // Stable: equal weights keep first-seen order.
        relevant.sort_by(|a, b| b.engagement.weight().cmp(&a.engagement.weight()));

        let gate = self.gate();
        for mut c in relevant {
            match gate.stored(&c.canonical_url).await {
                Ok(Some(existing)) => {
                    progress.lock().skipped += 1;
                    if let Some(entity_id) = job.entity {
                        self.link(&gate, entity_id, existing.id, platform, progress).await?;
                    }
                    continue;
                }
                Ok(None) => {}
                Err(e) if e.is_fatal() => return Err(e.into()),
                Err(e) => {
                    progress.lock().failed += 1;
                    counter!("discovery_persist_errors_total", "platform" => label).increment(1);
                    tracing::warn!(%platform, title = %c.title, error = %e, "lookup failed, item skipped");
                    continue;
                }
            }

            if let Some(js) = origin.get(&c.canonical_url).and_then(|&i| job.sources.get(i)) {
                js.source.prepare(&mut c).await;
            }

            match gate.persist(&c, now).await {
                Ok(PersistOutcome::Saved(item)) => {
                    progress.lock().saved += 1;
                    tracing::debug!(%platform, id = item.id, url = %item.url, "saved");
                    if let Some(entity_id) = job.entity {
                        self.link(&gate, entity_id, item.id, platform, progress).await?;
                    }
                }
                Ok(PersistOutcome::Skipped) => {
                    progress.lock().skipped += 1;
                    if let Some(entity_id) = job.entity {
                        if let Ok(Some(existing)) = gate.stored(&c.canonical_url).await {
                            self.link(&gate, entity_id, existing.id, platform, progress).await?;
                        }
                    }
                }
                Err(e) if e.is_fatal() => return Err(e.into()),
                Err(e) => {
                    progress.lock().failed += 1;
                    counter!("discovery_persist_errors_total", "platform" => label).increment(1);
                    tracing::warn!(%platform, title = %c.title, error = %e, "persist failed, continuing");
                }
            }
        }
        let (saved, skipped) = {
            let done = progress.lock();
            (done.saved, done.skipped)
        };
        counter!("discovery_saved_total", "platform" => label).increment(saved as u64);
        counter!("discovery_skipped_total", "platform" => label).increment(skipped as u64);
        Ok(())
    }

    async fn link(
        &self,
        gate: &PersistenceGate,
        entity_id: i64,
        content_id: i64,
        platform: Platform,
        progress: &Mutex<RunSummary>,
    ) -> Result<(), RunError> {
        match gate.link(entity_id, content_id, platform).await {
            Ok(true) => {
                progress.lock().linked += 1;
                counter!("discovery_linked_total", "platform" => platform.as_str()).increment(1);
                Ok(())
            }
            Ok(false) => Ok(()),
            Err(e) if e.is_fatal() => Err(e.into()),
            Err(e) => {
                progress.lock().failed += 1;
                counter!("discovery_persist_errors_total", "platform" => platform.as_str()).increment(1);
                tracing::warn!(%platform, entity_id, content_id, error = %e, "entity link failed, continuing");
                Ok(())
            }
        }
    }
}
