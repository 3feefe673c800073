//! Discovery run orchestration.
//!
//! One run fans out over the enabled sources on a bounded worker pool,
//! pushes every record through normalize -> classify -> dedup -> persist,
//! and ends in exactly one terminal state. Source failures are isolated: a
//! run only fails when every attempted source fails.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use fundscout_adapters::{adapter_for, FetchContext, SourceAdapter};
use fundscout_core::{Opportunity, RawRecord, SourceError};
use fundscout_storage::{HttpClientConfig, HttpFetcher, OpportunityFilter, Repository};
use serde::Serialize;
use tokio::sync::{mpsc, watch, Semaphore};
use tokio::task::JoinSet;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::classify::Classifier;
use crate::config::{DiscoveryConfig, SourceRegistry};
use crate::dedup::{DedupAdvisor, Deduplicator};
use crate::normalize::Normalizer;

/// Lifecycle of one discovery run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunState {
    Idle,
    Running,
    Completed,
    Cancelled,
    Failed,
}

/// Terminal state of one source within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceState {
    Completed,
    Errored,
    TimedOut,
    Cancelled,
}

/// Per-source counters reported at the end of a run.
#[derive(Debug, Clone, Serialize)]
pub struct SourceOutcome {
    pub source_name: String,
    pub state: SourceState,
    pub fetched: usize,
    /// Malformed items the adapter skipped.
    pub skipped: usize,
    pub filtered: usize,
    pub dropped: usize,
    pub deduplicated: usize,
    pub persisted: usize,
    pub error: Option<String>,
}

impl SourceOutcome {
    fn new(source_name: &str) -> Self {
        Self {
            source_name: source_name.to_string(),
            state: SourceState::Completed,
            fetched: 0,
            skipped: 0,
            filtered: 0,
            dropped: 0,
            deduplicated: 0,
            persisted: 0,
            error: None,
        }
    }

    fn errored(source_name: &str, state: SourceState, error: &SourceError) -> Self {
        Self {
            state,
            error: Some(error.to_string()),
            ..Self::new(source_name)
        }
    }
}

/// Streamed to the caller while a run is in flight.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    SourceStarted { source_name: String },
    SourceFinished { outcome: SourceOutcome },
    RunFinished { state: RunState },
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub state: RunState,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub sources: Vec<SourceOutcome>,
    pub persisted_total: usize,
    pub report_path: Option<PathBuf>,
}

pub struct Discovery {
    config: DiscoveryConfig,
    repository: Arc<dyn Repository>,
    http: Arc<HttpFetcher>,
    classifier: Arc<Classifier>,
    normalizer: Normalizer,
    deduplicator: Deduplicator,
    advisor: DedupAdvisor,
}

/// Handle on one in-flight run: progress stream, cooperative cancellation
/// and the final summary.
pub struct DiscoverySession {
    pub run_id: Uuid,
    progress: mpsc::Receiver<ProgressEvent>,
    cancel: Arc<watch::Sender<bool>>,
    handle: tokio::task::JoinHandle<Result<RunSummary>>,
}

/// Cloneable handle for cancelling a run from another task.
#[derive(Clone)]
pub struct CancelHandle(Arc<watch::Sender<bool>>);

impl CancelHandle {
    pub fn cancel(&self) {
        // send_replace: a plain send is dropped while no worker has
        // subscribed yet, losing a cancel issued right after start
        self.0.send_replace(true);
    }
}

impl DiscoverySession {
    /// Request cancellation. In-flight work drains; the run terminates as
    /// `Cancelled`, never `Failed`.
    pub fn cancel(&self) {
        self.cancel.send_replace(true);
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle(Arc::clone(&self.cancel))
    }

    pub async fn next_event(&mut self) -> Option<ProgressEvent> {
        self.progress.recv().await
    }

    pub async fn wait(self) -> Result<RunSummary> {
        self.handle.await.context("discovery run task panicked")?
    }
}

impl Discovery {
    pub fn new(config: DiscoveryConfig, repository: Arc<dyn Repository>) -> Result<Self> {
        let http = HttpFetcher::new(HttpClientConfig {
            timeout: config.http_timeout,
            user_agent: Some(config.user_agent.clone()),
            ..Default::default()
        })?;
        let classifier = Classifier::new(
            crate::classify::Lexicon::builtin(),
            config.relevance_weights,
        );
        Ok(Self {
            config,
            repository,
            http: Arc::new(http),
            classifier: Arc::new(classifier),
            normalizer: Normalizer::new(),
            deduplicator: Deduplicator::new(),
            advisor: DedupAdvisor::default(),
        })
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    /// Start a run over the registry's enabled sources.
    pub fn start(self: &Arc<Self>, registry: &SourceRegistry) -> DiscoverySession {
        let adapters: Vec<Arc<dyn SourceAdapter>> = registry
            .setups(self.config.sources.as_ref(), self.config.max_per_source)
            .into_iter()
            .map(|setup| Arc::from(adapter_for(setup)))
            .collect();
        self.start_with_adapters(adapters)
    }

    /// Start a run over an explicit adapter set.
    pub fn start_with_adapters(
        self: &Arc<Self>,
        adapters: Vec<Arc<dyn SourceAdapter>>,
    ) -> DiscoverySession {
        let run_id = Uuid::new_v4();
        let (progress_tx, progress_rx) = mpsc::channel(64);
        let (cancel_tx, _cancel_rx) = watch::channel(false);
        let cancel_tx = Arc::new(cancel_tx);

        let discovery = Arc::clone(self);
        let run_cancel = Arc::clone(&cancel_tx);
        let handle = tokio::spawn(async move {
            discovery
                .run(run_id, adapters, progress_tx, run_cancel)
                .instrument(info_span!("discovery_run", %run_id))
                .await
        });

        DiscoverySession {
            run_id,
            progress: progress_rx,
            cancel: cancel_tx,
            handle,
        }
    }

    async fn run(
        &self,
        run_id: Uuid,
        adapters: Vec<Arc<dyn SourceAdapter>>,
        progress: mpsc::Sender<ProgressEvent>,
        cancel: Arc<watch::Sender<bool>>,
    ) -> Result<RunSummary> {
        let started_at = Utc::now();
        info!(sources = adapters.len(), "discovery run starting");

        let pool = Arc::new(Semaphore::new(self.config.concurrency.max(1)));
        let keywords = Arc::new(self.config.keywords.clone());
        let dispatched: Vec<String> = adapters
            .iter()
            .map(|a| a.source_name().to_string())
            .collect();
        let mut join_set: JoinSet<SourceOutcome> = JoinSet::new();

        for adapter in adapters {
            let pool = Arc::clone(&pool);
            let keywords = Arc::clone(&keywords);
            let repository = Arc::clone(&self.repository);
            let http = Arc::clone(&self.http);
            let classifier = Arc::clone(&self.classifier);
            let progress = progress.clone();
            let cancel = cancel.subscribe();
            let normalizer = self.normalizer;
            let deduplicator = self.deduplicator;
            let advisor = self.advisor;
            let per_source_timeout = self.config.per_source_timeout;
            let ctx = FetchContext {
                run_id,
                fetched_at: Utc::now(),
            };

            join_set.spawn(async move {
                let _permit = match pool.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return SourceOutcome::new(adapter.source_name()),
                };
                if *cancel.borrow() {
                    let mut outcome = SourceOutcome::new(adapter.source_name());
                    outcome.state = SourceState::Cancelled;
                    return outcome;
                }
                let _ = progress
                    .send(ProgressEvent::SourceStarted {
                        source_name: adapter.source_name().to_string(),
                    })
                    .await;

                let outcome = process_source(
                    adapter.as_ref(),
                    &ctx,
                    http.as_ref(),
                    repository.as_ref(),
                    &classifier,
                    normalizer,
                    deduplicator,
                    advisor,
                    &keywords,
                    per_source_timeout,
                    cancel,
                )
                .await;

                let _ = progress
                    .send(ProgressEvent::SourceFinished {
                        outcome: outcome.clone(),
                    })
                    .await;
                outcome
            });
        }

        let mut outcomes = Vec::new();
        let run_deadline = tokio::time::sleep(self.config.run_timeout);
        tokio::pin!(run_deadline);
        let mut timed_out = false;
        let mut cancelled_before_deadline = false;
        while !join_set.is_empty() {
            tokio::select! {
                _ = &mut run_deadline, if !timed_out => {
                    timed_out = true;
                    cancelled_before_deadline = *cancel.borrow();
                    warn!("run timeout reached, stopping remaining sources");
                    cancel.send_replace(true);
                    join_set.abort_all();
                }
                joined = join_set.join_next() => match joined {
                    Some(Ok(outcome)) => outcomes.push(outcome),
                    Some(Err(join_error)) if join_error.is_cancelled() => {}
                    Some(Err(join_error)) => {
                        warn!(error = %join_error, "source task failed");
                    }
                    None => break,
                },
            }
        }

        // sources aborted by the run deadline still get a terminal entry in
        // the report
        if timed_out {
            for name in &dispatched {
                if outcomes.iter().any(|o| &o.source_name == name) {
                    continue;
                }
                let error = SourceError::Timeout {
                    source_name: name.clone(),
                    seconds: self.config.run_timeout.as_secs(),
                };
                outcomes.push(SourceOutcome::errored(name, SourceState::TimedOut, &error));
            }
        }

        outcomes.sort_by(|a, b| a.source_name.cmp(&b.source_name));
        let cancelled = cancelled_before_deadline || (!timed_out && *cancel.borrow());
        let attempted = outcomes
            .iter()
            .filter(|o| o.state != SourceState::Cancelled)
            .count();
        let succeeded = outcomes
            .iter()
            .filter(|o| o.state == SourceState::Completed)
            .count();

        // the run deadline truncates a run instead of failing it; whatever
        // finished in time stands as a partial result
        let state = if cancelled {
            RunState::Cancelled
        } else if !timed_out && attempted > 0 && succeeded == 0 {
            RunState::Failed
        } else {
            RunState::Completed
        };

        let finished_at = Utc::now();
        let persisted_total = outcomes.iter().map(|o| o.persisted).sum();
        let mut summary = RunSummary {
            run_id,
            state,
            started_at,
            finished_at,
            sources: outcomes,
            persisted_total,
            report_path: None,
        };
        match self.write_report(&summary).await {
            Ok(path) => summary.report_path = Some(path),
            Err(error) => warn!(error = %error, "run report could not be written"),
        }

        let _ = progress.send(ProgressEvent::RunFinished { state }).await;
        info!(state = ?state, persisted = persisted_total, "discovery run finished");
        Ok(summary)
    }

    async fn write_report(&self, summary: &RunSummary) -> Result<PathBuf> {
        let dir = self.config.reports_dir.join(summary.run_id.to_string());
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("creating {}", dir.display()))?;
        let path = dir.join("run_report.json");
        let bytes = serde_json::to_vec_pretty(summary).context("serializing run report")?;
        tokio::fs::write(&path, bytes)
            .await
            .with_context(|| format!("writing {}", path.display()))?;
        Ok(path)
    }
}

#[allow(clippy::too_many_arguments)]
async fn process_source(
    adapter: &dyn SourceAdapter,
    ctx: &FetchContext,
    http: &HttpFetcher,
    repository: &dyn Repository,
    classifier: &Classifier,
    normalizer: Normalizer,
    deduplicator: Deduplicator,
    advisor: DedupAdvisor,
    keywords: &BTreeSet<String>,
    per_source_timeout: std::time::Duration,
    cancel: watch::Receiver<bool>,
) -> SourceOutcome {
    let source_name = adapter.source_name().to_string();
    let fetched = match tokio::time::timeout(per_source_timeout, adapter.fetch(http, ctx)).await {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(error)) => {
            warn!(source = %source_name, error = %error, "source fetch failed");
            return SourceOutcome::errored(&source_name, SourceState::Errored, &error);
        }
        Err(_) => {
            let error = SourceError::Timeout {
                source_name: source_name.clone(),
                seconds: per_source_timeout.as_secs(),
            };
            warn!(source = %source_name, error = %error, "source fetch timed out");
            return SourceOutcome::errored(&source_name, SourceState::TimedOut, &error);
        }
    };

    let mut outcome = SourceOutcome::new(&source_name);
    outcome.fetched = fetched.records.len();
    outcome.skipped = fetched.skipped;

    let mut persisted: Vec<Opportunity> = Vec::new();
    for record in &fetched.records {
        if *cancel.borrow() {
            outcome.state = SourceState::Cancelled;
            break;
        }
        if !keywords.is_empty() && !record_mentions(record, keywords) {
            outcome.filtered += 1;
            continue;
        }
        let mut opportunity = match normalizer.normalize(record, ctx.fetched_at) {
            Ok(opportunity) => opportunity,
            Err(reason) => {
                info!(source = %source_name, reason = reason.as_str(), "record dropped");
                outcome.dropped += 1;
                continue;
            }
        };

        let classification = classifier.classify(&opportunity, ctx.fetched_at.date_naive());
        opportunity.category = classification.category;
        opportunity.kind = classification.kind;
        opportunity.relevance_score = classification.relevance_score;
        opportunity.keywords = classification.keywords;

        match deduplicator.find_duplicate(&opportunity, repository).await {
            Ok(Some(_)) => outcome.deduplicated += 1,
            Ok(None) => {}
            Err(error) => {
                warn!(source = %source_name, error = %error, "dedup lookup failed");
            }
        }
        match repository.save_opportunity(opportunity.clone()).await {
            Ok(_) => {
                outcome.persisted += 1;
                persisted.push(opportunity);
            }
            Err(error) => {
                warn!(source = %source_name, error = %error, "persist failed");
                outcome.dropped += 1;
            }
        }
    }

    if !persisted.is_empty() {
        if let Ok(peers) = repository.query_opportunities(&OpportunityFilter::default()).await {
            for fresh in &persisted {
                advisor.advise(fresh, &peers);
            }
        }
    }
    outcome
}

/// A record passes the keyword filter when any configured term appears in
/// any of its textual fields.
fn record_mentions(record: &RawRecord, keywords: &BTreeSet<String>) -> bool {
    let haystack: String = record
        .fields
        .values()
        .filter_map(|v| v.as_str())
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    keywords.iter().any(|k| haystack.contains(&k.to_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use fundscout_adapters::{FetchOutcome, RateLimitPolicy};
    use fundscout_storage::InMemoryRepository;
    use std::time::Duration;

    struct StubAdapter {
        name: String,
        records: Vec<RawRecord>,
        fail: bool,
        delay: Duration,
    }

    impl StubAdapter {
        fn with_records(name: &str, records: Vec<RawRecord>) -> Arc<dyn SourceAdapter> {
            Arc::new(Self {
                name: name.to_string(),
                records,
                fail: false,
                delay: Duration::ZERO,
            })
        }

        fn failing(name: &str) -> Arc<dyn SourceAdapter> {
            Arc::new(Self {
                name: name.to_string(),
                records: Vec::new(),
                fail: true,
                delay: Duration::ZERO,
            })
        }

        fn slow(name: &str, delay: Duration) -> Arc<dyn SourceAdapter> {
            Arc::new(Self {
                name: name.to_string(),
                records: Vec::new(),
                fail: false,
                delay,
            })
        }
    }

    #[async_trait]
    impl SourceAdapter for StubAdapter {
        fn source_name(&self) -> &str {
            &self.name
        }

        fn rate_limit(&self) -> RateLimitPolicy {
            RateLimitPolicy::default()
        }

        fn max_items(&self) -> usize {
            25
        }

        async fn fetch(
            &self,
            _http: &HttpFetcher,
            _ctx: &FetchContext,
        ) -> Result<FetchOutcome, SourceError> {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.fail {
                return Err(SourceError::unavailable(&self.name, "connection refused"));
            }
            Ok(FetchOutcome {
                records: self.records.clone(),
                skipped: 0,
            })
        }
    }

    fn record(source: &str, title: &str, organization: &str, url: &str) -> RawRecord {
        let mut raw = RawRecord::new(source);
        raw.set("title", title);
        raw.set("organization", organization);
        raw.set("url", url);
        raw.set("description", "Grant funding for research teams.");
        raw
    }

    fn discovery(reports_dir: &std::path::Path) -> Arc<Discovery> {
        let config = DiscoveryConfig {
            reports_dir: reports_dir.to_path_buf(),
            per_source_timeout: Duration::from_millis(250),
            run_timeout: Duration::from_secs(5),
            ..DiscoveryConfig::default()
        };
        Arc::new(Discovery::new(config, Arc::new(InMemoryRepository::new())).unwrap())
    }

    #[tokio::test]
    async fn partial_source_failure_still_completes() {
        let dir = tempfile::tempdir().unwrap();
        let discovery = discovery(dir.path());
        let session = discovery.start_with_adapters(vec![
            StubAdapter::with_records(
                "grants-portal",
                vec![record("grants-portal", "AI Grant", "NSF", "https://a.test/1")],
            ),
            StubAdapter::failing("broken-portal"),
        ]);
        let summary = session.wait().await.unwrap();

        assert_eq!(summary.state, RunState::Completed);
        assert_eq!(summary.persisted_total, 1);
        let broken = summary
            .sources
            .iter()
            .find(|o| o.source_name == "broken-portal")
            .unwrap();
        assert_eq!(broken.state, SourceState::Errored);
        assert!(broken.error.as_deref().unwrap().contains("unavailable"));
        assert!(summary.report_path.as_ref().unwrap().exists());
    }

    #[tokio::test]
    async fn all_sources_failing_fails_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let discovery = discovery(dir.path());
        let session = discovery.start_with_adapters(vec![
            StubAdapter::failing("broken-a"),
            StubAdapter::failing("broken-b"),
        ]);
        let summary = session.wait().await.unwrap();
        assert_eq!(summary.state, RunState::Failed);
        assert_eq!(summary.persisted_total, 0);
    }

    #[tokio::test]
    async fn slow_source_times_out_without_failing_others() {
        let dir = tempfile::tempdir().unwrap();
        let discovery = discovery(dir.path());
        let session = discovery.start_with_adapters(vec![
            StubAdapter::slow("glacial-portal", Duration::from_secs(30)),
            StubAdapter::with_records(
                "grants-portal",
                vec![record("grants-portal", "AI Grant", "NSF", "https://a.test/1")],
            ),
        ]);
        let summary = session.wait().await.unwrap();
        assert_eq!(summary.state, RunState::Completed);
        let slow = summary
            .sources
            .iter()
            .find(|o| o.source_name == "glacial-portal")
            .unwrap();
        assert_eq!(slow.state, SourceState::TimedOut);
    }

    #[tokio::test]
    async fn cancellation_terminates_as_cancelled() {
        let dir = tempfile::tempdir().unwrap();
        let config = DiscoveryConfig {
            reports_dir: dir.path().to_path_buf(),
            per_source_timeout: Duration::from_secs(60),
            run_timeout: Duration::from_secs(60),
            ..DiscoveryConfig::default()
        };
        let discovery =
            Arc::new(Discovery::new(config, Arc::new(InMemoryRepository::new())).unwrap());
        let session = discovery.start_with_adapters(vec![StubAdapter::slow(
            "glacial-portal",
            Duration::from_secs(30),
        )]);
        session.cancel();
        let summary = session.wait().await.unwrap();
        assert_eq!(summary.state, RunState::Cancelled);
    }

    #[tokio::test]
    async fn cancel_handle_fired_before_workers_subscribe_still_cancels() {
        let dir = tempfile::tempdir().unwrap();
        let config = DiscoveryConfig {
            reports_dir: dir.path().to_path_buf(),
            per_source_timeout: Duration::from_secs(60),
            run_timeout: Duration::from_secs(60),
            ..DiscoveryConfig::default()
        };
        let discovery =
            Arc::new(Discovery::new(config, Arc::new(InMemoryRepository::new())).unwrap());
        let session = discovery.start_with_adapters(vec![StubAdapter::slow(
            "glacial-portal",
            Duration::from_secs(30),
        )]);
        // no worker holds a receiver yet; the cancel must not be dropped
        session.cancel_handle().cancel();
        let summary = session.wait().await.unwrap();
        assert_eq!(summary.state, RunState::Cancelled);
    }

    #[tokio::test]
    async fn run_timeout_completes_with_partial_results() {
        let dir = tempfile::tempdir().unwrap();
        let config = DiscoveryConfig {
            reports_dir: dir.path().to_path_buf(),
            per_source_timeout: Duration::from_secs(60),
            run_timeout: Duration::from_millis(500),
            ..DiscoveryConfig::default()
        };
        let discovery =
            Arc::new(Discovery::new(config, Arc::new(InMemoryRepository::new())).unwrap());
        let session = discovery.start_with_adapters(vec![
            StubAdapter::with_records(
                "grants-portal",
                vec![record("grants-portal", "AI Grant", "NSF", "https://a.test/1")],
            ),
            StubAdapter::slow("glacial-portal", Duration::from_secs(30)),
        ]);
        let summary = session.wait().await.unwrap();

        assert_eq!(summary.state, RunState::Completed);
        assert_eq!(summary.persisted_total, 1);
        // the aborted source still shows up in the report
        let slow = summary
            .sources
            .iter()
            .find(|o| o.source_name == "glacial-portal")
            .unwrap();
        assert_eq!(slow.state, SourceState::TimedOut);
        assert!(slow.error.as_deref().unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn same_opportunity_from_two_sources_merges_to_one_row() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Arc::new(InMemoryRepository::new());
        let config = DiscoveryConfig {
            reports_dir: dir.path().to_path_buf(),
            // serialize the two sources so the dedup counter is deterministic
            concurrency: 1,
            ..DiscoveryConfig::default()
        };
        let discovery = Arc::new(Discovery::new(config, repo.clone()).unwrap());
        let session = discovery.start_with_adapters(vec![
            StubAdapter::with_records(
                "nasa-solicitations",
                vec![record(
                    "nasa-solicitations",
                    "Space Grant 2025",
                    "NASA",
                    "https://nasa.test/space-grant",
                )],
            ),
            StubAdapter::with_records(
                "funding-feed",
                vec![record(
                    "funding-feed",
                    "Space Grant 2025!",
                    "nasa",
                    "https://feed.test/space-grant",
                )],
            ),
        ]);
        let summary = session.wait().await.unwrap();
        assert_eq!(summary.state, RunState::Completed);

        let stored = repo.query_opportunities(&Default::default()).await.unwrap();
        assert_eq!(stored.len(), 1);
        let dedup_hits: usize = summary.sources.iter().map(|o| o.deduplicated).sum();
        assert_eq!(dedup_hits, 1);
    }

    #[tokio::test]
    async fn keyword_filter_skips_unrelated_records() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Arc::new(InMemoryRepository::new());
        let config = DiscoveryConfig {
            reports_dir: dir.path().to_path_buf(),
            keywords: ["quantum".to_string()].into(),
            ..DiscoveryConfig::default()
        };
        let discovery = Arc::new(Discovery::new(config, repo.clone()).unwrap());
        let session = discovery.start_with_adapters(vec![StubAdapter::with_records(
            "grants-portal",
            vec![
                record("grants-portal", "Quantum Sensing Grant", "NSF", "https://a.test/q"),
                record("grants-portal", "Marine Biology Award", "NSF", "https://a.test/m"),
            ],
        )]);
        let summary = session.wait().await.unwrap();

        let outcome = &summary.sources[0];
        assert_eq!(outcome.filtered, 1);
        assert_eq!(outcome.persisted, 1);
        let stored = repo.query_opportunities(&Default::default()).await.unwrap();
        assert_eq!(stored[0].title, "Quantum Sensing Grant");
    }

    #[tokio::test]
    async fn progress_events_arrive_in_lifecycle_order() {
        let dir = tempfile::tempdir().unwrap();
        let discovery = discovery(dir.path());
        let mut session = discovery.start_with_adapters(vec![StubAdapter::with_records(
            "grants-portal",
            vec![record("grants-portal", "AI Grant", "NSF", "https://a.test/1")],
        )]);

        let mut saw_start = false;
        let mut saw_finish = false;
        while let Some(event) = session.next_event().await {
            match event {
                ProgressEvent::SourceStarted { source_name } => {
                    assert_eq!(source_name, "grants-portal");
                    saw_start = true;
                }
                ProgressEvent::SourceFinished { outcome } => {
                    assert!(saw_start);
                    assert_eq!(outcome.persisted, 1);
                }
                ProgressEvent::RunFinished { state } => {
                    assert_eq!(state, RunState::Completed);
                    saw_finish = true;
                }
            }
        }
        assert!(saw_finish);
        session.wait().await.unwrap();
    }
}
