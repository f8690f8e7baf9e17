use serde::Serialize;
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::champion::{ChampionTracker, ChampionUpdate};
use crate::pipeline::{gems, ValuationPipeline};
use valuation_core::{
    CandidateEvaluation, CollaboratorOutcome, EventKind, EventNotifier, LeaderboardSnapshot,
    ListingObservation, ListingSource, RiskAdvisor, StateStore, ValuationError,
};

/// Mutable state carried from one cycle to the next. Owned by the daemon loop.
#[derive(Debug, Clone, Default)]
pub struct EngineState {
    pub seen_ids: HashSet<String>,
    pub champion: ChampionTracker,
}

impl EngineState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seen ids start empty on every boot; only the champion is durable.
    pub async fn rehydrate(store: &dyn StateStore) -> Self {
        Self {
            seen_ids: HashSet::new(),
            champion: ChampionTracker::rehydrate(store).await,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CycleSettings {
    pub top_n: usize,
    pub gem_threshold_pct: f64,
    pub external_timeout: Duration,
}

/// Summary of one completed cycle, used for logging and metrics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CycleReport {
    pub fetched: usize,
    pub new_listings: usize,
    pub evaluated: usize,
    pub gems: usize,
    pub fetch_failed: bool,
    pub champion_event: Option<EventKind>,
    pub champion_id: Option<String>,
    pub top: Option<CandidateEvaluation>,
    pub notification_failures: usize,
}

/// One fetch → evaluate → rank → champion → persist → notify pass.
pub struct DiscoveryCycle {
    pipeline: Arc<ValuationPipeline>,
    source: Arc<dyn ListingSource>,
    advisor: Option<Arc<dyn RiskAdvisor>>,
    notifier: Arc<dyn EventNotifier>,
    store: Arc<dyn StateStore>,
    settings: CycleSettings,
}

async fn bounded<T>(
    timeout: Duration,
    what: &str,
    call: impl Future<Output = CollaboratorOutcome<T>>,
) -> CollaboratorOutcome<T> {
    match tokio::time::timeout(timeout, call).await {
        Ok(outcome) => outcome,
        Err(_) => CollaboratorOutcome::failed(format!("{what} timed out after {timeout:?}")),
    }
}

/// Drop repeated ids within one batch, keeping the first occurrence.
fn dedupe(batch: Vec<ListingObservation>) -> Vec<ListingObservation> {
    let mut ids = HashSet::with_capacity(batch.len());
    batch
        .into_iter()
        .filter(|l| ids.insert(l.house_id.clone()))
        .collect()
}

impl DiscoveryCycle {
    pub fn new(
        pipeline: Arc<ValuationPipeline>,
        source: Arc<dyn ListingSource>,
        advisor: Option<Arc<dyn RiskAdvisor>>,
        notifier: Arc<dyn EventNotifier>,
        store: Arc<dyn StateStore>,
        settings: CycleSettings,
    ) -> Self {
        Self {
            pipeline,
            source,
            advisor,
            notifier,
            store,
            settings,
        }
    }

    pub fn settings(&self) -> &CycleSettings {
        &self.settings
    }

    /// Run one cycle. The state is always handed back, even when the cycle
    /// fails part-way, so the loop can carry on with the next tick.
    pub async fn run(&self, mut state: EngineState) -> (EngineState, Result<CycleReport, ValuationError>) {
        let result = self.run_inner(&mut state).await;
        (state, result)
    }

    async fn run_inner(&self, state: &mut EngineState) -> Result<CycleReport, ValuationError> {
        let mut report = CycleReport::default();

        let batch = match bounded(
            self.settings.external_timeout,
            self.source.source_name(),
            self.source.fetch_listings(),
        )
        .await
        {
            CollaboratorOutcome::Ok(batch) => dedupe(batch),
            CollaboratorOutcome::Failed(reason) => {
                tracing::warn!("Listing fetch failed, continuing with empty batch: {}", reason);
                report.fetch_failed = true;
                Vec::new()
            }
        };
        report.fetched = batch.len();

        let pool_ids: HashSet<String> = batch.iter().map(|l| l.house_id.clone()).collect();
        let new_ids: HashSet<String> = pool_ids.difference(&state.seen_ids).cloned().collect();
        report.new_listings = new_ids.len();
        tracing::info!("Fetched {} listings ({} new)", batch.len(), new_ids.len());

        let ranked = self
            .pipeline
            .rank_all_with_risk(&batch, self.settings.top_n, self.advisor.as_deref())
            .await;
        report.evaluated = ranked.len();
        report.top = ranked.first().cloned();

        // The transition only takes effect once it is durable, so a failed
        // write is retried with its event on the next cycle.
        let mut champion = state.champion.clone();
        let update = champion.observe(&ranked, &pool_ids);
        if update.changes_state() {
            if let Err(e) = self.store.save_champion(&champion.state()).await {
                tracing::error!("Champion change not persisted, keeping previous champion: {}", e);
                return Err(e);
            }
        }
        state.champion = champion;
        report.champion_event = update.event().map(|e| e.kind);
        report.champion_id = state.champion.state().champion_house_id;

        if ranked.is_empty() {
            tracing::info!("No candidates this cycle, leaderboard left as is");
        } else {
            let leaderboard: Vec<CandidateEvaluation> =
                ranked.iter().take(self.settings.top_n).cloned().collect();
            self.store
                .save_leaderboard(&LeaderboardSnapshot::new(leaderboard))
                .await?;
        }

        if let ChampionUpdate::Established(event) | ChampionUpdate::Overthrown(event) = &update {
            let outcome = bounded(
                self.settings.external_timeout,
                "champion notification",
                self.notifier.notify_champion(event),
            )
            .await;
            if let CollaboratorOutcome::Failed(reason) = outcome {
                tracing::warn!("Champion notification not delivered: {}", reason);
                report.notification_failures += 1;
            }
        }

        let fresh: Vec<CandidateEvaluation> = ranked
            .iter()
            .filter(|e| new_ids.contains(&e.house_id))
            .cloned()
            .collect();
        let found = gems(&fresh, self.settings.gem_threshold_pct);
        report.gems = found.len();
        if !found.is_empty() {
            tracing::info!("Found {} new gems", found.len());
            let outcome = bounded(
                self.settings.external_timeout,
                "gem notification",
                self.notifier.notify_gems(&found),
            )
            .await;
            if let CollaboratorOutcome::Failed(reason) = outcome {
                tracing::warn!("Gem alert not delivered: {}", reason);
                report.notification_failures += 1;
            }
        }

        state.seen_ids.extend(new_ids);
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::training::tests::{flat_models, observation};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use valuation_core::{ChampionEvent, ChampionState, REASON_CHAMPION_DELISTED, REASON_NEW_ENTRANT};

    struct ScriptedSource(Mutex<VecDeque<CollaboratorOutcome<Vec<ListingObservation>>>>);

    impl ScriptedSource {
        fn new(batches: Vec<CollaboratorOutcome<Vec<ListingObservation>>>) -> Self {
            Self(Mutex::new(batches.into()))
        }
    }

    #[async_trait]
    impl ListingSource for ScriptedSource {
        async fn fetch_listings(&self) -> CollaboratorOutcome<Vec<ListingObservation>> {
            self.0
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(CollaboratorOutcome::Ok(Vec::new()))
        }

        fn source_name(&self) -> &str {
            "scripted"
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        events: Mutex<Vec<ChampionEvent>>,
        gems: Mutex<Vec<Vec<String>>>,
        fail: bool,
    }

    #[async_trait]
    impl EventNotifier for RecordingNotifier {
        async fn notify_champion(&self, event: &ChampionEvent) -> CollaboratorOutcome<()> {
            if self.fail {
                return CollaboratorOutcome::failed("webhook returned 500");
            }
            self.events.lock().unwrap().push(event.clone());
            CollaboratorOutcome::Ok(())
        }

        async fn notify_gems(&self, gems: &[CandidateEvaluation]) -> CollaboratorOutcome<()> {
            if self.fail {
                return CollaboratorOutcome::failed("webhook returned 500");
            }
            self.gems
                .lock()
                .unwrap()
                .push(gems.iter().map(|g| g.house_id.clone()).collect());
            CollaboratorOutcome::Ok(())
        }
    }

    #[derive(Default)]
    struct MemoryStore {
        champion: Mutex<Vec<ChampionState>>,
        leaderboard: Mutex<Option<LeaderboardSnapshot>>,
        champion_attempts: Mutex<usize>,
        /// 1-based champion write that fails once.
        fail_champion_attempt: Option<usize>,
    }

    #[async_trait]
    impl StateStore for MemoryStore {
        async fn load_champion(&self) -> Result<ChampionState, ValuationError> {
            Ok(self.champion.lock().unwrap().last().cloned().unwrap_or_default())
        }

        async fn save_champion(&self, state: &ChampionState) -> Result<(), ValuationError> {
            let attempt = {
                let mut attempts = self.champion_attempts.lock().unwrap();
                *attempts += 1;
                *attempts
            };
            if self.fail_champion_attempt == Some(attempt) {
                return Err(ValuationError::Persistence("disk full".into()));
            }
            self.champion.lock().unwrap().push(state.clone());
            Ok(())
        }

        async fn load_leaderboard(&self) -> Result<Option<LeaderboardSnapshot>, ValuationError> {
            Ok(self.leaderboard.lock().unwrap().clone())
        }

        async fn save_leaderboard(&self, snapshot: &LeaderboardSnapshot) -> Result<(), ValuationError> {
            *self.leaderboard.lock().unwrap() = Some(snapshot.clone());
            Ok(())
        }

        async fn save_metrics(&self, _: &serde_json::Value) -> Result<(), ValuationError> {
            Ok(())
        }

        async fn load_metrics(&self) -> Result<Option<serde_json::Value>, ValuationError> {
            Ok(None)
        }
    }

    /// Every listing is valued at 120k, so price alone sets the ranking.
    fn listing(id: &str, price: f64) -> ListingObservation {
        observation(id, 1, 1500.0, 0.0, (2025, 6, 1), price)
    }

    fn cycle(
        batches: Vec<CollaboratorOutcome<Vec<ListingObservation>>>,
        notifier: Arc<RecordingNotifier>,
        store: Arc<MemoryStore>,
    ) -> DiscoveryCycle {
        let pipeline =
            ValuationPipeline::from_config(flat_models(120_000.0), &EngineConfig::default(), Duration::from_secs(1));
        DiscoveryCycle::new(
            Arc::new(pipeline),
            Arc::new(ScriptedSource::new(batches)),
            None,
            notifier,
            store,
            CycleSettings {
                top_n: 10,
                gem_threshold_pct: 10.0,
                external_timeout: Duration::from_secs(1),
            },
        )
    }

    #[tokio::test]
    async fn test_champion_events_across_cycles() {
        let notifier = Arc::new(RecordingNotifier::default());
        let store = Arc::new(MemoryStore::default());
        let runner = cycle(
            vec![
                CollaboratorOutcome::Ok(vec![listing("A", 100_000.0), listing("B", 110_000.0)]),
                CollaboratorOutcome::Ok(vec![listing("A", 100_000.0), listing("B", 90_000.0)]),
                CollaboratorOutcome::Ok(vec![listing("B", 90_000.0)]),
                CollaboratorOutcome::Ok(vec![listing("A", 80_000.0)]),
            ],
            notifier.clone(),
            store.clone(),
        );

        let mut state = EngineState::new();
        let mut kinds = Vec::new();
        for _ in 0..4 {
            let (next, result) = runner.run(state).await;
            state = next;
            kinds.push(result.unwrap().champion_event);
        }

        assert_eq!(
            kinds,
            vec![
                Some(EventKind::Established),
                Some(EventKind::Overthrown),
                None,
                Some(EventKind::Overthrown)
            ]
        );
        let events = notifier.events.lock().unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(events[1].reason, REASON_NEW_ENTRANT);
        assert_eq!(events[2].reason, REASON_CHAMPION_DELISTED);

        // Holding cycle skips the champion write
        let saves = store.champion.lock().unwrap();
        assert_eq!(saves.len(), 3);
        assert_eq!(saves.last().unwrap(), &ChampionState::holding("A"));
    }

    #[tokio::test]
    async fn test_failed_champion_write_is_retried_with_its_event() {
        let notifier = Arc::new(RecordingNotifier::default());
        let store = Arc::new(MemoryStore {
            fail_champion_attempt: Some(2),
            ..Default::default()
        });
        let runner = cycle(
            vec![
                CollaboratorOutcome::Ok(vec![listing("A", 100_000.0), listing("B", 110_000.0)]),
                CollaboratorOutcome::Ok(vec![listing("A", 100_000.0), listing("B", 90_000.0)]),
                CollaboratorOutcome::Ok(vec![listing("A", 100_000.0), listing("B", 90_000.0)]),
            ],
            notifier.clone(),
            store.clone(),
        );

        let (state, result) = runner.run(EngineState::new()).await;
        assert_eq!(result.unwrap().champion_event, Some(EventKind::Established));

        let (state, result) = runner.run(state).await;
        assert!(matches!(result, Err(ValuationError::Persistence(_))));
        assert_eq!(state.champion.state(), ChampionState::holding("A"));
        assert_eq!(notifier.events.lock().unwrap().len(), 1);

        let (state, result) = runner.run(state).await;
        let report = result.unwrap();
        assert_eq!(report.champion_event, Some(EventKind::Overthrown));
        assert_eq!(state.champion.state(), ChampionState::holding("B"));

        let events = notifier.events.lock().unwrap();
        let ids: Vec<&str> = events.iter().map(|e| e.candidate.house_id.as_str()).collect();
        assert_eq!(ids, vec!["A", "B"]);
        assert_eq!(events[1].previous_champion_id.as_deref(), Some("A"));
        assert_eq!(
            store.champion.lock().unwrap().last(),
            Some(&ChampionState::holding("B"))
        );
    }

    #[tokio::test]
    async fn test_gems_only_for_newly_seen() {
        let notifier = Arc::new(RecordingNotifier::default());
        let store = Arc::new(MemoryStore::default());
        let runner = cycle(
            vec![
                // A 20%, B ~9%
                CollaboratorOutcome::Ok(vec![listing("A", 100_000.0), listing("B", 110_000.0)]),
                // B now 33% but already seen; C is new at 50%
                CollaboratorOutcome::Ok(vec![
                    listing("A", 100_000.0),
                    listing("B", 90_000.0),
                    listing("C", 80_000.0),
                ]),
            ],
            notifier.clone(),
            store,
        );

        let (state, first) = runner.run(EngineState::new()).await;
        assert_eq!(first.unwrap().gems, 1);
        let (state, second) = runner.run(state).await;
        let second = second.unwrap();
        assert_eq!(second.new_listings, 1);
        assert_eq!(second.gems, 1);
        assert_eq!(state.seen_ids.len(), 3);

        let gems = notifier.gems.lock().unwrap();
        assert_eq!(*gems, vec![vec!["A".to_string()], vec!["C".to_string()]]);
    }

    #[tokio::test]
    async fn test_fetch_failure_is_an_empty_cycle() {
        let notifier = Arc::new(RecordingNotifier::default());
        let store = Arc::new(MemoryStore::default());
        let runner = cycle(
            vec![
                CollaboratorOutcome::Ok(vec![listing("A", 100_000.0)]),
                CollaboratorOutcome::failed("HTTP 503"),
            ],
            notifier,
            store.clone(),
        );

        let (state, _) = runner.run(EngineState::new()).await;
        let (state, result) = runner.run(state).await;
        let report = result.unwrap();

        assert!(report.fetch_failed);
        assert_eq!(report.evaluated, 0);
        assert_eq!(report.champion_event, None);
        assert_eq!(report.champion_id.as_deref(), Some("A"));
        assert_eq!(state.champion.state(), ChampionState::holding("A"));
        // Last good leaderboard survives an empty cycle
        let leaderboard = store.leaderboard.lock().unwrap().clone().unwrap();
        assert_eq!(leaderboard.entries[0].house_id, "A");
    }

    #[tokio::test]
    async fn test_notification_failure_does_not_fail_cycle() {
        let notifier = Arc::new(RecordingNotifier {
            fail: true,
            ..Default::default()
        });
        let store = Arc::new(MemoryStore::default());
        let runner = cycle(
            vec![CollaboratorOutcome::Ok(vec![listing("A", 100_000.0)])],
            notifier,
            store.clone(),
        );

        let (state, result) = runner.run(EngineState::new()).await;
        let report = result.unwrap();
        assert_eq!(report.notification_failures, 2);
        assert_eq!(state.champion.state(), ChampionState::holding("A"));
        assert_eq!(store.champion.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_ids_in_batch_are_collapsed() {
        let notifier = Arc::new(RecordingNotifier::default());
        let store = Arc::new(MemoryStore::default());
        let runner = cycle(
            vec![CollaboratorOutcome::Ok(vec![
                listing("A", 100_000.0),
                listing("A", 50_000.0),
            ])],
            notifier,
            store,
        );
        let (_, result) = runner.run(EngineState::new()).await;
        let report = result.unwrap();
        assert_eq!(report.fetched, 1);
        assert_eq!(report.top.unwrap().price, 100_000.0);
    }
}
