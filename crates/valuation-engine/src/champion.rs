use std::collections::HashSet;

use valuation_core::{
    CandidateEvaluation, ChampionEvent, ChampionState, EventKind, StateStore, ValuationError,
    REASON_CHAMPION_DELISTED, REASON_FIRST_CHAMPION, REASON_NEW_ENTRANT,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChampionPhase {
    Uninitialized,
    Holding(String),
}

/// Result of feeding one cycle's ranking into the tracker.
#[derive(Debug, Clone, PartialEq)]
pub enum ChampionUpdate {
    Established(ChampionEvent),
    Overthrown(ChampionEvent),
    Holding(String),
    /// Empty ranking; state untouched.
    NoCandidates,
}

impl ChampionUpdate {
    pub fn event(&self) -> Option<&ChampionEvent> {
        match self {
            ChampionUpdate::Established(e) | ChampionUpdate::Overthrown(e) => Some(e),
            ChampionUpdate::Holding(_) | ChampionUpdate::NoCandidates => None,
        }
    }

    pub fn changes_state(&self) -> bool {
        self.event().is_some()
    }
}

/// Debounces per-cycle rankings into champion change events.
#[derive(Debug, Clone)]
pub struct ChampionTracker {
    phase: ChampionPhase,
}

impl Default for ChampionTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ChampionTracker {
    pub fn new() -> Self {
        Self {
            phase: ChampionPhase::Uninitialized,
        }
    }

    pub fn from_state(state: ChampionState) -> Self {
        let phase = match state.champion_house_id {
            Some(id) if !id.trim().is_empty() => ChampionPhase::Holding(id),
            _ => ChampionPhase::Uninitialized,
        };
        Self { phase }
    }

    /// Restore from the store. Unreadable state starts over as uninitialized.
    pub async fn rehydrate(store: &dyn StateStore) -> Self {
        match store.load_champion().await {
            Ok(state) => {
                let tracker = Self::from_state(state);
                if let ChampionPhase::Holding(id) = &tracker.phase {
                    tracing::info!("Restored champion {}", id);
                }
                tracker
            }
            Err(ValuationError::CorruptState(reason)) => {
                tracing::warn!("Champion state is corrupt, starting uninitialized: {}", reason);
                Self::new()
            }
            Err(e) => {
                tracing::warn!("Could not load champion state, starting uninitialized: {}", e);
                Self::new()
            }
        }
    }

    pub fn phase(&self) -> &ChampionPhase {
        &self.phase
    }

    pub fn state(&self) -> ChampionState {
        match &self.phase {
            ChampionPhase::Uninitialized => ChampionState::default(),
            ChampionPhase::Holding(id) => ChampionState::holding(id.clone()),
        }
    }

    /// Advance the state machine with this cycle's ranking (best first) and
    /// the ids of every listing in the current pool.
    pub fn observe(&mut self, ranked: &[CandidateEvaluation], pool_ids: &HashSet<String>) -> ChampionUpdate {
        let Some(best) = ranked.first() else {
            return ChampionUpdate::NoCandidates;
        };

        let update = match &self.phase {
            ChampionPhase::Uninitialized => {
                tracing::info!(
                    "First champion established: {} ({:.2}%)",
                    best.house_id,
                    best.undervaluation_pct
                );
                ChampionUpdate::Established(ChampionEvent {
                    kind: EventKind::Established,
                    candidate: best.clone(),
                    reason: REASON_FIRST_CHAMPION.to_string(),
                    previous_champion_id: None,
                })
            }
            ChampionPhase::Holding(current) if *current == best.house_id => {
                tracing::info!("Champion {} holding ({:.2}%)", current, best.undervaluation_pct);
                return ChampionUpdate::Holding(current.clone());
            }
            ChampionPhase::Holding(current) => {
                let reason = if pool_ids.contains(current) {
                    REASON_NEW_ENTRANT
                } else {
                    REASON_CHAMPION_DELISTED
                };
                tracing::info!(
                    "Champion overthrown: {} -> {} ({})",
                    current,
                    best.house_id,
                    reason
                );
                ChampionUpdate::Overthrown(ChampionEvent {
                    kind: EventKind::Overthrown,
                    candidate: best.clone(),
                    reason: reason.to_string(),
                    previous_champion_id: Some(current.clone()),
                })
            }
        };

        self.phase = ChampionPhase::Holding(best.house_id.clone());
        update
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::financial::FinancialCostModel;
    use crate::training::tests::observation;
    use async_trait::async_trait;
    use valuation_core::LeaderboardSnapshot;

    fn candidate(id: &str, pct: f64) -> CandidateEvaluation {
        let obs = observation(id, 1, 1500.0, 0.0, (2025, 1, 1), 100_000.0);
        FinancialCostModel::default().evaluate(&obs, 100_000.0 * (1.0 + pct / 100.0))
    }

    fn ids(ranked: &[CandidateEvaluation]) -> HashSet<String> {
        ranked.iter().map(|c| c.house_id.clone()).collect()
    }

    #[test]
    fn test_champion_sequence() {
        let mut tracker = ChampionTracker::new();

        let cycle1 = vec![candidate("A", 12.0), candidate("B", 8.0)];
        let update = tracker.observe(&cycle1, &ids(&cycle1));
        let event = update.event().unwrap();
        assert_eq!(event.kind, EventKind::Established);
        assert_eq!(event.candidate.house_id, "A");

        let cycle2 = vec![candidate("B", 15.0), candidate("A", 12.0)];
        let update = tracker.observe(&cycle2, &ids(&cycle2));
        let event = update.event().unwrap();
        assert_eq!(event.kind, EventKind::Overthrown);
        assert_eq!(event.candidate.house_id, "B");
        assert_eq!(event.reason, REASON_NEW_ENTRANT);
        assert_eq!(event.previous_champion_id.as_deref(), Some("A"));

        let cycle3 = vec![candidate("B", 15.0)];
        let update = tracker.observe(&cycle3, &ids(&cycle3));
        assert_eq!(update, ChampionUpdate::Holding("B".into()));
        assert!(!update.changes_state());

        let cycle4 = vec![candidate("A", 20.0)];
        let update = tracker.observe(&cycle4, &ids(&cycle4));
        let event = update.event().unwrap();
        assert_eq!(event.kind, EventKind::Overthrown);
        assert_eq!(event.candidate.house_id, "A");
        assert_eq!(event.reason, REASON_CHAMPION_DELISTED);
        assert_eq!(tracker.state(), ChampionState::holding("A"));
    }

    #[test]
    fn test_empty_ranking_leaves_state() {
        let mut tracker = ChampionTracker::from_state(ChampionState::holding("A"));
        assert_eq!(tracker.observe(&[], &HashSet::new()), ChampionUpdate::NoCandidates);
        assert_eq!(tracker.phase(), &ChampionPhase::Holding("A".into()));
    }

    #[test]
    fn test_blank_persisted_id_is_uninitialized() {
        let tracker = ChampionTracker::from_state(ChampionState::holding("  "));
        assert_eq!(tracker.phase(), &ChampionPhase::Uninitialized);
    }

    struct CorruptStore;

    #[async_trait]
    impl StateStore for CorruptStore {
        async fn load_champion(&self) -> Result<ChampionState, ValuationError> {
            Err(ValuationError::CorruptState("expected value at line 1".into()))
        }

        async fn save_champion(&self, _: &ChampionState) -> Result<(), ValuationError> {
            Ok(())
        }

        async fn load_leaderboard(&self) -> Result<Option<LeaderboardSnapshot>, ValuationError> {
            Ok(None)
        }

        async fn save_leaderboard(&self, _: &LeaderboardSnapshot) -> Result<(), ValuationError> {
            Ok(())
        }

        async fn save_metrics(&self, _: &serde_json::Value) -> Result<(), ValuationError> {
            Ok(())
        }

        async fn load_metrics(&self) -> Result<Option<serde_json::Value>, ValuationError> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn test_corrupt_state_rehydrates_uninitialized() {
        let tracker = ChampionTracker::rehydrate(&CorruptStore).await;
        assert_eq!(tracker.phase(), &ChampionPhase::Uninitialized);
    }
}
