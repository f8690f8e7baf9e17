use async_trait::async_trait;

use crate::{
    CandidateEvaluation, ChampionEvent, ChampionState, CollaboratorOutcome, LeaderboardSnapshot,
    ListingObservation, RawRiskAssessment, ValuationError,
};

/// Produces one normalized batch of live listings per poll.
#[async_trait]
pub trait ListingSource: Send + Sync {
    async fn fetch_listings(&self) -> CollaboratorOutcome<Vec<ListingObservation>>;

    fn source_name(&self) -> &str;
}

/// Qualitative condition/risk assessment for a single listing.
#[async_trait]
pub trait RiskAdvisor: Send + Sync {
    async fn assess(&self, listing: &ListingObservation) -> CollaboratorOutcome<RawRiskAssessment>;

    fn advisor_name(&self) -> &str;
}

/// Best-effort delivery of champion events and gem alerts.
#[async_trait]
pub trait EventNotifier: Send + Sync {
    async fn notify_champion(&self, event: &ChampionEvent) -> CollaboratorOutcome<()>;

    async fn notify_gems(&self, gems: &[CandidateEvaluation]) -> CollaboratorOutcome<()>;
}

/// Durable key-value storage for champion identity, leaderboard snapshots and
/// daemon counters.
///
/// Implementations must make every save all-or-nothing so an interrupted
/// cycle never leaves a half-written record behind.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Returns `CorruptState` when a record exists but cannot be decoded.
    async fn load_champion(&self) -> Result<ChampionState, ValuationError>;

    async fn save_champion(&self, state: &ChampionState) -> Result<(), ValuationError>;

    async fn load_leaderboard(&self) -> Result<Option<LeaderboardSnapshot>, ValuationError>;

    async fn save_leaderboard(&self, snapshot: &LeaderboardSnapshot) -> Result<(), ValuationError>;

    /// Metrics are stored as an opaque JSON document owned by the caller.
    async fn save_metrics(&self, metrics: &serde_json::Value) -> Result<(), ValuationError>;

    async fn load_metrics(&self) -> Result<Option<serde_json::Value>, ValuationError>;
}
