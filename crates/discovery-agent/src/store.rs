use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::io::AsyncWriteExt;

use valuation_core::{ChampionState, LeaderboardSnapshot, StateStore, ValuationError};

const CHAMPION_FILE: &str = "champion.json";
const LEADERBOARD_FILE: &str = "leaderboard.json";
const METRICS_FILE: &str = "metrics.json";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Corrupt state file {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },
}

impl StoreError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

impl From<StoreError> for ValuationError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Corrupt { .. } => ValuationError::CorruptState(err.to_string()),
            other => ValuationError::Persistence(other.to_string()),
        }
    }
}

/// File-backed state store. Each record lives in its own JSON file under the
/// state directory and is replaced atomically: the new content is written to
/// a sibling temp file, flushed to disk, then renamed over the old one.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    /// Open (and create if needed) the state directory.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn leaderboard_path(&self) -> PathBuf {
        self.dir.join(LEADERBOARD_FILE)
    }

    async fn write_atomic<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<(), StoreError> {
        let path = self.dir.join(name);
        let tmp = self.dir.join(format!(".{name}.tmp"));
        let bytes = serde_json::to_vec_pretty(value)?;

        let mut file = tokio::fs::File::create(&tmp)
            .await
            .map_err(|e| StoreError::io(&tmp, e))?;
        file.write_all(&bytes).await.map_err(|e| StoreError::io(&tmp, e))?;
        file.sync_all().await.map_err(|e| StoreError::io(&tmp, e))?;
        drop(file);

        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| StoreError::io(&path, e))?;
        tracing::debug!("Wrote {}", path.display());
        Ok(())
    }

    /// `Ok(None)` when the file does not exist yet.
    async fn read<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, StoreError> {
        let path = self.dir.join(name);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::io(&path, e)),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| StoreError::Corrupt {
                path,
                reason: e.to_string(),
            })
    }
}

#[async_trait]
impl StateStore for JsonFileStore {
    async fn load_champion(&self) -> Result<ChampionState, ValuationError> {
        Ok(self.read(CHAMPION_FILE).await?.unwrap_or_default())
    }

    async fn save_champion(&self, state: &ChampionState) -> Result<(), ValuationError> {
        Ok(self.write_atomic(CHAMPION_FILE, state).await?)
    }

    async fn load_leaderboard(&self) -> Result<Option<LeaderboardSnapshot>, ValuationError> {
        Ok(self.read(LEADERBOARD_FILE).await?)
    }

    async fn save_leaderboard(&self, snapshot: &LeaderboardSnapshot) -> Result<(), ValuationError> {
        Ok(self.write_atomic(LEADERBOARD_FILE, snapshot).await?)
    }

    async fn save_metrics(&self, metrics: &serde_json::Value) -> Result<(), ValuationError> {
        Ok(self.write_atomic(METRICS_FILE, metrics).await?)
    }

    async fn load_metrics(&self) -> Result<Option<serde_json::Value>, ValuationError> {
        Ok(self.read(METRICS_FILE).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;
    use valuation_core::CandidateEvaluation;

    fn entry(id: &str, pct: f64) -> CandidateEvaluation {
        CandidateEvaluation {
            house_id: id.into(),
            address: "1 Bayshore Blvd".into(),
            neighborhood_name: "South Tampa".into(),
            price: 200_000.0,
            recurring_fee: 0.0,
            predicted_price: 240_000.0,
            monthly_mortgage: 1199.10,
            monthly_tax_ins: 0.0,
            total_monthly_cost: 1199.10,
            capitalized_cost: 0.0,
            fee_adjusted_value: 240_000.0,
            undervaluation_amount: 40_000.0,
            undervaluation_pct: pct,
            risk_multiplier: None,
            risk_reasoning: None,
            property_type: None,
        }
    }

    #[tokio::test]
    async fn test_empty_dir_loads_defaults() {
        let dir = tempdir().unwrap();
        let store = JsonFileStore::open(dir.path().join("state")).unwrap();
        assert_eq!(store.load_champion().await.unwrap(), ChampionState::default());
        assert!(store.load_leaderboard().await.unwrap().is_none());
        assert!(store.load_metrics().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_champion_survives_reopen() {
        let dir = tempdir().unwrap();
        let store = JsonFileStore::open(dir.path()).unwrap();
        store.save_champion(&ChampionState::holding("TPA0042")).await.unwrap();

        let reopened = JsonFileStore::open(dir.path()).unwrap();
        let state = reopened.load_champion().await.unwrap();
        assert_eq!(state.champion_house_id.as_deref(), Some("TPA0042"));

        let raw = std::fs::read_to_string(dir.path().join(CHAMPION_FILE)).unwrap();
        assert!(raw.contains("\"house_id\""));
        assert!(!dir.path().join(".champion.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_leaderboard_is_replaced_wholesale() {
        let dir = tempdir().unwrap();
        let store = JsonFileStore::open(dir.path()).unwrap();
        store
            .save_leaderboard(&LeaderboardSnapshot::new(vec![entry("A", 20.0), entry("B", 15.0)]))
            .await
            .unwrap();
        store
            .save_leaderboard(&LeaderboardSnapshot::new(vec![entry("C", 30.0)]))
            .await
            .unwrap();

        let snapshot = store.load_leaderboard().await.unwrap().unwrap();
        let ids: Vec<_> = snapshot.entries.iter().map(|e| e.house_id.as_str()).collect();
        assert_eq!(ids, vec!["C"]);
    }

    #[tokio::test]
    async fn test_corrupt_champion_is_reported() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(CHAMPION_FILE), "{ not json").unwrap();
        let store = JsonFileStore::open(dir.path()).unwrap();
        assert!(matches!(
            store.load_champion().await,
            Err(ValuationError::CorruptState(_))
        ));
    }

    #[tokio::test]
    async fn test_metrics_round_trip() {
        let dir = tempdir().unwrap();
        let store = JsonFileStore::open(dir.path()).unwrap();
        store.save_metrics(&json!({ "cycles_run": 7 })).await.unwrap();
        let loaded = store.load_metrics().await.unwrap().unwrap();
        assert_eq!(loaded["cycles_run"], json!(7));
    }
}
