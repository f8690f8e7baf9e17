//! Valuation & ranking engine: fair-value models, carrying-cost scoring,
//! qualitative risk reweighting and the champion state machine.

pub mod affordability;
pub mod blender;
pub mod champion;
pub mod config;
pub mod corpus;
pub mod cycle;
pub mod financial;
pub mod models;
pub mod pipeline;
pub mod risk;
pub mod training;

pub use blender::{BlendedValuation, ValuationBlender};
pub use champion::{ChampionPhase, ChampionTracker, ChampionUpdate};
pub use config::EngineConfig;
pub use corpus::HistoricalCorpus;
pub use cycle::{CycleReport, CycleSettings, DiscoveryCycle, EngineState};
pub use financial::FinancialCostModel;
pub use pipeline::ValuationPipeline;
pub use risk::RiskAdjuster;
pub use training::{NeighborhoodIndex, NeighborhoodMatch, RegressorSuite, TrainedModelSet};
