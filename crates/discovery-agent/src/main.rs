use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal::unix::SignalKind;
use tokio::time::{self, MissedTickBehavior};

use discovery_agent::{AgentConfig, AgentMetrics, JsonFileStore};
use listing_client::RentCastClient;
use notification_service::NotificationService;
use risk_advisor::LlmRiskAdvisor;
use valuation_core::{RiskAdvisor, StateStore};
use valuation_engine::{
    CycleSettings, DiscoveryCycle, EngineConfig, EngineState, HistoricalCorpus, ValuationPipeline,
};

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Load .env, init tracing
    dotenvy::dotenv().ok();

    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    }

    // Panic hook: log panic info before crashing
    std::panic::set_hook(Box::new(|info| {
        eprintln!("PANIC: {info}");
        tracing::error!("PANIC: {info}");
    }));

    tracing::info!("Starting HomeAlpha discovery agent");

    // 2. Load configuration
    let config = AgentConfig::from_env().context("invalid agent configuration")?;
    let engine_config = EngineConfig::from_env().context("invalid engine configuration")?;
    tracing::info!("Configuration loaded and validated");
    tracing::info!("  Search: {}, {}", config.search_city, config.search_state);
    tracing::info!("  Scan interval: {} seconds", config.scan_interval_seconds);
    tracing::info!("  External timeout: {}s", config.external_timeout_seconds);
    tracing::info!(
        "  Mortgage rate: {:.2}% | Fee capitalization: x{}",
        engine_config.annual_interest_rate * 100.0,
        engine_config.fee_capitalization_multiplier
    );
    tracing::info!(
        "  Blend: {:.2} global / {:.2} local | Top N: {} | Gem threshold: {:.1}%",
        engine_config.blend_global_weight,
        engine_config.blend_local_weight,
        engine_config.top_n,
        engine_config.gem_threshold_pct
    );

    // 3. Load history and train the valuation models
    let corpus = HistoricalCorpus::from_csv_path(&config.historical_data_path).with_context(|| {
        format!(
            "failed to load historical corpus from {}",
            config.historical_data_path.display()
        )
    })?;
    tracing::info!("Corpus starts {}", corpus.start_date());

    let pipeline = ValuationPipeline::train(&corpus, &engine_config, config.external_timeout())
        .context("model training failed")?;
    tracing::info!(
        "Models trained ({} neighborhood models)",
        pipeline.blender().models().local_model_count()
    );

    // 4. Collaborators
    let source = Arc::new(RentCastClient::new(config.listing_config()));

    let advisor: Option<Arc<dyn RiskAdvisor>> = if config.risk_advisor_active() {
        let advisor: Arc<dyn RiskAdvisor> = Arc::new(LlmRiskAdvisor::new(config.advisor_config()));
        tracing::info!("Risk adjustment enabled ({})", advisor.advisor_name());
        Some(advisor)
    } else {
        if config.enable_risk_adjustment {
            tracing::warn!("ENABLE_RISK_ADJUSTMENT is set but OPENAI_API_KEY is missing, skipping risk adjustment");
        }
        None
    };

    let notifier = Arc::new(NotificationService::new(&config.notification_config()));

    let store = Arc::new(
        JsonFileStore::open(&config.state_dir)
            .with_context(|| format!("cannot open state dir {}", config.state_dir.display()))?,
    );
    tracing::info!("State directory: {}", store.dir().display());

    // 5. Restore persisted state
    let mut agent_metrics = AgentMetrics::new(config.metrics_log_interval_cycles);
    match store.load_metrics().await {
        Ok(Some(saved)) => agent_metrics.restore_from_json(&saved),
        Ok(None) => {}
        Err(e) => tracing::warn!("Ignoring unreadable metrics: {}", e),
    }

    let mut state = EngineState::rehydrate(store.as_ref()).await;

    let cycle = DiscoveryCycle::new(
        Arc::new(pipeline),
        source,
        advisor,
        notifier,
        store.clone(),
        CycleSettings {
            top_n: engine_config.top_n,
            gem_threshold_pct: engine_config.gem_threshold_pct,
            external_timeout: config.external_timeout(),
        },
    );

    tracing::info!(
        "Agent is now running. Scanning every {}s. Press Ctrl+C to stop.",
        config.scan_interval_seconds
    );

    // Main loop with graceful shutdown (SIGINT + SIGTERM)
    let mut interval = time::interval(config.scan_interval());
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut sigterm = tokio::signal::unix::signal(SignalKind::terminate())?;
    let shutdown = async {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received SIGINT");
            }
            _ = sigterm.recv() => {
                tracing::info!("Received SIGTERM");
            }
        }
    };
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let cycle_start = AgentMetrics::start_timer();
                tracing::info!("Starting discovery cycle #{}", agent_metrics.cycles_run + 1);

                let (next, result) = cycle.run(std::mem::take(&mut state)).await;
                state = next;

                match result {
                    Ok(report) => {
                        match &report.top {
                            Some(top) => tracing::info!(
                                "Cycle done: {} evaluated, {} gems, top {} at {:.1}%",
                                report.evaluated,
                                report.gems,
                                top.house_id,
                                top.undervaluation_pct
                            ),
                            None => tracing::info!("Cycle done: no candidates"),
                        }
                        agent_metrics.record_cycle(&report, cycle_start);
                    }
                    Err(e) => {
                        tracing::error!("Error in discovery cycle: {}", e);
                        agent_metrics.record_failure(cycle_start);
                    }
                }

                // Persist metrics after each cycle
                if let Err(e) = store.save_metrics(&agent_metrics.to_json()).await {
                    tracing::debug!("Failed to persist metrics: {}", e);
                }
            }
            _ = &mut shutdown => {
                tracing::info!("Shutdown signal received, exiting gracefully...");

                // Final metrics persist
                store.save_metrics(&agent_metrics.to_json()).await.ok();
                agent_metrics.log_metrics();
                break;
            }
        }
    }

    tracing::info!("Discovery agent shut down.");
    Ok(())
}
