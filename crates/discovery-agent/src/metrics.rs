use std::time::Instant;

use valuation_engine::CycleReport;

/// Run counters for the discovery daemon.
/// Persisted after every cycle and restored on boot.
#[derive(Debug, Default)]
pub struct AgentMetrics {
    pub cycles_run: u64,
    pub cycles_failed: u64,
    pub fetch_failures: u64,
    pub listings_fetched: u64,
    pub new_listings: u64,
    pub candidates_evaluated: u64,
    pub gems_found: u64,
    pub champion_changes: u64,
    pub notification_failures: u64,

    // Last cycle
    pub last_total_duration_ms: u64,
    pub last_top_pct: Option<f64>,

    log_interval_cycles: u64,
}

impl AgentMetrics {
    pub fn new(log_interval_cycles: u64) -> Self {
        Self {
            log_interval_cycles,
            ..Self::default()
        }
    }

    pub fn start_timer() -> Instant {
        Instant::now()
    }

    pub fn record_cycle(&mut self, report: &CycleReport, cycle_start: Instant) {
        self.listings_fetched += report.fetched as u64;
        self.new_listings += report.new_listings as u64;
        self.candidates_evaluated += report.evaluated as u64;
        self.gems_found += report.gems as u64;
        self.notification_failures += report.notification_failures as u64;
        if report.fetch_failed {
            self.fetch_failures += 1;
        }
        if report.champion_event.is_some() {
            self.champion_changes += 1;
        }
        self.last_top_pct = report.top.as_ref().map(|t| t.undervaluation_pct);
        self.finish_cycle(cycle_start);
    }

    /// A cycle that returned an error still counts as run.
    pub fn record_failure(&mut self, cycle_start: Instant) {
        self.cycles_failed += 1;
        self.finish_cycle(cycle_start);
    }

    fn finish_cycle(&mut self, cycle_start: Instant) {
        self.last_total_duration_ms = cycle_start.elapsed().as_millis() as u64;
        self.cycles_run += 1;

        if self.log_interval_cycles > 0 && self.cycles_run % self.log_interval_cycles == 0 {
            self.log_metrics();
        }
    }

    /// Share of newly seen listings that alerted as gems (0-100%).
    pub fn gem_rate(&self) -> f64 {
        if self.new_listings == 0 {
            return 0.0;
        }
        (self.gems_found as f64 / self.new_listings as f64) * 100.0
    }

    /// Emit structured telemetry via tracing
    pub fn log_metrics(&self) {
        tracing::info!(
            cycles = self.cycles_run,
            cycles_failed = self.cycles_failed,
            fetch_failures = self.fetch_failures,
            listings_fetched = self.listings_fetched,
            new_listings = self.new_listings,
            candidates_evaluated = self.candidates_evaluated,
            gems_found = self.gems_found,
            gem_rate = format!("{:.1}%", self.gem_rate()),
            champion_changes = self.champion_changes,
            notification_failures = self.notification_failures,
            last_top_pct = self.last_top_pct.map(|p| format!("{p:.1}%")).unwrap_or_default(),
            last_cycle_ms = self.last_total_duration_ms,
            "Agent metrics summary"
        );
    }

    /// Serialize counters for state persistence
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "cycles_run": self.cycles_run,
            "cycles_failed": self.cycles_failed,
            "fetch_failures": self.fetch_failures,
            "listings_fetched": self.listings_fetched,
            "new_listings": self.new_listings,
            "candidates_evaluated": self.candidates_evaluated,
            "gems_found": self.gems_found,
            "champion_changes": self.champion_changes,
            "notification_failures": self.notification_failures,
        })
    }

    /// Restore counters from persisted JSON. Unknown or missing keys are ignored.
    pub fn restore_from_json(&mut self, json: &serde_json::Value) {
        let counters: [(&str, &mut u64); 9] = [
            ("cycles_run", &mut self.cycles_run),
            ("cycles_failed", &mut self.cycles_failed),
            ("fetch_failures", &mut self.fetch_failures),
            ("listings_fetched", &mut self.listings_fetched),
            ("new_listings", &mut self.new_listings),
            ("candidates_evaluated", &mut self.candidates_evaluated),
            ("gems_found", &mut self.gems_found),
            ("champion_changes", &mut self.champion_changes),
            ("notification_failures", &mut self.notification_failures),
        ];
        for (key, slot) in counters {
            if let Some(v) = json.get(key).and_then(|v| v.as_u64()) {
                *slot = v;
            }
        }
        tracing::info!(
            "Restored metrics from persisted state (cycles={})",
            self.cycles_run
        );
    }
}
