//! affordability-report: check the latest leaderboard against a buyer profile.
//!
//! Reads `leaderboard.json` from the agent's state directory and prints which
//! candidates fit the buyer's DTI limit today, and how long it takes to save
//! the FHA down payment for each of them.
//!
//! Usage:
//!   cargo run -p discovery-agent --bin affordability-report
//!   cargo run -p discovery-agent --bin affordability-report -- --state-dir ./state --json

use anyhow::{Context, Result};

use discovery_agent::JsonFileStore;
use valuation_core::StateStore;
use valuation_engine::affordability::{
    check_affordability, savings_timeline, viable_homes, BuyerProfile,
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "affordability_report=info,valuation_engine=warn".into()),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let as_json = args.iter().any(|a| a == "--json");
    let state_dir = args
        .iter()
        .position(|a| a == "--state-dir")
        .and_then(|i| args.get(i + 1))
        .cloned()
        .or_else(|| std::env::var("STATE_DIR").ok())
        .unwrap_or_else(|| "state".to_string());

    let profile = BuyerProfile::from_env().context("invalid buyer profile")?;
    let store = JsonFileStore::open(&state_dir)?;
    let snapshot = store
        .load_leaderboard()
        .await
        .context("failed to read leaderboard")?
        .with_context(|| {
            format!(
                "no leaderboard at {} yet, run the discovery agent first",
                store.leaderboard_path().display()
            )
        })?;

    let viable = viable_homes(&snapshot.entries, &profile);
    let timeline = savings_timeline(&snapshot.entries, &profile);

    if as_json {
        let report = serde_json::json!({
            "generated_at": snapshot.generated_at,
            "profile": profile,
            "viable": viable,
            "savings_timeline": timeline,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let baseline = check_affordability(0.0, profile.yearly_salary, profile.max_down_payment);
    println!(
        "Leaderboard from {} ({} candidates)",
        snapshot.generated_at.format("%Y-%m-%d %H:%M UTC"),
        snapshot.entries.len()
    );
    println!(
        "Salary ${:.0}/yr | Max DTI payment ${:.2}/mo | Cash ${:.0} | Price cap ${:.0}",
        profile.yearly_salary,
        baseline.max_allowable_dti_payment,
        profile.max_down_payment,
        profile.price_cap
    );
    println!();

    if viable.is_empty() {
        println!("No candidates fit the price cap and DTI limit.");
    } else {
        println!("Viable today:");
        for home in &viable {
            println!(
                "  {:<40} ${:>10.0}  {:>5.1}%  ${:>8.2}/mo  DTI {:>4.1}%  3% down ${:.0}",
                home.address,
                home.price,
                home.undervaluation_pct,
                home.total_monthly_cost,
                home.dti_pct,
                home.conv_down_payment
            );
        }
    }
    println!();

    println!(
        "Savings timeline (3.5% FHA down, ${:.0}/mo saved):",
        profile.monthly_savings
    );
    for target in &timeline {
        let wait = if target.months_to_save == 0.0 {
            "ready now".to_string()
        } else if target.months_to_save.is_finite() {
            format!("{:.1} months", target.months_to_save)
        } else {
            "never at current savings".to_string()
        };
        println!(
            "  {:<40} ${:>10.0}  need ${:>7.0}  short ${:>7.0}  {:<24}  return on cash {:.0}%",
            target.address,
            target.price,
            target.required_down,
            target.shortfall,
            wait,
            target.return_on_cash_pct
        );
    }

    Ok(())
}
