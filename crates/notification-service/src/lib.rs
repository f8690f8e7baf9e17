mod discord;
mod log_channel;

pub use discord::{format_usd, DiscordWebhookNotifier};
pub use log_channel::LogChannel;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use valuation_core::{CandidateEvaluation, ChampionEvent, CollaboratorOutcome, EventKind, EventNotifier};

/// Alert types that trigger notifications.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AlertType {
    Champion {
        kind: EventKind,
        reason: String,
        previous_champion_id: Option<String>,
    },
    Gem,
}

/// A notification alert to be dispatched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub alert_type: AlertType,
    pub candidate: CandidateEvaluation,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub title: String,
    pub message: String,
}

impl Alert {
    pub fn champion(event: &ChampionEvent) -> Self {
        let c = &event.candidate;
        let title = match event.kind {
            EventKind::Established => format!("New Champion: {:.1}% Undervalued", c.undervaluation_pct),
            EventKind::Overthrown => format!("Champion Dethroned: {:.1}% Undervalued", c.undervaluation_pct),
            EventKind::Holding => format!("Champion Holding: {:.1}% Undervalued", c.undervaluation_pct),
        };
        let message = match &event.previous_champion_id {
            Some(prev) => format!("{} ({}), previous champion {}", c.address, event.reason, prev),
            None => format!("{} ({})", c.address, event.reason),
        };
        Self {
            alert_type: AlertType::Champion {
                kind: event.kind,
                reason: event.reason.clone(),
                previous_champion_id: event.previous_champion_id.clone(),
            },
            candidate: c.clone(),
            timestamp: chrono::Utc::now(),
            title,
            message,
        }
    }

    pub fn gem(candidate: &CandidateEvaluation) -> Self {
        Self {
            alert_type: AlertType::Gem,
            candidate: candidate.clone(),
            timestamp: chrono::Utc::now(),
            title: format!("New High-Alpha Gem: {:.1}% Undervalued", candidate.undervaluation_pct),
            message: format!(
                "Found a new undervalued property in {}: {} for {}",
                candidate.neighborhood_name,
                candidate.address,
                format_usd(candidate.price)
            ),
        }
    }
}

/// Trait for notification channels.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    async fn send(&self, alert: &Alert) -> Result<(), NotificationError>;
    fn name(&self) -> &str;
}

/// Errors from the notification system.
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("Discord webhook error: {0}")]
    Discord(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Configuration for the notification service.
#[derive(Debug, Clone)]
pub struct NotificationConfig {
    pub discord_webhook_url: Option<String>,
    pub username: String,
    pub timeout: Duration,
    /// Pause between consecutive webhook posts.
    pub send_pause: Duration,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            discord_webhook_url: None,
            username: "HomeAlpha Scanner".to_string(),
            timeout: Duration::from_secs(10),
            send_pause: Duration::from_secs(1),
        }
    }
}

/// Dispatches alerts to all configured channels.
pub struct NotificationService {
    channels: Arc<Vec<Box<dyn NotificationChannel>>>,
    send_pause: Duration,
}

impl NotificationService {
    pub fn new(config: &NotificationConfig) -> Self {
        let mut channels: Vec<Box<dyn NotificationChannel>> = Vec::new();

        if let Some(ref webhook_url) = config.discord_webhook_url {
            match DiscordWebhookNotifier::new(webhook_url.clone(), config.username.clone(), config.timeout) {
                Ok(notifier) => {
                    channels.push(Box::new(notifier));
                    tracing::info!("Discord webhook notifications enabled");
                }
                Err(e) => tracing::warn!("Failed to initialize Discord notifier: {}", e),
            }
        }

        if channels.is_empty() {
            tracing::info!("No webhook configured (set DISCORD_WEBHOOK_URL), alerts go to the log");
            channels.push(Box::new(LogChannel));
        }

        Self {
            channels: Arc::new(channels),
            send_pause: config.send_pause,
        }
    }

    pub fn with_channels(channels: Vec<Box<dyn NotificationChannel>>, send_pause: Duration) -> Self {
        Self {
            channels: Arc::new(channels),
            send_pause,
        }
    }

    pub fn channel_names(&self) -> Vec<&str> {
        self.channels.iter().map(|c| c.name()).collect()
    }

    /// Send alert to all channels, awaiting completion. Returns the number of
    /// channels that failed.
    pub async fn send_alert_async(&self, alert: &Alert) -> usize {
        let mut failures = 0;
        for channel in self.channels.iter() {
            match channel.send(alert).await {
                Ok(()) => tracing::debug!("Sent notification via {}", channel.name()),
                Err(e) => {
                    failures += 1;
                    tracing::warn!("Failed to send notification via {}: {}", channel.name(), e)
                }
            }
        }
        failures
    }
}

#[async_trait]
impl EventNotifier for NotificationService {
    async fn notify_champion(&self, event: &ChampionEvent) -> CollaboratorOutcome<()> {
        match self.send_alert_async(&Alert::champion(event)).await {
            0 => CollaboratorOutcome::Ok(()),
            n => CollaboratorOutcome::failed(format!("{n} channel(s) failed")),
        }
    }

    async fn notify_gems(&self, gems: &[CandidateEvaluation]) -> CollaboratorOutcome<()> {
        let mut failures = 0;
        for (i, gem) in gems.iter().enumerate() {
            if i > 0 && !self.send_pause.is_zero() {
                tokio::time::sleep(self.send_pause).await;
            }
            failures += self.send_alert_async(&Alert::gem(gem)).await;
        }
        if failures == 0 {
            CollaboratorOutcome::Ok(())
        } else {
            CollaboratorOutcome::failed(format!("{failures} gem alert(s) failed"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use valuation_core::REASON_NEW_ENTRANT;

    struct Recording(Arc<Mutex<Vec<String>>>);

    #[async_trait]
    impl NotificationChannel for Recording {
        async fn send(&self, alert: &Alert) -> Result<(), NotificationError> {
            self.0.lock().unwrap().push(alert.title.clone());
            Ok(())
        }

        fn name(&self) -> &str {
            "recording"
        }
    }

    struct Broken;

    #[async_trait]
    impl NotificationChannel for Broken {
        async fn send(&self, _: &Alert) -> Result<(), NotificationError> {
            Err(NotificationError::Discord("HTTP 500".into()))
        }

        fn name(&self) -> &str {
            "broken"
        }
    }

    pub(crate) fn candidate() -> CandidateEvaluation {
        CandidateEvaluation {
            house_id: "TPA_REAL_009".into(),
            address: "4613 N Country Hills Ct".into(),
            neighborhood_name: "33566".into(),
            price: 345_000.0,
            recurring_fee: 25.0,
            predicted_price: 420_000.0,
            monthly_mortgage: 2068.45,
            monthly_tax_ins: 0.0,
            total_monthly_cost: 2093.45,
            capitalized_cost: 3_750.0,
            fee_adjusted_value: 416_250.0,
            undervaluation_amount: 71_250.0,
            undervaluation_pct: 20.62,
            risk_multiplier: None,
            risk_reasoning: None,
            property_type: None,
        }
    }

    #[test]
    fn test_champion_alert_text() {
        let event = ChampionEvent {
            kind: EventKind::Overthrown,
            candidate: candidate(),
            reason: REASON_NEW_ENTRANT.into(),
            previous_champion_id: Some("TPA_REAL_001".into()),
        };
        let alert = Alert::champion(&event);
        assert_eq!(alert.title, "Champion Dethroned: 20.6% Undervalued");
        assert!(alert.message.contains("previous champion TPA_REAL_001"));
    }

    #[test]
    fn test_no_webhook_uses_log_channel() {
        let service = NotificationService::new(&NotificationConfig::default());
        assert_eq!(service.channel_names(), vec!["log"]);
    }

    #[tokio::test]
    async fn test_gems_fan_out_to_channels() {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let service = NotificationService::with_channels(
            vec![Box::new(Recording(sent.clone()))],
            Duration::ZERO,
        );
        let outcome = service.notify_gems(&[candidate(), candidate()]).await;
        assert!(outcome.is_ok());
        assert_eq!(sent.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_channel_failure_is_reported() {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let service = NotificationService::with_channels(
            vec![Box::new(Broken), Box::new(Recording(sent.clone()))],
            Duration::ZERO,
        );
        let event = ChampionEvent {
            kind: EventKind::Established,
            candidate: candidate(),
            reason: "first champion established".into(),
            previous_champion_id: None,
        };
        let outcome = service.notify_champion(&event).await;
        assert!(!outcome.is_ok());
        // Other channels still get the alert
        assert_eq!(sent.lock().unwrap().len(), 1);
    }
}
