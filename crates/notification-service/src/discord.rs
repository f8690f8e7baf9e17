use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

use crate::{Alert, AlertType, NotificationChannel, NotificationError};
use valuation_core::EventKind;

const GEM_COLOR: u32 = 0x58b9ff;
const ESTABLISHED_COLOR: u32 = 0x00ff00;
const OVERTHROWN_COLOR: u32 = 0xff6600;

/// Whole-dollar amount with thousands separators, e.g. `$1,629,000`.
pub fn format_usd(amount: f64) -> String {
    let rounded = amount.round();
    let sign = if rounded < 0.0 { "-" } else { "" };
    let digits = format!("{:.0}", rounded.abs());
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("{sign}${grouped}")
}

fn field(name: &str, value: String, inline: bool) -> Value {
    json!({ "name": name, "value": value, "inline": inline })
}

/// Build the webhook payload for an alert.
pub(crate) fn render(alert: &Alert, username: &str) -> Value {
    let c = &alert.candidate;
    let color = match &alert.alert_type {
        AlertType::Gem => GEM_COLOR,
        AlertType::Champion { kind, .. } => match kind {
            EventKind::Established | EventKind::Holding => ESTABLISHED_COLOR,
            EventKind::Overthrown => OVERTHROWN_COLOR,
        },
    };

    let mut fields = vec![
        field("Address", c.address.clone(), false),
        field("Listed Price", format_usd(c.price), true),
        field("AI Fair Value", format_usd(c.predicted_price), true),
        field("Alpha Score", format!("{:.1}%", c.undervaluation_pct), true),
        field("Est. Mortgage", format!("{}/mo", format_usd(c.monthly_mortgage)), true),
        field("HOA Fee", format!("{}/mo", format_usd(c.recurring_fee)), true),
        field(
            "TOTAL Carrying Cost",
            format!("**{}/mo**", format_usd(c.total_monthly_cost)),
            true,
        ),
    ];
    if let (Some(multiplier), Some(reasoning)) = (c.risk_multiplier, c.risk_reasoning.as_ref()) {
        fields.push(field("Risk", format!("x{multiplier:.2}: {reasoning}"), false));
    }

    let content = match &alert.alert_type {
        AlertType::Gem => format!(
            "**New Gem Alert** in {}! ({} for {})",
            c.neighborhood_name,
            c.address,
            format_usd(c.price)
        ),
        AlertType::Champion { reason, .. } => format!("**Champion update**: {reason}"),
    };

    json!({
        "username": username,
        "content": content,
        "embeds": [{
            "title": alert.title,
            "description": alert.message,
            "color": color,
            "fields": fields,
            "footer": { "text": "Undervalued Home Discovery Engine" },
            "timestamp": alert.timestamp.to_rfc3339(),
        }]
    })
}

/// Discord webhook notifier.
pub struct DiscordWebhookNotifier {
    webhook_url: String,
    username: String,
    client: Client,
}

impl DiscordWebhookNotifier {
    pub fn new(webhook_url: String, username: String, timeout: Duration) -> Result<Self, NotificationError> {
        if webhook_url.trim().is_empty() {
            return Err(NotificationError::Config("empty webhook URL".into()));
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NotificationError::Config(e.to_string()))?;
        Ok(Self {
            webhook_url,
            username,
            client,
        })
    }
}

#[async_trait]
impl NotificationChannel for DiscordWebhookNotifier {
    async fn send(&self, alert: &Alert) -> Result<(), NotificationError> {
        let payload = render(alert, &self.username);

        let response = self
            .client
            .post(&self.webhook_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| NotificationError::Discord(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(NotificationError::Discord(format!("HTTP {status}: {body}")));
        }

        tracing::debug!("Discord notification sent for {}", alert.candidate.house_id);
        Ok(())
    }

    fn name(&self) -> &str {
        "discord-webhook"
    }
}
