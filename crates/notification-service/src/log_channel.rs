use async_trait::async_trait;

use crate::{format_usd, Alert, NotificationChannel, NotificationError};

/// Writes alerts to the tracing log. Used when no webhook is configured.
pub struct LogChannel;

#[async_trait]
impl NotificationChannel for LogChannel {
    async fn send(&self, alert: &Alert) -> Result<(), NotificationError> {
        let c = &alert.candidate;
        tracing::info!(
            house_id = %c.house_id,
            price = %format_usd(c.price),
            fair_value = %format_usd(c.predicted_price),
            monthly = %format_usd(c.total_monthly_cost),
            "{}: {}",
            alert.title,
            alert.message
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "log"
    }
}
