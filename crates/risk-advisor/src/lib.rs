pub mod error;
pub mod prompt;

pub use error::{AdvisorError, AdvisorResult};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use valuation_core::{CollaboratorOutcome, ListingObservation, RawRiskAssessment, RiskAdvisor};

pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "gpt-4o";

#[derive(Debug, Clone)]
pub struct AdvisorConfig {
    pub api_key: Option<String>,
    pub endpoint: String,
    pub model: String,
    pub temperature: f64,
    pub timeout: Duration,
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.2,
            timeout: Duration::from_secs(20),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    response_format: ResponseFormat,
    temperature: f64,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: Option<String>,
}

/// Pull the assessment out of the model's reply. The multiplier is passed
/// through untyped; a missing field becomes `null`.
pub fn parse_reply(content: &str) -> AdvisorResult<RawRiskAssessment> {
    let trimmed = content.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .map(|s| s.trim_end().trim_end_matches("```"))
        .unwrap_or(trimmed);

    let value: Value = serde_json::from_str(body.trim())?;
    let object = value
        .as_object()
        .ok_or_else(|| AdvisorError::InvalidResponse("reply is not a JSON object".into()))?;

    Ok(RawRiskAssessment {
        risk_multiplier: object.get("risk_multiplier").cloned().unwrap_or(Value::Null),
        reasoning: object
            .get("reasoning")
            .and_then(|r| r.as_str())
            .map(String::from),
    })
}

/// Chat-completions backed condition/risk advisor.
#[derive(Clone)]
pub struct LlmRiskAdvisor {
    client: reqwest::Client,
    config: AdvisorConfig,
}

impl LlmRiskAdvisor {
    pub fn new(config: AdvisorConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client, config }
    }

    fn api_key(&self) -> Option<&str> {
        self.config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }

    pub async fn evaluate(&self, listing: &ListingObservation) -> AdvisorResult<RawRiskAssessment> {
        let api_key = self.api_key().ok_or(AdvisorError::MissingApiKey)?;
        let user = prompt::user_prompt(listing);
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: prompt::SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &user,
                },
            ],
            response_format: ResponseFormat { kind: "json_object" },
            temperature: self.config.temperature,
        };

        let response = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AdvisorError::ServiceUnavailable(format!(
                "Status: {}",
                response.status()
            )));
        }

        let reply = response.json::<ChatResponse>().await?;
        let content = reply
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| AdvisorError::InvalidResponse("empty completion".into()))?;

        parse_reply(&content)
    }
}

#[async_trait]
impl RiskAdvisor for LlmRiskAdvisor {
    async fn assess(&self, listing: &ListingObservation) -> CollaboratorOutcome<RawRiskAssessment> {
        let result = self.evaluate(listing).await;
        if let Err(e) = &result {
            tracing::debug!("Risk advisor failed for {}: {}", listing.house_id, e);
        }
        result.into()
    }

    fn advisor_name(&self) -> &str {
        &self.config.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_plain_reply() {
        let raw = parse_reply(r#"{"risk_multiplier": 0.85, "reasoning": "Roof is 25 years old."}"#).unwrap();
        assert_eq!(raw.risk_multiplier, json!(0.85));
        assert_eq!(raw.reasoning.as_deref(), Some("Roof is 25 years old."));
    }

    #[test]
    fn test_parse_fenced_reply_with_string_multiplier() {
        let raw = parse_reply("```json\n{\"risk_multiplier\": \"0.7\"}\n```").unwrap();
        assert_eq!(raw.risk_multiplier, json!("0.7"));
        assert!(raw.reasoning.is_none());
    }

    #[test]
    fn test_missing_multiplier_is_null() {
        let raw = parse_reply(r#"{"reasoning": "unsure"}"#).unwrap();
        assert!(raw.risk_multiplier.is_null());
    }

    #[test]
    fn test_non_object_reply_is_rejected() {
        assert!(parse_reply("[1, 2]").is_err());
        assert!(parse_reply("not json").is_err());
    }

    #[tokio::test]
    async fn test_missing_key_fails_without_network() {
        let advisor = LlmRiskAdvisor::new(AdvisorConfig::default());
        let listing: ListingObservation = serde_json::from_value(json!({
            "house_id": "H1", "address": "1 Main St", "neighborhood_id": 1,
            "neighborhood_name": "33602", "sqft": 1000.0, "beds": 2.0, "baths": 1.0,
            "recurring_fee": 0.0, "date": "2026-02-22", "price": 200000.0
        }))
        .unwrap();
        assert_eq!(
            advisor.assess(&listing).await,
            CollaboratorOutcome::Failed("no advisory API key".to_string())
        );
    }
}
