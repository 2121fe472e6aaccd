use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Result, SpendwiseError};
use crate::models::{CategorizedTransaction, Transaction};
use crate::settings::Settings;

/// One line of spending data handed to the model.
#[derive(Debug, Clone, PartialEq)]
pub struct SpendingItem {
    pub category: String,
    pub amount: f64,
    pub date: Option<String>,
    pub description: Option<String>,
}

impl From<&CategorizedTransaction> for SpendingItem {
    fn from(t: &CategorizedTransaction) -> Self {
        Self {
            category: t.category.clone(),
            amount: t.record.amount_value(),
            date: t.record.extra_text("date").or_else(|| t.record.extra_text("Date")),
            description: t.record.description.clone().filter(|d| !d.is_empty()),
        }
    }
}

impl From<&Transaction> for SpendingItem {
    fn from(t: &Transaction) -> Self {
        Self {
            category: t.category.clone(),
            amount: t.amount,
            date: Some(t.date.clone()),
            description: t.description.clone().filter(|d| !d.is_empty()),
        }
    }
}

pub fn format_item(item: &SpendingItem) -> String {
    format!(
        "Category: {}\nAmount: ${:.2}\nDate: {}\nDescription: {}\n",
        item.category,
        item.amount,
        item.date.as_deref().unwrap_or("N/A"),
        item.description.as_deref().unwrap_or("N/A"),
    )
}

pub fn build_prompt(items: &[SpendingItem]) -> String {
    let data = items.iter().map(format_item).collect::<Vec<_>>().join("\n");
    format!(
        "Analyze the following spending data and provide personalized financial advice and suggestions:\n\
         \n\
         {data}\n\
         Please provide:\n\
         1. A summary of spending patterns\n\
         2. Areas for potential cost savings\n\
         3. Budgeting recommendations\n\
         4. Any potential red flags in spending behavior\n\
         \n\
         Format your response in a friendly, conversational tone."
    )
}

// ---------------------------------------------------------------------------
// Chat-completion wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct ChatMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

fn first_choice_text(response: ChatResponse) -> Result<String> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| SpendwiseError::Advisor("response contained no suggestions".to_string()))
}

// ---------------------------------------------------------------------------
// Advisor
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct AdvisorConfig {
    pub endpoint: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
    pub api_key: String,
}

impl AdvisorConfig {
    /// Reads model settings from `settings`; the key must be supplied
    /// separately (normally from the environment).
    pub fn from_settings(settings: &Settings, api_key: Option<String>) -> Result<Self> {
        let api_key = api_key.filter(|k| !k.trim().is_empty()).ok_or_else(|| {
            SpendwiseError::Advisor(format!(
                "{} is not set",
                crate::settings::API_KEY_ENV
            ))
        })?;
        Ok(Self {
            endpoint: settings.ai_endpoint.clone(),
            model: settings.ai_model.clone(),
            temperature: settings.ai_temperature,
            max_tokens: settings.ai_max_tokens,
            timeout: Duration::from_secs(settings.ai_timeout_secs),
            api_key,
        })
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.endpoint.trim_end_matches('/'))
    }
}

#[derive(Debug)]
pub struct Suggestions {
    pub suggestions: String,
    pub original_data: Vec<SpendingItem>,
}

pub struct Advisor {
    config: AdvisorConfig,
    client: reqwest::blocking::Client,
}

impl Advisor {
    pub fn new(config: AdvisorConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self { config, client })
    }

    pub fn suggest(&self, items: Vec<SpendingItem>) -> Result<Suggestions> {
        let prompt = build_prompt(&items);
        let body = ChatRequest {
            model: &self.config.model,
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: Some(prompt),
            }],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        let url = self.config.completions_url();
        info!(url = %url, model = %self.config.model, items = items.len(), "requesting spending suggestions");
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().unwrap_or_default();
            return Err(SpendwiseError::Advisor(format!(
                "endpoint returned HTTP {status}: {}",
                text.trim()
            )));
        }
        let parsed: ChatResponse = resp.json()?;
        debug!(choices = parsed.choices.len(), "received completion");
        Ok(Suggestions {
            suggestions: first_choice_text(parsed)?,
            original_data: items,
        })
    }
}
