//! Task and minutes extraction via a generative-text provider.
//!
//! The model has no structured-output guarantee, so the prompts demand a
//! single JSON artifact and nothing else. When the reply still fails to
//! parse, the caller gets the documented placeholder list and the failure is
//! logged — degraded data, not a crash.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, error, info, warn};

use crate::config::ModelConfig;
use crate::db::TaskItem;

pub const NO_TASKS_PLACEHOLDER: &str = "No clear tasks identified";
pub const NO_MINUTES_PLACEHOLDER: &str = "No clear minutes extracted";

/// Generative-text provider: one prompt in, one text reply out.
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

fn tasks_prompt(transcript: &str) -> String {
    format!(
        r#"You are an assistant that extracts actionable tasks from meeting transcripts.

Transcript:
"""
{transcript}
"""

Instructions:
- Identify clear tasks mentioned in the meeting.
- For each task, extract:
  - "title": a short, clear description of the task
  - "dueDate": the due date if mentioned, or null if not specified
- Return the result as a JSON array of objects with "title" and "dueDate" fields.
- Do not include any explanation. Output ONLY the JSON array.

Example output:
[
  {{
    "title": "Prepare the monthly report",
    "dueDate": "2025-04-20"
  }},
  {{
    "title": "Follow up with the marketing team",
    "dueDate": null
  }}
]
"#
    )
}

fn minutes_prompt(transcript: &str) -> String {
    format!(
        r#"You are an assistant that summarizes meeting transcripts into key minutes.

Transcript:
"""
{transcript}
"""

Instructions:
- Extract important discussion points, decisions, and updates.
- Each point must be in one simple sentence.
- Return the result as a JSON array of bullet points.
- No introduction, just the JSON array.

Example output:
[
  "The team agreed to launch the new feature next Monday",
  "Budget constraints were discussed in detail"
]
"#
    )
}

/// Models often wrap JSON in a markdown code fence despite instructions.
fn strip_code_fence(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

#[derive(Debug, Deserialize)]
struct ExtractedTask {
    title: String,
    #[serde(rename = "dueDate")]
    due_date: Option<String>,
}

/// Ask the model for action items. Model-call failures propagate; malformed
/// replies degrade to the placeholder task.
pub async fn extract_tasks(model: &dyn GenerativeModel, transcript: &str) -> Result<Vec<TaskItem>> {
    let reply = model.generate(&tasks_prompt(transcript)).await?;

    match serde_json::from_str::<Vec<ExtractedTask>>(strip_code_fence(&reply)) {
        Ok(extracted) => Ok(extracted
            .into_iter()
            .map(|t| TaskItem {
                title: t.title,
                due_date: t.due_date,
                completed: false,
            })
            .collect()),
        Err(e) => {
            warn!("Failed to parse model task output, using placeholder: {}", e);
            Ok(vec![TaskItem {
                title: NO_TASKS_PLACEHOLDER.to_string(),
                due_date: None,
                completed: false,
            }])
        }
    }
}

/// Ask the model for one-sentence minutes. Same parse-or-placeholder policy.
pub async fn extract_minutes(
    model: &dyn GenerativeModel,
    transcript: &str,
) -> Result<Vec<String>> {
    let reply = model.generate(&minutes_prompt(transcript)).await?;

    match serde_json::from_str::<Vec<String>>(strip_code_fence(&reply)) {
        Ok(minutes) => Ok(minutes),
        Err(e) => {
            warn!(
                "Failed to parse model minutes output, using placeholder: {}",
                e
            );
            Ok(vec![NO_MINUTES_PLACEHOLDER.to_string()])
        }
    }
}

// ============================================================================
// Gemini client
// ============================================================================

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: String,
}

pub struct GeminiClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl GeminiClient {
    pub fn new(config: &ModelConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .context("api_key is required for the generative model provider")?;
        let base_url = config.api_endpoint.clone().unwrap_or_else(|| {
            "https://generativelanguage.googleapis.com/v1beta".to_string()
        });

        info!(
            "Initialized generative model provider: {} ({})",
            config.model, base_url
        );

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            base_url,
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl GenerativeModel for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );

        let request_body = GenerateRequest {
            contents: vec![json!({ "parts": [{ "text": prompt }] })],
        };

        debug!("Submitting generation request ({} chars)", prompt.len());

        let response = self
            .client
            .post(&url)
            .json(&request_body)
            .send()
            .await
            .context("Failed to call generative model")?;

        let status = response.status();
        let response_text = response
            .text()
            .await
            .context("Failed to read generation response body")?;

        if !status.is_success() {
            error!(
                "Generative model request failed with status {}: {}",
                status, response_text
            );
            return Err(anyhow::anyhow!(
                "Generative model request failed with status {}",
                status
            ));
        }

        let parsed: GenerateResponse = serde_json::from_str(&response_text)
            .context("Failed to parse generation response")?;

        let text = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text)
            .context("Generative model returned no candidates")?;

        Ok(text)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Scripted model for pipeline and extraction tests.
    pub struct FakeModel {
        pub reply: String,
    }

    #[async_trait]
    impl GenerativeModel for FakeModel {
        async fn generate(&self, _prompt: &str) -> Result<String> {
            Ok(self.reply.clone())
        }
    }

    #[test]
    fn test_strip_code_fence_variants() {
        assert_eq!(strip_code_fence("[1]"), "[1]");
        assert_eq!(strip_code_fence("```json\n[1]\n```"), "[1]");
        assert_eq!(strip_code_fence("```\n[1]\n```"), "[1]");
        assert_eq!(strip_code_fence("  [1]  "), "[1]");
    }

    #[tokio::test]
    async fn test_extract_tasks_parses_model_json() {
        let model = FakeModel {
            reply: r#"[{"title":"Prepare report","dueDate":"2025-04-20"},{"title":"Ping QA","dueDate":null}]"#.to_string(),
        };
        let tasks = extract_tasks(&model, "transcript").await.unwrap();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].title, "Prepare report");
        assert_eq!(tasks[0].due_date.as_deref(), Some("2025-04-20"));
        assert!(tasks.iter().all(|t| !t.completed));
    }

    #[tokio::test]
    async fn test_extract_tasks_fenced_json() {
        let model = FakeModel {
            reply: "```json\n[{\"title\":\"Ship it\",\"dueDate\":null}]\n```".to_string(),
        };
        let tasks = extract_tasks(&model, "transcript").await.unwrap();
        assert_eq!(tasks[0].title, "Ship it");
    }

    #[tokio::test]
    async fn test_extract_tasks_invalid_json_gives_placeholder() {
        let model = FakeModel {
            reply: "Sure! Here are the tasks I found:".to_string(),
        };
        let tasks = extract_tasks(&model, "transcript").await.unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].title, NO_TASKS_PLACEHOLDER);
    }

    #[tokio::test]
    async fn test_extract_minutes_invalid_json_gives_placeholder() {
        let model = FakeModel {
            reply: "{not json".to_string(),
        };
        let minutes = extract_minutes(&model, "transcript").await.unwrap();
        assert_eq!(minutes, vec![NO_MINUTES_PLACEHOLDER.to_string()]);
    }

    #[tokio::test]
    async fn test_extract_minutes_parses_string_array() {
        let model = FakeModel {
            reply: r#"["Launch moved to Monday","Budget approved"]"#.to_string(),
        };
        let minutes = extract_minutes(&model, "transcript").await.unwrap();
        assert_eq!(minutes.len(), 2);
        assert_eq!(minutes[1], "Budget approved");
    }
}
