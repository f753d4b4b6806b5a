//! Speech-to-text provider client (AssemblyAI-compatible API).
//!
//! Flow: upload the audio file, submit a transcription job against the
//! returned handle, poll until the job reaches a terminal status. A second
//! job with summarization enabled produces the bullet summary. Failures are
//! real errors propagated to the caller — there is no sentinel transcript
//! value.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::config::SpeechConfig;

/// Speech provider operations the pipeline depends on. `upload` returns an
/// opaque audio handle the other calls consume.
#[async_trait]
pub trait SpeechProvider: Send + Sync {
    async fn upload(&self, audio_path: &Path) -> Result<String>;
    async fn transcribe(&self, audio_url: &str) -> Result<String>;
    async fn summarize(&self, audio_url: &str) -> Result<String>;
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    upload_url: String,
}

#[derive(Debug, Serialize)]
struct TranscriptRequest {
    audio_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    language_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summarization: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary_model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TranscriptResponse {
    id: String,
    status: TranscriptStatus,
    text: Option<String>,
    summary: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
enum TranscriptStatus {
    Queued,
    Processing,
    Completed,
    Error,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
}

pub struct AssemblyAiClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    language: Option<String>,
    poll_interval: Duration,
    max_poll_attempts: u32,
}

impl AssemblyAiClient {
    pub fn new(config: &SpeechConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .context("api_key is required for the speech provider")?;
        let base_url = config
            .api_endpoint
            .clone()
            .unwrap_or_else(|| "https://api.assemblyai.com/v2".to_string());

        info!("Initialized speech provider with base URL: {}", base_url);

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            base_url,
            language: config.language.clone(),
            poll_interval: Duration::from_secs(3),
            max_poll_attempts: 120,
        })
    }

    /// Submit a transcription job. Returns the job id to poll.
    async fn submit(&self, audio_url: &str, with_summary: bool) -> Result<String> {
        let transcript_url = format!("{}/transcript", self.base_url);

        let language_code = match self.language.as_deref() {
            None | Some("") | Some("auto") => None,
            Some(lang) => Some(lang.to_string()),
        };

        let request_body = TranscriptRequest {
            audio_url: audio_url.to_string(),
            language_code,
            summarization: with_summary.then_some(true),
            summary_type: with_summary.then(|| "bullets".to_string()),
            summary_model: with_summary.then(|| "informative".to_string()),
        };

        debug!("Submitting transcription request (summary: {})", with_summary);

        let response = self
            .client
            .post(&transcript_url)
            .header("Authorization", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&request_body)
            .send()
            .await
            .context("Failed to submit transcription request")?;

        let status = response.status();
        let response_text = response
            .text()
            .await
            .context("Failed to read transcription response body")?;

        if !status.is_success() {
            error!(
                "Speech provider transcription request failed with status {}: {}",
                status, response_text
            );

            if let Ok(error_response) = serde_json::from_str::<ErrorResponse>(&response_text) {
                return Err(anyhow::anyhow!(
                    "Speech provider error: {}",
                    error_response.error
                ));
            }

            return Err(anyhow::anyhow!(
                "Transcription request failed with status {}: {}",
                status,
                response_text
            ));
        }

        let transcript_response: TranscriptResponse = serde_json::from_str(&response_text)
            .context("Failed to parse transcription response")?;

        debug!(
            "Transcription submitted with ID: {}",
            transcript_response.id
        );
        Ok(transcript_response.id)
    }

    /// Poll a job until it reaches a terminal status.
    async fn poll(&self, transcript_id: &str) -> Result<TranscriptResponse> {
        let poll_url = format!("{}/transcript/{}", self.base_url, transcript_id);

        for attempt in 1..=self.max_poll_attempts {
            debug!(
                "Polling transcription status (attempt {}/{}): {}",
                attempt, self.max_poll_attempts, transcript_id
            );

            let response = self
                .client
                .get(&poll_url)
                .header("Authorization", &self.api_key)
                .send()
                .await
                .context("Failed to poll transcription status")?;

            let status = response.status();
            let response_text = response
                .text()
                .await
                .context("Failed to read poll response body")?;

            if !status.is_success() {
                error!(
                    "Speech provider poll failed with status {}: {}",
                    status, response_text
                );
                return Err(anyhow::anyhow!(
                    "Transcription poll failed with status {}: {}",
                    status,
                    response_text
                ));
            }

            let transcript_response: TranscriptResponse =
                serde_json::from_str(&response_text).context("Failed to parse poll response")?;

            match transcript_response.status {
                TranscriptStatus::Completed => {
                    return Ok(transcript_response);
                }
                TranscriptStatus::Error => {
                    let error_msg = transcript_response
                        .error
                        .unwrap_or_else(|| "Unknown error".to_string());
                    error!("Transcription failed: {}", error_msg);
                    return Err(anyhow::anyhow!("Transcription failed: {}", error_msg));
                }
                TranscriptStatus::Queued | TranscriptStatus::Processing => {
                    debug!("Transcription still processing, waiting...");
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }

        Err(anyhow::anyhow!(
            "Transcription timed out after {} attempts",
            self.max_poll_attempts
        ))
    }
}

#[async_trait]
impl SpeechProvider for AssemblyAiClient {
    async fn upload(&self, audio_path: &Path) -> Result<String> {
        let upload_url = format!("{}/upload", self.base_url);

        debug!("Uploading audio file to speech provider: {:?}", audio_path);

        let audio_data = tokio::fs::read(audio_path)
            .await
            .context("Failed to read audio file")?;

        let response = self
            .client
            .post(&upload_url)
            .header("Authorization", &self.api_key)
            .header("Content-Type", "application/octet-stream")
            .body(audio_data)
            .send()
            .await
            .context("Failed to upload audio to speech provider")?;

        let status = response.status();
        let response_text = response
            .text()
            .await
            .context("Failed to read upload response body")?;

        if !status.is_success() {
            error!(
                "Speech provider upload failed with status {}: {}",
                status, response_text
            );
            return Err(anyhow::anyhow!(
                "Audio upload failed with status {}: {}",
                status,
                response_text
            ));
        }

        let upload_response: UploadResponse =
            serde_json::from_str(&response_text).context("Failed to parse upload response")?;

        debug!(
            "Audio uploaded successfully: {}",
            upload_response.upload_url
        );
        Ok(upload_response.upload_url)
    }

    async fn transcribe(&self, audio_url: &str) -> Result<String> {
        let transcript_id = self.submit(audio_url, false).await?;
        let completed = self.poll(&transcript_id).await?;

        let text = completed.text.unwrap_or_default().trim().to_string();
        info!("Transcription complete: {} chars", text.len());
        Ok(text)
    }

    async fn summarize(&self, audio_url: &str) -> Result<String> {
        let transcript_id = self.submit(audio_url, true).await?;
        let completed = self.poll(&transcript_id).await?;

        Ok(completed
            .summary
            .unwrap_or_else(|| "No summary available".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_fields_omitted_for_plain_transcription() {
        let request = TranscriptRequest {
            audio_url: "https://cdn.example/audio".to_string(),
            language_code: Some("en".to_string()),
            summarization: None,
            summary_type: None,
            summary_model: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("summarization").is_none());
        assert!(json.get("summary_type").is_none());
    }

    #[test]
    fn test_summary_request_carries_bullet_settings() {
        let request = TranscriptRequest {
            audio_url: "https://cdn.example/audio".to_string(),
            language_code: None,
            summarization: Some(true),
            summary_type: Some("bullets".to_string()),
            summary_model: Some("informative".to_string()),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["summarization"], true);
        assert_eq!(json["summary_type"], "bullets");
        assert!(json.get("language_code").is_none());
    }

    #[test]
    fn test_terminal_status_parsing() {
        let response: TranscriptResponse = serde_json::from_str(
            r#"{"id":"t1","status":"completed","text":"hello","summary":null,"error":null}"#,
        )
        .unwrap();
        assert_eq!(response.status, TranscriptStatus::Completed);
        assert_eq!(response.text.as_deref(), Some("hello"));
    }

    #[test]
    fn test_unrecognized_status_is_an_error() {
        let result = serde_json::from_str::<TranscriptResponse>(
            r#"{"id":"t1","status":"exploded","text":null,"summary":null,"error":null}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_client_requires_api_key() {
        let config = SpeechConfig {
            api_key: None,
            api_endpoint: None,
            language: None,
        };
        assert!(AssemblyAiClient::new(&config).is_err());
    }
}
