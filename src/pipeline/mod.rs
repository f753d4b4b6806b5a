//! Transcription and extraction pipeline.
//!
//! Strictly sequential: upload → transcribe → summary → tasks → minutes.
//! No partial-result caching and no retries; the first provider failure
//! aborts the run with an error the API layer maps to a 500.

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;
use tracing::info;

use crate::db::TaskItem;
use crate::extraction::{self, GenerativeModel};
use crate::transcription::SpeechProvider;

/// Everything the pipeline derives from one audio file.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub transcript: String,
    pub summary: String,
    pub tasks: Vec<TaskItem>,
    pub minutes: Vec<String>,
    pub participants: Vec<String>,
    pub audio_path: String,
    pub timestamp: i64,
}

pub struct AnalysisPipeline {
    speech: Box<dyn SpeechProvider>,
    model: Box<dyn GenerativeModel>,
}

impl AnalysisPipeline {
    pub fn new(speech: Box<dyn SpeechProvider>, model: Box<dyn GenerativeModel>) -> Self {
        Self { speech, model }
    }

    pub async fn analyze(&self, audio_path: &Path) -> Result<AnalysisResult> {
        info!("Analyzing audio file: {:?}", audio_path);

        let audio_url = self
            .speech
            .upload(audio_path)
            .await
            .context("Audio upload failed")?;

        let transcript = self
            .speech
            .transcribe(&audio_url)
            .await
            .context("Transcription failed")?;

        let summary = self
            .speech
            .summarize(&audio_url)
            .await
            .context("Summary generation failed")?;

        let tasks = extraction::extract_tasks(self.model.as_ref(), &transcript)
            .await
            .context("Task extraction failed")?;

        let minutes = extraction::extract_minutes(self.model.as_ref(), &transcript)
            .await
            .context("Minutes extraction failed")?;

        info!(
            "Analysis complete: {} chars transcript, {} task(s), {} minute(s)",
            transcript.len(),
            tasks.len(),
            minutes.len()
        );

        Ok(AnalysisResult {
            transcript,
            summary,
            tasks,
            minutes,
            // Never populated from any signal; kept for the response shape.
            participants: Vec::new(),
            audio_path: audio_path.to_string_lossy().to_string(),
            timestamp: chrono::Utc::now().timestamp_millis(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::tests::FakeModel;
    use anyhow::anyhow;
    use async_trait::async_trait;

    struct FakeSpeech {
        transcribe_result: Result<String, String>,
    }

    #[async_trait]
    impl SpeechProvider for FakeSpeech {
        async fn upload(&self, _audio_path: &Path) -> Result<String> {
            Ok("https://cdn.example/audio/1".to_string())
        }

        async fn transcribe(&self, _audio_url: &str) -> Result<String> {
            self.transcribe_result
                .clone()
                .map_err(|e| anyhow!("{}", e))
        }

        async fn summarize(&self, _audio_url: &str) -> Result<String> {
            Ok("- bullet summary".to_string())
        }
    }

    fn pipeline(transcribe_result: Result<String, String>, model_reply: &str) -> AnalysisPipeline {
        AnalysisPipeline::new(
            Box::new(FakeSpeech { transcribe_result }),
            Box::new(FakeModel {
                reply: model_reply.to_string(),
            }),
        )
    }

    #[tokio::test]
    async fn test_analyze_assembles_composite_result() {
        let pipeline = pipeline(
            Ok("We agreed to ship Friday.".to_string()),
            r#"["Ship on Friday"]"#,
        );

        let result = pipeline.analyze(Path::new("/tmp/a.mp3")).await.unwrap();
        assert_eq!(result.transcript, "We agreed to ship Friday.");
        assert_eq!(result.summary, "- bullet summary");
        assert!(result.participants.is_empty());
        assert_eq!(result.audio_path, "/tmp/a.mp3");
        assert!(result.timestamp > 0);
    }

    #[tokio::test]
    async fn test_transcription_failure_aborts_pipeline() {
        let pipeline = pipeline(Err("provider rejected audio".to_string()), "[]");

        let err = pipeline.analyze(Path::new("/tmp/a.mp3")).await.unwrap_err();
        assert!(err.to_string().contains("Transcription failed"));
    }

    #[tokio::test]
    async fn test_unparseable_model_output_degrades_to_placeholders() {
        let pipeline = pipeline(
            Ok("transcript".to_string()),
            "I could not find anything useful.",
        );

        let result = pipeline.analyze(Path::new("/tmp/a.mp3")).await.unwrap();
        assert_eq!(result.tasks.len(), 1);
        assert_eq!(result.tasks[0].title, crate::extraction::NO_TASKS_PLACEHOLDER);
        assert_eq!(
            result.minutes,
            vec![crate::extraction::NO_MINUTES_PLACEHOLDER.to_string()]
        );
    }

    #[tokio::test]
    async fn test_result_serializes_camel_case() {
        let pipeline = pipeline(Ok("transcript".to_string()), "[]");
        let result = pipeline.analyze(Path::new("/tmp/a.mp3")).await.unwrap();

        let json = serde_json::to_value(&result).unwrap();
        assert!(json.get("audioPath").is_some());
        assert!(json.get("participants").is_some());
    }
}
