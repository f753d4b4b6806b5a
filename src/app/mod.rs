use crate::api::{ApiServer, MeetState};
use crate::capture::RecordingAcquirer;
use crate::config::Config;
use crate::extraction::GeminiClient;
use crate::pipeline::AnalysisPipeline;
use crate::transcription::AssemblyAiClient;
use anyhow::Result;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

pub async fn run_service() -> Result<()> {
    info!("Starting meetscribe service");

    let config = Config::load()?;

    let acquirer = Arc::new(RecordingAcquirer::new(
        config.capture.clone(),
        &config.storage,
        crate::global::recordings_dir()?,
        crate::global::uploads_dir()?,
    ));

    let pipeline = Arc::new(build_pipeline(&config)?);

    let meet_state = MeetState {
        acquirer,
        pipeline,
        capture_lock: Arc::new(Mutex::new(())),
    };

    let api_server = ApiServer::new(config.server.host.clone(), config.server.port, meet_state);

    info!("meetscribe is ready");
    api_server.start().await
}

pub fn build_pipeline(config: &Config) -> Result<AnalysisPipeline> {
    let speech = AssemblyAiClient::new(&config.speech)?;
    let model = GeminiClient::new(&config.model)?;
    Ok(AnalysisPipeline::new(Box::new(speech), Box::new(model)))
}
