//! Live-meeting join bot.
//!
//! Drives a controlled browser to the meeting URL, clicks the join control,
//! then records the system audio device with ffmpeg for the requested
//! duration. The browser binary, profile directory, capture device and join
//! selector all come from configuration.
//!
//! One capture per process: the browser and the audio device are both
//! exclusive resources, so callers serialize capture jobs (the API layer
//! holds a mutex across this call).

use headless_chrome::{Browser, LaunchOptions};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;
use tracing::{info, warn};

use super::AcquireError;
use crate::config::CaptureConfig;

/// Slack added to browser/process timeouts beyond the capture duration.
const GRACE: Duration = Duration::from_secs(60);

pub struct MeetingBot {
    config: CaptureConfig,
    recordings_dir: PathBuf,
}

impl MeetingBot {
    pub fn new(config: CaptureConfig, recordings_dir: PathBuf) -> Self {
        Self {
            config,
            recordings_dir,
        }
    }

    pub fn recordings_dir(&self) -> &Path {
        &self.recordings_dir
    }

    /// Join the meeting and record audio. Blocks for the capture duration,
    /// so the whole job runs on the blocking pool.
    pub async fn capture_live(
        &self,
        meet_link: &str,
        duration: Option<Duration>,
    ) -> Result<PathBuf, AcquireError> {
        let max = Duration::from_secs(self.config.max_duration_seconds);
        let duration = duration.unwrap_or(max).min(max);

        let config = self.config.clone();
        let recordings_dir = self.recordings_dir.clone();
        let meet_link = meet_link.to_string();

        tokio::task::spawn_blocking(move || {
            capture_blocking(&config, &recordings_dir, &meet_link, duration)
        })
        .await
        .map_err(|e| AcquireError::CaptureFailed(format!("capture task panicked: {e}")))?
    }
}

fn capture_blocking(
    config: &CaptureConfig,
    recordings_dir: &Path,
    meet_link: &str,
    duration: Duration,
) -> Result<PathBuf, AcquireError> {
    std::fs::create_dir_all(recordings_dir)
        .map_err(|e| AcquireError::CaptureFailed(format!("recordings dir: {e}")))?;

    let output_path = generate_output_path(recordings_dir);

    // Join the meeting. The browser stays alive (and in the call) for the
    // whole capture; dropping it at the end leaves the meeting.
    let browser = launch_browser(config, duration)?;
    let tab = browser
        .new_tab()
        .map_err(|e| AcquireError::CaptureFailed(format!("browser tab: {e}")))?;

    tab.navigate_to(meet_link)
        .and_then(|t| t.wait_until_navigated())
        .map_err(|e| AcquireError::CaptureFailed(format!("navigation: {e}")))?;

    let join_timeout = Duration::from_secs(config.join_timeout_seconds);
    let join_control = tab
        .wait_for_element_with_custom_timeout(&config.join_selector, join_timeout)
        .map_err(|e| {
            AcquireError::CaptureFailed(format!(
                "join control '{}' did not appear: {e}",
                config.join_selector
            ))
        })?;

    join_control
        .click()
        .map_err(|e| AcquireError::CaptureFailed(format!("join click: {e}")))?;

    info!("Joined meeting, recording to {:?}", output_path);

    // ffmpeg terminates itself after -t; the outer wait is just a backstop.
    let mut child = Command::new("ffmpeg")
        .args([
            "-f",
            &config.audio_format,
            "-i",
            &config.audio_device,
            "-t",
            &duration.as_secs().to_string(),
            "-y",
        ])
        .arg(&output_path)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| AcquireError::CaptureFailed(format!("ffmpeg spawn: {e}")))?;

    let deadline = std::time::Instant::now() + duration + GRACE;
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {
                if std::time::Instant::now() >= deadline {
                    warn!("ffmpeg exceeded capture deadline, killing");
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(AcquireError::CaptureFailed(
                        "audio capture exceeded deadline".to_string(),
                    ));
                }
                std::thread::sleep(Duration::from_millis(500));
            }
            Err(e) => {
                return Err(AcquireError::CaptureFailed(format!("ffmpeg wait: {e}")));
            }
        }
    };

    drop(browser);

    if !status.success() {
        return Err(AcquireError::CaptureFailed(format!(
            "ffmpeg exited with status {status}"
        )));
    }

    if !output_path.exists() {
        return Err(AcquireError::CaptureFailed(
            "ffmpeg produced no output file".to_string(),
        ));
    }

    info!("Recording saved: {:?}", output_path);
    Ok(output_path)
}

fn launch_browser(config: &CaptureConfig, duration: Duration) -> Result<Browser, AcquireError> {
    let mut builder = LaunchOptions::default_builder();
    // Visible window: a headless browser has no media pipeline to feed the
    // system audio device.
    builder.headless(false);
    builder.idle_browser_timeout(duration + GRACE + GRACE);

    if let Some(path) = &config.browser_path {
        builder.path(Some(PathBuf::from(path)));
    }
    if let Some(dir) = &config.user_data_dir {
        builder.user_data_dir(Some(PathBuf::from(dir)));
    }

    builder.args(vec![
        OsStr::new("--use-fake-ui-for-media-stream"),
        OsStr::new("--disable-notifications"),
        OsStr::new("--disable-infobars"),
        OsStr::new("--mute-audio"),
    ]);

    let options = builder
        .build()
        .map_err(|e| AcquireError::CaptureFailed(format!("browser options: {e}")))?;

    Browser::new(options).map_err(|e| AcquireError::CaptureFailed(format!("browser launch: {e}")))
}

fn generate_output_path(dir: &Path) -> PathBuf {
    let timestamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
    let filename = format!("audio-{timestamp}.mp3");
    let path = dir.join(&filename);

    // Handle collision by appending counter
    if path.exists() {
        for i in 1..100 {
            let alt = dir.join(format!("audio-{timestamp}-{i}.mp3"));
            if !alt.exists() {
                return alt;
            }
        }
    }

    path
}
