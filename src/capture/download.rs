//! Shared-recording download.
//!
//! Cloud-drive share links are rewritten to their direct-download form before
//! fetching. A response whose content type is HTML means the link resolved to
//! a permission or sign-in page, so it is rejected before any file is
//! created.

use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use super::AcquireError;

fn drive_file_id_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"/d/([^/]+)/").expect("valid drive id regex"))
}

/// Rewrite a Google Drive share link to its direct-download form. Returns
/// None for URLs that are not drive share links.
pub fn direct_drive_url(url: &str) -> Option<String> {
    if !url.contains("drive.google.com") || !url.contains("/file/d/") {
        return None;
    }
    let file_id = drive_file_id_re().captures(url)?.get(1)?.as_str();
    Some(format!(
        "https://drive.google.com/uc?export=download&id={file_id}"
    ))
}

fn is_html_content(content_type: Option<&str>) -> bool {
    content_type.is_some_and(|ct| ct.contains("text/html"))
}

pub async fn download_shared_recording(
    client: &reqwest::Client,
    url: &str,
    uploads_dir: &Path,
) -> Result<PathBuf, AcquireError> {
    let fetch_url = direct_drive_url(url).unwrap_or_else(|| url.to_string());
    debug!("Downloading shared recording from {}", fetch_url);

    let response = client
        .get(&fetch_url)
        .send()
        .await
        .map_err(|e| AcquireError::DownloadFailed(e.to_string()))?;

    if !response.status().is_success() {
        return Err(AcquireError::DownloadFailed(format!(
            "request returned status {}",
            response.status()
        )));
    }

    // A permission/sign-in page comes back as HTML; reject before touching
    // the filesystem so a failed download leaves no file behind.
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());

    if is_html_content(content_type.as_deref()) {
        return Err(AcquireError::InvalidSource(
            "URL returned HTML content instead of a media file".to_string(),
        ));
    }

    tokio::fs::create_dir_all(uploads_dir)
        .await
        .map_err(|e| AcquireError::DownloadFailed(format!("uploads dir: {e}")))?;

    let file_name = format!("recording_{}.mp4", chrono::Utc::now().timestamp_millis());
    let dest_path = uploads_dir.join(file_name);

    let mut file = tokio::fs::File::create(&dest_path)
        .await
        .map_err(|e| AcquireError::DownloadFailed(format!("create file: {e}")))?;

    let mut response = response;
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| AcquireError::DownloadFailed(e.to_string()))?
    {
        file.write_all(&chunk)
            .await
            .map_err(|e| AcquireError::DownloadFailed(format!("write: {e}")))?;
    }

    file.flush()
        .await
        .map_err(|e| AcquireError::DownloadFailed(format!("flush: {e}")))?;

    info!("Recording downloaded and saved to {:?}", dest_path);
    Ok(dest_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drive_share_link_rewritten() {
        let url = "https://drive.google.com/file/d/1AbC_dEf/view?usp=sharing";
        assert_eq!(
            direct_drive_url(url).as_deref(),
            Some("https://drive.google.com/uc?export=download&id=1AbC_dEf")
        );
    }

    #[test]
    fn test_non_drive_link_untouched() {
        assert!(direct_drive_url("https://example.com/rec.mp4").is_none());
        // Drive domain but not a file share path
        assert!(direct_drive_url("https://drive.google.com/drive/folders/xyz").is_none());
    }

    #[test]
    fn test_malformed_drive_link_untouched() {
        // Missing the trailing path segment after the id
        assert!(direct_drive_url("https://drive.google.com/file/d/abc").is_none());
    }

    #[test]
    fn test_html_content_detection() {
        assert!(is_html_content(Some("text/html; charset=utf-8")));
        assert!(!is_html_content(Some("video/mp4")));
        assert!(!is_html_content(Some("application/octet-stream")));
        assert!(!is_html_content(None));
    }

    async fn serve(router: axum::Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn test_html_response_rejected_and_no_file_created() {
        let router = axum::Router::new().route(
            "/share",
            axum::routing::get(|| async {
                (
                    [(axum::http::header::CONTENT_TYPE, "text/html; charset=utf-8")],
                    "<html>Sign in to continue</html>",
                )
            }),
        );
        let base = serve(router).await;

        let dir = tempfile::tempdir().unwrap();
        let client = reqwest::Client::new();
        let err = download_shared_recording(&client, &format!("{base}/share"), dir.path())
            .await
            .unwrap_err();

        assert!(matches!(err, AcquireError::InvalidSource(_)));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_media_response_saved_to_uploads_dir() {
        let router = axum::Router::new().route(
            "/share",
            axum::routing::get(|| async {
                (
                    [(axum::http::header::CONTENT_TYPE, "application/octet-stream")],
                    b"fake audio bytes".to_vec(),
                )
            }),
        );
        let base = serve(router).await;

        let dir = tempfile::tempdir().unwrap();
        let client = reqwest::Client::new();
        let path = download_shared_recording(&client, &format!("{base}/share"), dir.path())
            .await
            .unwrap();

        assert!(path.starts_with(dir.path()));
        assert_eq!(std::fs::read(&path).unwrap(), b"fake audio bytes");
    }

    #[tokio::test]
    async fn test_error_status_is_download_failure() {
        let router = axum::Router::new().route(
            "/share",
            axum::routing::get(|| async { axum::http::StatusCode::NOT_FOUND }),
        );
        let base = serve(router).await;

        let dir = tempfile::tempdir().unwrap();
        let client = reqwest::Client::new();
        let err = download_shared_recording(&client, &format!("{base}/share"), dir.path())
            .await
            .unwrap_err();

        assert!(matches!(err, AcquireError::DownloadFailed(_)));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
