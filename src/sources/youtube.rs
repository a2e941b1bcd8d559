use anyhow::{Context, Result};
use async_process::Command;
use regex::Regex;
use serde::Deserialize;
use serenity::model::id::UserId;
use std::{sync::OnceLock, time::Duration};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use super::{MusicSource, SourceType, TrackSource};

/// Cliente para extraer metadata con yt-dlp
pub struct YouTubeClient {
    rate_limiter: Semaphore,
}

/// Información extraída de yt-dlp
#[derive(Debug, Deserialize)]
struct YtDlpInfo {
    title: String,
    duration: Option<f64>,
    uploader: Option<String>,
    thumbnail: Option<String>,
    webpage_url: Option<String>,
    url: Option<String>,
}

impl YouTubeClient {
    pub fn new() -> Self {
        Self {
            // Limitar procesos yt-dlp concurrentes
            rate_limiter: Semaphore::new(3),
        }
    }

    /// Ejecuta yt-dlp y devuelve una línea JSON por resultado
    async fn run_ytdlp(&self, target: &str) -> Result<String> {
        let _permit = self.rate_limiter.acquire().await?;

        let output = Command::new("yt-dlp")
            .args([
                "--no-playlist",
                "--dump-json",
                "--skip-download",
                "--no-warnings",
                "--default-search",
                "auto",
                target,
            ])
            .output()
            .await
            .context("Failed to run yt-dlp")?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("yt-dlp error: {}", error.trim());
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Verifica si una URL es de YouTube
    pub fn is_youtube_url(url: &str) -> bool {
        static YOUTUBE: OnceLock<Regex> = OnceLock::new();
        YOUTUBE
            .get_or_init(|| {
                Regex::new(
                    r"^(https?://)?(www\.|m\.)?(youtube\.com/(watch\?v=|embed/|v/|shorts/)|youtu\.be/|music\.youtube\.com/)",
                )
                .expect("valid youtube regex")
            })
            .is_match(url)
    }

    /// Actualiza yt-dlp (`--update-ytdlp`)
    pub async fn update_ytdlp() -> Result<()> {
        info!("🔄 Updating yt-dlp...");

        let output = Command::new("yt-dlp").arg("-U").output().await?;

        if output.status.success() {
            info!("✅ yt-dlp is up to date");
        } else {
            warn!(
                "⚠️ Could not update yt-dlp: {}",
                String::from_utf8_lossy(&output.stderr)
            );
        }

        Ok(())
    }
}

impl Default for YouTubeClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Convierte YtDlpInfo a TrackSource
fn info_to_track_source(info: YtDlpInfo, fallback_url: &str, requested_by: UserId) -> TrackSource {
    let url = info
        .webpage_url
        .or(info.url)
        .unwrap_or_else(|| fallback_url.to_string());
    let source_type = if YouTubeClient::is_youtube_url(&url) {
        SourceType::YouTube
    } else {
        SourceType::DirectUrl
    };

    let mut track = TrackSource::new(info.title, url, source_type, requested_by);

    if let Some(uploader) = info.uploader {
        track = track.with_uploader(uploader);
    }

    // Los directos no tienen duración
    if let Some(duration) = info.duration.filter(|d| d.is_finite() && *d > 0.0) {
        track = track.with_duration(Duration::from_secs_f64(duration.round()));
    }

    if let Some(thumbnail) = info.thumbnail {
        track = track.with_thumbnail(thumbnail);
    }

    track
}

fn parse_lines(stdout: &str, fallback_url: &str, requested_by: UserId) -> Vec<TrackSource> {
    stdout
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| match serde_json::from_str::<YtDlpInfo>(line) {
            Ok(info) => Some(info_to_track_source(info, fallback_url, requested_by)),
            Err(e) => {
                debug!("Skipping unparseable yt-dlp line: {}", e);
                None
            }
        })
        .collect()
}

#[async_trait::async_trait]
impl MusicSource for YouTubeClient {
    async fn search(&self, query: &str, limit: usize, requested_by: UserId) -> Result<Vec<TrackSource>> {
        info!("🔍 Searching YouTube: {}", query);
        let stdout = self.run_ytdlp(&format!("ytsearch{}:{}", limit, query)).await?;
        Ok(parse_lines(&stdout, "", requested_by))
    }

    async fn get_track(&self, url: &str, requested_by: UserId) -> Result<TrackSource> {
        debug!("📊 Fetching info for: {}", url);
        let stdout = self.run_ytdlp(url).await?;
        parse_lines(&stdout, url, requested_by)
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("yt-dlp returned no metadata for {}", url))
    }

    fn source_name(&self) -> &'static str {
        "YouTube"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_youtube_url_detection() {
        assert!(YouTubeClient::is_youtube_url(
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ"
        ));
        assert!(YouTubeClient::is_youtube_url("https://youtu.be/dQw4w9WgXcQ"));
        assert!(YouTubeClient::is_youtube_url(
            "https://music.youtube.com/watch?v=test"
        ));
        assert!(!YouTubeClient::is_youtube_url("https://example.com/video"));
    }

    #[test]
    fn parses_ytdlp_dump() {
        let stdout = concat!(
            r#"{"title":"Song A","duration":212.4,"uploader":"Band","thumbnail":"https://i.ytimg.com/a.jpg","webpage_url":"https://www.youtube.com/watch?v=a"}"#,
            "\n",
            "not json\n",
            r#"{"title":"Live B","duration":null,"webpage_url":"https://soundcloud.com/b"}"#,
            "\n"
        );

        let tracks = parse_lines(stdout, "", UserId::new(1));
        assert_eq!(tracks.len(), 2);

        assert_eq!(tracks[0].title(), "Song A");
        assert_eq!(tracks[0].duration(), Some(Duration::from_secs(212)));
        assert_eq!(tracks[0].uploader().as_deref(), Some("Band"));
        assert_eq!(tracks[0].source_type(), SourceType::YouTube);

        assert_eq!(tracks[1].duration(), None);
        assert_eq!(tracks[1].source_type(), SourceType::DirectUrl);
    }

    #[test]
    fn falls_back_to_requested_url() {
        let tracks = parse_lines(r#"{"title":"x"}"#, "https://youtu.be/x", UserId::new(1));
        assert_eq!(tracks[0].url(), "https://youtu.be/x");
    }
}
