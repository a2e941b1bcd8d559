pub mod youtube;

use anyhow::Result;
use async_trait::async_trait;
use serenity::model::id::UserId;
use songbird::input::{Input, YoutubeDl};
use std::time::Duration;
use tracing::{debug, info};

use crate::ui::format::is_url;

pub use youtube::YouTubeClient;

/// Trait común para las fuentes de música
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MusicSource: Send + Sync {
    /// Busca tracks en la fuente
    async fn search(&self, query: &str, limit: usize, requested_by: UserId) -> Result<Vec<TrackSource>>;

    /// Obtiene información detallada de un track por URL
    async fn get_track(&self, url: &str, requested_by: UserId) -> Result<TrackSource>;

    /// Nombre de la fuente
    fn source_name(&self) -> &'static str;
}

/// Representa un track de música resuelto por el extractor
#[derive(Debug, Clone)]
pub struct TrackSource {
    title: String,
    uploader: Option<String>,
    duration: Option<Duration>,
    thumbnail: Option<String>,
    url: String,
    source_type: SourceType,
    requested_by: UserId,
}

impl TrackSource {
    pub fn new(title: String, url: String, source_type: SourceType, requested_by: UserId) -> Self {
        Self {
            title,
            uploader: None,
            duration: None,
            thumbnail: None,
            url,
            source_type,
            requested_by,
        }
    }

    // Getters
    pub fn title(&self) -> String {
        self.title.clone()
    }
    pub fn uploader(&self) -> Option<String> {
        self.uploader.clone()
    }
    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }
    pub fn thumbnail(&self) -> Option<String> {
        self.thumbnail.clone()
    }
    pub fn url(&self) -> String {
        self.url.clone()
    }
    pub fn source_type(&self) -> SourceType {
        self.source_type
    }
    pub fn requested_by(&self) -> UserId {
        self.requested_by
    }

    // Setters
    pub fn with_uploader(mut self, uploader: String) -> Self {
        self.uploader = Some(uploader);
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn with_thumbnail(mut self, thumbnail: String) -> Self {
        self.thumbnail = Some(thumbnail);
        self
    }

    /// Obtiene el input de audio para songbird. yt-dlp resuelve el stream al
    /// empezar la reproducción, así que la URL no caduca mientras espera en la cola.
    pub fn get_input(&self, client: reqwest::Client) -> Input {
        debug!("🔗 Building input for: {}", self.url);
        YoutubeDl::new(client, self.url.clone()).into()
    }
}

/// Tipos de fuentes de música
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceType {
    YouTube,
    DirectUrl,
}

impl SourceType {
    pub fn label(&self) -> &'static str {
        match self {
            SourceType::YouTube => "YouTube",
            SourceType::DirectUrl => "Web",
        }
    }
}

/// Resuelve lo que escribió el usuario: una URL directa o una búsqueda
pub async fn resolve_track(
    source: &dyn MusicSource,
    query: &str,
    requested_by: UserId,
) -> Result<TrackSource> {
    let query = query.trim();
    if query.is_empty() {
        anyhow::bail!("Empty query");
    }

    if is_url(query) {
        info!("🔗 Resolving URL with {}: {}", source.source_name(), query);
        return source.get_track(query, requested_by).await;
    }

    info!("🔍 Searching {} for: {}", source.source_name(), query);
    source
        .search(query, 1, requested_by)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| anyhow::anyhow!("No results found for '{}'", query))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::{always, eq};

    fn track(title: &str) -> TrackSource {
        TrackSource::new(
            title.to_string(),
            format!("https://youtu.be/{}", title),
            SourceType::YouTube,
            UserId::new(7),
        )
    }

    #[tokio::test]
    async fn urls_are_resolved_directly() {
        let mut source = MockMusicSource::new();
        source.expect_source_name().return_const("YouTube");
        source
            .expect_get_track()
            .with(eq("https://youtu.be/abc"), eq(UserId::new(7)))
            .times(1)
            .returning(|_, _| Ok(track("abc")));
        source.expect_search().never();

        let resolved = resolve_track(&source, "  https://youtu.be/abc ", UserId::new(7))
            .await
            .unwrap();
        assert_eq!(resolved.title(), "abc");
    }

    #[tokio::test]
    async fn text_queries_take_the_first_search_result() {
        let mut source = MockMusicSource::new();
        source.expect_source_name().return_const("YouTube");
        source
            .expect_search()
            .with(eq("lofi beats"), eq(1), always())
            .times(1)
            .returning(|_, _, _| Ok(vec![track("first"), track("second")]));

        let resolved = resolve_track(&source, "lofi beats", UserId::new(7)).await.unwrap();
        assert_eq!(resolved.title(), "first");
    }

    #[tokio::test]
    async fn empty_search_results_are_an_error() {
        let mut source = MockMusicSource::new();
        source.expect_source_name().return_const("YouTube");
        source.expect_search().returning(|_, _, _| Ok(Vec::new()));

        let err = resolve_track(&source, "zzzz", UserId::new(7)).await.unwrap_err();
        assert!(err.to_string().contains("No results"));
    }

    #[tokio::test]
    async fn blank_queries_are_rejected() {
        let source = MockMusicSource::new();
        assert!(resolve_track(&source, "   ", UserId::new(7)).await.is_err());
    }
}
