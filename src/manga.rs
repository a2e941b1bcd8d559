//! Cliente de la API de MangaDex

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{debug, info};

use crate::ui::format::truncate;

const INCLUDES: [(&str, &str); 3] = [
    ("includes[]", "cover_art"),
    ("includes[]", "author"),
    ("includes[]", "artist"),
];

const DESCRIPTION_LIMIT: usize = 300;

/// Cliente HTTP para MangaDex
pub struct MangaDexClient {
    client: reqwest::Client,
    api_base: String,
}

#[derive(Debug, Deserialize)]
struct MangaList {
    #[serde(default)]
    data: Vec<MangaData>,
}

#[derive(Debug, Deserialize)]
struct MangaEntity {
    data: Option<MangaData>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MangaData {
    pub id: String,
    pub attributes: MangaAttributes,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MangaAttributes {
    #[serde(default)]
    pub title: Map<String, Value>,
    #[serde(default)]
    pub description: Map<String, Value>,
    pub status: Option<String>,
    pub year: Option<u32>,
    #[serde(default)]
    pub tags: Vec<Tag>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Tag {
    pub attributes: TagAttributes,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TagAttributes {
    #[serde(default)]
    pub name: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Relationship {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub attributes: Option<Map<String, Value>>,
}

impl Relationship {
    fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.as_ref()?.get(key)?.as_str()
    }
}

/// Datos ya formateados para mostrar en un embed
#[derive(Debug, Clone, PartialEq)]
pub struct MangaSummary {
    pub id: String,
    pub title: String,
    pub description: String,
    pub status: String,
    pub year: Option<u32>,
    pub genres: Vec<String>,
    pub authors: Vec<String>,
    pub artists: Vec<String>,
    pub cover_url: Option<String>,
    pub page_url: String,
}

/// Primer valor no vacío según el orden de idiomas, luego cualquiera
fn localized(map: &Map<String, Value>, languages: &[&str]) -> Option<String> {
    languages
        .iter()
        .filter_map(|lang| map.get(*lang).and_then(Value::as_str))
        .find(|s| !s.is_empty())
        .or_else(|| map.values().filter_map(Value::as_str).next())
        .map(str::to_string)
}

fn title_case(text: &str) -> String {
    text.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

impl MangaSummary {
    pub fn from_data(data: &MangaData) -> Self {
        let attrs = &data.attributes;

        let title = localized(&attrs.title, &["en", "ja-ro", "ja"])
            .unwrap_or_else(|| "Unknown Title".to_string());

        let description = localized(&attrs.description, &["en", "ja-ro"])
            .unwrap_or_else(|| "No description available.".to_string());

        let genres = attrs
            .tags
            .iter()
            .take(5)
            .map(|tag| {
                tag.attributes
                    .name
                    .get("en")
                    .and_then(Value::as_str)
                    .unwrap_or("Unknown")
                    .to_string()
            })
            .collect();

        let names = |kind: &str| -> Vec<String> {
            data.relationships
                .iter()
                .filter(|rel| rel.kind == kind)
                .map(|rel| rel.attribute("name").unwrap_or("Unknown").to_string())
                .collect()
        };

        let cover_url = data
            .relationships
            .iter()
            .filter(|rel| rel.kind == "cover_art")
            .find_map(|rel| rel.attribute("fileName"))
            .map(|file| format!("https://uploads.mangadex.org/covers/{}/{}.256.jpg", data.id, file));

        Self {
            id: data.id.clone(),
            title,
            description: truncate(&description, DESCRIPTION_LIMIT),
            status: title_case(attrs.status.as_deref().unwrap_or("unknown")),
            year: attrs.year,
            genres,
            authors: names("author"),
            artists: names("artist"),
            cover_url,
            page_url: format!("https://mangadex.org/title/{}", data.id),
        }
    }
}

impl MangaDexClient {
    pub fn new(api_base: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent(concat!("multipurpose-bot/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
        })
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        let url = format!("{}/{}", self.api_base, path);
        debug!("🌐 GET {}", url);

        let response = self
            .client
            .get(&url)
            .query(query)
            .query(&INCLUDES)
            .send()
            .await
            .context("Could not connect to MangaDex API")?;

        if !response.status().is_success() {
            anyhow::bail!("MangaDex API error: HTTP {}", response.status());
        }

        response
            .json()
            .await
            .context("Error parsing MangaDex response")
    }

    /// Busca un manga por título; devuelve el primer resultado
    pub async fn search(&self, title: &str) -> Result<Option<MangaSummary>> {
        info!("📚 Searching MangaDex: {}", title);
        let list: MangaList = self.get("manga", &[("title", title), ("limit", "1")]).await?;
        Ok(list.data.first().map(MangaSummary::from_data))
    }

    pub async fn random(&self) -> Result<Option<MangaSummary>> {
        info!("🎲 Fetching random manga");
        let entity: MangaEntity = self.get("manga/random", &[]).await?;
        Ok(entity.data.as_ref().map(MangaSummary::from_data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const FIXTURE: &str = r#"{
        "result": "ok",
        "data": [{
            "id": "abc-123",
            "type": "manga",
            "attributes": {
                "title": { "ja-ro": "Shingeki no Kyojin", "en": "Attack on Titan" },
                "description": { "en": "", "ja-ro": "Humanity fights titans." },
                "status": "completed",
                "year": 2009,
                "tags": [
                    { "attributes": { "name": { "en": "Action" } } },
                    { "attributes": { "name": { "en": "Drama" } } },
                    { "attributes": { "name": { "ja": "ホラー" } } },
                    { "attributes": { "name": { "en": "Fantasy" } } },
                    { "attributes": { "name": { "en": "Gore" } } },
                    { "attributes": { "name": { "en": "Military" } } }
                ]
            },
            "relationships": [
                { "id": "a1", "type": "author", "attributes": { "name": "Isayama Hajime" } },
                { "id": "a2", "type": "artist", "attributes": { "name": "Isayama Hajime" } },
                { "id": "c1", "type": "cover_art", "attributes": { "fileName": "cover.jpg" } },
                { "id": "x1", "type": "creator" }
            ]
        }]
    }"#;

    fn parse(json: &str) -> MangaSummary {
        let list: MangaList = serde_json::from_str(json).unwrap();
        MangaSummary::from_data(&list.data[0])
    }

    #[test]
    fn formats_full_entry() {
        let manga = parse(FIXTURE);

        assert_eq!(manga.title, "Attack on Titan");
        assert_eq!(manga.description, "Humanity fights titans.");
        assert_eq!(manga.status, "Completed");
        assert_eq!(manga.year, Some(2009));
        assert_eq!(
            manga.genres,
            vec!["Action", "Drama", "Unknown", "Fantasy", "Gore"]
        );
        assert_eq!(manga.authors, vec!["Isayama Hajime"]);
        assert_eq!(manga.artists, vec!["Isayama Hajime"]);
        assert_eq!(
            manga.cover_url.as_deref(),
            Some("https://uploads.mangadex.org/covers/abc-123/cover.jpg.256.jpg")
        );
        assert_eq!(manga.page_url, "https://mangadex.org/title/abc-123");
    }

    #[test]
    fn title_fallbacks() {
        let json = r#"{"data":[{"id":"1","attributes":{"title":{"ko":"제목","ja":"タイトル"}}}]}"#;
        assert_eq!(parse(json).title, "タイトル");

        let json = r#"{"data":[{"id":"1","attributes":{"title":{"ko":"제목"}}}]}"#;
        assert_eq!(parse(json).title, "제목");

        let json = r#"{"data":[{"id":"1","attributes":{}}]}"#;
        let manga = parse(json);
        assert_eq!(manga.title, "Unknown Title");
        assert_eq!(manga.description, "No description available.");
        assert_eq!(manga.status, "Unknown");
        assert_eq!(manga.cover_url, None);
    }

    #[test]
    fn long_descriptions_are_truncated() {
        let long = "x".repeat(400);
        let json = format!(
            r#"{{"data":[{{"id":"1","attributes":{{"description":{{"en":"{}"}}}}}}]}}"#,
            long
        );
        let manga = parse(&json);
        assert_eq!(manga.description.chars().count(), 300);
        assert!(manga.description.ends_with("..."));
    }

    #[test]
    fn random_endpoint_shape() {
        let entity: MangaEntity =
            serde_json::from_str(r#"{"result":"ok","data":{"id":"r","attributes":{"status":"ongoing"}}}"#).unwrap();
        let manga = MangaSummary::from_data(entity.data.as_ref().unwrap());
        assert_eq!(manga.status, "Ongoing");
    }
}
