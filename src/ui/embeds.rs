use serenity::{
    all::Timestamp,
    builder::{CreateEmbed, CreateEmbedFooter},
};

use crate::{
    audio::queue::{QueueItem, RepeatMode},
    manga::MangaSummary,
    ui::format::{display_duration, format_duration},
};

/// Paleta de colores estandarizada para el bot
pub mod colors {
    use serenity::all::Colour;

    pub const SUCCESS_GREEN: Colour = Colour::from_rgb(67, 181, 129);
    pub const ERROR_RED: Colour = Colour::from_rgb(220, 53, 69);
    pub const WARNING_ORANGE: Colour = Colour::from_rgb(255, 193, 7);
    pub const INFO_BLUE: Colour = Colour::from_rgb(52, 144, 220);
    pub const MUSIC_PURPLE: Colour = Colour::from_rgb(138, 43, 226);
    pub const NEUTRAL_GRAY: Colour = Colour::from_rgb(108, 117, 125);
}

const STANDARD_FOOTER: &str = "Multi-Purpose Bot";

pub fn success_embed(title: &str, description: impl Into<String>) -> CreateEmbed {
    CreateEmbed::default()
        .title(format!("✅ {}", title))
        .description(description)
        .color(colors::SUCCESS_GREEN)
}

pub fn error_embed(title: &str, description: impl Into<String>) -> CreateEmbed {
    CreateEmbed::default()
        .title(format!("❌ {}", title))
        .description(description)
        .color(colors::ERROR_RED)
}

pub fn warning_embed(title: &str, description: impl Into<String>) -> CreateEmbed {
    CreateEmbed::default()
        .title(format!("⚠️ {}", title))
        .description(description)
        .color(colors::WARNING_ORANGE)
}

/// Embed informativo con título libre (el emoji lo pone quien llama)
pub fn info_embed(title: impl Into<String>, description: impl Into<String>) -> CreateEmbed {
    CreateEmbed::default()
        .title(title)
        .description(description)
        .color(colors::INFO_BLUE)
}

/// Crea un embed para mostrar la canción actual
pub fn now_playing_embed(item: &QueueItem, volume: u8) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title("🎵 Now Playing")
        .description(format!("**{}**", item.title))
        .color(colors::MUSIC_PURPLE)
        .field(
            "Uploader",
            item.source_label.as_deref().unwrap_or("Unknown"),
            true,
        )
        .field("Requested by", format!("<@{}>", item.requested_by), true)
        .field("Duration", display_duration(item.duration), true)
        .field("Volume", format!("{}%", volume), true)
        .field("Source", item.source.source_type().label(), true);

    if let Some(thumbnail) = &item.thumbnail {
        embed = embed.thumbnail(thumbnail);
    }
    if let Some(url) = &item.url {
        embed = embed.url(url);
    }

    embed
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

pub fn track_added_embed(item: &QueueItem, position: usize) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title("📝 Added to Queue")
        .description(format!("**{}** has been added to the queue.", item.title))
        .color(colors::INFO_BLUE)
        .field("Position", position.to_string(), true)
        .field("Requested by", format!("<@{}>", item.requested_by), true)
        .field("Duration", display_duration(item.duration), true)
        .field("Source", item.source.source_type().label(), true);

    if let Some(thumbnail) = &item.thumbnail {
        embed = embed.thumbnail(thumbnail);
    }

    embed
}

pub fn queue_finished_embed() -> CreateEmbed {
    success_embed("Queue Finished", "No more songs in queue.")
}

/// Estado de la cola que se muestra en `queue`
pub struct QueueView<'a> {
    pub current: Option<&'a QueueItem>,
    pub upcoming: Vec<&'a QueueItem>,
    pub total_pending: usize,
    pub total_duration: std::time::Duration,
    pub repeat_mode: RepeatMode,
    pub shuffle: bool,
}

pub fn queue_embed(view: &QueueView<'_>) -> CreateEmbed {
    if view.total_pending == 0 && view.current.is_none() {
        return CreateEmbed::default()
            .title("📝 Queue Empty")
            .description("The music queue is empty.")
            .color(colors::NEUTRAL_GRAY);
    }

    let mut embed = CreateEmbed::default()
        .title("📝 Music Queue")
        .color(colors::INFO_BLUE);

    if let Some(current) = view.current {
        embed = embed.field(
            "🎵 Now Playing",
            format!("**{}** | <@{}>", current.title, current.requested_by),
            false,
        );
    }

    if view.upcoming.is_empty() {
        embed = embed.description("Nothing queued after the current song.");
    } else {
        let mut lines: Vec<String> = view
            .upcoming
            .iter()
            .enumerate()
            .map(|(i, item)| {
                format!(
                    "`{}.` **{}** [{}] | <@{}>",
                    i + 1,
                    item.title,
                    display_duration(item.duration),
                    item.requested_by
                )
            })
            .collect();

        let hidden = view.total_pending.saturating_sub(view.upcoming.len());
        if hidden > 0 {
            lines.push(format!("*And {} more...*", hidden));
        }
        embed = embed.description(lines.join("\n"));
    }

    let repeat = match view.repeat_mode {
        RepeatMode::Off => "➡️ Off",
        RepeatMode::Song => "🔂 Song",
        RepeatMode::Queue => "🔁 Queue",
    };

    embed
        .field("Songs", view.total_pending.to_string(), true)
        .field(
            "Total Duration",
            format_duration(view.total_duration.as_secs()),
            true,
        )
        .field("Repeat", repeat, true)
        .field("Shuffle", if view.shuffle { "🔀 On" } else { "Off" }, true)
}

/// Embed de MangaDex
pub fn manga_embed(manga: &MangaSummary) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title(&manga.title)
        .description(&manga.description)
        .url(&manga.page_url)
        .color(colors::INFO_BLUE)
        .field("Status", &manga.status, true);

    if let Some(year) = manga.year {
        embed = embed.field("Year", year.to_string(), true);
    }
    if !manga.genres.is_empty() {
        embed = embed.field("Genres", manga.genres.join(", "), false);
    }
    if !manga.authors.is_empty() {
        embed = embed.field("Author(s)", manga.authors.join(", "), true);
    }
    if !manga.artists.is_empty() {
        embed = embed.field("Artist(s)", manga.artists.join(", "), true);
    }
    if let Some(cover) = &manga.cover_url {
        embed = embed.thumbnail(cover);
    }

    embed.footer(
        CreateEmbedFooter::new("Data from MangaDex").icon_url("https://mangadex.org/favicon.ico"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::{SourceType, TrackSource};
    use pretty_assertions::assert_eq;
    use serenity::model::id::UserId;

    fn field<'a>(embed: &'a serde_json::Value, name: &str) -> Option<&'a str> {
        embed["fields"]
            .as_array()?
            .iter()
            .find(|f| f["name"] == name)
            .and_then(|f| f["value"].as_str())
    }

    #[test]
    fn track_embeds_show_the_source() {
        let youtube = QueueItem::from(TrackSource::new(
            "Song".to_string(),
            "https://youtu.be/abc".to_string(),
            SourceType::YouTube,
            UserId::new(3),
        ));
        let web = QueueItem::from(TrackSource::new(
            "Stream".to_string(),
            "https://radio.example/live.mp3".to_string(),
            SourceType::DirectUrl,
            UserId::new(3),
        ));

        let playing = serde_json::to_value(now_playing_embed(&youtube, 50)).unwrap();
        assert_eq!(field(&playing, "Source"), Some("YouTube"));
        assert_eq!(field(&playing, "Volume"), Some("50%"));

        let added = serde_json::to_value(track_added_embed(&web, 4)).unwrap();
        assert_eq!(field(&added, "Source"), Some("Web"));
        assert_eq!(field(&added, "Position"), Some("4"));
    }
}
