//! Comandos de música: conectan la cola del guild con el reproductor

use anyhow::Result;
use serenity::model::id::{ChannelId, GuildId, UserId};
use std::sync::Arc;
use tracing::info;

use crate::{
    audio::queue::{QueueError, QueueItem},
    bot::handlers::{CommandContext, CommandError},
    sources,
    ui::embeds::{self, QueueView},
};

type Call = Arc<tokio::sync::Mutex<songbird::Call>>;

/// Canal de voz del autor según la caché
fn author_voice_channel(cmd: &CommandContext<'_>, guild_id: GuildId, user_id: UserId) -> Option<ChannelId> {
    let guild = guild_id.to_guild_cached(&cmd.ctx.cache)?;
    guild.voice_states.get(&user_id).and_then(|state| state.channel_id)
}

async fn connected_call(cmd: &CommandContext<'_>, guild_id: GuildId) -> Result<Call, CommandError> {
    cmd.bot
        .voice_call(cmd.ctx, guild_id)
        .await
        .ok_or(CommandError::NotConnected)
}

/// Posición de la interfaz (desde 1) a índice de la cola
fn parse_position(raw: &str) -> Result<usize, CommandError> {
    match raw.parse::<usize>() {
        Ok(position) if position >= 1 => Ok(position - 1),
        _ => Err(CommandError::InvalidArgument(format!(
            "`{}` is not a valid queue position.",
            raw
        ))),
    }
}

/// Los índices de la cola se muestran desde 1
fn one_based(err: QueueError) -> CommandError {
    match err {
        QueueError::IndexOutOfRange { len, .. } if len == 0 => {
            CommandError::InvalidArgument("The queue is empty.".to_string())
        }
        QueueError::IndexOutOfRange { len, .. } => {
            CommandError::InvalidArgument(format!("Position must be between 1 and {}.", len))
        }
        other => other.into(),
    }
}

pub async fn join(cmd: &CommandContext<'_>) -> Result<()> {
    let guild_id = cmd.guild_id()?;
    let channel_id =
        author_voice_channel(cmd, guild_id, cmd.msg.author.id).ok_or(CommandError::NotInVoice)?;

    cmd.bot.join_voice_channel(cmd.ctx, guild_id, channel_id).await?;
    cmd.bot.player.set_text_channel(guild_id, cmd.msg.channel_id);

    cmd.reply(embeds::info_embed(
        "🎵 Joined Voice Channel",
        format!("Connected to <#{}>", channel_id),
    ))
    .await?;
    Ok(())
}

pub async fn leave(cmd: &CommandContext<'_>) -> Result<()> {
    let guild_id = cmd.guild_id()?;
    connected_call(cmd, guild_id).await?;

    cmd.bot.leave_voice_channel(cmd.ctx, guild_id).await?;

    cmd.reply(embeds::info_embed(
        "👋 Left Voice Channel",
        "Disconnected from voice channel and cleared queue.",
    ))
    .await?;
    Ok(())
}

/// `play` y `playnext`: resuelve la consulta, encola y arranca si está parado
pub async fn play(cmd: &CommandContext<'_>, play_next: bool) -> Result<()> {
    let guild_id = cmd.guild_id()?;
    let query = cmd.required_text("query")?;
    let channel_id =
        author_voice_channel(cmd, guild_id, cmd.msg.author.id).ok_or(CommandError::NotInVoice)?;

    let max = cmd.bot.config.max_queue_size;
    let queue = cmd.bot.player.queue(guild_id);
    if queue.lock().len() >= max {
        return Err(CommandError::QueueFull(max).into());
    }

    let call = match cmd.bot.voice_call(cmd.ctx, guild_id).await {
        Some(call) => call,
        None => cmd.bot.join_voice_channel(cmd.ctx, guild_id, channel_id).await?,
    };
    cmd.bot.player.set_text_channel(guild_id, cmd.msg.channel_id);

    let _ = cmd.msg.channel_id.broadcast_typing(&cmd.ctx.http).await;

    let track = match sources::resolve_track(cmd.bot.source.as_ref(), query, cmd.msg.author.id).await {
        Ok(track) => track,
        Err(e) => {
            cmd.reply(embeds::error_embed("Error Playing Music", format!("An error occurred: {}", e)))
                .await?;
            return Ok(());
        }
    };
    let item = QueueItem::from(track);

    let (position, duplicate) = {
        let mut q = queue.lock();
        // La resolución tarda; otro comando pudo llenar la cola mientras tanto
        if q.len() >= max {
            return Err(CommandError::QueueFull(max).into());
        }

        let duplicate = item.url.as_deref().is_some_and(|url| q.contains_url(url));
        if play_next {
            q.insert_next(item.clone());
            (1, duplicate)
        } else {
            q.enqueue(item.clone());
            (q.len(), duplicate)
        }
    };

    if duplicate {
        cmd.reply(embeds::warning_embed(
            "Already Queued",
            format!("**{}** is already in the queue. Adding it again.", item.title),
        ))
        .await?;
    }

    let started = cmd
        .bot
        .player
        .start_if_idle(guild_id, call, cmd.ctx.http.clone())
        .await?;
    if !started {
        cmd.reply(embeds::track_added_embed(&item, position)).await?;
    }

    Ok(())
}

pub async fn skip(cmd: &CommandContext<'_>) -> Result<()> {
    let guild_id = cmd.guild_id()?;
    let call = connected_call(cmd, guild_id).await?;
    if !cmd.bot.player.is_active(guild_id) {
        return Err(CommandError::NothingPlaying.into());
    }

    cmd.reply(embeds::info_embed("⏭️ Song Skipped", "Skipped to the next song."))
        .await?;
    cmd.bot
        .player
        .skip(guild_id, call, cmd.ctx.http.clone())
        .await?;
    Ok(())
}

pub async fn stop(cmd: &CommandContext<'_>) -> Result<()> {
    let guild_id = cmd.guild_id()?;
    connected_call(cmd, guild_id).await?;

    cmd.bot.player.stop(guild_id);

    cmd.reply(embeds::info_embed("⏹️ Music Stopped", "Stopped music and cleared the queue."))
        .await?;
    Ok(())
}

pub async fn pause(cmd: &CommandContext<'_>) -> Result<()> {
    let guild_id = cmd.guild_id()?;
    if cmd.bot.player.is_paused(guild_id).await || !cmd.bot.player.pause(guild_id) {
        return Err(CommandError::NothingPlaying.into());
    }

    cmd.reply(embeds::info_embed("⏸️ Music Paused", "Music has been paused."))
        .await?;
    Ok(())
}

pub async fn resume(cmd: &CommandContext<'_>) -> Result<()> {
    let guild_id = cmd.guild_id()?;
    if !cmd.bot.player.is_paused(guild_id).await {
        cmd.reply(embeds::error_embed("Music Not Paused", "Music is not currently paused."))
            .await?;
        return Ok(());
    }

    cmd.bot.player.resume(guild_id);
    cmd.reply(embeds::info_embed("▶️ Music Resumed", "Music has been resumed."))
        .await?;
    Ok(())
}

pub async fn queue(cmd: &CommandContext<'_>) -> Result<()> {
    let guild_id = cmd.guild_id()?;
    let queue = cmd.bot.player.queue(guild_id);

    let embed = {
        let q = queue.lock();
        embeds::queue_embed(&QueueView {
            current: q.current(),
            upcoming: q.peek_next(10),
            total_pending: q.len(),
            total_duration: q.total_duration(),
            repeat_mode: q.repeat_mode(),
            shuffle: q.is_shuffle(),
        })
    };

    cmd.reply(embed).await?;
    Ok(())
}

pub async fn now_playing(cmd: &CommandContext<'_>) -> Result<()> {
    let guild_id = cmd.guild_id()?;
    if !cmd.bot.player.is_active(guild_id) {
        return Err(CommandError::NothingPlaying.into());
    }

    let current = cmd.bot.player.queue(guild_id).lock().current().cloned();
    let item = current.ok_or(CommandError::NothingPlaying)?;

    cmd.reply(embeds::now_playing_embed(&item, cmd.bot.player.volume(guild_id)))
        .await?;
    Ok(())
}

pub async fn volume(cmd: &CommandContext<'_>) -> Result<()> {
    let guild_id = cmd.guild_id()?;
    connected_call(cmd, guild_id).await?;

    let max = cmd.bot.config.max_volume;
    let raw = cmd.args.trim();
    if raw.is_empty() {
        cmd.reply(embeds::info_embed(
            "🔊 Volume",
            format!("Current volume is {}%", cmd.bot.player.volume(guild_id)),
        ))
        .await?;
        return Ok(());
    }

    let volume = match raw.trim_end_matches('%').parse::<u8>() {
        Ok(v) if v <= max => v,
        _ => {
            return Err(CommandError::InvalidArgument(format!(
                "Volume must be between 0 and {}.",
                max
            ))
            .into())
        }
    };

    cmd.bot.player.set_volume(guild_id, volume);

    cmd.reply(embeds::info_embed("🔊 Volume Changed", format!("Volume set to {}%", volume)))
        .await?;
    Ok(())
}

pub async fn repeat(cmd: &CommandContext<'_>) -> Result<()> {
    let guild_id = cmd.guild_id()?;
    let (mode, _) = cmd.required_arg("mode")?;

    let mode = cmd
        .bot
        .player
        .queue(guild_id)
        .lock()
        .set_repeat(&mode.to_lowercase())
        .map_err(CommandError::from)?;

    info!("🔁 Repeat mode in {} set to {}", guild_id, mode);
    cmd.reply(embeds::info_embed(
        "🔁 Repeat Mode",
        format!("Repeat mode set to **{}**.", mode),
    ))
    .await?;
    Ok(())
}

pub async fn shuffle(cmd: &CommandContext<'_>) -> Result<()> {
    let guild_id = cmd.guild_id()?;
    let enabled = cmd.bot.player.queue(guild_id).lock().toggle_shuffle();

    let state = if enabled { "enabled" } else { "disabled" };
    cmd.reply(embeds::info_embed("🔀 Shuffle", format!("Shuffle {}.", state)))
        .await?;
    Ok(())
}

pub async fn remove(cmd: &CommandContext<'_>) -> Result<()> {
    let guild_id = cmd.guild_id()?;
    let (raw, _) = cmd.required_arg("position")?;
    let index = parse_position(raw)?;

    let removed = cmd
        .bot
        .player
        .queue(guild_id)
        .lock()
        .remove(index)
        .map_err(one_based)?;

    cmd.reply(embeds::success_embed(
        "Song Removed",
        format!("Removed **{}** from the queue.", removed.title),
    ))
    .await?;
    Ok(())
}

pub async fn move_item(cmd: &CommandContext<'_>) -> Result<()> {
    let guild_id = cmd.guild_id()?;
    let (from_raw, rest) = cmd.required_arg("from")?;
    let (to_raw, _) = crate::bot::commands::split_first(rest);
    if to_raw.is_empty() {
        return Err(CommandError::MissingArgument {
            name: "to",
            usage: format!("{}move <from> <to>", cmd.prefix),
        }
        .into());
    }
    let from = parse_position(from_raw)?;
    let to = parse_position(to_raw)?;

    let title = {
        let queue = cmd.bot.player.queue(guild_id);
        let mut q = queue.lock();
        q.move_item(from, to).map_err(one_based)?;
        q.get(to).map(|item| item.title.clone())
    };

    cmd.reply(embeds::success_embed(
        "Song Moved",
        format!(
            "Moved **{}** from position {} to {}.",
            title.unwrap_or_default(),
            from + 1,
            to + 1
        ),
    ))
    .await?;
    Ok(())
}

pub async fn search(cmd: &CommandContext<'_>) -> Result<()> {
    let guild_id = cmd.guild_id()?;
    let text = cmd.required_text("text")?;

    let lines: Vec<String> = {
        let queue = cmd.bot.player.queue(guild_id);
        let q = queue.lock();
        q.find_by_title(text)
            .into_iter()
            .take(10)
            .map(|(index, item)| format!("`{}.` **{}**", index + 1, item.title))
            .collect()
    };

    let embed = if lines.is_empty() {
        embeds::warning_embed("No Matches", format!("Nothing in the queue matches `{}`.", text))
    } else {
        embeds::info_embed("🔍 Queue Search", lines.join("\n"))
    };
    cmd.reply(embed).await?;
    Ok(())
}

pub async fn clear(cmd: &CommandContext<'_>) -> Result<()> {
    let guild_id = cmd.guild_id()?;
    cmd.bot.player.queue(guild_id).lock().clear();

    cmd.reply(embeds::success_embed(
        "Queue Cleared",
        "The queue is now empty. The current song will finish playing.",
    ))
    .await?;
    Ok(())
}
