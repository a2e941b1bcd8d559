//! Comandos de configuración del servidor

use anyhow::Result;
use serenity::{
    all::Timestamp,
    builder::{CreateEmbed, CreateMessage},
    model::id::{ChannelId, GuildId},
};
use tracing::info;

use crate::{
    bot::handlers::{CommandContext, CommandError},
    ui::{
        embeds::{self, colors},
        format::parse_channel_id,
    },
};

/// Valida un prefijo nuevo
pub fn validate_prefix(prefix: &str) -> Result<(), CommandError> {
    if prefix.chars().count() > 5 {
        return Err(CommandError::InvalidArgument(
            "Prefix cannot be longer than 5 characters.".to_string(),
        ));
    }
    if prefix.contains('`') || prefix.contains('@') {
        return Err(CommandError::InvalidArgument(
            "Prefix cannot contain backticks (`) or mentions (@).".to_string(),
        ));
    }
    Ok(())
}

/// Estado de un canal de texto visto desde la caché
enum ChannelCheck {
    Missing,
    NoSendPermission,
    Ok,
}

fn check_channel(cmd: &CommandContext<'_>, guild_id: GuildId, channel_id: ChannelId) -> ChannelCheck {
    let Some(guild) = guild_id.to_guild_cached(&cmd.ctx.cache) else {
        return ChannelCheck::Missing;
    };
    let Some(channel) = guild.channels.get(&channel_id) else {
        return ChannelCheck::Missing;
    };

    let bot_id = cmd.ctx.cache.current_user().id;
    match guild.members.get(&bot_id) {
        Some(me) if guild.user_permissions_in(channel, me).send_messages() => ChannelCheck::Ok,
        Some(_) => ChannelCheck::NoSendPermission,
        // Sin el miembro en caché dejamos que Discord decida
        None => ChannelCheck::Ok,
    }
}

pub async fn set_prefix(cmd: &CommandContext<'_>) -> Result<()> {
    let guild_id = cmd.guild_id()?;
    let new_prefix = cmd.args.trim();

    if new_prefix.is_empty() {
        let current = cmd.bot.storage.lock().await.guild_prefix(guild_id.get());
        let embed = embeds::info_embed(
            "📝 Current Prefix",
            format!("The current prefix for this server is: `{}`", current),
        )
        .field("Usage", format!("`{}setprefix <new_prefix>`", current), false);
        cmd.reply(embed).await?;
        return Ok(());
    }

    validate_prefix(new_prefix)?;

    cmd.bot
        .storage
        .lock()
        .await
        .set_guild_prefix(guild_id.get(), new_prefix)
        .await?;
    info!("📝 Prefix for {} changed to {}", guild_id, new_prefix);

    let embed = embeds::success_embed(
        "Prefix Updated",
        format!("Server prefix has been changed to: `{}`", new_prefix),
    )
    .field("Example Usage", format!("`{}help`", new_prefix), false);
    cmd.reply(embed).await?;
    Ok(())
}

pub async fn set_log_channel(cmd: &CommandContext<'_>) -> Result<()> {
    let guild_id = cmd.guild_id()?;
    let raw = cmd.args.trim();

    if raw.is_empty() {
        let current = cmd.bot.storage.lock().await.log_channel(guild_id.get());
        let embed = match current {
            None => embeds::info_embed(
                "📋 No Log Channel",
                "No log channel is currently set for this server.",
            )
            .field("Usage", format!("`{}setlogchannel #channel`", cmd.prefix), false),
            Some(id) => match check_channel(cmd, guild_id, ChannelId::new(id)) {
                ChannelCheck::Missing => {
                    cmd.bot
                        .storage
                        .lock()
                        .await
                        .set_log_channel(guild_id.get(), None)
                        .await?;
                    embeds::error_embed(
                        "Invalid Log Channel",
                        "The set log channel no longer exists. It has been cleared.",
                    )
                }
                _ => embeds::info_embed(
                    "📋 Current Log Channel",
                    format!("The current log channel is: <#{}>", id),
                ),
            },
        };
        cmd.reply(embed).await?;
        return Ok(());
    }

    let channel_id = parse_channel_id(raw)
        .map(ChannelId::new)
        .ok_or_else(|| CommandError::InvalidArgument(format!("`{}` is not a valid channel.", raw)))?;

    match check_channel(cmd, guild_id, channel_id) {
        ChannelCheck::Missing => {
            return Err(CommandError::InvalidArgument("That channel is not in this server.".to_string()).into())
        }
        ChannelCheck::NoSendPermission => {
            cmd.reply(embeds::error_embed(
                "No Permission",
                format!("I don't have permission to send messages in <#{}>.", channel_id),
            ))
            .await?;
            return Ok(());
        }
        ChannelCheck::Ok => {}
    }

    cmd.bot
        .storage
        .lock()
        .await
        .set_log_channel(guild_id.get(), Some(channel_id.get()))
        .await?;
    info!("🛡️ Log channel for {} set to {}", guild_id, channel_id);

    cmd.reply(embeds::success_embed(
        "Log Channel Set",
        format!("Moderation logs will now be sent to <#{}>.", channel_id),
    ))
    .await?;

    let test = CreateEmbed::default()
        .title("🛡️ Log Channel Configured")
        .description("This channel has been set as the moderation log channel.")
        .color(colors::INFO_BLUE)
        .field("Configured by", format!("<@{}>", cmd.msg.author.id), true)
        .timestamp(Timestamp::now());
    channel_id
        .send_message(&cmd.ctx.http, CreateMessage::new().embed(test))
        .await?;
    Ok(())
}

pub async fn clear_log_channel(cmd: &CommandContext<'_>) -> Result<()> {
    let guild_id = cmd.guild_id()?;
    let mut storage = cmd.bot.storage.lock().await;

    if storage.log_channel(guild_id.get()).is_none() {
        drop(storage);
        cmd.reply(embeds::error_embed("No Log Channel", "No log channel is currently set."))
            .await?;
        return Ok(());
    }

    storage.set_log_channel(guild_id.get(), None).await?;
    drop(storage);

    cmd.reply(embeds::success_embed(
        "Log Channel Cleared",
        "The log channel has been removed. Moderation actions will no longer be logged.",
    ))
    .await?;
    Ok(())
}

pub async fn settings(cmd: &CommandContext<'_>) -> Result<()> {
    let guild_id = cmd.guild_id()?;
    let (prefix, log_channel) = {
        let storage = cmd.bot.storage.lock().await;
        (
            storage.guild_prefix(guild_id.get()),
            storage.log_channel(guild_id.get()),
        )
    };

    let log_value = match log_channel {
        None => "Not Set".to_string(),
        Some(id) => match check_channel(cmd, guild_id, ChannelId::new(id)) {
            ChannelCheck::Missing => "❌ Invalid Channel".to_string(),
            _ => format!("<#{}>", id),
        },
    };

    let guild_name = guild_id
        .name(&cmd.ctx.cache)
        .unwrap_or_else(|| "this server".to_string());

    let embed = CreateEmbed::default()
        .title("⚙️ Server Settings")
        .description(format!("Configuration for **{}**", guild_name))
        .color(colors::INFO_BLUE)
        .field("Prefix", format!("`{}`", prefix), true)
        .field("Log Channel", log_value, true)
        .field(
            "Music",
            format!(
                "Max queue: {} songs\nDefault volume: {}%",
                cmd.bot.config.max_queue_size, cmd.bot.config.default_volume
            ),
            false,
        );
    cmd.reply(embed).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_rules() {
        assert!(validate_prefix("!").is_ok());
        assert!(validate_prefix("x!").is_ok());
        assert!(validate_prefix("12345").is_ok());
        assert!(validate_prefix("123456").is_err());
        assert!(validate_prefix("`").is_err());
        assert!(validate_prefix("@!").is_err());
    }
}
