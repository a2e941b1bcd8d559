//! Comandos de moderación con registro en el canal de logs

use anyhow::Result;
use chrono::Utc;
use serenity::{
    all::Timestamp,
    builder::{CreateEmbed, CreateEmbedFooter, CreateMessage, EditMember},
    http::HttpError,
    model::{
        guild::Member,
        id::{ChannelId, GuildId, UserId},
        user::User,
    },
};
use tracing::{info, warn};

use crate::{
    bot::{
        commands::split_first,
        handlers::{CommandContext, CommandError},
        permissions,
    },
    ui::{
        embeds::{self, colors},
        format::{clean_content, parse_time, parse_user_id, truncate},
    },
};

const NO_REASON: &str = "No reason provided";
const DEFAULT_QUARANTINE_MINUTES: u64 = 60;
/// Discord no permite timeouts de más de 28 días
const MAX_TIMEOUT_SECS: u64 = 28 * 24 * 3600;

fn status_code(err: &serenity::Error) -> Option<u16> {
    match err {
        serenity::Error::Http(HttpError::UnsuccessfulRequest(response)) => {
            Some(response.status_code.as_u16())
        }
        _ => None,
    }
}

/// Error de Discord traducido al embed que ve el moderador
fn discord_failure(err: serenity::Error, action: &str) -> anyhow::Error {
    match status_code(&err) {
        Some(403) => CommandError::InvalidArgument(format!(
            "I don't have permission to {} members.",
            action
        ))
        .into(),
        _ => err.into(),
    }
}

fn reason_or_default(text: &str) -> &str {
    let text = text.trim();
    if text.is_empty() {
        NO_REASON
    } else {
        text
    }
}

/// Razón para el registro de auditoría (máx. 512 caracteres)
fn audit_reason(verb: &str, moderator: &User, reason: &str) -> String {
    truncate(&format!("{} by {}: {}", verb, moderator.name, reason), 512)
}

/// Quarantine acepta minutos ("30") o un tiempo compuesto ("1h30m")
fn parse_quarantine_duration(raw: &str) -> Option<u64> {
    match raw.parse::<u64>() {
        Ok(minutes) if minutes > 0 => minutes.checked_mul(60),
        Ok(_) => None,
        Err(_) => parse_time(raw),
    }
}

fn describe_duration(secs: u64) -> String {
    humantime::format_duration(std::time::Duration::from_secs(secs)).to_string()
}

async fn target_member(cmd: &CommandContext<'_>, guild_id: GuildId, raw: &str) -> Result<Member> {
    let user_id = parse_user_id(raw)
        .ok_or_else(|| CommandError::InvalidArgument(format!("`{}` is not a valid member.", raw)))?;

    guild_id
        .member(cmd.ctx, UserId::new(user_id))
        .await
        .map_err(|_| CommandError::InvalidArgument("Member not found in this server.".to_string()).into())
}

/// Comprueba la jerarquía de roles entre autor, bot y objetivo
async fn ensure_hierarchy(
    cmd: &CommandContext<'_>,
    guild_id: GuildId,
    target: &Member,
    action: &str,
) -> Result<()> {
    let bot_id = cmd.ctx.cache.current_user().id;
    let bot_member = guild_id.member(cmd.ctx, bot_id).await?;

    let author_roles = cmd
        .msg
        .member
        .as_ref()
        .map(|m| m.roles.clone())
        .unwrap_or_default();

    let author_top = permissions::top_role_position(cmd.ctx, guild_id, &author_roles);
    let target_top = permissions::top_role_position(cmd.ctx, guild_id, &target.roles);
    let bot_top = permissions::top_role_position(cmd.ctx, guild_id, &bot_member.roles);
    let author_is_owner = permissions::owner_id(cmd.ctx, guild_id) == Some(cmd.msg.author.id);

    permissions::check_hierarchy(author_top, target_top, bot_top, author_is_owner).map_err(|denial| {
        CommandError::InvalidArgument(denial.message(action)).into()
    })
}

fn action_embed(title: &str, colour: serenity::all::Colour, lines: &[(&str, String)]) -> CreateEmbed {
    let description = lines
        .iter()
        .map(|(label, value)| format!("**{}:** {}", label, value))
        .collect::<Vec<_>>()
        .join("\n");

    CreateEmbed::default()
        .title(title)
        .description(description)
        .color(colour)
        .timestamp(Timestamp::now())
}

/// Publica la acción en el canal de logs del servidor, si hay uno
async fn log_action(cmd: &CommandContext<'_>, guild_id: GuildId, action: &str, target: &User, reason: &str) {
    let Some(channel_id) = cmd.bot.storage.lock().await.log_channel(guild_id.get()) else {
        return;
    };

    let embed = CreateEmbed::default()
        .title(format!("🛡️ Moderation Action: {}", action))
        .color(colors::INFO_BLUE)
        .field("Moderator", format!("<@{}>", cmd.msg.author.id), true)
        .field("Target", target.tag(), true)
        .field("Reason", reason, false)
        .footer(CreateEmbedFooter::new(format!("User ID: {}", target.id)))
        .timestamp(Timestamp::now());

    if let Err(e) = ChannelId::new(channel_id)
        .send_message(&cmd.ctx.http, CreateMessage::new().embed(embed))
        .await
    {
        warn!("⚠️ Could not write to log channel {}: {}", channel_id, e);
    }
}

pub async fn ban(cmd: &CommandContext<'_>) -> Result<()> {
    let guild_id = cmd.guild_id()?;
    let (raw_member, rest) = cmd.required_arg("member")?;
    let reason = reason_or_default(rest);

    let member = target_member(cmd, guild_id, raw_member).await?;
    ensure_hierarchy(cmd, guild_id, &member, "ban").await?;

    guild_id
        .ban_with_reason(&cmd.ctx.http, member.user.id, 0, audit_reason("Banned", &cmd.msg.author, reason))
        .await
        .map_err(|e| discord_failure(e, "ban"))?;
    info!("🔨 {} banned {} in {}", cmd.msg.author.name, member.user.name, guild_id);

    let embed = action_embed(
        "🔨 Member Banned",
        colors::ERROR_RED,
        &[
            ("Member", format!("<@{}>", member.user.id)),
            ("Moderator", format!("<@{}>", cmd.msg.author.id)),
            ("Reason", reason.to_string()),
        ],
    )
    .thumbnail(member.face());
    cmd.reply(embed).await?;

    log_action(cmd, guild_id, "BAN", &member.user, reason).await;
    Ok(())
}

pub async fn kick(cmd: &CommandContext<'_>) -> Result<()> {
    let guild_id = cmd.guild_id()?;
    let (raw_member, rest) = cmd.required_arg("member")?;
    let reason = reason_or_default(rest);

    let member = target_member(cmd, guild_id, raw_member).await?;
    ensure_hierarchy(cmd, guild_id, &member, "kick").await?;

    guild_id
        .kick_with_reason(&cmd.ctx.http, member.user.id, &audit_reason("Kicked", &cmd.msg.author, reason))
        .await
        .map_err(|e| discord_failure(e, "kick"))?;
    info!("👢 {} kicked {} in {}", cmd.msg.author.name, member.user.name, guild_id);

    let embed = action_embed(
        "👢 Member Kicked",
        colors::WARNING_ORANGE,
        &[
            ("Member", format!("<@{}>", member.user.id)),
            ("Moderator", format!("<@{}>", cmd.msg.author.id)),
            ("Reason", reason.to_string()),
        ],
    )
    .thumbnail(member.face());
    cmd.reply(embed).await?;

    log_action(cmd, guild_id, "KICK", &member.user, reason).await;
    Ok(())
}

pub async fn warn(cmd: &CommandContext<'_>) -> Result<()> {
    let guild_id = cmd.guild_id()?;
    let (raw_member, rest) = cmd.required_arg("member")?;
    let reason = reason_or_default(rest);

    let member = target_member(cmd, guild_id, raw_member).await?;

    let count = cmd
        .bot
        .storage
        .lock()
        .await
        .add_warning(guild_id.get(), member.user.id.get(), cmd.msg.author.id.get(), reason)
        .await?;

    let embed = action_embed(
        "⚠️ Member Warned",
        colors::WARNING_ORANGE,
        &[
            ("Member", format!("<@{}>", member.user.id)),
            ("Moderator", format!("<@{}>", cmd.msg.author.id)),
            ("Reason", reason.to_string()),
            ("Warning Count", count.to_string()),
        ],
    )
    .thumbnail(member.face());
    cmd.reply(embed).await?;

    // Los MDs pueden estar desactivados
    let guild_name = guild_id
        .name(&cmd.ctx.cache)
        .unwrap_or_else(|| "Unknown server".to_string());
    let dm = action_embed(
        "⚠️ You've been warned",
        colors::WARNING_ORANGE,
        &[
            ("Server", guild_name),
            ("Moderator", cmd.msg.author.tag()),
            ("Reason", reason.to_string()),
            ("Total Warnings", count.to_string()),
        ],
    );
    if let Err(e) = member
        .user
        .direct_message(&cmd.ctx.http, CreateMessage::new().embed(dm))
        .await
    {
        info!("Could not DM warning to {}: {}", member.user.name, e);
    }

    log_action(cmd, guild_id, "WARN", &member.user, reason).await;
    Ok(())
}

pub async fn warnings(cmd: &CommandContext<'_>) -> Result<()> {
    let guild_id = cmd.guild_id()?;
    let (raw_member, _) = cmd.required_arg("member")?;
    let member = target_member(cmd, guild_id, raw_member).await?;

    let warnings = cmd
        .bot
        .storage
        .lock()
        .await
        .warnings(guild_id.get(), member.user.id.get())
        .to_vec();

    if warnings.is_empty() {
        cmd.reply(embeds::success_embed(
            "No Warnings",
            format!("<@{}> has no warnings.", member.user.id),
        ))
        .await?;
        return Ok(());
    }

    let mut embed = CreateEmbed::default()
        .title("📋 Warning History")
        .description(format!(
            "**Member:** <@{}>\n**Total Warnings:** {}",
            member.user.id,
            warnings.len()
        ))
        .color(colors::WARNING_ORANGE);

    let recent = &warnings[warnings.len().saturating_sub(5)..];
    for (i, warning) in recent.iter().enumerate() {
        let moderator = cmd
            .ctx
            .cache
            .member(guild_id, UserId::new(warning.moderator_id))
            .map(|m| m.display_name().to_string())
            .unwrap_or_else(|| "Unknown".to_string());

        embed = embed.field(
            format!("Warning {}", i + 1),
            format!(
                "**Moderator:** {}\n**Reason:** {}\n**Date:** {}",
                moderator,
                clean_content(&warning.reason, 200),
                warning.timestamp.format("%Y-%m-%d")
            ),
            false,
        );
    }

    cmd.reply(embed).await?;
    Ok(())
}

pub async fn clear_warnings(cmd: &CommandContext<'_>) -> Result<()> {
    let guild_id = cmd.guild_id()?;
    let (raw_member, _) = cmd.required_arg("member")?;
    let member = target_member(cmd, guild_id, raw_member).await?;

    let cleared = {
        let mut storage = cmd.bot.storage.lock().await;
        let count = storage.warnings(guild_id.get(), member.user.id.get()).len();
        if count > 0 {
            storage
                .clear_warnings(guild_id.get(), member.user.id.get())
                .await?;
        }
        count
    };

    if cleared == 0 {
        cmd.reply(embeds::info_embed(
            "📋 No Warnings",
            format!("<@{}> has no warnings to clear.", member.user.id),
        ))
        .await?;
        return Ok(());
    }

    cmd.reply(embeds::success_embed(
        "Warnings Cleared",
        format!("Removed {} warning(s) from <@{}>.", cleared, member.user.id),
    ))
    .await?;

    let summary = format!("{} warning(s) removed", cleared);
    log_action(cmd, guild_id, "CLEAR WARNINGS", &member.user, &summary).await;
    Ok(())
}

pub async fn quarantine(cmd: &CommandContext<'_>) -> Result<()> {
    let guild_id = cmd.guild_id()?;
    let (raw_member, rest) = cmd.required_arg("member")?;

    let (maybe_duration, after) = split_first(rest);
    let (secs, reason) = match parse_quarantine_duration(maybe_duration) {
        Some(secs) => (secs, reason_or_default(after)),
        None => (DEFAULT_QUARANTINE_MINUTES * 60, reason_or_default(rest)),
    };
    if secs > MAX_TIMEOUT_SECS {
        return Err(CommandError::InvalidArgument("Timeouts cannot be longer than 28 days.".to_string()).into());
    }

    let member = target_member(cmd, guild_id, raw_member).await?;
    ensure_hierarchy(cmd, guild_id, &member, "quarantine").await?;

    let until = Timestamp::from_unix_timestamp(Utc::now().timestamp() + secs as i64)?;
    let audit = audit_reason("Quarantined", &cmd.msg.author, reason);
    let builder = EditMember::new()
        .disable_communication_until_datetime(until)
        .audit_log_reason(&audit);
    guild_id
        .edit_member(cmd.ctx, member.user.id, builder)
        .await
        .map_err(|e| discord_failure(e, "timeout"))?;

    let duration = describe_duration(secs);
    info!("🔒 {} quarantined {} for {}", cmd.msg.author.name, member.user.name, duration);

    let embed = action_embed(
        "🔒 Member Quarantined",
        colors::WARNING_ORANGE,
        &[
            ("Member", format!("<@{}>", member.user.id)),
            ("Moderator", format!("<@{}>", cmd.msg.author.id)),
            ("Duration", duration.clone()),
            ("Reason", reason.to_string()),
        ],
    )
    .thumbnail(member.face());
    cmd.reply(embed).await?;

    log_action(
        cmd,
        guild_id,
        "QUARANTINE",
        &member.user,
        &format!("{} ({})", reason, duration),
    )
    .await;
    Ok(())
}

pub async fn hackban(cmd: &CommandContext<'_>) -> Result<()> {
    let guild_id = cmd.guild_id()?;
    let (raw_id, rest) = cmd.required_arg("user_id")?;
    let reason = reason_or_default(rest);

    let user_id = parse_user_id(raw_id)
        .map(UserId::new)
        .ok_or_else(|| CommandError::InvalidArgument(format!("`{}` is not a valid user ID.", raw_id)))?;

    let user = match cmd.ctx.http.get_user(user_id).await {
        Ok(user) => user,
        Err(e) if status_code(&e) == Some(404) => {
            cmd.reply(embeds::error_embed("User Not Found", "Could not find a user with that ID."))
                .await?;
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    if guild_id.member(cmd.ctx, user_id).await.is_ok() {
        cmd.reply(embeds::error_embed(
            "User in Server",
            "This user is in the server. Use the regular ban command instead.",
        ))
        .await?;
        return Ok(());
    }

    guild_id
        .ban_with_reason(&cmd.ctx.http, user_id, 0, audit_reason("Hackban", &cmd.msg.author, reason))
        .await
        .map_err(|e| discord_failure(e, "ban"))?;
    info!("🔨 {} hackbanned {} in {}", cmd.msg.author.name, user_id, guild_id);

    let embed = action_embed(
        "🔨 User Hackbanned",
        colors::ERROR_RED,
        &[
            ("User", format!("{} ({})", user.tag(), user_id)),
            ("Moderator", format!("<@{}>", cmd.msg.author.id)),
            ("Reason", reason.to_string()),
        ],
    );
    cmd.reply(embed).await?;

    log_action(cmd, guild_id, "HACKBAN", &user, reason).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quarantine_durations() {
        assert_eq!(parse_quarantine_duration("30"), Some(1800));
        assert_eq!(parse_quarantine_duration("1h30m"), Some(5400));
        assert_eq!(parse_quarantine_duration("0"), None);
        assert_eq!(parse_quarantine_duration("spamming"), None);
    }

    #[test]
    fn default_reason() {
        assert_eq!(reason_or_default("   "), NO_REASON);
        assert_eq!(reason_or_default(" raid "), "raid");
    }

    #[test]
    fn readable_durations() {
        assert_eq!(describe_duration(5400), "1h 30m");
        assert_eq!(describe_duration(60), "1m");
    }
}
