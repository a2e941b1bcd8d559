//! Comandos de utilidad: latencia, avatares, información y ayuda

use anyhow::Result;
use serenity::{
    all::{Colour, Member, Timestamp, User, UserId},
    builder::{CreateEmbed, CreateEmbedFooter, EditMessage},
};
use std::time::{Duration, Instant};
use sysinfo::System;
use tracing::debug;

use crate::{
    bot::{
        commands::{self, Category},
        handlers::{CommandContext, CommandError},
        shard_latency,
    },
    ui::{
        embeds::{self, colors},
        format::{parse_user_id, status_emoji},
    },
};

const MAX_LISTED_ROLES: usize = 10;

/// Color del ping según la latencia del gateway
pub fn latency_colour(latency_ms: u128) -> Colour {
    match latency_ms {
        0..=99 => colors::SUCCESS_GREEN,
        100..=199 => colors::WARNING_ORANGE,
        _ => colors::ERROR_RED,
    }
}

/// "January 05, 2024"
pub fn format_date(timestamp: Timestamp) -> String {
    chrono::DateTime::from_timestamp(timestamp.unix_timestamp(), 0)
        .map(|date| date.format("%B %d, %Y").to_string())
        .unwrap_or_else(|| "Unknown".to_string())
}

/// Uptime redondeado a minutos
pub fn format_uptime(uptime: Duration) -> String {
    let minutes = uptime.as_secs() / 60;
    if minutes == 0 {
        return "less than a minute".to_string();
    }
    humantime::format_duration(Duration::from_secs(minutes * 60)).to_string()
}

/// Menciona hasta 10 roles y resume el resto
pub fn summarize_roles(mentions: &[String]) -> String {
    if mentions.len() <= MAX_LISTED_ROLES {
        return mentions.join(" ");
    }
    format!(
        "{} ... and {} more",
        mentions[..MAX_LISTED_ROLES].join(" "),
        mentions.len() - MAX_LISTED_ROLES
    )
}

fn download_links(url: &str) -> String {
    // Quitamos el query de tamaño que añade Discord
    let base = url.split('?').next().unwrap_or(url);
    format!(
        "[PNG]({0}?format=png) | [JPG]({0}?format=jpg) | [WEBP]({0}?format=webp)",
        base
    )
}

/// Usuario indicado en los argumentos o el autor, con su miembro si estamos en un servidor
async fn resolve_target(cmd: &CommandContext<'_>) -> Result<(User, Option<Member>)> {
    let raw = cmd.args.trim();
    let user_id = if raw.is_empty() {
        cmd.msg.author.id
    } else {
        parse_user_id(raw)
            .map(UserId::new)
            .ok_or_else(|| CommandError::InvalidArgument(format!("`{}` is not a valid member.", raw)))?
    };

    let member = match cmd.msg.guild_id {
        Some(guild_id) => guild_id.member(cmd.ctx, user_id).await.ok(),
        None => None,
    };

    let user = match &member {
        Some(member) => member.user.clone(),
        None if user_id == cmd.msg.author.id => cmd.msg.author.clone(),
        None if cmd.msg.guild_id.is_some() => {
            return Err(CommandError::InvalidArgument("Member not found.".to_string()).into())
        }
        None => user_id.to_user(cmd.ctx).await?,
    };

    Ok((user, member))
}

fn display_name(user: &User, member: Option<&Member>) -> String {
    match member {
        Some(member) => member.display_name().to_string(),
        None => user.global_name.clone().unwrap_or_else(|| user.name.clone()),
    }
}

fn requested_by(cmd: &CommandContext<'_>) -> CreateEmbedFooter {
    let author = &cmd.msg.author;
    let name = author.global_name.clone().unwrap_or_else(|| author.name.clone());
    CreateEmbedFooter::new(format!("Requested by {}", name)).icon_url(author.face())
}

pub async fn ping(cmd: &CommandContext<'_>) -> Result<()> {
    let start = Instant::now();
    let mut message = cmd.msg.channel_id.say(&cmd.ctx.http, "Pinging...").await?;
    let message_latency = start.elapsed().as_millis();

    let gateway = shard_latency(cmd.ctx).await;
    let gateway_ms = gateway.map(|d| d.as_millis());

    let embed = CreateEmbed::default()
        .title("🏓 Pong!")
        .color(gateway_ms.map(latency_colour).unwrap_or(colors::NEUTRAL_GRAY))
        .field(
            "API Latency",
            gateway_ms
                .map(|ms| format!("{}ms", ms))
                .unwrap_or_else(|| "Unknown".to_string()),
            true,
        )
        .field("Message Latency", format!("{}ms", message_latency), true);

    message
        .edit(cmd.ctx, EditMessage::new().content("").embed(embed))
        .await?;
    Ok(())
}

pub async fn avatar(cmd: &CommandContext<'_>) -> Result<()> {
    let (user, member) = resolve_target(cmd).await?;
    let name = display_name(&user, member.as_ref());
    let url = member.as_ref().map(|m| m.face()).unwrap_or_else(|| user.face());

    let embed = CreateEmbed::default()
        .title(format!("{}'s Avatar", name))
        .color(colors::INFO_BLUE)
        .image(&url)
        .field("Download Links", download_links(&url), false)
        .footer(requested_by(cmd));
    cmd.reply(embed).await?;
    Ok(())
}

pub async fn banner(cmd: &CommandContext<'_>) -> Result<()> {
    let (user, member) = resolve_target(cmd).await?;
    let name = display_name(&user, member.as_ref());

    // El banner solo viene al pedir el usuario por HTTP
    let fetched = match cmd.ctx.http.get_user(user.id).await {
        Ok(fetched) => fetched,
        Err(e) => {
            debug!("Could not fetch user {}: {:?}", user.id, e);
            cmd.reply(embeds::error_embed("Error", format!("Could not fetch banner: {}", e)))
                .await?;
            return Ok(());
        }
    };

    let Some(url) = fetched.banner_url() else {
        cmd.reply(embeds::error_embed(
            "No Banner",
            format!("{} doesn't have a banner set.", name),
        ))
        .await?;
        return Ok(());
    };

    let embed = CreateEmbed::default()
        .title(format!("{}'s Banner", name))
        .color(colors::INFO_BLUE)
        .image(&url)
        .field("Download Links", download_links(&url), false)
        .footer(requested_by(cmd));
    cmd.reply(embed).await?;
    Ok(())
}

pub async fn userinfo(cmd: &CommandContext<'_>) -> Result<()> {
    let (user, member) = resolve_target(cmd).await?;

    let mut embed = CreateEmbed::default()
        .title("User Information")
        .color(colors::INFO_BLUE)
        .thumbnail(member.as_ref().map(|m| m.face()).unwrap_or_else(|| user.face()))
        .field("Username", user.tag(), true)
        .field("Display Name", display_name(&user, member.as_ref()), true)
        .field("User ID", user.id.to_string(), true)
        .field("Account Created", format_date(user.id.created_at()), true);

    let (Some(member), Some(guild_id)) = (member, cmd.msg.guild_id) else {
        cmd.reply(embed).await?;
        return Ok(());
    };

    if let Some(joined) = member.joined_at {
        embed = embed.field("Joined Server", format_date(joined), true);
    }

    // Todo lo que sale de la caché se copia antes del siguiente await
    let status = guild_id
        .to_guild_cached(&cmd.ctx.cache)
        .and_then(|guild| guild.presences.get(&user.id).map(|p| p.status.name().to_string()))
        .unwrap_or_else(|| "offline".to_string());
    embed = embed.field(
        "Status",
        format!("{} {}", status_emoji(&status), title_case(&status)),
        true,
    );

    if !member.roles.is_empty() {
        let mentions: Vec<String> = member.roles.iter().map(|id| format!("<@&{}>", id)).collect();
        embed = embed.field(
            format!("Roles ({})", mentions.len()),
            summarize_roles(&mentions),
            false,
        );
    }

    let access = crate::bot::permissions::author_access(cmd.ctx, guild_id, user.id, &member.roles);
    let perms = access.permissions;
    if perms.administrator() {
        embed = embed.field("Key Permissions", "Administrator", true);
    } else {
        let key: Vec<&str> = [
            (perms.manage_guild(), "Manage Server"),
            (perms.manage_channels(), "Manage Channels"),
            (perms.manage_roles(), "Manage Roles"),
            (perms.ban_members(), "Ban Members"),
            (perms.kick_members(), "Kick Members"),
            (perms.manage_messages(), "Manage Messages"),
        ]
        .into_iter()
        .filter_map(|(has, name)| has.then_some(name))
        .collect();
        if !key.is_empty() {
            embed = embed.field("Key Permissions", key.join(", "), true);
        }
    }

    cmd.reply(embed).await?;
    Ok(())
}

pub async fn serverinfo(cmd: &CommandContext<'_>) -> Result<()> {
    let guild_id = cmd.guild_id()?;

    let embed = {
        let Some(guild) = guild_id.to_guild_cached(&cmd.ctx.cache) else {
            return Err(CommandError::InvalidArgument(
                "Server information is not available yet.".to_string(),
            )
            .into());
        };

        let mut embed = CreateEmbed::default()
            .title(format!("Server Information - {}", guild.name))
            .color(colors::INFO_BLUE)
            .field("Server ID", guild.id.to_string(), true)
            .field("Owner", format!("<@{}>", guild.owner_id), true)
            .field("Created", format_date(guild.id.created_at()), true)
            .field("Members", guild.member_count.to_string(), true)
            .field("Channels", guild.channels.len().to_string(), true)
            .field("Roles", guild.roles.len().to_string(), true)
            .field("Boost Level", u8::from(guild.premium_tier).to_string(), true)
            .field(
                "Boosts",
                guild.premium_subscription_count.unwrap_or(0).to_string(),
                true,
            );

        if let Some(icon) = guild.icon_url() {
            embed = embed.thumbnail(icon);
        }
        if !guild.features.is_empty() {
            let features: Vec<String> = guild
                .features
                .iter()
                .take(5)
                .map(|f| title_case(&f.replace('_', " ")))
                .collect();
            embed = embed.field("Features", features.join(", "), false);
        }
        embed
    };

    cmd.reply(embed).await?;
    Ok(())
}

/// Uso de CPU y memoria del sistema en porcentaje
async fn system_usage() -> (f32, f64) {
    let mut sys = System::new();
    sys.refresh_cpu();
    tokio::time::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL).await;
    sys.refresh_cpu();
    sys.refresh_memory();

    let cpu = sys.global_cpu_info().cpu_usage();
    let memory = match sys.total_memory() {
        0 => 0.0,
        total => sys.used_memory() as f64 / total as f64 * 100.0,
    };
    (cpu, memory)
}

pub async fn botinfo(cmd: &CommandContext<'_>) -> Result<()> {
    let (name, id, face) = {
        let me = cmd.ctx.cache.current_user();
        (me.name.clone(), me.id, me.face())
    };
    let guilds = cmd.ctx.cache.guild_count();
    let configured = cmd.bot.storage.lock().await.guild_count();
    let (cpu, memory) = system_usage().await;
    let latency = shard_latency(cmd.ctx)
        .await
        .map(|d| format!("{}ms", d.as_millis()))
        .unwrap_or_else(|| "Unknown".to_string());

    let embed = CreateEmbed::default()
        .title("Bot Information")
        .color(colors::INFO_BLUE)
        .thumbnail(face)
        .field("Bot Name", name, true)
        .field("Bot ID", id.to_string(), true)
        .field("Servers", guilds.to_string(), true)
        .field("Configured Servers", configured.to_string(), true)
        .field("Version", env!("CARGO_PKG_VERSION"), true)
        .field("Library", "serenity 0.12 / songbird 0.5", true)
        .field("Platform", std::env::consts::OS, true)
        .field("CPU Usage", format!("{:.1}%", cpu), true)
        .field("Memory Usage", format!("{:.1}%", memory), true)
        .field("Latency", latency, true)
        .field("Uptime", format_uptime(cmd.bot.started_at.elapsed()), true);
    cmd.reply(embed).await?;
    Ok(())
}

pub async fn help(cmd: &CommandContext<'_>) -> Result<()> {
    let prefix = cmd.prefix.as_str();
    let query = cmd.args.trim();

    if !query.is_empty() {
        let Some(spec) = commands::find_command(query) else {
            cmd.reply(embeds::error_embed(
                "Command Not Found",
                format!("No command named '{}' found.", query),
            ))
            .await?;
            return Ok(());
        };

        let mut embed = embeds::info_embed(format!("Help - {}", spec.name), spec.help);
        if !spec.aliases.is_empty() {
            embed = embed.field("Aliases", spec.aliases.join(", "), false);
        }
        let usage = format!("{}{} {}", prefix, spec.name, spec.usage);
        embed = embed.field("Usage", format!("`{}`", usage.trim_end()), false);
        cmd.reply(embed).await?;
        return Ok(());
    }

    let mut embed = embeds::info_embed(
        "🤖 Bot Help",
        format!(
            "Use `{}help <command>` for detailed information about a command.",
            prefix
        ),
    );
    for category in Category::ALL {
        embed = embed.field(category_heading(category), category_listing(category, prefix), false);
    }
    embed = embed.footer(CreateEmbedFooter::new(format!("Current prefix: {}", prefix)));

    cmd.reply(embed).await?;
    Ok(())
}

fn category_heading(category: Category) -> String {
    match category {
        Category::Moderation => format!("{} (Moderators)", category.label()),
        Category::Admin => format!("{} (Administrators)", category.label()),
        _ => category.label().to_string(),
    }
}

/// "`!ping`, `!avatar`, ..."
pub fn category_listing(category: Category, prefix: &str) -> String {
    commands::commands_in(category)
        .map(|spec| format!("`{}{}`", prefix, spec.name))
        .collect::<Vec<_>>()
        .join(", ")
}

fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let lower = word.to_lowercase();
            let mut chars = lower.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn ping_colours() {
        assert_eq!(latency_colour(42), colors::SUCCESS_GREEN);
        assert_eq!(latency_colour(150), colors::WARNING_ORANGE);
        assert_eq!(latency_colour(200), colors::ERROR_RED);
    }

    #[test]
    fn dates() {
        let ts = Timestamp::from_unix_timestamp(1_704_412_800).unwrap();
        assert_eq!(format_date(ts), "January 05, 2024");
    }

    #[test]
    fn uptime_rounds_to_minutes() {
        assert_eq!(format_uptime(Duration::from_secs(30)), "less than a minute");
        assert_eq!(format_uptime(Duration::from_secs(7_385)), "2h 3m");
    }

    #[test]
    fn role_summary_caps_at_ten() {
        let roles: Vec<String> = (1..=12).map(|i| format!("<@&{}>", i)).collect();
        let summary = summarize_roles(&roles);
        assert!(summary.starts_with("<@&1> <@&2>"));
        assert!(summary.ends_with("... and 2 more"));
        assert!(!summary.contains("<@&11>"));

        assert_eq!(summarize_roles(&roles[..2]), "<@&1> <@&2>");
    }

    #[test]
    fn help_lists_every_category() {
        let listing = category_listing(Category::Manga, "//");
        assert_eq!(listing, "`//manga`, `//randommanga`");

        for category in Category::ALL {
            assert!(!category_listing(category, "!").is_empty());
        }
    }

    #[test]
    fn titles() {
        assert_eq!(title_case("animated icon"), "Animated Icon");
        assert_eq!(title_case("dnd"), "Dnd");
        assert_eq!(
            download_links("https://cdn/a.png?size=1024"),
            "[PNG](https://cdn/a.png?format=png) | [JPG](https://cdn/a.png?format=jpg) | [WEBP](https://cdn/a.png?format=webp)"
        );
    }
}
