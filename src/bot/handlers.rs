use anyhow::Result;
use serenity::{
    builder::{CreateEmbed, CreateMessage},
    model::{channel::Message, id::GuildId},
    prelude::Context,
};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::{
    audio::queue::QueueError,
    bot::{
        admin, manga,
        commands::{self, Bucket, CommandSpec, Requirement},
        moderation, music,
        permissions::{self, AuthorAccess},
        utility, Bot,
    },
    ui::embeds::{self, colors},
};

/// Fallos de comando que se muestran al usuario
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Missing argument: {name}. Usage: `{usage}`")]
    MissingArgument { name: &'static str, usage: String },
    #[error("{0}")]
    InvalidArgument(String),
    #[error("You don't have permission to use this command.")]
    MissingPermissions,
    #[error("Try again in {:.2} seconds.", .0.as_secs_f64())]
    Cooldown(Duration),
    #[error("This command can only be used in a server.")]
    GuildOnly,
    #[error("You need to be in a voice channel to use this command.")]
    NotInVoice,
    #[error("I'm not connected to a voice channel.")]
    NotConnected,
    #[error("No music is currently playing.")]
    NothingPlaying,
    #[error("The queue is full ({0} songs max).")]
    QueueFull(usize),
    #[error(transparent)]
    Queue(#[from] QueueError),
}

impl CommandError {
    fn title(&self) -> &'static str {
        match self {
            CommandError::MissingArgument { .. } => "Missing Argument",
            CommandError::InvalidArgument(_) => "Invalid Argument",
            CommandError::MissingPermissions => "Missing Permissions",
            CommandError::Cooldown(_) => "Command on Cooldown",
            CommandError::GuildOnly => "Server Only",
            CommandError::NotInVoice => "Not in Voice Channel",
            CommandError::NotConnected => "Not Connected",
            CommandError::NothingPlaying => "Nothing Playing",
            CommandError::QueueFull(_) => "Queue Full",
            CommandError::Queue(QueueError::IndexOutOfRange { .. }) => "Invalid Position",
            CommandError::Queue(QueueError::InvalidMode(_)) => "Invalid Mode",
        }
    }

    pub fn to_embed(&self) -> CreateEmbed {
        match self {
            CommandError::Cooldown(_) => CreateEmbed::default()
                .title(format!("⏰ {}", self.title()))
                .description(self.to_string())
                .color(colors::WARNING_ORANGE),
            _ => embeds::error_embed(self.title(), self.to_string()),
        }
    }
}

/// Todo lo que necesita un comando para ejecutarse
pub struct CommandContext<'a> {
    pub ctx: &'a Context,
    pub msg: &'a Message,
    pub bot: &'a Bot,
    pub spec: &'static CommandSpec,
    pub prefix: String,
    pub args: &'a str,
}

impl<'a> CommandContext<'a> {
    pub fn guild_id(&self) -> Result<GuildId, CommandError> {
        self.msg.guild_id.ok_or(CommandError::GuildOnly)
    }

    pub async fn reply(&self, embed: CreateEmbed) -> Result<Message> {
        let message = self
            .msg
            .channel_id
            .send_message(&self.ctx.http, CreateMessage::new().embed(embed))
            .await?;
        Ok(message)
    }

    /// Primer argumento obligatorio y el resto
    pub fn required_arg(&self, name: &'static str) -> Result<(&'a str, &'a str), CommandError> {
        let (first, rest) = commands::split_first(self.args);
        if first.is_empty() {
            return Err(self.missing(name));
        }
        Ok((first, rest))
    }

    /// Texto completo obligatorio
    pub fn required_text(&self, name: &'static str) -> Result<&'a str, CommandError> {
        let text = self.args.trim();
        if text.is_empty() {
            return Err(self.missing(name));
        }
        Ok(text)
    }

    fn missing(&self, name: &'static str) -> CommandError {
        CommandError::MissingArgument {
            name,
            usage: format!("{}{} {}", self.prefix, self.spec.name, self.spec.usage)
                .trim_end()
                .to_string(),
        }
    }

    pub fn author_access(&self) -> AuthorAccess {
        let roles = self
            .msg
            .member
            .as_ref()
            .map(|m| m.roles.clone())
            .unwrap_or_default();
        match self.msg.guild_id {
            Some(guild_id) => permissions::author_access(self.ctx, guild_id, self.msg.author.id, &roles),
            None => AuthorAccess::default(),
        }
    }
}

/// Procesa un mensaje: prefijo, comando, checks y ejecución
pub async fn handle_message(ctx: &Context, msg: &Message, bot: &Bot) -> Result<()> {
    if msg.author.bot {
        return Ok(());
    }

    let prefix = match msg.guild_id {
        Some(guild_id) => bot.storage.lock().await.guild_prefix(guild_id.get()),
        None => bot.config.default_prefix.clone(),
    };

    // Mención directa al bot: mostrar el prefijo
    let bot_id = ctx.cache.current_user().id;
    let content = msg.content.trim();
    if content == format!("<@{}>", bot_id) || content == format!("<@!{}>", bot_id) {
        msg.channel_id
            .send_message(
                &ctx.http,
                CreateMessage::new().embed(embeds::info_embed(
                    "👋 Hello!",
                    format!("My prefix here is `{}`. Use `{}help` for commands.", prefix, prefix),
                )),
            )
            .await?;
        return Ok(());
    }

    let Some(invocation) = commands::parse_invocation(&prefix, &msg.content) else {
        return Ok(());
    };
    let Some(spec) = commands::find_command(&invocation.name) else {
        debug!("Unknown command: {}", invocation.name);
        return Ok(());
    };

    info!(
        "📝 Command {}{} used by {} in {:?}",
        prefix, spec.name, msg.author.name, msg.guild_id
    );

    let cmd = CommandContext {
        ctx,
        msg,
        bot,
        spec,
        prefix,
        args: invocation.args,
    };

    let result = match check(&cmd) {
        Ok(()) => run(&cmd).await,
        Err(e) => Err(e.into()),
    };

    if let Err(e) = result {
        let embed = match e.downcast_ref::<CommandError>() {
            Some(command_error) => command_error.to_embed(),
            None => {
                error!("Command error in {}: {:?}", spec.name, e);
                embeds::error_embed(
                    "An Error Occurred",
                    "Something went wrong while executing this command.",
                )
            }
        };
        cmd.reply(embed).await?;
    }

    Ok(())
}

fn check(cmd: &CommandContext<'_>) -> Result<(), CommandError> {
    let spec = cmd.spec;

    if spec.guild_only && cmd.msg.guild_id.is_none() {
        return Err(CommandError::GuildOnly);
    }

    let allowed = match spec.requirement {
        Requirement::Everyone => true,
        Requirement::Moderator => cmd.author_access().is_moderator(),
        Requirement::Administrator => cmd.author_access().is_administrator(),
    };
    if !allowed {
        return Err(CommandError::MissingPermissions);
    }

    if let Some(cooldown) = spec.cooldown {
        let key = match cooldown.bucket {
            Bucket::User => cmd.msg.author.id.get(),
            Bucket::Guild => cmd
                .msg
                .guild_id
                .map(|g| g.get())
                .unwrap_or_else(|| cmd.msg.channel_id.get()),
        };
        if let Some(remaining) = cmd.bot.cooldowns.check(spec.name, key, cooldown.period) {
            return Err(CommandError::Cooldown(remaining));
        }
    }

    Ok(())
}

async fn run(cmd: &CommandContext<'_>) -> Result<()> {
    match cmd.spec.name {
        // Moderation
        "ban" => moderation::ban(cmd).await,
        "kick" => moderation::kick(cmd).await,
        "warn" => moderation::warn(cmd).await,
        "warnings" => moderation::warnings(cmd).await,
        "clearwarnings" => moderation::clear_warnings(cmd).await,
        "quarantine" => moderation::quarantine(cmd).await,
        "hackban" => moderation::hackban(cmd).await,
        // Music
        "join" => music::join(cmd).await,
        "leave" => music::leave(cmd).await,
        "play" => music::play(cmd, false).await,
        "playnext" => music::play(cmd, true).await,
        "skip" => music::skip(cmd).await,
        "stop" => music::stop(cmd).await,
        "pause" => music::pause(cmd).await,
        "resume" => music::resume(cmd).await,
        "queue" => music::queue(cmd).await,
        "nowplaying" => music::now_playing(cmd).await,
        "volume" => music::volume(cmd).await,
        "repeat" => music::repeat(cmd).await,
        "shuffle" => music::shuffle(cmd).await,
        "remove" => music::remove(cmd).await,
        "move" => music::move_item(cmd).await,
        "search" => music::search(cmd).await,
        "clear" => music::clear(cmd).await,
        // Manga
        "manga" => manga::manga(cmd).await,
        "randommanga" => manga::random_manga(cmd).await,
        // Utility
        "ping" => utility::ping(cmd).await,
        "avatar" => utility::avatar(cmd).await,
        "banner" => utility::banner(cmd).await,
        "userinfo" => utility::userinfo(cmd).await,
        "serverinfo" => utility::serverinfo(cmd).await,
        "botinfo" => utility::botinfo(cmd).await,
        "help" => utility::help(cmd).await,
        // Admin
        "setprefix" => admin::set_prefix(cmd).await,
        "setlogchannel" => admin::set_log_channel(cmd).await,
        "clearlogchannel" => admin::clear_log_channel(cmd).await,
        "settings" => admin::settings(cmd).await,
        other => {
            debug!("Command {} has no handler", other);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cooldown_message_has_two_decimals() {
        let err = CommandError::Cooldown(Duration::from_millis(2_500));
        assert_eq!(err.to_string(), "Try again in 2.50 seconds.");
    }

    #[test]
    fn queue_errors_are_user_facing() {
        let err: CommandError = QueueError::IndexOutOfRange { index: 9, len: 2 }.into();
        assert_eq!(err.title(), "Invalid Position");

        let err: CommandError = QueueError::InvalidMode("loop".to_string()).into();
        assert_eq!(err.title(), "Invalid Mode");
    }

    #[test]
    fn downcast_from_anyhow() {
        let err: anyhow::Error = CommandError::NotInVoice.into();
        assert!(matches!(
            err.downcast_ref::<CommandError>(),
            Some(CommandError::NotInVoice)
        ));
    }
}
