//! Tabla de comandos de prefijo, parseo de invocaciones y cooldowns

use dashmap::DashMap;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Moderation,
    Music,
    Manga,
    Utility,
    Admin,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Moderation,
        Category::Music,
        Category::Manga,
        Category::Utility,
        Category::Admin,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Category::Moderation => "🛡️ Moderation",
            Category::Music => "🎵 Music",
            Category::Manga => "📚 Manga",
            Category::Utility => "🔧 Utility",
            Category::Admin => "⚙️ Admin",
        }
    }
}

/// Permiso necesario para ejecutar un comando
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    Everyone,
    Moderator,
    Administrator,
}

/// A quién se aplica el cooldown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    User,
    Guild,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cooldown {
    pub period: Duration,
    pub bucket: Bucket,
}

const fn per_user(secs: u64) -> Option<Cooldown> {
    Some(Cooldown {
        period: Duration::from_secs(secs),
        bucket: Bucket::User,
    })
}

const fn per_guild(secs: u64) -> Option<Cooldown> {
    Some(Cooldown {
        period: Duration::from_secs(secs),
        bucket: Bucket::Guild,
    })
}

#[derive(Debug)]
pub struct CommandSpec {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    pub category: Category,
    pub usage: &'static str,
    pub help: &'static str,
    pub guild_only: bool,
    pub requirement: Requirement,
    pub cooldown: Option<Cooldown>,
}

macro_rules! command {
    ($name:literal, $category:ident, $usage:literal, $help:literal) => {
        command!($name, [], $category, $usage, $help, Everyone, None)
    };
    ($name:literal, [$($alias:literal),*], $category:ident, $usage:literal, $help:literal, $req:ident, $cooldown:expr) => {
        CommandSpec {
            name: $name,
            aliases: &[$($alias),*],
            category: Category::$category,
            usage: $usage,
            help: $help,
            guild_only: !matches!(Category::$category, Category::Manga | Category::Utility),
            requirement: Requirement::$req,
            cooldown: $cooldown,
        }
    };
}

pub static COMMANDS: &[CommandSpec] = &[
    // Moderation
    command!("ban", [], Moderation, "<member> [reason]", "Ban a member from the server", Moderator, per_user(5)),
    command!("kick", [], Moderation, "<member> [reason]", "Kick a member from the server", Moderator, per_user(5)),
    command!("warn", [], Moderation, "<member> [reason]", "Warn a member", Moderator, per_user(3)),
    command!("warnings", [], Moderation, "<member>", "Show a member's warnings", Moderator, None),
    command!("clearwarnings", [], Moderation, "<member>", "Remove all of a member's warnings", Moderator, per_user(3)),
    command!("quarantine", [], Moderation, "<member> [minutes|1h30m] [reason]", "Timeout a member", Moderator, per_user(5)),
    command!("hackban", [], Moderation, "<user_id> [reason]", "Ban a user who is not in the server", Moderator, per_user(10)),
    // Music
    command!("join", Music, "", "Join your voice channel"),
    command!("leave", Music, "", "Leave the voice channel and clear the queue"),
    command!("play", [], Music, "<url or search>", "Play a song or add it to the queue", Everyone, per_user(3)),
    command!("playnext", [], Music, "<url or search>", "Queue a song to play next", Everyone, per_user(3)),
    command!("skip", Music, "", "Skip the current song"),
    command!("stop", Music, "", "Stop playback and clear the queue"),
    command!("pause", Music, "", "Pause playback"),
    command!("resume", Music, "", "Resume playback"),
    command!("queue", Music, "", "Show the music queue"),
    command!("nowplaying", Music, "", "Show the current song"),
    command!("volume", Music, "<0-100>", "Change the playback volume"),
    command!("repeat", Music, "<off|song|queue>", "Set the repeat mode"),
    command!("shuffle", Music, "", "Toggle shuffle"),
    command!("remove", Music, "<position>", "Remove a song from the queue"),
    command!("move", Music, "<from> <to>", "Move a song within the queue"),
    command!("search", Music, "<text>", "Find songs in the queue by title"),
    command!("clear", Music, "", "Clear the pending queue"),
    // Manga
    command!("manga", [], Manga, "<title>", "Search for manga information", Everyone, per_user(5)),
    command!("randommanga", [], Manga, "", "Get a random manga recommendation", Everyone, per_user(10)),
    // Utility
    command!("ping", [], Utility, "", "Check the bot latency", Everyone, per_user(2)),
    command!("avatar", ["av"], Utility, "[member]", "Show a user's avatar", Everyone, per_user(2)),
    command!("banner", [], Utility, "[member]", "Show a user's banner", Everyone, per_user(2)),
    command!("userinfo", ["ui"], Utility, "[member]", "Show information about a user", Everyone, per_user(3)),
    command!("serverinfo", ["si"], Utility, "", "Show information about the server", Everyone, per_guild(5)),
    command!("botinfo", [], Utility, "", "Show information about the bot", Everyone, per_user(5)),
    command!("help", Utility, "[command]", "Show the command list or help for one command"),
    // Admin
    command!("setprefix", [], Admin, "[prefix]", "Show or change the command prefix", Administrator, None),
    command!("setlogchannel", [], Admin, "[#channel]", "Show or set the moderation log channel", Administrator, None),
    command!("clearlogchannel", [], Admin, "", "Disable the moderation log channel", Administrator, None),
    command!("settings", [], Admin, "", "Show the server settings", Administrator, None),
];

/// Busca un comando por nombre o alias (sin distinguir mayúsculas)
pub fn find_command(name: &str) -> Option<&'static CommandSpec> {
    let name = name.to_lowercase();
    COMMANDS
        .iter()
        .find(|c| c.name == name || c.aliases.contains(&name.as_str()))
}

pub fn commands_in(category: Category) -> impl Iterator<Item = &'static CommandSpec> {
    COMMANDS.iter().filter(move |c| c.category == category)
}

/// Mensaje ya separado en nombre de comando y argumentos
#[derive(Debug, PartialEq, Eq)]
pub struct Invocation<'a> {
    pub name: String,
    pub args: &'a str,
}

/// Extrae la invocación si el mensaje empieza con el prefijo
pub fn parse_invocation<'a>(prefix: &str, content: &'a str) -> Option<Invocation<'a>> {
    let rest = content.strip_prefix(prefix)?;
    let rest = rest.trim_start();
    let (name, args) = split_first(rest);

    if name.is_empty() {
        return None;
    }

    Some(Invocation {
        name: name.to_lowercase(),
        args,
    })
}

/// Separa la primera palabra del resto (ya recortado)
pub fn split_first(text: &str) -> (&str, &str) {
    let text = text.trim();
    match text.split_once(char::is_whitespace) {
        Some((first, rest)) => (first, rest.trim_start()),
        None => (text, ""),
    }
}

/// Registro de cooldowns por comando y usuario o guild
#[derive(Default)]
pub struct Cooldowns {
    last_used: DashMap<(&'static str, u64), Instant>,
}

impl Cooldowns {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marca el uso y devuelve el tiempo restante si todavía está en cooldown
    pub fn check(&self, command: &'static str, key: u64, period: Duration) -> Option<Duration> {
        self.check_at(command, key, period, Instant::now())
    }

    fn check_at(&self, command: &'static str, key: u64, period: Duration, now: Instant) -> Option<Duration> {
        if let Some(last) = self.last_used.get(&(command, key)).map(|t| *t) {
            let elapsed = now.saturating_duration_since(last);
            if elapsed < period {
                return Some(period - elapsed);
            }
        }

        self.last_used.insert((command, key), now);
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_prefixed_messages() {
        assert_eq!(
            parse_invocation("//", "//PLAY  never gonna give you up "),
            Some(Invocation {
                name: "play".to_string(),
                args: "never gonna give you up ",
            })
        );
        assert_eq!(
            parse_invocation("!", "!ping"),
            Some(Invocation {
                name: "ping".to_string(),
                args: "",
            })
        );
        assert_eq!(parse_invocation("//", "hello //play"), None);
        assert_eq!(parse_invocation("//", "//"), None);
        assert_eq!(parse_invocation("//", "//   "), None);
    }

    #[test]
    fn resolves_aliases_case_insensitively() {
        assert_eq!(find_command("AV").map(|c| c.name), Some("avatar"));
        assert_eq!(find_command("ui").map(|c| c.name), Some("userinfo"));
        assert_eq!(find_command("si").map(|c| c.name), Some("serverinfo"));
        assert_eq!(find_command("Ban").map(|c| c.name), Some("ban"));
        assert!(find_command("nope").is_none());
    }

    #[test]
    fn table_is_consistent() {
        let mut names: Vec<&str> = COMMANDS
            .iter()
            .flat_map(|c| std::iter::once(c.name).chain(c.aliases.iter().copied()))
            .collect();
        let total = names.len();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), total, "duplicate command names or aliases");

        assert!(commands_in(Category::Moderation).all(|c| c.requirement == Requirement::Moderator));
        assert!(commands_in(Category::Admin).all(|c| c.requirement == Requirement::Administrator));
        assert!(commands_in(Category::Music).all(|c| c.guild_only));
        assert!(!find_command("ping").unwrap().guild_only);
        assert_eq!(
            find_command("serverinfo").unwrap().cooldown.map(|c| c.bucket),
            Some(Bucket::Guild)
        );
        assert_eq!(
            find_command("hackban").unwrap().cooldown.map(|c| c.period),
            Some(Duration::from_secs(10))
        );
    }

    #[test]
    fn splits_arguments() {
        assert_eq!(split_first("<@1>  spamming links"), ("<@1>", "spamming links"));
        assert_eq!(split_first("alone"), ("alone", ""));
        assert_eq!(split_first("   "), ("", ""));
    }

    #[test]
    fn cooldowns_expire() {
        let cooldowns = Cooldowns::new();
        let period = Duration::from_secs(5);
        let start = Instant::now();

        assert_eq!(cooldowns.check_at("ban", 1, period, start), None);

        let remaining = cooldowns.check_at("ban", 1, period, start + Duration::from_secs(2));
        assert_eq!(remaining, Some(Duration::from_secs(3)));

        // Otro usuario u otro comando no comparten el cooldown
        assert_eq!(cooldowns.check_at("ban", 2, period, start + Duration::from_secs(2)), None);
        assert_eq!(cooldowns.check_at("kick", 1, period, start + Duration::from_secs(2)), None);

        assert_eq!(cooldowns.check_at("ban", 1, period, start + Duration::from_secs(5)), None);
    }
}
