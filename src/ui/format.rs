//! Helpers de formato compartidos por los comandos

use regex::Regex;
use std::sync::OnceLock;

/// Formatea segundos como `H:MM:SS` o `M:SS`
pub fn format_duration(total_secs: u64) -> String {
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

/// Duración opcional para mostrar; cero o desconocida es "Unknown"
pub fn display_duration(duration: Option<std::time::Duration>) -> String {
    match duration.map(|d| d.as_secs()) {
        Some(secs) if secs > 0 => format_duration(secs),
        _ => "Unknown".to_string(),
    }
}

/// Colapsa espacios y trunca a `max_length` caracteres
pub fn clean_content(content: &str, max_length: usize) -> String {
    let collapsed = content.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        return "No content".to_string();
    }

    truncate(&collapsed, max_length)
}

/// Trunca con "..." sin partir caracteres
pub fn truncate(text: &str, max_length: usize) -> String {
    if text.chars().count() <= max_length {
        return text.to_string();
    }

    let keep = max_length.saturating_sub(3);
    let mut out: String = text.chars().take(keep).collect();
    out.push_str("...");
    out
}

/// Convierte "1d2h3m4s" a segundos. `None` si no es válido o da cero.
pub fn parse_time(input: &str) -> Option<u64> {
    static TIME: OnceLock<Regex> = OnceLock::new();
    let re = TIME.get_or_init(|| {
        Regex::new(r"^(?:(\d+)d)?(?:(\d+)h)?(?:(\d+)m)?(?:(\d+)s)?$").expect("valid time regex")
    });

    let input = input.trim().to_lowercase();
    let caps = re.captures(&input)?;

    let mut total: u64 = 0;
    for (group, unit) in [(1, 86_400u64), (2, 3_600), (3, 60), (4, 1)] {
        if let Some(value) = caps.get(group) {
            let value: u64 = value.as_str().parse().ok()?;
            total = total.checked_add(value.checked_mul(unit)?)?;
        }
    }

    (total > 0).then_some(total)
}

/// URL http(s) con host
pub fn is_url(text: &str) -> bool {
    url::Url::parse(text)
        .map(|url| matches!(url.scheme(), "http" | "https") && url.host_str().is_some())
        .unwrap_or(false)
}

/// Acepta `<@123>`, `<@!123>` o `123`
pub fn parse_user_id(text: &str) -> Option<u64> {
    let text = text.trim();
    let raw = text
        .strip_prefix("<@")
        .and_then(|rest| rest.strip_suffix('>'))
        .map(|inner| inner.trim_start_matches('!'))
        .unwrap_or(text);
    parse_snowflake(raw)
}

/// Acepta `<#123>` o `123`
pub fn parse_channel_id(text: &str) -> Option<u64> {
    let text = text.trim();
    let raw = text
        .strip_prefix("<#")
        .and_then(|rest| rest.strip_suffix('>'))
        .unwrap_or(text);
    parse_snowflake(raw)
}

fn parse_snowflake(raw: &str) -> Option<u64> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    raw.parse().ok().filter(|id| *id != 0)
}

pub fn status_emoji(status: &str) -> &'static str {
    match status {
        "online" => "🟢",
        "idle" => "🟡",
        "dnd" => "🔴",
        "offline" | "invisible" => "⚫",
        "streaming" => "🟣",
        _ => "❓",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    #[test]
    fn durations() {
        assert_eq!(format_duration(0), "0:00");
        assert_eq!(format_duration(65), "1:05");
        assert_eq!(format_duration(3600), "1:00:00");
        assert_eq!(format_duration(3725), "1:02:05");
        assert_eq!(display_duration(None), "Unknown");
        assert_eq!(display_duration(Some(Duration::ZERO)), "Unknown");
        assert_eq!(display_duration(Some(Duration::from_secs(90))), "1:30");
    }

    #[test]
    fn cleans_content() {
        assert_eq!(clean_content("  hello \n\n  world  ", 2000), "hello world");
        assert_eq!(clean_content("   ", 10), "No content");
        assert_eq!(clean_content("abcdefghij", 8), "abcde...");
        assert_eq!(truncate("ñandú", 10), "ñandú");
    }

    #[test]
    fn parses_compound_times() {
        assert_eq!(parse_time("1h30m"), Some(5400));
        assert_eq!(parse_time("1d2h3m4s"), Some(93_784));
        assert_eq!(parse_time("45S"), Some(45));
        assert_eq!(parse_time("0m"), None);
        assert_eq!(parse_time(""), None);
        assert_eq!(parse_time("soon"), None);
        assert_eq!(parse_time("10x"), None);
    }

    #[test]
    fn detects_urls() {
        assert!(is_url("https://www.youtube.com/watch?v=dQw4w9WgXcQ"));
        assert!(is_url("http://localhost:8080/song.mp3"));
        assert!(!is_url("never gonna give you up"));
        assert!(!is_url("ftp://example.com/file"));
        assert!(!is_url("youtube.com/watch?v=x"));
    }

    #[test]
    fn parses_mentions() {
        assert_eq!(parse_user_id("<@123>"), Some(123));
        assert_eq!(parse_user_id("<@!456>"), Some(456));
        assert_eq!(parse_user_id("789"), Some(789));
        assert_eq!(parse_user_id("<@&123>"), None);
        assert_eq!(parse_user_id("bob"), None);
        assert_eq!(parse_channel_id("<#42>"), Some(42));
        assert_eq!(parse_channel_id("<@42>"), None);
    }

    #[test]
    fn status_emojis() {
        assert_eq!(status_emoji("online"), "🟢");
        assert_eq!(status_emoji("dnd"), "🔴");
        assert_eq!(status_emoji("weird"), "❓");
    }
}
