use anyhow::Result;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub default_prefix: String,

    // Paths
    pub data_file: PathBuf,

    // Música
    pub max_queue_size: usize,
    pub default_volume: u8,
    pub max_volume: u8,

    // APIs
    pub mangadex_api: String,

    // Mantenimiento
    pub keep_alive_minutes: u64,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            discord_token: std::env::var("DISCORD_TOKEN")
                .map_err(|_| anyhow::anyhow!("DISCORD_TOKEN is not set"))?,
            default_prefix: std::env::var("DEFAULT_PREFIX").unwrap_or_else(|_| "//".to_string()),

            data_file: std::env::var("DATA_FILE")
                .unwrap_or_else(|_| "data/bot_database.json".to_string())
                .into(),

            max_queue_size: std::env::var("MAX_QUEUE_SIZE")
                .unwrap_or_else(|_| "50".to_string())
                .parse()?,
            default_volume: std::env::var("DEFAULT_VOLUME")
                .unwrap_or_else(|_| "50".to_string())
                .parse()?,
            max_volume: std::env::var("MAX_VOLUME")
                .unwrap_or_else(|_| "100".to_string())
                .parse()?,

            mangadex_api: std::env::var("MANGADEX_API")
                .unwrap_or_else(|_| "https://api.mangadex.org".to_string())
                .trim_end_matches('/')
                .to_string(),

            keep_alive_minutes: std::env::var("KEEP_ALIVE_MINUTES")
                .unwrap_or_else(|_| "30".to_string())
                .parse()?,
        };

        config.validate()?;

        Ok(config)
    }

    /// Validates configuration values.
    ///
    /// # Validation Rules
    ///
    /// - Max queue size must be greater than 0
    /// - Max volume must be between 1 and 200
    /// - Default volume cannot exceed max volume
    /// - Default prefix must be 1 to 5 characters
    pub fn validate(&self) -> Result<()> {
        if self.discord_token.trim().is_empty() {
            anyhow::bail!("DISCORD_TOKEN cannot be empty");
        }

        if self.max_queue_size == 0 {
            anyhow::bail!("Max queue size must be greater than 0");
        }

        if self.max_volume == 0 || self.max_volume > 200 {
            anyhow::bail!("Max volume must be between 1 and 200, got: {}", self.max_volume);
        }

        if self.default_volume > self.max_volume {
            anyhow::bail!(
                "Default volume ({}) cannot exceed max volume ({})",
                self.default_volume,
                self.max_volume
            );
        }

        let prefix_len = self.default_prefix.chars().count();
        if prefix_len == 0 || prefix_len > 5 {
            anyhow::bail!("Default prefix must be 1-5 characters, got: {:?}", self.default_prefix);
        }

        if self.keep_alive_minutes == 0 {
            anyhow::bail!("Keep-alive interval must be at least 1 minute");
        }

        Ok(())
    }

    /// Resumen sin datos sensibles para el log de arranque
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Prefix: {}\n  \
            Database: {}\n  \
            Music: {} max queue, {}% default vol, {}% max vol\n  \
            MangaDex: {}\n  \
            Keep-alive: every {} min",
            self.default_prefix,
            self.data_file.display(),
            self.max_queue_size,
            self.default_volume,
            self.max_volume,
            self.mangadex_api,
            self.keep_alive_minutes
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            discord_token: String::new(),
            default_prefix: "//".to_string(),
            data_file: "data/bot_database.json".into(),
            max_queue_size: 50,
            default_volume: 50,
            max_volume: 100,
            mangadex_api: "https://api.mangadex.org".to_string(),
            keep_alive_minutes: 30,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> Config {
        Config {
            discord_token: "token".to_string(),
            ..Config::default()
        }
    }

    #[test]
    fn defaults_are_valid_with_token() {
        assert!(valid().validate().is_ok());
        assert!(Config::default().validate().is_err());
    }

    #[test]
    fn rejects_bad_limits() {
        let mut config = valid();
        config.max_queue_size = 0;
        assert!(config.validate().is_err());

        let mut config = valid();
        config.default_volume = 150;
        assert!(config.validate().is_err());

        let mut config = valid();
        config.max_volume = 201;
        config.default_volume = 10;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_bad_prefix() {
        let mut config = valid();
        config.default_prefix = String::new();
        assert!(config.validate().is_err());

        config.default_prefix = "toolong".to_string();
        assert!(config.validate().is_err());

        config.default_prefix = "x!".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn summary_hides_token() {
        let config = Config {
            discord_token: "super-secret".to_string(),
            ..Config::default()
        };
        let summary = config.summary();
        assert!(!summary.contains("super-secret"));
        assert!(summary.contains("50 max queue"));
    }
}
