use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

/// Configuración de un servidor guardada en la base de datos
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuildSettings {
    pub prefix: String,
    pub log_channel: Option<u64>,
    pub created_at: DateTime<Utc>,
}

/// Advertencia registrada por un moderador
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Warning {
    pub moderator_id: u64,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

/// Estructura completa del archivo JSON
#[derive(Debug, Default, Serialize, Deserialize)]
struct Database {
    #[serde(default)]
    guilds: HashMap<String, GuildSettings>,
    #[serde(default)]
    users: HashMap<String, serde_json::Value>,
    #[serde(default)]
    warnings: HashMap<String, Vec<Warning>>,
    #[serde(default)]
    music_queues: HashMap<String, serde_json::Value>,
}

/// Almacenamiento por servidor en un único archivo JSON.
///
/// Cada mutación reescribe el archivo completo; la última escritura gana.
/// Se comparte como `Arc<tokio::sync::Mutex<GuildStore>>`.
pub struct GuildStore {
    path: PathBuf,
    default_prefix: String,
    data: Database,
}

impl GuildStore {
    pub async fn open(path: impl Into<PathBuf>, default_prefix: impl Into<String>) -> Result<Self> {
        let path = path.into();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Could not create {}", parent.display()))?;
        }

        let data = Self::load(&path).await;
        info!(
            "📁 Storage ready at {} ({} guilds)",
            path.display(),
            data.guilds.len()
        );

        Ok(Self {
            path,
            default_prefix: default_prefix.into(),
            data,
        })
    }

    async fn load(path: &Path) -> Database {
        match fs::read_to_string(path).await {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(data) => data,
                Err(e) => {
                    warn!("⚠️ Database file {} is corrupt, starting fresh: {}", path.display(), e);
                    Database::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Database::default(),
            Err(e) => {
                warn!("⚠️ Could not read {}: {}", path.display(), e);
                Database::default()
            }
        }
    }

    async fn save(&self) -> Result<()> {
        let content = serde_json::to_string_pretty(&self.data)?;
        fs::write(&self.path, content)
            .await
            .with_context(|| format!("Could not write {}", self.path.display()))?;
        debug!("💾 Database saved");
        Ok(())
    }

    fn new_guild(&self) -> GuildSettings {
        GuildSettings {
            prefix: self.default_prefix.clone(),
            log_channel: None,
            created_at: Utc::now(),
        }
    }

    fn warning_key(guild_id: u64, user_id: u64) -> String {
        format!("{}_{}", guild_id, user_id)
    }

    /// Registra un servidor. No hace nada si ya existe.
    pub async fn add_guild(&mut self, guild_id: u64) -> Result<()> {
        let key = guild_id.to_string();
        if self.data.guilds.contains_key(&key) {
            return Ok(());
        }

        let settings = self.new_guild();
        self.data.guilds.insert(key, settings);
        self.save().await?;
        info!("📝 Guild {} added to database", guild_id);
        Ok(())
    }

    pub async fn remove_guild(&mut self, guild_id: u64) -> Result<()> {
        if self.data.guilds.remove(&guild_id.to_string()).is_some() {
            self.save().await?;
            info!("🗑️ Guild {} removed from database", guild_id);
        }
        Ok(())
    }

    pub fn guild(&self, guild_id: u64) -> Option<&GuildSettings> {
        self.data.guilds.get(&guild_id.to_string())
    }

    /// Prefijo del servidor, o el prefijo por defecto si no está registrado
    pub fn guild_prefix(&self, guild_id: u64) -> String {
        self.guild(guild_id)
            .map(|g| g.prefix.clone())
            .unwrap_or_else(|| self.default_prefix.clone())
    }

    pub async fn set_guild_prefix(&mut self, guild_id: u64, prefix: &str) -> Result<()> {
        let settings = self.new_guild();
        self.data
            .guilds
            .entry(guild_id.to_string())
            .or_insert(settings)
            .prefix = prefix.to_string();
        self.save().await
    }

    pub fn log_channel(&self, guild_id: u64) -> Option<u64> {
        self.guild(guild_id).and_then(|g| g.log_channel)
    }

    pub async fn set_log_channel(&mut self, guild_id: u64, channel_id: Option<u64>) -> Result<()> {
        let settings = self.new_guild();
        self.data
            .guilds
            .entry(guild_id.to_string())
            .or_insert(settings)
            .log_channel = channel_id;
        self.save().await
    }

    /// Añade una advertencia y devuelve el total del usuario en el servidor
    pub async fn add_warning(
        &mut self,
        guild_id: u64,
        user_id: u64,
        moderator_id: u64,
        reason: &str,
    ) -> Result<usize> {
        let list = self
            .data
            .warnings
            .entry(Self::warning_key(guild_id, user_id))
            .or_default();
        list.push(Warning {
            moderator_id,
            reason: reason.to_string(),
            timestamp: Utc::now(),
        });
        let count = list.len();

        self.save().await?;
        Ok(count)
    }

    pub fn warnings(&self, guild_id: u64, user_id: u64) -> &[Warning] {
        self.data
            .warnings
            .get(&Self::warning_key(guild_id, user_id))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub async fn clear_warnings(&mut self, guild_id: u64, user_id: u64) -> Result<()> {
        if self
            .data
            .warnings
            .remove(&Self::warning_key(guild_id, user_id))
            .is_some()
        {
            self.save().await?;
        }
        Ok(())
    }

    pub fn guild_count(&self) -> usize {
        self.data.guilds.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    async fn store(dir: &TempDir) -> GuildStore {
        GuildStore::open(dir.path().join("data").join("db.json"), "//")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn creates_parent_dir_and_defaults() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir).await;

        assert!(dir.path().join("data").is_dir());
        assert_eq!(store.guild_prefix(1), "//");
        assert_eq!(store.log_channel(1), None);
        assert!(store.warnings(1, 2).is_empty());
    }

    #[tokio::test]
    async fn add_guild_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let mut store = store(&dir).await;

        store.add_guild(10).await.unwrap();
        store.set_guild_prefix(10, "!").await.unwrap();
        store.add_guild(10).await.unwrap();

        assert_eq!(store.guild_prefix(10), "!");
        assert_eq!(store.guild_count(), 1);
    }

    #[tokio::test]
    async fn setters_create_missing_guilds() {
        let dir = TempDir::new().unwrap();
        let mut store = store(&dir).await;

        store.set_log_channel(5, Some(99)).await.unwrap();
        assert_eq!(store.log_channel(5), Some(99));
        assert_eq!(store.guild_prefix(5), "//");

        store.set_log_channel(5, None).await.unwrap();
        assert_eq!(store.log_channel(5), None);
    }

    #[tokio::test]
    async fn warnings_count_and_clear() {
        let dir = TempDir::new().unwrap();
        let mut store = store(&dir).await;

        assert_eq!(store.add_warning(1, 2, 3, "spam").await.unwrap(), 1);
        assert_eq!(store.add_warning(1, 2, 3, "more spam").await.unwrap(), 2);
        assert_eq!(store.add_warning(9, 2, 3, "other guild").await.unwrap(), 1);

        let reasons: Vec<&str> = store.warnings(1, 2).iter().map(|w| w.reason.as_str()).collect();
        assert_eq!(reasons, vec!["spam", "more spam"]);

        store.clear_warnings(1, 2).await.unwrap();
        assert!(store.warnings(1, 2).is_empty());
        assert_eq!(store.warnings(9, 2).len(), 1);
    }

    #[tokio::test]
    async fn data_survives_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let mut store = store(&dir).await;
            store.set_guild_prefix(7, "?").await.unwrap();
            store.add_warning(7, 8, 1, "rude").await.unwrap();
        }

        let store = store(&dir).await;
        assert_eq!(store.guild_prefix(7), "?");
        assert_eq!(store.warnings(7, 8)[0].moderator_id, 1);

        let raw = std::fs::read_to_string(dir.path().join("data").join("db.json")).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert!(json["warnings"]["7_8"].is_array());
        assert!(json["music_queues"].is_object());
    }

    #[tokio::test]
    async fn corrupt_file_falls_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("db.json");
        std::fs::write(&path, "{ not json").unwrap();

        let mut store = GuildStore::open(&path, "//").await.unwrap();
        assert_eq!(store.guild_count(), 0);

        store.add_guild(1).await.unwrap();
        let reopened = GuildStore::open(&path, "//").await.unwrap();
        assert_eq!(reopened.guild_count(), 1);
    }

    #[tokio::test]
    async fn remove_guild_forgets_settings() {
        let dir = TempDir::new().unwrap();
        let mut store = store(&dir).await;

        store.set_guild_prefix(3, "$").await.unwrap();
        store.remove_guild(3).await.unwrap();
        assert_eq!(store.guild_prefix(3), "//");
        assert!(store.guild(3).is_none());
    }
}
