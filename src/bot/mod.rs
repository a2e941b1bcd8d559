//! # Bot Module
//!
//! Serenity event handler and the prefix command layer.
//!
//! [`Bot`] owns the shared state every command needs: configuration, the
//! guild store, the audio player, the track resolver and the MangaDex client.
//! Messages are routed through [`handlers::handle_message`], which resolves
//! the guild prefix, applies permission and cooldown checks and dispatches to
//! the per-category modules.

use anyhow::Result;
use serenity::{
    all::{
        ActivityData, ChannelId, Context, EventHandler, Guild, GuildId, Message, Ready,
        UnavailableGuild, VoiceState,
    },
    async_trait,
    gateway::ShardManager,
    prelude::TypeMapKey,
};
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};
use tracing::{error, info, warn};

pub mod admin;
pub mod commands;
pub mod handlers;
pub mod manga;
pub mod moderation;
pub mod music;
pub mod permissions;
pub mod utility;

use crate::{
    audio::player::AudioPlayer,
    config::Config,
    manga::MangaDexClient,
    sources::MusicSource,
    storage::GuildStore,
};
use commands::Cooldowns;

/// Acceso al ShardManager desde los comandos (latencia)
pub struct ShardManagerContainer;

impl TypeMapKey for ShardManagerContainer {
    type Value = Arc<ShardManager>;
}

pub struct Bot {
    pub config: Arc<Config>,
    /// Base de datos JSON (prefijos, canal de logs, advertencias)
    pub storage: Arc<tokio::sync::Mutex<GuildStore>>,
    pub player: Arc<AudioPlayer>,
    pub source: Arc<dyn MusicSource>,
    pub manga: MangaDexClient,
    pub cooldowns: Cooldowns,
    pub started_at: Instant,
    keep_alive_started: AtomicBool,
}

impl Bot {
    pub fn new(
        config: Config,
        storage: Arc<tokio::sync::Mutex<GuildStore>>,
        source: Arc<dyn MusicSource>,
    ) -> Result<Self> {
        let manga = MangaDexClient::new(&config.mangadex_api)?;
        let player = Arc::new(AudioPlayer::new(config.default_volume));

        Ok(Self {
            config: Arc::new(config),
            storage,
            player,
            source,
            manga,
            cooldowns: Cooldowns::new(),
            started_at: Instant::now(),
            keep_alive_started: AtomicBool::new(false),
        })
    }

    /// Conecta (o mueve) el bot al canal de voz
    pub async fn join_voice_channel(
        &self,
        ctx: &Context,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<Arc<tokio::sync::Mutex<songbird::Call>>> {
        let manager = songbird::get(ctx)
            .await
            .ok_or_else(|| anyhow::anyhow!("Songbird not initialised"))?;

        match manager.join(guild_id, channel_id).await {
            Ok(call) => {
                info!("🔊 Connected to voice in guild {}", guild_id);
                Ok(call)
            }
            Err(e) => {
                error!("Error joining voice channel: {:?}", e);
                Err(anyhow::anyhow!("Could not connect to the voice channel"))
            }
        }
    }

    /// Sale del canal de voz y limpia la reproducción
    pub async fn leave_voice_channel(&self, ctx: &Context, guild_id: GuildId) -> Result<()> {
        let manager = songbird::get(ctx)
            .await
            .ok_or_else(|| anyhow::anyhow!("Songbird not initialised"))?;

        self.player.cleanup(guild_id);
        manager.remove(guild_id).await?;

        info!("👋 Left voice in guild {}", guild_id);
        Ok(())
    }

    pub async fn voice_call(
        &self,
        ctx: &Context,
        guild_id: GuildId,
    ) -> Option<Arc<tokio::sync::Mutex<songbird::Call>>> {
        songbird::get(ctx).await?.get(guild_id)
    }
}

/// Latencia del gateway del shard actual
pub async fn shard_latency(ctx: &Context) -> Option<Duration> {
    let data = ctx.data.read().await;
    let manager = data.get::<ShardManagerContainer>()?.clone();
    drop(data);

    let runners = manager.runners.lock().await;
    runners.get(&ctx.shard_id).and_then(|runner| runner.latency)
}

#[async_trait]
impl EventHandler for Bot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 {} is online!", ready.user.name);
        info!("📊 Connected to {} guilds", ready.guilds.len());

        ctx.set_activity(Some(ActivityData::listening(format!(
            "{}help for commands",
            self.config.default_prefix
        ))));

        // El ready se repite en cada reconexión
        if !self.keep_alive_started.swap(true, Ordering::SeqCst) {
            let minutes = self.config.keep_alive_minutes;
            tokio::spawn(async move {
                keep_alive(ctx, minutes).await;
            });
        }
    }

    async fn message(&self, ctx: Context, msg: Message) {
        if let Err(e) = handlers::handle_message(&ctx, &msg, self).await {
            error!("Error handling message: {:?}", e);
        }
    }

    async fn guild_create(&self, _ctx: Context, guild: Guild, is_new: Option<bool>) {
        if is_new == Some(true) {
            info!("📥 Joined new guild: {} ({})", guild.name, guild.id);
        }

        if let Err(e) = self.storage.lock().await.add_guild(guild.id.get()).await {
            error!("Error registering guild {}: {:?}", guild.id, e);
        }
    }

    async fn guild_delete(&self, _ctx: Context, incomplete: UnavailableGuild, _full: Option<Guild>) {
        // Una caída de Discord no es salir del servidor
        if incomplete.unavailable {
            warn!("⚠️ Guild {} became unavailable", incomplete.id);
            return;
        }

        info!("📤 Left guild {}", incomplete.id);
        self.player.cleanup(incomplete.id);
        if let Err(e) = self.storage.lock().await.remove_guild(incomplete.id.get()).await {
            error!("Error removing guild {}: {:?}", incomplete.id, e);
        }
    }

    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        let current_user_id = ctx.cache.current_user().id;
        if new.user_id != current_user_id || old.is_none() || new.channel_id.is_some() {
            return;
        }

        let Some(guild_id) = new.guild_id else {
            return;
        };

        info!("🔌 Disconnected from voice in guild {}", guild_id);
        self.player.cleanup(guild_id);

        if let Some(manager) = songbird::get(&ctx).await {
            if manager.get(guild_id).is_some() {
                if let Err(e) = manager.remove(guild_id).await {
                    warn!("⚠️ Could not drop voice call for {}: {:?}", guild_id, e);
                }
            }
        }
    }
}

/// Registra periódicamente que el bot sigue vivo
async fn keep_alive(ctx: Context, minutes: u64) {
    let period = Duration::from_secs(minutes * 60);
    let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);

    loop {
        interval.tick().await;

        match shard_latency(&ctx).await {
            Some(latency) => info!("💓 Bot is alive! Latency: {}ms", latency.as_millis()),
            None => info!("💓 Bot is alive! Latency: unknown"),
        }
    }
}
