use anyhow::Result;
use dashmap::{DashMap, DashSet};
use parking_lot::Mutex;
use serenity::{
    builder::{CreateEmbed, CreateMessage},
    http::Http,
    model::id::{ChannelId, GuildId},
};
use songbird::{
    tracks::{PlayMode, TrackHandle},
    Call, Event, EventContext, EventHandler as VoiceEventHandler, TrackEvent,
};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::{
    audio::queue::{MusicQueue, QueueItem},
    ui::embeds,
};

/// Cómo avanzar la cola al pedir la siguiente canción
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// Fin natural del track: respeta el modo repeat
    Next,
    /// Salto forzado: ignora la repetición de canción
    Skip,
}

impl Advance {
    /// Un track que falló no se repite aunque esté activo repeat song
    pub fn after_track(errored: bool) -> Self {
        if errored {
            Advance::Skip
        } else {
            Advance::Next
        }
    }
}

/// Marca de "arrancando reproducción" para un guild; se libera al soltarla
struct StartClaim<'a> {
    starting: &'a DashSet<GuildId>,
    guild_id: GuildId,
}

impl Drop for StartClaim<'_> {
    fn drop(&mut self) {
        self.starting.remove(&self.guild_id);
    }
}

/// Driver de reproducción: conecta las colas por guild con songbird
pub struct AudioPlayer {
    queues: DashMap<GuildId, Arc<Mutex<MusicQueue>>>,
    current_tracks: DashMap<GuildId, TrackHandle>,
    /// Guilds con un arranque en curso (aún sin handle en `current_tracks`)
    starting: DashSet<GuildId>,
    volumes: DashMap<GuildId, u8>,
    text_channels: DashMap<GuildId, ChannelId>,
    http_client: reqwest::Client,
    default_volume: u8,
}

impl AudioPlayer {
    pub fn new(default_volume: u8) -> Self {
        Self {
            queues: DashMap::new(),
            current_tracks: DashMap::new(),
            starting: DashSet::new(),
            volumes: DashMap::new(),
            text_channels: DashMap::new(),
            http_client: reqwest::Client::new(),
            default_volume,
        }
    }

    /// Cola del guild; se crea la primera vez que se usa
    pub fn queue(&self, guild_id: GuildId) -> Arc<Mutex<MusicQueue>> {
        self.queues
            .entry(guild_id)
            .or_insert_with(|| {
                debug!("📋 New queue for guild {}", guild_id);
                Arc::new(Mutex::new(MusicQueue::new()))
            })
            .clone()
    }

    /// Canal donde se anuncian las canciones
    pub fn set_text_channel(&self, guild_id: GuildId, channel_id: ChannelId) {
        self.text_channels.insert(guild_id, channel_id);
    }

    pub fn volume(&self, guild_id: GuildId) -> u8 {
        self.volumes
            .get(&guild_id)
            .map(|v| *v)
            .unwrap_or(self.default_volume)
    }

    /// Hay un track cargado (sonando o en pausa)
    pub fn is_active(&self, guild_id: GuildId) -> bool {
        self.current_tracks.contains_key(&guild_id)
    }

    /// Reserva el arranque del guild. `None` si ya suena algo o otro comando
    /// está arrancando.
    fn claim_start(&self, guild_id: GuildId) -> Option<StartClaim<'_>> {
        if !self.starting.insert(guild_id) {
            return None;
        }
        let claim = StartClaim {
            starting: &self.starting,
            guild_id,
        };
        // play_next inserta el handle antes de que se suelte la marca
        if self.is_active(guild_id) {
            return None;
        }
        Some(claim)
    }

    /// Arranca la cola si el guild está parado.
    ///
    /// Devuelve `false` sin tocar la cola cuando ya hay reproducción (o un
    /// arranque concurrente); el item quedó encolado y sonará en su turno.
    pub async fn start_if_idle(
        self: &Arc<Self>,
        guild_id: GuildId,
        call: Arc<tokio::sync::Mutex<Call>>,
        http: Arc<Http>,
    ) -> Result<bool> {
        let Some(_claim) = self.claim_start(guild_id) else {
            return Ok(false);
        };

        self.play_next(guild_id, call, http, Advance::Next).await?;
        Ok(true)
    }

    pub async fn is_paused(&self, guild_id: GuildId) -> bool {
        let Some(handle) = self.current_handle(guild_id) else {
            return false;
        };
        matches!(handle.get_info().await, Ok(state) if matches!(state.playing, PlayMode::Pause))
    }

    fn current_handle(&self, guild_id: GuildId) -> Option<TrackHandle> {
        self.current_tracks.get(&guild_id).map(|h| h.clone())
    }

    /// Avanza la cola y reproduce el resultado en la llamada.
    ///
    /// Devuelve el item que empezó a sonar, o `None` si la cola terminó.
    pub async fn play_next(
        self: &Arc<Self>,
        guild_id: GuildId,
        call: Arc<tokio::sync::Mutex<Call>>,
        http: Arc<Http>,
        advance: Advance,
    ) -> Result<Option<QueueItem>> {
        let queue = self.queue(guild_id);
        let next = {
            let mut q = queue.lock();
            match advance {
                Advance::Next => q.get_next(),
                Advance::Skip => q.skip(),
            }
        };

        let Some(item) = next else {
            debug!("Queue empty for guild {}", guild_id);
            self.current_tracks.remove(&guild_id);
            self.announce(&http, guild_id, embeds::queue_finished_embed()).await;
            return Ok(None);
        };

        info!("🎵 Playing in {}: {}", guild_id, item.title);

        let input = item.source.get_input(self.http_client.clone());
        let handle = {
            let mut call = call.lock().await;
            call.play_input(input)
        };

        let volume = self.volume(guild_id);
        if let Err(e) = handle.set_volume(volume as f32 / 100.0) {
            warn!("⚠️ Could not set volume: {}", e);
        }

        let end_handler = TrackEndHandler {
            player: Arc::clone(self),
            guild_id,
            call: call.clone(),
            http: http.clone(),
        };
        handle
            .add_event(Event::Track(TrackEvent::End), end_handler.clone())
            .map_err(|e| anyhow::anyhow!("Error adding track end handler: {}", e))?;
        handle
            .add_event(Event::Track(TrackEvent::Error), end_handler)
            .map_err(|e| anyhow::anyhow!("Error adding track error handler: {}", e))?;

        // El handle anterior queda obsoleto; su evento de fin se ignorará
        if let Some(previous) = self.current_tracks.insert(guild_id, handle) {
            let _ = previous.stop();
        }

        self.announce(&http, guild_id, embeds::now_playing_embed(&item, volume))
            .await;

        Ok(Some(item))
    }

    /// Salta la canción actual. El evento de fin del track detenido se descarta.
    pub async fn skip(
        self: &Arc<Self>,
        guild_id: GuildId,
        call: Arc<tokio::sync::Mutex<Call>>,
        http: Arc<Http>,
    ) -> Result<Option<QueueItem>> {
        if let Some((_, handle)) = self.current_tracks.remove(&guild_id) {
            let _ = handle.stop();
        }

        self.play_next(guild_id, call, http, Advance::Skip).await
    }

    /// Detiene la reproducción y limpia la cola
    pub fn stop(&self, guild_id: GuildId) {
        if let Some((_, handle)) = self.current_tracks.remove(&guild_id) {
            let _ = handle.stop();
        }

        self.queue(guild_id).lock().clear();
        info!("⏹️ Playback stopped in {}", guild_id);
    }

    pub fn pause(&self, guild_id: GuildId) -> bool {
        match self.current_handle(guild_id) {
            Some(handle) => {
                let _ = handle.pause();
                info!("⏸️ Playback paused in {}", guild_id);
                true
            }
            None => false,
        }
    }

    pub fn resume(&self, guild_id: GuildId) -> bool {
        match self.current_handle(guild_id) {
            Some(handle) => {
                let _ = handle.play();
                info!("▶️ Playback resumed in {}", guild_id);
                true
            }
            None => false,
        }
    }

    /// Ajusta el volumen (0-200) del track actual y de los siguientes
    pub fn set_volume(&self, guild_id: GuildId, volume: u8) {
        self.volumes.insert(guild_id, volume);

        if let Some(handle) = self.current_handle(guild_id) {
            if let Err(e) = handle.set_volume(volume as f32 / 100.0) {
                warn!("⚠️ Could not set volume: {}", e);
            }
        }
        info!("🔊 Volume set to {}% in {}", volume, guild_id);
    }

    /// Limpia todo el estado de reproducción del guild tras salir de voz.
    /// La cola se vacía pero la instancia se conserva.
    pub fn cleanup(&self, guild_id: GuildId) {
        self.stop(guild_id);
        self.text_channels.remove(&guild_id);
        debug!("🧹 Playback state dropped for {}", guild_id);
    }

    async fn announce(&self, http: &Http, guild_id: GuildId, embed: CreateEmbed) {
        let Some(channel_id) = self.text_channels.get(&guild_id).map(|c| *c) else {
            return;
        };

        if let Err(e) = channel_id
            .send_message(http, CreateMessage::new().embed(embed))
            .await
        {
            warn!("⚠️ Could not post playback update in {}: {}", channel_id, e);
        }
    }

    /// Fin (o error) de `ended`. Solo avanza si sigue siendo el track actual.
    async fn on_track_end(
        self: &Arc<Self>,
        guild_id: GuildId,
        ended: &TrackHandle,
        advance: Advance,
        call: Arc<tokio::sync::Mutex<Call>>,
        http: Arc<Http>,
    ) {
        if self
            .current_tracks
            .remove_if(&guild_id, |_, handle| handle.uuid() == ended.uuid())
            .is_none()
        {
            debug!("Ignoring stale track end in {}", guild_id);
            return;
        }

        if let Err(e) = self.play_next(guild_id, call, http, advance).await {
            error!("Error playing next track: {:?}", e);
        }
    }
}

/// Handler para cuando termina una canción
#[derive(Clone)]
struct TrackEndHandler {
    player: Arc<AudioPlayer>,
    guild_id: GuildId,
    call: Arc<tokio::sync::Mutex<Call>>,
    http: Arc<Http>,
}

#[async_trait::async_trait]
impl VoiceEventHandler for TrackEndHandler {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        let EventContext::Track(tracks) = ctx else {
            return None;
        };

        for (state, handle) in tracks.iter() {
            let errored = match &state.playing {
                PlayMode::Errored(e) => {
                    warn!("⚠️ Track failed in {}: {:?}", self.guild_id, e);
                    true
                }
                _ => false,
            };

            self.player
                .on_track_end(
                    self.guild_id,
                    handle,
                    Advance::after_track(errored),
                    self.call.clone(),
                    self.http.clone(),
                )
                .await;
        }

        None
    }
}
