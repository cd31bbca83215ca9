use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use serenity::model::id::{ChannelId, GuildId};
use std::time::Duration;
use tracing::{debug, info};

use crate::{
    audio::{
        filters::FilterChainState,
        track::{SearchMode, Track, TrackLoadResult},
    },
    error::EngineError,
};

/// Frontera con el motor de audio externo (nodo Lavalink o similar).
///
/// El núcleo nunca decodifica ni transporta audio: sólo entrega estados
/// completamente validados. Cada método es un round-trip que el núcleo
/// envuelve con un timeout mientras mantiene el lock de la sesión.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AudioEngine: Send + Sync {
    async fn load_tracks(&self, query: &str, mode: SearchMode) -> Result<TrackLoadResult, EngineError>;

    /// Reemplaza la cadena de filtros completa (nunca un diff).
    async fn apply_filters(&self, guild_id: GuildId, filters: &FilterChainState) -> Result<(), EngineError>;

    async fn play(&self, guild_id: GuildId, track: &Track) -> Result<(), EngineError>;

    async fn pause(&self, guild_id: GuildId) -> Result<(), EngineError>;

    async fn resume(&self, guild_id: GuildId) -> Result<(), EngineError>;

    async fn stop(&self, guild_id: GuildId) -> Result<(), EngineError>;

    async fn seek(&self, guild_id: GuildId, position: Duration) -> Result<(), EngineError>;

    /// `volume` es el multiplicador (porcentaje / 100).
    async fn set_volume(&self, guild_id: GuildId, volume: f32) -> Result<(), EngineError>;

    async fn connect(&self, guild_id: GuildId, channel_id: ChannelId) -> Result<(), EngineError>;

    async fn disconnect(&self, guild_id: GuildId) -> Result<(), EngineError>;
}

/// Operación registrada por [`LoopbackEngine`].
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    Filters(GuildId, FilterChainState),
    Play(GuildId, String),
    Pause(GuildId),
    Resume(GuildId),
    Stop(GuildId),
    Seek(GuildId, Duration),
    Volume(GuildId, f32),
    Connect(GuildId, ChannelId),
    Disconnect(GuildId),
}

/// Motor en proceso que acepta todas las operaciones y las registra.
///
/// El binario lo usa cuando no hay un nodo externo configurado. `latency`
/// simula el round-trip de red antes de registrar cada llamada.
pub struct LoopbackEngine {
    latency: Duration,
    catalog: DashMap<String, TrackLoadResult>,
    calls: Mutex<Vec<EngineCall>>,
}

impl LoopbackEngine {
    pub fn new() -> Self {
        Self {
            latency: Duration::ZERO,
            catalog: DashMap::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Registra el resultado que devolverá `load_tracks` para `query`.
    pub fn register(&self, query: impl Into<String>, result: TrackLoadResult) {
        self.catalog.insert(query.into(), result);
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls.lock().clone()
    }

    /// Todas las cadenas de filtros confirmadas para un guild, en orden.
    pub fn filter_commits(&self, guild_id: GuildId) -> Vec<FilterChainState> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                EngineCall::Filters(id, state) if *id == guild_id => Some(state.clone()),
                _ => None,
            })
            .collect()
    }

    async fn record(&self, call: EngineCall) -> Result<(), EngineError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        debug!("🔁 Loopback: {:?}", call);
        self.calls.lock().push(call);
        Ok(())
    }
}

impl Default for LoopbackEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AudioEngine for LoopbackEngine {
    async fn load_tracks(&self, query: &str, mode: SearchMode) -> Result<TrackLoadResult, EngineError> {
        let result = self
            .catalog
            .get(query)
            .map(|entry| entry.value().clone())
            .unwrap_or_else(TrackLoadResult::empty);
        info!("🔍 Loopback load '{}' ({:?}): {} tracks", query, mode, result.tracks.len());
        Ok(result)
    }

    async fn apply_filters(&self, guild_id: GuildId, filters: &FilterChainState) -> Result<(), EngineError> {
        self.record(EngineCall::Filters(guild_id, filters.clone())).await
    }

    async fn play(&self, guild_id: GuildId, track: &Track) -> Result<(), EngineError> {
        self.record(EngineCall::Play(guild_id, track.identifier.clone())).await
    }

    async fn pause(&self, guild_id: GuildId) -> Result<(), EngineError> {
        self.record(EngineCall::Pause(guild_id)).await
    }

    async fn resume(&self, guild_id: GuildId) -> Result<(), EngineError> {
        self.record(EngineCall::Resume(guild_id)).await
    }

    async fn stop(&self, guild_id: GuildId) -> Result<(), EngineError> {
        self.record(EngineCall::Stop(guild_id)).await
    }

    async fn seek(&self, guild_id: GuildId, position: Duration) -> Result<(), EngineError> {
        self.record(EngineCall::Seek(guild_id, position)).await
    }

    async fn set_volume(&self, guild_id: GuildId, volume: f32) -> Result<(), EngineError> {
        self.record(EngineCall::Volume(guild_id, volume)).await
    }

    async fn connect(&self, guild_id: GuildId, channel_id: ChannelId) -> Result<(), EngineError> {
        self.record(EngineCall::Connect(guild_id, channel_id)).await
    }

    async fn disconnect(&self, guild_id: GuildId) -> Result<(), EngineError> {
        self.record(EngineCall::Disconnect(guild_id)).await
    }
}
