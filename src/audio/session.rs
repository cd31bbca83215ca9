use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use serenity::model::id::{ChannelId, GuildId, UserId};
use std::{future::Future, sync::Arc, time::Duration};
use tokio::sync::{Mutex as AsyncMutex, MutexGuard};
use tracing::{debug, warn};

use crate::{
    audio::{
        engine::AudioEngine,
        filters::{FilterChainController, FilterChainState},
        loop_mode::{LoopMode, LoopModeManager},
        player::PlaybackController,
        queue::{MusicQueue, QueueController, QueueInfo, QueueItem, QueuePage},
    },
    error::{EngineError, SessionError, SessionResult},
    stats::ServiceStats,
};

/// Valores con los que nace cada sesión.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub default_volume: u16,
    pub max_queue_size: usize,
    pub engine_timeout: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            default_volume: 100,
            max_queue_size: 1000,
            engine_timeout: Duration::from_secs(10),
        }
    }
}

/// Campos mutables de una sesión.
#[derive(Debug)]
pub(crate) struct SessionState {
    pub(crate) queue: MusicQueue,
    pub(crate) current: Option<QueueItem>,
    pub(crate) loop_mode: LoopMode,
    pub(crate) is_247: bool,
    pub(crate) volume_percent: u16,
    pub(crate) filters: FilterChainState,
    pub(crate) paused: bool,
    pub(crate) position: Duration,
    pub(crate) voice_channel: Option<ChannelId>,
    pub(crate) last_requester: Option<UserId>,
}

impl SessionState {
    fn new(settings: &SessionSettings) -> Self {
        Self {
            queue: MusicQueue::new(settings.max_queue_size),
            current: None,
            loop_mode: LoopMode::None,
            is_247: false,
            volume_percent: settings.default_volume.min(crate::audio::player::MAX_VOLUME),
            filters: FilterChainState::default(),
            paused: false,
            position: Duration::ZERO,
            voice_channel: None,
            last_requester: None,
        }
    }

    /// Vuelve al estado "sin reproducir".
    pub(crate) fn reset_playback(&mut self) {
        self.current = None;
        self.paused = false;
        self.position = Duration::ZERO;
    }
}

/// Copia coherente del estado de una sesión para comandos de consulta.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub guild_id: GuildId,
    pub current: Option<QueueItem>,
    pub queue: Vec<QueueItem>,
    pub loop_mode: LoopMode,
    pub is_247: bool,
    pub volume_percent: u16,
    pub paused: bool,
    pub position: Duration,
    pub filters: FilterChainState,
    pub voice_channel: Option<ChannelId>,
    pub last_requester: Option<UserId>,
}

/// Estado de reproducción de un guild.
///
/// Toda mutación pasa por [`GuildSession::lock`], que serializa los comandos
/// del guild y se mantiene durante el round-trip con el motor. Los campos viven
/// detrás de un `RwLock` que sólo se toma en secciones cortas y sin `await`,
/// así las consultas nunca esperan a un commit lento.
pub struct GuildSession {
    guild_id: GuildId,
    state: RwLock<SessionState>,
    mutation: AsyncMutex<()>,
    engine: Arc<dyn AudioEngine>,
    stats: Arc<ServiceStats>,
    engine_timeout: Duration,
    created_at: DateTime<Utc>,
    last_activity: Mutex<DateTime<Utc>>,
}

impl GuildSession {
    pub fn new(
        guild_id: GuildId,
        engine: Arc<dyn AudioEngine>,
        stats: Arc<ServiceStats>,
        settings: &SessionSettings,
    ) -> Self {
        let now = Utc::now();
        Self {
            guild_id,
            state: RwLock::new(SessionState::new(settings)),
            mutation: AsyncMutex::new(()),
            engine,
            stats,
            engine_timeout: settings.engine_timeout,
            created_at: now,
            last_activity: Mutex::new(now),
        }
    }

    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn last_activity(&self) -> DateTime<Utc> {
        *self.last_activity.lock()
    }

    /// Espera el lock exclusivo de mutación del guild.
    pub async fn lock(&self) -> SessionGuard<'_> {
        let permit = self.mutation.lock().await;
        self.touch();
        SessionGuard {
            session: self,
            _permit: permit,
        }
    }

    /// Igual que [`lock`](Self::lock) pero sin esperar.
    pub fn try_lock(&self) -> Option<SessionGuard<'_>> {
        let permit = self.mutation.try_lock().ok()?;
        self.touch();
        Some(SessionGuard {
            session: self,
            _permit: permit,
        })
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.state.read();
        SessionSnapshot {
            guild_id: self.guild_id,
            current: state.current.clone(),
            queue: state.queue.iter().cloned().collect(),
            loop_mode: state.loop_mode,
            is_247: state.is_247,
            volume_percent: state.volume_percent,
            paused: state.paused,
            position: state.position,
            filters: state.filters.clone(),
            voice_channel: state.voice_channel,
            last_requester: state.last_requester,
        }
    }

    pub fn now_playing(&self) -> Option<QueueItem> {
        self.state.read().current.clone()
    }

    pub fn is_playing(&self) -> bool {
        self.state.read().current.is_some()
    }

    pub fn queue_info(&self) -> QueueInfo {
        let state = self.state.read();
        state.queue.info(state.current.clone(), state.loop_mode)
    }

    /// Página de la cola (1-based) para el comando de listado.
    pub fn queue_page(&self, page: usize, items_per_page: usize) -> QueuePage {
        self.queue_info().get_page(page, items_per_page)
    }

    /// Una sesión se puede desalojar si no reproduce, no está en modo 24/7 y
    /// no ha recibido comandos en `max_idle`.
    pub fn is_evictable(&self, now: DateTime<Utc>, max_idle: Duration) -> bool {
        let idle_since = self.last_activity();
        let idle_for = now
            .signed_duration_since(idle_since)
            .to_std()
            .unwrap_or(Duration::ZERO);

        let state = self.state.read();
        !state.is_247 && state.current.is_none() && idle_for >= max_idle
    }

    /// `true` mientras algún comando tiene el lock de mutación. No toca
    /// `last_activity`.
    pub(crate) fn is_locked(&self) -> bool {
        self.mutation.try_lock().is_err()
    }

        pub(crate) fn engine(&self) -> &dyn AudioEngine {
        self.engine.as_ref()
    }

    pub(crate) fn stats(&self) -> &ServiceStats {
        &self.stats
    }

    pub(crate) fn read<R>(&self, f: impl FnOnce(&SessionState) -> R) -> R {
        f(&*self.state.read())
    }

    pub(crate) fn write<R>(&self, f: impl FnOnce(&mut SessionState) -> R) -> R {
        f(&mut *self.state.write())
    }

    /// Ejecuta un round-trip con el motor acotado por `engine_timeout`.
    pub(crate) async fn call_engine<T>(
        &self,
        call: impl Future<Output = Result<T, EngineError>>,
    ) -> SessionResult<T> {
        match tokio::time::timeout(self.engine_timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                warn!("❌ Motor de audio falló en guild {}: {}", self.guild_id, e);
                Err(SessionError::from(e))
            }
            Err(_) => {
                warn!(
                    "⏱️ Motor de audio sin respuesta tras {:?} en guild {}",
                    self.engine_timeout, self.guild_id
                );
                Err(SessionError::TransportTimeout)
            }
        }
    }

    fn touch(&self) {
        *self.last_activity.lock() = Utc::now();
    }
}

impl std::fmt::Debug for GuildSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuildSession")
            .field("guild_id", &self.guild_id)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

/// Prueba de que se tiene el lock exclusivo de una sesión.
///
/// Los controladores sólo se obtienen desde aquí; al soltar el guard se libera
/// el lock, incluso si la operación falló o expiró.
pub struct SessionGuard<'a> {
    session: &'a GuildSession,
    _permit: MutexGuard<'a, ()>,
}

impl<'a> SessionGuard<'a> {
    pub fn session(&self) -> &GuildSession {
        self.session
    }

    pub fn queue(&self) -> QueueController<'_> {
        QueueController::new(self.session)
    }

    pub fn filters(&self) -> FilterChainController<'_> {
        FilterChainController::new(self.session)
    }

    pub fn playback(&self) -> PlaybackController<'_> {
        PlaybackController::new(self.session)
    }

    pub fn loop_mode(&self) -> LoopModeManager<'_> {
        LoopModeManager::new(self.session)
    }
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        debug!("🔓 Lock liberado en guild {}", self.session.guild_id);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::audio::{engine::LoopbackEngine, track::Track};

    pub(crate) fn session_with(engine: Arc<dyn AudioEngine>, settings: SessionSettings) -> GuildSession {
        GuildSession::new(GuildId::new(1), engine, Arc::new(ServiceStats::new()), &settings)
    }

    pub(crate) fn item(id: &str) -> QueueItem {
        QueueItem::new(
            Track::new(id, format!("Track {}", id), Duration::from_secs(180))
                .with_author("Test Artist")
                .with_uri(format!("https://example.com/tracks/{}", id))
                .with_artwork(format!("https://example.com/art/{}.jpg", id)),
            UserId::new(42),
        )
    }

    #[tokio::test]
    async fn test_new_session_defaults() {
        let settings = SessionSettings {
            default_volume: 500,
            ..SessionSettings::default()
        };
        let session = session_with(Arc::new(LoopbackEngine::new()), settings);
        let snapshot = session.snapshot();

        assert_eq!(snapshot.volume_percent, 150);
        assert_eq!(snapshot.loop_mode, LoopMode::None);
        assert!(snapshot.current.is_none());
        assert!(snapshot.queue.is_empty());
        assert!(snapshot.filters.is_empty());
        assert!(!snapshot.is_247);
    }

    #[tokio::test]
    async fn test_lock_is_exclusive() {
        let session = session_with(Arc::new(LoopbackEngine::new()), SessionSettings::default());

        let guard = session.lock().await;
        assert!(session.is_locked());
        assert!(session.try_lock().is_none());
        // las consultas no esperan al lock de mutación
        assert!(session.now_playing().is_none());
        drop(guard);

        assert!(!session.is_locked());
        assert!(session.try_lock().is_some());
    }

    #[tokio::test]
    async fn test_snapshot_is_not_blocked_by_slow_mutation() {
        let engine = Arc::new(LoopbackEngine::new().with_latency(Duration::from_millis(200)));
        let session = Arc::new(session_with(engine, SessionSettings::default()));

        let writer = {
            let session = session.clone();
            tokio::spawn(async move {
                let guard = session.lock().await;
                let result = guard.playback().play(item("a").track, UserId::new(1)).await;
                result
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        // el play está en vuelo: la consulta ve el estado anterior completo
        assert!(session.try_lock().is_none());
        assert!(session.snapshot().current.is_none());

        writer.await.unwrap().unwrap();
        assert_eq!(
            session.now_playing().map(|i| i.track.identifier),
            Some("a".to_string())
        );
    }

    #[tokio::test]
    async fn test_evictable_rules() {
        let session = session_with(Arc::new(LoopbackEngine::new()), SessionSettings::default());
        let later = Utc::now() + chrono::Duration::minutes(10);

        assert!(session.is_evictable(later, Duration::from_secs(60)));
        assert!(!session.is_evictable(Utc::now(), Duration::from_secs(600)));

        session.write(|state| state.is_247 = true);
        assert!(!session.is_evictable(later, Duration::from_secs(60)));

        session.write(|state| {
            state.is_247 = false;
            state.current = Some(item("a"));
        });
        assert!(!session.is_evictable(later, Duration::from_secs(60)));
    }
}
