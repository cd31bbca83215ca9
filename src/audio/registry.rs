use chrono::Utc;
use dashmap::DashMap;
use serenity::model::id::GuildId;
use std::{sync::Arc, time::Duration};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    audio::{
        engine::AudioEngine,
        session::{GuildSession, SessionSettings},
    },
    config::Config,
    error::{SessionError, SessionResult},
    stats::{ServiceStats, StatsSnapshot},
};

/// Mapa guild → sesión con get-or-create atómico.
pub struct SessionRegistry {
    sessions: DashMap<GuildId, Arc<GuildSession>>,
    engine: Arc<dyn AudioEngine>,
    stats: Arc<ServiceStats>,
    settings: SessionSettings,
}

impl SessionRegistry {
    pub fn new(engine: Arc<dyn AudioEngine>, settings: SessionSettings) -> Self {
        info!("🎵 Registro de sesiones inicializado");
        Self {
            sessions: DashMap::new(),
            engine,
            stats: Arc::new(ServiceStats::new()),
            settings,
        }
    }

    pub fn from_config(engine: Arc<dyn AudioEngine>, config: &Config) -> Self {
        Self::new(engine, config.session_settings())
    }

    /// Dos llamadas concurrentes para un guild nuevo reciben la misma sesión:
    /// la inserción ocurre con el shard del mapa bloqueado.
    pub fn get_or_create(&self, guild_id: GuildId) -> Arc<GuildSession> {
        self.sessions
            .entry(guild_id)
            .or_insert_with(|| {
                self.stats.session_opened();
                info!("🆕 Sesión creada para guild {}", guild_id);
                Arc::new(GuildSession::new(
                    guild_id,
                    self.engine.clone(),
                    self.stats.clone(),
                    &self.settings,
                ))
            })
            .clone()
    }

    pub fn try_get(&self, guild_id: GuildId) -> Option<Arc<GuildSession>> {
        self.sessions.get(&guild_id).map(|entry| entry.value().clone())
    }

    /// Para comandos que exigen un reproductor existente.
    pub fn require(&self, guild_id: GuildId) -> SessionResult<Arc<GuildSession>> {
        self.try_get(guild_id).ok_or(SessionError::NoActiveSession)
    }

    pub fn active_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot(self.active_count())
    }

    /// Elimina la sesión y desconecta su reproductor.
    ///
    /// Espera a que termine la mutación en curso antes de desconectar. Devuelve
    /// `false` si el guild no tenía sesión.
    pub async fn remove(&self, guild_id: GuildId) -> SessionResult<bool> {
        let Some((_, session)) = self.sessions.remove(&guild_id) else {
            return Ok(false);
        };
        self.stats.session_closed();
        info!("🗑️ Sesión eliminada para guild {}", guild_id);

        teardown(&session).await?;
        Ok(true)
    }

    /// Desaloja las sesiones inactivas que no reproducen ni están en 24/7.
    ///
    /// Una sesión que algún llamador todavía retiene (aunque no la haya
    /// bloqueado) nunca se desaloja.
    pub async fn evict_idle(&self, max_idle: Duration) -> usize {
        let now = Utc::now();
        let candidates: Vec<GuildId> = self
            .sessions
            .iter()
            .filter(|entry| entry.value().is_evictable(now, max_idle))
            .map(|entry| *entry.key())
            .collect();

        let mut evicted = 0;
        for guild_id in candidates {
            // Con el shard bloqueado nadie puede clonar el Arc: un conteo de 1
            // significa que ningún comando tiene la sesión en mano.
            let Some((_, session)) = self.sessions.remove_if(&guild_id, |_, session| {
                Arc::strong_count(session) == 1
                    && !session.is_locked()
                    && session.is_evictable(now, max_idle)
            }) else {
                continue;
            };
            self.stats.session_closed();
            evicted += 1;

            if let Err(e) = teardown(&session).await {
                warn!("⚠️ Error al desconectar guild {} desalojado: {}", guild_id, e);
            }
        }

        if evicted > 0 {
            info!("🧹 {} sesiones inactivas desalojadas", evicted);
        }
        evicted
    }

    /// Tarea periódica que llama a [`evict_idle`](Self::evict_idle) hasta que
    /// se cancele `token`.
    pub fn spawn_sweeper(
        self: Arc<Self>,
        max_idle: Duration,
        every: Duration,
        token: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        debug!("Barrido de sesiones detenido");
                        break;
                    }
                    _ = ticker.tick() => {
                        self.evict_idle(max_idle).await;
                    }
                }
            }
        })
    }

    /// Desconecta todas las sesiones en paralelo (apagado del proceso).
    pub async fn shutdown(&self) -> usize {
        let guild_ids: Vec<GuildId> = self.sessions.iter().map(|entry| *entry.key()).collect();
        let results = futures::future::join_all(guild_ids.iter().map(|id| self.remove(*id))).await;

        let mut removed = 0;
        for (guild_id, result) in guild_ids.iter().zip(results) {
            match result {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(e) => {
                    removed += 1;
                    warn!("⚠️ Error al cerrar la sesión de guild {}: {}", guild_id, e);
                }
            }
        }
        removed
    }
}

async fn teardown(session: &GuildSession) -> SessionResult<()> {
    let guard = session.lock().await;
    if guard.session().snapshot().voice_channel.is_some() {
        guard.playback().disconnect().await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::engine::{EngineCall, LoopbackEngine};
    use serenity::model::id::{ChannelId, UserId};

    fn registry(engine: Arc<LoopbackEngine>) -> SessionRegistry {
        SessionRegistry::new(engine, SessionSettings::default())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_get_or_create_yields_one_session() {
        let registry = Arc::new(registry(Arc::new(LoopbackEngine::new())));
        let guild = GuildId::new(123);

        let handles: Vec<_> = (0..32)
            .map(|_| {
                let registry = registry.clone();
                tokio::spawn(async move { registry.get_or_create(guild) })
            })
            .collect();

        let sessions: Vec<Arc<GuildSession>> = futures::future::join_all(handles)
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .collect();

        assert!(sessions.iter().all(|s| Arc::ptr_eq(s, &sessions[0])));
        assert_eq!(registry.active_count(), 1);
        assert_eq!(registry.stats().sessions_opened, 1);
    }

    #[tokio::test]
    async fn test_try_get_does_not_create() {
        let registry = registry(Arc::new(LoopbackEngine::new()));
        let guild = GuildId::new(5);

        assert!(registry.try_get(guild).is_none());
        assert_eq!(registry.require(guild).unwrap_err(), SessionError::NoActiveSession);
        assert_eq!(registry.active_count(), 0);

        registry.get_or_create(guild);
        assert!(registry.require(guild).is_ok());
        assert_eq!(registry.active_count(), 1);
    }

    #[tokio::test]
    async fn test_guilds_are_independent() {
        let registry = registry(Arc::new(LoopbackEngine::new()));
        let first = registry.get_or_create(GuildId::new(1));
        let second = registry.get_or_create(GuildId::new(2));

        let _held = first.lock().await;
        // el lock de un guild no bloquea a otro
        assert!(second.try_lock().is_some());
    }

    #[tokio::test]
    async fn test_remove_disconnects_connected_session() {
        let engine = Arc::new(LoopbackEngine::new());
        let registry = registry(engine.clone());
        let guild = GuildId::new(9);

        let session = registry.get_or_create(guild);
        session
            .lock()
            .await
            .playback()
            .connect(ChannelId::new(77))
            .await
            .unwrap();

        assert!(registry.remove(guild).await.unwrap());
        assert!(!registry.remove(guild).await.unwrap());
        assert_eq!(registry.active_count(), 0);
        assert_eq!(
            engine.calls(),
            vec![
                EngineCall::Connect(guild, ChannelId::new(77)),
                EngineCall::Disconnect(guild),
            ]
        );
    }

    #[tokio::test]
    async fn test_evict_idle_skips_playing_and_247() {
        let registry = registry(Arc::new(LoopbackEngine::new()));
        let idle = GuildId::new(1);
        let playing = GuildId::new(2);
        let always_on = GuildId::new(3);

        registry.get_or_create(idle);
        let session = registry.get_or_create(playing);
        session
            .lock()
            .await
            .playback()
            .play(
                crate::audio::track::Track::new("a", "A", Duration::from_secs(60)),
                UserId::new(1),
            )
            .await
            .unwrap();
        registry
            .get_or_create(always_on)
            .lock()
            .await
            .loop_mode()
            .toggle_247();

        assert_eq!(registry.evict_idle(Duration::ZERO).await, 1);
        assert!(registry.try_get(idle).is_none());
        assert!(registry.try_get(playing).is_some());
        assert!(registry.try_get(always_on).is_some());
        assert_eq!(registry.stats().total_tracks_played, 1);
    }

    #[tokio::test]
    async fn test_evict_idle_keeps_sessions_still_held() {
        let registry = registry(Arc::new(LoopbackEngine::new()));
        let guild = GuildId::new(11);

        // un comando resolvió la sesión pero todavía no tomó el lock
        let held = registry.get_or_create(guild);
        assert_eq!(registry.evict_idle(Duration::ZERO).await, 0);

        held.lock()
            .await
            .playback()
            .play(
                crate::audio::track::Track::new("a", "A", Duration::from_secs(60)),
                UserId::new(1),
            )
            .await
            .unwrap();

        let fresh = registry.get_or_create(guild);
        assert!(Arc::ptr_eq(&held, &fresh));
        assert!(fresh.is_playing());
        assert_eq!(registry.stats().sessions_opened, 1);
    }

    #[tokio::test]
    async fn test_evict_idle_waits_for_last_handle() {
        let registry = registry(Arc::new(LoopbackEngine::new()));
        let guild = GuildId::new(12);

        {
            let held = registry.get_or_create(guild);
            let _guard = held.lock().await;
            assert_eq!(registry.evict_idle(Duration::ZERO).await, 0);
        }
        assert!(registry.try_get(guild).is_some());

        assert_eq!(registry.evict_idle(Duration::ZERO).await, 1);
        assert!(registry.try_get(guild).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_stops_on_cancel() {
        let registry = Arc::new(registry(Arc::new(LoopbackEngine::new())));
        registry.get_or_create(GuildId::new(1));

        let token = CancellationToken::new();
        let handle = registry
            .clone()
            .spawn_sweeper(Duration::ZERO, Duration::from_secs(60), token.clone());

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(registry.active_count(), 0);

        token.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_removes_everything() {
        let registry = registry(Arc::new(LoopbackEngine::new()));
        for id in 1..=3 {
            registry.get_or_create(GuildId::new(id));
        }
        assert_eq!(registry.shutdown().await, 3);
        assert_eq!(registry.active_count(), 0);
        assert_eq!(registry.stats().sessions_closed, 3);
    }
}
