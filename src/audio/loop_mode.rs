use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    audio::{queue::QueueItem, session::GuildSession, track::Track},
    error::SessionResult,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LoopMode {
    #[default]
    None,
    Track,
    Queue,
}

/// Qué hizo la sesión al terminar un track.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackEndAction {
    Replayed(QueueItem),
    Advanced(QueueItem),
    Idle,
    /// El evento no corresponde al track actual
    Ignored,
}

/// Modo de repetición, modo 24/7 y el hook de fin de track.
pub struct LoopModeManager<'a> {
    session: &'a GuildSession,
}

impl<'a> LoopModeManager<'a> {
    pub(crate) fn new(session: &'a GuildSession) -> Self {
        Self { session }
    }

    pub fn current(&self) -> LoopMode {
        self.session.read(|state| state.loop_mode)
    }

    /// Cambia el modo manualmente; devuelve el anterior.
    pub fn set_loop_mode(&self, mode: LoopMode) -> LoopMode {
        let previous = self
            .session
            .write(|state| std::mem::replace(&mut state.loop_mode, mode));
        match mode {
            LoopMode::None => info!("➡️ Repetición desactivada"),
            LoopMode::Track => info!("🔂 Repetir canción activado"),
            LoopMode::Queue => info!("🔁 Repetir cola activado"),
        }
        previous
    }

    pub fn toggle_247(&self) -> bool {
        let enabled = self.session.write(|state| {
            state.is_247 = !state.is_247;
            state.is_247
        });
        if enabled {
            info!("🌙 Modo 24/7 activado en guild {}", self.session.guild_id());
        } else {
            info!("☀️ Modo 24/7 desactivado en guild {}", self.session.guild_id());
        }
        enabled
    }

    /// Hook que el adaptador del motor invoca una vez por cada fin natural de
    /// un track (nunca en skip o stop).
    ///
    /// - `None`: pasa al siguiente de la cola o queda inactivo.
    /// - `Track`: vuelve a reproducir el mismo track.
    /// - `Queue`: re-encola el track terminado al final y avanza.
    pub async fn on_track_ended(&self, finished: &Track) -> SessionResult<TrackEndAction> {
        let (current, mode, next) = self.session.read(|state| {
            (
                state.current.clone(),
                state.loop_mode,
                state.queue.front().cloned(),
            )
        });

        let Some(current) = current else {
            debug!("Fin de track sin track actual, ignorado");
            return Ok(TrackEndAction::Ignored);
        };
        if current.track.identifier != finished.identifier {
            debug!("Fin de track obsoleto ({}), ignorado", finished.identifier);
            return Ok(TrackEndAction::Ignored);
        }

        let guild_id = self.session.guild_id();
        match mode {
            LoopMode::Track => {
                self.session
                    .call_engine(self.session.engine().play(guild_id, &current.track))
                    .await?;
                self.session.write(|state| {
                    state.paused = false;
                    state.position = std::time::Duration::ZERO;
                });
                info!("🔂 Repitiendo track: {}", current.title());
                Ok(TrackEndAction::Replayed(current))
            }
            LoopMode::Queue => {
                // Con la cola vacía el siguiente es el mismo track re-encolado
                let next = next.unwrap_or_else(|| current.clone());
                self.session
                    .call_engine(self.session.engine().play(guild_id, &next.track))
                    .await?;
                self.session.write(|state| {
                    state.queue.requeue(current.clone());
                    state.queue.pop_front();
                    state.reset_playback();
                    state.current = Some(next.clone());
                });
                info!("🔁 '{}' re-encolado, siguiente: {}", current.title(), next.title());
                Ok(TrackEndAction::Advanced(next))
            }
            LoopMode::None => match next {
                Some(next) => {
                    self.session
                        .call_engine(self.session.engine().play(guild_id, &next.track))
                        .await?;
                    self.session.write(|state| {
                        state.queue.pop_front();
                        state.reset_playback();
                        state.current = Some(next.clone());
                    });
                    info!("➡️ Siguiente en cola: {}", next.title());
                    Ok(TrackEndAction::Advanced(next))
                }
                None => {
                    self.session.write(|state| state.reset_playback());
                    info!("📭 Cola vacía, sin siguiente track en guild {}", guild_id);
                    Ok(TrackEndAction::Idle)
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{
        engine::{EngineCall, LoopbackEngine},
        session::{
            tests::{item, session_with},
            SessionSettings,
        },
    };
    use pretty_assertions::assert_eq;
    use serenity::model::id::UserId;
    use std::sync::Arc;

    fn queue_ids(session: &GuildSession) -> Vec<String> {
        session
            .snapshot()
            .queue
            .iter()
            .map(|i| i.track.identifier.clone())
            .collect()
    }

    fn current_id(session: &GuildSession) -> Option<String> {
        session.now_playing().map(|i| i.track.identifier)
    }

    #[test]
    fn test_default_mode() {
        assert_eq!(LoopMode::default(), LoopMode::None);
    }

    #[tokio::test]
    async fn test_track_end_without_loop_advances_then_idles() {
        let session = session_with(Arc::new(LoopbackEngine::new()), SessionSettings::default());
        let guard = session.lock().await;
        let a = guard.playback().play(item("a").track, UserId::new(1)).await.unwrap();
        guard.queue().append(item("b")).unwrap();

        let action = guard.loop_mode().on_track_ended(&a.track).await.unwrap();
        assert!(matches!(action, TrackEndAction::Advanced(ref i) if i.track.identifier == "b"));
        assert_eq!(current_id(&session), Some("b".to_string()));

        let b = item("b").track;
        assert_eq!(guard.loop_mode().on_track_ended(&b).await.unwrap(), TrackEndAction::Idle);
        assert_eq!(current_id(&session), None);
        assert_eq!(
            guard.loop_mode().on_track_ended(&b).await.unwrap(),
            TrackEndAction::Ignored
        );
    }

    #[tokio::test]
    async fn test_track_loop_replays() {
        let engine = Arc::new(LoopbackEngine::new());
        let session = session_with(engine.clone(), SessionSettings::default());
        let guard = session.lock().await;
        let a = guard.playback().play(item("a").track, UserId::new(1)).await.unwrap();
        guard.queue().append(item("b")).unwrap();
        assert_eq!(guard.loop_mode().set_loop_mode(LoopMode::Track), LoopMode::None);

        let action = guard.loop_mode().on_track_ended(&a.track).await.unwrap();
        assert!(matches!(action, TrackEndAction::Replayed(_)));
        assert_eq!(current_id(&session), Some("a".to_string()));
        assert_eq!(queue_ids(&session), vec!["b"]);

        let guild = session.guild_id();
        assert_eq!(
            engine.calls(),
            vec![EngineCall::Play(guild, "a".into()), EngineCall::Play(guild, "a".into())]
        );
    }

    #[tokio::test]
    async fn test_queue_loop_requeues_finished_track() {
        let session = session_with(Arc::new(LoopbackEngine::new()), SessionSettings::default());
        let guard = session.lock().await;
        let a = guard.playback().play(item("a").track, UserId::new(1)).await.unwrap();
        guard.queue().append(item("b")).unwrap();
        guard.queue().append(item("c")).unwrap();
        guard.loop_mode().set_loop_mode(LoopMode::Queue);

        guard.loop_mode().on_track_ended(&a.track).await.unwrap();
        assert_eq!(current_id(&session), Some("b".to_string()));
        assert_eq!(queue_ids(&session), vec!["c", "a"]);

        // con la cola vacía el mismo track vuelve a sonar
        guard.queue().clear();
        guard.loop_mode().on_track_ended(&item("b").track).await.unwrap();
        assert_eq!(current_id(&session), Some("b".to_string()));
        assert!(queue_ids(&session).is_empty());
    }

    #[tokio::test]
    async fn test_stale_end_event_is_ignored() {
        let engine = Arc::new(LoopbackEngine::new());
        let session = session_with(engine.clone(), SessionSettings::default());
        let guard = session.lock().await;
        guard.playback().play(item("a").track, UserId::new(1)).await.unwrap();

        let action = guard.loop_mode().on_track_ended(&item("old").track).await.unwrap();
        assert_eq!(action, TrackEndAction::Ignored);
        assert_eq!(engine.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_toggle_247() {
        let session = session_with(Arc::new(LoopbackEngine::new()), SessionSettings::default());
        let guard = session.lock().await;
        assert!(guard.loop_mode().toggle_247());
        assert!(guard.session().snapshot().is_247);
        assert!(!guard.loop_mode().toggle_247());
    }
}
