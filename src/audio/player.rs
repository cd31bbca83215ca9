use serenity::model::id::{ChannelId, UserId};
use std::time::Duration;
use tracing::{info, warn};

use crate::{
    audio::{
        queue::QueueItem,
        session::GuildSession,
        track::{SearchMode, Track},
    },
    error::{SessionError, SessionResult},
};

pub const MAX_VOLUME: u16 = 150;

/// Dónde colocar el resultado de `play_query` si ya hay algo sonando.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Al final de la cola
    Tail,
    /// Al inicio de la cola
    Top,
    /// Reemplaza lo que suena
    Now,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlayOutcome {
    Started(QueueItem),
    Queued { item: QueueItem, position: usize },
    Playlist {
        name: String,
        started: Option<QueueItem>,
        added: usize,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum SkipOutcome {
    /// `next` es `None` cuando la cola estaba vacía y la reproducción se detuvo
    Skipped { next: Option<QueueItem> },
    NothingToSkip,
}

/// Control de reproducción bajo el lock de la sesión.
///
/// El estado sólo se modifica después de que el motor confirma la operación.
pub struct PlaybackController<'a> {
    session: &'a GuildSession,
}

impl<'a> PlaybackController<'a> {
    pub(crate) fn new(session: &'a GuildSession) -> Self {
        Self { session }
    }

    /// Reproduce un track inmediatamente. La cola no cambia.
    pub async fn play(&self, track: Track, requester: UserId) -> SessionResult<QueueItem> {
        let guild_id = self.session.guild_id();
        self.session
            .call_engine(self.session.engine().play(guild_id, &track))
            .await?;

        let item = QueueItem::new(track, requester);
        self.session.write(|state| {
            state.reset_playback();
            state.current = Some(item.clone());
            state.last_requester = Some(requester);
        });
        let total = self.session.stats().record_track_played();

        info!("🎵 Reproduciendo: {} (guild {}, #{} global)", item.title(), guild_id, total);
        Ok(item)
    }

    /// Busca `query` en el motor y reproduce o encola según el estado.
    pub async fn play_query(
        &self,
        query: &str,
        requester: UserId,
        placement: Placement,
    ) -> SessionResult<PlayOutcome> {
        // play-top y play-skip sólo distinguen YouTube o enlace directo
        let mode = match placement {
            Placement::Tail => SearchMode::for_query(query),
            Placement::Top | Placement::Now => SearchMode::youtube_or_direct(query),
        };
        let result = self
            .session
            .call_engine(self.session.engine().load_tracks(query, mode))
            .await?;

        if result.is_empty() {
            info!("🔍 Sin resultados para: {}", query);
            return Err(SessionError::SearchNoResults);
        }

        let playlist_name = result.playlist_name().map(str::to_string);
        let mut tracks = result.tracks.into_iter();
        let Some(first) = tracks.next() else {
            return Err(SessionError::SearchNoResults);
        };

        let idle = !self.session.is_playing();

        if let Some(name) = playlist_name {
            let started = if idle || placement == Placement::Now {
                Some(self.play(first, requester).await?)
            } else {
                let first = QueueItem::new(first, requester);
                self.session.write(|state| match placement {
                    Placement::Top => state.queue.push_front(first),
                    _ => state.queue.push_back(first).map(|_| ()),
                })?;
                None
            };
            let pending: Vec<QueueItem> = tracks.map(|track| QueueItem::new(track, requester)).collect();

            let wanted = pending.len();
            let rest = self.session.write(|state| state.queue.extend_available(pending));
            if rest < wanted {
                warn!("🚫 Cola llena: {} de {} canciones de la playlist no se agregaron", wanted - rest, wanted);
            }
            let added = rest + usize::from(started.is_none());
            info!("📃 Playlist '{}' agregada: {} canciones", name, added);
            return Ok(PlayOutcome::Playlist { name, started, added });
        }

        if idle || placement == Placement::Now {
            return Ok(PlayOutcome::Started(self.play(first, requester).await?));
        }

        let item = QueueItem::new(first, requester);
        let position = match placement {
            Placement::Top => {
                self.session.write(|state| state.queue.push_front(item.clone()))?;
                1
            }
            _ => self.session.write(|state| state.queue.push_back(item.clone()))?,
        };
        info!("➕ '{}' en cola en la posición #{}", item.title(), position);
        Ok(PlayOutcome::Queued { item, position })
    }

    pub async fn pause(&self) -> SessionResult<()> {
        let (playing, paused) = self.session.read(|state| (state.current.is_some(), state.paused));
        if !playing {
            return Err(SessionError::NoCurrentTrack);
        }
        if paused {
            return Err(SessionError::AlreadyInState);
        }

        let guild_id = self.session.guild_id();
        self.session
            .call_engine(self.session.engine().pause(guild_id))
            .await?;
        self.session.write(|state| state.paused = true);
        info!("⏸️ Reproducción pausada en guild {}", guild_id);
        Ok(())
    }

    pub async fn resume(&self) -> SessionResult<()> {
        let (playing, paused) = self.session.read(|state| (state.current.is_some(), state.paused));
        if !playing {
            return Err(SessionError::NoCurrentTrack);
        }
        if !paused {
            return Err(SessionError::AlreadyInState);
        }

        let guild_id = self.session.guild_id();
        self.session
            .call_engine(self.session.engine().resume(guild_id))
            .await?;
        self.session.write(|state| state.paused = false);
        info!("▶️ Reproducción reanudada en guild {}", guild_id);
        Ok(())
    }

    pub async fn seek(&self, position: Duration) -> SessionResult<()> {
        let duration = self
            .session
            .read(|state| state.current.as_ref().map(|item| item.track.duration))
            .ok_or(SessionError::NoCurrentTrack)?;
        if position > duration {
            return Err(SessionError::InvalidPosition);
        }

        let guild_id = self.session.guild_id();
        self.session
            .call_engine(self.session.engine().seek(guild_id, position))
            .await?;
        self.session.write(|state| state.position = position);
        info!("⏩ Posición {:?} en guild {}", position, guild_id);
        Ok(())
    }

    /// Reinicia el track actual desde el principio
    pub async fn replay(&self) -> SessionResult<()> {
        self.seek(Duration::ZERO).await
    }

    /// Acota a [0, 150] antes de aplicar; devuelve el valor aplicado.
    pub async fn set_volume(&self, percent: i32) -> SessionResult<u16> {
        let clamped = percent.clamp(0, i32::from(MAX_VOLUME)) as u16;

        let guild_id = self.session.guild_id();
        self.session
            .call_engine(
                self.session
                    .engine()
                    .set_volume(guild_id, f32::from(clamped) / 100.0),
            )
            .await?;
        self.session.write(|state| state.volume_percent = clamped);
        info!("🔊 Volumen ajustado a {}% en guild {}", clamped, guild_id);
        Ok(clamped)
    }

    /// Pasa al siguiente de la cola, o detiene si la cola está vacía.
    pub async fn skip(&self) -> SessionResult<SkipOutcome> {
        let (playing, next) = self
            .session
            .read(|state| (state.current.is_some(), state.queue.front().cloned()));

        match next {
            Some(next) => {
                self.start_from_queue(next.clone(), 1).await?;
                info!("⏭️ Saltado, ahora: {}", next.title());
                Ok(SkipOutcome::Skipped { next: Some(next) })
            }
            None if playing => {
                self.halt(false).await?;
                info!("⏭️ Saltado, la cola está vacía");
                Ok(SkipOutcome::Skipped { next: None })
            }
            None => Ok(SkipOutcome::NothingToSkip),
        }
    }

    /// Detiene la reproducción y vacía la cola.
    pub async fn stop(&self) -> SessionResult<usize> {
        let cleared = self.halt(true).await?;
        info!("⏹️ Reproducción detenida, {} canciones removidas", cleared);
        Ok(cleared)
    }

    pub async fn connect(&self, channel_id: ChannelId) -> SessionResult<()> {
        let guild_id = self.session.guild_id();
        self.session
            .call_engine(self.session.engine().connect(guild_id, channel_id))
            .await?;
        self.session.write(|state| state.voice_channel = Some(channel_id));
        info!("🔗 Conectado al canal {} en guild {}", channel_id, guild_id);
        Ok(())
    }

    /// Sale del canal de voz. Se pierden el track actual y la cola; los
    /// ajustes (volumen, loop, filtros, 24/7) se conservan.
    pub async fn disconnect(&self) -> SessionResult<()> {
        let guild_id = self.session.guild_id();
        self.session
            .call_engine(self.session.engine().disconnect(guild_id))
            .await?;
        self.session.write(|state| {
            state.reset_playback();
            state.queue.clear();
            state.voice_channel = None;
        });
        info!("👋 Desconectado del guild {}", guild_id);
        Ok(())
    }

    /// Reproduce `item`, que ocupa `position` en la cola, y descarta todo lo
    /// que hay hasta esa posición inclusive.
    pub(crate) async fn start_from_queue(&self, item: QueueItem, position: usize) -> SessionResult<()> {
        let guild_id = self.session.guild_id();
        self.session
            .call_engine(self.session.engine().play(guild_id, &item.track))
            .await?;
        self.session.write(|state| {
            state.queue.drain_front(position);
            state.reset_playback();
            state.current = Some(item);
        });
        Ok(())
    }

    async fn halt(&self, clear_queue: bool) -> SessionResult<usize> {
        let guild_id = self.session.guild_id();
        self.session
            .call_engine(self.session.engine().stop(guild_id))
            .await?;
        Ok(self.session.write(|state| {
            state.reset_playback();
            if clear_queue {
                state.queue.clear()
            } else {
                0
            }
        }))
    }
}
