use rand::seq::SliceRandom;
use std::{collections::VecDeque, time::Duration};
use tracing::{debug, info, warn};

use crate::{
    audio::{loop_mode::LoopMode, player::PlaybackController, session::GuildSession},
    error::{SessionError, SessionResult},
};

pub use crate::audio::track::QueueItem;

/// Cola de canciones pendientes de un guild.
///
/// Las posiciones externas son 1-based y siempre contiguas: la posición `i`
/// corresponde al índice `i - 1`.
#[derive(Debug)]
pub struct MusicQueue {
    items: VecDeque<QueueItem>,
    max_size: usize,
}

impl MusicQueue {
    pub fn new(max_size: usize) -> Self {
        Self {
            items: VecDeque::new(),
            max_size,
        }
    }

    /// Agrega un track al final y devuelve su posición
    pub fn push_back(&mut self, item: QueueItem) -> SessionResult<usize> {
        self.ensure_capacity()?;
        debug!("➕ Agregado a la cola: {}", item.title());
        self.items.push_back(item);
        Ok(self.items.len())
    }

    /// Agrega al final ignorando el límite (re-encolado del loop de cola)
    pub(crate) fn requeue(&mut self, item: QueueItem) {
        self.items.push_back(item);
    }

    pub fn push_front(&mut self, item: QueueItem) -> SessionResult<()> {
        self.ensure_capacity()?;
        debug!("⏫ Agregado al inicio de la cola: {}", item.title());
        self.items.push_front(item);
        Ok(())
    }

    /// Agrega tantos tracks como quepan (playlists)
    pub fn extend_available(&mut self, items: impl IntoIterator<Item = QueueItem>) -> usize {
        let available_space = self.max_size.saturating_sub(self.items.len());
        let before = self.items.len();
        self.items.extend(items.into_iter().take(available_space));
        self.items.len() - before
    }

    pub fn remove(&mut self, position: usize) -> SessionResult<QueueItem> {
        let index = self.index_of(position)?;
        self.items
            .remove(index)
            .ok_or(SessionError::InvalidQueuePosition {
                position,
                len: self.items.len(),
            })
    }

    /// Mueve un track preservando el orden relativo del resto
    pub fn move_item(&mut self, from: usize, to: usize) -> SessionResult<()> {
        let from_index = self.index_of(from)?;
        let to_index = self.index_of(to)?;
        if from_index == to_index {
            return Err(SessionError::SamePosition);
        }

        let item = self
            .items
            .remove(from_index)
            .ok_or(SessionError::InvalidQueuePosition {
                position: from,
                len: self.items.len(),
            })?;
        self.items.insert(to_index, item);
        Ok(())
    }

    /// Permutación uniforme (Fisher–Yates)
    pub fn shuffle(&mut self) -> SessionResult<()> {
        if self.items.len() < 2 {
            return Err(SessionError::InsufficientItems);
        }
        let mut rng = rand::thread_rng();
        self.items.make_contiguous().shuffle(&mut rng);
        Ok(())
    }

    /// Quita los primeros `count` elementos
    pub fn drain_front(&mut self, count: usize) -> Vec<QueueItem> {
        let count = count.min(self.items.len());
        self.items.drain(..count).collect()
    }

    pub fn pop_front(&mut self) -> Option<QueueItem> {
        self.items.pop_front()
    }

    pub fn front(&self) -> Option<&QueueItem> {
        self.items.front()
    }

    pub fn get(&self, position: usize) -> Option<&QueueItem> {
        position.checked_sub(1).and_then(|index| self.items.get(index))
    }

    pub fn clear(&mut self) -> usize {
        let cleared = self.items.len();
        self.items.clear();
        cleared
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueueItem> {
        self.items.iter()
    }

    pub fn info(&self, current: Option<QueueItem>, loop_mode: LoopMode) -> QueueInfo {
        let queue_duration: Duration = self.items.iter().map(|item| item.track.duration).sum();
        let current_duration = current
            .as_ref()
            .map(|c| c.track.duration)
            .unwrap_or_default();

        QueueInfo {
            current,
            items: self.items.iter().cloned().collect(),
            total_items: self.items.len(),
            loop_mode,
            total_duration: queue_duration + current_duration,
        }
    }

    fn index_of(&self, position: usize) -> SessionResult<usize> {
        if position == 0 || position > self.items.len() {
            return Err(SessionError::InvalidQueuePosition {
                position,
                len: self.items.len(),
            });
        }
        Ok(position - 1)
    }

    fn ensure_capacity(&self) -> SessionResult<()> {
        if self.items.len() >= self.max_size {
            warn!("🚫 La cola está llena (máximo {} canciones)", self.max_size);
            return Err(SessionError::QueueFull { max: self.max_size });
        }
        Ok(())
    }
}

/// Operaciones de cola bajo el lock de la sesión.
pub struct QueueController<'a> {
    session: &'a GuildSession,
}

impl<'a> QueueController<'a> {
    pub(crate) fn new(session: &'a GuildSession) -> Self {
        Self { session }
    }

    /// Devuelve la nueva longitud (posición del track agregado)
    pub fn append(&self, item: QueueItem) -> SessionResult<usize> {
        let title = item.track.title.clone();
        let position = self.session.write(|state| state.queue.push_back(item))?;
        info!("➕ '{}' agregado en la posición #{}", title, position);
        Ok(position)
    }

    pub fn insert_at_top(&self, item: QueueItem) -> SessionResult<()> {
        let title = item.track.title.clone();
        self.session.write(|state| state.queue.push_front(item))?;
        info!("⏫ '{}' agregado al inicio de la cola", title);
        Ok(())
    }

    pub fn remove_at(&self, position: usize) -> SessionResult<QueueItem> {
        let removed = self.session.write(|state| state.queue.remove(position))?;
        info!("🗑️ Eliminado de la posición #{}: {}", position, removed.title());
        Ok(removed)
    }

    pub fn move_item(&self, from: usize, to: usize) -> SessionResult<()> {
        self.session.write(|state| state.queue.move_item(from, to))?;
        info!("↕️ Track movido de #{} a #{}", from, to);
        Ok(())
    }

    pub fn shuffle(&self) -> SessionResult<usize> {
        let len = self.session.write(|state| {
            state.queue.shuffle()?;
            Ok::<_, SessionError>(state.queue.len())
        })?;
        info!("🔀 Cola mezclada ({} canciones)", len);
        Ok(len)
    }

    pub fn clear(&self) -> usize {
        let cleared = self.session.write(|state| state.queue.clear());
        info!("🗑️ Cola limpiada: {} tracks removidos", cleared);
        cleared
    }

    /// Descarta las posiciones `1..position` y reproduce la que estaba en
    /// `position`. La cola sólo cambia si el motor acepta el nuevo track.
    pub async fn skip_to(&self, position: usize) -> SessionResult<QueueItem> {
        let target = self.session.read(|state| {
            state
                .queue
                .get(position)
                .cloned()
                .ok_or(SessionError::InvalidQueuePosition {
                    position,
                    len: state.queue.len(),
                })
        })?;

        PlaybackController::new(self.session)
            .start_from_queue(target.clone(), position)
            .await?;
        info!("⏭️ Saltado a #{}: {}", position, target.title());
        Ok(target)
    }

    pub fn len(&self) -> usize {
        self.session.read(|state| state.queue.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone)]
pub struct QueueInfo {
    pub current: Option<QueueItem>,
    pub items: Vec<QueueItem>,
    pub total_items: usize,
    pub loop_mode: LoopMode,
    pub total_duration: Duration,
}

impl QueueInfo {
    /// Obtiene una página específica de la cola
    pub fn get_page(&self, page: usize, items_per_page: usize) -> QueuePage {
        let items_per_page = items_per_page.max(1);
        let safe_page = page.max(1);
        // la página llega del usuario: nunca desbordar
        let start = (safe_page - 1).saturating_mul(items_per_page);
        let end = start.saturating_add(items_per_page).min(self.items.len());
        let total_pages = if self.total_items == 0 {
            1
        } else {
            self.total_items.div_ceil(items_per_page)
        };

        QueuePage {
            items: if start < self.items.len() {
                self.items[start..end]
                    .iter()
                    .cloned()
                    .enumerate()
                    .map(|(offset, item)| (start + offset + 1, item))
                    .collect()
            } else {
                Vec::new()
            },
            current_page: safe_page,
            total_pages,
            total_items: self.total_items,
        }
    }
}

/// Página de la cola; cada item va con su posición 1-based.
#[derive(Debug, Clone)]
pub struct QueuePage {
    pub items: Vec<(usize, QueueItem)>,
    pub current_page: usize,
    pub total_pages: usize,
    pub total_items: usize,
}
