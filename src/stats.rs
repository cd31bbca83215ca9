use chrono::{DateTime, Utc};
use serde::Serialize;
use std::{
    sync::atomic::{AtomicU64, AtomicUsize, Ordering},
    time::Duration,
};

/// Contadores globales del proceso, compartidos por todas las sesiones.
#[derive(Debug)]
pub struct ServiceStats {
    started_at: DateTime<Utc>,
    total_tracks_played: AtomicU64,
    sessions_opened: AtomicUsize,
    sessions_closed: AtomicUsize,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub active_sessions: usize,
    pub sessions_opened: usize,
    pub sessions_closed: usize,
    pub total_tracks_played: u64,
    pub uptime: Duration,
}

impl ServiceStats {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            total_tracks_played: AtomicU64::new(0),
            sessions_opened: AtomicUsize::new(0),
            sessions_closed: AtomicUsize::new(0),
        }
    }

    /// Devuelve el total tras el incremento.
    pub fn record_track_played(&self) -> u64 {
        self.total_tracks_played.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn session_opened(&self) {
        self.sessions_opened.fetch_add(1, Ordering::Relaxed);
    }

    pub fn session_closed(&self) {
        self.sessions_closed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn total_tracks_played(&self) -> u64 {
        self.total_tracks_played.load(Ordering::Relaxed)
    }

    pub fn uptime(&self) -> Duration {
        Utc::now()
            .signed_duration_since(self.started_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }

    /// `active_sessions` lo aporta el registro, que es quien conoce el mapa.
    pub fn snapshot(&self, active_sessions: usize) -> StatsSnapshot {
        StatsSnapshot {
            active_sessions,
            sessions_opened: self.sessions_opened.load(Ordering::Relaxed),
            sessions_closed: self.sessions_closed.load(Ordering::Relaxed),
            total_tracks_played: self.total_tracks_played(),
            uptime: self.uptime(),
        }
    }
}

impl Default for ServiceStats {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let stats = ServiceStats::new();
        assert_eq!(stats.record_track_played(), 1);
        assert_eq!(stats.record_track_played(), 2);
        stats.session_opened();
        stats.session_opened();
        stats.session_closed();

        let snapshot = stats.snapshot(1);
        assert_eq!(snapshot.total_tracks_played, 2);
        assert_eq!(snapshot.sessions_opened, 2);
        assert_eq!(snapshot.sessions_closed, 1);
        assert_eq!(snapshot.active_sessions, 1);
    }
}
