use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serenity::model::id::UserId;
use std::time::Duration;
use url::Url;

/// Track resuelto por el motor de audio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub identifier: String,
    pub title: String,
    pub author: String,
    pub uri: Option<String>,
    pub artwork_url: Option<String>,
    pub duration: Duration,
    pub is_stream: bool,
    pub source_name: String,
}

impl Track {
    pub fn new(identifier: impl Into<String>, title: impl Into<String>, duration: Duration) -> Self {
        Self {
            identifier: identifier.into(),
            title: title.into(),
            author: String::new(),
            uri: None,
            artwork_url: None,
            duration,
            is_stream: false,
            source_name: "unknown".to_string(),
        }
    }

    // Setters
    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    pub fn with_artwork(mut self, artwork_url: impl Into<String>) -> Self {
        self.artwork_url = Some(artwork_url.into());
        self
    }
}

/// Elemento de la cola. La posición nunca se guarda: se deriva del índice.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueueItem {
    pub track: Track,
    pub requested_by: UserId,
    pub added_at: DateTime<Utc>,
}

impl QueueItem {
    pub fn new(track: Track, requested_by: UserId) -> Self {
        Self {
            track,
            requested_by,
            added_at: Utc::now(),
        }
    }

    pub fn title(&self) -> &str {
        &self.track.title
    }
}

/// Pista de búsqueda que acompaña a `load_tracks`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SearchMode {
    None,
    YouTube,
    SoundCloud,
    Spotify,
}

impl SearchMode {
    /// Deriva la pista a partir de la consulta del usuario.
    ///
    /// Enlaces de SoundCloud y Spotify usan su fuente, texto libre se busca en
    /// YouTube y cualquier otra URL absoluta se pasa tal cual.
    pub fn for_query(query: &str) -> Self {
        if query.contains("soundcloud.com") {
            SearchMode::SoundCloud
        } else if query.contains("spotify.com") {
            SearchMode::Spotify
        } else {
            Self::youtube_or_direct(query)
        }
    }

    /// Sólo YouTube o nada (play-top y play-skip no distinguen fuentes).
    pub fn youtube_or_direct(query: &str) -> Self {
        if is_absolute_url(query) {
            SearchMode::None
        } else {
            SearchMode::YouTube
        }
    }
}

// "artista: canción" también parsea como URL; se exige http(s) con host
fn is_absolute_url(query: &str) -> bool {
    let query = query.trim();
    if query.is_empty() || query.chars().any(char::is_whitespace) {
        return false;
    }
    match Url::parse(query) {
        Ok(url) => matches!(url.scheme(), "http" | "https") && url.host_str().is_some(),
        Err(_) => false,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoadType {
    Track,
    Playlist { name: String },
    Search,
    Empty,
}

/// Resultado de `load_tracks`.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackLoadResult {
    pub load_type: LoadType,
    pub tracks: Vec<Track>,
}

impl TrackLoadResult {
    pub fn empty() -> Self {
        Self {
            load_type: LoadType::Empty,
            tracks: Vec::new(),
        }
    }

    pub fn single(track: Track) -> Self {
        Self {
            load_type: LoadType::Track,
            tracks: vec![track],
        }
    }

    pub fn playlist(name: impl Into<String>, tracks: Vec<Track>) -> Self {
        Self {
            load_type: LoadType::Playlist { name: name.into() },
            tracks,
        }
    }

    pub fn playlist_name(&self) -> Option<&str> {
        match &self.load_type {
            LoadType::Playlist { name } => Some(name),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}
