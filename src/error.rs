use thiserror::Error;

/// Errores tipados que devuelve el núcleo de sesiones.
///
/// Los errores de validación (posiciones, estado repetido) se detectan
/// localmente y nunca mutan la sesión. Los errores de transporte vienen del
/// [`AudioEngine`](crate::audio::engine::AudioEngine) y se propagan sin reintentos.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SessionError {
    #[error("no hay un reproductor activo en este servidor")]
    NoActiveSession,

    #[error("no hay nada reproduciéndose")]
    NoCurrentTrack,

    #[error("posición {position} inválida, la cola tiene {len} canciones")]
    InvalidQueuePosition { position: usize, len: usize },

    #[error("se necesitan al menos 2 canciones en la cola")]
    InsufficientItems,

    #[error("la canción ya está en esa posición")]
    SamePosition,

    #[error("el reproductor ya está en ese estado")]
    AlreadyInState,

    #[error("la posición excede la duración de la canción")]
    InvalidPosition,

    #[error("la cola está llena (máximo {max} canciones)")]
    QueueFull { max: usize },

    #[error("motor de audio no disponible: {0}")]
    TransportUnavailable(String),

    #[error("el motor de audio no respondió a tiempo")]
    TransportTimeout,

    #[error("no se encontraron resultados")]
    SearchNoResults,
}

impl SessionError {
    /// Indica si el error proviene del transporte y no de una validación local.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            SessionError::TransportUnavailable(_) | SessionError::TransportTimeout
        )
    }
}

/// Fallo reportado por un adaptador de [`AudioEngine`](crate::audio::engine::AudioEngine).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("sin conexión con el nodo de audio: {0}")]
    Unavailable(String),

    #[error("el nodo rechazó la operación: {0}")]
    Rejected(String),
}

impl From<EngineError> for SessionError {
    fn from(err: EngineError) -> Self {
        SessionError::TransportUnavailable(err.to_string())
    }
}

pub type SessionResult<T> = std::result::Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_errors_surface_as_transport_failures() {
        let err: SessionError = EngineError::Rejected("player destroyed".into()).into();
        assert!(err.is_transport());
        assert_eq!(
            err,
            SessionError::TransportUnavailable(
                "el nodo rechazó la operación: player destroyed".into()
            )
        );
        assert!(!SessionError::SamePosition.is_transport());
    }
}
