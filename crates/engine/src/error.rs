//! Gestion d'erreurs du moteur de conversation

use thiserror::Error;

use audio::AudioError;
use network::NetworkError;

/// Erreurs du moteur de conversation
///
/// Le moteur agrège les erreurs des crates audio et network ; seules
/// les erreurs d'initialisation et d'arrêt lui sont propres.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Erreur remontée par la chaîne audio
    #[error("Erreur audio: {0}")]
    Audio(#[from] AudioError),

    /// Erreur remontée par le réseau
    #[error("Erreur réseau: {0}")]
    Network(#[from] NetworkError),

    /// Erreur de configuration du moteur
    #[error("Configuration moteur invalide: {0}")]
    ConfigError(String),

    /// Une tâche du moteur ne s'est pas arrêtée dans le délai imparti
    #[error("Arrêt du moteur incomplet: une tâche a dû être abandonnée")]
    ShutdownTimeout,
}

/// Type Result personnalisé pour notre crate engine
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversions() {
        let audio_err: EngineError = AudioError::BufferOverflow { capacity: 10 }.into();
        assert!(audio_err.to_string().contains("audio"));

        let network_err: EngineError = NetworkError::Timeout.into();
        assert!(network_err.to_string().contains("réseau"));
    }
}
