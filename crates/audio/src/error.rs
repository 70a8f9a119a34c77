//! Gestion d'erreurs pour le système audio
//!
//! Ce module définit tous les types d'erreurs possibles dans la chaîne audio :
//! file de lecture, périphériques de capture/sortie et configuration.

use thiserror::Error;

/// Énumération de toutes les erreurs possibles dans le système audio
///
/// `thiserror::Error` génère automatiquement l'implémentation du trait Error
/// avec des messages d'erreur descriptifs en français.
#[derive(Error, Debug)]
pub enum AudioError {
    /// File de lecture pleine, le chunk entrant est abandonné
    #[error("File de lecture pleine ({capacity} chunks), chunk abandonné")]
    BufferOverflow { capacity: usize },

    /// Chunk audio sans aucune donnée PCM
    #[error("Chunk audio vide (séquence {sequence})")]
    EmptyChunk { sequence: u32 },

    /// Opération tentée alors que le composant n'est pas démarré
    #[error("Opération {operation} invalide: composant audio inactif")]
    Inactive { operation: String },

    /// Erreur remontée par le périphérique de capture ou de sortie
    #[error("Erreur périphérique audio: {0}")]
    DeviceError(String),

    /// Le périphérique n'a pas fourni de données dans le délai imparti
    #[error("Timeout périphérique audio après {timeout_ms}ms")]
    DeviceTimeout { timeout_ms: u64 },

    /// Erreur de configuration audio
    #[error("Configuration audio invalide: {0}")]
    ConfigError(String),
}

/// Type Result personnalisé pour notre crate audio
///
/// Au lieu d'écrire Result<T, AudioError> partout, on peut écrire AudioResult<T>
pub type AudioResult<T> = Result<T, AudioError>;

/// Fonctions utilitaires pour créer des erreurs communes
impl AudioError {
    /// Crée une erreur de périphérique avec contexte
    pub fn device(message: impl Into<String>) -> Self {
        Self::DeviceError(message.into())
    }

    /// Crée une erreur d'opération sur composant inactif
    pub fn inactive(operation: impl Into<String>) -> Self {
        Self::Inactive {
            operation: operation.into(),
        }
    }

    /// Vérifie si l'erreur est récupérable (worth retrying)
    pub fn is_recoverable(&self) -> bool {
        match self {
            AudioError::BufferOverflow { .. } => true,
            AudioError::EmptyChunk { .. } => true,
            AudioError::DeviceTimeout { .. } => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = AudioError::BufferOverflow { capacity: 3500 };
        assert!(error.to_string().contains("3500"));

        let error = AudioError::EmptyChunk { sequence: 42 };
        assert!(error.to_string().contains("42"));
    }

    #[test]
    fn test_error_recoverable() {
        assert!(AudioError::BufferOverflow { capacity: 10 }.is_recoverable());
        assert!(AudioError::DeviceTimeout { timeout_ms: 500 }.is_recoverable());
        assert!(!AudioError::ConfigError("test".to_string()).is_recoverable());
        assert!(!AudioError::inactive("enqueue").is_recoverable());
    }

    #[test]
    fn test_helper_functions() {
        let error = AudioError::device("périphérique débranché");
        match error {
            AudioError::DeviceError(msg) => assert!(msg.contains("débranché")),
            _ => panic!("Wrong error type"),
        }
    }
}
