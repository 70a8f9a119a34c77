//! Gestion d'erreurs pour le système réseau
//!
//! Ce module définit tous les types d'erreurs possibles dans le transport
//! UDP et le codec du protocole. Il suit les mêmes patterns que le module
//! audio pour la cohérence du code.

use thiserror::Error;

/// Énumération de toutes les erreurs possibles dans le système réseau
///
/// `thiserror::Error` génère automatiquement l'implémentation du trait Error
/// avec des messages d'erreur descriptifs en français.
#[derive(Error, Debug)]
pub enum NetworkError {
    /// Impossible de créer ou bind le socket UDP sur le port demandé
    ///
    /// C'est la seule erreur fatale du crate : sans socket, rien ne marche
    #[error("Impossible de bind le socket sur le port {port}: {reason}")]
    BindError { port: u16, reason: String },

    /// Aucun datagramme reçu dans le délai imparti
    ///
    /// Comportement normal entre deux échanges, la boucle de réception
    /// s'en sert pour vérifier son drapeau d'arrêt
    #[error("Timeout - aucun datagramme reçu dans le délai imparti")]
    Timeout,

    /// Envoi impossible : aucun pair appris ni configuré
    #[error("Aucune adresse de pair connue pour l'envoi")]
    NoPeer,

    /// Datagramme audio trop court pour contenir son en-tête
    #[error("Datagramme malformé: {length} bytes (minimum 5 pour une trame audio)")]
    MalformedFrame { length: usize },

    /// Trame audio reçue sans aucune donnée PCM
    #[error("Trame audio vide reçue (séquence {sequence})")]
    EmptyPayload { sequence: u32 },

    /// Tag de message inconnu du protocole
    #[error("Type de message inconnu: 0x{tag:02x}")]
    UnknownMessageType { tag: u8 },

    /// Erreur générale d'entrée/sortie réseau
    #[error("Erreur IO réseau: {0}")]
    IoError(#[from] std::io::Error),

    /// Adresse IP ou port invalide fourni par l'utilisateur
    #[error("Adresse invalide: {addr}")]
    InvalidAddress { addr: String },

    /// Erreur de configuration réseau
    #[error("Configuration réseau invalide: {0}")]
    ConfigError(String),
}

/// Conversion automatique des erreurs de parsing d'adresses
impl From<std::net::AddrParseError> for NetworkError {
    fn from(err: std::net::AddrParseError) -> Self {
        NetworkError::InvalidAddress {
            addr: format!("Erreur de parsing: {}", err),
        }
    }
}

/// Type Result personnalisé pour notre crate network
///
/// Au lieu d'écrire Result<T, NetworkError> partout, on peut écrire NetworkResult<T>
pub type NetworkResult<T> = Result<T, NetworkError>;

/// Fonctions utilitaires pour créer des erreurs communes
impl NetworkError {
    /// Crée une erreur de bind avec contexte
    pub fn bind_failed(port: u16, cause: std::io::Error) -> Self {
        Self::BindError {
            port,
            reason: cause.to_string(),
        }
    }

    /// Crée une erreur de trame malformée
    pub fn malformed(length: usize) -> Self {
        Self::MalformedFrame { length }
    }

    /// Vérifie si l'erreur est récupérable (la boucle de réception
    /// abandonne le datagramme et continue)
    pub fn is_recoverable(&self) -> bool {
        match self {
            NetworkError::Timeout => true,
            NetworkError::MalformedFrame { .. } => true,
            NetworkError::EmptyPayload { .. } => true,
            NetworkError::UnknownMessageType { .. } => true,
            _ => false,
        }
    }
}
