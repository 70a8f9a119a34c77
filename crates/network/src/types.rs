//! Types et configuration du système réseau
//!
//! Ce module définit la configuration du transport UDP et les compteurs
//! observables pendant une conversation.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tokio::time::Duration;

/// Taille maximale d'un datagramme accepté en réception, en bytes
///
/// Largement au-dessus de la plus grosse trame audio du protocole
/// (5 bytes d'en-tête + 1440 de PCM).
pub const MAX_DATAGRAM_BYTES: usize = 2048;

/// Configuration du transport réseau
///
/// `#[derive(Serialize, Deserialize)]` : Permet de sauvegarder/charger depuis un fichier
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Port UDP local d'écoute
    pub local_port: u16,

    /// Adresse du pont conversationnel, si connue d'avance
    ///
    /// Facultative : l'adresse du pair est de toute façon apprise sur le
    /// premier datagramme entrant et remplace celle-ci
    pub server_addr: Option<SocketAddr>,

    /// Délai maximal d'attente d'un datagramme, en millisecondes
    ///
    /// La boucle de réception se réveille à cette cadence pour vérifier
    /// son drapeau d'arrêt
    pub recv_timeout_ms: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            local_port: 3333,     // Port historique du client
            server_addr: None,    // Pair appris dynamiquement
            recv_timeout_ms: 500,
        }
    }
}

impl NetworkConfig {
    /// Délai de réception sous forme de Duration
    pub fn recv_timeout(&self) -> Duration {
        Duration::from_millis(self.recv_timeout_ms)
    }

    /// Valide que la configuration est cohérente
    pub fn validate(&self) -> Result<(), String> {
        if self.recv_timeout_ms == 0 {
            return Err("Le timeout de réception doit être strictement positif".to_string());
        }
        if self.recv_timeout_ms > 10_000 {
            return Err(format!(
                "Timeout de réception déraisonnable: {}ms (max 10000)",
                self.recv_timeout_ms
            ));
        }
        Ok(())
    }

    /// Crée une configuration adaptée aux tests
    ///
    /// Port 0 (attribué par l'OS) et timeout court
    pub fn test_config() -> Self {
        Self {
            local_port: 0,
            server_addr: None,
            recv_timeout_ms: 100,
        }
    }
}

/// Compteurs du transport
///
/// Snapshot immuable retourné par `Transport::stats()`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportStats {
    /// Datagrammes envoyés vers le pair
    pub packets_sent: u64,

    /// Datagrammes reçus du pair
    pub packets_received: u64,
}
