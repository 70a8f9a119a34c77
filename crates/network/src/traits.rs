//! Traits abstraits pour le transport réseau
//!
//! La frontière entre le moteur et le réseau réel : le moteur ne voit que
//! ce trait, ce qui permet de brancher le transport UDP en production et
//! le transport simulé dans les tests de bout en bout.

use async_trait::async_trait;
use std::net::SocketAddr;

use crate::{NetworkResult, TransportStats};

/// Transport de datagrammes vers le pont conversationnel
///
/// Toutes les méthodes prennent `&self` : un même transport (derrière un
/// `Arc`) est partagé entre la boucle de réception et la boucle de
/// capture, qui envoient et reçoivent en parallèle.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Envoie un datagramme au pair courant
    ///
    /// Le pair est l'adresse apprise sur le dernier datagramme entrant,
    /// ou à défaut l'adresse configurée.
    ///
    /// # Returns
    /// Nombre de bytes envoyés
    ///
    /// # Erreurs
    /// - `NetworkError::NoPeer` si aucun pair n'est connu
    /// - `NetworkError::IoError` en cas d'échec d'envoi
    async fn send(&self, frame: &[u8]) -> NetworkResult<usize>;

    /// Attend un datagramme dans le buffer fourni
    ///
    /// Le buffer appartient à l'appelant et est réutilisé d'un appel à
    /// l'autre (aucune allocation par datagramme).
    ///
    /// # Returns
    /// Nombre de bytes reçus et adresse source
    ///
    /// # Erreurs
    /// - `NetworkError::Timeout` si rien n'arrive dans le délai configuré
    async fn recv(&self, buf: &mut [u8]) -> NetworkResult<(usize, SocketAddr)>;

    /// Adresse locale d'écoute
    fn local_addr(&self) -> Option<SocketAddr>;

    /// Adresse du pair courant (apprise ou configurée)
    fn peer_addr(&self) -> Option<SocketAddr>;

    /// Snapshot des compteurs de datagrammes
    fn stats(&self) -> TransportStats;
}
