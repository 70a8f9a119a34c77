//! Traits abstraits pour les périphériques audio
//!
//! Ce module définit la frontière entre la logique de l'assistant et le
//! matériel audio réel. La configuration physique des périphériques est
//! hors du périmètre de ce projet : le moteur ne voit que ces deux traits,
//! ce qui permet de brancher aussi bien un vrai pilote que les doubles
//! en mémoire du module [`mock`](crate::mock).

use async_trait::async_trait;

use crate::AudioResult;

/// Source de capture audio (côté microphone)
///
/// Une source fournit des chunks PCM i16 little-endian à la fréquence de
/// capture. La lecture est cadencée par la source elle-même : un appel à
/// `read_chunk` bloque environ la durée d'un chunk (40ms par défaut),
/// comme un vrai périphérique piloté par DMA.
#[async_trait]
pub trait CaptureSource: Send + Sync {
    /// Démarre le flux de capture
    ///
    /// # Erreurs
    /// - `AudioError::DeviceError` si le périphérique refuse de démarrer
    async fn start(&mut self) -> AudioResult<()>;

    /// Lit un chunk complet dans le buffer fourni
    ///
    /// Le buffer appartient à l'appelant et est réutilisé d'un appel à
    /// l'autre : il est vidé puis rempli, sans réallocation en régime
    /// permanent.
    ///
    /// # Returns
    /// Nombre de bytes écrits dans le buffer
    ///
    /// # Erreurs
    /// - `AudioError::DeviceTimeout` si aucune donnée n'arrive à temps
    /// - `AudioError::DeviceError` pour toute autre panne matérielle
    async fn read_chunk(&mut self, buf: &mut Vec<u8>) -> AudioResult<usize>;

    /// Arrête le flux de capture
    async fn stop(&mut self) -> AudioResult<()>;

    /// Nom du périphérique pour les logs
    fn description(&self) -> String;
}

/// Sortie audio (côté haut-parleur)
///
/// Le lecteur écrit des blocs PCM i16 little-endian à la fréquence de
/// sortie. Entre deux réponses de l'assistant, la sortie est désactivée
/// pour couper le souffle du périphérique.
#[async_trait]
pub trait OutputSink: Send {
    /// Active la sortie audio (équivalent d'activer le canal TX)
    async fn enable(&mut self) -> AudioResult<()>;

    /// Écrit un bloc PCM vers le périphérique
    ///
    /// # Returns
    /// Nombre de bytes acceptés par le périphérique
    async fn write(&mut self, pcm: &[u8]) -> AudioResult<usize>;

    /// Désactive la sortie audio
    async fn disable(&mut self) -> AudioResult<()>;

    /// Nom du périphérique pour les logs
    fn description(&self) -> String;
}
