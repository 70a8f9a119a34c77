//! Boucle de réception réseau
//!
//! Attend les datagrammes du pont, les décode et les distribue :
//! les chunks audio partent dans la file de lecture (sans jamais bloquer),
//! les messages d'état deviennent des demandes de transition. Les trames
//! invalides sont comptées d'un log et abandonnées, la boucle ne s'arrête
//! que sur levée du drapeau.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use audio::PlaybackQueue;
use network::{Downlink, MAX_DATAGRAM_BYTES, NetworkError, SessionLossTracker, Transport};

use crate::VoiceState;

/// Boucle de réception, consommée par son task
pub struct ReceiveLoop {
    transport: Arc<dyn Transport>,
    queue: Arc<PlaybackQueue>,
    requests: mpsc::UnboundedSender<VoiceState>,
    active: Arc<AtomicBool>,

    /// Total de chunks perdus, cumulé sur toutes les sessions
    lost_total: Arc<AtomicU32>,
}

impl ReceiveLoop {
    pub fn new(
        transport: Arc<dyn Transport>,
        queue: Arc<PlaybackQueue>,
        requests: mpsc::UnboundedSender<VoiceState>,
        active: Arc<AtomicBool>,
        lost_total: Arc<AtomicU32>,
    ) -> Self {
        Self {
            transport,
            queue,
            requests,
            active,
            lost_total,
        }
    }

    /// Corps de la boucle, tourne jusqu'à la levée du drapeau d'arrêt
    pub async fn run(self) {
        info!("📡 Boucle de réception démarrée");

        // Buffer de datagramme réutilisé sur toute la durée de la boucle
        let mut buf = vec![0u8; MAX_DATAGRAM_BYTES];
        let mut tracker = SessionLossTracker::new();

        while self.active.load(Ordering::SeqCst) {
            let len = match self.transport.recv(&mut buf).await {
                Ok((len, _from)) => len,
                Err(NetworkError::Timeout) => continue,
                Err(e) => {
                    warn!("⚠️ Réception échouée: {}", e);
                    continue;
                }
            };

            match Downlink::decode(&buf[..len]) {
                Ok(Downlink::Audio(chunk)) => {
                    if let Some(gap) = tracker.observe(chunk.sequence) {
                        self.lost_total.fetch_add(gap, Ordering::Relaxed);
                    }

                    let sequence = chunk.sequence;
                    let is_final = chunk.is_final;
                    if is_final {
                        info!(
                            "📥 Dernier chunk #{} reçu ({} bytes, pertes session: {})",
                            sequence,
                            chunk.len(),
                            tracker.lost_count()
                        );
                    }

                    // Le chunk est déplacé dans la file ; si elle est
                    // pleine il est abandonné, la réception continue
                    if let Err(e) = self.queue.enqueue(chunk).await {
                        warn!("⚠️ Chunk #{} abandonné: {}", sequence, e);
                    }

                    if is_final {
                        tracker.reset();
                    }
                }
                Ok(Downlink::StateIdle) => {
                    info!("📡 Reçu: STATE_IDLE");
                    let _ = self.requests.send(VoiceState::Idle);
                }
                Ok(Downlink::StateAiSpeaking) => {
                    info!("📡 Reçu: STATE_AI_SPEAKING");
                    let _ = self.requests.send(VoiceState::AiSpeaking);
                }
                Err(NetworkError::UnknownMessageType { tag }) => {
                    debug!("Type de message inconnu: 0x{:02x}", tag);
                }
                Err(e) => {
                    warn!("⚠️ Datagramme invalide abandonné: {}", e);
                }
            }
        }

        debug!("📡 Boucle de réception arrêtée");
    }
}
