//! Boucle de capture et d'envoi
//!
//! Cadencée par le périphérique de capture (un chunk ≈ 40ms à 48 kHz),
//! cette boucle sous-échantillonne chaque chunk, mesure son niveau RMS
//! et décide quoi en faire selon l'état vocal courant :
//! - en `Idle`, une voix au-dessus du seuil normal démarre l'envoi ;
//! - en `UserSpeaking`, les chunks partent vers le pont jusqu'à 5s de
//!   silence continu ;
//! - en `AiSpeaking`, seule une voix forte (interruption) est envoyée.
//!
//! Les buffers de travail appartiennent à la boucle et sont réutilisés
//! à chaque itération : aucune allocation par chunk en régime permanent.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, sleep};
use tracing::{debug, error, info, warn};

use audio::{AudioConfig, CaptureSource, dsp};
use network::{Transport, Uplink};

use crate::VoiceState;

/// Boucle de capture, consommée par son task
pub struct CaptureLoop {
    source: Box<dyn CaptureSource>,
    transport: Arc<dyn Transport>,
    state_rx: watch::Receiver<VoiceState>,
    requests: mpsc::UnboundedSender<VoiceState>,
    active: Arc<AtomicBool>,
    config: AudioConfig,
}

impl CaptureLoop {
    pub fn new(
        source: Box<dyn CaptureSource>,
        transport: Arc<dyn Transport>,
        state_rx: watch::Receiver<VoiceState>,
        requests: mpsc::UnboundedSender<VoiceState>,
        active: Arc<AtomicBool>,
        config: AudioConfig,
    ) -> Self {
        Self {
            source,
            transport,
            state_rx,
            requests,
            active,
            config,
        }
    }

    /// Corps de la boucle, tourne jusqu'à la levée du drapeau d'arrêt
    pub async fn run(mut self) {
        if let Err(e) = self.source.start().await {
            error!("❌ Impossible de démarrer la capture: {}", e);
            return;
        }
        info!(
            "🎙️ Capture démarrée sur {} (seuils RMS: normal {}, interruption {}, arrêt {})",
            self.source.description(),
            self.config.rms_threshold_normal,
            self.config.rms_threshold_interrupt,
            self.config.rms_threshold_stop
        );

        // Buffers réutilisés sur toute la durée de vie de la boucle
        let mut raw = Vec::with_capacity(self.config.chunk_size_bytes_capture());
        let mut downsampled = Vec::with_capacity(self.config.chunk_size_bytes_output());
        let mut frame = Vec::with_capacity(self.config.chunk_size_bytes_output() + 4);

        let mut sequence: u32 = 0;
        let mut silence_start: Option<Instant> = None;
        let mut ai_since: Option<Instant> = None;
        let mut previous_state = VoiceState::Idle;

        while self.active.load(Ordering::SeqCst) {
            match self.source.read_chunk(&mut raw).await {
                Ok(0) => continue,
                Ok(_) => {}
                Err(e) => {
                    warn!("⚠️ Lecture capture échouée: {}", e);
                    sleep(self.config.chunk_duration()).await;
                    continue;
                }
            }

            dsp::downsample_half(&raw, &mut downsampled);
            let rms = dsp::rms_energy_bytes(&downsampled);

            let state = *self.state_rx.borrow();
            if state == VoiceState::AiSpeaking && previous_state != VoiceState::AiSpeaking {
                // Début de lecture : ouvre la fenêtre anti-écho
                ai_since = Some(Instant::now());
            }
            previous_state = state;

            match state {
                VoiceState::Idle => {
                    if rms > self.config.rms_threshold_normal {
                        info!("🎙️ Voix détectée (RMS={}) → USER_SPEAKING", rms);
                        self.request(VoiceState::UserSpeaking);
                        silence_start = None;
                        sequence = 0;
                        self.send_chunk(&downsampled, &mut frame, &mut sequence)
                            .await;
                    }
                }
                VoiceState::UserSpeaking => {
                    if rms < self.config.rms_threshold_stop {
                        match silence_start {
                            None => silence_start = Some(Instant::now()),
                            Some(start)
                                if start.elapsed() > self.config.silence_duration() =>
                            {
                                info!(
                                    "🔇 Silence détecté → IDLE ({} chunks envoyés, {:.1}s)",
                                    sequence,
                                    sequence as f32 / self.config.chunks_per_second() as f32
                                );
                                self.request(VoiceState::Idle);
                                silence_start = None;
                                // Ce chunk de silence n'est pas envoyé
                                continue;
                            }
                            Some(_) => {}
                        }
                    } else {
                        silence_start = None;
                    }

                    self.send_chunk(&downsampled, &mut frame, &mut sequence)
                        .await;

                    if sequence % 25 == 0 {
                        debug!("📤 Streaming: {} chunks, RMS={}", sequence, rms);
                    }
                }
                VoiceState::AiSpeaking => {
                    let in_holdoff = ai_since
                        .map(|since| since.elapsed() < self.config.interrupt_holdoff())
                        .unwrap_or(false);

                    if rms > self.config.rms_threshold_interrupt && !in_holdoff {
                        info!("⚡ Interruption détectée (RMS={}) → USER_SPEAKING", rms);
                        self.request(VoiceState::UserSpeaking);
                        silence_start = None;
                        sequence = 0;
                        self.send_chunk(&downsampled, &mut frame, &mut sequence)
                            .await;
                    }
                    // Hors interruption, rien ne part pendant que l'assistant parle
                }
            }
        }

        if let Err(e) = self.source.stop().await {
            warn!("⚠️ Arrêt de la capture échoué: {}", e);
        }
        debug!("🎙️ Boucle de capture arrêtée");
    }

    /// Publie une demande de transition vers le propriétaire d'état
    fn request(&self, state: VoiceState) {
        let _ = self.requests.send(state);
    }

    /// Encode et envoie un chunk, incrémente la séquence en cas de succès
    async fn send_chunk(&self, pcm: &[u8], frame: &mut Vec<u8>, sequence: &mut u32) {
        Uplink::Audio {
            sequence: *sequence,
            payload: pcm,
        }
        .encode_into(frame);

        match self.transport.send(frame).await {
            Ok(_) => *sequence += 1,
            Err(e) if e.is_recoverable() => debug!("Envoi audio différé: {}", e),
            Err(e) => warn!("⚠️ Envoi audio échoué: {}", e),
        }
    }
}
