//! Configuration audio pour le système Voxlink
//!
//! Ce module définit tous les paramètres audio utilisés par l'assistant vocal.
//! Ces paramètres sont cruciaux pour la latence de la conversation et la
//! tolérance au jitter réseau.

use serde::{Deserialize, Serialize};
use tokio::time::Duration;

/// Configuration principale pour toute la chaîne audio
///
/// Cette structure contient tous les paramètres nécessaires pour configurer :
/// - La capture (cadence des chunks, fréquences d'échantillonnage)
/// - La détection vocale (seuils RMS, durée de silence)
/// - La file de lecture (capacité, pré-buffer, timeouts)
///
/// `#[derive(Clone)]` : Permet de dupliquer facilement cette config
/// `#[derive(Debug)]` : Permet d'afficher la config pour le débogage
/// `#[derive(Serialize, Deserialize)]` : Permet de sauvegarder/charger depuis un fichier
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Fréquence d'échantillonnage de la capture en Hz
    ///
    /// 48000 Hz côté microphone, sous-échantillonné par 2 avant envoi
    pub sample_rate_capture: u32,

    /// Fréquence d'échantillonnage de la sortie en Hz
    ///
    /// 24000 Hz : c'est la fréquence du flux envoyé et reçu sur le réseau
    pub sample_rate_output: u32,

    /// Durée de chaque chunk audio en millisecondes
    ///
    /// 40ms = 25 chunks par seconde, cadence imposée par la capture
    pub chunk_duration_ms: u16,

    /// Capacité de la file de lecture en nombre de chunks
    ///
    /// 3500 chunks ≈ 140 secondes de parole, largement au-dessus
    /// d'une réponse normale de l'assistant
    pub queue_capacity: usize,

    /// Nombre de chunks à accumuler avant de commencer la lecture
    ///
    /// Le pré-buffer absorbe le jitter réseau : plus grand = plus robuste
    /// mais plus de latence avant le premier son
    pub prebuffer_chunks: usize,

    /// Période de scrutation pendant le pré-buffering, en millisecondes
    pub prebuffer_poll_ms: u64,

    /// Attente maximale d'un chunk par le lecteur, en millisecondes
    ///
    /// Au-delà, un bloc de silence est injecté (sous-alimentation)
    pub dequeue_timeout_ms: u64,

    /// Délai laissé au FIFO du périphérique pour se vider après le
    /// dernier chunk, en millisecondes
    pub drain_wait_ms: u64,

    /// Gain appliqué à la lecture, entre 0.0 et 1.0
    ///
    /// Appliqué côté lecteur, jamais côté réception réseau
    pub playback_volume: f32,

    /// Seuil RMS de détection de parole (état Idle)
    pub rms_threshold_normal: u32,

    /// Seuil RMS d'interruption de l'assistant (état AiSpeaking)
    pub rms_threshold_interrupt: u32,

    /// Seuil RMS en dessous duquel on considère un silence (état UserSpeaking)
    pub rms_threshold_stop: u32,

    /// Durée de silence continu avant retour à l'état Idle, en millisecondes
    pub silence_duration_ms: u64,

    /// Fenêtre après le début de la lecture pendant laquelle la détection
    /// d'interruption est suspendue, en millisecondes
    ///
    /// Évite que les premiers instants de la voix de l'assistant, repris
    /// par le microphone, déclenchent une fausse interruption
    pub interrupt_holdoff_ms: u64,
}

impl Default for AudioConfig {
    /// Configuration par défaut calibrée pour l'assistant vocal
    fn default() -> Self {
        Self {
            sample_rate_capture: 48000,  // Capture micro à 48 kHz
            sample_rate_output: 24000,   // Flux réseau à 24 kHz
            chunk_duration_ms: 40,       // 25 chunks/s
            queue_capacity: 3500,        // ~140s de lecture
            prebuffer_chunks: 10,        // ~400ms de pré-buffer
            prebuffer_poll_ms: 50,
            dequeue_timeout_ms: 500,
            drain_wait_ms: 220,
            playback_volume: 1.0,        // Pas d'atténuation par défaut
            rms_threshold_normal: 100,
            rms_threshold_interrupt: 400,
            rms_threshold_stop: 500,
            silence_duration_ms: 5000,   // 5s de silence → Idle
            interrupt_holdoff_ms: 300,
        }
    }
}

impl AudioConfig {
    /// Calcule le nombre d'échantillons d'un chunk capturé (48 kHz)
    ///
    /// Formule : (sample_rate * chunk_duration_ms) / 1000
    /// Exemple : (48000 * 40) / 1000 = 1920 échantillons
    pub fn samples_per_chunk_capture(&self) -> usize {
        (self.sample_rate_capture as usize * self.chunk_duration_ms as usize) / 1000
    }

    /// Calcule le nombre d'échantillons d'un chunk après sous-échantillonnage
    pub fn samples_per_chunk_output(&self) -> usize {
        (self.sample_rate_output as usize * self.chunk_duration_ms as usize) / 1000
    }

    /// Taille en bytes d'un chunk capturé (échantillons i16, mono)
    pub fn chunk_size_bytes_capture(&self) -> usize {
        self.samples_per_chunk_capture() * 2
    }

    /// Taille en bytes d'un chunk envoyé sur le réseau
    pub fn chunk_size_bytes_output(&self) -> usize {
        self.samples_per_chunk_output() * 2
    }

    /// Nombre de chunks par seconde à la cadence configurée
    pub fn chunks_per_second(&self) -> u32 {
        1000 / self.chunk_duration_ms as u32
    }

    /// Durée d'un chunk sous forme de Duration
    pub fn chunk_duration(&self) -> Duration {
        Duration::from_millis(self.chunk_duration_ms as u64)
    }

    /// Période de scrutation du pré-buffer
    pub fn prebuffer_poll(&self) -> Duration {
        Duration::from_millis(self.prebuffer_poll_ms)
    }

    /// Attente maximale d'un chunk par le lecteur
    pub fn dequeue_timeout(&self) -> Duration {
        Duration::from_millis(self.dequeue_timeout_ms)
    }

    /// Délai de vidage du FIFO après le dernier chunk
    pub fn drain_wait(&self) -> Duration {
        Duration::from_millis(self.drain_wait_ms)
    }

    /// Durée de silence avant retour à Idle
    pub fn silence_duration(&self) -> Duration {
        Duration::from_millis(self.silence_duration_ms)
    }

    /// Fenêtre de suspension de la détection d'interruption
    pub fn interrupt_holdoff(&self) -> Duration {
        Duration::from_millis(self.interrupt_holdoff_ms)
    }

    /// Valide que la configuration est cohérente
    ///
    /// Vérifie que tous les paramètres sont dans des plages acceptables
    pub fn validate(&self) -> Result<(), String> {
        if self.sample_rate_capture != self.sample_rate_output * 2 {
            return Err(format!(
                "La capture ({} Hz) doit être exactement le double de la sortie ({} Hz)",
                self.sample_rate_capture, self.sample_rate_output
            ));
        }

        if self.chunk_duration_ms < 10 || self.chunk_duration_ms > 60 {
            return Err(format!(
                "Durée de chunk invalide: {}ms (doit être entre 10 et 60)",
                self.chunk_duration_ms
            ));
        }

        if self.queue_capacity < self.prebuffer_chunks {
            return Err(format!(
                "Capacité de file ({}) inférieure au pré-buffer ({})",
                self.queue_capacity, self.prebuffer_chunks
            ));
        }

        if self.prebuffer_chunks == 0 {
            return Err("Le pré-buffer doit contenir au moins 1 chunk".to_string());
        }

        if !(0.0..=1.0).contains(&self.playback_volume) {
            return Err(format!(
                "Volume de lecture invalide: {} (doit être entre 0.0 et 1.0)",
                self.playback_volume
            ));
        }

        if self.rms_threshold_interrupt <= self.rms_threshold_normal {
            return Err(format!(
                "Seuil d'interruption ({}) doit dépasser le seuil normal ({})",
                self.rms_threshold_interrupt, self.rms_threshold_normal
            ));
        }

        Ok(())
    }

    /// Crée une configuration adaptée aux tests
    ///
    /// File courte, timers réduits, pas de fenêtre d'interruption
    pub fn test_config() -> Self {
        Self {
            queue_capacity: 32,
            prebuffer_chunks: 2,
            silence_duration_ms: 200,
            interrupt_holdoff_ms: 0,
            ..Default::default()
        }
    }

    /// Crée une configuration avec lecture fortement atténuée
    ///
    /// Utile quand le haut-parleur et le microphone sont très proches
    /// et que l'écho acoustique reste un problème malgré la fenêtre
    /// de suspension d'interruption
    pub fn soft_playback() -> Self {
        Self {
            playback_volume: 0.05,
            ..Default::default()
        }
    }
}
