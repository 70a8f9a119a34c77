//! File de lecture audio avec pré-buffering (jitter buffer)
//!
//! Ce module absorbe le jitter réseau entre la réception des chunks et
//! leur écriture vers le périphérique de sortie :
//! - accumulation d'un pré-buffer avant le premier son
//! - injection de silence en cas de sous-alimentation
//! - drainage et signal de fin après le dernier chunk d'une réponse
//!
//! # Architecture
//!
//! La boucle de réception réseau pousse des chunks via `enqueue()` (jamais
//! bloquant : file pleine = chunk abandonné et compté). Un worker tokio
//! consomme la file, applique le gain et écrit vers le [`OutputSink`].
//! Le producteur et le consommateur ne partagent que la file protégée
//! par mutex et quelques compteurs.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, Notify, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant, sleep, timeout, timeout_at};
use tracing::{debug, info, warn};

use crate::{
    AudioChunk, AudioConfig, AudioError, AudioResult, MAX_CHUNK_BYTES, OutputSink, PlaybackStats,
    dsp,
};

/// Événement émis par le worker de lecture
#[derive(Debug)]
pub enum PlaybackEvent {
    /// Le dernier chunk d'une réponse a été joué et le FIFO drainé
    Completed { chunks_played: u64 },
}

/// État partagé entre la file publique et le worker de lecture
struct QueueShared {
    /// Les chunks en attente, dans l'ordre d'arrivée
    chunks: Mutex<VecDeque<AudioChunk>>,

    /// Réveille le worker quand un chunk arrive ou qu'on s'arrête
    notify: Notify,

    /// Vrai tant qu'une session de lecture est en cours
    active: AtomicBool,

    /// Vrai dès qu'un chunk final a été mis en file
    ///
    /// Débloque le pré-buffer pour les réponses plus courtes que le seuil
    final_queued: AtomicBool,

    /// Compteurs de lecture
    stats: Mutex<PlaybackStats>,

    /// Capacité maximale de la file
    capacity: usize,
}

impl QueueShared {
    /// Vide la file et retourne le nombre de chunks retirés
    async fn purge(&self) -> u64 {
        let mut chunks = self.chunks.lock().await;
        let cleared = chunks.len() as u64;
        chunks.clear();
        cleared
    }
}

/// File de lecture avec worker intégré
///
/// # Example
/// ```rust,no_run
/// use audio::{AudioConfig, PlaybackQueue, mock::MemorySink};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = AudioConfig::default();
/// let (queue, _events) = PlaybackQueue::new(config, Box::new(MemorySink::new()))?;
///
/// queue.start().await?;
/// // ... la boucle de réception alimente queue.enqueue(chunk) ...
/// queue.stop().await;
/// # Ok(())
/// # }
/// ```
pub struct PlaybackQueue {
    shared: Arc<QueueShared>,

    /// Périphérique de sortie, prêté au worker pendant une session
    sink: Arc<Mutex<Box<dyn OutputSink>>>,

    /// Canal d'événements vers le propriétaire de l'état vocal
    events: mpsc::UnboundedSender<PlaybackEvent>,

    /// Handle du worker en cours (None entre deux sessions)
    worker: Mutex<Option<JoinHandle<()>>>,

    config: AudioConfig,
}

impl PlaybackQueue {
    /// Crée la file et son canal d'événements
    ///
    /// # Erreurs
    /// - `AudioError::ConfigError` si la configuration est incohérente
    pub fn new(
        config: AudioConfig,
        sink: Box<dyn OutputSink>,
    ) -> AudioResult<(Self, mpsc::UnboundedReceiver<PlaybackEvent>)> {
        config.validate().map_err(AudioError::ConfigError)?;

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let queue = Self {
            shared: Arc::new(QueueShared {
                chunks: Mutex::new(VecDeque::with_capacity(config.queue_capacity)),
                notify: Notify::new(),
                active: AtomicBool::new(false),
                final_queued: AtomicBool::new(false),
                stats: Mutex::new(PlaybackStats::default()),
                capacity: config.queue_capacity,
            }),
            sink: Arc::new(Mutex::new(sink)),
            events: events_tx,
            worker: Mutex::new(None),
            config,
        };
        Ok((queue, events_rx))
    }

    /// Ajoute un chunk à la file, sans jamais bloquer la réception
    ///
    /// Le chunk est déplacé dans la file. Si elle est pleine, il est
    /// abandonné, compté, et l'erreur est retournée à l'appelant.
    ///
    /// # Erreurs
    /// - `AudioError::BufferOverflow` si la file est pleine
    pub async fn enqueue(&self, chunk: AudioChunk) -> AudioResult<()> {
        let is_final = chunk.is_final;
        {
            let mut chunks = self.shared.chunks.lock().await;
            if chunks.len() >= self.shared.capacity {
                drop(chunks);
                self.shared.stats.lock().await.chunks_dropped += 1;
                return Err(AudioError::BufferOverflow {
                    capacity: self.shared.capacity,
                });
            }
            chunks.push_back(chunk);
        }

        if is_final {
            self.shared.final_queued.store(true, Ordering::SeqCst);
        }
        self.shared.notify.notify_one();
        Ok(())
    }

    /// Démarre une session de lecture
    ///
    /// Idempotent : un second appel pendant une session active est ignoré
    /// avec un avertissement. Les chunks d'une session précédente encore
    /// en file sont purgés avant le démarrage.
    pub async fn start(&self) -> AudioResult<()> {
        if self.shared.active.swap(true, Ordering::SeqCst) {
            warn!("⚠️ Lecture déjà active, démarrage ignoré");
            return Ok(());
        }

        self.shared.final_queued.store(false, Ordering::SeqCst);

        let stale = self.shared.purge().await;
        if stale > 0 {
            warn!("🗑️ {} chunks périmés purgés avant lecture", stale);
        }

        let shared = Arc::clone(&self.shared);
        let sink = Arc::clone(&self.sink);
        let events = self.events.clone();
        let config = self.config.clone();

        let handle = tokio::spawn(async move {
            playback_worker(shared, sink, events, config).await;
        });
        *self.worker.lock().await = Some(handle);

        Ok(())
    }

    /// Arrête la session en cours et purge la file
    ///
    /// Le worker est signalé puis attendu avec un délai borné (pas
    /// d'attente active). Sans effet si aucune session n'est en cours.
    ///
    /// # Returns
    /// Nombre de chunks non joués retirés de la file
    pub async fn stop(&self) -> u64 {
        self.shared.active.store(false, Ordering::SeqCst);
        self.shared.notify.notify_waiters();

        if let Some(handle) = self.worker.lock().await.take() {
            let bound =
                self.config.dequeue_timeout() + self.config.drain_wait() + Duration::from_millis(250);
            let abort = handle.abort_handle();
            if timeout(bound, handle).await.is_err() {
                warn!("⚠️ Worker de lecture bloqué, abandon forcé");
                abort.abort();
            }
        }

        let cleared = self.shared.purge().await;
        if cleared > 0 {
            info!("🗑️ Lecture arrêtée: {} chunks non joués purgés", cleared);
        }
        cleared
    }

    /// Vrai si une session de lecture est en cours
    pub fn is_active(&self) -> bool {
        self.shared.active.load(Ordering::SeqCst)
    }

    /// Nombre de chunks actuellement en file
    pub async fn depth(&self) -> usize {
        self.shared.chunks.lock().await.len()
    }

    /// Snapshot des compteurs de lecture
    pub async fn stats(&self) -> PlaybackStats {
        *self.shared.stats.lock().await
    }
}

/// Attend un chunk jusqu'à l'échéance donnée
///
/// Retourne None sur timeout ou quand la session est désactivée.
async fn dequeue_with_timeout(shared: &QueueShared, wait: Duration) -> Option<AudioChunk> {
    let deadline = Instant::now() + wait;
    loop {
        if let Some(chunk) = shared.chunks.lock().await.pop_front() {
            return Some(chunk);
        }
        if !shared.active.load(Ordering::SeqCst) {
            return None;
        }
        if timeout_at(deadline, shared.notify.notified()).await.is_err() {
            return None;
        }
    }
}

/// Boucle du worker de lecture
///
/// Détient le périphérique de sortie pendant toute la session.
async fn playback_worker(
    shared: Arc<QueueShared>,
    sink: Arc<Mutex<Box<dyn OutputSink>>>,
    events: mpsc::UnboundedSender<PlaybackEvent>,
    config: AudioConfig,
) {
    let mut sink = sink.lock().await;

    if let Err(e) = sink.enable().await {
        warn!("❌ Impossible d'activer la sortie audio: {}", e);
        shared.active.store(false, Ordering::SeqCst);
        return;
    }

    debug!(
        "🔊 Session de lecture sur {} (pré-buffer: {} chunks)",
        sink.description(),
        config.prebuffer_chunks
    );

    // Pré-buffering : on accumule avant le premier son pour absorber le
    // jitter. Un chunk final débloque immédiatement (réponse courte).
    loop {
        if !shared.active.load(Ordering::SeqCst) {
            break;
        }
        if shared.final_queued.load(Ordering::SeqCst) {
            break;
        }
        if shared.chunks.lock().await.len() >= config.prebuffer_chunks {
            break;
        }
        sleep(config.prebuffer_poll()).await;
    }

    if shared.active.load(Ordering::SeqCst) {
        info!("▶️ Pré-buffer atteint, lecture en cours");
    }

    let silence = vec![0u8; MAX_CHUNK_BYTES];
    let mut played: u64 = 0;
    let mut completed = false;

    while shared.active.load(Ordering::SeqCst) {
        match dequeue_with_timeout(&shared, config.dequeue_timeout()).await {
            Some(mut chunk) => {
                // Gain appliqué ici, côté consommateur : la boucle de
                // réception ne doit jamais payer ce coût
                if (config.playback_volume - 1.0).abs() > f32::EPSILON {
                    dsp::apply_gain(chunk.payload_mut(), config.playback_volume);
                }

                if let Err(e) = sink.write(chunk.payload()).await {
                    warn!("❌ Écriture audio échouée: {}", e);
                }
                played += 1;
                shared.stats.lock().await.chunks_played += 1;

                if chunk.is_final {
                    // Laisse le FIFO du périphérique se vider avant de
                    // signaler la fin à l'interlocuteur
                    sleep(config.drain_wait()).await;
                    info!("✅ Lecture terminée: {} chunks joués", played);
                    let _ = events.send(PlaybackEvent::Completed {
                        chunks_played: played,
                    });
                    completed = true;
                    shared.active.store(false, Ordering::SeqCst);
                    break;
                }
            }
            None => {
                if !shared.active.load(Ordering::SeqCst) {
                    break;
                }
                // Sous-alimentation : du silence, jamais l'ancien chunk
                if played > 0 {
                    shared.stats.lock().await.underruns += 1;
                    debug!("⏳ Sous-alimentation, injection de silence");
                    let _ = sink.write(&silence).await;
                }
            }
        }
    }

    // Sortie commune (fin de réponse ou arrêt externe) : on purge ce qui
    // reste, on écrit un bloc de silence pour vider le DMA, on coupe
    let leftover = shared.purge().await;
    if leftover > 0 {
        debug!("🗑️ {} chunks restants purgés en fin de session", leftover);
    }
    let _ = sink.write(&silence).await;
    if let Err(e) = sink.disable().await {
        warn!("❌ Désactivation de la sortie échouée: {}", e);
    }

    if !completed {
        debug!("⏹️ Session de lecture interrompue après {} chunks", played);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MemorySink;

    fn test_queue(
        config: AudioConfig,
    ) -> (
        PlaybackQueue,
        mpsc::UnboundedReceiver<PlaybackEvent>,
        crate::mock::MemorySinkHandle,
    ) {
        let sink = MemorySink::new();
        let handle = sink.handle();
        let (queue, events) = PlaybackQueue::new(config, Box::new(sink)).unwrap();
        (queue, events, handle)
    }

    fn chunk_of(byte: u8, sequence: u32, is_final: bool) -> AudioChunk {
        AudioChunk::new(vec![byte; 64], sequence, is_final).unwrap()
    }

    #[tokio::test]
    async fn test_enqueue_overflow_drops_and_counts() {
        let mut config = AudioConfig::test_config();
        config.queue_capacity = 4;
        let (queue, _events, _sink) = test_queue(config);

        for i in 0..4 {
            queue.enqueue(chunk_of(1, i, false)).await.unwrap();
        }
        assert_eq!(queue.depth().await, 4);

        // File pleine : le chunk est abandonné, pas d'attente
        let result = queue.enqueue(chunk_of(2, 4, false)).await;
        assert!(matches!(result, Err(AudioError::BufferOverflow { capacity: 4 })));
        assert_eq!(queue.depth().await, 4);
        assert_eq!(queue.stats().await.chunks_dropped, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_playback_before_prebuffer() {
        let mut config = AudioConfig::test_config();
        config.prebuffer_chunks = 5;
        let (queue, _events, sink) = test_queue(config);

        queue.start().await.unwrap();
        queue.enqueue(chunk_of(0x42, 0, false)).await.unwrap();
        queue.enqueue(chunk_of(0x42, 1, false)).await.unwrap();

        // Bien en dessous du pré-buffer : rien ne doit être consommé
        sleep(Duration::from_millis(400)).await;
        assert_eq!(queue.depth().await, 2);
        assert_eq!(sink.write_count().await, 0);

        queue.stop().await;

        // Seul le silence de fin de session a été écrit
        let writes = sink.writes().await;
        assert!(writes.iter().all(|w| w.iter().all(|&b| b == 0)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_final_chunk_releases_prebuffer() {
        let mut config = AudioConfig::test_config();
        config.prebuffer_chunks = 10;
        let (queue, mut events, sink) = test_queue(config);

        queue.start().await.unwrap();
        queue.enqueue(chunk_of(0x11, 0, false)).await.unwrap();
        queue.enqueue(chunk_of(0x22, 1, false)).await.unwrap();
        queue.enqueue(chunk_of(0x33, 2, true)).await.unwrap();

        // 3 chunks < seuil de 10, mais le chunk final débloque la lecture
        let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("la lecture aurait dû se terminer")
            .expect("canal d'événements fermé");
        let PlaybackEvent::Completed { chunks_played } = event;
        assert_eq!(chunks_played, 3);

        let writes = sink.writes().await;
        // 3 chunks dans l'ordre, puis le silence de fin
        assert_eq!(writes[0], vec![0x11; 64]);
        assert_eq!(writes[1], vec![0x22; 64]);
        assert_eq!(writes[2], vec![0x33; 64]);
        assert!(writes[3].iter().all(|&b| b == 0));

        // Un seul événement de fin
        assert!(events.try_recv().is_err());
        assert!(!queue.is_active());
        assert!(!sink.is_enabled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_underrun_writes_silence_not_previous_chunk() {
        let mut config = AudioConfig::test_config();
        config.prebuffer_chunks = 1;
        let (queue, _events, sink) = test_queue(config);

        queue.enqueue(chunk_of(0x55, 0, false)).await.unwrap();
        queue.start().await.unwrap();

        // Un chunk joué puis plus rien : le timeout de 500ms doit
        // produire du silence, jamais une répétition du chunk
        sleep(Duration::from_millis(1200)).await;

        let stats = queue.stats().await;
        assert_eq!(stats.chunks_played, 1);
        assert!(stats.underruns >= 1);

        let writes = sink.writes().await;
        assert_eq!(writes[0], vec![0x55; 64]);
        for write in &writes[1..] {
            assert!(write.iter().all(|&b| b == 0), "un underrun doit produire du silence");
        }

        queue.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_is_idempotent() {
        let config = AudioConfig::test_config();
        let (queue, _events, _sink) = test_queue(config);

        queue.start().await.unwrap();
        assert!(queue.is_active());

        // Second démarrage ignoré sans erreur
        queue.start().await.unwrap();
        assert!(queue.is_active());

        queue.stop().await;
        assert!(!queue.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_purges_and_counts() {
        let mut config = AudioConfig::test_config();
        config.prebuffer_chunks = 10;
        let (queue, _events, _sink) = test_queue(config);

        queue.start().await.unwrap();
        for i in 0..6 {
            queue.enqueue(chunk_of(9, i, false)).await.unwrap();
        }

        // Toujours en pré-buffering : l'arrêt doit tout purger
        let cleared = queue.stop().await;
        assert_eq!(cleared, 6);
        assert_eq!(queue.depth().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gain_applied_on_consumer_path() {
        let mut config = AudioConfig::test_config();
        config.prebuffer_chunks = 1;
        config.playback_volume = 0.5;
        let (queue, mut events, sink) = test_queue(config);

        let mut payload = Vec::new();
        for _ in 0..32 {
            payload.extend_from_slice(&1000i16.to_le_bytes());
        }
        queue
            .enqueue(AudioChunk::new(payload, 0, true).unwrap())
            .await
            .unwrap();
        queue.start().await.unwrap();

        events.recv().await.expect("fin de lecture attendue");

        let writes = sink.writes().await;
        let first = &writes[0];
        let sample = i16::from_le_bytes([first[0], first[1]]);
        assert_eq!(sample, 500, "le gain doit être appliqué par le lecteur");
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_chunks_purged_on_start() {
        let mut config = AudioConfig::test_config();
        config.prebuffer_chunks = 10;
        let (queue, _events, _sink) = test_queue(config);

        // Chunks orphelins d'une "session précédente"
        for i in 0..3 {
            queue.enqueue(chunk_of(7, i, false)).await.unwrap();
        }

        queue.start().await.unwrap();
        assert_eq!(queue.depth().await, 0);
        queue.stop().await;
    }
}
