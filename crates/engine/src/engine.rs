//! Façade du moteur de conversation
//!
//! Assemble les deux boucles (capture et réception), la file de lecture
//! et le propriétaire d'état en un objet unique. Toutes les dépendances
//! sont injectées : le moteur fonctionne indifféremment sur le vrai
//! matériel ou sur les doubles en mémoire.
//!
//! # Architecture
//!
//! L'état vocal appartient à un task unique, le propriétaire d'état.
//! Les boucles ne modifient jamais l'état directement : elles envoient
//! des demandes de transition sur un canal mpsc et observent l'état
//! courant via un canal watch. Les effets de bord (arrêt/démarrage de la
//! lecture, signal INTERRUPT) sont exécutés exclusivement par le
//! propriétaire, dans l'ordre des demandes.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Duration, timeout};
use tracing::{debug, info, warn};

use audio::{AudioConfig, CaptureSource, OutputSink, PlaybackEvent, PlaybackQueue, PlaybackStats};
use network::{Transport, Uplink};

use crate::capture::CaptureLoop;
use crate::receive::ReceiveLoop;
use crate::{EngineError, EngineResult, SideEffect, VoiceState, VoiceStateMachine};

/// Délai accordé aux tasks pour s'arrêter proprement
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Compteurs agrégés du moteur
#[derive(Debug, Clone, Copy, Default)]
pub struct EngineStats {
    pub packets_sent: u64,
    pub packets_received: u64,
    pub packets_lost: u32,
    pub playback: PlaybackStats,
}

/// Périphériques et canaux consommés au démarrage
struct Pending {
    source: Box<dyn CaptureSource>,
    requests_rx: mpsc::UnboundedReceiver<VoiceState>,
    events_rx: mpsc::UnboundedReceiver<PlaybackEvent>,
    state_tx: watch::Sender<VoiceState>,
}

/// Moteur de conversation vocale
///
/// # Example
/// ```rust,no_run
/// use std::sync::Arc;
/// use audio::{AudioConfig, mock::{MemorySink, ScriptedCapture}};
/// use engine::VoiceAssistant;
/// use network::{NetworkConfig, UdpTransport};
/// use tokio::time::Duration;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = AudioConfig::default();
/// let transport = Arc::new(UdpTransport::bind(&NetworkConfig::default()).await?);
/// let source = Box::new(ScriptedCapture::new(
///     config.chunk_size_bytes_capture(),
///     Duration::from_millis(40),
/// ));
/// let sink = Box::new(MemorySink::new());
///
/// let mut assistant = VoiceAssistant::new(config, transport, source, sink)?;
/// assistant.start();
/// // ... la conversation tourne ...
/// assistant.stop().await?;
/// # Ok(())
/// # }
/// ```
pub struct VoiceAssistant {
    transport: Arc<dyn Transport>,
    queue: Arc<PlaybackQueue>,
    requests_tx: mpsc::UnboundedSender<VoiceState>,
    state_rx: watch::Receiver<VoiceState>,
    active: Arc<AtomicBool>,
    tasks: Vec<JoinHandle<()>>,
    lost_total: Arc<AtomicU32>,
    config: AudioConfig,
    pending: Option<Pending>,
}

impl VoiceAssistant {
    /// Assemble le moteur sans rien démarrer
    ///
    /// # Erreurs
    /// - `EngineError::Audio` si la configuration audio est incohérente
    pub fn new(
        config: AudioConfig,
        transport: Arc<dyn Transport>,
        source: Box<dyn CaptureSource>,
        sink: Box<dyn OutputSink>,
    ) -> EngineResult<Self> {
        let (queue, events_rx) = PlaybackQueue::new(config.clone(), sink)?;
        let (requests_tx, requests_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(VoiceState::Idle);

        Ok(Self {
            transport,
            queue: Arc::new(queue),
            requests_tx,
            state_rx,
            active: Arc::new(AtomicBool::new(false)),
            tasks: Vec::new(),
            lost_total: Arc::new(AtomicU32::new(0)),
            config,
            pending: Some(Pending {
                source,
                requests_rx,
                events_rx,
                state_tx,
            }),
        })
    }

    /// Démarre les trois tasks du moteur
    ///
    /// Sans effet si le moteur tourne déjà.
    pub fn start(&mut self) {
        let Some(pending) = self.pending.take() else {
            warn!("⚠️ Moteur déjà démarré");
            return;
        };

        self.active.store(true, Ordering::SeqCst);
        info!("🚀 Moteur de conversation démarré");

        self.tasks.push(tokio::spawn(state_owner(
            pending.requests_rx,
            pending.events_rx,
            pending.state_tx,
            Arc::clone(&self.queue),
            Arc::clone(&self.transport),
            Arc::clone(&self.active),
        )));

        let capture = CaptureLoop::new(
            pending.source,
            Arc::clone(&self.transport),
            self.state_rx.clone(),
            self.requests_tx.clone(),
            Arc::clone(&self.active),
            self.config.clone(),
        );
        self.tasks.push(tokio::spawn(capture.run()));

        let receive = ReceiveLoop::new(
            Arc::clone(&self.transport),
            Arc::clone(&self.queue),
            self.requests_tx.clone(),
            Arc::clone(&self.active),
            Arc::clone(&self.lost_total),
        );
        self.tasks.push(tokio::spawn(receive.run()));
    }

    /// Arrête le moteur et attend la fin des tasks
    ///
    /// Chaque task est attendu avec un délai borné ; au-delà, il est
    /// abandonné de force et l'erreur est remontée.
    ///
    /// # Erreurs
    /// - `EngineError::ShutdownTimeout` si un task a dû être abandonné
    pub async fn stop(&mut self) -> EngineResult<()> {
        if !self.active.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        info!("🛑 Arrêt du moteur...");

        // Réveille le propriétaire d'état s'il attend une demande
        let _ = self.requests_tx.send(VoiceState::Idle);

        let mut aborted = false;
        for handle in self.tasks.drain(..) {
            let abort = handle.abort_handle();
            if timeout(SHUTDOWN_GRACE, handle).await.is_err() {
                warn!("⚠️ Task du moteur bloqué, abandon forcé");
                abort.abort();
                aborted = true;
            }
        }

        self.queue.stop().await;
        info!("✅ Moteur arrêté");

        if aborted {
            Err(EngineError::ShutdownTimeout)
        } else {
            Ok(())
        }
    }

    /// Vrai entre start() et stop()
    pub fn is_running(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// État vocal courant
    pub fn state(&self) -> VoiceState {
        *self.state_rx.borrow()
    }

    /// Abonnement aux changements d'état vocal
    pub fn subscribe_state(&self) -> watch::Receiver<VoiceState> {
        self.state_rx.clone()
    }

    /// Vrai si une session de lecture est en cours
    pub fn playback_active(&self) -> bool {
        self.queue.is_active()
    }

    /// Snapshot des compteurs réseau et lecture
    pub async fn stats(&self) -> EngineStats {
        let transport = self.transport.stats();
        EngineStats {
            packets_sent: transport.packets_sent,
            packets_received: transport.packets_received,
            packets_lost: self.lost_total.load(Ordering::Relaxed),
            playback: self.queue.stats().await,
        }
    }
}

/// Task propriétaire de l'état vocal
///
/// Sérialise les demandes de transition venant des deux boucles et du
/// réseau, exécute les effets de bord, publie l'état courant sur le
/// canal watch. C'est le seul endroit où l'état change.
async fn state_owner(
    mut requests_rx: mpsc::UnboundedReceiver<VoiceState>,
    mut events_rx: mpsc::UnboundedReceiver<PlaybackEvent>,
    state_tx: watch::Sender<VoiceState>,
    queue: Arc<PlaybackQueue>,
    transport: Arc<dyn Transport>,
    active: Arc<AtomicBool>,
) {
    let mut machine = VoiceStateMachine::new();
    let mut frame = Vec::with_capacity(8);

    loop {
        let next = tokio::select! {
            request = requests_rx.recv() => match request {
                Some(next) => next,
                None => break,
            },
            event = events_rx.recv() => match event {
                Some(PlaybackEvent::Completed { chunks_played }) => {
                    info!(
                        "📤 PLAYBACK_COMPLETE envoyé ({} chunks joués)",
                        chunks_played
                    );
                    Uplink::PlaybackComplete.encode_into(&mut frame);
                    if let Err(e) = transport.send(&frame).await {
                        warn!("⚠️ Envoi PLAYBACK_COMPLETE échoué: {}", e);
                    }
                    VoiceState::Idle
                }
                None => break,
            },
        };

        for effect in machine.transition(next) {
            match effect {
                SideEffect::StopPlayback => {
                    queue.stop().await;
                }
                SideEffect::StartPlayback => {
                    if let Err(e) = queue.start().await {
                        warn!("⚠️ Démarrage de la lecture échoué: {}", e);
                    }
                }
                SideEffect::SendInterrupt => {
                    Uplink::Interrupt.encode_into(&mut frame);
                    match transport.send(&frame).await {
                        Ok(_) => info!("📤 INTERRUPT envoyé au pont"),
                        Err(e) => warn!("⚠️ Envoi INTERRUPT échoué: {}", e),
                    }
                }
            }
        }
        let _ = state_tx.send(machine.current());

        if !active.load(Ordering::SeqCst) {
            break;
        }
    }

    debug!("🔄 Propriétaire d'état arrêté");
}
