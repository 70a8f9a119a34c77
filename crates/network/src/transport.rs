//! Transport UDP pour la liaison avec le pont conversationnel
//!
//! Ce module implémente le trait Transport en utilisant UDP avec tokio.
//! Le client écoute sur un port fixe, apprend l'adresse du pont sur le
//! premier datagramme entrant, et lui renvoie tout le trafic montant.
//!
//! Une implémentation simulée en mémoire est fournie pour les tests et
//! le mode diagnostic : elle offre les mêmes timeouts que la vraie,
//! mais injecte et capture les datagrammes via des canaux.

use async_trait::async_trait;
use std::net::SocketAddr;
use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::net::UdpSocket;
use tokio::sync::{Mutex, mpsc};
use tokio::time::{Duration, sleep, timeout};
use tracing::{debug, info, warn};

use crate::{NetworkConfig, NetworkError, NetworkResult, Transport, TransportStats};

/// Transport UDP réel
///
/// # Example
/// ```rust,no_run
/// use network::{NetworkConfig, Transport, UdpTransport};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = NetworkConfig::default();
/// let transport = UdpTransport::bind(&config).await?;
/// println!("Écoute UDP sur {:?}", transport.local_addr());
/// # Ok(())
/// # }
/// ```
pub struct UdpTransport {
    /// Socket tokio (toutes les opérations prennent &self)
    socket: UdpSocket,

    /// Délai maximal d'attente en réception
    recv_timeout: Duration,

    /// Adresse du pont configurée d'avance, si connue
    default_peer: Option<SocketAddr>,

    /// Adresse apprise sur le dernier datagramme entrant
    ///
    /// Mutex synchrone : sections critiques de quelques instructions
    learned_peer: StdMutex<Option<SocketAddr>>,

    /// Adresse locale effective après bind
    local_addr: SocketAddr,

    packets_sent: AtomicU64,
    packets_received: AtomicU64,
}

impl UdpTransport {
    /// Crée et bind le socket UDP
    ///
    /// C'est le seul point de défaillance fatal du transport : sans
    /// socket, le client ne peut pas démarrer.
    ///
    /// # Erreurs
    /// - `NetworkError::ConfigError` si la configuration est incohérente
    /// - `NetworkError::BindError` si le port est indisponible
    pub async fn bind(config: &NetworkConfig) -> NetworkResult<Self> {
        config.validate().map_err(NetworkError::ConfigError)?;

        let addr = SocketAddr::from(([0, 0, 0, 0], config.local_port));
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|e| NetworkError::bind_failed(config.local_port, e))?;

        // Taille du buffer de réception noyau : non configurable via
        // tokio::net::UdpSocket, l'OS applique ses valeurs par défaut
        let local_addr = socket.local_addr()?;
        info!("✅ Socket UDP lié sur {}", local_addr);
        if let Some(peer) = config.server_addr {
            info!("📡 Pont configuré: {}", peer);
        }

        Ok(Self {
            socket,
            recv_timeout: config.recv_timeout(),
            default_peer: config.server_addr,
            learned_peer: StdMutex::new(None),
            local_addr,
            packets_sent: AtomicU64::new(0),
            packets_received: AtomicU64::new(0),
        })
    }

    /// Mémorise l'adresse source du dernier datagramme entrant
    fn learn_peer(&self, addr: SocketAddr) {
        if let Ok(mut peer) = self.learned_peer.lock() {
            match *peer {
                Some(current) if current == addr => {}
                Some(current) => {
                    warn!("🔁 Nouveau pair: {} (remplace {})", addr, current);
                    *peer = Some(addr);
                }
                None => {
                    info!("🤝 Pair appris: {}", addr);
                    *peer = Some(addr);
                }
            }
        }
    }
}

#[async_trait]
impl Transport for UdpTransport {
    async fn send(&self, frame: &[u8]) -> NetworkResult<usize> {
        let target = self
            .peer_addr()
            .or(self.default_peer)
            .ok_or(NetworkError::NoPeer)?;

        let sent = self.socket.send_to(frame, target).await?;
        self.packets_sent.fetch_add(1, Ordering::Relaxed);
        Ok(sent)
    }

    async fn recv(&self, buf: &mut [u8]) -> NetworkResult<(usize, SocketAddr)> {
        match timeout(self.recv_timeout, self.socket.recv_from(buf)).await {
            Err(_) => Err(NetworkError::Timeout),
            Ok(Err(e)) => Err(NetworkError::IoError(e)),
            Ok(Ok((len, addr))) => {
                self.packets_received.fetch_add(1, Ordering::Relaxed);
                self.learn_peer(addr);
                Ok((len, addr))
            }
        }
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        Some(self.local_addr)
    }

    fn peer_addr(&self) -> Option<SocketAddr> {
        self.learned_peer.lock().ok().and_then(|guard| *guard)
    }

    fn stats(&self) -> TransportStats {
        TransportStats {
            packets_sent: self.packets_sent.load(Ordering::Relaxed),
            packets_received: self.packets_received.load(Ordering::Relaxed),
        }
    }
}

/// Transport simulé en mémoire
///
/// Les datagrammes entrants sont injectés via le Sender retourné par
/// [`new`](Self::new) ; tout ce que le client envoie ressort sur le
/// Receiver. Les timeouts se comportent comme ceux du vrai transport,
/// ce qui rend les tests compatibles avec l'horloge tokio en pause.
pub struct SimulatedTransport {
    /// Datagrammes injectés par le test (côté réception du client)
    inbound: Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,

    /// Datagrammes émis par le client (capturés par le test)
    outbound: mpsc::UnboundedSender<Vec<u8>>,

    recv_timeout: Duration,

    /// Adresse fictive du pair simulé
    peer: SocketAddr,

    packets_sent: AtomicU64,
    packets_received: AtomicU64,
}

impl SimulatedTransport {
    /// Crée le transport et ses deux extrémités de contrôle
    ///
    /// # Returns
    /// `(transport, injecteur, sortie)` : le transport part dans le
    /// moteur, l'injecteur et la sortie restent côté test.
    pub fn new(
        recv_timeout: Duration,
    ) -> (
        Self,
        mpsc::UnboundedSender<Vec<u8>>,
        mpsc::UnboundedReceiver<Vec<u8>>,
    ) {
        let (inject_tx, inject_rx) = mpsc::unbounded_channel();
        let (out_tx, out_rx) = mpsc::unbounded_channel();

        let transport = Self {
            inbound: Mutex::new(inject_rx),
            outbound: out_tx,
            recv_timeout,
            peer: SocketAddr::from(([127, 0, 0, 1], 3333)),
            packets_sent: AtomicU64::new(0),
            packets_received: AtomicU64::new(0),
        };
        (transport, inject_tx, out_rx)
    }
}

#[async_trait]
impl Transport for SimulatedTransport {
    async fn send(&self, frame: &[u8]) -> NetworkResult<usize> {
        self.outbound
            .send(frame.to_vec())
            .map_err(|_| NetworkError::NoPeer)?;
        self.packets_sent.fetch_add(1, Ordering::Relaxed);
        Ok(frame.len())
    }

    async fn recv(&self, buf: &mut [u8]) -> NetworkResult<(usize, SocketAddr)> {
        let mut inbound = self.inbound.lock().await;
        match timeout(self.recv_timeout, inbound.recv()).await {
            Err(_) => Err(NetworkError::Timeout),
            Ok(None) => {
                // Injecteur fermé : on respecte quand même la cadence du
                // timeout pour ne pas transformer la boucle en spin
                sleep(self.recv_timeout).await;
                Err(NetworkError::Timeout)
            }
            Ok(Some(datagram)) => {
                let len = datagram.len().min(buf.len());
                if len < datagram.len() {
                    debug!("Datagramme simulé tronqué: {} bytes", datagram.len());
                }
                buf[..len].copy_from_slice(&datagram[..len]);
                self.packets_received.fetch_add(1, Ordering::Relaxed);
                Ok((len, self.peer))
            }
        }
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        Some(SocketAddr::from(([127, 0, 0, 1], 0)))
    }

    fn peer_addr(&self) -> Option<SocketAddr> {
        Some(self.peer)
    }

    fn stats(&self) -> TransportStats {
        TransportStats {
            packets_sent: self.packets_sent.load(Ordering::Relaxed),
            packets_received: self.packets_received.load(Ordering::Relaxed),
        }
    }
}
