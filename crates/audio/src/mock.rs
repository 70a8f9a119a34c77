//! Doubles en mémoire des périphériques audio
//!
//! Ces implémentations remplacent le matériel dans les tests et dans le
//! client de diagnostic : `ScriptedCapture` rejoue un scénario de chunks
//! préparés à l'avance, `MemorySink` enregistre tout ce que le lecteur
//! écrit. Les deux respectent la cadence temps réel des vrais
//! périphériques pour que les timings du moteur restent représentatifs.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use tokio::time::{Duration, sleep};

use crate::{AudioError, AudioResult, CaptureSource, OutputSink};

/// Source de capture scriptée
///
/// Fournit les chunks préparés dans l'ordre, puis du silence indéfiniment.
/// Chaque lecture attend une durée de chunk, comme un périphérique réel.
pub struct ScriptedCapture {
    chunks: VecDeque<Vec<u8>>,
    silence_bytes: usize,
    pacing: Duration,
    started: bool,
}

impl ScriptedCapture {
    /// Crée une source silencieuse
    ///
    /// # Arguments
    /// * `silence_bytes` - taille des chunks de silence produits
    /// * `pacing` - durée simulée d'une capture (typiquement 40ms)
    pub fn new(silence_bytes: usize, pacing: Duration) -> Self {
        Self {
            chunks: VecDeque::new(),
            silence_bytes,
            pacing,
            started: false,
        }
    }

    /// Ajoute un chunk au scénario
    pub fn push_chunk(&mut self, chunk: Vec<u8>) {
        self.chunks.push_back(chunk);
    }

    /// Génère un chunk d'amplitude constante
    ///
    /// Tous les échantillons valent `amplitude`, donc le niveau RMS du
    /// chunk vaut exactement `amplitude`. Pratique pour viser un seuil
    /// de détection précis.
    pub fn constant_chunk(amplitude: i16, bytes: usize) -> Vec<u8> {
        let mut chunk = Vec::with_capacity(bytes);
        for _ in 0..bytes / 2 {
            chunk.extend_from_slice(&amplitude.to_le_bytes());
        }
        chunk
    }
}

#[async_trait]
impl CaptureSource for ScriptedCapture {
    async fn start(&mut self) -> AudioResult<()> {
        self.started = true;
        Ok(())
    }

    async fn read_chunk(&mut self, buf: &mut Vec<u8>) -> AudioResult<usize> {
        if !self.started {
            return Err(AudioError::inactive("read_chunk"));
        }

        // Cadence du périphérique : une lecture = une durée de chunk
        sleep(self.pacing).await;

        buf.clear();
        match self.chunks.pop_front() {
            Some(chunk) => buf.extend_from_slice(&chunk),
            None => buf.resize(self.silence_bytes, 0),
        }
        Ok(buf.len())
    }

    async fn stop(&mut self) -> AudioResult<()> {
        self.started = false;
        Ok(())
    }

    fn description(&self) -> String {
        format!("capture scriptée ({} chunks préparés)", self.chunks.len())
    }
}

/// Sortie audio en mémoire
///
/// Chaque écriture est enregistrée telle quelle ; le handle permet aux
/// tests d'inspecter le flux après coup.
pub struct MemorySink {
    writes: Arc<Mutex<Vec<Vec<u8>>>>,
    enabled: Arc<AtomicBool>,
}

/// Handle d'inspection d'un [`MemorySink`]
///
/// Clonable et partageable : le sink lui-même part dans le lecteur,
/// le handle reste côté test.
#[derive(Clone)]
pub struct MemorySinkHandle {
    writes: Arc<Mutex<Vec<Vec<u8>>>>,
    enabled: Arc<AtomicBool>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self {
            writes: Arc::new(Mutex::new(Vec::new())),
            enabled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Retourne un handle d'inspection partagé
    pub fn handle(&self) -> MemorySinkHandle {
        MemorySinkHandle {
            writes: Arc::clone(&self.writes),
            enabled: Arc::clone(&self.enabled),
        }
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySinkHandle {
    /// Copie de tous les blocs écrits, dans l'ordre
    pub async fn writes(&self) -> Vec<Vec<u8>> {
        self.writes.lock().await.clone()
    }

    /// Nombre de blocs écrits
    pub async fn write_count(&self) -> usize {
        self.writes.lock().await.len()
    }

    /// État du canal de sortie
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OutputSink for MemorySink {
    async fn enable(&mut self) -> AudioResult<()> {
        self.enabled.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn write(&mut self, pcm: &[u8]) -> AudioResult<usize> {
        if !self.enabled.load(Ordering::SeqCst) {
            return Err(AudioError::inactive("write"));
        }
        self.writes.lock().await.push(pcm.to_vec());
        Ok(pcm.len())
    }

    async fn disable(&mut self) -> AudioResult<()> {
        self.enabled.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn description(&self) -> String {
        "sortie audio en mémoire".to_string()
    }
}
