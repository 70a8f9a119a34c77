//! Types de données audio (AudioChunk, statistiques)
//!
//! Ce module définit les structures de données qui circulent dans toute
//! la chaîne audio, de la réception réseau jusqu'au haut-parleur.

use serde::{Deserialize, Serialize};

use crate::{AudioError, AudioResult};

/// Taille maximale du PCM d'un chunk de lecture, en bytes
///
/// C'est l'invariant de la file de lecture : tout chunk reçu plus gros
/// est tronqué à cette taille par le codec réseau, jamais rejeté.
pub const MAX_CHUNK_BYTES: usize = 1440;

/// Un chunk audio PCM prêt à être joué
///
/// Les chunks sont créés par le codec réseau (réception) ou par la
/// boucle de capture, puis *déplacés* (jamais copiés) dans la file de
/// lecture. Le payload est du PCM i16 little-endian mono.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AudioChunk {
    /// Données PCM, longueur entre 1 et MAX_CHUNK_BYTES
    payload: Vec<u8>,

    /// Numéro de séquence attribué par l'émetteur
    pub sequence: u32,

    /// Vrai pour le dernier chunk d'une réponse de l'assistant
    pub is_final: bool,
}

impl AudioChunk {
    /// Crée un chunk en faisant respecter les invariants du payload
    ///
    /// # Arguments
    /// * `payload` - PCM i16 little-endian (la propriété est transférée)
    /// * `sequence` - numéro de séquence du chunk
    /// * `is_final` - vrai pour le dernier chunk d'une réponse
    ///
    /// # Erreurs
    /// - `AudioError::EmptyChunk` si le payload est vide
    ///
    /// Un payload dépassant [`MAX_CHUNK_BYTES`] est tronqué, jamais rejeté.
    pub fn new(mut payload: Vec<u8>, sequence: u32, is_final: bool) -> AudioResult<Self> {
        if payload.is_empty() {
            return Err(AudioError::EmptyChunk { sequence });
        }

        if payload.len() > MAX_CHUNK_BYTES {
            payload.truncate(MAX_CHUNK_BYTES);
        }

        Ok(Self {
            payload,
            sequence,
            is_final,
        })
    }

    /// Crée un chunk de silence de la taille maximale
    pub fn silence(sequence: u32) -> Self {
        Self {
            payload: vec![0u8; MAX_CHUNK_BYTES],
            sequence,
            is_final: false,
        }
    }

    /// Accès en lecture au PCM
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Accès mutable au PCM (utilisé par le gain de lecture)
    pub fn payload_mut(&mut self) -> &mut [u8] {
        &mut self.payload
    }

    /// Taille du PCM en bytes
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Un chunk valide n'est jamais vide, mais le trait le demande
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Nombre d'échantillons i16 contenus dans le chunk
    pub fn sample_count(&self) -> usize {
        self.payload.len() / 2
    }
}

/// Statistiques de la file de lecture
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackStats {
    /// Chunks effectivement écrits vers le périphérique
    pub chunks_played: u64,

    /// Chunks abandonnés parce que la file était pleine
    pub chunks_dropped: u64,

    /// Sous-alimentations (timeout de lecture, silence injecté)
    pub underruns: u64,
}
