//! Codec du protocole UDP de l'assistant
//!
//! Traduction sans état entre datagrammes bruts et messages typés.
//! Le protocole est volontairement minimal :
//!
//! Descendant (pont → client) :
//! - `0x20` PLAY_AUDIO : `[tag][u32 LE séquence][PCM]`
//! - `0x21` PLAY_AUDIO_LAST : même format, dernier chunk d'une réponse
//! - `0x30` STATE_IDLE : un seul byte
//! - `0x32` STATE_AI_SPEAKING : un seul byte
//!
//! Montant (client → pont) :
//! - audio brut : `[u32 LE séquence][PCM]`, sans tag
//! - `0x40` INTERRUPT : un seul byte
//! - `0x50` PLAYBACK_COMPLETE : un seul byte

use tracing::warn;

use audio::{AudioChunk, MAX_CHUNK_BYTES};

use crate::{NetworkError, NetworkResult};

/// Tag d'un chunk audio à jouer
pub const MSG_PLAY_AUDIO: u8 = 0x20;
/// Tag du dernier chunk audio d'une réponse
pub const MSG_PLAY_AUDIO_LAST: u8 = 0x21;
/// Le pont demande le retour à l'état Idle
pub const MSG_STATE_IDLE: u8 = 0x30;
/// Le pont annonce que l'assistant parle
pub const MSG_STATE_AI_SPEAKING: u8 = 0x32;
/// Le client signale une interruption de l'utilisateur
pub const MSG_INTERRUPT: u8 = 0x40;
/// Le client signale la fin de la lecture
pub const MSG_PLAYBACK_COMPLETE: u8 = 0x50;

/// Taille minimale d'une trame audio descendante (tag + séquence)
const AUDIO_FRAME_HEADER: usize = 5;

/// Message descendant décodé (pont → client)
#[derive(Debug, Clone, PartialEq)]
pub enum Downlink {
    /// Chunk audio à mettre en file de lecture
    Audio(AudioChunk),

    /// Passage demandé à l'état Idle
    StateIdle,

    /// Passage demandé à l'état AiSpeaking
    StateAiSpeaking,
}

impl Downlink {
    /// Décode un datagramme descendant
    ///
    /// # Erreurs
    /// - `NetworkError::MalformedFrame` si le datagramme est vide ou si
    ///   une trame audio n'a pas son en-tête complet
    /// - `NetworkError::EmptyPayload` pour une trame audio sans PCM
    /// - `NetworkError::UnknownMessageType` pour un tag inconnu
    ///
    /// Un PCM dépassant [`MAX_CHUNK_BYTES`] est tronqué avec un
    /// avertissement, jamais rejeté.
    pub fn decode(datagram: &[u8]) -> NetworkResult<Self> {
        let tag = *datagram.first().ok_or(NetworkError::malformed(0))?;

        match tag {
            MSG_PLAY_AUDIO | MSG_PLAY_AUDIO_LAST => {
                if datagram.len() < AUDIO_FRAME_HEADER {
                    return Err(NetworkError::malformed(datagram.len()));
                }

                let sequence =
                    u32::from_le_bytes([datagram[1], datagram[2], datagram[3], datagram[4]]);
                let payload = &datagram[AUDIO_FRAME_HEADER..];

                if payload.is_empty() {
                    return Err(NetworkError::EmptyPayload { sequence });
                }

                if payload.len() > MAX_CHUNK_BYTES {
                    warn!(
                        "⚠️ Trame #{} surdimensionnée: {} bytes (max {}), tronquée",
                        sequence,
                        payload.len(),
                        MAX_CHUNK_BYTES
                    );
                }

                let is_final = tag == MSG_PLAY_AUDIO_LAST;
                let chunk = AudioChunk::new(payload.to_vec(), sequence, is_final)
                    .map_err(|_| NetworkError::EmptyPayload { sequence })?;
                Ok(Downlink::Audio(chunk))
            }
            MSG_STATE_IDLE => Ok(Downlink::StateIdle),
            MSG_STATE_AI_SPEAKING => Ok(Downlink::StateAiSpeaking),
            _ => Err(NetworkError::UnknownMessageType { tag }),
        }
    }

    /// Encode le message dans le buffer fourni
    ///
    /// Utilisé par le simulateur de pont et les tests ; le buffer est
    /// vidé puis rempli, sans réallocation en régime permanent.
    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        buf.clear();
        match self {
            Downlink::Audio(chunk) => {
                buf.push(if chunk.is_final {
                    MSG_PLAY_AUDIO_LAST
                } else {
                    MSG_PLAY_AUDIO
                });
                buf.extend_from_slice(&chunk.sequence.to_le_bytes());
                buf.extend_from_slice(chunk.payload());
            }
            Downlink::StateIdle => buf.push(MSG_STATE_IDLE),
            Downlink::StateAiSpeaking => buf.push(MSG_STATE_AI_SPEAKING),
        }
    }
}

/// Message montant (client → pont)
///
/// Le payload audio est emprunté : l'encodage se fait directement depuis
/// le buffer de capture, sans copie intermédiaire.
#[derive(Debug, Clone, PartialEq)]
pub enum Uplink<'a> {
    /// Chunk audio capturé, envoyé brut avec son numéro de séquence
    Audio { sequence: u32, payload: &'a [u8] },

    /// L'utilisateur interrompt l'assistant
    Interrupt,

    /// La lecture de la réponse est terminée
    PlaybackComplete,
}

impl<'a> Uplink<'a> {
    /// Encode le message dans le buffer fourni
    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        buf.clear();
        match self {
            Uplink::Audio { sequence, payload } => {
                buf.extend_from_slice(&sequence.to_le_bytes());
                buf.extend_from_slice(payload);
            }
            Uplink::Interrupt => buf.push(MSG_INTERRUPT),
            Uplink::PlaybackComplete => buf.push(MSG_PLAYBACK_COMPLETE),
        }
    }

    /// Décode un datagramme montant (côté pont)
    ///
    /// Un byte seul est un message de contrôle ; au-delà de 4 bytes,
    /// c'est une trame audio `[séquence][PCM]`.
    pub fn decode(datagram: &'a [u8]) -> NetworkResult<Self> {
        match datagram.len() {
            0 => Err(NetworkError::malformed(0)),
            1 => match datagram[0] {
                MSG_INTERRUPT => Ok(Uplink::Interrupt),
                MSG_PLAYBACK_COMPLETE => Ok(Uplink::PlaybackComplete),
                tag => Err(NetworkError::UnknownMessageType { tag }),
            },
            2..=4 => Err(NetworkError::malformed(datagram.len())),
            _ => {
                let sequence =
                    u32::from_le_bytes([datagram[0], datagram[1], datagram[2], datagram[3]]);
                Ok(Uplink::Audio {
                    sequence,
                    payload: &datagram[4..],
                })
            }
        }
    }
}
