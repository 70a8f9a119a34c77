//! Crate audio pour Voxlink - Assistant vocal temps réel
//!
//! Ce crate gère toute la chaîne audio côté client :
//! - Types de chunks PCM et statistiques
//! - DSP entier (RMS, sous-échantillonnage, gain)
//! - File de lecture avec pré-buffering (jitter buffer)
//! - Traits de périphériques et doubles en mémoire pour les tests

pub mod config; // Configuration audio
pub mod dsp; // RMS, sous-échantillonnage, gain
pub mod error; // Gestion d'erreurs
pub mod mock; // Doubles en mémoire (tests et diagnostic)
pub mod playback; // File de lecture avec worker
pub mod traits; // Traits abstraits des périphériques
pub mod types; // Types de données (AudioChunk, etc.)

// Réexports pour faciliter l'utilisation
pub use config::*;
pub use error::*;
pub use traits::*;
pub use types::*;

// Réexports des implémentations principales
pub use playback::{PlaybackEvent, PlaybackQueue};
