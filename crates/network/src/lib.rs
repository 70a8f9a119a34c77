//! Crate network pour Voxlink - Liaison UDP avec le pont conversationnel
//!
//! Ce crate gère tout le versant réseau du client :
//! - Codec du protocole (messages descendants et montants)
//! - Détection de pertes par suivi des séquences
//! - Transport UDP avec apprentissage de l'adresse du pair
//! - Transport simulé pour les tests de bout en bout

pub mod codec; // Codec du protocole UDP
pub mod error; // Gestion d'erreurs
pub mod sequencer; // Détection de pertes
pub mod traits; // Trait Transport
pub mod transport; // Implémentations UDP et simulée
pub mod types; // Configuration et compteurs

// Réexports pour faciliter l'utilisation
pub use codec::{Downlink, Uplink};
pub use error::*;
pub use sequencer::SessionLossTracker;
pub use traits::*;
pub use transport::{SimulatedTransport, UdpTransport};
pub use types::*;
