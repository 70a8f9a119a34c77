//! Machine à états de l'activité vocale
//!
//! Trois états pilotent toute la conversation :
//! - `Idle` : on attend que l'utilisateur parle
//! - `UserSpeaking` : l'utilisateur parle, ses chunks partent vers le pont
//! - `AiSpeaking` : l'assistant répond, la file de lecture est active
//!
//! La fonction de transition est pure et déclenchée sur front : demander
//! l'état courant ne produit aucun effet. Les effets de bord retournés
//! sont exécutés par le propriétaire d'état unique du moteur, jamais ici.

use std::fmt;
use tracing::info;

/// État de l'activité vocale
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceState {
    /// En attente de parole utilisateur
    Idle,

    /// L'utilisateur parle
    UserSpeaking,

    /// L'assistant parle (lecture en cours)
    AiSpeaking,
}

impl fmt::Display for VoiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            VoiceState::Idle => "IDLE",
            VoiceState::UserSpeaking => "USER_SPEAKING",
            VoiceState::AiSpeaking => "AI_SPEAKING",
        };
        write!(f, "{}", name)
    }
}

/// Effet de bord à exécuter suite à une transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideEffect {
    /// Arrêter la file de lecture
    StopPlayback,

    /// Envoyer le signal INTERRUPT au pont
    SendInterrupt,

    /// Démarrer la file de lecture
    StartPlayback,
}

/// Machine à états, détenue par le propriétaire d'état du moteur
#[derive(Debug)]
pub struct VoiceStateMachine {
    current: VoiceState,
}

impl VoiceStateMachine {
    pub fn new() -> Self {
        Self {
            current: VoiceState::Idle,
        }
    }

    /// État courant
    pub fn current(&self) -> VoiceState {
        self.current
    }

    /// Applique une transition et retourne les effets à exécuter
    ///
    /// Déclenchée sur front : si `next` est l'état courant, la liste est
    /// vide et rien n'est journalisé.
    pub fn transition(&mut self, next: VoiceState) -> Vec<SideEffect> {
        if next == self.current {
            return Vec::new();
        }

        info!("🔄 Changement d'état: {} → {}", self.current, next);
        let previous = self.current;
        self.current = next;

        match next {
            VoiceState::Idle => vec![SideEffect::StopPlayback],
            VoiceState::UserSpeaking => {
                if previous == VoiceState::AiSpeaking {
                    // L'utilisateur coupe la parole à l'assistant
                    vec![SideEffect::StopPlayback, SideEffect::SendInterrupt]
                } else {
                    Vec::new()
                }
            }
            VoiceState::AiSpeaking => vec![SideEffect::StartPlayback],
        }
    }
}

impl Default for VoiceStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let machine = VoiceStateMachine::new();
        assert_eq!(machine.current(), VoiceState::Idle);
    }

    #[test]
    fn test_same_state_has_no_effect() {
        let mut machine = VoiceStateMachine::new();
        assert!(machine.transition(VoiceState::Idle).is_empty());
        assert_eq!(machine.current(), VoiceState::Idle);
    }

    #[test]
    fn test_idle_to_user_speaking_is_silent() {
        let mut machine = VoiceStateMachine::new();
        assert!(machine.transition(VoiceState::UserSpeaking).is_empty());
        assert_eq!(machine.current(), VoiceState::UserSpeaking);
    }

    #[test]
    fn test_any_to_ai_speaking_starts_playback() {
        let mut machine = VoiceStateMachine::new();
        assert_eq!(
            machine.transition(VoiceState::AiSpeaking),
            vec![SideEffect::StartPlayback]
        );

        let mut machine = VoiceStateMachine::new();
        machine.transition(VoiceState::UserSpeaking);
        assert_eq!(
            machine.transition(VoiceState::AiSpeaking),
            vec![SideEffect::StartPlayback]
        );
    }

    #[test]
    fn test_interrupt_path() {
        let mut machine = VoiceStateMachine::new();
        machine.transition(VoiceState::AiSpeaking);

        // L'utilisateur interrompt : arrêt lecture + signal INTERRUPT
        let effects = machine.transition(VoiceState::UserSpeaking);
        assert_eq!(
            effects,
            vec![SideEffect::StopPlayback, SideEffect::SendInterrupt]
        );

        // Un second passage dans le même état ne refait rien
        assert!(machine.transition(VoiceState::UserSpeaking).is_empty());
    }

    #[test]
    fn test_any_to_idle_stops_playback() {
        let mut machine = VoiceStateMachine::new();
        machine.transition(VoiceState::AiSpeaking);
        assert_eq!(
            machine.transition(VoiceState::Idle),
            vec![SideEffect::StopPlayback]
        );
    }
}
