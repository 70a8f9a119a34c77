//! Détection de pertes par suivi des numéros de séquence
//!
//! Le pont numérote les chunks audio de chaque réponse à partir de zéro.
//! Ce module repère les trous dans la numérotation pour mesurer les
//! pertes UDP, session par session.

use tracing::warn;

/// Suivi des pertes d'une session de lecture
///
/// Une "session" couvre une réponse de l'assistant, du premier chunk
/// (séquence 0) au chunk final. Le compteur repart de zéro à chaque
/// session, soit via [`reset`](Self::reset) après un chunk final, soit
/// à l'arrivée d'une séquence 0.
#[derive(Debug, Default)]
pub struct SessionLossTracker {
    /// Dernière séquence observée (None = aucune depuis le reset)
    last_sequence: Option<u32>,

    /// Total de chunks perdus depuis le début de la session
    lost_count: u32,
}

impl SessionLossTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Observe une séquence reçue et retourne le trou éventuel
    ///
    /// Une séquence 0 démarre une nouvelle session et remet le compteur
    /// à zéro. Un trou n'est signalé que si la numérotation avance en
    /// sautant des valeurs : les doublons et les arrivées dans le
    /// désordre ne comptent jamais comme des pertes.
    ///
    /// # Returns
    /// `Some(gap)` avec le nombre de chunks manquants, sinon `None`
    pub fn observe(&mut self, sequence: u32) -> Option<u32> {
        if sequence == 0 {
            // Premier chunk d'une nouvelle session côté émetteur
            self.lost_count = 0;
            self.last_sequence = Some(0);
            return None;
        }

        let gap = match self.last_sequence {
            Some(last) if sequence > last && sequence != last + 1 => {
                let gap = sequence - last - 1;
                self.lost_count += gap;
                warn!(
                    "⚠️ PERTE DE PAQUETS: séquence #{} attendue, #{} reçue ({} perdus, total session: {})",
                    last + 1,
                    sequence,
                    gap,
                    self.lost_count
                );
                Some(gap)
            }
            _ => None,
        };

        self.last_sequence = Some(sequence);
        gap
    }

    /// Réinitialise le suivi pour la prochaine session
    ///
    /// Appelé après le traitement du chunk final d'une réponse.
    pub fn reset(&mut self) {
        self.last_sequence = None;
        self.lost_count = 0;
    }

    /// Total de chunks perdus sur la session en cours
    pub fn lost_count(&self) -> u32 {
        self.lost_count
    }

    /// Dernière séquence observée (0 si aucune)
    pub fn last_sequence(&self) -> u32 {
        self.last_sequence.unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consecutive_sequences_report_no_loss() {
        let mut tracker = SessionLossTracker::new();

        assert_eq!(tracker.observe(0), None);
        assert_eq!(tracker.observe(1), None);
        assert_eq!(tracker.observe(2), None);
        assert_eq!(tracker.observe(3), None);
        assert_eq!(tracker.lost_count(), 0);
    }

    #[test]
    fn test_gap_detection() {
        let mut tracker = SessionLossTracker::new();

        tracker.observe(1);
        // 2, 3 et 4 manquent
        assert_eq!(tracker.observe(5), Some(3));
        assert_eq!(tracker.lost_count(), 3);

        // Les trous s'accumulent sur la session
        assert_eq!(tracker.observe(8), Some(2));
        assert_eq!(tracker.lost_count(), 5);
    }

    #[test]
    fn test_gap_right_after_session_start() {
        let mut tracker = SessionLossTracker::new();

        // Début de session puis saut direct à 5 : 1 à 4 sont perdus
        tracker.observe(0);
        assert_eq!(tracker.observe(5), Some(4));
        assert_eq!(tracker.last_sequence(), 5);
        assert_eq!(tracker.lost_count(), 4);
    }

    #[test]
    fn test_first_observation_never_reports_gap() {
        let mut tracker = SessionLossTracker::new();

        // Première séquence arbitrairement haute : pas de référence,
        // donc pas de perte
        assert_eq!(tracker.observe(120), None);
        assert_eq!(tracker.lost_count(), 0);
    }

    #[test]
    fn test_sequence_zero_starts_new_session() {
        let mut tracker = SessionLossTracker::new();

        tracker.observe(1);
        tracker.observe(6);
        assert_eq!(tracker.lost_count(), 4);

        // Séquence 0 = nouvelle session : le compteur repart de zéro
        assert_eq!(tracker.observe(0), None);
        assert_eq!(tracker.lost_count(), 0);
        assert_eq!(tracker.observe(1), None);
    }

    #[test]
    fn test_reorder_and_duplicates_ignored() {
        let mut tracker = SessionLossTracker::new();

        tracker.observe(4);
        tracker.observe(5);
        // Arrivée en retard puis doublon : aucune perte signalée
        assert_eq!(tracker.observe(3), None);
        assert_eq!(tracker.observe(3), None);
        assert_eq!(tracker.lost_count(), 0);
    }

    #[test]
    fn test_reset_starts_clean_session() {
        let mut tracker = SessionLossTracker::new();

        tracker.observe(1);
        tracker.observe(6);
        assert_eq!(tracker.lost_count(), 4);

        tracker.reset();
        assert_eq!(tracker.lost_count(), 0);
        assert_eq!(tracker.last_sequence(), 0);

        // Une trame isolée après reset ne signale jamais de trou
        assert_eq!(tracker.observe(9), None);
        assert_eq!(tracker.lost_count(), 0);
    }
}
