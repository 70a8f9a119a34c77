//! # Engine - Moteur de conversation vocale
//!
//! Cette crate assemble les briques audio et réseau en un assistant
//! vocal bidirectionnel complet :
//!
//! - [`VoiceStateMachine`] : l'état vocal (Idle, UserSpeaking, AiSpeaking)
//!   et ses effets de bord
//! - [`CaptureLoop`] : détection de voix et envoi des chunks capturés
//! - [`ReceiveLoop`] : décodage des datagrammes du pont et alimentation
//!   de la file de lecture
//! - [`VoiceAssistant`] : la façade qui orchestre le tout
//!
//! Le moteur ne connaît le matériel et le réseau qu'à travers les traits
//! [`audio::CaptureSource`], [`audio::OutputSink`] et
//! [`network::Transport`] : les tests le font tourner entièrement en
//! mémoire, à l'horloge tokio en pause.

pub mod capture;
pub mod engine;
pub mod error;
pub mod receive;
pub mod state;

pub use capture::CaptureLoop;
pub use engine::{EngineStats, VoiceAssistant};
pub use error::{EngineError, EngineResult};
pub use receive::ReceiveLoop;
pub use state::{SideEffect, VoiceState, VoiceStateMachine};

#[cfg(test)]
mod integration_tests {
    use super::*;
    use std::sync::Arc;

    use audio::mock::{MemorySink, MemorySinkHandle, ScriptedCapture};
    use audio::{AudioChunk, AudioConfig};
    use network::{Downlink, SimulatedTransport, Transport};
    use tokio::sync::mpsc;
    use tokio::time::{Duration, sleep, timeout};

    /// Encode un datagramme audio descendant comme le ferait le pont
    fn audio_datagram(sequence: u32, payload: Vec<u8>, is_final: bool) -> Vec<u8> {
        let chunk = AudioChunk::new(payload, sequence, is_final).unwrap();
        let mut buf = Vec::new();
        Downlink::Audio(chunk).encode_into(&mut buf);
        buf
    }

    /// Moteur complet sur transport simulé et périphériques en mémoire
    fn start_assistant(
        config: AudioConfig,
        source: ScriptedCapture,
    ) -> (
        VoiceAssistant,
        mpsc::UnboundedSender<Vec<u8>>,
        mpsc::UnboundedReceiver<Vec<u8>>,
        MemorySinkHandle,
    ) {
        let (transport, inject, out) = SimulatedTransport::new(Duration::from_millis(100));
        let transport: Arc<dyn Transport> = Arc::new(transport);

        let sink = MemorySink::new();
        let handle = sink.handle();

        let mut assistant =
            VoiceAssistant::new(config, transport, Box::new(source), Box::new(sink)).unwrap();
        assistant.start();
        (assistant, inject, out, handle)
    }

    async fn next_frame(out: &mut mpsc::UnboundedReceiver<Vec<u8>>) -> Vec<u8> {
        timeout(Duration::from_secs(30), out.recv())
            .await
            .expect("aucune trame émise dans le délai")
            .expect("canal de sortie fermé")
    }

    #[tokio::test(start_paused = true)]
    async fn test_response_played_in_order_then_acknowledged() {
        let mut config = AudioConfig::test_config();
        config.prebuffer_chunks = 10;
        let source = ScriptedCapture::new(
            config.chunk_size_bytes_capture(),
            config.chunk_duration(),
        );
        let (mut assistant, inject, mut out, sink) = start_assistant(config, source);

        // Le pont annonce une réponse puis envoie trois chunks, le
        // dernier marqué final alors que le pré-buffer de 10 n'est pas
        // atteint : la réponse doit quand même être jouée en entier
        inject.send(vec![0x32]).unwrap();
        sleep(Duration::from_millis(100)).await;
        inject.send(audio_datagram(0, vec![0x11; 64], false)).unwrap();
        inject.send(audio_datagram(1, vec![0x22; 64], false)).unwrap();
        inject.send(audio_datagram(2, vec![0x33; 64], true)).unwrap();

        // Seul message montant attendu : PLAYBACK_COMPLETE
        assert_eq!(next_frame(&mut out).await, vec![0x50]);

        let mut state_rx = assistant.subscribe_state();
        timeout(
            Duration::from_secs(5),
            state_rx.wait_for(|s| *s == VoiceState::Idle),
        )
        .await
        .expect("retour à Idle attendu")
        .unwrap();

        // Les trois chunks dans l'ordre d'émission, sans perte
        let writes = sink.writes().await;
        assert_eq!(writes[0], vec![0x11; 64]);
        assert_eq!(writes[1], vec![0x22; 64]);
        assert_eq!(writes[2], vec![0x33; 64]);

        let stats = assistant.stats().await;
        assert_eq!(stats.packets_lost, 0);
        assert_eq!(stats.playback.chunks_played, 3);

        assistant.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_sequence_gap_counted_as_loss() {
        let config = AudioConfig::test_config();
        let source = ScriptedCapture::new(
            config.chunk_size_bytes_capture(),
            config.chunk_duration(),
        );
        let (mut assistant, inject, mut out, _sink) = start_assistant(config, source);

        inject.send(vec![0x32]).unwrap();
        sleep(Duration::from_millis(100)).await;

        // Les séquences 1 à 4 n'arrivent jamais
        inject.send(audio_datagram(0, vec![0xAA; 64], false)).unwrap();
        inject.send(audio_datagram(5, vec![0xBB; 64], true)).unwrap();

        assert_eq!(next_frame(&mut out).await, vec![0x50]);

        let stats = assistant.stats().await;
        assert_eq!(stats.packets_lost, 4);
        assert_eq!(stats.playback.chunks_played, 2);

        assistant.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_loud_voice_during_playback_sends_interrupt() {
        let config = AudioConfig::test_config();
        let capture_bytes = config.chunk_size_bytes_capture();

        // Cinq chunks de silence puis une voix forte (RMS 450, au-dessus
        // du seuil d'interruption de 400)
        let mut source = ScriptedCapture::new(capture_bytes, config.chunk_duration());
        for _ in 0..5 {
            source.push_chunk(vec![0u8; capture_bytes]);
        }
        source.push_chunk(ScriptedCapture::constant_chunk(450, capture_bytes));

        let (mut assistant, inject, mut out, _sink) = start_assistant(config, source);

        inject.send(vec![0x32]).unwrap();
        let mut state_rx = assistant.subscribe_state();
        timeout(
            Duration::from_secs(5),
            state_rx.wait_for(|s| *s == VoiceState::AiSpeaking),
        )
        .await
        .expect("passage en AiSpeaking attendu")
        .unwrap();
        assert!(assistant.playback_active());

        // L'interruption produit exactement deux trames montantes :
        // INTERRUPT et le premier chunk de la nouvelle prise de parole
        let first = next_frame(&mut out).await;
        let second = next_frame(&mut out).await;
        let (control, voice) = if first == vec![0x40] {
            (first, second)
        } else {
            (second, first)
        };
        assert_eq!(control, vec![0x40]);

        // Trame audio montante : séquence 0 en tête, PCM 24 kHz derrière
        assert_eq!(voice.len(), 4 + capture_bytes / 2);
        assert_eq!(&voice[..4], &[0, 0, 0, 0]);
        assert_eq!(i16::from_le_bytes([voice[4], voice[5]]), 450);

        timeout(
            Duration::from_secs(5),
            state_rx.wait_for(|s| *s == VoiceState::UserSpeaking),
        )
        .await
        .expect("passage en UserSpeaking attendu")
        .unwrap();
        assert!(!assistant.playback_active());

        // Le script retombe dans le silence : retour à Idle
        timeout(
            Duration::from_secs(5),
            state_rx.wait_for(|s| *s == VoiceState::Idle),
        )
        .await
        .expect("retour à Idle après silence attendu")
        .unwrap();

        assistant.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_voice_from_idle_starts_numbered_stream() {
        let config = AudioConfig::test_config();
        let capture_bytes = config.chunk_size_bytes_capture();

        // Une voix modérée (RMS 200 > seuil normal de 100) puis silence
        let mut source = ScriptedCapture::new(capture_bytes, config.chunk_duration());
        source.push_chunk(ScriptedCapture::constant_chunk(200, capture_bytes));

        let (mut assistant, _inject, mut out, _sink) = start_assistant(config, source);

        let mut state_rx = assistant.subscribe_state();
        timeout(
            Duration::from_secs(5),
            state_rx.wait_for(|s| *s == VoiceState::UserSpeaking),
        )
        .await
        .expect("détection de voix attendue")
        .unwrap();

        // Premier chunk de la prise de parole : séquence 0
        let frame = next_frame(&mut out).await;
        assert_eq!(&frame[..4], &[0, 0, 0, 0]);
        assert_eq!(frame.len(), 4 + capture_bytes / 2);

        // 200ms de silence en configuration de test → retour à Idle
        timeout(
            Duration::from_secs(5),
            state_rx.wait_for(|s| *s == VoiceState::Idle),
        )
        .await
        .expect("retour à Idle attendu")
        .unwrap();

        assistant.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_bridge_idle_message_stops_playback() {
        let config = AudioConfig::test_config();
        let source = ScriptedCapture::new(
            config.chunk_size_bytes_capture(),
            config.chunk_duration(),
        );
        let (mut assistant, inject, _out, _sink) = start_assistant(config, source);

        inject.send(vec![0x32]).unwrap();
        let mut state_rx = assistant.subscribe_state();
        timeout(
            Duration::from_secs(5),
            state_rx.wait_for(|s| *s == VoiceState::AiSpeaking),
        )
        .await
        .expect("passage en AiSpeaking attendu")
        .unwrap();
        assert!(assistant.playback_active());

        // Le pont reprend la main et renvoie le client en Idle
        inject.send(vec![0x30]).unwrap();
        timeout(
            Duration::from_secs(5),
            state_rx.wait_for(|s| *s == VoiceState::Idle),
        )
        .await
        .expect("retour à Idle attendu")
        .unwrap();
        assert!(!assistant.playback_active());

        assistant.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_is_bounded_and_idempotent() {
        let config = AudioConfig::test_config();
        let source = ScriptedCapture::new(
            config.chunk_size_bytes_capture(),
            config.chunk_duration(),
        );
        let (mut assistant, _inject, _out, _sink) = start_assistant(config, source);
        assert!(assistant.is_running());

        assistant.stop().await.unwrap();
        assert!(!assistant.is_running());

        // Second arrêt sans effet
        assistant.stop().await.unwrap();
    }
}
