// Client vocal Vox
//
// Deux modes de fonctionnement :
// - `run` : lance le moteur de conversation complet sur UDP, avec des
//   périphériques audio de diagnostic en mémoire
// - `peer` : simule le pont conversationnel côté serveur, pour tester
//   deux instances face à face sans infrastructure

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::signal;
use tokio::time::{Duration, sleep};
use tracing::info;

use audio::mock::{MemorySink, ScriptedCapture};
use audio::{AudioChunk, AudioConfig};
use engine::VoiceAssistant;
use network::{Downlink, NetworkConfig, NetworkError, Transport, UdpTransport, Uplink};

#[derive(Parser)]
#[command(author, version, about = "Client vocal Vox")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lance le moteur de conversation
    Run {
        /// Port UDP local
        #[arg(short, long, default_value = "3333")]
        port: u16,

        /// Adresse du pont (sinon apprise sur le premier datagramme)
        #[arg(short, long)]
        server: Option<String>,

        /// Durée de voix simulée au démarrage, en millisecondes
        #[arg(long, default_value = "2000")]
        speak_ms: u64,

        /// Journalisation détaillée
        #[arg(short, long)]
        verbose: bool,
    },
    /// Simule le pont conversationnel
    Peer {
        /// Port UDP d'écoute
        #[arg(short, long, default_value = "9001")]
        port: u16,

        /// Nombre de chunks audio dans la réponse simulée
        #[arg(short, long, default_value = "50")]
        chunks: u32,

        /// Journalisation détaillée
        #[arg(short, long)]
        verbose: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            port,
            server,
            speak_ms,
            verbose,
        } => {
            init_tracing(verbose);
            run_assistant(port, server, speak_ms).await
        }
        Commands::Peer {
            port,
            chunks,
            verbose,
        } => {
            init_tracing(verbose);
            run_peer(port, chunks).await
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Lance le moteur de conversation sur UDP
async fn run_assistant(port: u16, server: Option<String>, speak_ms: u64) -> anyhow::Result<()> {
    println!("🎤 Client vocal Vox");
    println!("===================");

    let audio_config = AudioConfig::default();
    audio_config
        .validate()
        .map_err(anyhow::Error::msg)
        .context("configuration audio invalide")?;

    let network_config = NetworkConfig {
        local_port: port,
        server_addr: match server {
            Some(addr) => Some(
                addr.parse::<SocketAddr>()
                    .with_context(|| format!("adresse de pont invalide: {}", addr))?,
            ),
            None => None,
        },
        ..NetworkConfig::default()
    };

    let transport = UdpTransport::bind(&network_config)
        .await
        .context("impossible de créer le transport UDP")?;
    println!("📡 Écoute UDP : {:?}", transport.local_addr());

    // Périphériques de diagnostic : une "voix" scriptée au démarrage
    // pour déclencher la détection, puis du silence
    let mut source = ScriptedCapture::new(
        audio_config.chunk_size_bytes_capture(),
        audio_config.chunk_duration(),
    );
    let speak_chunks = speak_ms / audio_config.chunk_duration_ms as u64;
    for _ in 0..speak_chunks {
        source.push_chunk(ScriptedCapture::constant_chunk(
            300,
            audio_config.chunk_size_bytes_capture(),
        ));
    }
    if speak_chunks > 0 {
        println!("💬 Voix simulée : {} chunks ({} ms)", speak_chunks, speak_ms);
    }

    let mut assistant = VoiceAssistant::new(
        audio_config,
        Arc::new(transport),
        Box::new(source),
        Box::new(MemorySink::new()),
    )
    .context("assemblage du moteur échoué")?;

    assistant.start();
    println!("🚀 Moteur démarré, arrêt avec Ctrl+C");

    signal::ctrl_c()
        .await
        .context("attente du signal d'arrêt échouée")?;
    println!("\n🛑 Arrêt demandé");

    let stats = assistant.stats().await;
    assistant.stop().await.context("arrêt du moteur échoué")?;

    println!("\n📊 Bilan de session :");
    println!("   📤 Paquets envoyés : {}", stats.packets_sent);
    println!("   📥 Paquets reçus : {}", stats.packets_received);
    println!("   ⚠️  Chunks perdus : {}", stats.packets_lost);
    println!("   🔊 Chunks joués : {}", stats.playback.chunks_played);
    println!("   🗑️ Chunks abandonnés : {}", stats.playback.chunks_dropped);
    println!("   ⏳ Sous-alimentations : {}", stats.playback.underruns);
    println!("👋 Au revoir !");

    Ok(())
}

/// Simule le pont conversationnel
///
/// Écoute les prises de parole du client ; une seconde sans audio marque
/// la fin d'une prise, et le pont répond par une rafale de chunks dont
/// le dernier est tagué final. Il attend ensuite PLAYBACK_COMPLETE ou
/// une interruption.
async fn run_peer(port: u16, chunks: u32) -> anyhow::Result<()> {
    println!("🌉 Pont conversationnel simulé");
    println!("==============================");

    let config = NetworkConfig {
        local_port: port,
        server_addr: None,
        recv_timeout_ms: 1000,
    };
    let transport = UdpTransport::bind(&config)
        .await
        .context("impossible de créer le transport UDP")?;
    println!("📡 Écoute UDP : {:?}", transport.local_addr());
    println!("⏳ En attente d'une prise de parole... (Ctrl+C pour quitter)");

    tokio::select! {
        result = peer_loop(&transport, chunks) => result,
        _ = signal::ctrl_c() => {
            println!("\n👋 Pont arrêté");
            Ok(())
        }
    }
}

async fn peer_loop(transport: &UdpTransport, chunks: u32) -> anyhow::Result<()> {
    let mut buf = vec![0u8; network::MAX_DATAGRAM_BYTES];

    loop {
        let mut received: u32 = 0;

        // Phase d'écoute : une prise de parole se termine au premier
        // timeout après réception d'audio
        loop {
            match transport.recv(&mut buf).await {
                Ok((len, _)) => match Uplink::decode(&buf[..len]) {
                    Ok(Uplink::Audio { sequence, payload }) => {
                        received += 1;
                        if received % 25 == 1 {
                            println!("🎙️ Audio reçu : #{} ({} bytes)", sequence, payload.len());
                        }
                    }
                    Ok(Uplink::Interrupt) => println!("⚡ INTERRUPT reçu hors lecture"),
                    Ok(Uplink::PlaybackComplete) => println!("✅ PLAYBACK_COMPLETE reçu"),
                    Err(e) => println!("⚠️ Datagramme invalide : {}", e),
                },
                Err(NetworkError::Timeout) if received > 0 => break,
                Err(NetworkError::Timeout) => continue,
                Err(e) => return Err(e).context("réception échouée"),
            }
        }

        println!("🔇 Fin de prise de parole ({} chunks), réponse...", received);
        send_response(transport, chunks, &mut buf).await?;

        // Phase de retour : on attend l'accusé de fin de lecture
        loop {
            match transport.recv(&mut buf).await {
                Ok((len, _)) => match Uplink::decode(&buf[..len]) {
                    Ok(Uplink::PlaybackComplete) => {
                        println!("✅ Lecture terminée côté client\n⏳ En attente...");
                        break;
                    }
                    Ok(Uplink::Interrupt) => {
                        println!("⚡ Client interrompu pendant la lecture\n⏳ En attente...");
                        break;
                    }
                    _ => {}
                },
                Err(NetworkError::Timeout) => continue,
                Err(e) => return Err(e).context("réception échouée"),
            }
        }
    }
}

/// Envoie une réponse simulée : STATE_AI_SPEAKING puis une rafale de
/// chunks de 440 Hz, le dernier tagué final
async fn send_response(
    transport: &UdpTransport,
    chunks: u32,
    frame: &mut Vec<u8>,
) -> anyhow::Result<()> {
    Downlink::StateAiSpeaking.encode_into(frame);
    transport.send(frame).await.context("envoi d'état échoué")?;

    let mut phase: f32 = 0.0;
    for sequence in 0..chunks {
        let is_final = sequence + 1 == chunks;
        let payload = sine_chunk(440.0, 24_000, 720, &mut phase);
        let chunk =
            AudioChunk::new(payload, sequence, is_final).context("construction du chunk échouée")?;

        Downlink::Audio(chunk).encode_into(frame);
        transport.send(frame).await.context("envoi audio échoué")?;

        // Cadence temps réel d'un flux de synthèse
        sleep(Duration::from_millis(40)).await;
    }

    info!("📤 Réponse envoyée : {} chunks", chunks);
    Ok(())
}

/// Génère un chunk d'onde sinusoïdale en PCM i16 little-endian
fn sine_chunk(frequency: f32, sample_rate: u32, samples: usize, phase: &mut f32) -> Vec<u8> {
    let step = 2.0 * std::f32::consts::PI * frequency / sample_rate as f32;
    let mut chunk = Vec::with_capacity(samples * 2);
    for _ in 0..samples {
        let sample = (phase.sin() * 8000.0) as i16;
        chunk.extend_from_slice(&sample.to_le_bytes());
        *phase += step;
    }
    chunk
}
