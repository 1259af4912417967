// SPDX-FileCopyrightText: © 2025 Jamie Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! `clap`-derived subcommand dispatcher, including the injectable
//! `LogInitFn` that lets tests drive `handle_command` without a real
//! subscriber.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use jamie_core::model::{RecognitionSessionId, SessionId, StreamId, VoiceStream};
use jamie_core::{JamieError, Result};
use jamie_pipeline::PipelineSupervisor;
use jamie_store::Store;
use jamie_transcript::{render_segment, DEFAULT_CONFIDENCE_FLOOR};
use opentelemetry_sdk::metrics::SdkMeterProvider;
use tracing_appender::non_blocking::WorkerGuard;

use crate::config::{self, Config, TelemetryConfig};
use crate::{server, telemetry};

pub type LogInitFn =
    fn(&config::LogConfig, &TelemetryConfig) -> std::result::Result<Option<WorkerGuard>, Box<dyn std::error::Error>>;

#[derive(Parser, Debug)]
#[command(name = "jamie", version, about = "Real-time multi-speaker voice transcription pipeline")]
pub struct Cli {
    /// Path to the TOML config file.
    #[arg(long, default_value = "jamie.toml")]
    pub config: String,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Connect to the chat-platform voice gateway and run the full pipeline.
    Discord,
    /// Decode an Ogg Opus file through the ASR/Reducer pipeline (dev aid).
    Transcribe { file: PathBuf },
    /// Print a live tail of a stream's transcript.
    Stream { stream_id: String },
    /// Invoke the LLM summarizer collaborator over a session's transcript.
    Summarize { session_id: String },
    /// Run the Slice Builder over a stream's full range.
    Generateogg {
        stream_id: String,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// List known `VoiceStream`s from the Store.
    ListStreams,
    /// Serve slice/transcript HTTP endpoints.
    Http {
        #[arg(long)]
        port: Option<u16>,
    },
}

fn init_telemetry_if_enabled(config: &Config) -> Option<SdkMeterProvider> {
    if !config.telemetry.enable {
        return None;
    }
    match telemetry::init_metrics(&config.telemetry) {
        Ok(provider) => {
            opentelemetry::global::set_meter_provider(provider.clone());
            Some(provider)
        },
        Err(error) => {
            tracing::warn!(%error, "failed to initialize telemetry; continuing without it");
            None
        },
    }
}

fn log_startup_info(config: &Config) {
    tracing::info!(
        http_port = config.server.http_port,
        database_url = %config.store.database_url,
        asr_endpoint = %config.asr.endpoint,
        "jamie starting up"
    );
}

async fn connect_store(config: &Config) -> Result<Store> {
    Store::connect(&config.store.database_url).await
}

async fn run_discord(config: &Config) -> Result<()> {
    if config.discord.token.is_empty() {
        return Err(JamieError::Config("DISCORD_TOKEN is not set".to_string()));
    }
    if config.asr.api_key.is_empty() {
        tracing::warn!("ASR_API_KEY is not set; the ASR Session will likely fail to authenticate");
    }

    let store = Arc::new(connect_store(config).await?);
    let _supervisor =
        PipelineSupervisor::new(store, config.asr.endpoint.clone(), config.asr.language.clone());

    tracing::error!(
        "the chat-platform voice gateway is an external collaborator specified only by its \
         VoicePacket/SpeakingUpdate callback contract; this binary wires the Pipeline Supervisor \
         but does not itself implement a gateway transport to drive it"
    );
    Err(JamieError::Config("no chat-platform gateway adapter is linked into this binary".to_string()))
}

async fn run_transcribe(config: &Config, file: &PathBuf) -> Result<()> {
    use tokio_util::sync::CancellationToken;

    let bytes = tokio::fs::read(file)
        .await
        .map_err(|e| JamieError::Protocol(format!("failed to read {}: {e}", file.display())))?;
    let packets = demux_ogg_opus_packets(&bytes)?;
    tracing::info!(packet_count = packets.len(), path = %file.display(), "decoded ogg file");

    let store = connect_store(config).await?;
    let session_id = store.create_voice_session("local", "transcribe").await?;
    let stream_id = StreamId::new(uuid::Uuid::now_v7().to_string());
    let stream = store.create_voice_stream(&stream_id, &session_id, 1, "local-file", 0, 0).await?;

    let cancellation = CancellationToken::new();
    let session_config = jamie_asr::SessionConfig {
        endpoint: config.asr.endpoint.clone(),
        language: config.asr.language.clone(),
        max_delay: 0.8,
        punctuation_enabled: true,
    };
    let (asr_handle, mut hyp_rx) = jamie_asr::spawn(session_config, cancellation.child_token());
    let recognition_session_id =
        store.create_recognition_session(&stream.id, &config.asr.language, 0).await?;

    let mut sample_idx = 0u32;
    for (sequence, payload) in packets.into_iter().enumerate() {
        store.insert_voice_packet(&stream, sequence as u16, sample_idx, payload.clone()).await?;
        if asr_handle.send_audio(payload).is_err() {
            break;
        }
        sample_idx += 960;
    }
    asr_handle.close().await;

    while let Some(hypothesis) = hyp_rx.recv().await {
        let (segment_id, _version) =
            jamie_transcript::apply_hypothesis(&store, &recognition_session_id, &hypothesis).await?;
        let segment = store.get_segment_with_words(&segment_id).await?;
        let rendered = render_segment(&segment, DEFAULT_CONFIDENCE_FLOOR);
        let text: String = rendered.words.iter().map(|w| w.content.as_str()).collect::<Vec<_>>().join(" ");
        println!("{text}");
    }

    Ok(())
}

/// Pulls the raw Opus packets out of an Ogg container, discarding the
/// `OpusHead`/`OpusTags` header packets.
fn demux_ogg_opus_packets(bytes: &[u8]) -> Result<Vec<Vec<u8>>> {
    let mut reader = ogg::PacketReader::new(std::io::Cursor::new(bytes));
    let mut packets = Vec::new();
    loop {
        match reader.read_packet() {
            Ok(Some(packet)) => {
                let is_header = packet.data.len() >= 8
                    && (&packet.data[0..8] == b"OpusHead" || &packet.data[0..8] == b"OpusTags");
                if !is_header {
                    packets.push(packet.data);
                }
            },
            Ok(None) => break,
            Err(error) => return Err(JamieError::Protocol(format!("malformed ogg stream: {error}"))),
        }
    }
    Ok(packets)
}

async fn run_stream_tail(config: &Config, stream_id: &str) -> Result<()> {
    let store = connect_store(config).await?;
    let stream_id = StreamId::new(stream_id);

    let mut known_sessions: HashSet<RecognitionSessionId> =
        store.get_recognition_sessions_for_stream(&stream_id).await?.into_iter().collect();

    for segment in store.get_transcript_for_stream(&stream_id).await? {
        print_rendered(&segment);
    }

    let mut subscription = store.subscribe_transcript_changes();
    while let Some(jamie_core::model::Notification::TranscriptChanged { segment_id, session_id, .. }) =
        subscription.recv().await
    {
        if !known_sessions.contains(&session_id) {
            known_sessions = store.get_recognition_sessions_for_stream(&stream_id).await?.into_iter().collect();
            if !known_sessions.contains(&session_id) {
                continue;
            }
        }
        let segment = store.get_segment_with_words(&segment_id).await?;
        print_rendered(&segment);
    }

    Ok(())
}

fn print_rendered(segment: &jamie_store::SegmentWithWords) {
    let rendered = render_segment(segment, DEFAULT_CONFIDENCE_FLOOR);
    let text: String = rendered.words.iter().map(|w| w.content.as_str()).collect::<Vec<_>>().join(" ");
    println!("[{}{}] {text}", segment.id, if rendered.is_final { "" } else { "…" });
}

async fn run_summarize(config: &Config, session_id: &str) -> Result<()> {
    if config.llm.api_key.is_empty() {
        return Err(JamieError::Config("LLM_API_KEY is not set".to_string()));
    }

    let store = connect_store(config).await?;
    let session_id = SessionId::new(session_id);
    let streams = store.list_voice_streams(&session_id).await?;

    let mut transcript = String::new();
    for stream in &streams {
        for segment in store.get_transcript_for_stream(&stream.id).await? {
            let rendered = render_segment(&segment, DEFAULT_CONFIDENCE_FLOOR);
            for word in rendered.words {
                transcript.push_str(&word.content);
                transcript.push(' ');
            }
        }
    }

    tracing::info!(char_count = transcript.len(), "assembled session transcript for summarization");
    tracing::error!(
        "the large-language-model summarizer is an external collaborator named only by its \
         interface (llm.api_key); this binary does not implement a transport to call it"
    );
    println!("{}", transcript.trim());
    Err(JamieError::Config("no LLM summarizer transport is linked into this binary".to_string()))
}

async fn run_generateogg(config: &Config, stream_id: &str, out: Option<&PathBuf>) -> Result<()> {
    let store = connect_store(config).await?;
    let stream_id = StreamId::new(stream_id);
    let stream = store
        .get_voice_stream(&stream_id)
        .await?
        .ok_or_else(|| JamieError::NotFound(format!("voice stream {stream_id}")))?;

    let packets = store.get_packets_in_range(&stream_id, stream.sample_idx_offset, u32::MAX).await?;
    let end_sample = packets.last().map_or(stream.sample_idx_offset, |p| p.sample_idx + 960);
    let bytes = jamie_audio::build_slice(&store, &stream_id, stream.sample_idx_offset, end_sample).await?;

    match out {
        Some(path) => {
            tokio::fs::write(path, &bytes)
                .await
                .map_err(|e| JamieError::Protocol(format!("failed to write {}: {e}", path.display())))?;
        },
        None => {
            use std::io::Write as _;
            std::io::stdout()
                .write_all(&bytes)
                .map_err(|e| JamieError::Protocol(format!("failed to write to stdout: {e}")))?;
        },
    }
    Ok(())
}

async fn run_list_streams(config: &Config) -> Result<()> {
    let store = connect_store(config).await?;
    let streams: Vec<VoiceStream> = store.list_all_voice_streams().await?;
    let json = serde_json::to_string_pretty(&streams)
        .map_err(|e| JamieError::Protocol(format!("failed to serialize streams: {e}")))?;
    println!("{json}");
    Ok(())
}

async fn run_http(config: &Config, port: Option<u16>) -> Result<()> {
    let store = Arc::new(connect_store(config).await?);
    let port = port.unwrap_or(config.server.http_port);
    server::start_server(store, port).await
}

async fn handle_serve_subcommand(config_path: &str, init_logging: LogInitFn, command: &Commands) -> ! {
    let load_result = match config::load(config_path) {
        Ok(result) => result,
        Err(error) => {
            eprintln!("invalid configuration: {error}");
            std::process::exit(2);
        },
    };
    let config = load_result.config;

    let _guard = match init_logging(&config.log, &config.telemetry) {
        Ok(guard) => guard,
        Err(error) => {
            eprintln!("failed to initialize logging: {error}");
            std::process::exit(1);
        },
    };

    if let Some(missing) = &load_result.file_missing {
        tracing::warn!(path = %missing, "config file not found; using defaults and environment overrides");
    }

    let _meter_provider = init_telemetry_if_enabled(&config);
    log_startup_info(&config);

    let result = match command {
        Commands::Discord => run_discord(&config).await,
        Commands::Transcribe { file } => run_transcribe(&config, file).await,
        Commands::Stream { stream_id } => run_stream_tail(&config, stream_id).await,
        Commands::Summarize { session_id } => run_summarize(&config, session_id).await,
        Commands::Generateogg { stream_id, out } => run_generateogg(&config, stream_id, out.as_ref()).await,
        Commands::ListStreams => run_list_streams(&config).await,
        Commands::Http { port } => run_http(&config, *port).await,
    };

    match result {
        Ok(()) => std::process::exit(0),
        Err(error) => {
            tracing::error!(%error, "command failed");
            std::process::exit(1);
        },
    }
}

/// Dispatches `cli.command` (defaulting to `Http` with the configured
/// port), loading config, initializing logging, and exiting with the
/// process's contract: 0 success, 1 runtime error, 2 invalid configuration.
pub async fn handle_command(cli: &Cli, init_logging: LogInitFn) -> ! {
    let command = cli.command.clone().unwrap_or(Commands::Http { port: None });
    handle_serve_subcommand(&cli.config, init_logging, &command).await
}
