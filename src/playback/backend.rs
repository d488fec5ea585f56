// Rodio-backed preview playback
// Previews are short remote clips, so the whole file is downloaded before
// decoding - no streaming machinery needed. A dedicated OS thread owns the
// output stream because rodio's OutputStream cannot cross threads.

use rodio::{Decoder, OutputStream, Sink};
use std::io::Cursor;
use std::sync::mpsc as std_mpsc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::BackendCommand;

/// How often the audio thread checks whether the sink drained.
const ENDED_POLL_INTERVAL: Duration = Duration::from_millis(200);

#[derive(Debug, Clone)]
pub enum PlayerEvent {
    TrackStarted,
    /// The current clip played to completion. This is the sequencer's only
    /// advance trigger.
    TrackEnded,
    /// Download or decode failure. Never fatal; the shell just logs it.
    Error(String),
}

/// Handle to the spawned backend: commands in, events out.
pub struct BackendHandle {
    pub commands: mpsc::UnboundedSender<BackendCommand>,
    pub events: mpsc::UnboundedReceiver<PlayerEvent>,
}

enum AudioCmd {
    Play(Vec<u8>),
    Stop,
}

/// Spawns the download task and the audio thread, returning their handle.
/// Both ends shut down when the command sender is dropped.
pub fn spawn(http: reqwest::Client, volume: f32) -> BackendHandle {
    let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel::<BackendCommand>();
    let (event_tx, event_rx) = mpsc::unbounded_channel::<PlayerEvent>();
    let (audio_tx, audio_rx) = std_mpsc::channel::<AudioCmd>();

    run_audio_thread(audio_rx, event_tx.clone(), volume);

    // Download task: resolves the current source into bytes on each Play.
    tokio::spawn(async move {
        let mut source: Option<String> = None;

        while let Some(command) = cmd_rx.recv().await {
            match command {
                BackendCommand::SetSource(url) => {
                    debug!("Preview source set: {}", url);
                    source = Some(url);
                }
                BackendCommand::Play => {
                    let Some(url) = source.clone() else {
                        warn!("Play requested with no source set");
                        continue;
                    };
                    match fetch_preview(&http, &url).await {
                        Ok(bytes) => {
                            if audio_tx.send(AudioCmd::Play(bytes)).is_err() {
                                break; // audio thread gone
                            }
                        }
                        Err(e) => {
                            warn!("Preview download failed: {}", e);
                            let _ = event_tx.send(PlayerEvent::Error(e.to_string()));
                        }
                    }
                }
                BackendCommand::Stop => {
                    if audio_tx.send(AudioCmd::Stop).is_err() {
                        break;
                    }
                }
            }
        }
    });

    BackendHandle {
        commands: cmd_tx,
        events: event_rx,
    }
}

async fn fetch_preview(http: &reqwest::Client, url: &str) -> Result<Vec<u8>, reqwest::Error> {
    let response = http.get(url).send().await?.error_for_status()?;
    let bytes = response.bytes().await?;
    debug!("Downloaded preview: {} bytes", bytes.len());
    Ok(bytes.to_vec())
}

fn run_audio_thread(
    audio_rx: std_mpsc::Receiver<AudioCmd>,
    events: mpsc::UnboundedSender<PlayerEvent>,
    volume: f32,
) {
    std::thread::spawn(move || {
        // Keep _stream alive for the lifetime of the thread
        let (_stream, stream_handle) = match OutputStream::try_default() {
            Ok(pair) => pair,
            Err(e) => {
                warn!("No audio output device: {}", e);
                let _ = events.send(PlayerEvent::Error(format!("no audio output: {}", e)));
                return;
            }
        };

        let mut sink: Option<Sink> = None;

        loop {
            match audio_rx.recv_timeout(ENDED_POLL_INTERVAL) {
                Ok(AudioCmd::Play(bytes)) => {
                    // Replace whatever was playing; one track at a time
                    if let Some(old) = sink.take() {
                        old.stop();
                    }

                    let new_sink = match Sink::try_new(&stream_handle) {
                        Ok(s) => s,
                        Err(e) => {
                            let _ = events.send(PlayerEvent::Error(e.to_string()));
                            continue;
                        }
                    };

                    match Decoder::new(Cursor::new(bytes)) {
                        Ok(decoded) => {
                            new_sink.set_volume(volume);
                            new_sink.append(decoded);
                            sink = Some(new_sink);
                            let _ = events.send(PlayerEvent::TrackStarted);
                        }
                        Err(e) => {
                            warn!("Preview decode failed: {}", e);
                            let _ = events.send(PlayerEvent::Error(e.to_string()));
                        }
                    }
                }
                Ok(AudioCmd::Stop) => {
                    if let Some(s) = sink.take() {
                        s.stop();
                    }
                }
                Err(std_mpsc::RecvTimeoutError::Timeout) => {
                    // A drained sink means the clip finished on its own
                    let finished = sink.as_ref().map(|s| s.empty()).unwrap_or(false);
                    if finished {
                        sink = None;
                        let _ = events.send(PlayerEvent::TrackEnded);
                    }
                }
                Err(std_mpsc::RecvTimeoutError::Disconnected) => break,
            }
        }
    });
}
