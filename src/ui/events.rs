use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::api::{ApiError, RecommendResponse};
use crate::playback::backend::PlayerEvent;

/// Everything that can wake the app loop: key presses, the async completion
/// of a recommendation request, and audio backend notifications. One channel,
/// one logical thread of state transitions.
#[derive(Debug)]
pub enum AppEvent {
    // UI events
    Quit,
    Tick,
    Render,

    // Query input
    Input(char),
    Backspace,
    Submit,

    // Playback controls
    PlayPreviews,
    StopPlayback,

    // Async completions
    RecommendFinished {
        query: String,
        result: Result<RecommendResponse, ApiError>,
    },
    Player(PlayerEvent),
}

pub struct EventHandler {
    event_sender: mpsc::UnboundedSender<AppEvent>,
    event_receiver: mpsc::UnboundedReceiver<AppEvent>,
}

impl EventHandler {
    pub fn new() -> Self {
        let (event_sender, event_receiver) = mpsc::unbounded_channel();

        Self {
            event_sender,
            event_receiver,
        }
    }

    pub fn sender(&self) -> mpsc::UnboundedSender<AppEvent> {
        self.event_sender.clone()
    }

    pub async fn next_event(&mut self) -> Option<AppEvent> {
        self.event_receiver.recv().await
    }
}

impl Default for EventHandler {
    fn default() -> Self {
        Self::new()
    }
}

/// Reads terminal events and forwards them as `AppEvent`s until the receiving
/// side goes away.
pub async fn listen_for_keys(sender: mpsc::UnboundedSender<AppEvent>) {
    loop {
        let polled = event::poll(Duration::from_millis(50)).unwrap_or(false);
        if polled {
            match event::read() {
                Ok(Event::Key(key)) => {
                    if key.kind == KeyEventKind::Press {
                        if let Some(app_event) = key_to_app_event(key) {
                            if sender.send(app_event).is_err() {
                                return;
                            }
                        }
                    }
                }
                Ok(Event::Resize(_, _)) => {
                    let _ = sender.send(AppEvent::Render);
                }
                _ => {}
            }
        }

        // Periodic tick keeps the UI refreshing while idle
        if sender.send(AppEvent::Tick).is_err() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

fn key_to_app_event(key: KeyEvent) -> Option<AppEvent> {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

    match key.code {
        // Quit
        KeyCode::Esc => Some(AppEvent::Quit),
        KeyCode::Char('c') if ctrl => Some(AppEvent::Quit),

        // Playback controls
        KeyCode::Char('p') if ctrl => Some(AppEvent::PlayPreviews),
        KeyCode::Char('s') if ctrl => Some(AppEvent::StopPlayback),

        // Query input
        KeyCode::Enter => Some(AppEvent::Submit),
        KeyCode::Backspace => Some(AppEvent::Backspace),
        KeyCode::Char(c) if !ctrl => Some(AppEvent::Input(c)),

        _ => None,
    }
}
