use super::{events, AppEvent, EventHandler, TerminalManager};
use crate::api::{RecommendClient, Song};
use crate::config::Config;
use crate::history::{EmotionCount, FileHistoryStore, HistoryLedger};
use crate::playback::backend::{self, PlayerEvent};
use crate::playback::{PreviewSequencer, SequencerState};
use anyhow::Result;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    widgets::{BarChart, Block, Borders, Clear, Gauge, List, ListItem, Paragraph, Wrap},
    Frame,
};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

pub struct App {
    config: Config,
    terminal: TerminalManager,
    event_handler: EventHandler,
    client: RecommendClient,
    ledger: HistoryLedger<FileHistoryStore>,
    sequencer: PreviewSequencer,

    // Transient query state, cleared on every new submission
    pub input: String,
    pub emotion: Option<String>,
    pub confidence: Option<f64>,
    pub songs: Vec<Song>,
    pub loading: bool,
    pub alert: Option<String>,
    pub should_quit: bool,
}

impl App {
    pub fn new(config: Config) -> Result<Self> {
        let terminal = TerminalManager::new()?;
        let event_handler = EventHandler::new();

        let client = RecommendClient::new(
            config.api.base_url.clone(),
            Duration::from_secs(config.api.request_timeout_secs),
        )?;

        // History survives restarts; a broken file just means an empty chart
        let ledger = HistoryLedger::load(FileHistoryStore::new(&config.data_dir));

        // Audio backend shares the client's connection pool for downloads
        let handle = backend::spawn(client.http(), config.audio.volume);
        let sequencer = PreviewSequencer::new(handle.commands);
        Self::forward_player_events(handle.events, event_handler.sender());

        Ok(Self {
            config,
            terminal,
            event_handler,
            client,
            ledger,
            sequencer,
            input: String::new(),
            emotion: None,
            confidence: None,
            songs: Vec::new(),
            loading: false,
            alert: None,
            should_quit: false,
        })
    }

    fn forward_player_events(
        mut events: mpsc::UnboundedReceiver<PlayerEvent>,
        sender: mpsc::UnboundedSender<AppEvent>,
    ) {
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                if sender.send(AppEvent::Player(event)).is_err() {
                    break;
                }
            }
        });
    }

    pub async fn run(&mut self) -> Result<()> {
        tokio::spawn(events::listen_for_keys(self.event_handler.sender()));

        while !self.should_quit {
            // Snapshot state for the render closure
            let input = self.input.clone();
            let loading = self.loading;
            let emotion = self.emotion.clone();
            let confidence = self.confidence;
            let songs = self.songs.clone();
            let current_index = self.sequencer.current_index();
            let playing = matches!(self.sequencer.state(), SequencerState::Playing(_));
            let counts = self.ledger.aggregate();
            let alert = self.alert.clone();
            let show_confidence = self.config.ui.show_confidence;
            let chart_height = self.config.ui.chart_height;

            self.terminal.draw(|f| {
                Self::render_ui(
                    f,
                    &input,
                    loading,
                    emotion.as_deref(),
                    confidence,
                    &songs,
                    current_index,
                    playing,
                    &counts,
                    alert.as_deref(),
                    show_confidence,
                    chart_height,
                );
            })?;

            if let Some(event) = self.event_handler.next_event().await {
                self.handle_event(event);
            }
        }

        Ok(())
    }

    fn handle_event(&mut self, event: AppEvent) {
        // A visible alert blocks interaction until acknowledged by a key
        // press. Async completions still land; a slow response resolving
        // behind the popup is applied, not dropped.
        if self.alert.is_some() {
            match &event {
                AppEvent::Quit => {
                    self.should_quit = true;
                    return;
                }
                AppEvent::Tick
                | AppEvent::Render
                | AppEvent::RecommendFinished { .. }
                | AppEvent::Player(_) => {}
                _ => {
                    self.alert = None;
                    return;
                }
            }
        }

        match event {
            AppEvent::Quit => {
                self.should_quit = true;
            }
            AppEvent::Input(c) => {
                self.input.push(c);
            }
            AppEvent::Backspace => {
                self.input.pop();
            }
            AppEvent::Submit => {
                self.submit_query();
            }
            AppEvent::PlayPreviews => {
                self.sequencer.play_from_start();
            }
            AppEvent::StopPlayback => {
                self.sequencer.stop();
            }
            AppEvent::RecommendFinished { query, result } => match result {
                Ok(response) => {
                    self.loading = false;
                    self.alert = None;
                    self.ledger.record(&query, &response.predicted_emotion);
                    self.emotion = Some(response.predicted_emotion);
                    self.confidence = response.confidence;
                    self.songs = response.songs.clone();
                    self.sequencer.load_queue(response.songs);
                }
                Err(e) => {
                    warn!("Recommendation request failed: {}", e);
                    self.loading = false;
                    self.alert = Some(format!("{}", e));
                }
            },
            AppEvent::Player(PlayerEvent::TrackEnded) => {
                self.sequencer.on_track_ended();
            }
            AppEvent::Player(PlayerEvent::TrackStarted) => {
                debug!("Preview started");
            }
            AppEvent::Player(PlayerEvent::Error(e)) => {
                // Missing/broken previews are expected; never surface them
                warn!("Playback backend: {}", e);
            }
            AppEvent::Tick | AppEvent::Render => {}
        }
    }

    fn submit_query(&mut self) {
        let text = self.input.trim().to_string();
        if text.is_empty() {
            return;
        }

        // Clear stale result state before issuing the request. There is no
        // cancellation token; if an older request resolves later, its write
        // simply lands last.
        self.emotion = None;
        self.confidence = None;
        self.songs.clear();
        self.sequencer.load_queue(Vec::new());
        self.loading = true;

        let client = self.client.clone();
        let sender = self.event_handler.sender();
        tokio::spawn(async move {
            let result = client.recommend(&text).await;
            let _ = sender.send(AppEvent::RecommendFinished {
                query: text,
                result,
            });
        });
    }

    #[allow(clippy::too_many_arguments)]
    fn render_ui(
        f: &mut Frame,
        input: &str,
        loading: bool,
        emotion: Option<&str>,
        confidence: Option<f64>,
        songs: &[Song],
        current_index: Option<usize>,
        playing: bool,
        counts: &[EmotionCount],
        alert: Option<&str>,
        show_confidence: bool,
        chart_height: u16,
    ) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // Header
                Constraint::Length(3), // Query input
                Constraint::Min(8),    // Results
                Constraint::Length(3), // Status bar
            ])
            .split(f.area());

        Self::render_header(f, chunks[0]);
        Self::render_input(f, chunks[1], input, loading);
        Self::render_results(
            f,
            chunks[2],
            loading,
            emotion,
            confidence,
            songs,
            current_index,
            counts,
            show_confidence,
            chart_height,
        );
        Self::render_status_bar(f, chunks[3], current_index, songs, playing);

        if let Some(message) = alert {
            Self::render_alert(f, message);
        }
    }

    fn render_header(f: &mut Frame, area: Rect) {
        let title = Paragraph::new("♫ Auris - Music Intelligence")
            .style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
            .block(Block::default().borders(Borders::ALL));

        f.render_widget(title, area);
    }

    fn render_input(f: &mut Frame, area: Rect, input: &str, loading: bool) {
        let title = if loading {
            "How are you feeling? (analyzing...)"
        } else {
            "How are you feeling?"
        };

        let text = format!("{}_", input);
        let widget = Paragraph::new(text)
            .block(Block::default().borders(Borders::ALL).title(title));

        f.render_widget(widget, area);
    }

    #[allow(clippy::too_many_arguments)]
    fn render_results(
        f: &mut Frame,
        area: Rect,
        loading: bool,
        emotion: Option<&str>,
        confidence: Option<f64>,
        songs: &[Song],
        current_index: Option<usize>,
        counts: &[EmotionCount],
        show_confidence: bool,
        chart_height: u16,
    ) {
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
            .split(area);

        Self::render_song_list(f, columns[0], loading, songs, current_index);

        let side = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(4),
                Constraint::Min(chart_height),
            ])
            .split(columns[1]);

        Self::render_emotion(f, side[0], emotion, confidence, show_confidence);
        Self::render_history_chart(f, side[1], counts);
    }

    fn render_song_list(
        f: &mut Frame,
        area: Rect,
        loading: bool,
        songs: &[Song],
        current_index: Option<usize>,
    ) {
        let block = Block::default().borders(Borders::ALL).title("Recommendations");

        if songs.is_empty() {
            let placeholder = if loading {
                "Analyzing your mood..."
            } else {
                "Your music will appear here."
            };
            let widget = Paragraph::new(placeholder)
                .style(Style::default().fg(Color::DarkGray))
                .alignment(Alignment::Center)
                .block(block);
            f.render_widget(widget, area);
            return;
        }

        let items: Vec<ListItem> = songs
            .iter()
            .enumerate()
            .map(|(i, song)| {
                let is_current = current_index == Some(i);
                let marker = if is_current {
                    "♪ "
                } else if song.has_preview() {
                    "  "
                } else {
                    "· " // no preview clip for this one
                };

                let content = format!("{}{}", marker, song.display_line());
                let style = if is_current {
                    Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
                } else if !song.has_preview() {
                    Style::default().fg(Color::DarkGray)
                } else {
                    Style::default()
                };

                ListItem::new(content).style(style)
            })
            .collect();

        f.render_widget(List::new(items).block(block), area);
    }

    fn render_emotion(
        f: &mut Frame,
        area: Rect,
        emotion: Option<&str>,
        confidence: Option<f64>,
        show_confidence: bool,
    ) {
        match (emotion, confidence) {
            (Some(label), Some(score)) if show_confidence => {
                let gauge = Gauge::default()
                    .block(
                        Block::default()
                            .borders(Borders::ALL)
                            .title(format!("Emotion: {}", label)),
                    )
                    .gauge_style(Style::default().fg(Color::Magenta))
                    .ratio(score.clamp(0.0, 1.0))
                    .label(format!("{:.1}% confidence", score * 100.0));
                f.render_widget(gauge, area);
            }
            (Some(label), _) => {
                let widget = Paragraph::new(label.to_string())
                    .style(Style::default().fg(Color::Magenta).add_modifier(Modifier::BOLD))
                    .block(Block::default().borders(Borders::ALL).title("Emotion"));
                f.render_widget(widget, area);
            }
            (None, _) => {
                let widget = Paragraph::new("-")
                    .style(Style::default().fg(Color::DarkGray))
                    .block(Block::default().borders(Borders::ALL).title("Emotion"));
                f.render_widget(widget, area);
            }
        }
    }

    fn render_history_chart(f: &mut Frame, area: Rect, counts: &[EmotionCount]) {
        let block = Block::default().borders(Borders::ALL).title("Emotion History");

        if counts.is_empty() {
            let widget = Paragraph::new("No history yet")
                .style(Style::default().fg(Color::DarkGray))
                .alignment(Alignment::Center)
                .block(block);
            f.render_widget(widget, area);
            return;
        }

        let data: Vec<(&str, u64)> = counts
            .iter()
            .map(|c| (c.label.as_str(), c.count))
            .collect();

        let chart = BarChart::default()
            .block(block)
            .data(&data)
            .bar_width(9)
            .bar_gap(1)
            .bar_style(Style::default().fg(Color::Indexed(99)))
            .value_style(Style::default().fg(Color::White).add_modifier(Modifier::BOLD));

        f.render_widget(chart, area);
    }

    fn render_status_bar(
        f: &mut Frame,
        area: Rect,
        current_index: Option<usize>,
        songs: &[Song],
        playing: bool,
    ) {
        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
            .split(area);

        let state_text = if playing {
            let position = current_index.map(|i| i + 1).unwrap_or(0);
            format!("▶ Preview {}/{}", position, songs.len())
        } else {
            "⏹ Idle".to_string()
        };

        let status = Paragraph::new(state_text)
            .block(Block::default().borders(Borders::ALL).title("Playback"));
        f.render_widget(status, chunks[0]);

        let hints = Paragraph::new("Enter: recommend | Ctrl+P: play previews | Ctrl+S: stop | Esc: quit")
            .style(Style::default().fg(Color::DarkGray))
            .block(Block::default().borders(Borders::ALL).title("Keys"));
        f.render_widget(hints, chunks[1]);
    }

    fn render_alert(f: &mut Frame, message: &str) {
        let area = Self::centered_rect(60, 20, f.area());

        let popup = Paragraph::new(format!("{}\n\nPress any key to continue", message))
            .style(Style::default().fg(Color::Red))
            .wrap(Wrap { trim: true })
            .alignment(Alignment::Center)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title("Request failed")
                    .style(Style::default().fg(Color::Red)),
            );

        f.render_widget(Clear, area);
        f.render_widget(popup, area);
    }

    fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
        let vertical = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Percentage((100 - percent_y) / 2),
                Constraint::Percentage(percent_y),
                Constraint::Percentage((100 - percent_y) / 2),
            ])
            .split(r);

        Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Percentage((100 - percent_x) / 2),
                Constraint::Percentage(percent_x),
                Constraint::Percentage((100 - percent_x) / 2),
            ])
            .split(vertical[1])[1]
    }
}
