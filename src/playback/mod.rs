// Preview playback sequencer
// Walks a queue of recommended songs in order, advancing when the audio
// backend reports the current clip finished. The backend itself lives behind
// a command channel so the state machine stays independent of rodio.

#[cfg(feature = "audio")]
pub mod backend;

use tokio::sync::mpsc;
use tracing::debug;

use crate::api::Song;

/// Instructions for the single audio channel. The source is always replaced
/// before a `Play`, so only one track can ever be audible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCommand {
    SetSource(String),
    Play,
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequencerState {
    Idle,
    /// Currently playing `queue[index]`. The index is always valid.
    Playing(usize),
}

/// State machine over the recommended-song queue.
///
/// Songs without a preview source are an expected condition, not an error:
/// `play` on such a song is a no-op, and auto-advance onto one parks the
/// sequencer back at `Idle` rather than pretending a silent track is playing.
pub struct PreviewSequencer {
    queue: Vec<Song>,
    state: SequencerState,
    commands: mpsc::UnboundedSender<BackendCommand>,
}

impl PreviewSequencer {
    pub fn new(commands: mpsc::UnboundedSender<BackendCommand>) -> Self {
        Self {
            queue: Vec::new(),
            state: SequencerState::Idle,
            commands,
        }
    }

    /// Replaces the queue for a fresh result set. Always resets to `Idle`;
    /// playback starts only on an explicit `play*` call.
    pub fn load_queue(&mut self, songs: Vec<Song>) {
        debug!("Loading queue with {} songs", songs.len());
        self.send(BackendCommand::Stop);
        self.queue = songs;
        self.state = SequencerState::Idle;
    }

    /// Starts playback of `queue[index]` if that song has a preview source.
    /// Otherwise nothing happens - no transition, no error.
    pub fn play(&mut self, index: usize) {
        let Some(url) = self.preview_url_at(index) else {
            debug!("play({}) ignored: no preview source", index);
            return;
        };
        self.start(index, url);
    }

    /// `play(0)` on a non-empty queue; no-op on an empty one.
    pub fn play_from_start(&mut self) {
        if self.queue.is_empty() {
            return;
        }
        self.play(0);
    }

    /// The single advance trigger, driven by the backend's "ended" event.
    /// Moves to the next track while one exists and is playable; otherwise
    /// the queue is exhausted (or blocked on a previewless song) and the
    /// sequencer goes `Idle`.
    pub fn on_track_ended(&mut self) {
        let SequencerState::Playing(current) = self.state else {
            return;
        };

        let next = current + 1;
        match self.preview_url_at(next) {
            Some(url) => self.start(next, url),
            None => {
                debug!("Queue finished after track {}", current);
                self.state = SequencerState::Idle;
            }
        }
    }

    /// Safe from any state, including when already idle.
    pub fn stop(&mut self) {
        self.send(BackendCommand::Stop);
        self.state = SequencerState::Idle;
    }

    pub fn state(&self) -> SequencerState {
        self.state
    }

    pub fn current_index(&self) -> Option<usize> {
        match self.state {
            SequencerState::Playing(index) => Some(index),
            SequencerState::Idle => None,
        }
    }

    pub fn queue(&self) -> &[Song] {
        &self.queue
    }

    fn start(&mut self, index: usize, url: String) {
        debug!("Starting preview {} of {}", index + 1, self.queue.len());
        self.send(BackendCommand::SetSource(url));
        self.send(BackendCommand::Play);
        self.state = SequencerState::Playing(index);
    }

    fn preview_url_at(&self, index: usize) -> Option<String> {
        self.queue
            .get(index)
            .filter(|song| song.has_preview())
            .and_then(|song| song.preview_url.clone())
    }

    fn send(&self, command: BackendCommand) {
        // Backend gone means we are shutting down; nothing useful to do.
        let _ = self.commands.send(command);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn song(title: &str, preview: Option<&str>) -> Song {
        Song {
            title: title.to_string(),
            artist: "Test Artist".to_string(),
            similarity: 0.5,
            deezer_url: None,
            preview_url: preview.map(str::to_string),
            album_image: None,
            youtube_url: None,
            youtube_embed: None,
        }
    }

    fn sequencer() -> (PreviewSequencer, mpsc::UnboundedReceiver<BackendCommand>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (PreviewSequencer::new(tx), rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<BackendCommand>) -> Vec<BackendCommand> {
        let mut commands = Vec::new();
        while let Ok(cmd) = rx.try_recv() {
            commands.push(cmd);
        }
        commands
    }

    #[test]
    fn plays_whole_queue_then_goes_idle() {
        let (mut seq, _rx) = sequencer();
        seq.load_queue(vec![
            song("a", Some("http://p/a.mp3")),
            song("b", Some("http://p/b.mp3")),
            song("c", Some("http://p/c.mp3")),
        ]);

        seq.play_from_start();
        assert_eq!(seq.state(), SequencerState::Playing(0));

        seq.on_track_ended();
        assert_eq!(seq.state(), SequencerState::Playing(1));

        seq.on_track_ended();
        assert_eq!(seq.state(), SequencerState::Playing(2));

        seq.on_track_ended();
        assert_eq!(seq.state(), SequencerState::Idle);
    }

    #[test]
    fn play_emits_set_source_then_play() {
        let (mut seq, mut rx) = sequencer();
        seq.load_queue(vec![song("a", Some("http://p/a.mp3"))]);
        drain(&mut rx);

        seq.play(0);
        assert_eq!(
            drain(&mut rx),
            vec![
                BackendCommand::SetSource("http://p/a.mp3".to_string()),
                BackendCommand::Play,
            ]
        );
    }

    #[test]
    fn play_without_preview_is_a_no_op() {
        let (mut seq, mut rx) = sequencer();
        seq.load_queue(vec![song("a", Some("http://p/a.mp3")), song("b", None)]);
        seq.play(0);
        drain(&mut rx);

        seq.play(1);
        assert_eq!(seq.state(), SequencerState::Playing(0));
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn play_out_of_bounds_is_a_no_op() {
        let (mut seq, _rx) = sequencer();
        seq.load_queue(vec![song("a", Some("http://p/a.mp3"))]);

        seq.play(5);
        assert_eq!(seq.state(), SequencerState::Idle);
    }

    #[test]
    fn advance_onto_previewless_track_goes_idle() {
        let (mut seq, _rx) = sequencer();
        seq.load_queue(vec![
            song("a", Some("http://p/a.mp3")),
            song("b", None),
            song("c", Some("http://p/c.mp3")),
        ]);

        seq.play_from_start();
        seq.on_track_ended();
        // No skipping forward past "b"; the channel is silent, so we are idle
        assert_eq!(seq.state(), SequencerState::Idle);
    }

    #[test]
    fn play_from_start_on_empty_queue_is_a_no_op() {
        let (mut seq, mut rx) = sequencer();
        seq.play_from_start();
        assert_eq!(seq.state(), SequencerState::Idle);
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn load_queue_resets_state_and_stops_backend() {
        let (mut seq, mut rx) = sequencer();
        seq.load_queue(vec![song("a", Some("http://p/a.mp3"))]);
        seq.play_from_start();
        drain(&mut rx);

        seq.load_queue(vec![song("b", Some("http://p/b.mp3"))]);
        assert_eq!(seq.state(), SequencerState::Idle);
        assert_eq!(seq.current_index(), None);
        assert_eq!(drain(&mut rx), vec![BackendCommand::Stop]);
    }

    #[test]
    fn stop_is_idempotent() {
        let (mut seq, _rx) = sequencer();
        seq.stop();
        seq.stop();
        assert_eq!(seq.state(), SequencerState::Idle);
    }

    #[test]
    fn ended_while_idle_is_ignored() {
        let (mut seq, mut rx) = sequencer();
        seq.load_queue(vec![song("a", Some("http://p/a.mp3"))]);
        drain(&mut rx);

        seq.on_track_ended();
        assert_eq!(seq.state(), SequencerState::Idle);
        assert!(drain(&mut rx).is_empty());
    }
}
