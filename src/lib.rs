// Auris Library - Core modules for the recommendation client
// Modular design makes it easy to swap out components

pub mod api;      // talks to the recommendation service
pub mod config;   // settings and preferences
pub mod history;  // bounded query/emotion ledger + frequency aggregate
pub mod playback; // sequential preview playback

#[cfg(feature = "tui")]
pub mod ui;       // terminal interface

// Export the stuff other modules actually use
pub use api::{ApiError, RecommendClient, RecommendResponse, Song};
pub use config::Config;
pub use history::{EmotionCount, HistoryEntry, HistoryLedger};
pub use playback::{BackendCommand, PreviewSequencer, SequencerState};
