// Manual playback smoke test - plays a single preview URL end to end.
// Usage: preview_test <preview-url>

use auris::playback::backend::{self, PlayerEvent};
use auris::playback::BackendCommand;
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let url = std::env::args()
        .nth(1)
        .ok_or_else(|| anyhow::anyhow!("usage: preview_test <preview-url>"))?;

    println!("Auris preview playback test");
    println!("===========================");
    println!("Source: {}", url);

    let http = reqwest::Client::new();
    let mut handle = backend::spawn(http, 0.7);

    let _ = handle.commands.send(BackendCommand::SetSource(url));
    let _ = handle.commands.send(BackendCommand::Play);

    // Previews are ~30 second clips; wait for the ended event or give up
    let outcome = tokio::time::timeout(Duration::from_secs(60), async {
        while let Some(event) = handle.events.recv().await {
            match event {
                PlayerEvent::TrackStarted => println!("Playing..."),
                PlayerEvent::TrackEnded => {
                    println!("Finished cleanly");
                    return true;
                }
                PlayerEvent::Error(e) => {
                    println!("Playback error: {}", e);
                    return false;
                }
            }
        }
        false
    })
    .await;

    match outcome {
        Ok(true) => println!("Preview playback test passed"),
        Ok(false) => println!("Preview playback test failed"),
        Err(_) => println!("Timed out waiting for playback to finish"),
    }

    Ok(())
}
