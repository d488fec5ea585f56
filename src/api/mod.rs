// Recommendation service client
// One endpoint matters: POST /recommend with the user's mood text.
// The service owns the model and the song enrichment; we just carry the payload.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("could not reach recommendation service: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("recommendation service error ({status}): {message}")]
    Server { status: u16, message: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct RecommendRequest {
    pub text: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecommendResponse {
    #[serde(default)]
    pub model_version: Option<String>,
    pub predicted_emotion: String,
    /// Classifier confidence in [0, 1]; older service builds omit it.
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub songs: Vec<Song>,
}

/// A recommended song as returned by the service. Immutable once received;
/// every enrichment field is best-effort and may be null.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Song {
    pub title: String,
    pub artist: String,
    /// Normalized similarity to the query, in [0, 1].
    pub similarity: f64,
    #[serde(default)]
    pub deezer_url: Option<String>,
    #[serde(default)]
    pub preview_url: Option<String>,
    #[serde(default)]
    pub album_image: Option<String>,
    #[serde(default)]
    pub youtube_url: Option<String>,
    #[serde(default)]
    pub youtube_embed: Option<String>,
}

impl Song {
    /// Whether this song carries a playable preview clip.
    pub fn has_preview(&self) -> bool {
        self.preview_url
            .as_deref()
            .map(|url| !url.is_empty())
            .unwrap_or(false)
    }

    pub fn display_line(&self) -> String {
        format!(
            "{} - {} ({:.1}%)",
            self.title,
            self.artist,
            self.similarity * 100.0
        )
    }
}

// Failure bodies look like {"error": "..."}
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Clone)]
pub struct RecommendClient {
    http: reqwest::Client,
    base_url: String,
}

impl RecommendClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { http, base_url })
    }

    /// Clients created from one builder share the connection pool.
    pub fn http(&self) -> reqwest::Client {
        self.http.clone()
    }

    pub async fn recommend(&self, text: &str) -> Result<RecommendResponse, ApiError> {
        let url = format!("{}/recommend", self.base_url);
        debug!("POST {} ({} chars of mood text)", url, text.len());

        let response = self
            .http
            .post(&url)
            .json(&RecommendRequest {
                text: text.to_string(),
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = match response.json::<ErrorBody>().await {
                Ok(body) => body.error,
                Err(_) => status
                    .canonical_reason()
                    .unwrap_or("unknown error")
                    .to_string(),
            };
            return Err(ApiError::Server {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json::<RecommendResponse>().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Shape of a real service payload, trimmed
    const SAMPLE: &str = r#"{
        "model_version": "1.5.0",
        "predicted_emotion": "joy",
        "confidence": 0.83,
        "songs": [
            {
                "title": "Walking on Sunshine",
                "artist": "Katrina & The Waves",
                "similarity": 0.91,
                "deezer_url": "https://www.deezer.com/track/1",
                "preview_url": "https://cdn.example/preview1.mp3",
                "album_image": "https://cdn.example/cover1.jpg",
                "youtube_url": null,
                "youtube_embed": null
            },
            {
                "title": "Good Vibrations",
                "artist": "The Beach Boys",
                "similarity": 0.87,
                "deezer_url": null,
                "preview_url": null,
                "album_image": null,
                "youtube_url": "https://www.youtube.com/watch?v=abcdefghijk",
                "youtube_embed": "https://www.youtube.com/embed/abcdefghijk"
            }
        ]
    }"#;

    #[test]
    fn deserializes_full_response() {
        let response: RecommendResponse = serde_json::from_str(SAMPLE).unwrap();
        assert_eq!(response.predicted_emotion, "joy");
        assert_eq!(response.confidence, Some(0.83));
        assert_eq!(response.songs.len(), 2);
        assert!(response.songs[0].has_preview());
        assert!(!response.songs[1].has_preview());
    }

    #[test]
    fn tolerates_missing_optional_fields() {
        let minimal = r#"{
            "predicted_emotion": "neutral",
            "songs": [{"title": "A", "artist": "B", "similarity": 0.5}]
        }"#;
        let response: RecommendResponse = serde_json::from_str(minimal).unwrap();
        assert_eq!(response.confidence, None);
        assert_eq!(response.model_version, None);
        assert_eq!(response.songs[0].preview_url, None);
    }

    #[test]
    fn empty_preview_url_counts_as_missing() {
        let song = Song {
            title: "X".to_string(),
            artist: "Y".to_string(),
            similarity: 0.1,
            deezer_url: None,
            preview_url: Some(String::new()),
            album_image: None,
            youtube_url: None,
            youtube_embed: None,
        };
        assert!(!song.has_preview());
    }
}
