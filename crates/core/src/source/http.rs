//! HTTP playback source.
//!
//! Talks to the music service's REST API with a bearer token. Producing the
//! token (the OAuth dance) is the deployment's problem; this client only
//! spends it.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::{PlaybackSnapshot, PlaybackSource, RawAnalysis, SourceError, TrackInfo};

const DEFAULT_BASE_URL: &str = "https://api.spotify.com/v1";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

pub struct HttpSource {
    client: Client,
    base_url: String,
    token: String,
}

impl HttpSource {
    pub fn new(token: impl Into<String>) -> Result<Self, SourceError> {
        Self::with_base_url(token, DEFAULT_BASE_URL)
    }

    /// Point the client at a different API root. Used by tests and proxies.
    pub fn with_base_url(
        token: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, SourceError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| SourceError::Request(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    /// GET a JSON document. `None` means the service answered 204 (nothing
    /// playing).
    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>, SourceError> {
        let url = format!("{}{}", self.base_url, path);

        let res = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| SourceError::Request(e.to_string()))?;

        if res.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }

        if !res.status().is_success() {
            let status = res.status().as_u16();
            let message = res.text().await.unwrap_or_default();
            return Err(SourceError::Api { status, message });
        }

        let body = res
            .json::<T>()
            .await
            .map_err(|e| SourceError::Parse(e.to_string()))?;
        Ok(Some(body))
    }
}

#[async_trait]
impl PlaybackSource for HttpSource {
    async fn poll_currently_playing(&self) -> Result<Option<PlaybackSnapshot>, SourceError> {
        let playing: Option<WirePlayback> = self.get_json("/me/player/currently-playing").await?;

        let Some(playing) = playing else {
            return Ok(None);
        };
        let Some(item) = playing.item else {
            // Playing an ad or a local file; treat as idle.
            return Ok(None);
        };

        Ok(Some(PlaybackSnapshot {
            track_id: item.id,
            is_playing: playing.is_playing,
            progress: Duration::from_millis(playing.progress_ms.unwrap_or(0)),
        }))
    }

    async fn fetch_track(&self, track_id: &str) -> Result<TrackInfo, SourceError> {
        let track: Option<WireTrack> = self.get_json(&format!("/tracks/{track_id}")).await?;
        let track = track.ok_or_else(|| SourceError::Parse("empty track response".into()))?;

        Ok(TrackInfo {
            id: track.id,
            name: track.name,
            artist: track.artists.into_iter().next().map(|a| a.name),
            duration: Duration::from_millis(track.duration_ms),
        })
    }

    async fn fetch_analysis(&self, track_id: &str) -> Result<RawAnalysis, SourceError> {
        let analysis: Option<RawAnalysis> =
            self.get_json(&format!("/audio-analysis/{track_id}")).await?;
        analysis.ok_or_else(|| SourceError::Parse("empty analysis response".into()))
    }
}

#[derive(Debug, Deserialize)]
struct WirePlayback {
    is_playing: bool,
    progress_ms: Option<u64>,
    item: Option<WireTrack>,
}

#[derive(Debug, Deserialize)]
struct WireTrack {
    id: String,
    name: String,
    duration_ms: u64,
    #[serde(default)]
    artists: Vec<WireArtist>,
}

#[derive(Debug, Deserialize)]
struct WireArtist {
    name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_playback_parses_service_shape() {
        let body = r#"{
            "is_playing": true,
            "progress_ms": 12345,
            "item": {
                "id": "track-1",
                "name": "Song",
                "duration_ms": 200000,
                "artists": [{"name": "Band"}]
            }
        }"#;
        let playback: WirePlayback = serde_json::from_str(body).unwrap();
        assert!(playback.is_playing);
        assert_eq!(playback.progress_ms, Some(12345));
        assert_eq!(playback.item.unwrap().artists[0].name, "Band");
    }

    #[test]
    fn test_wire_playback_tolerates_missing_item() {
        let playback: WirePlayback =
            serde_json::from_str(r#"{"is_playing": false, "progress_ms": null, "item": null}"#)
                .unwrap();
        assert!(playback.item.is_none());
    }

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let source = HttpSource::with_base_url("tok", "http://localhost:9999/").unwrap();
        assert_eq!(source.base_url, "http://localhost:9999");
    }
}
