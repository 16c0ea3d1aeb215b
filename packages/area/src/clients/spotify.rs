use serde_json::{json, Value};

use crate::components::ComponentError;

const API_BASE: &str = "https://api.spotify.com/v1";

/// Spotify Web API wrapper around a user's OAuth access token
pub struct SpotifyClient {
    http: reqwest::Client,
    token: String,
}

impl SpotifyClient {
    pub fn new(token: impl Into<String>) -> Result<Self, ComponentError> {
        Ok(Self {
            http: super::http_client()?,
            token: token.into(),
        })
    }

    /// The currently playing track, or None when nothing is playing
    /// (Spotify replies 204 with no body in that case)
    pub async fn currently_playing(&self) -> Result<Option<Value>, ComponentError> {
        let response = self
            .http
            .get(format!("{API_BASE}/me/player/currently-playing"))
            .bearer_auth(&self.token)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::NO_CONTENT {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(ComponentError::from_status(
                status,
                response.text().await.unwrap_or_default(),
            ));
        }

        Ok(Some(response.json().await?))
    }

    pub async fn add_to_playlist(
        &self,
        playlist_id: &str,
        track_uri: &str,
    ) -> Result<Value, ComponentError> {
        let response = self
            .http
            .post(format!("{API_BASE}/playlists/{playlist_id}/tracks"))
            .bearer_auth(&self.token)
            .json(&json!({"uris": [track_uri]}))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ComponentError::from_status(
                status,
                response.text().await.unwrap_or_default(),
            ));
        }

        Ok(response.json().await?)
    }
}
