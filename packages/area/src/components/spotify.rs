use area_types::{ActionResponse, ReactionResponse, TriggerResponse};
use async_trait::async_trait;

use crate::clients::spotify::SpotifyClient;
use crate::registry::{ComponentRegistry, RegistryError};
use crate::schema::{ConfigSchema, FieldKind, FieldSpec, ValidatedConfig};

use super::{passes_filter, Action, ComponentError, Reaction, Trigger};

pub fn register(registry: &mut ComponentRegistry) -> Result<(), RegistryError> {
    registry.register_trigger("track_played", "spotify", ConfigSchema::new(), |config| {
        Ok(Box::new(CurrentlyPlayingTrigger::new(config)?))
    })?;

    registry.register_action(
        "track_played",
        "spotify",
        ConfigSchema::new()
            .field(FieldSpec::required("track_id", FieldKind::String))
            .field(FieldSpec::required("track_name", FieldKind::String))
            .field(FieldSpec::required("artist_name", FieldKind::String))
            .field(FieldSpec::required("album_name", FieldKind::String))
            .field(FieldSpec::optional("filter", FieldKind::Object)),
        |config| Ok(Box::new(TrackPlayedAction { config })),
    )?;

    registry.register_reaction(
        "add_to_playlist",
        "spotify",
        ConfigSchema::new()
            .field(FieldSpec::required("playlist_id", FieldKind::String))
            .field(FieldSpec::optional("track_uri", FieldKind::String)),
        |config| Ok(Box::new(AddToPlaylistReaction::new(config)?)),
    )?;

    Ok(())
}

/// Polls the player; fires when the playing track changes. The cursor is
/// the last seen track id, so pause/replay of the same track stays quiet.
pub struct CurrentlyPlayingTrigger {
    client: SpotifyClient,
    last_track_id: Option<String>,
}

impl CurrentlyPlayingTrigger {
    fn new(config: ValidatedConfig) -> Result<Self, ComponentError> {
        let token = config
            .token()
            .map(str::to_string)
            .ok_or(ComponentError::MissingCredential)?;
        Ok(Self {
            client: SpotifyClient::new(token)?,
            last_track_id: None,
        })
    }
}

#[async_trait]
impl Trigger for CurrentlyPlayingTrigger {
    fn name(&self) -> &'static str {
        "track_played"
    }

    async fn evaluate(&mut self) -> Result<Option<TriggerResponse>, ComponentError> {
        let Some(playing) = self.client.currently_playing().await? else {
            return Ok(None);
        };
        let Some(track) = playing.get("item").filter(|item| !item.is_null()) else {
            return Ok(None);
        };

        let track_id = track
            .get("id")
            .and_then(|id| id.as_str())
            .unwrap_or_default()
            .to_string();
        if Some(&track_id) == self.last_track_id.as_ref() {
            return Ok(None);
        }
        self.last_track_id = Some(track_id.clone());

        let text = |pointer: &str| {
            track
                .pointer(pointer)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string()
        };

        Ok(Some(
            TriggerResponse::new(track.to_string())
                .with_detail("event", "track_played")
                .with_field("track_id", track_id)
                .with_field("track_name", text("/name"))
                .with_field("artist_name", text("/artists/0/name"))
                .with_field("album_name", text("/album/name")),
        ))
    }
}

pub struct TrackPlayedAction {
    config: ValidatedConfig,
}

#[async_trait]
impl Action for TrackPlayedAction {
    fn name(&self) -> &'static str {
        "track_played"
    }

    async fn execute(&self) -> Result<Option<ActionResponse>, ComponentError> {
        if !passes_filter(&self.config, self.config.as_map())? {
            return Ok(None);
        }

        let field = |name: &str| self.config.get_str(name).unwrap_or_default().to_string();

        Ok(Some(
            ActionResponse::ok()
                .with_detail("event", "track_played")
                .with_field("track_id", field("track_id"))
                .with_field("track_name", field("track_name"))
                .with_field("artist_name", field("artist_name"))
                .with_field("album_name", field("album_name")),
        ))
    }
}

/// Adds the played track (or an explicitly configured `track_uri`) to a
/// playlist
pub struct AddToPlaylistReaction {
    client: SpotifyClient,
    config: ValidatedConfig,
}

impl AddToPlaylistReaction {
    fn new(config: ValidatedConfig) -> Result<Self, ComponentError> {
        let token = config
            .token()
            .map(str::to_string)
            .ok_or(ComponentError::MissingCredential)?;
        Ok(Self {
            client: SpotifyClient::new(token)?,
            config,
        })
    }
}

#[async_trait]
impl Reaction for AddToPlaylistReaction {
    fn name(&self) -> &'static str {
        "add_to_playlist"
    }

    async fn execute(&self, input: &ActionResponse) -> Result<ReactionResponse, ComponentError> {
        let playlist_id = self.config.get_str("playlist_id").unwrap_or_default();

        let track_uri = match self.config.get_str("track_uri") {
            Some(uri) => uri.to_string(),
            None => {
                let track_id = input
                    .extra
                    .get("track_id")
                    .and_then(|id| id.as_str())
                    .ok_or_else(|| {
                        ComponentError::UpstreamFatal(
                            "no track_uri configured and no track_id in action output".to_string(),
                        )
                    })?;
                format!("spotify:track:{track_id}")
            }
        };

        tracing::info!(playlist_id, track_uri, "Adding track to playlist");
        let result = self.client.add_to_playlist(playlist_id, &track_uri).await?;

        Ok(ReactionResponse::ok()
            .with_detail("playlist_id", playlist_id)
            .with_detail("track_uri", track_uri)
            .with_detail(
                "snapshot_id",
                result.get("snapshot_id").cloned().unwrap_or_default(),
            ))
    }
}
