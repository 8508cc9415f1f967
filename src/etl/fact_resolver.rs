use crate::error::EtlError;
use crate::model::{DimensionKeys, PlayEvent};
use crate::ports::loader::Loader;

/// Match a play event against the song/artist dimensions.
///
/// Best-effort join: `Ok(None)` when the event lacks song, artist or length,
/// or when the catalog has no exact match. Only storage failures are errors.
pub async fn resolve_dimension_keys(
    loader: &dyn Loader,
    play: &PlayEvent,
) -> Result<Option<DimensionKeys>, EtlError> {
    let (Some(title), Some(artist), Some(length)) = (&play.song, &play.artist, play.length) else {
        log::debug!("Play at {} has no song details, leaving keys empty", play.ts);
        return Ok(None);
    };

    let keys = loader.find_song_and_artist(title, artist, length).await?;
    if keys.is_none() {
        log::debug!("No catalog match for '{}' by '{}' ({}s)", title, artist, length);
    }

    Ok(keys)
}
