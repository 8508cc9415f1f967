use std::path::Path;

use serde::Deserialize;

use crate::error::EtlError;
use crate::etl::batch::{FileProcessor, FileSummary};
use crate::model::{Artist, Song};
use crate::ports::loader::Loader;

/// One line of the song dataset. Fields not listed here are ignored.
#[derive(Debug, Deserialize)]
struct SongRecord {
    song_id: String,
    title: String,
    artist_id: String,
    year: i32,
    duration: f64,
    artist_name: String,
    #[serde(default)]
    artist_location: Option<String>,
    #[serde(default)]
    artist_latitude: Option<f64>,
    #[serde(default)]
    artist_longitude: Option<f64>,
}

/// Parse a song file into its song and artist rows.
///
/// The record is the first non-blank line of the file.
pub fn extract_song_file(path: &Path) -> Result<(Song, Artist), EtlError> {
    let contents = std::fs::read_to_string(path).map_err(|source| EtlError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let (index, line) = contents
        .lines()
        .enumerate()
        .find(|(_, line)| !line.trim().is_empty())
        .ok_or_else(|| EtlError::parse(path, 1, "file contains no record"))?;

    let record: SongRecord =
        serde_json::from_str(line).map_err(|e| EtlError::parse(path, index + 1, e))?;

    Ok(split_record(record))
}

fn split_record(record: SongRecord) -> (Song, Artist) {
    let song = Song {
        song_id: record.song_id,
        title: record.title,
        artist_id: record.artist_id.clone(),
        year: record.year,
        duration: record.duration,
    };
    let artist = Artist {
        artist_id: record.artist_id,
        name: record.artist_name,
        location: record.artist_location,
        latitude: record.artist_latitude,
        longitude: record.artist_longitude,
    };
    (song, artist)
}

/// Loads the song and artist dimensions from one catalog file.
pub struct SongFileProcessor;

#[async_trait::async_trait]
impl FileProcessor for SongFileProcessor {
    fn dataset(&self) -> &'static str {
        "songs"
    }

    async fn process(&self, loader: &dyn Loader, path: &Path) -> Result<FileSummary, EtlError> {
        let (song, artist) = extract_song_file(path)?;

        loader.upsert_song(&song).await?;
        loader.upsert_artist(&artist).await?;

        Ok(FileSummary {
            songs: 1,
            artists: 1,
            ..FileSummary::default()
        })
    }
}
