//! In-memory records produced by extraction and handed to the [`Loader`].
//!
//! Every record is built per file and dropped once the file's transaction
//! commits; nothing here outlives a single file.
//!
//! [`Loader`]: crate::ports::loader::Loader

/// Row of the `songs` dimension.
#[derive(Debug, Clone, PartialEq)]
pub struct Song {
    pub song_id: String,
    pub title: String,
    pub artist_id: String,
    pub year: i32,
    /// Seconds
    pub duration: f64,
}

/// Row of the `artists` dimension.
#[derive(Debug, Clone, PartialEq)]
pub struct Artist {
    pub artist_id: String,
    pub name: String,
    pub location: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// Snapshot of a user as seen on one play event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub user_id: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub gender: Option<String>,
    pub level: String,
}

/// Calendar attributes of a play event, keyed by whole epoch seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeDimension {
    pub start_time: i64,
    pub hour: i32,
    pub day: i32,
    /// ISO 8601 week number
    pub week: i32,
    pub month: i32,
    pub year: i32,
    /// Monday = 0 ... Sunday = 6
    pub weekday: i32,
}

/// A `NextSong` log event with the song still in its denormalized form.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayEvent {
    /// Epoch milliseconds
    pub ts: i64,
    pub user_id: String,
    pub level: String,
    pub session_id: i64,
    pub location: Option<String>,
    pub user_agent: Option<String>,
    pub song: Option<String>,
    pub artist: Option<String>,
    pub length: Option<f64>,
}

/// Keys of the catalog row a play event was matched against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DimensionKeys {
    pub song_id: String,
    pub artist_id: String,
}

/// Row of the `songplays` fact table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SongplayFact {
    /// Epoch milliseconds
    pub start_time: i64,
    pub user_id: String,
    pub level: String,
    pub song_id: Option<String>,
    pub artist_id: Option<String>,
    pub session_id: i64,
    pub location: Option<String>,
    pub user_agent: Option<String>,
}

impl PlayEvent {
    pub fn into_fact(self, keys: Option<DimensionKeys>) -> SongplayFact {
        let (song_id, artist_id) = match keys {
            Some(keys) => (Some(keys.song_id), Some(keys.artist_id)),
            None => (None, None),
        };

        SongplayFact {
            start_time: self.ts,
            user_id: self.user_id,
            level: self.level,
            song_id,
            artist_id,
            session_id: self.session_id,
            location: self.location,
            user_agent: self.user_agent,
        }
    }
}
