use crate::error::EtlError;
use crate::model::{Artist, DimensionKeys, Song, SongplayFact, TimeDimension, User};

/// Port over the star-schema store used by the extract/transform steps.
///
/// Dimension writes are idempotent upserts keyed by their natural key; the
/// fact write is a plain insert. Implementations live in
/// `services::star_schema` (production) or test mocks.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait Loader: Send + Sync {
    async fn upsert_song(&self, song: &Song) -> Result<(), EtlError>;

    async fn upsert_artist(&self, artist: &Artist) -> Result<(), EtlError>;

    /// Last write wins on `user_id`.
    async fn upsert_user(&self, user: &User) -> Result<(), EtlError>;

    /// Ignored when the `start_time` row already exists.
    async fn upsert_time(&self, time: &TimeDimension) -> Result<(), EtlError>;

    /// Returns the generated `songplay_id`.
    async fn insert_songplay(&self, fact: &SongplayFact) -> Result<i64, EtlError>;

    /// First catalog row whose title, artist name and duration all match exactly.
    async fn find_song_and_artist(
        &self,
        title: &str,
        artist_name: &str,
        duration: f64,
    ) -> Result<Option<DimensionKeys>, EtlError>;
}
