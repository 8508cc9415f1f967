use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveValue, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, QuerySelect,
};

use crate::entities;
use crate::error::EtlError;
use crate::model::{Artist, DimensionKeys, Song, SongplayFact, TimeDimension, User};
use crate::ports::loader::Loader;

/// [`Loader`] backed by sea-orm. Bound to whatever connection it is given,
/// normally the open transaction of the file being processed.
pub struct SeaOrmLoader<'a, C: ConnectionTrait> {
    conn: &'a C,
}

impl<'a, C: ConnectionTrait> SeaOrmLoader<'a, C> {
    pub fn new(conn: &'a C) -> Self {
        Self { conn }
    }
}

#[async_trait::async_trait]
impl<C> Loader for SeaOrmLoader<'_, C>
where
    C: ConnectionTrait + Send + Sync,
{
    async fn upsert_song(&self, song: &Song) -> Result<(), EtlError> {
        log::debug!("Upserting song: '{}' ({})", song.title, song.song_id);

        let model = entities::song::ActiveModel {
            song_id: ActiveValue::Set(song.song_id.clone()),
            title: ActiveValue::Set(song.title.clone()),
            artist_id: ActiveValue::Set(song.artist_id.clone()),
            year: ActiveValue::Set(song.year),
            duration: ActiveValue::Set(song.duration),
        };

        entities::song::Entity::insert(model)
            .on_conflict(
                OnConflict::column(entities::song::Column::SongId)
                    .update_columns([
                        entities::song::Column::Title,
                        entities::song::Column::ArtistId,
                        entities::song::Column::Year,
                        entities::song::Column::Duration,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(self.conn)
            .await
            .map_err(EtlError::load("upsert song"))?;

        Ok(())
    }

    async fn upsert_artist(&self, artist: &Artist) -> Result<(), EtlError> {
        log::debug!("Upserting artist: '{}' ({})", artist.name, artist.artist_id);

        let model = entities::artist::ActiveModel {
            artist_id: ActiveValue::Set(artist.artist_id.clone()),
            name: ActiveValue::Set(artist.name.clone()),
            location: ActiveValue::Set(artist.location.clone()),
            latitude: ActiveValue::Set(artist.latitude),
            longitude: ActiveValue::Set(artist.longitude),
        };

        entities::artist::Entity::insert(model)
            .on_conflict(
                OnConflict::column(entities::artist::Column::ArtistId)
                    .update_columns([
                        entities::artist::Column::Name,
                        entities::artist::Column::Location,
                        entities::artist::Column::Latitude,
                        entities::artist::Column::Longitude,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(self.conn)
            .await
            .map_err(EtlError::load("upsert artist"))?;

        Ok(())
    }

    async fn upsert_user(&self, user: &User) -> Result<(), EtlError> {
        log::debug!("Upserting user {} (level: {})", user.user_id, user.level);

        let model = entities::user::ActiveModel {
            user_id: ActiveValue::Set(user.user_id.clone()),
            first_name: ActiveValue::Set(user.first_name.clone()),
            last_name: ActiveValue::Set(user.last_name.clone()),
            gender: ActiveValue::Set(user.gender.clone()),
            level: ActiveValue::Set(user.level.clone()),
        };

        entities::user::Entity::insert(model)
            .on_conflict(
                OnConflict::column(entities::user::Column::UserId)
                    .update_columns([
                        entities::user::Column::FirstName,
                        entities::user::Column::LastName,
                        entities::user::Column::Gender,
                        entities::user::Column::Level,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(self.conn)
            .await
            .map_err(EtlError::load("upsert user"))?;

        Ok(())
    }

    async fn upsert_time(&self, time: &TimeDimension) -> Result<(), EtlError> {
        let model = entities::time::ActiveModel {
            start_time: ActiveValue::Set(time.start_time),
            hour: ActiveValue::Set(time.hour),
            day: ActiveValue::Set(time.day),
            week: ActiveValue::Set(time.week),
            month: ActiveValue::Set(time.month),
            year: ActiveValue::Set(time.year),
            weekday: ActiveValue::Set(time.weekday),
        };

        // Rows are a pure function of start_time, an existing row is already correct
        entities::time::Entity::insert(model)
            .on_conflict(
                OnConflict::column(entities::time::Column::StartTime)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(self.conn)
            .await
            .map_err(EtlError::load("upsert time"))?;

        Ok(())
    }

    async fn insert_songplay(&self, fact: &SongplayFact) -> Result<i64, EtlError> {
        let model = entities::songplay::ActiveModel {
            songplay_id: ActiveValue::NotSet,
            start_time: ActiveValue::Set(fact.start_time),
            user_id: ActiveValue::Set(fact.user_id.clone()),
            level: ActiveValue::Set(fact.level.clone()),
            song_id: ActiveValue::Set(fact.song_id.clone()),
            artist_id: ActiveValue::Set(fact.artist_id.clone()),
            session_id: ActiveValue::Set(fact.session_id),
            location: ActiveValue::Set(fact.location.clone()),
            user_agent: ActiveValue::Set(fact.user_agent.clone()),
        };

        let result = entities::songplay::Entity::insert(model)
            .exec(self.conn)
            .await
            .map_err(EtlError::load("insert songplay"))?;

        Ok(result.last_insert_id)
    }

    async fn find_song_and_artist(
        &self,
        title: &str,
        artist_name: &str,
        duration: f64,
    ) -> Result<Option<DimensionKeys>, EtlError> {
        let keys = entities::song::Entity::find()
            .select_only()
            .column(entities::song::Column::SongId)
            .column(entities::song::Column::ArtistId)
            .inner_join(entities::artist::Entity)
            .filter(entities::song::Column::Title.eq(title))
            .filter(entities::artist::Column::Name.eq(artist_name))
            .filter(entities::song::Column::Duration.eq(duration))
            .order_by_asc(entities::song::Column::SongId)
            .into_tuple::<(String, String)>()
            .one(self.conn)
            .await
            .map_err(EtlError::load("look up song and artist"))?;

        Ok(keys.map(|(song_id, artist_id)| DimensionKeys { song_id, artist_id }))
    }
}
