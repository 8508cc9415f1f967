use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Dimension: songs
        manager
            .create_table(
                Table::create()
                    .table(Songs::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Songs::SongId).string().not_null().primary_key())
                    .col(ColumnDef::new(Songs::Title).string().not_null())
                    .col(ColumnDef::new(Songs::ArtistId).string().not_null())
                    .col(ColumnDef::new(Songs::Year).integer().not_null())
                    .col(ColumnDef::new(Songs::Duration).double().not_null())
                    .to_owned(),
            )
            .await?;

        // Dimension: artists
        manager
            .create_table(
                Table::create()
                    .table(Artists::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Artists::ArtistId)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Artists::Name).string().not_null())
                    .col(ColumnDef::new(Artists::Location).string())
                    .col(ColumnDef::new(Artists::Latitude).double())
                    .col(ColumnDef::new(Artists::Longitude).double())
                    .to_owned(),
            )
            .await?;

        // Dimension: users
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Users::UserId).string().not_null().primary_key())
                    .col(ColumnDef::new(Users::FirstName).string())
                    .col(ColumnDef::new(Users::LastName).string())
                    .col(ColumnDef::new(Users::Gender).string())
                    .col(ColumnDef::new(Users::Level).string().not_null())
                    .to_owned(),
            )
            .await?;

        // Dimension: time
        manager
            .create_table(
                Table::create()
                    .table(Time::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Time::StartTime)
                            .big_integer()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Time::Hour).integer().not_null())
                    .col(ColumnDef::new(Time::Day).integer().not_null())
                    .col(ColumnDef::new(Time::Week).integer().not_null())
                    .col(ColumnDef::new(Time::Month).integer().not_null())
                    .col(ColumnDef::new(Time::Year).integer().not_null())
                    .col(ColumnDef::new(Time::Weekday).integer().not_null())
                    .to_owned(),
            )
            .await?;

        // Fact: songplays. song_id/artist_id are nullable and carry no
        // foreign key, a play with no catalog match is still recorded.
        manager
            .create_table(
                Table::create()
                    .table(Songplays::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Songplays::SongplayId)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Songplays::StartTime).big_integer().not_null())
                    .col(ColumnDef::new(Songplays::UserId).string().not_null())
                    .col(ColumnDef::new(Songplays::Level).string().not_null())
                    .col(ColumnDef::new(Songplays::SongId).string())
                    .col(ColumnDef::new(Songplays::ArtistId).string())
                    .col(ColumnDef::new(Songplays::SessionId).big_integer().not_null())
                    .col(ColumnDef::new(Songplays::Location).string())
                    .col(ColumnDef::new(Songplays::UserAgent).string())
                    .to_owned(),
            )
            .await?;

        // The fact resolver looks songs up by title + duration
        manager
            .create_index(
                Index::create()
                    .name("idx_songs_title_duration")
                    .table(Songs::Table)
                    .col(Songs::Title)
                    .col(Songs::Duration)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Drop tables in reverse order
        manager
            .drop_table(Table::drop().table(Songplays::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Time::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Artists::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Songs::Table).if_exists().to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum Songs {
    Table,
    SongId,
    Title,
    ArtistId,
    Year,
    Duration,
}

#[derive(DeriveIden)]
enum Artists {
    Table,
    ArtistId,
    Name,
    Location,
    Latitude,
    Longitude,
}

#[derive(DeriveIden)]
enum Users {
    Table,
    UserId,
    FirstName,
    LastName,
    Gender,
    Level,
}

#[derive(DeriveIden)]
enum Time {
    Table,
    StartTime,
    Hour,
    Day,
    Week,
    Month,
    Year,
    Weekday,
}

#[derive(DeriveIden)]
enum Songplays {
    Table,
    SongplayId,
    StartTime,
    UserId,
    Level,
    SongId,
    ArtistId,
    SessionId,
    Location,
    UserAgent,
}
