use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::EtlError;
use crate::etl::batch::{FileProcessor, FileSummary};
use crate::etl::fact_resolver::resolve_dimension_keys;
use crate::etl::time_dimension::time_dimension;
use crate::model::{PlayEvent, TimeDimension, User};
use crate::ports::loader::Loader;

/// `page` value of an event that records a song being played.
pub const SONG_PLAYED_PAGE: &str = "NextSong";

/// `userId` shows up both as a string and as a number across log exports.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum UserId {
    Text(String),
    Number(i64),
}

impl UserId {
    fn into_string(self) -> String {
        match self {
            UserId::Text(s) => s,
            UserId::Number(n) => n.to_string(),
        }
    }
}

/// One line of an activity log. Only the fields the pipeline reads are
/// declared; everything is optional until the event is known to be a play.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LogRecord {
    page: Option<String>,
    ts: Option<i64>,
    user_id: Option<UserId>,
    first_name: Option<String>,
    last_name: Option<String>,
    gender: Option<String>,
    level: Option<String>,
    song: Option<String>,
    artist: Option<String>,
    length: Option<f64>,
    session_id: Option<i64>,
    location: Option<String>,
    user_agent: Option<String>,
}

/// Everything one log file contributes to the star schema, in log order.
#[derive(Debug, Default)]
pub struct LogExtract {
    pub plays: Vec<PlayEvent>,
    /// One per play, duplicates included
    pub times: Vec<TimeDimension>,
    pub users: Vec<User>,
}

/// Parse a log file, keeping only song-play events.
pub fn extract_log_file(path: &Path) -> Result<LogExtract, EtlError> {
    let contents = std::fs::read_to_string(path).map_err(|source| EtlError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let mut extract = LogExtract::default();
    let mut latest_user: HashMap<String, User> = HashMap::new();
    let mut skipped = 0usize;

    for (index, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let line_number = index + 1;

        let record: LogRecord =
            serde_json::from_str(line).map_err(|e| EtlError::parse(path, line_number, e))?;

        if record.page.as_deref() != Some(SONG_PLAYED_PAGE) {
            skipped += 1;
            continue;
        }

        let (play, user) =
            split_play(record).map_err(|e| EtlError::parse(path, line_number, e))?;
        let time = time_dimension(play.ts).ok_or_else(|| {
            EtlError::parse(path, line_number, format!("timestamp {} out of range", play.ts))
        })?;

        // A snapshot identical to the user's previous one changes nothing
        if latest_user.get(&user.user_id) != Some(&user) {
            latest_user.insert(user.user_id.clone(), user.clone());
            extract.users.push(user);
        }
        extract.times.push(time);
        extract.plays.push(play);
    }

    log::debug!(
        "Extracted {} plays from {} ({} other events dropped)",
        extract.plays.len(),
        path.display(),
        skipped
    );
    Ok(extract)
}

fn split_play(record: LogRecord) -> Result<(PlayEvent, User), String> {
    let ts = record.ts.ok_or("missing field `ts`")?;
    let user_id = record
        .user_id
        .map(UserId::into_string)
        .filter(|id| !id.is_empty())
        .ok_or("missing field `userId`")?;
    let level = record.level.ok_or("missing field `level`")?;
    let session_id = record.session_id.ok_or("missing field `sessionId`")?;

    let user = User {
        user_id: user_id.clone(),
        first_name: record.first_name,
        last_name: record.last_name,
        gender: record.gender,
        level: level.clone(),
    };
    let play = PlayEvent {
        ts,
        user_id,
        level,
        session_id,
        location: record.location,
        user_agent: record.user_agent,
        song: record.song,
        artist: record.artist,
        length: record.length,
    };
    Ok((play, user))
}

/// Loads time, user and songplay rows from one activity log file.
pub struct LogFileProcessor;

#[async_trait::async_trait]
impl FileProcessor for LogFileProcessor {
    fn dataset(&self) -> &'static str {
        "logs"
    }

    async fn process(&self, loader: &dyn Loader, path: &Path) -> Result<FileSummary, EtlError> {
        let extract = extract_log_file(path)?;
        let mut summary = FileSummary {
            time_rows: extract.times.len(),
            users: extract.users.len(),
            ..FileSummary::default()
        };

        for time in &extract.times {
            loader.upsert_time(time).await?;
        }

        for user in &extract.users {
            loader.upsert_user(user).await?;
        }

        for play in extract.plays {
            let keys = resolve_dimension_keys(loader, &play).await?;
            if keys.is_none() {
                summary.unresolved += 1;
            }
            loader.insert_songplay(&play.into_fact(keys)).await?;
            summary.songplays += 1;
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DimensionKeys;
    use crate::ports::loader::MockLoader;
    use crate::test_utils::{home_line, next_song_line, write_fixture};
    use mockall::Sequence;
    use tempfile::TempDir;

    fn write_log(dir: &TempDir, lines: &[String]) -> std::path::PathBuf {
        write_fixture(dir.path(), "2018-11-01-events.json", &lines.join("\n"))
    }

    #[test]
    fn test_extract_keeps_only_song_plays() {
        let dir = TempDir::new().unwrap();
        let path = write_log(
            &dir,
            &[
                next_song_line(1_541_105_830_796, "39", "free", "T", "X", 180.5),
                home_line(1_541_106_106_796),
                next_song_line(1_541_106_352_796, "8", "free", "U", "Y", 200.0),
            ],
        );

        let extract = extract_log_file(&path).unwrap();

        assert_eq!(extract.plays.len(), 2);
        assert_eq!(extract.users.len(), 2);
        assert_eq!(extract.times.len(), 2);
        assert_eq!(
            extract.times.iter().map(|t| t.start_time).collect::<Vec<_>>(),
            vec![1_541_105_830, 1_541_106_352]
        );
        assert!(extract.plays.iter().all(|p| p.ts != 1_541_106_106_796));
    }

    #[test]
    fn test_extract_play_fields() {
        let dir = TempDir::new().unwrap();
        let line = next_song_line(1_541_105_830_796, "39", "free", "T", "X", 180.5);
        let path = write_log(&dir, &[line]);

        let extract = extract_log_file(&path).unwrap();

        assert_eq!(
            extract.plays[0],
            PlayEvent {
                ts: 1_541_105_830_796,
                user_id: "39".into(),
                level: "free".into(),
                session_id: 38,
                location: Some("San Francisco-Oakland-Hayward, CA".into()),
                user_agent: Some("Mozilla/5.0".into()),
                song: Some("T".into()),
                artist: Some("X".into()),
                length: Some(180.5),
            }
        );
        assert_eq!(
            extract.users[0],
            User {
                user_id: "39".into(),
                first_name: Some("Walter".into()),
                last_name: Some("Frye".into()),
                gender: Some("M".into()),
                level: "free".into(),
            }
        );
    }

    #[test]
    fn test_extract_keeps_level_changes_in_order() {
        let dir = TempDir::new().unwrap();
        let path = write_log(
            &dir,
            &[
                next_song_line(1_000, "15", "free", "T", "X", 1.0),
                next_song_line(2_000, "15", "free", "T", "X", 1.0),
                next_song_line(3_000, "15", "paid", "T", "X", 1.0),
                next_song_line(4_000, "15", "free", "T", "X", 1.0),
            ],
        );

        let extract = extract_log_file(&path).unwrap();

        let levels: Vec<_> = extract.users.iter().map(|u| u.level.as_str()).collect();
        assert_eq!(levels, vec!["free", "paid", "free"]);
        assert_eq!(extract.plays.len(), 4);
        // Duplicate timestamps are left for the loader to ignore
        assert_eq!(extract.times.len(), 4);
    }

    #[test]
    fn test_extract_truncates_timestamp() {
        let dir = TempDir::new().unwrap();
        let path = write_log(&dir, &[next_song_line(1_500, "15", "free", "T", "X", 1.0)]);

        let extract = extract_log_file(&path).unwrap();

        assert_eq!(extract.times[0].start_time, 1);
        // The fact keeps the original milliseconds
        assert_eq!(extract.plays[0].ts, 1_500);
    }

    #[test]
    fn test_extract_numeric_user_id() {
        let dir = TempDir::new().unwrap();
        let path = write_fixture(
            dir.path(),
            "events.json",
            r#"{"page":"NextSong","ts":1000,"userId":26,"level":"free","sessionId":1}"#,
        );

        let extract = extract_log_file(&path).unwrap();

        assert_eq!(extract.plays[0].user_id, "26");
        assert_eq!(extract.plays[0].song, None);
        assert_eq!(extract.users[0].first_name, None);
    }

    #[test]
    fn test_extract_play_without_song_is_kept() {
        let dir = TempDir::new().unwrap();
        let path = write_fixture(
            dir.path(),
            "events.json",
            r#"{"page":"NextSong","ts":1000,"userId":"26","level":"free","sessionId":1,"song":null,"artist":null,"length":null}"#,
        );

        let extract = extract_log_file(&path).unwrap();

        assert_eq!(extract.plays.len(), 1);
        assert_eq!(extract.plays[0].length, None);
    }

    #[test]
    fn test_extract_ignores_blank_lines() {
        let dir = TempDir::new().unwrap();
        let line = next_song_line(1_000, "15", "free", "T", "X", 1.0);
        let path = write_fixture(dir.path(), "events.json", &format!("\n{}\n\n", line));

        assert_eq!(extract_log_file(&path).unwrap().plays.len(), 1);
    }

    #[test]
    fn test_extract_malformed_line_reports_line_number() {
        let dir = TempDir::new().unwrap();
        let path = write_log(
            &dir,
            &[
                next_song_line(1_000, "15", "free", "T", "X", 1.0),
                "{\"page\": \"NextSong\",".to_string(),
            ],
        );

        match extract_log_file(&path) {
            Err(EtlError::Parse { line, .. }) => assert_eq!(line, 2),
            other => panic!("Expected Parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_extract_play_missing_user_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write_fixture(
            dir.path(),
            "events.json",
            r#"{"page":"NextSong","ts":1000,"userId":"","level":"free","sessionId":1}"#,
        );

        match extract_log_file(&path) {
            Err(EtlError::Parse { reason, .. }) => assert!(reason.contains("userId")),
            other => panic!("Expected Parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_extract_non_play_events_need_no_fields() {
        let dir = TempDir::new().unwrap();
        let path = write_log(&dir, &[r#"{"page":"Logout"}"#.to_string()]);

        let extract = extract_log_file(&path).unwrap();

        assert!(extract.plays.is_empty());
        assert!(extract.users.is_empty());
        assert!(extract.times.is_empty());
    }

    #[tokio::test]
    async fn test_log_file_processor_loads_in_order() {
        let dir = TempDir::new().unwrap();
        let path = write_log(
            &dir,
            &[
                next_song_line(1_541_105_830_796, "39", "free", "T", "X", 180.5),
                home_line(1_541_106_106_796),
                next_song_line(1_541_106_352_796, "8", "free", "Unknown", "Y", 200.0),
            ],
        );

        let mut seq = Sequence::new();
        let mut loader = MockLoader::new();
        loader
            .expect_upsert_time()
            .times(2)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        loader
            .expect_upsert_user()
            .times(2)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        loader
            .expect_find_song_and_artist()
            .withf(|title, _, _| title == "T")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| {
                Ok(Some(DimensionKeys {
                    song_id: "S1".into(),
                    artist_id: "A1".into(),
                }))
            });
        loader
            .expect_insert_songplay()
            .withf(|fact| fact.song_id.as_deref() == Some("S1") && fact.user_id == "39")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(1));
        loader
            .expect_find_song_and_artist()
            .withf(|title, _, _| title == "Unknown")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(None));
        loader
            .expect_insert_songplay()
            .withf(|fact| fact.song_id.is_none() && fact.artist_id.is_none())
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(2));

        let summary = LogFileProcessor.process(&loader, &path).await.unwrap();

        assert_eq!(summary.songplays, 2);
        assert_eq!(summary.unresolved, 1);
        assert_eq!(summary.users, 2);
        assert_eq!(summary.time_rows, 2);
    }

    #[tokio::test]
    async fn test_log_file_processor_stops_on_load_error() {
        let dir = TempDir::new().unwrap();
        let path = write_log(&dir, &[next_song_line(1_000, "15", "free", "T", "X", 1.0)]);

        let mut loader = MockLoader::new();
        loader.expect_upsert_time().returning(|_| {
            Err(EtlError::Load {
                operation: "upsert time",
                source: sea_orm::DbErr::Custom("database is locked".into()),
            })
        });
        loader.expect_upsert_user().times(0);
        loader.expect_insert_songplay().times(0);

        let result = LogFileProcessor.process(&loader, &path).await;

        assert!(matches!(result, Err(EtlError::Load { .. })));
    }
}
