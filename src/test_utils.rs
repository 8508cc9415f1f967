use std::path::{Path, PathBuf};
use std::sync::Arc;

use migration::MigratorTrait;

use crate::database::Database;

pub async fn test_db() -> Arc<Database> {
    let database = Database::connect("sqlite::memory:").await.unwrap();

    migration::Migrator::up(&database.conn, None)
        .await
        .unwrap_or_else(|e| panic!("Failed to migrate test database: {}", e));

    Arc::new(database)
}

/// Write `contents` to `relative` under `root`, creating parent directories.
pub fn write_fixture(root: &Path, relative: &str, contents: &str) -> PathBuf {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, contents).unwrap();
    path
}

pub const SONG_S1: &str = r#"{"num_songs":1,"song_id":"S1","title":"T","artist_id":"A1","year":2000,"duration":180.5,"artist_name":"X","artist_location":"","artist_latitude":null,"artist_longitude":null}"#;

/// A `NextSong` log line, as the event simulator writes them.
pub fn next_song_line(
    ts: i64,
    user_id: &str,
    level: &str,
    song: &str,
    artist: &str,
    length: f64,
) -> String {
    serde_json::json!({
        "artist": artist,
        "auth": "Logged In",
        "firstName": "Walter",
        "gender": "M",
        "itemInSession": 0,
        "lastName": "Frye",
        "length": length,
        "level": level,
        "location": "San Francisco-Oakland-Hayward, CA",
        "method": "PUT",
        "page": "NextSong",
        "registration": 1540919166796.0_f64,
        "sessionId": 38,
        "song": song,
        "status": 200,
        "ts": ts,
        "userAgent": "Mozilla/5.0",
        "userId": user_id,
    })
    .to_string()
}

pub fn home_line(ts: i64) -> String {
    serde_json::json!({
        "artist": null,
        "auth": "Logged Out",
        "firstName": null,
        "gender": null,
        "itemInSession": 0,
        "lastName": null,
        "length": null,
        "level": "free",
        "location": null,
        "method": "GET",
        "page": "Home",
        "registration": null,
        "sessionId": 52,
        "song": null,
        "status": 200,
        "ts": ts,
        "userAgent": null,
        "userId": "",
    })
    .to_string()
}
