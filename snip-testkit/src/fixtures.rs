//! Sample snips and documents.

use chrono::{DateTime, TimeZone, Utc};
use serde_json::{json, Value};
use snip_domain::{Episode, Snip};

/// A fixed instant used as `lastModified` by fixtures
pub fn sample_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 9, 17, 10, 12, 32)
        .single()
        .unwrap_or_default()
}

/// The episode every fixture snip was cut from
pub fn sample_episode() -> Episode {
    Episode::new(
        1_526_443_212,
        "https://traffic.example.fm/episodes/1066.mp3",
        "1066: The Battle of Hastings",
        "History Extra",
        "https://is1.example.com/artwork/600x600bb.jpg",
    )
}

/// A valid snip addressed by `(id, user_id)`
pub fn sample_snip(id: &str, user_id: &str) -> Snip {
    let mut snip = Snip::new(
        id,
        user_id,
        "05:22",
        "09:44",
        format!("snips/{}/{}.m4a", user_id, id),
        sample_episode(),
    );
    snip.last_modified = sample_time();
    snip
}

/// A document in the flat pre-episode schema, which no longer decodes as a snip
pub fn legacy_document(id: &str, user_id: &str) -> Value {
    json!({
        "id": id,
        "userId": user_id,
        "trackId": 1_526_443_212_i64,
        "trackName": "1066: The Battle of Hastings",
        "episodeUrl": "https://traffic.example.fm/episodes/1066.mp3",
        "startTime": "05:22",
        "endTime": "09:44",
        "storageKey": format!("snips/{}/{}.m4a", user_id, id),
    })
}
