//! `.pls` playlist parsing
//!
//! ```text
//! [playlist]
//! numberofentries=2
//! file1=http://x/stream.mp3
//! title1=Radio X - Live
//! length1=-1
//! file2=http://x/backup.mp3
//! ```

use crate::document::Document;
use crate::error::{Error, Result};
use crate::models::{Channel, Station, Stream, UNKNOWN_LENGTH};
use tracing::warn;

/// Builds the channel described by the playlist at `uri`
///
/// Titles go through the station's noise filters. An entry without
/// `file<i>` is skipped, a missing title falls back to the stream URI and
/// a missing or unreadable length is [`UNKNOWN_LENGTH`].
pub fn parse_playlist(station: &Station, uri: &str, body: &str) -> Result<Channel> {
    let doc = Document::parse(uri, body)?;
    let playlist = doc
        .section("playlist")
        .ok_or_else(|| Error::parse(uri, "no [playlist] section"))?;

    let count: usize = playlist
        .get("numberofentries")
        .ok_or_else(|| Error::parse(uri, "no numberofentries"))?
        .parse()
        .map_err(|e| Error::parse(uri, format!("bad numberofentries: {e}")))?;

    // numberofentries comes from the remote side; only the indices that
    // actually carry a file key can produce a stream
    let last_file = playlist
        .entries()
        .filter_map(|(key, _)| file_index(key))
        .max()
        .unwrap_or(0);
    if count > last_file {
        warn!(playlist = %uri, declared = count, present = last_file, "Playlist declares more entries than it holds");
    }

    let mut channel = Channel::new(station, uri);

    for i in 1..=count.min(last_file) {
        let Some(file) = playlist.get(&format!("file{i}")).filter(|f| !f.is_empty()) else {
            warn!(playlist = %uri, entry = i, "Playlist entry without file, skipped");
            continue;
        };

        let title = match playlist.get(&format!("title{i}")) {
            Some(title) if !title.is_empty() => station.filter_noise(title),
            _ => file.to_string(),
        };

        let length = playlist
            .get(&format!("length{i}"))
            .and_then(|l| l.parse::<i64>().ok())
            .unwrap_or(UNKNOWN_LENGTH);

        channel.streams.push(Stream::new(file, title, length));
    }

    Ok(channel)
}

/// Index `i` of a `file<i>` key, whatever its case
fn file_index(key: &str) -> Option<usize> {
    let prefix = key.get(..4)?;
    if !prefix.eq_ignore_ascii_case("file") {
        return None;
    }
    key[4..].parse().ok()
}
