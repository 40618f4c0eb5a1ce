//! Catalog model: stations, channels and streams
//!
//! Pure data and matching predicates, no I/O. A [`Station`] owns its
//! channels behind a lock and only ever appends to them; readers take a
//! snapshot of the `Arc`s, so a channel becomes visible only once fully
//! built.

use crate::error::Result;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Extension of the playlist files accepted by the crawler
pub const PLAYLIST_EXTENSION: &str = ".pls";

/// Length value of a live or unknown-length stream
pub const UNKNOWN_LENGTH: i64 = -1;

/// Strips leading and trailing dashes left after the title filter
const DASH_FILTER: &str = r"(^\s*-\s*|\s*-\s*$)";

/// One concrete playable media URI
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Stream {
    pub uri: String,
    pub title: String,
    /// Seconds, [`UNKNOWN_LENGTH`] for live streams
    pub length: i64,
}

impl Stream {
    pub fn new(uri: impl Into<String>, title: impl Into<String>, length: i64) -> Self {
        Self {
            uri: uri.into(),
            title: title.into(),
            length,
        }
    }
}

/// A program discovered under a station, identified by its playlist URI
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Channel {
    pub uri: String,
    pub tags: Vec<String>,
    pub streams: Vec<Stream>,
}

impl Channel {
    /// Builds a channel for `uri`, deriving its tags through the station's aliases
    pub fn new(station: &Station, uri: impl Into<String>) -> Self {
        let uri = uri.into();
        let tags = derive_tags(&uri, |tag| station.alias(tag));
        Self {
            uri,
            tags,
            streams: Vec::new(),
        }
    }

    /// Title of the first stream, or the playlist URI when there is none
    pub fn title(&self) -> &str {
        self.streams
            .first()
            .map(|s| s.title.as_str())
            .unwrap_or(&self.uri)
    }

    /// True if every token of `query` matches a tag, the station id,
    /// part of the station title or part of the channel title
    pub fn matches<S: AsRef<str>>(&self, station_id: &str, station_title: &str, query: &[S]) -> bool {
        query
            .iter()
            .all(|q| self.matches_token(station_id, station_title, q.as_ref()))
    }

    fn matches_token(&self, station_id: &str, station_title: &str, q: &str) -> bool {
        self.tags.iter().any(|t| t == q)
            || station_id == q
            || station_title.contains(q)
            || self.title().contains(q)
    }

    /// True if `uri` is the playlist or one of the streams of this channel
    pub fn contains_uri(&self, uri: &str) -> bool {
        self.uri == uri || self.streams.iter().any(|s| s.uri == uri)
    }
}

/// Tags are the directory segments of the URI path followed by the dotted
/// parts of the file name, minus its extension.
fn derive_tags(uri: &str, alias: impl Fn(&str) -> String) -> Vec<String> {
    let path = match url::Url::parse(uri) {
        Ok(url) => url.path().to_string(),
        Err(_) => uri.split(['?', '#']).next().unwrap_or_default().to_string(),
    };

    let segments: Vec<&str> = path.split('/').collect();
    let mut raw: Vec<&str> = Vec::new();
    if segments.len() > 1 {
        raw.extend(&segments[1..segments.len() - 1]);
    }
    if let Some(file) = segments.last() {
        let parts: Vec<&str> = file.split('.').collect();
        raw.extend(&parts[..parts.len() - 1]);
    }

    let mut tags: Vec<String> = Vec::new();
    for segment in raw.into_iter().filter(|s| !s.is_empty()) {
        let tag = alias(segment);
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    tags
}

/// `uri` as `url` serializes it, or unchanged when it does not parse
fn normalize_uri(uri: &str) -> String {
    url::Url::parse(uri).map_or_else(|_| uri.to_string(), String::from)
}

/// A broadcaster with a crawlable web page
#[derive(Debug)]
pub struct Station {
    id: String,
    title: String,
    uri: String,
    stream_uri_prefix: Option<String>,
    noise_filters: Vec<Regex>,
    aliases: HashMap<String, String>,
    channels: RwLock<Vec<Arc<Channel>>>,
}

impl Station {
    pub fn new(id: impl Into<String>, title: impl Into<String>, uri: impl Into<String>) -> Result<Self> {
        let title = title.into();
        let noise_filters = vec![Regex::new(&regex::escape(&title))?, Regex::new(DASH_FILTER)?];
        Ok(Self {
            id: id.into(),
            title,
            uri: uri.into(),
            stream_uri_prefix: None,
            noise_filters,
            aliases: HashMap::new(),
            channels: RwLock::new(Vec::new()),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn stream_uri_prefix(&self) -> Option<&str> {
        self.stream_uri_prefix.as_deref()
    }

    pub fn set_stream_uri_prefix(&mut self, prefix: impl Into<String>) {
        let prefix = prefix.into();
        self.stream_uri_prefix = (!prefix.is_empty()).then_some(prefix);
    }

    /// Adds a user noise filter; user filters run in insertion order, before
    /// the station-title and dash filters.
    pub fn add_noise_filter(&mut self, pattern: &str) -> Result<()> {
        let regex = Regex::new(pattern)?;
        let at = self.noise_filters.len() - 2;
        self.noise_filters.insert(at, regex);
        Ok(())
    }

    pub fn add_alias(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.aliases.insert(name.into(), value.into());
    }

    /// Canonical tag for `tag`
    pub fn alias(&self, tag: &str) -> String {
        self.aliases
            .get(tag)
            .cloned()
            .unwrap_or_else(|| tag.to_string())
    }

    /// True for playlist links under the stream prefix (when set) or under the station URI
    pub fn accept_stream(&self, uri: &str) -> bool {
        if !uri.ends_with(PLAYLIST_EXTENSION) {
            return false;
        }
        // Resolved links come back in normalized form (lowercase host, no
        // default port), so prefixes are compared in both spellings
        let normalized = normalize_uri(uri);
        let under = |prefix: &str| {
            uri.starts_with(prefix) || normalized.starts_with(normalize_uri(prefix).as_str())
        };
        if let Some(prefix) = &self.stream_uri_prefix {
            if under(prefix) {
                return true;
            }
        }
        under(&self.uri)
    }

    /// Runs every noise filter in order, trimming after each one
    pub fn filter_noise(&self, text: &str) -> String {
        self.noise_filters.iter().fold(text.to_string(), |acc, f| {
            f.replace_all(&acc, "").trim().to_string()
        })
    }

    /// Snapshot of the channels discovered so far
    pub fn channels(&self) -> Vec<Arc<Channel>> {
        self.channels.read().unwrap().clone()
    }

    pub fn channel_count(&self) -> usize {
        self.channels.read().unwrap().len()
    }

    /// Appends a fully built channel
    pub fn push_channel(&self, channel: Channel) -> Arc<Channel> {
        let channel = Arc::new(channel);
        self.channels.write().unwrap().push(channel.clone());
        channel
    }

    /// True if `channel` matches `query` on behalf of this station
    pub fn channel_matches<S: AsRef<str>>(&self, channel: &Channel, query: &[S]) -> bool {
        channel.matches(&self.id, &self.title, query)
    }

    /// Wire representation of the station and its current channels
    pub fn info(&self) -> StationInfo {
        StationInfo {
            id: self.id.clone(),
            title: self.title.clone(),
            uri: self.uri.clone(),
            channels: self.channels().iter().map(|c| c.as_ref().clone()).collect(),
        }
    }
}

/// Serializable station record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StationInfo {
    pub id: String,
    pub title: String,
    pub uri: String,
    pub channels: Vec<Channel>,
}

/// One `Find` result
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChannelMatch {
    pub station_id: String,
    pub channel: Channel,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn radio_x() -> Station {
        Station::new("radioX", "Radio X", "http://x/").unwrap()
    }

    #[test]
    fn test_accept_stream() {
        let mut station = radio_x();
        assert!(station.accept_stream("http://x/a.pls"));
        assert!(!station.accept_stream("http://x/a.m3u"));
        assert!(!station.accept_stream("http://cdn/a.pls"));

        station.set_stream_uri_prefix("http://cdn/");
        assert!(station.accept_stream("http://cdn/a.pls"));
        assert!(station.accept_stream("http://x/b.pls"));
        assert!(!station.accept_stream("http://elsewhere/a.pls"));
    }

    #[test]
    fn test_accept_stream_compares_normalized_uris() {
        let station = Station::new("rx", "Radio", "http://Radio.Example/").unwrap();
        assert!(station.accept_stream("http://radio.example/a.pls"));
        assert!(station.accept_stream("http://Radio.Example/b.pls"));

        let station = Station::new("x80", "X", "http://x:80/live/").unwrap();
        assert!(station.accept_stream("http://x/live/a.pls"));
        assert!(!station.accept_stream("http://x/other/a.pls"));

        let mut station = radio_x();
        station.set_stream_uri_prefix("HTTP://CDN.example/");
        assert!(station.accept_stream("http://cdn.example/a.pls"));
    }

    #[test]
    fn test_empty_stream_prefix_is_unset() {
        let mut station = radio_x();
        station.set_stream_uri_prefix("");
        assert_eq!(station.stream_uri_prefix(), None);
        assert!(!station.accept_stream("http://y/a.pls"));
    }

    #[test]
    fn test_filter_noise_strips_title_and_dashes() {
        let station = radio_x();
        assert_eq!(station.filter_noise("Radio X - Live"), "Live");
        assert_eq!(station.filter_noise("Morning - Radio X"), "Morning");
        assert_eq!(station.filter_noise("  Jazz  "), "Jazz");
    }

    #[test]
    fn test_user_noise_filters_run_first_in_order() {
        let mut station = radio_x();
        station.add_noise_filter(r"\(128k\)").unwrap();
        station.add_noise_filter(r"\[hq\]").unwrap();
        assert_eq!(station.filter_noise("Radio X - Live (128k) [hq]"), "Live");
    }

    #[test]
    fn test_invalid_noise_filter() {
        let mut station = radio_x();
        assert!(station.add_noise_filter("(unclosed").is_err());
    }

    #[test]
    fn test_tags_from_path_and_filename() {
        let mut station = radio_x();
        station.add_alias("hq", "high-quality");
        let channel = Channel::new(&station, "http://x/jazz/hq/smooth.128.pls");
        assert_eq!(channel.tags, vec!["jazz", "high-quality", "smooth", "128"]);
    }

    #[test]
    fn test_tags_skip_empty_segments_and_duplicates() {
        let station = radio_x();
        let channel = Channel::new(&station, "http://x//rock/rock.pls?session=1");
        assert_eq!(channel.tags, vec!["rock"]);

        let root = Channel::new(&station, "http://x/a.pls");
        assert_eq!(root.tags, vec!["a"]);
    }

    #[test]
    fn test_channel_title_falls_back_to_uri() {
        let station = radio_x();
        let mut channel = Channel::new(&station, "http://x/a.pls");
        assert_eq!(channel.title(), "http://x/a.pls");

        channel.streams.push(Stream::new("http://x/s.mp3", "Live", UNKNOWN_LENGTH));
        assert_eq!(channel.title(), "Live");
    }

    #[test]
    fn test_matches_is_conjunctive_over_tokens() {
        let station = radio_x();
        let mut channel = Channel::new(&station, "http://x/jazz/a.pls");
        channel.streams.push(Stream::new("http://x/s.mp3", "Smooth Live", UNKNOWN_LENGTH));

        let empty: [&str; 0] = [];
        assert!(station.channel_matches(&channel, &empty));
        assert!(station.channel_matches(&channel, &["jazz"]));
        assert!(station.channel_matches(&channel, &["radioX"]));
        assert!(station.channel_matches(&channel, &["Radio"]));
        assert!(station.channel_matches(&channel, &["Live"]));
        assert!(station.channel_matches(&channel, &["jazz", "Smooth"]));
        assert!(!station.channel_matches(&channel, &["jazz", "rock"]));
        // Station title matching is case-sensitive
        assert!(!station.channel_matches(&channel, &["radio"]));
        // Tags and station id must match exactly
        assert!(!station.channel_matches(&channel, &["jaz"]));
    }

    #[test]
    fn test_push_channel_and_info() {
        let station = radio_x();
        station.push_channel(Channel::new(&station, "http://x/a.pls"));
        station.push_channel(Channel::new(&station, "http://x/b.pls"));

        let info = station.info();
        assert_eq!(info.id, "radioX");
        let uris: Vec<&str> = info.channels.iter().map(|c| c.uri.as_str()).collect();
        assert_eq!(uris, vec!["http://x/a.pls", "http://x/b.pls"]);
    }

    #[test]
    fn test_contains_uri() {
        let station = radio_x();
        let mut channel = Channel::new(&station, "http://x/a.pls");
        channel.streams.push(Stream::new("http://x/s.mp3", "Live", UNKNOWN_LENGTH));
        assert!(channel.contains_uri("http://x/a.pls"));
        assert!(channel.contains_uri("http://x/s.mp3"));
        assert!(!channel.contains_uri("http://x/t.mp3"));
    }
}
