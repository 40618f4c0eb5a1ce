//! Station list loader
//!
//! The station list is a sectioned document, one section per station:
//!
//! ```text
//! [radiox]
//! uri = http://x/
//! title = Radio X
//! streams = http://cdn.x/
//! noise1 = \(128k\)
//! alias.hq = high-quality
//! ```
//!
//! `uri` and `title` are required. `noise1..N` are read until the first gap.

use crate::document::{Document, Section};
use crate::error::{Error, Result};
use crate::models::Station;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// File name looked up in each search directory
pub const STATION_LIST_NAME: &str = "stations";

const ALIAS_PREFIX: &str = "alias.";

/// Finds the station list: the explicit path when given, else the first
/// search directory holding a `stations` file.
pub fn locate_station_list(explicit: Option<&Path>, search_dirs: &[PathBuf]) -> Result<PathBuf> {
    if let Some(path) = explicit {
        if path.is_file() {
            return Ok(path.to_path_buf());
        }
        return Err(Error::configuration(format!(
            "station list {} does not exist",
            path.display()
        )));
    }

    for dir in search_dirs {
        let candidate = dir.join(STATION_LIST_NAME);
        debug!(path = %candidate.display(), "Looking for station list");
        if candidate.is_file() {
            return Ok(candidate);
        }
    }

    let searched: Vec<String> = search_dirs.iter().map(|d| d.display().to_string()).collect();
    Err(Error::configuration(format!(
        "cannot find station list in [{}]",
        searched.join(", ")
    )))
}

/// Locates and parses the station list
pub fn load_station_list(explicit: Option<&Path>, search_dirs: &[PathBuf]) -> Result<Vec<Station>> {
    let path = locate_station_list(explicit, search_dirs)?;
    info!(path = %path.display(), "Reading stations");
    let text = std::fs::read_to_string(&path)
        .map_err(|e| Error::configuration(format!("cannot read {}: {}", path.display(), e)))?;
    parse_station_list(&path.display().to_string(), &text)
}

/// Parses a station list document, keeping section order
pub fn parse_station_list(source: &str, text: &str) -> Result<Vec<Station>> {
    let doc = Document::parse(source, text)?;
    doc.sections()
        .iter()
        .map(|section| station_from_section(source, section))
        .collect()
}

fn required<'a>(source: &str, section: &'a Section, key: &str) -> Result<&'a str> {
    section.get(key).ok_or_else(|| {
        Error::parse(
            source,
            format!("station [{}] has no `{}`", section.name(), key),
        )
    })
}

fn station_from_section(source: &str, section: &Section) -> Result<Station> {
    let uri = required(source, section, "uri")?;
    let title = required(source, section, "title")?;

    let mut station = Station::new(section.name(), title, uri)?;

    if let Some(prefix) = section.get("streams") {
        station.set_stream_uri_prefix(prefix);
    }

    let mut i = 1;
    while let Some(pattern) = section.get(&format!("noise{i}")) {
        station.add_noise_filter(pattern).map_err(|e| {
            Error::parse(
                source,
                format!("station [{}] noise{}: {}", section.name(), i, e),
            )
        })?;
        i += 1;
    }

    for (key, value) in section.entries() {
        let is_alias = key
            .get(..ALIAS_PREFIX.len())
            .is_some_and(|p| p.eq_ignore_ascii_case(ALIAS_PREFIX));
        if is_alias && key.len() > ALIAS_PREFIX.len() {
            station.add_alias(&key[ALIAS_PREFIX.len()..], value);
        }
    }

    Ok(station)
}
