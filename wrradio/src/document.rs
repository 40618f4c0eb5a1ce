//! Sectioned key/value documents
//!
//! The station list, `.pls` playlists and the favorites scoreboard all use
//! the same `[section]` / `key=value` layout:
//!
//! ```text
//! # comment
//! [radiox]
//! uri = http://x/
//! title = Radio X
//! noise1 = \(live\)
//!   continued on the next line
//! ```
//!
//! Key lookup ignores case but keys keep their spelling, so URI-keyed
//! documents survive a read/write cycle. The writer escapes `%` and `=` in
//! keys.

use crate::error::{Error, Result};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// One `[name]` block with its entries in document order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Section {
    name: String,
    entries: Vec<(String, String)>,
}

impl Section {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Value of `key`, compared case-insensitively
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Sets `key`, replacing an existing entry in place
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self
            .entries
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(&key))
        {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        let index = self
            .entries
            .iter()
            .position(|(k, _)| k.eq_ignore_ascii_case(key))?;
        Some(self.entries.remove(index).1)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A parsed document: ordered sections
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    sections: Vec<Section>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses `text`; `source` names the document in error messages
    ///
    /// A repeated section header continues the earlier section.
    pub fn parse(source: &str, text: &str) -> Result<Self> {
        let mut doc = Document::new();
        let mut current: Option<usize> = None;
        let mut last_key: Option<String> = None;

        for (lineno, raw) in text.lines().enumerate() {
            let line = raw.trim_end_matches('\r');
            let trimmed = line.trim();

            if trimmed.is_empty() {
                last_key = None;
                continue;
            }
            if trimmed.starts_with('#') || trimmed.starts_with(';') {
                continue;
            }

            // Continuation of the previous value
            if line.starts_with([' ', '\t']) {
                if let (Some(index), Some(key)) = (current, last_key.as_ref()) {
                    let section = &mut doc.sections[index];
                    let value = format!("{}\n{}", section.get(key).unwrap_or_default(), trimmed);
                    section.set(key.clone(), value);
                    continue;
                }
            }

            if trimmed.starts_with('[') && trimmed.ends_with(']') {
                let name = trimmed[1..trimmed.len() - 1].trim();
                if name.is_empty() {
                    return Err(Error::parse(
                        source,
                        format!("line {}: empty section name", lineno + 1),
                    ));
                }
                current = Some(doc.section_index(name));
                last_key = None;
                continue;
            }

            let (key, value) = split_entry(trimmed).ok_or_else(|| {
                Error::parse(
                    source,
                    format!("line {}: expected key=value, got {:?}", lineno + 1, trimmed),
                )
            })?;

            let index = current.ok_or_else(|| {
                Error::parse(
                    source,
                    format!("line {}: entry {:?} outside of any section", lineno + 1, key),
                )
            })?;

            let key = unescape_key(key);
            doc.sections[index].set(key.clone(), value);
            last_key = Some(key);
        }

        Ok(doc)
    }

    /// Reads and parses a file
    pub fn read(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::parse(&path.display().to_string(), &text)
    }

    /// Writes the document to a sibling temporary file then renames it over `path`
    pub fn write_atomic(&self, path: &Path) -> Result<()> {
        let tmp = temp_path(path);
        fs::write(&tmp, self.to_string()).map_err(|e| Error::persistence(&tmp, e))?;
        fs::rename(&tmp, path).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            Error::persistence(path, e)
        })
    }

    fn section_index(&mut self, name: &str) -> usize {
        match self.sections.iter().position(|s| s.name == name) {
            Some(index) => index,
            None => {
                self.sections.push(Section::new(name));
                self.sections.len() - 1
            }
        }
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// Section by name; exact match first, then ignoring case
    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections
            .iter()
            .find(|s| s.name == name)
            .or_else(|| self.sections.iter().find(|s| s.name.eq_ignore_ascii_case(name)))
    }

    /// Section by exact name, created at the end when missing
    pub fn section_mut(&mut self, name: &str) -> &mut Section {
        let index = self.section_index(name);
        &mut self.sections[index]
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, section) in self.sections.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            writeln!(f, "[{}]", section.name)?;
            for (key, value) in section.entries() {
                let mut lines = value.split('\n');
                writeln!(f, "{} = {}", escape_key(key), lines.next().unwrap_or_default())?;
                for line in lines {
                    writeln!(f, "\t{}", line)?;
                }
            }
        }
        Ok(())
    }
}

fn split_entry(line: &str) -> Option<(&str, String)> {
    let pos = line.find('=').or_else(|| line.find(':'))?;
    let key = line[..pos].trim();
    if key.is_empty() {
        return None;
    }
    Some((key, line[pos + 1..].trim().to_string()))
}

fn escape_key(key: &str) -> String {
    key.replace('%', "%25").replace('=', "%3D")
}

fn unescape_key(key: &str) -> String {
    key.replace("%3D", "=")
        .replace("%3d", "=")
        .replace("%25", "%")
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATIONS: &str = "\
# Station list
[radioX]
uri = http://x/
Title: Radio X
noise1 = \\(live\\)

[other]
uri=http://o/
title=Other
alias.hq = high
";

    #[test]
    fn test_parse_sections_in_order() {
        let doc = Document::parse("stations", STATIONS).unwrap();
        let names: Vec<&str> = doc.sections().iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["radioX", "other"]);

        let x = doc.section("radioX").unwrap();
        assert_eq!(x.get("uri"), Some("http://x/"));
        assert_eq!(x.get("title"), Some("Radio X"));
        assert_eq!(x.get("noise1"), Some("\\(live\\)"));
        assert_eq!(doc.section("other").unwrap().get("ALIAS.HQ"), Some("high"));
    }

    #[test]
    fn test_first_equal_sign_wins_over_colon() {
        let doc = Document::parse("t", "[s]\nuri = http://a/b?c=d\n").unwrap();
        assert_eq!(doc.section("s").unwrap().get("uri"), Some("http://a/b?c=d"));
    }

    #[test]
    fn test_continuation_lines() {
        let doc = Document::parse("t", "[s]\nkey = one\n  two\n\tthree\n").unwrap();
        assert_eq!(doc.section("s").unwrap().get("key"), Some("one\ntwo\nthree"));
    }

    #[test]
    fn test_entry_before_section_is_error() {
        let err = Document::parse("broken", "uri = http://x/\n[s]\n").unwrap_err();
        match err {
            Error::Parse { document, message } => {
                assert_eq!(document, "broken");
                assert!(message.contains("line 1"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_line_without_delimiter_is_error() {
        assert!(Document::parse("t", "[s]\njust words\n").is_err());
    }

    #[test]
    fn test_section_lookup_falls_back_to_case_insensitive() {
        let doc = Document::parse("pls", "[Playlist]\nNumberOfEntries=0\n").unwrap();
        let playlist = doc.section("playlist").unwrap();
        assert_eq!(playlist.get("numberofentries"), Some("0"));
    }

    #[test]
    fn test_uri_keys_survive_write_and_read() {
        let mut doc = Document::new();
        let section = doc.section_mut("favorites");
        section.set("http://Host/a.pls?x=1", "3");
        section.set("http://host/100%.mp3", "1");

        let text = doc.to_string();
        assert!(text.contains("http://Host/a.pls?x%3D1 = 3"));

        let back = Document::parse("favorites", &text).unwrap();
        let entries: Vec<(&str, &str)> = back.section("favorites").unwrap().entries().collect();
        assert_eq!(
            entries,
            vec![("http://Host/a.pls?x=1", "3"), ("http://host/100%.mp3", "1")]
        );
    }

    #[test]
    fn test_write_atomic_replaces_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("favorites");
        std::fs::write(&path, "old").unwrap();

        let mut doc = Document::new();
        doc.section_mut("favorites").set("u", "1");
        doc.write_atomic(&path).unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[favorites]\nu = 1\n");
        assert!(!dir.path().join("favorites.tmp").exists());
    }

    #[test]
    fn test_set_replaces_and_remove() {
        let mut section = Section::new("s");
        section.set("Key", "1");
        section.set("key", "2");
        assert_eq!(section.len(), 1);
        assert_eq!(section.get("KEY"), Some("2"));
        assert_eq!(section.remove("key"), Some("2".to_string()));
        assert!(section.is_empty());
    }
}
