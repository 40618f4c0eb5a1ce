//! Wishlist of stream titles, one per line

use crate::error::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone)]
pub struct Wishlist {
    path: PathBuf,
    titles: Vec<String>,
}

impl Wishlist {
    /// Loads the wishlist at `path`; a missing file is an empty list
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let titles = match fs::read_to_string(&path) {
            Ok(text) => text
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(Error::persistence(&path, e)),
        };
        Ok(Self { path, titles })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn titles(&self) -> &[String] {
        &self.titles
    }

    pub fn contains(&self, title: &str) -> bool {
        self.titles.iter().any(|t| t == title)
    }

    /// Adds or removes `title`, then rewrites the file
    ///
    /// Returns true when the title is now in the wishlist.
    pub fn toggle(&mut self, title: &str) -> Result<bool> {
        let title = title.trim();
        let added = match self.titles.iter().position(|t| t == title) {
            Some(index) => {
                self.titles.remove(index);
                false
            }
            None => {
                self.titles.push(title.to_string());
                true
            }
        };
        self.save()?;
        info!(title, added, "Wishlist updated");
        Ok(added)
    }

    fn save(&self) -> Result<()> {
        let mut text = self.titles.join("\n");
        if !text.is_empty() {
            text.push('\n');
        }
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, text).map_err(|e| Error::persistence(&tmp, e))?;
        fs::rename(&tmp, &self.path).map_err(|e| Error::persistence(&self.path, e))
    }
}
