//! Extension pour intégrer WebRadio dans wrconfig
//!
//! Les clés vivent sous `webradio` :
//!
//! ```yaml
//! webradio:
//!   stations:
//!     file: ""          # chemin explicite de la liste des stations
//!     search_dirs: []   # vide = répertoires par défaut
//!   fetch:
//!     timeout_secs: 30
//!     retries: 1
//!   favorites:
//!     file: favorites
//!     interval_secs: 300
//!   preferences:
//!     tags: ""
//!     channel_uri: ""
//!   wishlist:
//!     file: wishlist
//! ```
//!
//! # Exemple
//!
//! ```no_run
//! use wrconfig::get_config;
//! use wrradio::WebRadioConfigExt;
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = get_config()?;
//! let stations = config.load_stations()?;
//! println!("{} stations", stations.len());
//! # Ok(())
//! # }
//! ```

use crate::client::{HttpFetcher, DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_RETRIES, DEFAULT_USER_AGENT};
use crate::favorites::{Scoreboard, DEFAULT_SCORE_INTERVAL};
use crate::models::Station;
use crate::stations::load_station_list;
use crate::wishlist::Wishlist;
use anyhow::Result;
use serde_yaml::{Number, Value};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use wrcache::ResponseCache;
use wrconfig::Config;

const SECTION: &str = "webradio";
const DEFAULT_FAVORITES_FILE: &str = "favorites";
const DEFAULT_WISHLIST_FILE: &str = "wishlist";

/// Trait d'extension pour ajouter la configuration WebRadio à wrconfig
pub trait WebRadioConfigExt {
    /// Chemin explicite de la liste des stations, `None` si non configuré
    fn get_station_list_file(&self) -> Result<Option<PathBuf>>;

    fn set_station_list_file(&self, path: &str) -> Result<()>;

    /// Répertoires où chercher la liste des stations, dans l'ordre
    fn get_station_search_dirs(&self) -> Result<Vec<PathBuf>>;

    fn set_station_search_dirs(&self, dirs: &[String]) -> Result<()>;

    /// Charge la liste des stations configurée
    fn load_stations(&self) -> Result<Vec<Station>>;

    fn get_fetch_timeout(&self) -> Result<Duration>;

    fn set_fetch_timeout(&self, timeout: Duration) -> Result<()>;

    fn get_fetch_user_agent(&self) -> Result<String>;

    fn get_fetch_retries(&self) -> Result<u32>;

    fn set_fetch_retries(&self, retries: u32) -> Result<()>;

    /// Crée un client HTTP configuré, partageant éventuellement un cache
    fn create_fetcher(&self, cache: Option<Arc<ResponseCache>>) -> Result<HttpFetcher>;

    fn get_favorites_file(&self) -> Result<PathBuf>;

    /// Période d'incrément du score du flux en cours
    fn get_score_interval(&self) -> Result<Duration>;

    fn set_score_interval(&self, interval: Duration) -> Result<()>;

    /// Charge le tableau des scores depuis le fichier configuré
    fn load_scoreboard(&self) -> Result<Scoreboard>;

    /// Filtre de tags utilisateur
    fn get_preferred_tags(&self) -> Result<Vec<String>>;

    fn set_preferred_tags(&self, tags: &[String]) -> Result<()>;

    /// Dernière chaîne jouée
    fn get_last_channel_uri(&self) -> Result<Option<String>>;

    fn set_last_channel_uri(&self, uri: &str) -> Result<()>;

    fn get_wishlist_file(&self) -> Result<PathBuf>;

    fn load_wishlist(&self) -> Result<Wishlist>;
}

fn default_search_dirs(config_dir: &str) -> Vec<PathBuf> {
    let mut dirs = vec![PathBuf::from(config_dir)];
    if let Some(data) = dirs::data_dir() {
        dirs.push(data.join("webradio"));
    }
    dirs.push(PathBuf::from("/usr/local/share/webradio"));
    dirs.push(PathBuf::from("/usr/share/webradio"));
    dirs.push(PathBuf::from("./data"));
    dirs
}

impl WebRadioConfigExt for Config {
    fn get_station_list_file(&self) -> Result<Option<PathBuf>> {
        Ok(self
            .get_string(&[SECTION, "stations", "file"])?
            .filter(|s| !s.trim().is_empty())
            .map(|s| self.resolve_path(s.trim())))
    }

    fn set_station_list_file(&self, path: &str) -> Result<()> {
        self.set_value(&[SECTION, "stations", "file"], Value::String(path.to_string()))
    }

    fn get_station_search_dirs(&self) -> Result<Vec<PathBuf>> {
        let dirs = self.get_string_list(&[SECTION, "stations", "search_dirs"])?;
        if dirs.is_empty() {
            return Ok(default_search_dirs(self.dir()));
        }
        Ok(dirs.iter().map(|d| self.resolve_path(d)).collect())
    }

    fn set_station_search_dirs(&self, dirs: &[String]) -> Result<()> {
        self.set_string_list(&[SECTION, "stations", "search_dirs"], dirs)
    }

    fn load_stations(&self) -> Result<Vec<Station>> {
        let explicit = self.get_station_list_file()?;
        let dirs = self.get_station_search_dirs()?;
        Ok(load_station_list(explicit.as_deref(), &dirs)?)
    }

    fn get_fetch_timeout(&self) -> Result<Duration> {
        match self.get_u64(&[SECTION, "fetch", "timeout_secs"])? {
            Some(n) if n > 0 => Ok(Duration::from_secs(n)),
            _ => {
                let default = Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS);
                self.set_fetch_timeout(default)?;
                Ok(default)
            }
        }
    }

    fn set_fetch_timeout(&self, timeout: Duration) -> Result<()> {
        self.set_value(
            &[SECTION, "fetch", "timeout_secs"],
            Value::Number(Number::from(timeout.as_secs())),
        )
    }

    fn get_fetch_user_agent(&self) -> Result<String> {
        Ok(self
            .get_string(&[SECTION, "fetch", "user_agent"])?
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()))
    }

    fn get_fetch_retries(&self) -> Result<u32> {
        match self.get_u64(&[SECTION, "fetch", "retries"])? {
            Some(n) => Ok(n.min(u32::MAX as u64) as u32),
            None => {
                self.set_fetch_retries(DEFAULT_RETRIES)?;
                Ok(DEFAULT_RETRIES)
            }
        }
    }

    fn set_fetch_retries(&self, retries: u32) -> Result<()> {
        self.set_value(
            &[SECTION, "fetch", "retries"],
            Value::Number(Number::from(retries)),
        )
    }

    fn create_fetcher(&self, cache: Option<Arc<ResponseCache>>) -> Result<HttpFetcher> {
        let mut builder = HttpFetcher::builder()
            .timeout(self.get_fetch_timeout()?)
            .user_agent(self.get_fetch_user_agent()?)
            .retries(self.get_fetch_retries()?);
        if let Some(cache) = cache {
            builder = builder.cache(cache);
        }
        Ok(builder.build()?)
    }

    fn get_favorites_file(&self) -> Result<PathBuf> {
        let file = self
            .get_string(&[SECTION, "favorites", "file"])?
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_FAVORITES_FILE.to_string());
        Ok(self.resolve_path(&file))
    }

    fn get_score_interval(&self) -> Result<Duration> {
        match self.get_u64(&[SECTION, "favorites", "interval_secs"])? {
            Some(n) if n > 0 => Ok(Duration::from_secs(n)),
            _ => {
                self.set_score_interval(DEFAULT_SCORE_INTERVAL)?;
                Ok(DEFAULT_SCORE_INTERVAL)
            }
        }
    }

    fn set_score_interval(&self, interval: Duration) -> Result<()> {
        self.set_value(
            &[SECTION, "favorites", "interval_secs"],
            Value::Number(Number::from(interval.as_secs())),
        )
    }

    fn load_scoreboard(&self) -> Result<Scoreboard> {
        Ok(Scoreboard::load(self.get_favorites_file()?)?)
    }

    fn get_preferred_tags(&self) -> Result<Vec<String>> {
        Ok(self
            .get_string(&[SECTION, "preferences", "tags"])?
            .map(|s| s.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default())
    }

    fn set_preferred_tags(&self, tags: &[String]) -> Result<()> {
        self.set_value(&[SECTION, "preferences", "tags"], Value::String(tags.join(" ")))
    }

    fn get_last_channel_uri(&self) -> Result<Option<String>> {
        Ok(self
            .get_string(&[SECTION, "preferences", "channel_uri"])?
            .filter(|s| !s.is_empty()))
    }

    fn set_last_channel_uri(&self, uri: &str) -> Result<()> {
        self.set_value(
            &[SECTION, "preferences", "channel_uri"],
            Value::String(uri.to_string()),
        )
    }

    fn get_wishlist_file(&self) -> Result<PathBuf> {
        let file = self
            .get_string(&[SECTION, "wishlist", "file"])?
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_WISHLIST_FILE.to_string());
        Ok(self.resolve_path(&file))
    }

    fn load_wishlist(&self) -> Result<Wishlist> {
        Ok(Wishlist::load(self.get_wishlist_file()?)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> (tempfile::TempDir, Config) {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_config(dir.path().to_str().unwrap()).unwrap();
        (dir, config)
    }

    #[test]
    fn test_defaults() {
        let (dir, config) = config();
        assert_eq!(config.get_station_list_file().unwrap(), None);
        assert_eq!(config.get_fetch_timeout().unwrap(), Duration::from_secs(30));
        assert_eq!(config.get_fetch_retries().unwrap(), 1);
        assert_eq!(config.get_score_interval().unwrap(), DEFAULT_SCORE_INTERVAL);
        assert!(config.get_fetch_user_agent().unwrap().starts_with("WebRadio/"));
        assert_eq!(config.get_favorites_file().unwrap(), dir.path().join("favorites"));

        let dirs = config.get_station_search_dirs().unwrap();
        assert_eq!(dirs[0], PathBuf::from(config.dir()));
        assert!(dirs.contains(&PathBuf::from("/usr/share/webradio")));
    }

    #[test]
    fn test_preferences_round_trip() {
        let (_dir, config) = config();
        assert!(config.get_preferred_tags().unwrap().is_empty());
        assert_eq!(config.get_last_channel_uri().unwrap(), None);

        config
            .set_preferred_tags(&["jazz".to_string(), "live".to_string()])
            .unwrap();
        config.set_last_channel_uri("http://x/a.pls").unwrap();

        assert_eq!(config.get_preferred_tags().unwrap(), vec!["jazz", "live"]);
        assert_eq!(
            config.get_last_channel_uri().unwrap().as_deref(),
            Some("http://x/a.pls")
        );
    }

    #[test]
    fn test_load_stations_from_config_dir() {
        let (dir, config) = config();
        assert!(config.load_stations().is_err());

        std::fs::write(
            dir.path().join(crate::stations::STATION_LIST_NAME),
            "[radioX]\nuri=http://x/\ntitle=Radio X\n",
        )
        .unwrap();
        config
            .set_station_search_dirs(&[dir.path().to_string_lossy().to_string()])
            .unwrap();
        let stations = config.load_stations().unwrap();
        assert_eq!(stations[0].id(), "radioX");
    }
}
