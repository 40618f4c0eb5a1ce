//! Extension pour intégrer la gestion du cache HTTP dans wrconfig
//!
//! Les clés vivent sous `host.http_cache` :
//!
//! ```yaml
//! host:
//!   http_cache:
//!     directory: cache_http
//!     size: 500
//!     max_age_secs: 3600
//! ```

use crate::ResponseCache;
use anyhow::Result;
use serde_yaml::{Number, Value};
use std::sync::Arc;
use std::time::Duration;
use wrconfig::Config;

const CACHE_KEY: &str = "http_cache";
const DEFAULT_CACHE_DIR: &str = "cache_http";
const DEFAULT_CACHE_SIZE: usize = 500;
const DEFAULT_MAX_AGE_SECS: u64 = 3600;

/// Trait d'extension pour ajouter la gestion du cache HTTP à wrconfig
///
/// # Exemple
///
/// ```rust,ignore
/// use wrconfig::get_config;
/// use wrcache::CacheConfigExt;
///
/// let config = get_config()?;
/// let cache = config.create_response_cache()?;
/// ```
pub trait CacheConfigExt {
    /// Répertoire absolu du cache (créé si nécessaire)
    fn get_cache_dir(&self) -> Result<String>;

    /// Définit le répertoire du cache (absolu ou relatif au config_dir)
    fn set_cache_dir(&self, directory: String) -> Result<()>;

    /// Nombre maximal de réponses conservées
    fn get_cache_size(&self) -> Result<usize>;

    fn set_cache_size(&self, size: usize) -> Result<()>;

    /// Durée de fraîcheur des réponses
    fn get_cache_max_age(&self) -> Result<Duration>;

    fn set_cache_max_age(&self, max_age: Duration) -> Result<()>;

    /// Crée une instance de cache configurée
    fn create_response_cache(&self) -> Result<Arc<ResponseCache>>;
}

impl CacheConfigExt for Config {
    fn get_cache_dir(&self) -> Result<String> {
        self.get_managed_dir(&["host", CACHE_KEY, "directory"], DEFAULT_CACHE_DIR)
    }

    fn set_cache_dir(&self, directory: String) -> Result<()> {
        self.set_managed_dir(&["host", CACHE_KEY, "directory"], directory)
    }

    fn get_cache_size(&self) -> Result<usize> {
        match self.get_u64(&["host", CACHE_KEY, "size"])? {
            Some(n) => Ok(n as usize),
            None => {
                self.set_cache_size(DEFAULT_CACHE_SIZE)?;
                Ok(DEFAULT_CACHE_SIZE)
            }
        }
    }

    fn set_cache_size(&self, size: usize) -> Result<()> {
        self.set_value(&["host", CACHE_KEY, "size"], Value::Number(Number::from(size)))
    }

    fn get_cache_max_age(&self) -> Result<Duration> {
        match self.get_u64(&["host", CACHE_KEY, "max_age_secs"])? {
            Some(n) => Ok(Duration::from_secs(n)),
            None => {
                let default = Duration::from_secs(DEFAULT_MAX_AGE_SECS);
                self.set_cache_max_age(default)?;
                Ok(default)
            }
        }
    }

    fn set_cache_max_age(&self, max_age: Duration) -> Result<()> {
        self.set_value(
            &["host", CACHE_KEY, "max_age_secs"],
            Value::Number(Number::from(max_age.as_secs())),
        )
    }

    fn create_response_cache(&self) -> Result<Arc<ResponseCache>> {
        let dir = self.get_cache_dir()?;
        let size = self.get_cache_size()?;
        let max_age = self.get_cache_max_age()?;
        Ok(Arc::new(ResponseCache::new(&dir, size, max_age)?))
    }
}
