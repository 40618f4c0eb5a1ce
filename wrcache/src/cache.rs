//! Cache des réponses HTTP
//!
//! Chaque réponse est stockée sous la forme d'un fichier `<pk>.body` dans le
//! répertoire du cache, ses métadonnées dans la base SQLite `cache.db`.

use crate::db::{CacheEntry, DB};
use anyhow::Result;
use chrono::{DateTime, Utc};
use sha1::{Digest, Sha1};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Calcule la clé primaire d'une URL (SHA1 en hexadécimal)
///
/// ```
/// let pk = wrcache::pk_from_url("http://example.com/");
/// assert_eq!(pk.len(), 40);
/// ```
pub fn pk_from_url(url: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}

/// Réponse relue depuis le cache
#[derive(Debug, Clone)]
pub struct CachedResponse {
    pub url: String,
    pub status: u16,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    pub body: Vec<u8>,
    pub fetched_at: DateTime<Utc>,
}

impl CachedResponse {
    /// Vrai si la réponse a été récupérée il y a moins de `max_age`
    pub fn is_fresh(&self, max_age: Duration) -> bool {
        let age = Utc::now().signed_duration_since(self.fetched_at);
        match chrono::Duration::from_std(max_age) {
            Ok(max_age) => age < max_age,
            Err(_) => true,
        }
    }

    /// Vrai si la réponse porte un validateur utilisable pour une requête conditionnelle
    pub fn has_validator(&self) -> bool {
        self.etag.is_some() || self.last_modified.is_some()
    }
}

/// Cache de réponses HTTP sur disque
///
/// Note : ce type est conçu pour être partagé derrière un `Arc<ResponseCache>`.
/// La synchronisation est assurée par le Mutex interne de la base SQLite.
#[derive(Debug)]
pub struct ResponseCache {
    /// Répertoire de stockage
    dir: PathBuf,
    /// Limite de taille du cache (nombre de réponses)
    limit: usize,
    /// Durée pendant laquelle une réponse est servie sans revalidation
    max_age: Duration,
    /// Base de données SQLite
    pub db: Arc<DB>,
}

impl ResponseCache {
    /// Crée (ou rouvre) un cache dans `dir`
    ///
    /// # Arguments
    ///
    /// * `dir` - Répertoire de stockage du cache
    /// * `limit` - Nombre maximal de réponses conservées
    /// * `max_age` - Durée de fraîcheur d'une réponse
    pub fn new(dir: &str, limit: usize, max_age: Duration) -> Result<Self> {
        let directory = PathBuf::from(dir);
        std::fs::create_dir_all(&directory)?;
        let db = DB::init(&directory.join("cache.db"))?;

        Ok(Self {
            dir: directory,
            limit,
            max_age,
            db: Arc::new(db),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    fn body_path(&self, pk: &str) -> PathBuf {
        self.dir.join(format!("{pk}.body"))
    }

    /// Relit la réponse associée à `url`
    ///
    /// Une entrée dont le fichier a disparu est supprimée et traitée comme absente.
    pub async fn get(&self, url: &str) -> Result<Option<CachedResponse>> {
        let pk = pk_from_url(url);
        let entry = match self.db.get(&pk)? {
            Some(entry) => entry,
            None => return Ok(None),
        };

        let body = match tokio::fs::read(self.body_path(&pk)).await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(url, "Cached body unreadable, dropping entry: {}", e);
                self.db.delete(&pk)?;
                return Ok(None);
            }
        };

        self.db.update_hit(&pk)?;
        Ok(Some(Self::to_response(entry, body)))
    }

    fn to_response(entry: CacheEntry, body: Vec<u8>) -> CachedResponse {
        let fetched_at = DateTime::parse_from_rfc3339(&entry.fetched_at)
            .map(|d| d.with_timezone(&Utc))
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
        CachedResponse {
            url: entry.source_url,
            status: entry.status,
            etag: entry.etag,
            last_modified: entry.last_modified,
            body,
            fetched_at,
        }
    }

    /// Enregistre une réponse puis applique la politique d'éviction
    pub async fn put(
        &self,
        url: &str,
        status: u16,
        etag: Option<&str>,
        last_modified: Option<&str>,
        body: &[u8],
    ) -> Result<()> {
        let pk = pk_from_url(url);
        tokio::fs::write(self.body_path(&pk), body).await?;
        self.db.upsert(&pk, url, status, etag, last_modified)?;

        if let Err(e) = self.enforce_limit().await {
            tracing::warn!("Error enforcing cache limit: {}", e);
        }
        Ok(())
    }

    /// Marque la réponse de `url` comme revalidée par le serveur
    pub fn refresh(&self, url: &str) -> Result<()> {
        self.db.touch_fetched(&pk_from_url(url))?;
        Ok(())
    }

    /// Nombre de réponses en cache
    pub fn count(&self) -> Result<usize> {
        Ok(self.db.count()?)
    }

    /// Supprime toutes les réponses
    pub async fn purge(&self) -> Result<()> {
        for entry in self.db.get_all()? {
            let _ = tokio::fs::remove_file(self.body_path(&entry.pk)).await;
        }
        self.db.purge()?;
        Ok(())
    }

    /// Applique la politique d'éviction LRU (Least Recently Used)
    ///
    /// Retourne le nombre d'entrées supprimées.
    pub async fn enforce_limit(&self) -> Result<usize> {
        let count = self.db.count()?;

        if count <= self.limit {
            return Ok(0);
        }

        let to_remove = count - self.limit;
        let old_entries = self.db.get_oldest(to_remove)?;

        let mut removed = 0;
        for entry in old_entries {
            let _ = tokio::fs::remove_file(self.body_path(&entry.pk)).await;

            if let Err(e) = self.db.delete(&entry.pk) {
                tracing::warn!("Error deleting entry {} from DB: {}", entry.pk, e);
            } else {
                removed += 1;
            }
        }

        if removed > 0 {
            tracing::info!(
                "LRU eviction: removed {} old entries (cache size: {} -> {})",
                removed,
                count,
                count - removed
            );
        }

        Ok(removed)
    }
}
