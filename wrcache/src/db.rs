//! Module de gestion de la base de données SQLite pour le cache
//!
//! Ce module conserve les métadonnées des réponses HTTP mises en cache
//! (statut, validateurs, date de récupération) avec le suivi des accès.

use chrono::{SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;
use std::path::Path;
use std::sync::Mutex;

const TABLE: &str = "responses";

/// Entrée de cache représentant une réponse HTTP dans la base de données
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct CacheEntry {
    /// Clé primaire unique de l'élément (hash SHA1 de l'URL)
    pub pk: String,
    /// URL source de la réponse
    pub source_url: String,
    /// Code de statut HTTP
    pub status: u16,
    /// Validateur `ETag` renvoyé par le serveur
    pub etag: Option<String>,
    /// Validateur `Last-Modified` renvoyé par le serveur
    pub last_modified: Option<String>,
    /// Nombre d'accès à l'élément
    pub hits: i64,
    /// Date/heure de la dernière récupération réseau (RFC3339)
    pub fetched_at: String,
    /// Date/heure du dernier accès (RFC3339)
    pub last_used: String,
}

impl CacheEntry {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(CacheEntry {
            pk: row.get(0)?,
            source_url: row.get(1)?,
            status: row.get(2)?,
            etag: row.get(3)?,
            last_modified: row.get(4)?,
            hits: row.get(5)?,
            fetched_at: row.get(6)?,
            last_used: row.get(7)?,
        })
    }
}

const COLUMNS: &str = "pk, source_url, status, etag, last_modified, hits, fetched_at, last_used";

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Base de données SQLite pour le cache
///
/// Gère les métadonnées des réponses en cache :
/// - Clés primaires (pk) et URLs sources
/// - Validateurs HTTP (etag, last_modified)
/// - Statistiques d'utilisation (hits, last_used)
#[derive(Debug)]
pub struct DB {
    conn: Mutex<Connection>,
}

impl DB {
    /// Initialise la base de données et crée la table si nécessaire
    ///
    /// # Exemple
    ///
    /// ```rust,no_run
    /// use wrcache::db::DB;
    /// use std::path::Path;
    ///
    /// let db = DB::init(Path::new("cache.db")).unwrap();
    /// ```
    pub fn init(path: &Path) -> Result<Self, rusqlite::Error> {
        let conn = Connection::open(path)?;

        conn.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS {TABLE} (
                    pk TEXT PRIMARY KEY,
                    source_url TEXT NOT NULL,
                    status INTEGER NOT NULL,
                    etag TEXT,
                    last_modified TEXT,
                    hits INTEGER DEFAULT 0,
                    fetched_at TEXT NOT NULL,
                    last_used TEXT NOT NULL
                )"
            ),
            [],
        )?;

        // Index composite pour la politique LRU (get_oldest)
        conn.execute(
            &format!(
                "CREATE INDEX IF NOT EXISTS idx_{TABLE}_lru ON {TABLE} (last_used ASC, hits ASC)"
            ),
            [],
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Ajoute ou remplace une réponse
    ///
    /// Le compteur d'accès est conservé lors d'un remplacement.
    pub fn upsert(
        &self,
        pk: &str,
        url: &str,
        status: u16,
        etag: Option<&str>,
        last_modified: Option<&str>,
    ) -> rusqlite::Result<()> {
        let conn = self.conn.lock().unwrap();
        let stamp = now();
        conn.execute(
            &format!(
                "INSERT INTO {TABLE} ({COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6, ?6)
                 ON CONFLICT(pk) DO UPDATE SET
                     source_url = excluded.source_url,
                     status = excluded.status,
                     etag = excluded.etag,
                     last_modified = excluded.last_modified,
                     fetched_at = excluded.fetched_at,
                     last_used = excluded.last_used"
            ),
            params![pk, url, status, etag, last_modified, stamp],
        )?;
        Ok(())
    }

    /// Récupère une entrée par sa clé, `None` si absente
    pub fn get(&self, pk: &str) -> rusqlite::Result<Option<CacheEntry>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            &format!("SELECT {COLUMNS} FROM {TABLE} WHERE pk = ?1"),
            [pk],
            CacheEntry::from_row,
        )
        .optional()
    }

    /// Met à jour le compteur d'accès et la date du dernier accès
    pub fn update_hit(&self, pk: &str) -> rusqlite::Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            &format!("UPDATE {TABLE} SET hits = hits + 1, last_used = ?1 WHERE pk = ?2"),
            params![now(), pk],
        )?;
        Ok(())
    }

    /// Marque une réponse comme revalidée (réponse 304)
    pub fn touch_fetched(&self, pk: &str) -> rusqlite::Result<()> {
        let conn = self.conn.lock().unwrap();
        let stamp = now();
        conn.execute(
            &format!("UPDATE {TABLE} SET fetched_at = ?1, last_used = ?1 WHERE pk = ?2"),
            params![stamp, pk],
        )?;
        Ok(())
    }

    /// Purge toutes les entrées de la base de données
    pub fn purge(&self) -> rusqlite::Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(&format!("DELETE FROM {TABLE}"), [])?;
        Ok(())
    }

    /// Récupère toutes les entrées, triées par nombre d'accès décroissant
    pub fn get_all(&self) -> rusqlite::Result<Vec<CacheEntry>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM {TABLE} ORDER BY hits DESC"
        ))?;
        let entries = stmt
            .query_map([], CacheEntry::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }

    /// Supprime une entrée de la base de données
    pub fn delete(&self, pk: &str) -> rusqlite::Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(&format!("DELETE FROM {TABLE} WHERE pk = ?1"), [pk])?;
        Ok(())
    }

    /// Compte le nombre total d'entrées dans le cache
    pub fn count(&self) -> rusqlite::Result<usize> {
        let conn = self.conn.lock().unwrap();
        let count: i64 =
            conn.query_row(&format!("SELECT COUNT(*) FROM {TABLE}"), [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Récupère les N entrées les moins récemment utilisées
    ///
    /// Trie par last_used (les plus anciens en premier), puis par hits.
    pub fn get_oldest(&self, limit: usize) -> rusqlite::Result<Vec<CacheEntry>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM {TABLE} ORDER BY last_used ASC, hits ASC LIMIT ?1"
        ))?;
        let entries = stmt
            .query_map([limit as i64], CacheEntry::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }
}
