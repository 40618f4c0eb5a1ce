//! # wrcache - Cache de réponses HTTP pour WebRadio
//!
//! Les listes de stations et les playlists `.pls` changent rarement ; cette
//! crate conserve les réponses récupérées afin d'éviter de solliciter les
//! serveurs à chaque démarrage.
//!
//! ## Vue d'ensemble
//!
//! - Stocke le corps de chaque réponse sur disque, ses métadonnées dans SQLite
//! - Conserve les validateurs HTTP (`ETag`, `Last-Modified`) pour les requêtes
//!   conditionnelles
//! - Suit les statistiques d'utilisation (hits, dernière utilisation)
//! - Applique une politique d'éviction LRU au-delà d'un nombre de réponses
//!
//! ## Utilisation
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use wrcache::ResponseCache;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let cache = ResponseCache::new("./cache", 500, Duration::from_secs(3600))?;
//!
//!     cache.put("http://example.com/a.pls", 200, None, None, b"[playlist]").await?;
//!     if let Some(response) = cache.get("http://example.com/a.pls").await? {
//!         println!("{} octets, frais: {}", response.body.len(), response.is_fresh(cache.max_age()));
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Structure des fichiers
//!
//! ```text
//! cache_http/
//! ├── cache.db                      # Base de données SQLite
//! └── 0beec7b5ea3f0fdbc95d0dd47f3c5bc275da8a33.body
//! ```
//!
//! ## Schéma de base de données
//!
//! ```sql
//! CREATE TABLE responses (
//!     pk TEXT PRIMARY KEY,           -- Clé unique (hash SHA1 de l'URL)
//!     source_url TEXT NOT NULL,      -- URL source
//!     status INTEGER NOT NULL,       -- Statut HTTP
//!     etag TEXT,                     -- Validateur ETag
//!     last_modified TEXT,            -- Validateur Last-Modified
//!     hits INTEGER DEFAULT 0,        -- Nombre d'accès
//!     fetched_at TEXT NOT NULL,      -- Dernière récupération réseau (RFC3339)
//!     last_used TEXT NOT NULL        -- Dernière utilisation (RFC3339)
//! );
//! ```

pub mod cache;
pub mod db;

#[cfg(feature = "wrconfig")]
pub mod config_ext;

pub use cache::{pk_from_url, CachedResponse, ResponseCache};
pub use db::{CacheEntry, DB};

#[cfg(feature = "wrconfig")]
pub use config_ext::CacheConfigExt;
