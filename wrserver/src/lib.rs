//! # wrserver - Serveur web haut niveau basé sur Axum
//!
//! Cette crate porte la surface de contrôle HTTP de WebRadio et son système
//! de logs.
//!
//! ## Fonctionnalités
//!
//! - **API de haut niveau** : montage de sous-routers Axum
//! - **Server-Sent Events (SSE)** : logs en temps réel via `/log-sse`
//! - **Niveau de log dynamique** : `GET/POST /api/log_setup`
//! - **Arrêt gracieux** : Ctrl+C ou annulation d'un `CancellationToken`
//!
//! ## Exemple d'utilisation
//!
//! ```rust,no_run
//! use wrserver::Server;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = wrconfig::get_config()?;
//!     let mut server = Server::new_configured(&config);
//!     server.init_logging(&config).await;
//!     server.start().await?;
//!     server.wait().await;
//!     Ok(())
//! }
//! ```

pub mod logs;
pub mod server;

pub use logs::{LogState, SseLayer, init_console_logging, log_dump, log_sse};
pub use server::{Server, ServerInfo};
