//! # Module Server - API de haut niveau pour Axum
//!
//! Ce module fournit une abstraction simple pour exposer la surface de
//! contrôle HTTP de WebRadio, en cachant la configuration et le routage.
//!
//! - Sous-routers montés avec `add_router()`
//! - Logs SSE intégrés avec `init_logging()`
//! - Arrêt gracieux sur Ctrl+C ou sur annulation d'un `CancellationToken`

use crate::logs::{LogState, create_log_view_router, create_logs_router, init_logging};
use anyhow::Result;
use axum::Router;
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::{signal, sync::RwLock, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use wrconfig::Config;

/// Info serveur sérialisable
#[derive(Clone, Debug, Serialize)]
pub struct ServerInfo {
    pub name: String,
    pub base_url: String,
    pub http_port: u16,
}

/// Serveur principal
pub struct Server {
    name: String,
    base_url: String,
    http_port: u16,
    router: Arc<RwLock<Router>>,
    join_handle: Option<JoinHandle<()>>,
    local_addr: Option<SocketAddr>,
    shutdown: CancellationToken,
    log_state: Option<LogState>,
}

impl Server {
    /// Crée une nouvelle instance de serveur
    ///
    /// # Arguments
    ///
    /// * `name` - Nom du serveur (pour les logs)
    /// * `base_url` - Adresse d'écoute (ex: "127.0.0.1")
    /// * `http_port` - Port HTTP à écouter, 0 pour un port libre
    pub fn new(name: impl Into<String>, base_url: impl Into<String>, http_port: u16) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            http_port,
            router: Arc::new(RwLock::new(Router::new())),
            join_handle: None,
            local_addr: None,
            shutdown: CancellationToken::new(),
            log_state: None,
        }
    }

    /// Crée un serveur à partir de `host.base_url` et `host.http_port`
    pub fn new_configured(config: &Config) -> Self {
        Self::new("WebRadio", config.get_base_url(), config.get_http_port())
    }

    /// Jeton annulé à l'arrêt du serveur ; l'annuler arrête le serveur
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Ajoute un sous-router au serveur
    ///
    /// - Si `path` est "/", merge directement au router principal
    /// - Sinon, nest le router sous le chemin donné
    pub async fn add_router(&mut self, path: &str, sub_router: Router) {
        let mut r = self.router.write().await;

        *r = if path == "/" {
            std::mem::take(&mut *r).merge(sub_router)
        } else {
            let normalized = format!("/{}", path.trim_start_matches('/'));
            std::mem::take(&mut *r).nest(&normalized, sub_router)
        };
    }

    /// Démarre le serveur HTTP
    ///
    /// Le port est réservé avant de rendre la main, une erreur de bind est
    /// donc remontée immédiatement. Le serveur s'arrête sur Ctrl+C ou quand
    /// le jeton d'arrêt est annulé.
    pub async fn start(&mut self) -> Result<()> {
        let addr: SocketAddr = format!("{}:{}", self.base_url, self.http_port)
            .parse()
            .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], self.http_port)));

        let listener = tokio::net::TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        self.local_addr = Some(local_addr);
        info!(
            "Server {} running at http://{}:{}",
            self.name,
            self.base_url,
            local_addr.port()
        );

        let router = self.router.read().await.clone();
        let token = self.shutdown.clone();

        let ctrl_c_token = token.clone();
        tokio::spawn(async move {
            tokio::select! {
                res = signal::ctrl_c() => {
                    if let Err(e) = res {
                        warn!("Unable to listen for Ctrl+C: {}", e);
                        return;
                    }
                    info!("Ctrl+C reçu, arrêt gracieux");
                    ctrl_c_token.cancel();
                }
                _ = ctrl_c_token.cancelled() => {}
            }
        });

        self.join_handle = Some(tokio::spawn(async move {
            let shutdown = token.clone();
            if let Err(e) = axum::serve(listener, router.into_make_service())
                .with_graceful_shutdown(async move { shutdown.cancelled().await })
                .await
            {
                warn!("HTTP server stopped with error: {}", e);
            }
            token.cancel();
        }));

        Ok(())
    }

    /// Attend la fin du serveur
    pub async fn wait(&mut self) {
        if let Some(h) = self.join_handle.take() {
            let _ = h.await;
        }
    }

    /// Adresse effectivement liée, disponible après `start()`
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Récupère les infos du serveur
    pub fn info(&self) -> ServerInfo {
        ServerInfo {
            name: self.name.clone(),
            base_url: self.base_url.clone(),
            http_port: self.local_addr.map(|a| a.port()).unwrap_or(self.http_port),
        }
    }

    /// Initialise le système de logging et enregistre les routes de logs
    ///
    /// Routes enregistrées : `/log-sse`, `/log-dump` et `/api/log_setup`.
    pub async fn init_logging(&mut self, config: &Config) -> LogState {
        let log_state = init_logging(config);
        self.add_log_routes(log_state.clone()).await;
        log_state
    }

    /// Enregistre les routes de logs pour un `LogState` existant
    pub async fn add_log_routes(&mut self, log_state: LogState) {
        self.add_router("/", create_log_view_router(log_state.clone()))
            .await;
        self.add_router("/api", create_logs_router(log_state.clone()))
            .await;
        self.log_state = Some(log_state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::get;

    #[tokio::test]
    async fn test_serves_router_and_stops_on_cancel() {
        let mut server = Server::new("test", "127.0.0.1", 0);
        server
            .add_router("/api", Router::new().route("/ping", get(|| async { "pong" })))
            .await;
        server.start().await.unwrap();

        let addr = server.local_addr().unwrap();
        assert_eq!(server.info().http_port, addr.port());
        let body = reqwest::get(format!("http://{}/api/ping", addr))
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert_eq!(body, "pong");

        server.shutdown_token().cancel();
        tokio::time::timeout(std::time::Duration::from_secs(5), server.wait())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_bind_conflict_is_reported() {
        let mut first = Server::new("first", "127.0.0.1", 0);
        first.start().await.unwrap();
        let port = first.local_addr().unwrap().port();

        let mut second = Server::new("second", "127.0.0.1", port);
        assert!(second.start().await.is_err());

        first.shutdown_token().cancel();
        first.wait().await;
    }
}
