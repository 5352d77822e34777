//! Web server.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;

use crate::auth::JwtAuthenticator;
use crate::chat::ChatGateway;
use crate::config::Config;
use crate::{ChatError, Database, Result};

use super::handlers::AppState;
use super::middleware::SharedAuthenticator;
use super::router::{create_health_router, create_router};

/// HTTP + WebSocket server for the chat core.
pub struct WebServer {
    /// Server address.
    addr: SocketAddr,
    /// Application state.
    app_state: Arc<AppState>,
    /// Credential verifier.
    authenticator: SharedAuthenticator,
    /// Allowed CORS origins.
    cors_origins: Vec<String>,
}

impl WebServer {
    /// Create a new web server.
    pub fn new(
        addr: SocketAddr,
        gateway: Arc<ChatGateway>,
        authenticator: SharedAuthenticator,
        cors_origins: Vec<String>,
    ) -> Self {
        Self {
            addr,
            app_state: Arc::new(AppState::new(gateway)),
            authenticator,
            cors_origins,
        }
    }

    /// Wire every component from configuration over an opened database.
    pub fn from_config(config: &Config, db: &Database) -> Result<Self> {
        let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
            .parse()
            .map_err(|e| ChatError::Config(format!("invalid server address: {e}")))?;

        let authenticator: SharedAuthenticator =
            Arc::new(JwtAuthenticator::from_config(&config.auth));
        let gateway = Arc::new(ChatGateway::new(
            db,
            Arc::clone(&authenticator),
            &config.chat,
        ));

        Ok(Self::new(
            addr,
            gateway,
            authenticator,
            config.server.cors_origins.clone(),
        ))
    }

    /// Get the server address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Chat gateway served by this server.
    pub fn gateway(&self) -> &Arc<ChatGateway> {
        &self.app_state.gateway
    }

    fn router(self) -> axum::Router {
        create_router(self.app_state, self.authenticator, &self.cors_origins)
            .merge(create_health_router())
    }

    /// Run the web server.
    pub async fn run(self) -> std::result::Result<(), std::io::Error> {
        let listener = TcpListener::bind(self.addr).await?;
        let local_addr = listener.local_addr()?;

        tracing::info!("Web server listening on http://{}", local_addr);

        axum::serve(listener, self.router()).await
    }

    /// Run the server and return the actual bound address.
    ///
    /// This is useful for testing when binding to port 0.
    pub async fn run_with_addr(self) -> std::result::Result<SocketAddr, std::io::Error> {
        let listener = TcpListener::bind(self.addr).await?;
        let local_addr = listener.local_addr()?;

        tracing::info!("Web server listening on http://{}", local_addr);

        let router = self.router();
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).await {
                tracing::error!("Web server error: {}", e);
            }
        });

        Ok(local_addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_from_config() {
        let db = Database::open_in_memory().await.unwrap();
        let mut config = Config::default();
        config.server.host = "127.0.0.1".to_string();
        config.server.port = 0;

        let server = WebServer::from_config(&config, &db).unwrap();
        assert_eq!(server.addr().port(), 0);
    }

    #[tokio::test]
    async fn test_invalid_address() {
        let db = Database::open_in_memory().await.unwrap();
        let mut config = Config::default();
        config.server.host = "not an address".to_string();

        assert!(matches!(
            WebServer::from_config(&config, &db),
            Err(ChatError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_run_with_addr_serves_health() {
        let db = Database::open_in_memory().await.unwrap();
        let mut config = Config::default();
        config.server.host = "127.0.0.1".to_string();
        config.server.port = 0;

        let server = WebServer::from_config(&config, &db).unwrap();
        let addr = server.run_with_addr().await.unwrap();
        assert_ne!(addr.port(), 0);
    }
}
