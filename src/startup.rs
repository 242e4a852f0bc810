//! Application Startup
//!
//! Application building and server initialization.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use sqlx::PgPool;
use tokio::net::TcpListener;

use crate::application::services::{AuthService, MessageService, SessionService};
use crate::config::{Settings, StoreBackend};
use crate::infrastructure::database;
use crate::infrastructure::repositories::{InMemoryStore, Repositories};
use crate::presentation::http::routes;
use crate::presentation::middleware::{cors, logging};
use crate::presentation::websocket::Gateway;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Pool behind the postgres backend; `None` for the memory backend
    pub db: Option<PgPool>,
    pub repos: Repositories,
    pub gateway: Arc<Gateway>,
    pub sessions: Arc<SessionService>,
    pub messages: Arc<MessageService>,
    pub auth: Arc<AuthService>,
    pub settings: Arc<Settings>,
}

impl AppState {
    /// Wire the services on top of a set of repositories.
    pub fn new(settings: Settings, repos: Repositories, db: Option<PgPool>) -> Self {
        let gateway = Arc::new(Gateway::new());
        let sessions = Arc::new(SessionService::new(
            repos.sessions.clone(),
            repos.users.clone(),
            gateway.clone(),
        ));
        let messages = Arc::new(MessageService::new(
            repos.messages.clone(),
            repos.sessions.clone(),
            repos.users.clone(),
            gateway.clone(),
        ));
        let auth = Arc::new(AuthService::new(repos.users.clone(), sessions.clone()));

        Self {
            db,
            repos,
            gateway,
            sessions,
            messages,
            auth,
            settings: Arc::new(settings),
        }
    }

    /// State over a fresh in-memory store.
    pub fn in_memory(settings: Settings) -> Self {
        Self::new(settings, Repositories::in_memory(InMemoryStore::new()), None)
    }
}

/// Build the full router, middleware included.
pub fn build_router(state: AppState) -> Router {
    let cors_layer = cors::create_cors_layer(&state.settings.cors);
    routes::create_router(state)
        .layer(logging::create_trace_layer())
        .layer(cors_layer)
}

/// Application instance
pub struct Application {
    listener: TcpListener,
    router: Router,
}

impl Application {
    /// Build the application from settings
    pub async fn build(settings: Settings) -> Result<Self> {
        let state = match settings.store.backend {
            StoreBackend::Postgres => {
                let url = settings
                    .database
                    .url
                    .clone()
                    .context("database.url is required for the postgres backend")?;
                let db = database::create_pool(&settings.database, &url).await?;
                tracing::info!("Database connection pool created");

                if settings.database.run_migrations {
                    database::run_migrations(&db).await?;
                    tracing::info!("Database migrations applied");
                }

                AppState::new(settings.clone(), Repositories::postgres(db.clone()), Some(db))
            }
            StoreBackend::Memory => {
                tracing::warn!("Using in-memory store; data is lost on restart");
                AppState::in_memory(settings.clone())
            }
        };

        let router = build_router(state);

        // Bind to address
        let addr: SocketAddr = settings
            .server_addr()
            .parse()
            .with_context(|| format!("Invalid server address {}", settings.server_addr()))?;
        let listener = TcpListener::bind(addr).await?;
        tracing::info!("Listening on {}", addr);

        Ok(Self { listener, router })
    }

    /// Run the server until stopped
    pub async fn run_until_stopped(self) -> Result<()> {
        axum::serve(self.listener, self.router).await?;
        Ok(())
    }

    /// Get the bound address
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}
