use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use warden_access::{GroupGrants, RoleSet, TokenManager};
use warden_server::auth::authenticator_for;
use warden_server::config::{BootstrapConfig, ServerConfig};
use warden_server::state::AppState;
use warden_server::store::{
    DataAccess, MemoryDataAccess, MemorySessionStore, PgDataAccess, PgSessionStore, SessionStore,
};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration from environment
    let config = ServerConfig::from_env().expect("failed to load configuration");
    tracing::info!(strategy = ?config.auth.strategy, "Loaded configuration");

    let (data, sessions): (Arc<dyn DataAccess>, Arc<dyn SessionStore>) =
        match &config.database_url {
            Some(url) => {
                let db_pool = PgPoolOptions::new()
                    .max_connections(5)
                    .connect(url)
                    .await
                    .expect("failed to connect to database");

                tracing::info!("Running database migrations...");
                sqlx::migrate!("./migrations")
                    .run(&db_pool)
                    .await
                    .expect("failed to run migrations");

                (
                    Arc::new(PgDataAccess::new(db_pool.clone())),
                    Arc::new(PgSessionStore::new(db_pool)),
                )
            }
            None => {
                tracing::warn!("No database configured, state is kept in memory");
                (
                    Arc::new(MemoryDataAccess::new()),
                    Arc::new(MemorySessionStore::new()),
                )
            }
        };

    let secret = match &config.token.secret {
        Some(secret) => secret.clone(),
        None => {
            tracing::warn!("No token secret configured, tokens will not survive a restart");
            warden_core::generate_secret()
        }
    };
    let tokens = Arc::new(TokenManager::new(secret, config.token.ttl()));
    // Refuse to start rather than fail every login
    tokens
        .issue("start-up")
        .expect("failed to sign a token with the configured settings");

    // Cleanup expired sessions on startup
    match sessions.delete_expired().await {
        Ok(count) if count > 0 => {
            tracing::info!(
                deleted_sessions = count,
                "Cleaned up expired sessions on startup"
            );
        }
        Ok(_) => {}
        Err(e) => {
            tracing::warn!(error = %e, "Failed to cleanup expired sessions on startup");
        }
    }

    // Spawn periodic session cleanup task
    let cleanup_sessions = Arc::clone(&sessions);
    let cleanup_interval_secs = config.session.cleanup_interval_seconds;
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(std::time::Duration::from_secs(cleanup_interval_secs));
        loop {
            interval.tick().await;
            match cleanup_sessions.delete_expired().await {
                Ok(count) if count > 0 => {
                    tracing::debug!(deleted_sessions = count, "Periodic session cleanup");
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to cleanup expired sessions");
                }
            }
        }
    });

    bootstrap_root(data.as_ref(), &config.bootstrap).await;

    let authenticator = authenticator_for(
        config.auth.strategy,
        tokens,
        sessions,
        config.session.ttl(),
    );
    let app = warden_server::router(AppState::new(data, authenticator));

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .expect("failed to bind to address");

    tracing::info!("listening on http://{}", config.listen_addr);

    axum::serve(listener, app.into_make_service())
        .await
        .expect("server error");
}

/// Creates the configured root account holding every role on every
/// resource group.
async fn bootstrap_root(data: &dyn DataAccess, bootstrap: &BootstrapConfig) {
    let Some((login, password)) = bootstrap.credentials() else {
        return;
    };

    data.upsert_user(login, password)
        .await
        .expect("failed to create bootstrap account");
    let grants: GroupGrants = data
        .resource_groups()
        .await
        .expect("failed to list resource groups")
        .into_iter()
        .map(|group| (group, RoleSet::all()))
        .collect();
    data.grant_resource_access(login, &grants)
        .await
        .expect("failed to grant bootstrap account");

    tracing::info!(login = %login, groups = grants.len(), "Bootstrap account ready");
}
