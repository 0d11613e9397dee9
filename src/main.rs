//! Ready or Not Back binary entrypoint wiring the REST API, the storage backend, the change
//! feed watcher and push notifications.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ready_or_not_back::{
    config::{AppConfig, StorageBackend},
    dao::{
        game_store::{GameStore, memory::MemoryGameStore},
        storage::StorageError,
    },
    push::{Notifier, log::LogNotifier},
    routes,
    services::{change_service, storage_supervisor},
    state::{AppState, SharedState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let watch_changes = config.watch_changes;
    let app_state = AppState::new(config, build_notifier());

    spawn_storage_supervisor(app_state.clone(), StorageBackend::from_env()).await?;
    if watch_changes {
        tokio::spawn(change_service::run_watcher(app_state.clone()));
    }

    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8000);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Start the supervisor for the selected backend; configuration errors abort startup.
async fn spawn_storage_supervisor(
    state: SharedState,
    backend: StorageBackend,
) -> anyhow::Result<()> {
    match backend {
        StorageBackend::Memory => {
            let store = MemoryGameStore::new();
            tokio::spawn(storage_supervisor::run(state, "memory", move || {
                let store = store.clone();
                async move { Ok::<_, StorageError>(Arc::new(store) as Arc<dyn GameStore>) }
            }));
        }
        #[cfg(feature = "mongo-store")]
        StorageBackend::Mongo => {
            use ready_or_not_back::dao::game_store::mongodb::{MongoConfig, MongoGameStore};

            let config = MongoConfig::from_env()
                .await
                .context("reading MongoDB configuration")?;
            tokio::spawn(storage_supervisor::run(state, "mongo", move || {
                let config = config.clone();
                async move {
                    let store = MongoGameStore::connect(config).await?;
                    Ok::<_, StorageError>(Arc::new(store) as Arc<dyn GameStore>)
                }
            }));
        }
        #[cfg(feature = "couch-store")]
        StorageBackend::Couch => {
            use ready_or_not_back::dao::game_store::couchdb::{CouchConfig, CouchGameStore};

            let config = CouchConfig::from_env().context("reading CouchDB configuration")?;
            tokio::spawn(storage_supervisor::run(state, "couch", move || {
                let config = config.clone();
                async move {
                    let store = CouchGameStore::connect(config).await?;
                    Ok::<_, StorageError>(Arc::new(store) as Arc<dyn GameStore>)
                }
            }));
        }
        #[allow(unreachable_patterns)]
        other => anyhow::bail!("storage backend {other:?} is not compiled in"),
    }

    Ok(())
}

/// Deliver through FCM when credentials are present, otherwise only log messages.
fn build_notifier() -> Arc<dyn Notifier> {
    #[cfg(feature = "fcm-push")]
    {
        use ready_or_not_back::push::fcm::{FcmConfig, FcmNotifier};

        match FcmConfig::from_env().and_then(FcmNotifier::new) {
            Ok(notifier) => {
                info!("push notifications delivered through FCM");
                return Arc::new(notifier);
            }
            Err(err) => warn!(error = %err, "FCM unavailable; push notifications are logged only"),
        }
    }

    #[cfg(not(feature = "fcm-push"))]
    warn!("built without FCM support; push notifications are logged only");

    Arc::new(LogNotifier)
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
