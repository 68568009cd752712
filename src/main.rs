mod config;
mod domain;
mod infrastructure;
mod presentation;
mod usecase;

use axum::{Router, routing::get};
use sea_orm::{ConnectOptions, Database};
use tokio::{net::TcpListener, signal};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::{
    config::AppConfig,
    infrastructure::{
        profile_repository::PostgresProfileRepository, supabase_client::SupabaseClient,
        supabase_identity_provider::SupabaseIdentityProvider,
        supabase_object_store::SupabaseObjectStore, system_clock::SystemClock,
    },
    presentation::handlers::registration_handler::create_registration_router,
    usecase::provision_account_usecase::ProvisionAccountUsecase,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // plain environment variables are enough in containers
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::from_env()?;

    let mut opt = ConnectOptions::new(config.database_url.clone());
    opt.max_connections(10)
        .min_connections(1)
        .sqlx_logging(true);
    let db = Database::connect(opt).await?;

    let supabase = SupabaseClient::new(
        config.supabase_url.clone(),
        config.supabase_key.clone(),
        config.http_timeout,
    )?;
    let identity_provider =
        SupabaseIdentityProvider::new(supabase.clone(), config.auth_redirect_url.clone());
    let object_store = SupabaseObjectStore::new(supabase);
    let profile_repository = PostgresProfileRepository::new(db);
    let provision_account_usecase = ProvisionAccountUsecase::new(
        identity_provider,
        object_store,
        profile_repository,
        SystemClock,
        config.avatar_settings(),
    );

    let app = Router::new()
        .route("/", get(|| async { "Food diary API" }))
        .nest(
            "/api",
            create_registration_router(provision_account_usecase, config.form_limits()),
        );

    let listener = TcpListener::bind(config.bind_addr).await?;
    info!(addr = %config.bind_addr, "server listening");
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
        info!("received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                info!("received terminate signal, shutting down");
            }
            Err(e) => {
                warn!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
