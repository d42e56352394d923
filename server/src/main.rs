use axum::Router;
use dotenvy::dotenv;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use nagpur_events_server::auth::SessionKeys;
use nagpur_events_server::config::Config;
use nagpur_events_server::routes::create_routes;
use nagpur_events_server::services::fonts::FontResolver;
use nagpur_events_server::services::pdf::DocumentRenderer;
use nagpur_events_server::services::signature::SignatureVerifier;
use nagpur_events_server::services::{
    LogNotifier, Notifier, RazorpayClient, SmtpNotifier, SupabaseStore,
};
use nagpur_events_server::state::{AppState, Collaborators};
use nagpur_events_server::store::postgres::lazy_pool;
use nagpur_events_server::store::PgLedger;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,nagpur_events_server=debug")),
        )
        .init();

    let config = Config::from_env()?;

    let pool = lazy_pool(&config.database)?;
    sqlx::migrate!().run(&pool).await?;
    tracing::info!("Migrations run successfully");

    let notifier: Arc<dyn Notifier> = match &config.smtp {
        Some(smtp) => Arc::new(SmtpNotifier::new(smtp)?),
        None => {
            tracing::warn!("SMTP credentials not set, confirmation emails will only be logged");
            Arc::new(LogNotifier)
        }
    };

    let fonts = FontResolver::new(config.font_dir.clone()).resolve();
    let collaborators = Collaborators {
        ledger: Arc::new(PgLedger::new(pool)),
        store: Arc::new(SupabaseStore::new(&config.storage, config.retry.clone())?),
        notifier,
        gateway: Arc::new(RazorpayClient::new(&config.razorpay, config.retry.clone())?),
        renderer: Arc::new(DocumentRenderer::new(fonts)),
    };
    let state = AppState::new(
        collaborators,
        SignatureVerifier::new(
            config.razorpay.key_secret.as_bytes(),
            config.razorpay.webhook_secret.as_bytes(),
        ),
        SessionKeys::new(config.session_secret.as_bytes()),
        config.storage.buckets.clone(),
    );

    let app: Router = create_routes(
        state,
        config.production,
        config.cors_allowed_origins.as_deref(),
    );

    tracing::info!("Server running at http://{}", config.bind_addr);
    let listener = TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
