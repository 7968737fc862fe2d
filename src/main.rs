mod admin;
mod api;
mod auth;
mod config;
mod desk;
mod error;
mod guard;
mod intake;
mod models;
mod panel;
mod queue;
mod rate_limit;
mod store;
mod telegram;

use std::{net::SocketAddr, sync::Arc};

use admin::AdminService;
use anyhow::Result;
use axum::{
    routing::{delete, get},
    Router,
};
use config::Config;
use desk::Desk;
use guard::AdminGuard;
use rate_limit::RateLimiter;
use store::RecordStore;
use telegram::{InboundUpdate, TelegramClient};
use tokio::sync::mpsc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub admin: AdminService,
    pub guard: AdminGuard,
    pub updates_tx: Option<mpsc::Sender<InboundUpdate>>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "novadesk_api=info,tower_http=info".into()),
        )
        .init();

    let config = Config::from_env()?;
    let store = RecordStore::from_config(&config)?;

    let limiter = Arc::new(RateLimiter::new(
        config.rate_limit_window,
        config.rate_limit_max,
    ));
    rate_limit::spawn_sweeper(Arc::clone(&limiter));

    if config.admin_password_is_fallback {
        warn!(
            user = config.admin.username(),
            "Admin password not configured; admin routes will reject every login"
        );
    }

    let updates_tx = config.telegram.as_ref().map(|telegram| {
        let (updates_tx, updates_rx) = mpsc::channel(config.update_queue_capacity);
        let transport = Arc::new(TelegramClient::new(telegram));
        queue::spawn_update_worker(Desk::new(store.clone()), transport, updates_rx);
        info!(path = %telegram.webhook_path, "Telegram webhook enabled");
        updates_tx
    });

    let state = AppState {
        admin: AdminService::new(
            store.clone(),
            config.listing_page_size,
            config.csv_page_size,
        ),
        guard: AdminGuard::new(limiter, config.admin.clone()),
        updates_tx,
        config: config.clone(),
    };

    let mut app = Router::new()
        .route("/", get(api::root))
        .route("/healthz", get(api::healthz))
        .route("/api/reservas", get(api::list_reservations))
        .route("/api/reservas.csv", get(api::export_reservations_csv))
        .route("/api/reservas/{id}", delete(api::delete_reservation))
        .route("/admin", get(api::admin_panel));

    if let Some(telegram) = &config.telegram {
        app = app.route(
            &telegram.webhook_path,
            get(api::webhook_probe).post(api::telegram_webhook),
        );
    }

    let app = app.layer(TraceLayer::new_for_http()).with_state(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    info!("novadesk-api listening on {}", config.bind_addr);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}
