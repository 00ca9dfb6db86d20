mod config;
mod db;
mod dtos;
mod error;
mod handler;
mod middleware;
mod models;
mod routes;
mod service;
mod utils;

use std::sync::Arc;

use axum::http::{
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    HeaderValue, Method,
};
use config::Config;
use dotenv::dotenv;
use routes::create_router;
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing_subscriber::EnvFilter;

use crate::{
    db::db::DBClient,
    models::contactmodels::PaymentGatewayKind,
    service::{
        background_jobs::start_contact_expiry_job,
        contact_service::ContactRequestService,
        payment_gateway::{GatewayRouter, PaymentGateway, SandboxGateway},
        stripe_gateway::StripeGateway,
    },
    utils::clock::SystemClock,
};

#[derive(Debug, Clone)]
pub struct AppState {
    pub env: Config,
    pub db_client: Arc<DBClient>,
    pub contact_service: Arc<ContactRequestService>,
}

impl AppState {
    pub fn new(db_client: DBClient, config: Config, gateways: GatewayRouter) -> Self {
        let db_client_arc = Arc::new(db_client);

        let contact_service = Arc::new(ContactRequestService::new(
            db_client_arc.clone(),
            gateways,
            Arc::new(SystemClock),
            config.contact_policy.clone(),
            config.payment_currency.clone(),
        ));

        Self {
            env: config,
            db_client: db_client_arc,
            contact_service,
        }
    }
}

/// Stripe mode registers only the Stripe adapter; a `mercadopago` request is then
/// refused at creation before any hold. Sandbox mode serves both choices.
fn build_gateways(config: &Config) -> Result<GatewayRouter, String> {
    match config.active_payment_provider.as_str() {
        "stripe" => {
            if config.stripe_secret_key.is_empty() {
                return Err("STRIPE_SECRET_KEY must be set when ACTIVE_PAYMENT_PROVIDER=stripe".to_string());
            }
            let stripe: Arc<dyn PaymentGateway> =
                Arc::new(StripeGateway::new(config.stripe_secret_key.clone()));
            tracing::info!("Payment gateways: stripe (mercadopago requests will be refused)");
            Ok(GatewayRouter::new().with(PaymentGatewayKind::Stripe, stripe))
        }
        "sandbox" => {
            tracing::warn!("Using the sandbox payment gateway; no real money will move");
            let sandbox: Arc<dyn PaymentGateway> = Arc::new(SandboxGateway::new());
            Ok(GatewayRouter::new()
                .with(PaymentGatewayKind::Stripe, sandbox.clone())
                .with(PaymentGatewayKind::Mercadopago, sandbox))
        }
        other => Err(format!("Unknown payment provider: {}", other)),
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    dotenv().ok();

    let config = Config::init();

    let pool = match PgPoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .connect(&config.database_url)
        .await
    {
        Ok(pool) => {
            tracing::info!("✅ Connection to the database is successful!");
            pool
        }
        Err(err) => {
            tracing::error!("🔥 Failed to connect to the database: {:?}", err);
            std::process::exit(1);
        }
    };

    if let Err(err) = sqlx::migrate!("./migrations").run(&pool).await {
        tracing::error!("🔥 Failed to run database migrations: {}", err);
        std::process::exit(1);
    }

    let gateways = match build_gateways(&config) {
        Ok(gateways) => gateways,
        Err(err) => {
            tracing::error!("🔥 {}", err);
            std::process::exit(1);
        }
    };

    let allowed_origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse::<HeaderValue>().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed_origins))
        .allow_headers([AUTHORIZATION, ACCEPT, CONTENT_TYPE])
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT]);

    let app_state = Arc::new(AppState::new(DBClient::new(pool), config.clone(), gateways));

    let expiry_service = app_state.contact_service.clone();
    tokio::spawn(async move {
        start_contact_expiry_job(expiry_service).await;
    });

    let app = create_router(app_state.clone()).layer(cors);

    tracing::info!(
        "🚀 Server is running on http://localhost:{} (payments: {}, trial quota: {}, lead count: {})",
        config.port,
        config.active_payment_provider,
        config.contact_policy.trial_lead_quota,
        config.contact_policy.lead_count_scope
    );

    let listener = match tokio::net::TcpListener::bind(format!("0.0.0.0:{}", &config.port)).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!("🔥 Failed to bind port {}: {}", config.port, err);
            std::process::exit(1);
        }
    };

    if let Err(err) = axum::serve(listener, app).await {
        tracing::error!("🔥 Server error: {}", err);
    }
}
