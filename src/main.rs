mod config;
mod db;
mod dtos;
mod error;
mod handler;
mod mail;
mod middleware;
mod models;
mod routes;
mod service;
mod utils;
#[cfg(test)]
mod test_support;

use std::sync::Arc;

use axum::http::{header::{ACCEPT, CONTENT_TYPE}, HeaderName, HeaderValue, Method};
use config::Config;
use db::{rewarddb::RewardLedgerExt, DBClient};
use dotenv::dotenv;
use mail::notifier::{RewardNotifier, ResendMailer};
use routes::create_router;
use service::{
    policy::PolicyStore,
    referral_service::{ReferralService, ReferralSettings},
};
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing_subscriber::filter::LevelFilter;

#[derive(Clone)]
pub struct AppState {
    pub env: Config,
    pub ledger: Arc<dyn RewardLedgerExt>,
    pub policy_store: Arc<PolicyStore>,
    pub referral_service: Arc<ReferralService>,
}

impl AppState {
    pub fn new(
        config: Config,
        ledger: Arc<dyn RewardLedgerExt>,
        notifier: Arc<dyn RewardNotifier>,
    ) -> Self {
        let policy_store = Arc::new(PolicyStore::new(config.initial_policy.clone()));
        let referral_service = Arc::new(ReferralService::new(
            ledger.clone(),
            notifier,
            policy_store.clone(),
            ReferralSettings::from(&config),
        ));

        AppState {
            env: config,
            ledger,
            policy_store,
            referral_service,
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_max_level(LevelFilter::DEBUG)
        .init();

    dotenv().ok();

    let config = Config::init();

    let pool = match PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
    {
        Ok(pool) => {
            println!("✅Connection to the database is successful!");
            pool
        }
        Err(err) => {
            println!("🔥 Failed to connect to the database: {:?}", err);
            std::process::exit(1);
        }
    };

    if let Err(err) = sqlx::migrate!("./migrations").run(&pool).await {
        println!("🔥 Failed to run database migrations: {:?}", err);
        std::process::exit(1);
    }

    if config.webhook_secret.is_none() {
        tracing::warn!("WEBHOOK_SECRET is not set, referral webhooks are accepted unsigned");
    }
    if config.resend_api_key.is_empty() {
        tracing::warn!("RESEND_API_KEY is not set, reward emails will not be delivered");
    }

    let allowed_origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| origin.parse::<HeaderValue>().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed_origins))
        .allow_headers([
            ACCEPT,
            CONTENT_TYPE,
            HeaderName::from_static(middleware::ADMIN_KEY_HEADER),
        ])
        .allow_methods([Method::GET, Method::POST, Method::PUT]);

    let ledger: Arc<dyn RewardLedgerExt> = Arc::new(DBClient::new(pool));
    let notifier: Arc<dyn RewardNotifier> = Arc::new(ResendMailer::from_config(&config));
    let app_state = AppState::new(config.clone(), ledger, notifier);

    let app = create_router(Arc::new(app_state)).layer(cors);

    println!("🚀 Server is running on http://localhost:{}", config.port);

    let listener = match tokio::net::TcpListener::bind(format!("0.0.0.0:{}", &config.port)).await {
        Ok(listener) => listener,
        Err(err) => {
            println!("🔥 Failed to bind port {}: {:?}", config.port, err);
            std::process::exit(1);
        }
    };

    if let Err(err) = axum::serve(listener, app).await {
        println!("🔥 Server error: {:?}", err);
        std::process::exit(1);
    }
}
