//! Wallet-backed virtual top-up service: airtime, data, cable TV, electricity,
//! exam cards, betting, SMM, crypto trades, gift card buyback and
//! airtime-to-cash, all settled against an in-memory naira ledger.

use std::sync::{Arc, Mutex};

use axum::{
    Router,
    routing::{any, get, post, put},
};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

pub mod config;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod upstream;
pub mod websocket;

use config::AppConfig;
use error::ApiError;
use models::InMemoryStorage;
use pricing::rates::RateSettings;
use routes::{admin, betting, cash, crypto, giftcards, rates, users, vtu, wallet};
use upstream::Upstream;
use websocket::{NotificationManager, create_notification_manager, websocket_handler};

// Application state containing the ledger, rate tables and provider client
#[derive(Clone)]
pub struct AppState {
    pub storage: InMemoryStorage,
    pub rates: Arc<Mutex<RateSettings>>,
    pub upstream: Upstream,
    pub notification_manager: NotificationManager,
    pub admin_emails: Arc<Vec<String>>,
}

impl AppState {
    pub fn from_config(config: &AppConfig) -> Result<Self, ApiError> {
        Ok(AppState {
            storage: InMemoryStorage::new(),
            rates: Arc::new(Mutex::new(RateSettings::seed())),
            upstream: Upstream::from_config(&config.upstream)?,
            notification_manager: create_notification_manager(),
            admin_emails: Arc::new(config.admin_emails.clone()),
        })
    }
}

// build our application with routes
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/login", post(users::login))
        .route("/users/profile", get(users::get_profile))
        .route("/profile", get(users::get_profile))
        .route("/wallet", get(wallet::get_wallet))
        .route("/wallet/transactions", get(wallet::list_transactions))
        .route("/wallet/deposits", post(wallet::deposit))
        .route("/wallet/withdrawals", post(wallet::withdraw))
        .route("/wallet/banks/resolve", get(wallet::resolve_account))
        .route("/api/vtu/transaction", post(vtu::vtu_transaction))
        .route("/vtu/electricity/verify", post(vtu::verify_meter))
        .route("/vtu/electricity", post(vtu::buy_electricity))
        .route("/vtu/exam-cards/price", get(vtu::exam_price))
        .route("/vtu/exam-cards", post(vtu::buy_exam_cards))
        .route("/vtu/smm", post(vtu::place_smm_order))
        .route("/vtu/betting/verify", post(betting::verify_customer))
        .route("/vtu/betting", post(betting::fund_account))
        .route("/crypto/quote", get(crypto::get_quote))
        .route("/crypto/trades", post(crypto::place_trade))
        .route("/cash/quote", get(cash::get_quote))
        .route("/cash/submissions", post(cash::submit_conversion))
        .route("/rates/catalog", get(rates::get_catalog))
        .route("/giftcards/rates", get(giftcards::get_rates))
        .route(
            "/giftcards/submissions",
            get(giftcards::list_submissions).post(giftcards::submit_card),
        )
        .route(
            "/giftcards/submissions/{id}/accept",
            post(giftcards::accept_offer),
        )
        .route(
            "/giftcards/submissions/{id}/decline",
            post(giftcards::decline_offer),
        )
        .route("/admin/rates", get(rates::get_rates))
        .route("/admin/rates/{service}", put(rates::update_rates))
        .route("/admin/giftcards/submissions", get(admin::list_submissions))
        .route(
            "/admin/giftcards/submissions/{id}/negotiate",
            post(admin::negotiate_submission),
        )
        .route(
            "/admin/giftcards/submissions/{id}/approve",
            post(admin::approve_submission),
        )
        .route(
            "/admin/giftcards/submissions/{id}/reject",
            post(admin::reject_submission),
        )
        .route("/admin/transactions/settle", post(admin::settle_transaction))
        .route(
            "/admin/users/{id}/verification",
            put(admin::update_verification),
        )
        .route("/notifications", any(websocket_handler))
        .layer(ServiceBuilder::new().layer(CorsLayer::permissive()))
        .with_state(state)
}

// run the app on an already-bound listener, so tests can use an OS-picked port
pub async fn serve(listener: tokio::net::TcpListener, state: AppState) -> std::io::Result<()> {
    axum::serve(listener, build_router(state)).await
}

// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

// Root endpoint
async fn root() -> &'static str {
    "VTU Wallet API - Use POST /login to authenticate, POST /api/vtu/transaction to buy airtime/data/TV, WebSocket /notifications for real-time updates"
}
