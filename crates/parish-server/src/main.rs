//! parish-server
//!
//! Axum-based HTTP server for the church event-registration and payment
//! service: the payment provider webhook plus the payment-link and
//! registration-email endpoints called by the intake site.

mod handlers;
mod state;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use parish_clients::{
    AirtableStore, AsaasClient, Mailer, NotifySink, RecordStore, ResendMailer, SlackSink,
};
use parish_core::{AppConfig, RetryPolicy};

use crate::handlers::{
    donation_link, exempt_registration, health_check, payment_link, payment_webhook,
    registration_email, store_payment_link,
};
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment
    dotenvy::dotenv().ok();
    let config = Arc::new(AppConfig::from_env());

    // Outbound clients, each disabled when its credential is absent
    let store: Option<Arc<dyn RecordStore>> = config.store_api_key.as_ref().map(|key| {
        Arc::new(AirtableStore::new(config.schema.base_id.clone(), key.clone()))
            as Arc<dyn RecordStore>
    });
    let mailer: Option<Arc<dyn Mailer>> = config
        .email_api_key
        .as_ref()
        .map(|key| Arc::new(ResendMailer::new(key.clone())) as Arc<dyn Mailer>);
    let paylinks = config
        .paylink_api_key
        .as_ref()
        .map(|key| Arc::new(AsaasClient::new(key.clone())));
    let sink: Arc<dyn NotifySink> = Arc::new(SlackSink::new(config.notify_webhook_url.clone()));

    if store.is_some() {
        tracing::info!("✓ Record store configured");
    } else {
        tracing::warn!("⚠ Record store not configured - set AIRTABLE_API_KEY in .env");
    }
    if mailer.is_some() {
        tracing::info!("✓ Email configured");
    } else {
        tracing::warn!("⚠ Email not configured - set RESEND_API_KEY in .env");
    }
    if paylinks.is_some() {
        tracing::info!("✓ Payment links configured");
    } else {
        tracing::warn!("⚠ Payment links not configured - set ASAAS_API_KEY in .env");
    }
    if config.notify_webhook_url.is_some() {
        tracing::info!("✓ Team notifications configured");
    } else {
        tracing::warn!("⚠ Team notifications not configured - set SLACK_WEBHOOK_URL in .env");
    }

    // Build application state
    let state = AppState {
        config,
        store,
        mailer,
        paylinks,
        sink,
        retry: RetryPolicy::default(),
    };

    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build router
    let app = Router::new()
        // Health
        .route("/health", get(health_check))
        // Payment provider webhook
        .route("/webhook/payment", post(payment_webhook))
        // Payment links
        .route("/api/payment-link", get(payment_link))
        .route("/api/payment-link/donation", get(donation_link))
        .route("/api/payment-link/store", get(store_payment_link))
        // Registration emails
        .route("/api/registration-email", get(registration_email))
        .route("/api/exempt-registration", get(exempt_registration))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("🚀 parish-server running on http://{}", addr);
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health                   - Health check");
    tracing::info!("  POST /webhook/payment          - Payment provider webhook");
    tracing::info!("  GET  /api/payment-link         - Registration payment link");
    tracing::info!("  GET  /api/payment-link/donation - Donation link");
    tracing::info!("  GET  /api/payment-link/store   - Store link on record");
    tracing::info!("  GET  /api/registration-email   - Registration email");
    tracing::info!("  GET  /api/exempt-registration  - Exempt registration");

    axum::serve(listener, app).await?;

    Ok(())
}
