use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::routing::get;
use axum::{Json, Router};
use tokio::signal;
use tokio::sync::watch;
use tower::ServiceBuilder;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tracing::{error, info, warn};

use ugxchange_backend::api::{self, ApiState};
use ugxchange_backend::config::AppConfig;
use ugxchange_backend::health::{HealthChecker, HealthState, HealthStatus};
use ugxchange_backend::kyc::KycService;
use ugxchange_backend::logging::init_tracing;
use ugxchange_backend::middleware::logging::{request_logging_middleware, UuidRequestId};
use ugxchange_backend::otp::{
    LogOnlySender, OtpConfig, OtpSender, OtpService, OtpStore, SmsGatewayConfig, SmsGatewaySender,
};
use ugxchange_backend::payments::factory::ProviderFactory;
use ugxchange_backend::payments::gateway::{GatewayConfig, MobileMoneyGateway};
use ugxchange_backend::payments::provider::MobileMoneyProvider;
use ugxchange_backend::payments::store::TransactionStore;
use ugxchange_backend::payments::types::ProviderName;
use ugxchange_backend::services::exchange_rate::{
    ExchangeRateService, FixedRateProvider, HttpRateProvider, RateProvider,
};
use ugxchange_backend::services::registration::{
    AccountCreator, HttpAccountCreator, LocalAccountCreator, RegistrationService,
};
use ugxchange_backend::services::transaction_form::TransactionFormService;
use ugxchange_backend::throttle::RequestThrottle;
use ugxchange_backend::workers::kyc_reminder::{KycReminderConfig, KycReminderWorker};

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown");
}

async fn shutdown_signal_with_notify(shutdown_tx: watch::Sender<bool>) {
    shutdown_signal().await;
    let _ = shutdown_tx.send(true);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::from_env()?;
    config.validate()?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
        "🚀 Starting UGXchange backend service"
    );

    // Shared stores and leaf services
    let throttle = Arc::new(RequestThrottle::with_limits(
        Duration::from_secs(config.throttle.window_secs),
        config.throttle.ceiling,
    ));

    let sms_config = SmsGatewayConfig::from_env();
    let sms_configured = sms_config.is_some();
    let otp_sender: Arc<dyn OtpSender> = match sms_config {
        Some(sms) => {
            info!("📨 SMS gateway configured");
            Arc::new(SmsGatewaySender::new(sms).map_err(|e| anyhow::anyhow!(e.to_string()))?)
        }
        None => {
            warn!("⏭️  No SMS credentials set, verification codes will not leave the process");
            Arc::new(LogOnlySender)
        }
    };

    let otp_config = OtpConfig::from_env();
    if otp_config.dev_expose_code {
        warn!("OTP_DEV_EXPOSE_CODE is enabled; codes are returned to API callers");
    }
    let otp = Arc::new(OtpService::new(
        otp_config,
        Arc::new(OtpStore::new()),
        Arc::clone(&throttle),
        otp_sender,
    ));

    let kyc = Arc::new(KycService::new());

    // Mobile-money providers
    info!("💳 Initializing mobile money providers...");
    let factory = ProviderFactory::from_env().map_err(|e| anyhow::anyhow!(e.to_string()))?;
    let mut providers: Vec<Arc<dyn MobileMoneyProvider>> = Vec::new();
    let mut configured: Vec<ProviderName> = Vec::new();
    for name in factory.enabled_providers().to_vec() {
        match factory.get_provider(name) {
            Ok(provider) => {
                info!(provider = %name, "✅ provider configured");
                configured.push(name);
                providers.push(provider);
            }
            Err(e) => {
                warn!(provider = %name, error = %e, "⏭️  skipping provider (missing credentials)");
            }
        }
    }

    let gateway = Arc::new(MobileMoneyGateway::new(
        providers,
        Arc::new(TransactionStore::new()),
        Arc::clone(&throttle),
        GatewayConfig::from_env(),
    ));

    // Registration
    let account_creator: Arc<dyn AccountCreator> = match &config.registration.upstream_url {
        Some(url) => {
            info!(url = %url, "👤 Registration upstream configured");
            Arc::new(
                HttpAccountCreator::new(
                    url.clone(),
                    Duration::from_secs(config.registration.timeout_secs),
                )
                .map_err(|e| anyhow::anyhow!(e.to_string()))?,
            )
        }
        None => {
            warn!("⏭️  No registration upstream set, accounts are accepted locally");
            Arc::new(LocalAccountCreator)
        }
    };
    let registration = Arc::new(RegistrationService::new(
        Arc::clone(&otp),
        account_creator,
        Arc::clone(&kyc),
    ));

    let transactions = Arc::new(TransactionFormService::new(
        Arc::clone(&kyc),
        Arc::clone(&gateway),
    ));

    // Exchange rates
    let rate_provider: Arc<dyn RateProvider> = match &config.rates.upstream_url {
        Some(url) => Arc::new(
            HttpRateProvider::new(url.clone(), Duration::from_secs(config.rates.timeout_secs))
                .map_err(|e| anyhow::anyhow!(e.to_string()))?,
        ),
        None => Arc::new(FixedRateProvider::default()),
    };
    let rates = Arc::new(ExchangeRateService::new(
        rate_provider,
        Duration::from_secs(config.rates.cache_ttl_secs),
    ));

    // Background KYC reminder sweep
    let (worker_shutdown_tx, worker_shutdown_rx) = watch::channel(false);
    let reminder_enabled = std::env::var("KYC_REMINDERS_ENABLED")
        .unwrap_or_else(|_| "true".to_string())
        .to_lowercase()
        != "false";
    let mut reminder_handle = None;
    if reminder_enabled {
        let worker = KycReminderWorker::new(Arc::clone(&kyc), KycReminderConfig::from_env());
        reminder_handle = Some(tokio::spawn(worker.run(worker_shutdown_rx)));
    } else {
        info!("KYC reminder worker disabled (KYC_REMINDERS_ENABLED=false)");
    }

    // Routes
    info!("🛣️  Setting up application routes...");
    let health_checker = HealthChecker::new(configured, sms_configured);

    let api_state = ApiState {
        registration,
        otp,
        transactions,
        gateway,
        kyc,
        rates,
    };

    let app = Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .route("/health/live", get(liveness))
        .with_state(health_checker)
        .nest("/api/v1", api::router(api_state))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
                .layer(axum::middleware::from_fn(request_logging_middleware))
                .layer(PropagateRequestIdLayer::x_request_id()),
        );

    info!("✅ Routes configured");

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
        error!("❌ Failed to bind to address {}: {}", addr, e);
        e
    })?;

    info!(address = %addr, "🚀 Server listening on http://{}", addr);
    info!("✅ Server is ready to accept connections");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal_with_notify(worker_shutdown_tx.clone()))
        .await?;

    let _ = worker_shutdown_tx.send(true);
    if let Some(handle) = reminder_handle {
        if let Err(e) = tokio::time::timeout(Duration::from_secs(5), handle).await {
            error!(error = %e, "Timed out waiting for reminder worker shutdown");
        }
    }

    info!("👋 Server shutdown complete");
    Ok(())
}

async fn root() -> &'static str {
    "Welcome to UGXchange Backend API"
}

async fn health(
    axum::extract::State(checker): axum::extract::State<HealthChecker>,
) -> Json<HealthStatus> {
    Json(checker.check_health())
}

/// Readiness probe: degraded still serves traffic, so both states are 200;
/// the body tells the operator what is missing.
async fn readiness(
    axum::extract::State(checker): axum::extract::State<HealthChecker>,
) -> Json<HealthStatus> {
    let status = checker.check_health();
    if status.status == HealthState::Degraded {
        warn!("readiness check: service degraded");
    }
    Json(status)
}

async fn liveness() -> &'static str {
    "OK"
}
