use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use encore_core::{
    load_config, validate_config, AcquisitionOrchestrator, AcquisitionStore, BrowserStrategy,
    FraudGate, HttpInstrumentIssuer, InstrumentIssuer, ManualEscalationStrategy, PurchaseStrategy,
    SqliteAcquisitionStore, StructuredApiStrategy,
};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("ENCORE_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;
    validate_config(&config).context("Configuration validation failed")?;
    info!("Configuration loaded successfully");
    info!("Database path: {:?}", config.database.path);

    // Wire up the acquisition stack
    let store: Arc<dyn AcquisitionStore> = Arc::new(
        SqliteAcquisitionStore::new(&config.database.path)
            .context("Failed to open acquisition store")?,
    );
    info!("Acquisition store initialized");

    let gate = Arc::new(FraudGate::new(&config.fraud));
    let issuer: Arc<dyn InstrumentIssuer> =
        Arc::new(HttpInstrumentIssuer::new(config.issuer.clone()));
    let vendor = Arc::new(encore_core::vendor::HttpVendorApi::new(
        config.vendor.clone(),
    ));
    let browser = Arc::new(encore_core::browser::WebDriverEngine::new(
        config.browser.clone(),
    ));
    let notifier = Arc::new(encore_core::notify::WebhookNotifier::new(
        config.notifications.clone(),
    ));

    // Strategy chain, in attempt order; manual escalation is always last.
    let strategies: Vec<Arc<dyn PurchaseStrategy>> = vec![
        Arc::new(StructuredApiStrategy::new(
            vendor,
            issuer.clone(),
            gate.clone(),
            config.vendor.platforms.clone(),
        )),
        Arc::new(BrowserStrategy::new(
            browser,
            issuer.clone(),
            gate.clone(),
            config.browser.clone(),
        )),
        Arc::new(ManualEscalationStrategy::new(notifier)),
    ];

    let orchestrator = AcquisitionOrchestrator::new(
        config.orchestrator.clone(),
        store,
        gate,
        issuer,
        strategies,
        config.issuer.holder_id.clone(),
    );

    // `encore <event-id>` targets one event; no argument runs a full cycle.
    match std::env::args().nth(1) {
        Some(event_id) => {
            info!(event_id = %event_id, "Acquiring for one event");
            let outcome = orchestrator
                .acquire_for_event(&event_id)
                .await
                .with_context(|| format!("Acquisition failed for event {}", event_id))?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        None => {
            let report = orchestrator
                .run_acquisition_cycle()
                .await
                .context("Acquisition cycle failed")?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}
