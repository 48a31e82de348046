use dotenvy::dotenv;
use gamekey_engine::{PurchaseApi, ReconcilerApi, ReferralApi, SqliteDatabase};
use gamekey_worker::{
    alerts::create_alert_event_handlers,
    cli::handle_command_line_args,
    config::WorkerConfig,
    errors::WorkerError,
    nowpayments::NowPaymentsProvider,
    reconcile_worker::start_payment_poller,
    telegram::TelegramNotifier,
};
use log::*;

#[tokio::main]
async fn main() {
    dotenv().ok();
    env_logger::init();
    if handle_command_line_args() {
        return;
    }
    let config = WorkerConfig::from_env_or_default();
    match run_worker(config).await {
        Ok(_) => println!("Bye!"),
        Err(e) => eprintln!("{e}"),
    }
}

async fn run_worker(config: WorkerConfig) -> Result<(), WorkerError> {
    let db = if config.database_url.is_empty() {
        SqliteDatabase::new(config.max_connections).await
    } else {
        SqliteDatabase::new_with_url(&config.database_url, config.max_connections).await
    }
    .map_err(|e| WorkerError::InitializeError(format!("Could not connect to the database. {e}")))?;
    db.migrate().await.map_err(|e| WorkerError::DatabaseError(format!("Migrations failed. {e}")))?;
    info!("🕰️ Database ready");

    let notifier = TelegramNotifier::new(config.telegram.clone())?;
    let provider = NowPaymentsProvider::new(config.nowpayments.clone())?;
    let handlers = create_alert_event_handlers(notifier.clone());
    let producers = handlers.producers();
    handlers.start_handlers().await;

    let referrals = ReferralApi::new(db.clone(), config.referral);
    let purchases = PurchaseApi::new(db.clone(), notifier, referrals, producers, config.purchase);
    let reconciler = ReconcilerApi::new(db, provider, purchases);

    let poller = if config.poller_enabled {
        Some(start_payment_poller(reconciler, config.poll_interval, config.stale_after))
    } else {
        info!("🕰️ Payment poller is disabled");
        None
    };
    info!("🕰️ Worker running. Press Ctrl-C to stop.");
    tokio::signal::ctrl_c().await?;
    info!("🕰️ Shutting down");
    if let Some(poller) = poller {
        poller.abort();
    }
    Ok(())
}
