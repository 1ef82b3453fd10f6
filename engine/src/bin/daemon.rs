//! Account demo daemon
//!
//! Configuration is read from `MRPC_*` environment variables; see
//! `modelrpc_engine::config`.

use modelrpc_engine::adapters::grpc::AccountEndpoint;
use modelrpc_engine::config::{load_seed, DaemonConfig, ServiceOverrides};
use modelrpc_engine::demo::{
    account_queryset, account_store, Account, AccountAttributes, AccountService,
};
use modelrpc_engine::{transport, Dispatcher, Service};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = DaemonConfig::from_env();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = config.validate() {
        error!(error = %e, "Invalid configuration");
        return Err(e.into());
    }

    let seed: Vec<Account> = match &config.seed_file {
        Some(path) => load_seed(path)?,
        None => Vec::new(),
    };
    let records = seed.len();
    let store = account_store(seed).map_err(|e| {
        error!(error = %e, "Failed to seed account store");
        e
    })?;
    info!(records, "Loaded account seed");

    let overrides = match &config.service_config {
        Some(path) => ServiceOverrides::load(path)?,
        None => ServiceOverrides::default(),
    };
    let dispatcher = Dispatcher::<AccountService>::bind(
        AccountAttributes::new(account_queryset(&store)),
        overrides.for_service(<AccountService as Service>::NAME),
    )?;

    info!(
        transport = ?config.transport_mode,
        service = <AccountService as Service>::NAME,
        "Starting modelrpc daemon"
    );

    let server = AccountEndpoint::new(dispatcher).into_server();
    transport::serve(&config.listen()?, server, shutdown_signal()).await?;

    info!("Daemon stopped");
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("Shutdown signal received");
}
