use std::sync::Arc;

use tracing::info;

use club_core::{
    adapters::{clock::SystemClock, database::memory::MemoryDatabase, push::PushHub},
    commands::DomainLogic,
    config::SweeperConfig,
    sweeper::Sweeper,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = SweeperConfig::from_env();
    let domain = DomainLogic::new(
        Arc::new(MemoryDatabase::default()),
        Arc::new(PushHub::new()),
        Arc::new(SystemClock),
    );
    let sweeper = Sweeper::new(domain, config).spawn();
    info!("club-core running");

    // Stop on SIGTERM/ctrl-c
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
        tokio::select! {
            res = ctrl_c => res?,
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await?;
    }

    info!("shutdown signal received");
    sweeper.shutdown().await;
    info!("club-core stopped");
    Ok(())
}
