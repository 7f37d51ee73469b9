//! Watch command: scans the gateway periodically in the foreground.
//!
//! This module wires the gateway components together:
//! - Gateway connection and presence registries
//! - Scheduler (periodic enumeration scans)
//! - Event printer, which also tracks the things it has shown
//! - Ctrl-C for shutdown

use std::sync::Arc;
use std::time::Duration;

use lightify_gateway::{Gateway, GatewayConfig, GatewayEvent, Scheduler, ThingSet};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::error::ClientResult;
use crate::output;

/// Scans until Ctrl-C, printing one line per event.
///
/// `interval` overrides the configured device poll interval.
pub async fn run(
    mut config: GatewayConfig,
    interval: Option<Duration>,
    json: bool,
) -> ClientResult<()> {
    if let Some(interval) = interval {
        config.poll_interval = interval;
    }
    let scheduler_config = config.scheduler_config();

    // 1. Gateway, with the printed things as the presentation side
    let things = Arc::new(ThingSet::new());
    let (gateway, events) = Gateway::connect(config, things.clone()).await?;
    info!(peer = %gateway.connection().peer(), "Connected to gateway");

    // 2. Event printer
    let printer = tokio::spawn(print_events(events, things, json));

    // 3. Scheduler, which owns the gateway until it stops
    let scheduler = Scheduler::new(scheduler_config);
    let scheduler_handle = scheduler.handle();
    let scheduler_task = tokio::spawn(scheduler.run(gateway));

    // Run until interrupted
    tokio::signal::ctrl_c().await?;

    info!("Shutting down...");
    if let Err(e) = scheduler_handle.stop().await {
        warn!(error = %e, "Failed to send stop command to scheduler");
    }
    // Give the scheduler a moment to finish a scan in flight
    match tokio::time::timeout(Duration::from_secs(5), scheduler_task).await {
        Ok(Ok(gateway)) => {
            if let Err(e) = gateway.connection().close().await {
                warn!(error = %e, "Failed to close gateway connection");
            }
        }
        Ok(Err(e)) => error!(error = %e, "Scheduler task failed"),
        Err(_) => warn!("Scheduler did not stop in time"),
    }
    printer.abort();

    info!("Watch stopped");
    Ok(())
}

async fn print_events(
    mut events: mpsc::Receiver<GatewayEvent>,
    things: Arc<ThingSet>,
    json: bool,
) {
    while let Some(event) = events.recv().await {
        things.observe(&event);
        match output::event(&event, json) {
            Ok(line) => println!("{}", line),
            Err(e) => error!(error = %e, "Failed to render event"),
        }
    }
}
