use ecoride_trip::TripLifecycleManager;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

/// Runs the pending-departure sweep every `every` until the runtime shuts down.
pub async fn run_departure_sweeper(manager: Arc<TripLifecycleManager>, every: Duration) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!("Departure sweeper started, running every {:?}", every);

    loop {
        ticker.tick().await;
        match manager.sweep_pending_departures().await {
            Ok(report) if report.promoted + report.cancelled + report.failed > 0 => info!(
                "Departure sweep: {} pending, {} cancelled, {} failed",
                report.promoted, report.cancelled, report.failed
            ),
            Ok(_) => debug!("Departure sweep: nothing to do"),
            Err(e) => error!("Departure sweep failed: {}", e),
        }
    }
}

pub fn spawn_departure_sweeper(manager: Arc<TripLifecycleManager>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(run_departure_sweeper(manager, every))
}
