//! The worker's half of `MembershipProtocol` (section 4.3): the
//! heartbeat loop plus the user-timeout sweep. Re-architected per
//! section 9 from a thread-per-daemon blocking loop into a single task
//! that yields on a timer, with cooperative shutdown via a
//! `tokio::sync::watch` channel instead of an externally-killed thread.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::interval;

use cache_common::constants::HEARTBEAT_TIMEOUT_MS;
use cache_common::CommandType;

use crate::service::WorkerService;

/// Registers with the master, then runs the heartbeat loop until
/// `shutdown` fires. Returns once the channel is closed or a value of
/// `true` is received.
pub async fn run(service: WorkerService, mut shutdown: watch::Receiver<bool>) {
    if let Err(e) = service.register_with_master().await {
        tracing::error!(error = %e, "initial registration with master failed");
    }

    let mut ticker = interval(Duration::from_millis(service.config().heartbeat_interval_ms));
    let mut consecutive_failures: u64 = 0;
    let failure_budget = HEARTBEAT_TIMEOUT_MS / service.config().heartbeat_interval_ms.max(1);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    tracing::info!("heartbeat loop shutting down");
                    return;
                }
            }
        }

        match send_heartbeat(&service).await {
            Ok(()) => consecutive_failures = 0,
            Err(e) => {
                consecutive_failures += 1;
                tracing::warn!(error = %e, consecutive_failures, "heartbeat failed");
                if consecutive_failures >= failure_budget.max(1) {
                    tracing::error!("heartbeat failing repeatedly, exiting for restart (section 7)");
                    std::process::exit(1);
                }
            }
        }

        for &user_id in &service.sweep_timed_out_users() {
            tracing::debug!(user_id, "swept timed-out user");
        }
    }
}

async fn send_heartbeat(service: &WorkerService) -> Result<(), reqwest::Error> {
    let worker_id = service.worker_id();
    let used_bytes = service.used_bytes();
    let removed = service.drain_removed();

    let command = service.master().heartbeat(worker_id, used_bytes, removed).await?;
    match command.kind {
        CommandType::Nothing => {}
        CommandType::Register => {
            tracing::warn!("master requested re-registration");
            service.register_with_master().await?;
        }
        CommandType::Free | CommandType::Delete => service.apply_command(&command),
        CommandType::Unknown => {
            tracing::error!("master returned an unknown command, protocol violation");
            std::process::exit(1);
        }
    }

    match service.master().pin_id_list().await {
        Ok(pinned) => service.sync_pins(&pinned),
        Err(e) => tracing::warn!(error = %e, "failed to refresh pin-id list"),
    }

    Ok(())
}
