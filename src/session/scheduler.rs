//! Background tasks that keep a session manager current.
//!
//! DESIGN
//! ======
//! Revalidation runs once at startup, on every external trigger (window
//! focus, visibility change, manual request) and on a fixed period. All
//! sources funnel into `SessionManager::revalidate`, whose gate absorbs
//! bursts. A second task feeds storage events from other clients into
//! `handle_storage_event`.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use super::SessionManager;
use crate::storage::StorageSubscription;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevalidationTrigger {
    Init,
    Focus,
    Visibility,
    Interval,
    Manual,
}

/// Spawn the revalidation loop. It stops when every trigger sender is
/// dropped.
pub fn spawn_revalidation_task(
    manager: SessionManager,
    mut triggers: mpsc::Receiver<RevalidationTrigger>,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        manager.revalidate(RevalidationTrigger::Init).await;

        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let trigger = tokio::select! {
                _ = interval.tick() => RevalidationTrigger::Interval,
                received = triggers.recv() => match received {
                    Some(trigger) => trigger,
                    None => break,
                },
            };
            let outcome = manager.revalidate(trigger).await;
            debug!(?trigger, ?outcome, "revalidation finished");
        }
        debug!("revalidation task stopped");
    })
}

/// Forward `SIGUSR1` as a focus trigger and `SIGUSR2` as a visibility
/// trigger, the process-level stand-ins for a window regaining focus or
/// becoming visible. Stops when the receiver is gone.
///
/// # Errors
///
/// Fails if the signal handlers cannot be registered.
#[cfg(unix)]
pub fn spawn_signal_trigger_task(triggers: mpsc::Sender<RevalidationTrigger>) -> std::io::Result<JoinHandle<()>> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut focus = signal(SignalKind::user_defined1())?;
    let mut visibility = signal(SignalKind::user_defined2())?;
    Ok(tokio::spawn(async move {
        loop {
            let trigger = tokio::select! {
                Some(()) = focus.recv() => RevalidationTrigger::Focus,
                Some(()) = visibility.recv() => RevalidationTrigger::Visibility,
                else => break,
            };
            if triggers.send(trigger).await.is_err() {
                break;
            }
        }
    }))
}

/// Spawn the cross-client sync loop over `subscription`.
pub fn spawn_storage_sync_task(manager: SessionManager, mut subscription: StorageSubscription) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = subscription.recv().await {
            if let Some(signal) = manager.handle_storage_event(&event) {
                debug!(?signal, key = %event.key, "storage signal handled");
            }
        }
        debug!("storage sync task stopped");
    })
}

#[cfg(test)]
#[path = "scheduler_test.rs"]
mod tests;
