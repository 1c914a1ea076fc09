//! Periodic overdue sweep.
//!
//! Runs [`BookingsService::update_overdue`] on a fixed period until the
//! shutdown channel flips to `true`. A failed pass is reported through the
//! service observer and the loop keeps going; the next tick retries.

use std::time::Duration;

use tokio::{sync::watch, task::JoinHandle, time};

use super::bookings::BookingsService;

pub fn spawn_overdue_sweep(
    bookings: BookingsService,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = time::interval(period);
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    // Outcome already went to the observer.
                    let _ = bookings.update_overdue().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::debug!("overdue sweep stopping");
                        return;
                    }
                }
            }
        }
    })
}
