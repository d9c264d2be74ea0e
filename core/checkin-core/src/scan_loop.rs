//! Drives decode events from a live scanner into the redemption gateway.
//!
//! Events are taken in emission order. While a redemption is outstanding,
//! newly arrived events are dropped: a held-up QR code keeps decoding many
//! times a second and only the first read in that window should count.
//! Session credentials are resolved per event, so a token refreshed by the
//! auth flow mid-session is used from the next scan on.

use std::sync::Arc;

use serde::Serialize;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::config::SessionKeys;
use crate::redeem::{RedeemTransport, RedemptionGateway, RedemptionOutcome};
use crate::scan::{DecodeEvents, ScanControl};
use crate::session::resolve_session_with_keys;
use crate::storage::KeyValueStore;

/// Tally of what happened to each decode event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    pub redeemed: usize,
    pub failed: usize,
    pub dropped: usize,
}

pub struct ScanLoop<T, S>
where
    T: RedeemTransport + 'static,
    S: ScanControl + 'static,
{
    gateway: Arc<RedemptionGateway<T>>,
    scanner: Arc<S>,
    store: Arc<dyn KeyValueStore>,
    keys: SessionKeys,
}

impl<T, S> ScanLoop<T, S>
where
    T: RedeemTransport + 'static,
    S: ScanControl + 'static,
{
    pub fn new(
        gateway: Arc<RedemptionGateway<T>>,
        scanner: Arc<S>,
        store: Arc<dyn KeyValueStore>,
        keys: SessionKeys,
    ) -> Self {
        Self {
            gateway,
            scanner,
            store,
            keys,
        }
    }

    /// Runs until `events` closes and the last redemption settles.
    ///
    /// `on_outcome` sees every redemption that actually ran, in completion
    /// order. An event is dropped exactly when the gateway already has a
    /// redemption outstanding as it arrives.
    pub async fn run<F>(&self, mut events: DecodeEvents, mut on_outcome: F) -> ScanReport
    where
        F: FnMut(&RedemptionOutcome),
    {
        let mut report = ScanReport::default();
        let mut tasks: JoinSet<RedemptionOutcome> = JoinSet::new();
        let mut open = true;

        loop {
            tokio::select! {
                // Arrivals first, so reads that landed during a redemption are
                // dropped before that redemption is reaped.
                biased;

                event = events.recv(), if open => match event {
                    Some(raw) => {
                        let Some(reservation) = self.gateway.try_reserve() else {
                            debug!("Redemption in flight; dropping decode event");
                            report.dropped += 1;
                            continue;
                        };
                        let auth = resolve_session_with_keys(self.store.as_ref(), &self.keys);
                        let scanner = Arc::clone(&self.scanner);
                        tasks.spawn(async move {
                            reservation.redeem(&raw, &auth, scanner.as_ref()).await
                        });
                    }
                    None => open = false,
                },
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => match joined {
                    Ok(outcome) => {
                        if outcome.is_success() {
                            report.redeemed += 1;
                        } else {
                            report.failed += 1;
                        }
                        on_outcome(&outcome);
                    }
                    Err(err) => warn!(error = %err, "Redemption task failed"),
                },
                else => break,
            }
        }

        debug!(
            redeemed = report.redeemed,
            failed = report.failed,
            dropped = report.dropped,
            "Scan loop finished"
        );
        report
    }
}
