use crate::session::SessionState;
use rallytag_core::{MatchStore, Storage};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Read errors tolerated before the poller starts complaining.
const FAILURE_WARN_THRESHOLD: u32 = 3;

/// Repeating host-side read of the participant count. Publishes the
/// count into the `Hosting` state, flips the session to `Confirmed`
/// when the count first reaches target, and then halts itself. Also
/// halts as soon as the session leaves `Hosting` for any other reason.
pub struct QuorumPoller {
    handle: JoinHandle<()>,
}

impl QuorumPoller {
    pub fn spawn(
        storage: Arc<Storage>,
        match_id: String,
        target: usize,
        poll_interval: Duration,
        state_tx: watch::Sender<SessionState>,
    ) -> Self {
        let handle = tokio::spawn(async move {
            let mut ticks = tokio::time::interval(poll_interval);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut consecutive_failures = 0u32;

            loop {
                ticks.tick().await;

                if !matches!(&*state_tx.borrow(), SessionState::Hosting { .. }) {
                    tracing::debug!("Session left hosting, quorum poller stopping");
                    break;
                }

                let count = match MatchStore::new(&storage).participant_count(&match_id).await {
                    Ok(count) => {
                        consecutive_failures = 0;
                        count
                    }
                    Err(err) => {
                        // Transient read failures mean "try again next
                        // tick", not a user-visible error
                        consecutive_failures += 1;
                        if consecutive_failures >= FAILURE_WARN_THRESHOLD {
                            tracing::warn!(
                                "Quorum poll for match {} failing ({} in a row): {}",
                                match_id,
                                consecutive_failures,
                                err
                            );
                        } else {
                            tracing::debug!("Quorum poll failed, will retry: {}", err);
                        }
                        continue;
                    }
                };

                state_tx.send_if_modified(|state| match state {
                    SessionState::Hosting { participants, .. } if *participants != count => {
                        *participants = count;
                        true
                    }
                    _ => false,
                });

                if count >= target {
                    let confirmed = state_tx.send_if_modified(|state| {
                        if let SessionState::Hosting { match_id, .. } = state {
                            let match_id = match_id.clone();
                            *state = SessionState::Confirmed { match_id };
                            true
                        } else {
                            false
                        }
                    });
                    if confirmed {
                        tracing::info!(
                            "Match {} confirmed with {} participants",
                            match_id,
                            count
                        );
                    }
                    break;
                }
            }
        });

        Self { handle }
    }

    pub fn stop(&self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for QuorumPoller {
    // Teardown of the owner must never leave a poller running
    fn drop(&mut self) {
        self.handle.abort();
    }
}
