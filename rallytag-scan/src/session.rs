use crate::error::{Result, ScanError};
use crate::poller::QuorumPoller;
use rallytag_core::{Identity, MatchStore, MatchType, Storage};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Host-side session state. Published over a watch channel so the UI
/// layer and the quorum poller both see transitions as they happen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Selecting,
    Hosting {
        match_id: String,
        secret: String,
        target: usize,
        participants: usize,
    },
    Confirmed {
        match_id: String,
    },
    Cancelled,
}

/// What the host gets back from opening a session: the values to
/// render as a scannable code.
#[derive(Debug, Clone)]
pub struct HostedMatch {
    pub match_id: String,
    pub secret: String,
    pub target: usize,
}

/// Host-side lifecycle: `Selecting → Hosting → Confirmed`, with
/// cancellation possible until confirmation. Owns the quorum poller
/// while hosting; the poller is stopped on every exit from `Hosting`,
/// including drop.
pub struct HostSession {
    storage: Arc<Storage>,
    poll_interval: Duration,
    state_tx: watch::Sender<SessionState>,
    poller: Option<QuorumPoller>,
}

impl HostSession {
    pub fn new(storage: Arc<Storage>) -> Self {
        let (state_tx, _) = watch::channel(SessionState::Selecting);
        Self {
            storage,
            poll_interval: Duration::from_secs(2),
            state_tx,
            poller: None,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn state(&self) -> SessionState {
        self.state_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    /// Create the match and move to `Hosting`. On storage failure the
    /// session stays in `Selecting` and the host may retry.
    pub async fn create_session(
        &mut self,
        host: &Identity,
        match_type: MatchType,
    ) -> Result<HostedMatch> {
        if !matches!(self.state(), SessionState::Selecting) {
            return Err(ScanError::invalid_state(
                "session already past type selection",
            ));
        }

        let record = MatchStore::new(&self.storage)
            .create_match(&host.user_id, match_type)
            .await?;
        let target = match_type.target_participants();

        self.state_tx.send_replace(SessionState::Hosting {
            match_id: record.id.clone(),
            secret: record.secret.clone(),
            target,
            participants: 0,
        });

        self.poller = Some(QuorumPoller::spawn(
            self.storage.clone(),
            record.id.clone(),
            target,
            self.poll_interval,
            self.state_tx.clone(),
        ));

        Ok(HostedMatch {
            match_id: record.id,
            secret: record.secret,
            target,
        })
    }

    /// Explicit host cancellation, legal from `Selecting` and
    /// `Hosting`. Stops the poller so nothing keeps polling an
    /// abandoned match.
    pub fn cancel(&mut self) -> Result<()> {
        match self.state() {
            SessionState::Selecting | SessionState::Hosting { .. } => {
                if let Some(poller) = self.poller.take() {
                    poller.stop();
                }
                self.state_tx.send_replace(SessionState::Cancelled);
                tracing::info!("Host cancelled session");
                Ok(())
            }
            SessionState::Confirmed { .. } => {
                Err(ScanError::invalid_state("session already confirmed"))
            }
            SessionState::Cancelled => Err(ScanError::invalid_state("session already cancelled")),
        }
    }
}
