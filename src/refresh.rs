//! Single-flight coordination for access-token refresh.
//!
//! At most one refresh call is in flight at any time. The first caller to hit
//! an expired token becomes the *leader* and performs the call; everyone else
//! queues as a *waiter* and is handed the leader's outcome. Waiters are
//! delivered in arrival order, exactly once each.

use std::sync::Mutex;

use tokio::sync::oneshot;

use crate::error::Error;

/// Outcome of a refresh cycle, delivered to every queued waiter.
pub(crate) type RefreshOutcome = Result<String, RefreshFailure>;

/// Why a refresh cycle failed. Plain data so one failure can fan out to
/// every waiter.
#[derive(Debug, Clone)]
pub(crate) struct RefreshFailure {
    pub(crate) status: Option<u16>,
    pub(crate) detail: String,
}

impl From<RefreshFailure> for Error {
    fn from(failure: RefreshFailure) -> Self {
        Error::Refresh {
            status: failure.status,
            detail: failure.detail,
        }
    }
}

/// What [`RefreshGate::acquire`] handed the caller.
pub(crate) enum Ticket {
    /// The caller won the check-and-set and must perform the refresh, then
    /// call [`RefreshGate::settle`].
    Leader,
    /// A refresh is already in flight; await the receiver for its outcome.
    Waiter(oneshot::Receiver<RefreshOutcome>),
}

#[derive(Default)]
struct GateState {
    refreshing: bool,
    waiters: Vec<oneshot::Sender<RefreshOutcome>>,
}

/// At-most-one-refresh-in-flight gate with a FIFO waiter queue.
///
/// The flag and the queue share one mutex, so the idle → refreshing
/// check-and-set cannot race even when several 401s land in the same
/// scheduling tick. The lock is never held across an await.
#[derive(Default)]
pub(crate) struct RefreshGate {
    state: Mutex<GateState>,
}

impl RefreshGate {
    pub(crate) fn acquire(&self) -> Ticket {
        let mut state = self.state.lock().expect("refresh gate poisoned");
        if state.refreshing {
            let (tx, rx) = oneshot::channel();
            state.waiters.push(tx);
            Ticket::Waiter(rx)
        } else {
            state.refreshing = true;
            Ticket::Leader
        }
    }

    /// End the in-flight cycle: deliver `outcome` to every waiter in arrival
    /// order, then return the gate to idle. Runs under the lock, so no new
    /// cycle can start in between. Returns the number of waiters notified.
    pub(crate) fn settle(&self, outcome: &RefreshOutcome) -> usize {
        let mut state = self.state.lock().expect("refresh gate poisoned");
        let waiters = std::mem::take(&mut state.waiters);
        let count = waiters.len();
        for tx in waiters {
            // A waiter whose task was cancelled has dropped its receiver.
            let _ = tx.send(outcome.clone());
        }
        state.refreshing = false;
        count
    }
}
