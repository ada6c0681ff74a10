/// Autosave scheduler
///
/// Coalesces bursts of live mutations into a single durable write after a
/// quiet period (pure debounce, 1 s by default). The editor publishes the
/// full live shot list on every mutation batch; the scheduler never sees
/// diffs, so each commit serializes the whole list.
///
/// Explicit state machine, driven by the tokio timer:
///
/// ```text
///   Idle --mutation--> Pending --quiet period elapsed--> Committing --> Idle
///            ^             |
///            '--mutation restarts the timer
/// ```
///
/// A mutation arriving while Committing re-enters Pending once the commit
/// finishes: no write is lost and none is forced mid-flight. Commit failures
/// are logged and retried on the next natural cycle, never immediately; they
/// must not take the editor down.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::watch;
use tokio::time::{self, Duration};

use crate::handle::HandleManager;
use crate::serialize;
use crate::shot::Shot;
use crate::store::ShotStore;

/// Quiet period between the last mutation and the durable write.
pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_secs(1);

/// Scheduler state, observable for diagnostics and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Pending,
    Committing,
}

/// Handle to a running autosave task.
///
/// Dropping it without [`shutdown`](Self::shutdown) detaches the task; any
/// pending mutation is still flushed before the task exits.
pub struct AutosaveScheduler {
    shots_tx: watch::Sender<Vec<Shot>>,
    state_rx: watch::Receiver<SchedulerState>,
    commits: Arc<AtomicU64>,
    task: tokio::task::JoinHandle<()>,
}

impl AutosaveScheduler {
    /// Spawn the scheduler over a store. Must be called inside a tokio
    /// runtime.
    pub fn spawn(store: ShotStore, handles: HandleManager, quiet_period: Duration) -> Self {
        let (shots_tx, shots_rx) = watch::channel(Vec::new());
        let (state_tx, state_rx) = watch::channel(SchedulerState::Idle);
        let commits = Arc::new(AtomicU64::new(0));

        let task = tokio::spawn(run(
            store,
            handles,
            quiet_period,
            shots_rx,
            state_tx,
            Arc::clone(&commits),
        ));

        Self {
            shots_tx,
            state_rx,
            commits,
            task,
        }
    }

    /// Publish the current full live shot list. Call on every mutation
    /// batch; the scheduler debounces.
    pub fn notify_mutation(&self, shots: Vec<Shot>) {
        if self.shots_tx.send(shots).is_err() {
            tracing::error!("autosave task is gone; mutation will not be persisted");
        }
    }

    /// Current state of the debounce machine.
    pub fn state(&self) -> SchedulerState {
        *self.state_rx.borrow()
    }

    /// Number of successful commits so far.
    pub fn commit_count(&self) -> u64 {
        self.commits.load(Ordering::SeqCst)
    }

    /// Stop the scheduler, flushing any pending mutation first.
    pub async fn shutdown(self) {
        drop(self.shots_tx);
        if let Err(e) = self.task.await {
            tracing::error!("autosave task panicked: {e}");
        }
    }
}

async fn run(
    mut store: ShotStore,
    handles: HandleManager,
    quiet_period: Duration,
    mut shots_rx: watch::Receiver<Vec<Shot>>,
    state_tx: watch::Sender<SchedulerState>,
    commits: Arc<AtomicU64>,
) {
    loop {
        let _ = state_tx.send(SchedulerState::Idle);

        // Idle: wait for the first mutation of a burst
        if shots_rx.changed().await.is_err() {
            // Editor gone, nothing pending
            return;
        }

        let _ = state_tx.send(SchedulerState::Pending);

        // Pending: every further mutation restarts the quiet-period timer
        let mut editor_gone = false;
        loop {
            tokio::select! {
                _ = time::sleep(quiet_period) => break,
                changed = shots_rx.changed() => {
                    if changed.is_err() {
                        // Flush what we have, then exit
                        editor_gone = true;
                        break;
                    }
                }
            }
        }

        let _ = state_tx.send(SchedulerState::Committing);
        let snapshot = shots_rx.borrow_and_update().clone();
        commit(&mut store, &handles, &snapshot, &commits);

        if editor_gone {
            return;
        }
        // A mutation that arrived while committing is already flagged on
        // shots_rx; the next changed() returns immediately and we re-enter
        // Pending.
    }
}

fn commit(store: &mut ShotStore, handles: &HandleManager, shots: &[Shot], commits: &AtomicU64) {
    let mut durables = Vec::with_capacity(shots.len());
    for shot in shots {
        let (durable, skipped) = serialize::to_durable(shot, handles);
        for err in skipped {
            tracing::warn!("autosave: {err}");
        }
        durables.push(durable);
    }

    match store.put_all(&durables) {
        Ok(()) => {
            commits.fetch_add(1, Ordering::SeqCst);
            tracing::debug!("autosaved {} shot(s)", durables.len());
        }
        Err(e) => {
            tracing::error!("autosave commit failed, retrying on next cycle: {e}");
        }
    }
}
