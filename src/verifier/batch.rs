use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Semaphore, mpsc};
use tokio::task::{Id, JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use super::{Verdict, Verifier};
use crate::mx::MxLookup;
use crate::smtp_verify::HostProber;

/// How one batch entry ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOutcome {
    Verified(Verdict),
    /// The batch was cancelled before a verdict was reached.
    Cancelled,
    /// The verification task died (panic or abort) without a verdict.
    Failed { message: String },
}

/// One entry of a batch. Every submitted address yields exactly one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchItem {
    /// Position of the address in the submitted list.
    pub index: usize,
    pub address: String,
    pub outcome: BatchOutcome,
}

impl BatchItem {
    fn cancelled(index: usize, address: String) -> Self {
        Self {
            index,
            address,
            outcome: BatchOutcome::Cancelled,
        }
    }

    pub fn verdict(&self) -> Option<&Verdict> {
        match &self.outcome {
            BatchOutcome::Verified(verdict) => Some(verdict),
            BatchOutcome::Cancelled | BatchOutcome::Failed { .. } => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.outcome == BatchOutcome::Cancelled
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, BatchOutcome::Failed { .. })
    }
}

/// Addresses of the tasks still in the pool, so a dead task can be reported.
type InFlight = HashMap<Id, (usize, String)>;

impl<L, P> Verifier<L, P>
where
    L: MxLookup + 'static,
    P: HostProber + 'static,
{
    /// Verify `addresses` on a bounded pool of tasks and stream the results
    /// in completion order.
    ///
    /// At most `max_concurrent_addresses` verifications run at once. Once
    /// `cancel` fires, running verifications stop and every address not yet
    /// reported is sent back as [`BatchOutcome::Cancelled`]. A task that
    /// panics is reported as [`BatchOutcome::Failed`]. The channel closes
    /// when every address has been reported.
    pub fn spawn_batch(
        self: &Arc<Self>,
        addresses: Vec<String>,
        cancel: CancellationToken,
    ) -> mpsc::Receiver<BatchItem> {
        let (tx, rx) = mpsc::channel(self.max_concurrent * 2);
        tokio::spawn(Arc::clone(self).dispatch(addresses, cancel, tx));
        rx
    }

    /// Run a batch to completion; results come back in submission order.
    pub async fn verify_batch(
        self: &Arc<Self>,
        addresses: Vec<String>,
        cancel: CancellationToken,
    ) -> Vec<BatchItem> {
        let mut rx = self.spawn_batch(addresses, cancel);
        let mut items = Vec::new();
        while let Some(item) = rx.recv().await {
            items.push(item);
        }
        items.sort_by_key(|item| item.index);
        items
    }

    async fn dispatch(
        self: Arc<Self>,
        addresses: Vec<String>,
        cancel: CancellationToken,
        tx: mpsc::Sender<BatchItem>,
    ) {
        let total = addresses.len();
        let slots = Arc::new(Semaphore::new(self.max_concurrent));
        let mut workers = JoinSet::new();
        let mut in_flight = InFlight::new();

        for (index, address) in addresses.into_iter().enumerate() {
            while let Some(joined) = workers.try_join_next_with_id() {
                reap(joined, &mut in_flight, &tx).await;
            }

            let permit = if cancel.is_cancelled() {
                None
            } else {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => None,
                    permit = Arc::clone(&slots).acquire_owned() => permit.ok(),
                }
            };
            let Some(permit) = permit else {
                if tx.send(BatchItem::cancelled(index, address)).await.is_err() {
                    debug!("batch receiver dropped");
                    break;
                }
                continue;
            };

            let verifier = Arc::clone(&self);
            let token = cancel.child_token();
            let tx = tx.clone();
            let task_address = address.clone();
            let handle = workers.spawn(async move {
                let verdict = verifier.verify_cancellable(&task_address, &token).await;
                drop(permit);
                let outcome = verdict.map_or(BatchOutcome::Cancelled, BatchOutcome::Verified);
                // le récepteur a pu être abandonné
                let _ = tx
                    .send(BatchItem {
                        index,
                        address: task_address,
                        outcome,
                    })
                    .await;
            });
            in_flight.insert(handle.id(), (index, address));
        }

        while let Some(joined) = workers.join_next_with_id().await {
            reap(joined, &mut in_flight, &tx).await;
        }
        debug!(total, "batch finished");
    }
}

/// Forget a finished task; report its address if it died without sending.
async fn reap(
    joined: Result<(Id, ()), JoinError>,
    in_flight: &mut InFlight,
    tx: &mpsc::Sender<BatchItem>,
) {
    let err = match joined {
        Ok((id, ())) => {
            in_flight.remove(&id);
            return;
        }
        Err(err) => err,
    };
    let Some((index, address)) = in_flight.remove(&err.id()) else {
        error!(error = %err, "unknown verification task failed");
        return;
    };
    error!(index, address = %address, error = %err, "verification task failed");
    let message = if err.is_panic() {
        "verification task panicked".to_string()
    } else {
        err.to_string()
    };
    let _ = tx
        .send(BatchItem {
            index,
            address,
            outcome: BatchOutcome::Failed { message },
        })
        .await;
}
