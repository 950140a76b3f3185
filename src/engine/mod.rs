mod conflict;
mod error;
mod mutations;
mod queries;
mod store;

pub use conflict::has_active_overlap;
pub(crate) use conflict::required_fields;
pub use error::EngineError;
pub use store::{EventStore, InMemoryStore};

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, OwnedRwLockWriteGuard, RwLock};
use tracing::info;

use crate::model::*;
use crate::observability;
use crate::wal::Wal;

// ── WAL channel ──────────────────────────────────────────

pub(super) enum WalCommand {
    Append {
        change: Change,
        response: Reply<()>,
    },
    Compact {
        changes: Vec<Change>,
        response: Reply<()>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

pub(super) type Reply<T> = oneshot::Sender<io::Result<T>>;

/// Owns the [`Wal`] and commits queued appends in groups: everything already
/// waiting in the channel shares one fsync.
struct WalWriter {
    wal: Wal,
    group: Vec<(Change, Reply<()>)>,
}

impl WalWriter {
    async fn run(mut self, mut rx: mpsc::Receiver<WalCommand>) {
        while let Some(cmd) = rx.recv().await {
            let mut next = Some(cmd);
            while let Some(cmd) = next.take() {
                match cmd {
                    WalCommand::Append { change, response } => {
                        self.group.push((change, response));
                        next = rx.try_recv().ok();
                    }
                    other => {
                        self.commit();
                        self.handle(other);
                    }
                }
            }
            self.commit();
        }
    }

    fn commit(&mut self) {
        if self.group.is_empty() {
            return;
        }
        let size = self.group.len();
        let started = std::time::Instant::now();
        let result = self.write_group();
        metrics::histogram!(observability::WAL_FLUSH_BATCH_SIZE).record(size as f64);
        metrics::histogram!(observability::WAL_FLUSH_DURATION_SECONDS)
            .record(started.elapsed().as_secs_f64());
        if let Err(e) = &result {
            tracing::error!("WAL commit of {size} changes failed: {e}");
        }
        for (_, reply) in self.group.drain(..) {
            let outcome = match &result {
                Ok(()) => Ok(()),
                Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
            };
            let _ = reply.send(outcome);
        }
    }

    /// All or nothing: on any error the group's bytes are cut back off the
    /// log, since every caller in it is told the write failed.
    fn write_group(&mut self) -> io::Result<()> {
        let written = self
            .group
            .iter()
            .try_for_each(|(change, _)| self.wal.append_buffered(change))
            .and_then(|()| self.wal.flush_sync());
        if written.is_err() {
            if let Err(e) = self.wal.rollback() {
                tracing::error!("WAL rollback failed: {e}");
            }
        }
        written
    }

    fn handle(&mut self, cmd: WalCommand) {
        match cmd {
            WalCommand::Compact { changes, response } => {
                let result = Wal::write_compact_file(self.wal.path(), &changes)
                    .and_then(|()| self.wal.swap_compact_file());
                let _ = response.send(result);
            }
            WalCommand::AppendsSinceCompact { response } => {
                let _ = response.send(self.wal.appends_since_compact());
            }
            WalCommand::Append { change, response } => self.group.push((change, response)),
        }
    }
}

/// The scheduling engine: one event table behind one lock.
///
/// Every mutation holds the write lock across validate → overlap check →
/// WAL append → apply, so two writers can never both pass the overlap check
/// for intersecting spans.
pub struct Engine<S = InMemoryStore> {
    pub(super) store: Arc<RwLock<S>>,
    pub(super) wal_tx: mpsc::Sender<WalCommand>,
}

impl Engine<InMemoryStore> {
    pub fn new(wal_path: PathBuf) -> io::Result<Self> {
        Self::with_store(InMemoryStore::new(), wal_path)
    }
}

impl<S: EventStore + 'static> Engine<S> {
    /// Replay the WAL at `wal_path` into `store` and start the WAL writer.
    /// Must be called from within a tokio runtime.
    pub fn with_store(mut store: S, wal_path: PathBuf) -> io::Result<Self> {
        let changes = Wal::replay(&wal_path)?;
        for change in &changes {
            store.apply(change);
        }
        info!(
            "replayed {} changes from {}: {} events, {} active",
            changes.len(),
            wal_path.display(),
            store.len(),
            store.active_count()
        );
        metrics::gauge!(observability::EVENTS_ACTIVE).set(store.active_count() as f64);

        let wal = Wal::open(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        let writer = WalWriter {
            wal,
            group: Vec::new(),
        };
        tokio::spawn(writer.run(wal_rx));

        Ok(Self {
            store: Arc::new(RwLock::new(store)),
            wal_tx,
        })
    }

    pub(super) async fn write_store(&self) -> OwnedRwLockWriteGuard<S> {
        self.store.clone().write_owned().await
    }

    /// WAL-append then apply, as one step that outlives the caller.
    ///
    /// The append and the apply run on a spawned task that owns the write
    /// guard, so dropping the calling future cannot leave a logged change
    /// unapplied. The store is untouched if the append fails. On success the
    /// guard comes back so the caller can read the result under the lock.
    pub(super) async fn persist_and_apply(
        &self,
        mut store: OwnedRwLockWriteGuard<S>,
        change: Change,
    ) -> Result<OwnedRwLockWriteGuard<S>, EngineError> {
        let wal_tx = self.wal_tx.clone();
        let commit = tokio::spawn(async move {
            wal_append(&wal_tx, &change).await?;
            store.apply(&change);
            metrics::gauge!(observability::EVENTS_ACTIVE).set(store.active_count() as f64);
            Ok::<_, EngineError>(store)
        });
        commit
            .await
            .map_err(|e| EngineError::WalError(format!("commit task failed: {e}")))?
    }
}

/// Write a change to the WAL via the background group-commit writer.
async fn wal_append(wal_tx: &mpsc::Sender<WalCommand>, change: &Change) -> Result<(), EngineError> {
    let (tx, rx) = oneshot::channel();
    wal_tx
        .send(WalCommand::Append {
            change: change.clone(),
            response: tx,
        })
        .await
        .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
    rx.await
        .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
        .map_err(|e| EngineError::WalError(e.to_string()))
}
