//! Deferred release of native resources.
//!
//! Resource owners do not release native handles in their destructors.
//! Instead, dropping the last [`ResourceOwner`] of a resource hands its
//! record to the [`Disposer`], whose background thread performs the release.
//! Application code may still release eagerly with
//! [`DisposableRecord::dispose`]; the later deferred call is then a no-op.
//!
//! ```text
//!  render thread                       disposer thread
//!  ─────────────                       ───────────────
//!  drop(owner) ── Dispose(record) ──►  record.dispose()
//!  flush()     ── Flush(ack) ───────►  ack.send(())
//!  shutdown()  ── Shutdown ─────────►  drain, exit
//! ```

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, mpsc};
use std::thread;

use parking_lot::Mutex;

use crate::error::{ResourceError, ResourceResult};
use crate::record::DisposableRecord;

enum DisposerCommand {
    Dispose(Arc<DisposableRecord>),
    Flush(mpsc::Sender<()>),
    Shutdown,
}

/// Counters of the drain thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DisposerStats {
    /// Records received by the drain thread.
    pub drained: u64,
    /// Records that had already been disposed eagerly.
    pub already_disposed: u64,
    /// Releases that panicked.
    pub panicked: u64,
}

#[derive(Debug, Default)]
struct SharedStats {
    drained: AtomicU64,
    already_disposed: AtomicU64,
    panicked: AtomicU64,
}

impl SharedStats {
    fn snapshot(&self) -> DisposerStats {
        DisposerStats {
            drained: self.drained.load(Ordering::Acquire),
            already_disposed: self.already_disposed.load(Ordering::Acquire),
            panicked: self.panicked.load(Ordering::Acquire),
        }
    }
}

/// Background service that drains released resources.
///
/// The drain thread blocks while nothing is queued. Shutting the disposer
/// down (explicitly or by dropping it) drains whatever is still queued and
/// joins the thread; owners dropped afterwards release inline on their own
/// thread.
pub struct Disposer {
    handle: DisposerHandle,
    thread: Mutex<Option<thread::JoinHandle<()>>>,
}

impl Disposer {
    /// Start the drain thread.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::DisposerSpawn`] if the thread cannot be spawned.
    pub fn start(thread_name: &str) -> ResourceResult<Self> {
        let (sender, receiver) = mpsc::channel::<DisposerCommand>();
        let stats = Arc::new(SharedStats::default());

        let thread = {
            let stats = Arc::clone(&stats);
            thread::Builder::new()
                .name(thread_name.to_string())
                .spawn(move || run_drain_loop(receiver, &stats))
                .map_err(ResourceError::DisposerSpawn)?
        };
        log::info!("Disposer started on thread [{thread_name}]");

        Ok(Self {
            handle: DisposerHandle { sender, stats },
            thread: Mutex::new(Some(thread)),
        })
    }

    /// A handle that can queue records from any thread.
    pub fn handle(&self) -> DisposerHandle {
        self.handle.clone()
    }

    /// Block until every record queued so far has been drained.
    pub fn flush(&self) {
        self.handle.flush();
    }

    /// Returns true until [`shutdown`](Self::shutdown) has run.
    pub fn is_running(&self) -> bool {
        self.thread.lock().is_some()
    }

    /// Drain the queue and stop the thread. Idempotent.
    pub fn shutdown(&self) {
        let Some(thread) = self.thread.lock().take() else {
            return;
        };
        let _ = self.handle.sender.send(DisposerCommand::Shutdown);
        if thread.join().is_err() {
            log::error!("Disposer thread panicked");
        }
        log::info!("Disposer shut down: {:?}", self.stats());
    }

    /// Snapshot of the drain counters.
    pub fn stats(&self) -> DisposerStats {
        self.handle.stats()
    }
}

impl Drop for Disposer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for Disposer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Disposer")
            .field("running", &self.is_running())
            .field("stats", &self.stats())
            .finish()
    }
}

fn run_drain_loop(receiver: mpsc::Receiver<DisposerCommand>, stats: &SharedStats) {
    while let Ok(command) = receiver.recv() {
        match command {
            DisposerCommand::Dispose(record) => drain(&record, stats),
            DisposerCommand::Flush(ack) => {
                let _ = ack.send(());
            }
            DisposerCommand::Shutdown => break,
        }
    }

    // Owners dropped while shutting down are still released.
    while let Ok(command) = receiver.try_recv() {
        match command {
            DisposerCommand::Dispose(record) => drain(&record, stats),
            DisposerCommand::Flush(ack) => {
                let _ = ack.send(());
            }
            DisposerCommand::Shutdown => {}
        }
    }
    log::debug!("Disposer drain loop finished");
}

fn drain(record: &DisposableRecord, stats: &SharedStats) {
    stats.drained.fetch_add(1, Ordering::AcqRel);
    match panic::catch_unwind(AssertUnwindSafe(|| record.dispose())) {
        Ok(true) => log::trace!("Disposer: released {} {:?}", record.kind(), record.id()),
        Ok(false) => {
            stats.already_disposed.fetch_add(1, Ordering::AcqRel);
        }
        Err(_) => {
            stats.panicked.fetch_add(1, Ordering::AcqRel);
            log::error!(
                "Disposer: native release of {} {:?} panicked",
                record.kind(),
                record.id()
            );
        }
    }
}

/// Cloneable sending side of a [`Disposer`].
#[derive(Clone)]
pub struct DisposerHandle {
    sender: mpsc::Sender<DisposerCommand>,
    stats: Arc<SharedStats>,
}

impl DisposerHandle {
    /// Tie a record to a new owner. Dropping the owner queues the record.
    pub fn register(&self, record: Arc<DisposableRecord>) -> ResourceOwner {
        ResourceOwner {
            record,
            disposer: self.clone(),
        }
    }

    /// Queue a record for release. Releases inline if the disposer has shut down.
    pub fn enqueue(&self, record: Arc<DisposableRecord>) {
        if let Err(mpsc::SendError(DisposerCommand::Dispose(record))) =
            self.sender.send(DisposerCommand::Dispose(record))
        {
            log::debug!("Disposer is gone, releasing {:?} inline", record.id());
            record.dispose();
        }
    }

    /// Block until every record queued so far has been drained.
    pub fn flush(&self) {
        let (ack, done) = mpsc::channel();
        if self.sender.send(DisposerCommand::Flush(ack)).is_ok() {
            let _ = done.recv();
        }
    }

    /// Snapshot of the drain counters.
    pub fn stats(&self) -> DisposerStats {
        self.stats.snapshot()
    }
}

impl fmt::Debug for DisposerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DisposerHandle").finish_non_exhaustive()
    }
}

/// The application-side owner of a native resource.
///
/// Typed resources share one owner through an `Arc`; when the last clone is
/// dropped, the record is marked orphaned and queued on the disposer.
pub struct ResourceOwner {
    record: Arc<DisposableRecord>,
    disposer: DisposerHandle,
}

impl ResourceOwner {
    /// The owned record.
    pub fn record(&self) -> &Arc<DisposableRecord> {
        &self.record
    }
}

impl Drop for ResourceOwner {
    fn drop(&mut self) {
        if self.record.is_disposed() {
            return;
        }
        self.record.mark_orphaned();
        self.disposer.enqueue(Arc::clone(&self.record));
    }
}

impl fmt::Debug for ResourceOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ResourceOwner").field(&self.record).finish()
    }
}

static_assertions::assert_impl_all!(Disposer: Send, Sync);
static_assertions::assert_impl_all!(DisposerHandle: Send, Sync);
static_assertions::assert_impl_all!(ResourceOwner: Send, Sync);

#[cfg(test)]
mod tests {
    use std::sync::Weak;

    use super::*;
    use crate::handle::{Handle, RecordId, ResourceKind};

    fn detached(handle: u64) -> Arc<DisposableRecord> {
        Arc::new(DisposableRecord::new(
            RecordId(handle),
            ResourceKind::Shader,
            Handle::from_raw(handle),
            0,
            Weak::new(),
            0,
        ))
    }

    #[test]
    fn test_drop_queues_record() {
        let disposer = Disposer::start("disposer-test").unwrap();
        let record = detached(1);
        let owner = disposer.handle().register(Arc::clone(&record));

        drop(owner);
        assert!(record.is_orphaned());
        disposer.flush();

        assert!(record.is_disposed());
        assert_eq!(disposer.stats().drained, 1);
    }

    #[test]
    fn test_eager_dispose_skips_queue() {
        let disposer = Disposer::start("disposer-test").unwrap();
        let record = detached(2);
        let owner = disposer.handle().register(Arc::clone(&record));

        assert!(record.dispose());
        drop(owner);
        disposer.flush();

        assert_eq!(disposer.stats().drained, 0);
    }

    #[test]
    fn test_release_after_shutdown_is_inline() {
        let disposer = Disposer::start("disposer-test").unwrap();
        let handle = disposer.handle();
        disposer.shutdown();
        assert!(!disposer.is_running());

        let record = detached(3);
        drop(handle.register(Arc::clone(&record)));
        assert!(record.is_disposed());
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let disposer = Disposer::start("disposer-test").unwrap();
        disposer.shutdown();
        disposer.shutdown();
        disposer.flush();
    }
}
