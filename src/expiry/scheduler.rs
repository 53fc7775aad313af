//! Deadline queue driving expiry callbacks on a background thread.

use super::handle::ExpiryHandle;
use crate::types::SilenceId;
use chrono::{DateTime, Utc};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::io;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Name of the worker thread.
const WORKER_NAME: &str = "silence-expiry";

/// Queue length below which stopped entries are never pruned.
const MIN_PRUNE_LEN: usize = 256;

enum Command {
    Arm {
        id: SilenceId,
        deadline: Instant,
        handle: ExpiryHandle,
    },
    Shutdown,
}

/// Queued expiry, ordered by deadline then arrival.
struct Scheduled {
    deadline: Instant,
    seq: u64,
    id: SilenceId,
    handle: ExpiryHandle,
}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Scheduled {}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scheduled {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.deadline, self.seq).cmp(&(other.deadline, other.seq))
    }
}

/// Front end of the expiry machinery: arms actions and owns the worker
/// thread's lifetime.
pub(crate) struct ExpiryScheduler {
    sender: Sender<Command>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

/// Back end of the expiry machinery, run on its own thread by
/// [`ExpiryWorker::spawn`].
pub(crate) struct ExpiryWorker {
    receiver: Receiver<Command>,
    queue: BinaryHeap<Reverse<Scheduled>>,
    next_seq: u64,
    prune_at: usize,
}

impl ExpiryScheduler {
    /// Create a connected scheduler/worker pair. The worker does nothing
    /// until spawned; commands sent before that are queued.
    pub(crate) fn new() -> (Self, ExpiryWorker) {
        let (sender, receiver) = unbounded();

        let scheduler = Self {
            sender,
            worker: Mutex::new(None),
        };
        let worker = ExpiryWorker {
            receiver,
            queue: BinaryHeap::new(),
            next_seq: 0,
            prune_at: MIN_PRUNE_LEN,
        };

        (scheduler, worker)
    }

    /// Take ownership of the spawned worker thread so it is joined on drop.
    pub(crate) fn attach(&self, thread: JoinHandle<()>) {
        *self.worker.lock() = Some(thread);
    }

    /// Schedule a one-shot expiry for `id` at `ends_at`.
    ///
    /// Deadlines in the past fire immediately. Never blocks.
    pub(crate) fn arm(&self, id: SilenceId, ends_at: DateTime<Utc>) -> ExpiryHandle {
        let handle = ExpiryHandle::new(ends_at);
        let delay = (ends_at - Utc::now()).to_std().unwrap_or(Duration::ZERO);

        let Some(deadline) = Instant::now().checked_add(delay) else {
            debug!(silence_id = %id, ends_at = %ends_at, "expiry beyond clock range, not scheduled");
            return handle;
        };

        let command = Command::Arm {
            id,
            deadline,
            handle: handle.clone(),
        };
        if self.sender.send(command).is_err() {
            warn!(silence_id = %id, "expiry worker is gone, silence will not expire");
        } else {
            debug!(silence_id = %id, delay_ms = delay.as_millis() as u64, "armed expiry");
        }

        handle
    }

    /// Stop the worker thread. Pending actions never fire afterwards.
    pub(crate) fn shutdown(&self) {
        let _ = self.sender.send(Command::Shutdown);

        let Some(thread) = self.worker.lock().take() else {
            return;
        };
        // The last store reference may be released from inside a callback,
        // in which case we are running on the worker itself.
        if thread.thread().id() == thread::current().id() {
            return;
        }
        if thread.join().is_err() {
            warn!("expiry worker panicked");
        }
    }
}

impl Drop for ExpiryScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl ExpiryWorker {
    /// Run the worker on a named thread, invoking `on_expire` for every
    /// armed action whose deadline passes.
    pub(crate) fn spawn<F>(self, on_expire: F) -> io::Result<JoinHandle<()>>
    where
        F: FnMut(SilenceId, &ExpiryHandle) + Send + 'static,
    {
        thread::Builder::new()
            .name(WORKER_NAME.to_string())
            .spawn(move || self.run(on_expire))
    }

    fn run<F>(mut self, mut on_expire: F)
    where
        F: FnMut(SilenceId, &ExpiryHandle),
    {
        loop {
            let received = match self.queue.peek() {
                Some(Reverse(next)) => {
                    let wait = next.deadline.saturating_duration_since(Instant::now());
                    self.receiver.recv_timeout(wait)
                }
                None => self
                    .receiver
                    .recv()
                    .map_err(|_| RecvTimeoutError::Disconnected),
            };

            match received {
                Ok(Command::Arm {
                    id,
                    deadline,
                    handle,
                }) => self.push(id, deadline, handle),
                Ok(Command::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
                Err(RecvTimeoutError::Timeout) => {}
            }

            self.fire_due(&mut on_expire);
        }

        debug!(queued = self.queue.len(), "expiry worker stopped");
    }

    fn push(&mut self, id: SilenceId, deadline: Instant, handle: ExpiryHandle) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.push(Reverse(Scheduled {
            deadline,
            seq,
            id,
            handle,
        }));

        // Stopped actions stay queued until their deadline; drop them in bulk
        // once the queue doubles.
        if self.queue.len() >= self.prune_at {
            self.queue.retain(|Reverse(s)| s.handle.is_armed());
            self.prune_at = MIN_PRUNE_LEN.max(self.queue.len() * 2);
        }
    }

    fn fire_due<F>(&mut self, on_expire: &mut F)
    where
        F: FnMut(SilenceId, &ExpiryHandle),
    {
        let now = Instant::now();
        while self
            .queue
            .peek()
            .is_some_and(|Reverse(next)| next.deadline <= now)
        {
            let Some(Reverse(due)) = self.queue.pop() else {
                break;
            };
            if due.handle.is_armed() {
                on_expire(due.id, &due.handle);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;

    fn start() -> (ExpiryScheduler, Receiver<SilenceId>) {
        let (scheduler, worker) = ExpiryScheduler::new();
        let (fired_tx, fired_rx) = bounded(64);
        let thread = worker
            .spawn(move |id, handle| {
                handle.stop();
                let _ = fired_tx.send(id);
            })
            .unwrap();
        scheduler.attach(thread);
        (scheduler, fired_rx)
    }

    fn millis(ms: i64) -> DateTime<Utc> {
        Utc::now() + chrono::Duration::milliseconds(ms)
    }

    #[test]
    fn test_past_deadline_fires_immediately() {
        let (scheduler, fired) = start();

        scheduler.arm(SilenceId(1), millis(-5_000));

        let id = fired.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(id, SilenceId(1));
    }

    #[test]
    fn test_fires_in_deadline_order() {
        let (scheduler, fired) = start();

        scheduler.arm(SilenceId(3), millis(150));
        scheduler.arm(SilenceId(1), millis(30));
        scheduler.arm(SilenceId(2), millis(90));

        let order: Vec<_> = (0..3)
            .map(|_| fired.recv_timeout(Duration::from_secs(2)).unwrap())
            .collect();
        assert_eq!(order, vec![SilenceId(1), SilenceId(2), SilenceId(3)]);
    }

    #[test]
    fn test_stopped_action_does_not_fire() {
        let (scheduler, fired) = start();

        let handle = scheduler.arm(SilenceId(1), millis(50));
        assert!(handle.stop());
        scheduler.arm(SilenceId(2), millis(100));

        let id = fired.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(id, SilenceId(2));
        assert!(fired.recv_timeout(Duration::from_millis(100)).is_err());
    }

    #[test]
    fn test_shutdown_stops_worker() {
        let (scheduler, fired) = start();

        scheduler.arm(SilenceId(1), millis(100));
        scheduler.shutdown();

        assert!(fired.recv_timeout(Duration::from_millis(300)).is_err());
    }

    #[test]
    fn test_prune_keeps_armed_entries() {
        let (scheduler, fired) = start();

        for i in 0..(MIN_PRUNE_LEN as u64 * 2) {
            let handle = scheduler.arm(SilenceId(1000 + i), millis(60_000));
            handle.stop();
        }
        scheduler.arm(SilenceId(7), millis(50));

        let id = fired.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(id, SilenceId(7));
    }
}
