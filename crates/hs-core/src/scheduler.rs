//! Single-flight pass scheduling.
//!
//! A [`SyncScheduler`] owns the Idle/Syncing state for one sync target. Triggers
//! that arrive while a pass is running are dropped, not queued. Each pass runs on
//! a dedicated worker thread; progress and completion are sent back as
//! [`SyncNotice`]s, which the caller dispatches to a [`SyncObserver`] on its own
//! thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

use crate::engine::SyncPass;
use crate::ticker::Ticker;

const WORKER_NAME: &str = "heartbeat-sync";

/// Scheduler state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    Syncing,
}

/// Message sent from the worker to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncNotice {
    /// Timestamp of the last acknowledged heartbeat at a checkpoint.
    Progress(DateTime<Utc>),
    /// A pass finished; carries the number of heartbeats sent.
    Complete(usize),
}

/// Receives dispatched notices.
pub trait SyncObserver {
    fn on_progress(&mut self, _checkpoint: DateTime<Utc>) {}

    fn on_complete(&mut self, _heartbeats_sent: usize) {}
}

struct Shared<P> {
    pass: Mutex<P>,
    syncing: AtomicBool,
    last_checkpoint: Mutex<Option<DateTime<Utc>>>,
    notices: Sender<SyncNotice>,
}

/// Resets the syncing flag even if the pass panics.
struct IdleOnDrop<'a>(&'a AtomicBool);

impl Drop for IdleOnDrop<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<P: SyncPass> Shared<P> {
    fn run_pass(&self) {
        let guard = IdleOnDrop(&self.syncing);
        let report = {
            let mut pass = lock(&self.pass);
            pass.run(&mut |checkpoint| {
                *lock(&self.last_checkpoint) = Some(checkpoint);
                tracing::info!(%checkpoint, "sync progress");
                // Receiver gone means nobody is listening; the pass still finishes.
                let _ = self.notices.send(SyncNotice::Progress(checkpoint));
            })
        };
        drop(guard);
        tracing::info!(sent = report.heartbeats_sent, "sync pass complete");
        let _ = self.notices.send(SyncNotice::Complete(report.heartbeats_sent));
    }
}

/// Handle to a single-flight sync target. Cloning shares the same state.
pub struct SyncScheduler<P> {
    shared: Arc<Shared<P>>,
}

impl<P> Clone for SyncScheduler<P> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<P: SyncPass + Send + 'static> SyncScheduler<P> {
    /// Creates an idle scheduler and the channel its notices arrive on.
    pub fn new(pass: P) -> (Self, SyncNotices) {
        let (sender, receiver) = mpsc::channel();
        let scheduler = Self {
            shared: Arc::new(Shared {
                pass: Mutex::new(pass),
                syncing: AtomicBool::new(false),
                last_checkpoint: Mutex::new(None),
                notices: sender,
            }),
        };
        (scheduler, SyncNotices { receiver })
    }

    /// Starts a pass unless one is already running.
    ///
    /// Returns `true` if a pass was started.
    pub fn trigger_sync(&self) -> bool {
        if self
            .shared
            .syncing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("sync already running, dropping trigger");
            return false;
        }

        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name(WORKER_NAME.to_string())
            .spawn(move || shared.run_pass());
        if let Err(err) = spawned {
            tracing::error!(error = %err, "failed to start sync worker");
            self.shared.syncing.store(false, Ordering::Release);
            return false;
        }
        true
    }

    /// Registers a trigger on every tick of `ticker`.
    pub fn attach<T: Ticker>(&self, ticker: &mut T) {
        let scheduler = self.clone();
        ticker.on_tick(Box::new(move || {
            scheduler.trigger_sync();
        }));
    }

    pub fn state(&self) -> SyncState {
        if self.shared.syncing.load(Ordering::Acquire) {
            SyncState::Syncing
        } else {
            SyncState::Idle
        }
    }

    /// Most recent checkpoint published by any pass.
    pub fn last_checkpoint(&self) -> Option<DateTime<Utc>> {
        *lock(&self.shared.last_checkpoint)
    }
}

/// Caller side of the notice channel.
pub struct SyncNotices {
    receiver: Receiver<SyncNotice>,
}

impl SyncNotices {
    /// Delivers every pending notice without blocking. Returns how many were delivered.
    pub fn dispatch<O: SyncObserver + ?Sized>(&self, observer: &mut O) -> usize {
        let mut delivered = 0;
        while let Ok(notice) = self.receiver.try_recv() {
            deliver(notice, observer);
            delivered += 1;
        }
        delivered
    }

    /// Delivers notices until a pass completes or `timeout` elapses.
    ///
    /// Returns the completed pass's heartbeat count.
    pub fn wait_for_completion<O: SyncObserver + ?Sized>(
        &self,
        observer: &mut O,
        timeout: Duration,
    ) -> Option<usize> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.receiver.recv_timeout(remaining) {
                Ok(notice) => {
                    deliver(notice, observer);
                    if let SyncNotice::Complete(sent) = notice {
                        return Some(sent);
                    }
                }
                Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => return None,
            }
        }
    }
}

fn deliver<O: SyncObserver + ?Sized>(notice: SyncNotice, observer: &mut O) {
    match notice {
        SyncNotice::Progress(checkpoint) => observer.on_progress(checkpoint),
        SyncNotice::Complete(sent) => observer.on_complete(sent),
    }
}
