//! Dispatch of presentation work onto the thread that owns it
//!
//! Playback and surface objects may only be touched from one thread. The bridge never
//! runs there itself; it posts actions through an [`OwnerDispatcher`] and moves on
//! without waiting for them.

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};

use flume::{Receiver, Sender};
use once_cell::sync::OnceCell;
use tracing::{debug, info};

/// Work to run on the presentation-owning thread
pub type OwnerAction = Box<dyn FnOnce() + Send + 'static>;

/// Capability to run work on the presentation-owning thread.
///
/// `post` is fire-and-forget and must not block the caller.
pub trait OwnerDispatcher: Send + Sync {
    fn post(&self, action: OwnerAction);
}

/// Runs every action immediately on the calling thread.
///
/// For tests and headless consumers with no thread affinity.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineDispatcher;

impl OwnerDispatcher for InlineDispatcher {
    fn post(&self, action: OwnerAction) {
        action();
    }
}

/// Sends actions to an [`OwnerLoop`] over a channel.
///
/// Posting from the owner thread itself runs the action inline.
#[derive(Clone)]
pub struct ChannelDispatcher {
    tx: Sender<OwnerAction>,
    owner: Arc<OnceCell<ThreadId>>,
}

impl ChannelDispatcher {
    fn on_owner_thread(&self) -> bool {
        self.owner.get() == Some(&thread::current().id())
    }
}

impl OwnerDispatcher for ChannelDispatcher {
    fn post(&self, action: OwnerAction) {
        if self.on_owner_thread() {
            action();
            return;
        }
        if self.tx.send(action).is_err() {
            debug!("Owner loop gone, dropping posted action");
        }
    }
}

/// Receiving end of a [`ChannelDispatcher`].
///
/// Bound to the first thread that drives it.
pub struct OwnerLoop {
    rx: Receiver<OwnerAction>,
    owner: Arc<OnceCell<ThreadId>>,
}

impl OwnerLoop {
    pub fn channel() -> (ChannelDispatcher, OwnerLoop) {
        let (tx, rx) = flume::unbounded();
        let owner = Arc::new(OnceCell::new());
        (
            ChannelDispatcher {
                tx,
                owner: Arc::clone(&owner),
            },
            OwnerLoop { rx, owner },
        )
    }

    fn bind(&self) {
        let _ = self.owner.set(thread::current().id());
    }

    /// Run posted actions until every dispatcher has been dropped
    pub fn run(self) {
        self.bind();
        while let Ok(action) = self.rx.recv() {
            action();
        }
        debug!("Owner loop finished");
    }

    /// Run the actions posted so far without waiting for more
    pub fn run_pending(&self) -> usize {
        self.bind();
        let mut ran = 0;
        while let Ok(action) = self.rx.try_recv() {
            action();
            ran += 1;
        }
        ran
    }
}

/// Dedicated presentation-owning thread
pub struct OwnerThread;

impl OwnerThread {
    /// Spawn a named thread running an [`OwnerLoop`].
    ///
    /// The thread exits once every clone of the returned dispatcher is dropped.
    pub fn spawn(name: &str) -> io::Result<(ChannelDispatcher, JoinHandle<()>)> {
        let (dispatcher, owner_loop) = OwnerLoop::channel();
        let handle = thread::Builder::new()
            .name(name.to_owned())
            .spawn(move || owner_loop.run())?;
        info!("Presentation thread '{}' started", name);
        Ok((dispatcher, handle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[test]
    fn test_inline_runs_immediately() {
        let ran = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ran);
        InlineDispatcher.post(Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_channel_defers_until_drained() {
        let (dispatcher, owner_loop) = OwnerLoop::channel();
        let ran = Arc::new(AtomicUsize::new(0));

        let worker = {
            let dispatcher = dispatcher.clone();
            let ran = Arc::clone(&ran);
            thread::spawn(move || {
                for _ in 0..3 {
                    let ran = Arc::clone(&ran);
                    dispatcher.post(Box::new(move || {
                        ran.fetch_add(1, Ordering::SeqCst);
                    }));
                }
            })
        };
        worker.join().unwrap();

        assert_eq!(ran.load(Ordering::SeqCst), 0);
        assert_eq!(owner_loop.run_pending(), 3);
        assert_eq!(ran.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_posting_from_owner_thread_runs_inline() {
        let (dispatcher, owner_loop) = OwnerLoop::channel();
        owner_loop.run_pending();

        let ran = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ran);
        dispatcher.post(Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(ran.load(Ordering::SeqCst), 1);
        assert_eq!(owner_loop.run_pending(), 0);
    }

    #[test]
    fn test_owner_thread_runs_actions_on_itself() {
        let (dispatcher, handle) = OwnerThread::spawn("test-owner").unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for _ in 0..2 {
            let seen = Arc::clone(&seen);
            dispatcher.post(Box::new(move || {
                let name = thread::current().name().map(str::to_owned);
                seen.lock().unwrap().push(name);
            }));
        }
        drop(dispatcher);
        handle.join().unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert!(seen.iter().all(|n| n.as_deref() == Some("test-owner")));
    }
}
