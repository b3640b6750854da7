//! Main-thread dispatcher
//!
//! Work produced on other threads (build tooling, native worker threads)
//! that has to touch the bridge is posted here as a closure and run on the
//! owning thread during the next tick.

use crossbeam::channel::{unbounded, Receiver, Sender};
use ponte_sdk::BuildProgress;

use crate::bridge::Bridge;

/// Work to run on the owning thread
pub type MainThreadAction = Box<dyn FnOnce(&mut Bridge) + Send>;

/// Thread-safe handle for posting work to the bridge's owning thread
#[derive(Clone)]
pub struct Dispatcher {
    sender: Sender<MainThreadAction>,
}

impl Dispatcher {
    /// Queue `action`. Returns false if the bridge is gone.
    pub fn post(&self, action: impl FnOnce(&mut Bridge) + Send + 'static) -> bool {
        self.sender.send(Box::new(action)).is_ok()
    }

    /// Queue a build-progress update for the bridge's progress sink
    pub fn report_progress(&self, progress: BuildProgress) -> bool {
        self.post(move |bridge| bridge.report_progress(&progress))
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("queued", &self.sender.len())
            .finish()
    }
}

/// Receiving end of the dispatcher, owned by the bridge
pub(crate) struct ActionQueue {
    sender: Sender<MainThreadAction>,
    receiver: Receiver<MainThreadAction>,
}

impl ActionQueue {
    pub(crate) fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self { sender, receiver }
    }

    pub(crate) fn dispatcher(&self) -> Dispatcher {
        Dispatcher {
            sender: self.sender.clone(),
        }
    }

    /// Everything queued so far. Actions posted while these run wait for
    /// the next drain.
    pub(crate) fn take(&self) -> Vec<MainThreadAction> {
        self.receiver.try_iter().collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.receiver.len()
    }
}
