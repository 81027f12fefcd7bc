use crate::errors::ListenerError;
use crate::events::MarketEvent;

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{
    mpsc::{channel, Sender},
    Arc, Mutex,
};
use std::thread;

/// Callback invoked with each event delivered to a listener.
pub type ListenerCallback = dyn Fn(MarketEvent) -> Result<(), ListenerError> + Send + Sync + 'static;

/// Commands sent from the notifier to a listener worker thread.
enum ListenerCommand {
    /// Deliver one event to the listener's callback.
    Deliver(MarketEvent),
    /// Gracefully stop the worker loop.
    Shutdown,
}

/// A single registered listener with its own delivery worker.
///
/// Every listener owns a thread fed by an unbounded channel, so a slow
/// or failing callback delays only its own queue: `publish` never waits
/// on a listener, and each listener observes events in publish order.
struct ListenerWorker {
    /// Sender feeding the worker loop (`Deliver`/`Shutdown`).
    tx: Option<Sender<ListenerCommand>>,

    /// Handle to the worker thread, joined on shutdown.
    thread_handle: Option<thread::JoinHandle<()>>,
}

impl ListenerWorker {
    /// Spawns the worker loop for `callback`.
    ///
    /// Callback failures are logged and do not stop the loop; the
    /// listener keeps receiving subsequent events.
    fn spawn(id: u64, callback: Arc<ListenerCallback>) -> Self {
        let (tx, rx) = channel();

        let handle = thread::spawn(move || loop {
            match rx.recv() {
                Ok(ListenerCommand::Deliver(event)) => {
                    if let Err(e) = (callback)(event) {
                        log::warn!("Listener {} callback failed: {}", id, e);
                    }
                }
                Ok(ListenerCommand::Shutdown) | Err(_) => break,
            }
        });

        Self {
            tx: Some(tx),
            thread_handle: Some(handle),
        }
    }

    /// Enqueues one event for this listener. Never blocks.
    fn deliver(&self, event: &MarketEvent) -> Result<(), ListenerError> {
        match &self.tx {
            Some(tx) => tx
                .send(ListenerCommand::Deliver(event.clone()))
                .map_err(|e| ListenerError::CallbackFailed(e.to_string())),
            None => Err(ListenerError::InitializationError(
                "Listener worker already shut down".into(),
            )),
        }
    }

    /// Stops the worker loop and waits for the thread to finish.
    fn shutdown(&mut self) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(ListenerCommand::Shutdown);
        }
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for ListenerWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Fan-out of engine events to a set of registered listeners.
///
/// An explicit observer registry: transports call
/// [`subscribe`](Self::subscribe) with a callback and get back an id for
/// later [`unsubscribe`](Self::unsubscribe). [`publish`](Self::publish)
/// is best-effort fan-out to every listener registered at that moment;
/// per-listener failures are isolated and logged.
#[derive(Default)]
pub struct ChangeNotifier {
    /// Registered listeners by id.
    listeners: Mutex<HashMap<u64, ListenerWorker>>,

    /// Source of listener ids.
    next_id: AtomicU64,
}

impl ChangeNotifier {
    /// Creates a notifier with no listeners.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener and returns its id.
    pub fn subscribe(
        &self,
        callback: impl Fn(MarketEvent) -> Result<(), ListenerError> + Send + Sync + 'static,
    ) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let worker = ListenerWorker::spawn(id, Arc::new(callback));

        let mut listeners = self.listeners.lock().unwrap();
        listeners.insert(id, worker);
        log::info!("Listener {} subscribed. Total listeners: {}", id, listeners.len());
        id
    }

    /// Removes a listener, waiting for its pending deliveries to drain.
    ///
    /// Unknown ids are ignored.
    pub fn unsubscribe(&self, id: u64) {
        let worker = self.listeners.lock().unwrap().remove(&id);
        match worker {
            Some(mut worker) => {
                worker.shutdown();
                log::info!("Listener {} unsubscribed", id);
            }
            None => log::warn!("Attempted to unsubscribe non-existent listener: {}", id),
        }
    }

    /// Delivers an event to all currently registered listeners.
    ///
    /// A listener whose queue cannot accept the event is logged and
    /// skipped; the remaining listeners still receive it.
    pub fn publish(&self, event: &MarketEvent) {
        let listeners = self.listeners.lock().unwrap();
        log::trace!("Publishing {:?} to {} listeners", event, listeners.len());

        for (id, listener) in listeners.iter() {
            if let Err(e) = listener.deliver(event) {
                log::warn!("Failed to deliver event to listener {}: {}", id, e);
            }
        }
    }

    /// Number of currently registered listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.lock().unwrap().len()
    }
}

impl fmt::Debug for ChangeNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeNotifier")
            .field("listener_count", &self.listener_count())
            .finish()
    }
}
