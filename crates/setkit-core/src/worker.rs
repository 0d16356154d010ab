use crate::handle::SettingsHandle;
use crate::subscription::parse_event;
use crate::SettingsError;
use serde::Serialize;
use setkit_backend::SettingsBackend;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::debug;

const STOP_POLL_INTERVAL: Duration = Duration::from_millis(20);
const DISPATCH_INTERVAL: Duration = Duration::from_millis(50);

/// Cooperative shutdown flag shared between a worker and its owner.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Sleep until stop is requested or `timeout` elapses. Returns whether
    /// stop was requested.
    pub fn wait(&self, timeout: Duration) -> bool {
        let deadline = std::time::Instant::now() + timeout;
        while !self.is_requested() {
            let now = std::time::Instant::now();
            if now >= deadline {
                return false;
            }
            std::thread::sleep(STOP_POLL_INTERVAL.min(deadline - now));
        }
        true
    }
}

/// A named thread that owns its own [`SettingsHandle`].
///
/// The handle is opened on the worker thread and closed there when the body
/// returns, errors, or panics. Dropping the worker without joining requests
/// stop, so a body that honours its `StopSignal` still releases the handle.
pub struct SettingsWorker<T> {
    name: String,
    stop: StopSignal,
    thread: Option<JoinHandle<Result<T, SettingsError>>>,
}

impl<T: Send + 'static> SettingsWorker<T> {
    pub fn spawn<F>(
        name: &str,
        backend: Arc<dyn SettingsBackend>,
        schema_id: &str,
        body: F,
    ) -> Result<Self, SettingsError>
    where
        F: FnOnce(&mut SettingsHandle, &StopSignal) -> Result<T, SettingsError> + Send + 'static,
    {
        let stop = StopSignal::new();
        let thread_stop = stop.clone();
        let schema = schema_id.to_owned();
        let thread = std::thread::Builder::new()
            .name(name.to_owned())
            .spawn(move || {
                let mut handle = SettingsHandle::open(backend.as_ref(), &schema)?;
                debug!("worker opened {schema}");
                let result = body(&mut handle, &thread_stop);
                handle.close();
                result
            })
            .map_err(|e| SettingsError::Worker(format!("failed to spawn '{name}': {e}")))?;
        debug!("started worker '{name}' on {schema_id}");
        Ok(Self {
            name: name.to_owned(),
            stop,
            thread: Some(thread),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    pub fn stop(&self) {
        self.stop.request();
    }

    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Wait for the worker and return what its body returned.
    pub fn join(mut self) -> Result<T, SettingsError> {
        let name = std::mem::take(&mut self.name);
        let thread = self
            .thread
            .take()
            .ok_or_else(|| SettingsError::Worker(format!("worker '{name}' already joined")))?;
        let result = thread
            .join()
            .map_err(|_| SettingsError::Worker(format!("worker '{name}' panicked")))?;
        debug!("worker '{name}' finished");
        result
    }
}

impl<T> Drop for SettingsWorker<T> {
    fn drop(&mut self) {
        if self.thread.is_some() {
            debug!("worker '{}' dropped without join, requesting stop", self.name);
            self.stop.request();
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeEvent {
    pub schema: String,
    pub key: String,
}

/// Background subscription to one schema that forwards change events into a
/// channel. Dropping it stops the worker, which detaches the subscription
/// and releases its handle.
pub struct Monitor {
    worker: SettingsWorker<()>,
    events: Receiver<ChangeEvent>,
}

impl Monitor {
    pub fn events(&self) -> &Receiver<ChangeEvent> {
        &self.events
    }

    /// Next event, or `None` once `timeout` elapses or the worker is gone.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<ChangeEvent> {
        match self.events.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    pub fn stop_signal(&self) -> StopSignal {
        self.worker.stop_signal()
    }

    pub fn is_running(&self) -> bool {
        !self.worker.is_finished()
    }

    pub fn stop(self) -> Result<(), SettingsError> {
        self.worker.stop();
        self.worker.join()
    }
}

/// Start a worker subscribed to `event` on `schema_id`. Returns once the
/// subscription is registered, so no change made afterwards is missed.
pub fn monitor(
    backend: Arc<dyn SettingsBackend>,
    schema_id: &str,
    event: &str,
) -> Result<Monitor, SettingsError> {
    parse_event(event)?;
    let (tx, rx) = mpsc::channel();
    let (ready_tx, ready_rx) = mpsc::channel::<()>();
    let event = event.to_owned();
    let schema = schema_id.to_owned();

    let worker = SettingsWorker::spawn(
        &format!("monitor:{schema_id}"),
        backend,
        schema_id,
        move |handle, stop| {
            let tx = Mutex::new(tx);
            let id = handle.subscribe(&event, move |key| {
                if let Ok(tx) = tx.lock() {
                    let _ = tx.send(ChangeEvent {
                        schema: schema.clone(),
                        key: key.to_owned(),
                    });
                }
            })?;
            let _ = ready_tx.send(());
            while !stop.wait(DISPATCH_INTERVAL) {
                handle.dispatch_pending()?;
            }
            handle.unsubscribe(id)?;
            Ok(())
        },
    )?;

    if ready_rx.recv().is_err() {
        return Err(worker.join().err().unwrap_or_else(|| {
            SettingsError::Worker("monitor exited before subscribing".to_owned())
        }));
    }
    Ok(Monitor { worker, events: rx })
}

#[cfg(test)]
mod tests {
    use super::*;
    use setkit_backend::MemoryBackend;

    const POWER: &str = "org.gnome.settings-daemon.plugins.power";

    #[test]
    fn stop_signal_wait_times_out() {
        let stop = StopSignal::new();
        assert!(!stop.wait(Duration::from_millis(30)));
        stop.request();
        assert!(stop.wait(Duration::from_secs(5)));
    }

    #[test]
    fn worker_returns_body_result() {
        let backend: Arc<dyn SettingsBackend> = Arc::new(MemoryBackend::new());
        let worker = SettingsWorker::spawn("reader", backend, POWER, |handle, _| {
            handle.get_int("idle-brightness")
        })
        .unwrap();
        assert_eq!(worker.name(), "reader");
        assert_eq!(worker.join().unwrap(), 30);
    }

    #[test]
    fn worker_open_failure_surfaces_on_join() {
        let backend: Arc<dyn SettingsBackend> = Arc::new(MemoryBackend::new());
        let worker =
            SettingsWorker::spawn("bad", backend, "org.example.nonexistent", |_, _| Ok(()))
                .unwrap();
        assert!(matches!(
            worker.join(),
            Err(SettingsError::BackendUnavailable(_))
        ));
    }

    #[test]
    fn worker_stops_on_request() {
        let backend: Arc<dyn SettingsBackend> = Arc::new(MemoryBackend::new());
        let worker = SettingsWorker::spawn("idle", backend, POWER, |_, stop| {
            while !stop.wait(Duration::from_millis(10)) {}
            Ok(())
        })
        .unwrap();
        worker.stop();
        worker.join().unwrap();
    }

    fn wait_for_release(backend: &MemoryBackend) -> usize {
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while backend.open_connections() > 0 && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }
        backend.open_connections()
    }

    #[test]
    fn dropped_worker_is_told_to_stop() {
        let backend = Arc::new(MemoryBackend::new());
        let shared: Arc<dyn SettingsBackend> = backend.clone();
        let worker = SettingsWorker::spawn("abandoned", shared, POWER, |_, stop| {
            while !stop.wait(Duration::from_secs(1)) {}
            Ok(())
        })
        .unwrap();
        let stop = worker.stop_signal();
        drop(worker);
        assert!(stop.is_requested());
        assert_eq!(wait_for_release(&backend), 0);
    }

    #[test]
    fn dropped_monitor_releases_handle() {
        let backend = Arc::new(MemoryBackend::new());
        let shared: Arc<dyn SettingsBackend> = backend.clone();
        let mon = monitor(shared, POWER, "changed").unwrap();
        assert_eq!(backend.open_connections(), 1);
        assert_eq!(backend.listener_count(POWER), 1);

        drop(mon);
        assert_eq!(wait_for_release(&backend), 0);
        assert_eq!(backend.listener_count(POWER), 0);
    }

    #[test]
    fn monitor_rejects_unknown_event() {
        let backend: Arc<dyn SettingsBackend> = Arc::new(MemoryBackend::new());
        assert!(matches!(
            monitor(backend, POWER, "bogus"),
            Err(SettingsError::UnknownEvent(_))
        ));
    }

    #[test]
    fn monitor_unknown_schema_fails_fast() {
        let backend: Arc<dyn SettingsBackend> = Arc::new(MemoryBackend::new());
        assert!(matches!(
            monitor(backend, "org.example.nonexistent", "changed"),
            Err(SettingsError::BackendUnavailable(_))
        ));
    }
}
