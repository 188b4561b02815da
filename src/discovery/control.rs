//! Cooperative per-site crawl controls.
//!
//! A [`CrawlControl`] travels with one site's crawl. External drivers (the
//! interactive CLI, the [`StallWatchdog`]) request "abandon the current URL"
//! through a [`ControlHandle`]; the crawl loop consumes the request with a
//! non-blocking [`CrawlControl::take_skip`] between pages.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Commands accepted from outside a crawl.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    /// Abandon the URL currently being processed.
    SkipCurrent,
}

#[derive(Debug)]
struct ControlState {
    skip: AtomicBool,
    last_progress: Mutex<Instant>,
}

/// Per-site control block shared between the crawl loop and its drivers.
#[derive(Debug, Clone)]
pub struct CrawlControl {
    state: Arc<ControlState>,
    cancel: CancellationToken,
}

impl Default for CrawlControl {
    fn default() -> Self {
        Self::new(CancellationToken::new())
    }
}

impl CrawlControl {
    /// Create a control block whose cancellation follows `cancel`.
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            state: Arc::new(ControlState {
                skip: AtomicBool::new(false),
                last_progress: Mutex::new(Instant::now()),
            }),
            cancel,
        }
    }

    /// Consume a pending skip request, if any.
    pub fn take_skip(&self) -> bool {
        self.state.skip.swap(false, Ordering::AcqRel)
    }

    /// Handle for requesting skips from another task.
    pub fn handle(&self) -> ControlHandle {
        ControlHandle {
            state: Arc::clone(&self.state),
        }
    }

    /// Record that discovery produced something.
    pub fn mark_progress(&self) {
        if let Ok(mut last) = self.state.last_progress.lock() {
            *last = Instant::now();
        }
    }

    /// Time since the last recorded progress.
    pub fn since_progress(&self) -> Duration {
        self.state
            .last_progress
            .lock()
            .map(|last| last.elapsed())
            .unwrap_or_default()
    }

    /// Whether the whole crawl should stop.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }
}

/// Requests skips on a [`CrawlControl`].
#[derive(Debug, Clone)]
pub struct ControlHandle {
    state: Arc<ControlState>,
}

impl ControlHandle {
    pub fn skip_current(&self) {
        self.state.skip.store(true, Ordering::Release);
    }
}

/// Requests a skip whenever discovery makes no progress for a full window.
pub struct StallWatchdog {
    stop: CancellationToken,
    task: JoinHandle<()>,
}

impl StallWatchdog {
    pub fn spawn(control: &CrawlControl, window: Duration) -> Self {
        let stop = control.cancel_token().child_token();
        let watch = stop.clone();
        let control = control.clone();
        let handle = control.handle();
        let tick = (window / 4).max(Duration::from_millis(50));

        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick);
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = watch.cancelled() => break,
                    _ = interval.tick() => {
                        if control.since_progress() >= window {
                            warn!("No discovery progress for {:?}, skipping current URL", window);
                            handle.skip_current();
                            control.mark_progress();
                        }
                    }
                }
            }
        });

        Self { stop, task }
    }

    /// Stop watching and wait for the task to exit.
    pub async fn stop(self) {
        self.stop.cancel();
        let _ = self.task.await;
    }
}

/// Active crawls reachable by external commands, keyed by [`CrawlTarget::key`].
///
/// [`CrawlTarget::key`]: crate::models::CrawlTarget::key
#[derive(Debug, Clone, Default)]
pub struct ControlRegistry {
    handles: Arc<Mutex<HashMap<String, ControlHandle>>>,
}

impl ControlRegistry {
    pub fn register(&self, site: &str, handle: ControlHandle) {
        if let Ok(mut handles) = self.handles.lock() {
            handles.insert(site.to_string(), handle);
        }
    }

    pub fn unregister(&self, site: &str) {
        if let Ok(mut handles) = self.handles.lock() {
            handles.remove(site);
        }
    }

    /// Deliver a command to every active crawl. Returns how many received it.
    pub fn broadcast(&self, command: ControlCommand) -> usize {
        let Ok(handles) = self.handles.lock() else {
            return 0;
        };
        for handle in handles.values() {
            match command {
                ControlCommand::SkipCurrent => handle.skip_current(),
            }
        }
        handles.len()
    }
}

/// Forward commands from a channel to the registry until the sender closes.
pub async fn forward_commands(mut rx: mpsc::Receiver<ControlCommand>, registry: ControlRegistry) {
    while let Some(command) = rx.recv().await {
        let delivered = registry.broadcast(command);
        debug!("Delivered {:?} to {} active crawls", command, delivered);
    }
}
