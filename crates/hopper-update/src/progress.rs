//! Download progress reporting
//!
//! Listeners never run on the download task directly. Every notification is
//! handed to a [`Dispatcher`] chosen by the host, which decides where the
//! callback executes (inline, or queued for a UI loop to drain).

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

/// A deferred listener notification
pub type Callback = Box<dyn FnOnce() + Send + 'static>;

/// Receives download lifecycle events
pub trait DownloadListener: Send + Sync {
    /// Called once per distinct integer percentage
    fn on_download_progress(&self, percent: u8) {
        let _ = percent;
    }

    fn on_download_complete(&self) {}

    fn on_download_failed(&self) {}
}

/// Execution context for listener callbacks
pub trait Dispatcher: Send + Sync {
    fn dispatch(&self, callback: Callback);
}

/// Runs callbacks immediately on the calling task
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineDispatcher;

impl Dispatcher for InlineDispatcher {
    fn dispatch(&self, callback: Callback) {
        callback();
    }
}

/// Queues callbacks for the host to run on its own thread or loop
///
/// ```rust
/// use hopper_update::progress::{ChannelDispatcher, Dispatcher};
///
/// let (dispatcher, mut queue) = ChannelDispatcher::new();
/// dispatcher.dispatch(Box::new(|| println!("50%")));
/// assert_eq!(ChannelDispatcher::run_pending(&mut queue), 1);
/// ```
#[derive(Debug, Clone)]
pub struct ChannelDispatcher {
    tx: mpsc::UnboundedSender<Callback>,
}

impl ChannelDispatcher {
    /// Create a dispatcher and the queue the host drains
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Callback>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Run every callback queued so far without waiting, returning how many ran
    pub fn run_pending(queue: &mut mpsc::UnboundedReceiver<Callback>) -> usize {
        let mut ran = 0;
        while let Ok(callback) = queue.try_recv() {
            callback();
            ran += 1;
        }
        ran
    }
}

impl Dispatcher for ChannelDispatcher {
    fn dispatch(&self, callback: Callback) {
        if self.tx.send(callback).is_err() {
            debug!("Progress queue closed, dropping notification");
        }
    }
}

/// Registered listeners plus the dispatcher that delivers to them
#[derive(Clone)]
pub struct ProgressHub {
    listeners: Vec<Arc<dyn DownloadListener>>,
    dispatcher: Arc<dyn Dispatcher>,
}

impl ProgressHub {
    pub fn new(dispatcher: Arc<dyn Dispatcher>) -> Self {
        Self {
            listeners: Vec::new(),
            dispatcher,
        }
    }

    pub fn add_listener(&mut self, listener: Arc<dyn DownloadListener>) {
        self.listeners.push(listener);
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn progress(&self, percent: u8) {
        self.notify(move |listener| listener.on_download_progress(percent));
    }

    pub fn complete(&self) {
        self.notify(|listener| listener.on_download_complete());
    }

    pub fn failed(&self) {
        self.notify(|listener| listener.on_download_failed());
    }

    fn notify<F>(&self, event: F)
    where
        F: Fn(&dyn DownloadListener) + Clone + Send + 'static,
    {
        for listener in &self.listeners {
            let listener = Arc::clone(listener);
            let event = event.clone();
            self.dispatcher
                .dispatch(Box::new(move || event(listener.as_ref())));
        }
    }
}

impl Default for ProgressHub {
    fn default() -> Self {
        Self::new(Arc::new(InlineDispatcher))
    }
}

impl std::fmt::Debug for ProgressHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressHub")
            .field("listeners", &self.listeners.len())
            .finish_non_exhaustive()
    }
}

/// Turns byte counts into de-duplicated percentage events
///
/// An unknown or zero total length disables percentage reporting entirely.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    total: Option<u64>,
    read: u64,
    last: Option<u8>,
}

impl ProgressTracker {
    pub fn new(total: Option<u64>) -> Self {
        Self {
            total: total.filter(|&t| t > 0),
            read: 0,
            last: None,
        }
    }

    /// Record `bytes` more read; returns the percentage if it changed
    pub fn advance(&mut self, bytes: u64) -> Option<u8> {
        self.read = self.read.saturating_add(bytes);
        let total = self.total?;

        let percent = ((self.read as f64 / total as f64) * 100.0).round().min(100.0) as u8;
        if self.last.is_some_and(|last| percent <= last) {
            return None;
        }
        self.last = Some(percent);
        Some(percent)
    }

    pub fn bytes_read(&self) -> u64 {
        self.read
    }

    pub fn total(&self) -> Option<u64> {
        self.total
    }
}
