use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::app::config::CollectorSettings;
use crate::app::error::AppError;
use crate::app::logview::collect::collect_logs;
use crate::app::models::{CollectRequest, LogMode, LogRecord, LogSnapshot};
use crate::app::state::{CollectionHandle, ViewState};

pub type Collector =
    Arc<dyn Fn(&CollectRequest, &CollectorSettings, &str) -> Result<Vec<LogRecord>, AppError> + Send + Sync>;

/// Delivered once per collection that was not aborted.
#[derive(Debug)]
pub struct CollectionEvent {
    pub request_id: String,
    pub trace_id: String,
    pub mode: LogMode,
    pub result: Result<Vec<LogRecord>, AppError>,
}

/// Runs `collector` on a worker thread and hands the finished sequence to
/// `sender`, unless `handle` was aborted in the meantime.
pub fn spawn_collection(
    request: CollectRequest,
    settings: CollectorSettings,
    collector: Collector,
    handle: CollectionHandle,
    sender: Sender<CollectionEvent>,
) -> JoinHandle<()> {
    std::thread::spawn(move || {
        let result = collector(&request, &settings, &handle.trace_id);
        if handle.is_aborted() {
            debug!(
                trace_id = %handle.trace_id,
                request_id = %handle.request_id,
                "collection aborted; dropping result"
            );
            return;
        }
        let event = CollectionEvent {
            request_id: handle.request_id.clone(),
            trace_id: handle.trace_id.clone(),
            mode: request.mode,
            result,
        };
        if sender.send(event).is_err() {
            debug!(trace_id = %handle.trace_id, "log view closed before collection finished");
        }
    })
}

/// Single-consumer side of the collection pipeline.
pub struct LogViewSession {
    settings: CollectorSettings,
    collector: Collector,
    sender: Sender<CollectionEvent>,
    receiver: Receiver<CollectionEvent>,
    current: Option<CollectionHandle>,
    state: ViewState,
}

impl LogViewSession {
    pub fn new(settings: CollectorSettings) -> Self {
        Self::with_collector(settings, Arc::new(collect_logs))
    }

    pub fn with_collector(settings: CollectorSettings, collector: Collector) -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            settings,
            collector,
            sender,
            receiver,
            current: None,
            state: ViewState::Idle,
        }
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn current_request(&self) -> Option<&str> {
        self.current.as_ref().map(|handle| handle.request_id.as_str())
    }

    /// Starts a collection, superseding any request still in flight.
    pub fn start(&mut self, request: CollectRequest, trace_id: &str) -> String {
        if let Some(previous) = self.current.take() {
            info!(
                trace_id = %previous.trace_id,
                request_id = %previous.request_id,
                "superseding in-flight collection"
            );
            previous.abort();
        }

        let request_id = Uuid::new_v4().to_string();
        let handle = CollectionHandle::new(request_id.clone(), trace_id.to_string());
        self.state = ViewState::Loading {
            request_id: request_id.clone(),
            mode: request.mode,
        };
        spawn_collection(
            request,
            self.settings.clone(),
            Arc::clone(&self.collector),
            handle.clone(),
            self.sender.clone(),
        );
        self.current = Some(handle);
        request_id
    }

    /// Marks the current request aborted. The source process still runs to
    /// completion; only its result is dropped.
    pub fn abort(&mut self) -> bool {
        match self.current.take() {
            Some(handle) => {
                handle.abort();
                if self.state.is_loading() {
                    self.state = ViewState::Idle;
                }
                true
            }
            None => false,
        }
    }

    /// Applies any results that have already arrived.
    pub fn poll(&mut self) -> &ViewState {
        while let Ok(event) = self.receiver.try_recv() {
            self.apply(event);
        }
        &self.state
    }

    /// Blocks until the current request settles or `timeout` elapses.
    pub fn wait(&mut self, timeout: Duration) -> &ViewState {
        let deadline = Instant::now() + timeout;
        self.poll();
        while self.state.is_loading() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            match self.receiver.recv_timeout(remaining) {
                Ok(event) => self.apply(event),
                Err(RecvTimeoutError::Timeout) => break,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        &self.state
    }

    fn apply(&mut self, event: CollectionEvent) {
        let is_current = self
            .current
            .as_ref()
            .is_some_and(|handle| handle.request_id == event.request_id && !handle.is_aborted());
        if !is_current {
            debug!(
                trace_id = %event.trace_id,
                request_id = %event.request_id,
                "ignoring stale collection result"
            );
            return;
        }
        self.current = None;

        self.state = match event.result {
            Ok(records) if records.is_empty() => ViewState::Empty { mode: event.mode },
            Ok(records) => ViewState::Ready {
                snapshot: LogSnapshot::new(event.mode, records),
            },
            Err(error) => {
                warn!(trace_id = %event.trace_id, error = %error, "log collection failed");
                ViewState::Failed { error }
            }
        };
    }
}
