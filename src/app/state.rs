use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;

use crate::app::error::AppError;
use crate::app::models::{LogMode, LogSnapshot};

/// Consumer-side handle for one in-flight collection.
#[derive(Debug, Clone)]
pub struct CollectionHandle {
    pub request_id: String,
    pub trace_id: String,
    pub abort_flag: Arc<AtomicBool>,
}

impl CollectionHandle {
    pub fn new(request_id: String, trace_id: String) -> Self {
        Self {
            request_id,
            trace_id,
            abort_flag: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn abort(&self) {
        self.abort_flag.store(true, Ordering::Relaxed);
    }

    pub fn is_aborted(&self) -> bool {
        self.abort_flag.load(Ordering::Relaxed)
    }
}

/// What the display shows. `Empty` and `Failed` are distinct, user-visible
/// outcomes; neither is rendered as a blank list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum ViewState {
    Idle,
    Loading { request_id: String, mode: LogMode },
    Ready { snapshot: LogSnapshot },
    Empty { mode: LogMode },
    Failed { error: AppError },
}

impl ViewState {
    pub fn is_loading(&self) -> bool {
        matches!(self, ViewState::Loading { .. })
    }

    pub fn status_message(&self) -> String {
        match self {
            ViewState::Idle => "Idle".to_string(),
            ViewState::Loading { mode, .. } => format!("Collecting {mode} log..."),
            ViewState::Ready { snapshot } => format!(
                "{} entries ({} lines)",
                snapshot.summary.total_records, snapshot.summary.payload_lines
            ),
            ViewState::Empty { .. } => "No log information available".to_string(),
            ViewState::Failed { error } => format!("Failed to collect log: {}", error.error),
        }
    }
}
