//! Notification popup seam

use std::sync::atomic::{AtomicU32, Ordering};
use tracing::info;

pub trait Notifier: Send + Sync {
    /// Shows a notification, replacing `replace_id` when non-zero, and
    /// returns the id of the shown notification
    fn notify(&self, summary: &str, body: &str, replace_id: u32) -> u32;
}

/// Renders notifications as log records
#[derive(Debug, Default)]
pub struct LogNotifier {
    next_id: AtomicU32,
}

impl LogNotifier {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Notifier for LogNotifier {
    fn notify(&self, summary: &str, body: &str, replace_id: u32) -> u32 {
        let id = if replace_id != 0 {
            replace_id
        } else {
            self.next_id.fetch_add(1, Ordering::Relaxed) + 1
        };
        info!(id, summary, body, "Notification");
        id
    }
}
