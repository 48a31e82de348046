use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
    Mutex,
};

use crate::traits::{Notification, Notifier, NotifierError};

/// A [`Notifier`] that keeps every message it is asked to send. Clones share the same record.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<(String, Notification)>>>,
    failing: Arc<AtomicBool>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// While failing, every delivery is rejected and nothing is recorded.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<(String, Notification)> {
        self.sent.lock().map(|v| v.clone()).unwrap_or_default()
    }

    pub fn sent_to(&self, recipient: &str) -> Vec<Notification> {
        self.sent().into_iter().filter(|(r, _)| r == recipient).map(|(_, n)| n).collect()
    }

    pub fn clear(&self) {
        if let Ok(mut sent) = self.sent.lock() {
            sent.clear();
        }
    }
}

impl Notifier for RecordingNotifier {
    async fn notify(&self, recipient: &str, notification: &Notification) -> Result<(), NotifierError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotifierError::DeliveryFailed {
                recipient: recipient.to_string(),
                reason: "notifier is switched off".into(),
            });
        }
        if let Ok(mut sent) = self.sent.lock() {
            sent.push((recipient.to_string(), notification.clone()));
        }
        Ok(())
    }
}
