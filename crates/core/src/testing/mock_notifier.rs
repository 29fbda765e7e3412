//! Mock escalation notifier.

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::notify::{EscalationNotice, Notifier, NotifyError};

/// Notifier that records every notice instead of delivering it.
pub struct MockNotifier {
    notices: RwLock<Vec<EscalationNotice>>,
    fail: RwLock<bool>,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self {
            notices: RwLock::new(Vec::new()),
            fail: RwLock::new(false),
        }
    }

    pub async fn set_fail(&self, fail: bool) {
        *self.fail.write().await = fail;
    }

    /// All recorded notices.
    pub async fn notices(&self) -> Vec<EscalationNotice> {
        self.notices.read().await.clone()
    }
}

impl Default for MockNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn notify_admins(&self, notice: &EscalationNotice) -> Result<usize, NotifyError> {
        if *self.fail.read().await {
            return Err(NotifyError::AllDeliveriesFailed);
        }
        self.notices.write().await.push(notice.clone());
        Ok(1)
    }
}
