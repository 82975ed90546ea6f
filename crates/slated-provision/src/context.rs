//! Process-wide provisioning context and readiness latch
//!
//! Provisioning publishes its result exactly once; any number of waiters
//! observe it without starvation. Waiters that arrive after the latch has
//! fired return immediately.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;

/// What boot-time provisioning produced, read-only after publication
#[derive(Debug, Default)]
pub struct ProvisionContext {
    /// Absent when no seed data exists and no prior id was stored
    pub vector_store_id: Option<String>,
    /// Reconciled agent ids, keyed by canonical name
    pub agent_ids: HashMap<String, String>,
}

/// Write half of the provisioning latch, held by the supervisor
pub struct ProvisionPublisher {
    tx: watch::Sender<Option<Arc<ProvisionContext>>>,
}

impl ProvisionPublisher {
    /// Publish the context and fire the latch. Later calls are ignored.
    pub fn publish(&self, ctx: ProvisionContext) {
        self.tx.send_if_modified(|slot| {
            if slot.is_some() {
                return false;
            }
            *slot = Some(Arc::new(ctx));
            true
        });
    }
}

/// Read half of the provisioning latch, cloneable into every task
#[derive(Clone)]
pub struct ProvisionHandle {
    rx: watch::Receiver<Option<Arc<ProvisionContext>>>,
}

impl ProvisionHandle {
    /// Wait until provisioning has published, then return the context.
    ///
    /// If the publisher is dropped without publishing, an empty context is
    /// returned so the pipeline can proceed in degraded mode.
    pub async fn ready(&self) -> Arc<ProvisionContext> {
        let mut rx = self.rx.clone();
        let result = match rx.wait_for(|slot| slot.is_some()).await {
            Ok(slot) => slot.as_ref().cloned().expect("latch fired"),
            Err(_) => Arc::new(ProvisionContext::default()),
        };
        result
    }
}

/// Create the provisioning latch pair
pub fn provision_channel() -> (ProvisionPublisher, ProvisionHandle) {
    let (tx, rx) = watch::channel(None);
    (ProvisionPublisher { tx }, ProvisionHandle { rx })
}
