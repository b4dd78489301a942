//! Delivery of manager events to async consumers.

use std::time::Duration;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::observer::{ManagerEvent, ManagerObserver};

/// Observer forwarding every [`ManagerEvent`] into a tokio channel.
///
/// Sending never blocks, so it is safe to use from the manager's lock.
/// Events are dropped once the receiver is gone.
///
/// # Examples
///
/// ```rust
/// use ferrous_lifecycle::{ChannelObserver, ManagerEvent, ManagerObserver};
///
/// let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
/// rt.block_on(async {
///     let (observer, mut events) = ChannelObserver::new();
///     observer.on_event("svc", &ManagerEvent::DependencyUnavailable { name: "db".into() });
///
///     let (manager, event) = events.recv().await.unwrap();
///     assert_eq!(manager, "svc");
///     assert_eq!(event.kind(), "dependency_unavailable");
/// });
/// ```
pub struct ChannelObserver {
    sender: UnboundedSender<(String, ManagerEvent)>,
}

impl ChannelObserver {
    pub fn new() -> (Self, UnboundedReceiver<(String, ManagerEvent)>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl ManagerObserver for ChannelObserver {
    fn on_event(&self, manager: &str, event: &ManagerEvent) {
        let _ = self.sender.send((manager.to_string(), event.clone()));
    }
}

/// Waits for the next event of `kind`, skipping others.
///
/// Returns `None` on timeout or when every sender is gone.
pub async fn wait_for(
    events: &mut UnboundedReceiver<(String, ManagerEvent)>,
    kind: &str,
    timeout: Duration,
) -> Option<(String, ManagerEvent)> {
    tokio::time::timeout(timeout, async {
        while let Some((manager, event)) = events.recv().await {
            if event.kind() == kind {
                return Some((manager, event));
            }
        }
        None
    })
    .await
    .ok()
    .flatten()
}
