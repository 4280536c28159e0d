use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Host lifecycle signals the camera reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EnvironmentSignal {
    Hidden,
    Visible,
    /// Host is going away; the device must be released.
    Teardown,
}

/// Fan-out point for host lifecycle signals. Each capture session subscribes
/// for its own lifetime.
#[derive(Clone)]
pub struct Environment {
    tx: broadcast::Sender<EnvironmentSignal>,
}

impl Environment {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(16);
        Self { tx }
    }

    pub fn signal(&self, signal: EnvironmentSignal) {
        log::debug!("environment signal {signal:?}");
        let _ = self.tx.send(signal);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EnvironmentSignal> {
        self.tx.subscribe()
    }

    pub fn listeners(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}
