use tokio::sync::broadcast;

/// Where a tracked state came from, attached to `new_state_tracked`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateSource {
    Transactions,
    Disk,
}

/// The four lifecycle notifications the manager publishes. One
/// `broadcast` channel per kind (mirroring one event bus per notification
/// kind) so a slow or absent subscriber never blocks the publisher.
pub struct NotificationChannels {
    new_state_tracked: broadcast::Sender<(i64, StateSource)>,
    self_signed: broadcast::Sender<i64>,
    state_has_enough_signatures: broadcast::Sender<i64>,
    state_lacks_signatures: broadcast::Sender<i64>,
}

const CHANNEL_CAPACITY: usize = 256;

impl NotificationChannels {
    pub fn new() -> Self {
        Self {
            new_state_tracked: broadcast::channel(CHANNEL_CAPACITY).0,
            self_signed: broadcast::channel(CHANNEL_CAPACITY).0,
            state_has_enough_signatures: broadcast::channel(CHANNEL_CAPACITY).0,
            state_lacks_signatures: broadcast::channel(CHANNEL_CAPACITY).0,
        }
    }

    pub fn subscribe_new_state_tracked(&self) -> broadcast::Receiver<(i64, StateSource)> {
        self.new_state_tracked.subscribe()
    }

    pub fn subscribe_self_signed(&self) -> broadcast::Receiver<i64> {
        self.self_signed.subscribe()
    }

    pub fn subscribe_state_has_enough_signatures(&self) -> broadcast::Receiver<i64> {
        self.state_has_enough_signatures.subscribe()
    }

    pub fn subscribe_state_lacks_signatures(&self) -> broadcast::Receiver<i64> {
        self.state_lacks_signatures.subscribe()
    }

    pub(crate) fn emit_new_state_tracked(&self, round: i64, source: StateSource) {
        let _ = self.new_state_tracked.send((round, source));
    }

    pub(crate) fn emit_self_signed(&self, round: i64) {
        let _ = self.self_signed.send(round);
    }

    pub(crate) fn emit_state_has_enough_signatures(&self, round: i64) {
        let _ = self.state_has_enough_signatures.send(round);
    }

    pub(crate) fn emit_state_lacks_signatures(&self, round: i64) {
        let _ = self.state_lacks_signatures.send(round);
    }
}

impl Default for NotificationChannels {
    fn default() -> Self {
        Self::new()
    }
}
