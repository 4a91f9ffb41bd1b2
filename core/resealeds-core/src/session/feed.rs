use resealeds_protocol::{AuthEvent, Identity};
use tokio::sync::broadcast;
use tracing::debug;

const FEED_CAPACITY: usize = 64;

/// What an auth provider can push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderSignal {
    Event(AuthEvent),
    /// The provider could not establish or keep a session (network failure,
    /// expired token). Observers surface this as a sign-out.
    Failure(String),
}

/// In-process stand-in for the external auth provider's push channel.
///
/// Cloning the feed yields another publisher onto the same channel.
#[derive(Debug, Clone)]
pub struct SessionFeed {
    tx: broadcast::Sender<ProviderSignal>,
}

impl Default for SessionFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionFeed {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(FEED_CAPACITY);
        Self { tx }
    }

    /// Pushes a signal to every listening observer and returns how many
    /// received it.
    pub fn push(&self, signal: ProviderSignal) -> usize {
        match self.tx.send(signal) {
            Ok(receivers) => receivers,
            Err(broadcast::error::SendError(signal)) => {
                debug!(signal = ?signal, "Session signal dropped; no observers");
                0
            }
        }
    }

    pub fn publish(&self, event: AuthEvent) -> usize {
        self.push(ProviderSignal::Event(event))
    }

    pub fn fail(&self, reason: impl Into<String>) -> usize {
        self.push(ProviderSignal::Failure(reason.into()))
    }

    pub fn signed_in(&self, identity: Identity) -> usize {
        self.publish(AuthEvent::signed_in(identity))
    }

    pub fn signed_out(&self) -> usize {
        self.publish(AuthEvent::signed_out())
    }

    pub fn token_refreshed(&self) -> usize {
        self.publish(AuthEvent::token_refreshed(None))
    }

    pub(crate) fn listen(&self) -> broadcast::Receiver<ProviderSignal> {
        self.tx.subscribe()
    }
}
