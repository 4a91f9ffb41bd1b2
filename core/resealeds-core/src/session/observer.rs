use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use resealeds_protocol::{Identity, SessionEventKind};
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::{ProviderSignal, Session, SessionFeed, SessionTransition};
use crate::error::SessionError;

const TRANSITION_CAPACITY: usize = 64;

/// Tracks the current session and delivers lifecycle transitions to a
/// single subscriber.
///
/// Starts with [`Session::Absent`] until the provider pushes its first event.
/// Provider signals are applied whether or not anyone is subscribed: reads
/// drain whatever is pending first, so `current()` never reports a session
/// the provider has already ended.
pub struct SessionObserver {
    tracker: Arc<Tracker>,
    active: Arc<AtomicBool>,
}

/// Sole consumer of the provider channel. Every signal is applied to
/// `current` exactly once and then fanned out as a transition.
struct Tracker {
    source: Mutex<broadcast::Receiver<ProviderSignal>>,
    current: watch::Sender<Session>,
    transitions: broadcast::Sender<SessionTransition>,
}

impl Tracker {
    fn lock_source(&self) -> MutexGuard<'_, broadcast::Receiver<ProviderSignal>> {
        self.source
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Applies every pending provider signal.
    fn pump(&self) {
        let mut source = self.lock_source();
        self.drain(&mut source)
    }

    fn drain(&self, source: &mut broadcast::Receiver<ProviderSignal>) {
        loop {
            match source.try_recv() {
                Ok(ProviderSignal::Event(event))
                    if event.kind == SessionEventKind::SignedIn && event.identity.is_none() =>
                {
                    warn!("Sign-in without an identity ignored");
                }
                Ok(ProviderSignal::Event(event)) => {
                    self.apply(event.kind, event.identity);
                }
                Ok(ProviderSignal::Failure(reason)) => {
                    warn!(reason = %reason, "Session provider failed; treating as signed out");
                    self.apply(SessionEventKind::SignedOut, None);
                }
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "Session observer fell behind the provider");
                }
                Err(TryRecvError::Empty) => return,
                Err(TryRecvError::Closed) => {
                    if self.current.borrow().is_present() {
                        warn!("Session provider went away; treating as signed out");
                        self.apply(SessionEventKind::SignedOut, None);
                    }
                    return;
                }
            }
        }
    }

    fn apply(&self, kind: SessionEventKind, identity: Option<Identity>) {
        let session = self.current.borrow().after(kind, identity);
        self.current.send_replace(session.clone());
        debug!(
            kind = kind.as_str(),
            present = session.is_present(),
            "Session transition"
        );
        // No receivers just means no view is mounted right now.
        let _ = self.transitions.send(SessionTransition { kind, session });
    }
}

impl SessionObserver {
    pub fn new(feed: &SessionFeed) -> Self {
        let (current, _rx) = watch::channel(Session::Absent);
        let (transitions, _rx) = broadcast::channel(TRANSITION_CAPACITY);
        Self {
            tracker: Arc::new(Tracker {
                source: Mutex::new(feed.listen()),
                current,
                transitions,
            }),
            active: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn current(&self) -> Session {
        self.tracker.pump();
        self.tracker.current.borrow().clone()
    }

    pub fn is_signed_in(&self) -> bool {
        self.current().is_present()
    }

    /// Receiver of session values. Between reads it advances while a
    /// subscription is active.
    pub fn watch(&self) -> watch::Receiver<Session> {
        self.tracker.pump();
        self.tracker.current.subscribe()
    }

    pub fn is_subscribed(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Registers `on_transition`, invoked once per lifecycle event from a
    /// spawned task. Must be called inside a tokio runtime.
    ///
    /// Signals that arrived before this call are applied to the current
    /// session but not replayed to the new subscriber.
    ///
    /// Only one subscription may be active at a time. A second call while the
    /// first is alive is refused and registers nothing, so no event is ever
    /// delivered twice. Dropping the returned [`Subscription`] releases the
    /// slot.
    pub fn subscribe<F>(&self, on_transition: F) -> Result<Subscription, SessionError>
    where
        F: Fn(SessionTransition) + Send + 'static,
    {
        if self.active.swap(true, Ordering::AcqRel) {
            debug!("Session subscription already active; ignoring re-registration");
            return Err(SessionError::AlreadySubscribed);
        }

        let (wake, transitions) = {
            let mut source = self.tracker.lock_source();
            // Created under the lock so no signal falls between the drain
            // and the first wakeup.
            let wake = source.resubscribe();
            self.tracker.drain(&mut source);
            (wake, self.tracker.transitions.subscribe())
        };

        let task = tokio::spawn(forward(
            wake,
            transitions,
            Arc::clone(&self.tracker),
            on_transition,
        ));

        Ok(Subscription {
            task,
            active: Arc::clone(&self.active),
        })
    }
}

/// Guard for an active session subscription. Delivery stops on drop.
#[must_use = "dropping the subscription stops session delivery"]
pub struct Subscription {
    task: JoinHandle<()>,
    active: Arc<AtomicBool>,
}

impl Subscription {
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
        self.active.store(false, Ordering::Release);
    }
}

async fn forward<F>(
    mut wake: broadcast::Receiver<ProviderSignal>,
    mut transitions: broadcast::Receiver<SessionTransition>,
    tracker: Arc<Tracker>,
    on_transition: F,
) where
    F: Fn(SessionTransition) + Send + 'static,
{
    loop {
        tokio::select! {
            biased;
            transition = transitions.recv() => match transition {
                Ok(transition) => on_transition(transition),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Session subscriber fell behind");
                }
                Err(RecvError::Closed) => break,
            },
            signal = wake.recv() => match signal {
                Ok(_) | Err(RecvError::Lagged(_)) => {
                    tracker.pump();
                }
                Err(RecvError::Closed) => {
                    tracker.pump();
                    while let Ok(transition) = transitions.try_recv() {
                        on_transition(transition);
                    }
                    debug!("Session feed closed; subscription finished");
                    break;
                }
            },
        }
    }
}
