//! Session tracking.
//!
//! The auth provider is opaque: it pushes [`ProviderSignal`]s into a
//! [`SessionFeed`], and a [`SessionObserver`] turns those into
//! [`SessionTransition`]s for exactly one subscriber. The view layer only
//! reads session state; it never originates transitions.

mod feed;
mod observer;
mod transition;

pub use feed::{ProviderSignal, SessionFeed};
pub use observer::{SessionObserver, Subscription};
pub use transition::{next_state, AuthState};

use resealeds_protocol::{Identity, SessionEventKind};
use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "identity", rename_all = "snake_case")]
pub enum Session {
    #[default]
    Absent,
    Present(Identity),
}

impl Session {
    pub fn is_present(&self) -> bool {
        matches!(self, Session::Present(_))
    }

    pub fn identity(&self) -> Option<&Identity> {
        match self {
            Session::Present(identity) => Some(identity),
            Session::Absent => None,
        }
    }

    /// Session value after `kind` is applied, given the identity the event
    /// carried (if any).
    pub fn after(&self, kind: SessionEventKind, identity: Option<Identity>) -> Session {
        match kind {
            SessionEventKind::SignedOut => Session::Absent,
            SessionEventKind::SignedIn => match identity {
                Some(identity) => Session::Present(identity),
                None => self.clone(),
            },
            SessionEventKind::TokenRefreshed => match (self, identity) {
                (Session::Present(_), Some(identity)) => Session::Present(identity),
                (current, _) => current.clone(),
            },
        }
    }
}

/// One delivered lifecycle event and the session it resulted in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionTransition {
    pub kind: SessionEventKind,
    pub session: Session,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> Identity {
        Identity::new("alice").unwrap()
    }

    #[test]
    fn signed_in_sets_identity() {
        let session = Session::Absent.after(SessionEventKind::SignedIn, Some(alice()));
        assert_eq!(session, Session::Present(alice()));
    }

    #[test]
    fn signed_out_clears_identity() {
        let session = Session::Present(alice()).after(SessionEventKind::SignedOut, None);
        assert_eq!(session, Session::Absent);
    }

    #[test]
    fn token_refresh_keeps_identity_without_payload() {
        let session = Session::Present(alice()).after(SessionEventKind::TokenRefreshed, None);
        assert_eq!(session, Session::Present(alice()));
    }

    #[test]
    fn token_refresh_does_not_sign_in() {
        let session = Session::Absent.after(SessionEventKind::TokenRefreshed, Some(alice()));
        assert_eq!(session, Session::Absent);
    }
}
