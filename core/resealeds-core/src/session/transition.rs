//! Maps session lifecycle events to the view's auth state.
//! The machine has no terminal state; it runs for the lifetime of the view.

use resealeds_protocol::SessionEventKind;
use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthState {
    #[default]
    Unauthenticated,
    Authenticated,
}

impl AuthState {
    pub fn can_mutate(&self) -> bool {
        matches!(self, AuthState::Authenticated)
    }
}

pub fn next_state(current: AuthState, event: SessionEventKind) -> AuthState {
    match event {
        SessionEventKind::SignedIn => AuthState::Authenticated,
        SessionEventKind::SignedOut => AuthState::Unauthenticated,
        SessionEventKind::TokenRefreshed => current,
    }
}
