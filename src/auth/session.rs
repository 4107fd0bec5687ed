use crate::auth::AuthClient;

/// Authentication status resolved once at startup and handed to the
/// router, instead of a mutable login flag read from arbitrary places.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    SignedIn { user_uid: String },
    SignedOut,
}

impl SessionState {
    pub async fn resolve(auth: &dyn AuthClient) -> Self {
        match auth.current_user_id().await {
            Some(uid) => SessionState::SignedIn { user_uid: uid },
            None => SessionState::SignedOut,
        }
    }

    pub fn is_signed_in(&self) -> bool {
        matches!(self, SessionState::SignedIn { .. })
    }
}

/// First screen shown after launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartScreen {
    Login,
    Home,
}

impl StartScreen {
    pub fn for_session(session: &SessionState) -> Self {
        match session {
            SessionState::SignedIn { .. } => StartScreen::Home,
            SessionState::SignedOut => StartScreen::Login,
        }
    }
}
