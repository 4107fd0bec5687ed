use async_trait::async_trait;

use crate::error::Error;

mod password;
mod provider;
mod session;

pub mod services;

pub use provider::PasswordAuth;
pub use session::{SessionState, StartScreen};

/// The authentication collaborator every workflow talks to.
///
/// `current_user_id` is the authority anchor for all per-user lookups;
/// profile documents are keyed by the UID it returns.
#[async_trait]
pub trait AuthClient: Send + Sync {
    async fn current_user_id(&self) -> Option<String>;

    /// Returns the signed-in user's UID.
    async fn sign_in(&self, email: &str, password: &str) -> Result<String, Error>;

    /// Registers a new account and returns its UID, signed in.
    async fn sign_up(&self, email: &str, password: &str) -> Result<String, Error>;

    async fn sign_out(&self);

    async fn send_password_reset(&self, email: &str) -> Result<(), Error>;

    /// Removes the signed-in user's auth record and ends the session.
    async fn delete_current_account(&self) -> Result<(), Error>;
}
