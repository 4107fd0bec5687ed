use std::sync::Arc;

use async_trait::async_trait;
use rand::Rng;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::auth::password::{hash_password, validate_credentials, verify_password};
use crate::auth::AuthClient;
use crate::error::Error;
use crate::store::{Document, DocumentStore, CREDENTIALS};

const EMAIL: &str = "email";
const PASSWORD_HASH: &str = "passwordHash";
const RESET_CODE: &str = "resetCode";

/// Self-hosted email/password authentication.
///
/// Credential documents live in their own collection, keyed by the UID
/// they mint; the signed-in UID is held in process, there are no
/// session tokens to refresh or expire.
pub struct PasswordAuth {
    docs: Arc<dyn DocumentStore>,
    session: Mutex<Option<String>>,
}

impl PasswordAuth {
    pub fn new(docs: Arc<dyn DocumentStore>) -> Self {
        Self {
            docs,
            session: Mutex::new(None),
        }
    }

    /// Scan for a credential document by email. The collection is
    /// small and unindexed; a linear scan is fine.
    async fn find_credentials(&self, email: &str) -> Result<Option<(String, Document)>, Error> {
        let rows = self.docs.query_ordered(CREDENTIALS, EMAIL, false).await?;
        Ok(rows
            .into_iter()
            .find(|(_, fields)| fields.get(EMAIL).and_then(Value::as_str) == Some(email)))
    }
}

#[async_trait]
impl AuthClient for PasswordAuth {
    async fn current_user_id(&self) -> Option<String> {
        self.session.lock().await.clone()
    }

    #[instrument(skip(self, password))]
    async fn sign_in(&self, email: &str, password: &str) -> Result<String, Error> {
        let email = email.trim().to_lowercase();
        let Some((uid, fields)) = self.find_credentials(&email).await? else {
            warn!(email = %email, "sign in with unknown email");
            return Err(Error::InvalidCredentials);
        };
        let hash = fields
            .get(PASSWORD_HASH)
            .and_then(Value::as_str)
            .ok_or_else(|| Error::not_found("credentials"))?;
        if !verify_password(password, hash).map_err(Error::remote)? {
            warn!(email = %email, %uid, "sign in with wrong password");
            return Err(Error::InvalidCredentials);
        }
        *self.session.lock().await = Some(uid.clone());
        info!(%uid, "user signed in");
        Ok(uid)
    }

    #[instrument(skip(self, password))]
    async fn sign_up(&self, email: &str, password: &str) -> Result<String, Error> {
        let email = email.trim().to_lowercase();
        validate_credentials(&email, password)?;
        if self.find_credentials(&email).await?.is_some() {
            return Err(Error::validation("email already registered"));
        }

        let hash = hash_password(password).map_err(Error::remote)?;
        let uid = Uuid::new_v4().simple().to_string();
        let mut fields = Document::new();
        fields.insert(EMAIL.into(), json!(email));
        fields.insert(PASSWORD_HASH.into(), json!(hash));
        self.docs.set(CREDENTIALS, &uid, fields).await?;

        *self.session.lock().await = Some(uid.clone());
        info!(%uid, "user registered");
        Ok(uid)
    }

    async fn sign_out(&self) {
        *self.session.lock().await = None;
    }

    #[instrument(skip(self))]
    async fn send_password_reset(&self, email: &str) -> Result<(), Error> {
        let email = email.trim().to_lowercase();
        let Some((uid, _)) = self.find_credentials(&email).await? else {
            return Err(Error::not_found(format!("account for {email}")));
        };
        let code: u32 = rand::thread_rng().gen_range(0..1_000_000);
        let mut fields = Document::new();
        fields.insert(RESET_CODE.into(), json!(format!("{code:06}")));
        self.docs.update(CREDENTIALS, &uid, fields).await?;
        info!(%uid, "password reset code issued");
        // TODO: deliver the code by email once a mailer is wired up.
        Ok(())
    }

    async fn delete_current_account(&self) -> Result<(), Error> {
        let uid = {
            let session = self.session.lock().await;
            session
                .clone()
                .ok_or_else(|| Error::validation("not signed in"))?
        };
        self.docs.delete(CREDENTIALS, &uid).await?;
        *self.session.lock().await = None;
        info!(%uid, "account deleted");
        Ok(())
    }
}
