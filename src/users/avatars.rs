use std::collections::HashMap;
use std::sync::Arc;

use tracing::warn;

use crate::store::{optional_str, DocumentStore, USERS};

/// Memoized profile-picture lookups for a list of posts.
///
/// Every feed row shows its author's picture; resolving that through
/// the user document on every row would refetch the same authors over
/// and over. A cache instance lives as long as the list it backs and
/// hits the store at most once per author, including authors without a
/// picture or without a document. Transient fetch failures are not
/// cached, so the next row for that author retries.
pub struct AvatarCache {
    docs: Arc<dyn DocumentStore>,
    urls: HashMap<String, Option<String>>,
}

impl AvatarCache {
    pub fn new(docs: Arc<dyn DocumentStore>) -> Self {
        Self {
            docs,
            urls: HashMap::new(),
        }
    }

    pub async fn profile_pic_url(&mut self, user_uid: &str) -> Option<String> {
        if let Some(cached) = self.urls.get(user_uid) {
            return cached.clone();
        }
        let resolved = match self.docs.get(USERS, user_uid).await {
            Ok(Some(fields)) => optional_str(&fields, "userProfPicURL"),
            Ok(None) => {
                warn!(user_uid, "user document does not exist");
                None
            }
            Err(err) => {
                warn!(user_uid, error = %err, "failed to fetch user document");
                return None;
            }
        };
        self.urls.insert(user_uid.to_string(), resolved.clone());
        resolved
    }
}
