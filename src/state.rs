use std::sync::Arc;

use crate::auth::{AuthClient, PasswordAuth};
use crate::config::AppConfig;
use crate::events::EventBus;
use crate::store::memory::{MemoryBlobs, MemoryStore};
use crate::store::postgres::PgDocumentStore;
use crate::store::s3::S3BlobStore;
use crate::store::{BlobStore, DocumentStore};

/// Shared handles every screen and workflow receives: the gateway
/// seams, the change-signal bus and the config. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub docs: Arc<dyn DocumentStore>,
    pub blobs: Arc<dyn BlobStore>,
    pub auth: Arc<dyn AuthClient>,
    pub events: EventBus,
    pub config: Arc<AppConfig>,
}

impl AppState {
    /// Wire up the production adapters from the environment.
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let docs: Arc<dyn DocumentStore> =
            Arc::new(PgDocumentStore::connect(&config.database_url).await?);
        let blobs: Arc<dyn BlobStore> = Arc::new(
            S3BlobStore::new(
                &config.minio_endpoint,
                &config.minio_bucket,
                &config.minio_access_key,
                &config.minio_secret_key,
                "us-east-1",
            )
            .await?,
        );
        let auth: Arc<dyn AuthClient> = Arc::new(PasswordAuth::new(docs.clone()));

        Ok(Self {
            docs,
            blobs,
            auth,
            events: EventBus::new(),
            config,
        })
    }

    pub fn from_parts(
        docs: Arc<dyn DocumentStore>,
        blobs: Arc<dyn BlobStore>,
        auth: Arc<dyn AuthClient>,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            docs,
            blobs,
            auth,
            events: EventBus::new(),
            config,
        }
    }

    /// Fully in-memory state for tests.
    pub fn fake() -> Self {
        let docs: Arc<dyn DocumentStore> = Arc::new(MemoryStore::default());
        let blobs: Arc<dyn BlobStore> = Arc::new(MemoryBlobs::default());
        let auth: Arc<dyn AuthClient> = Arc::new(PasswordAuth::new(docs.clone()));
        Self {
            docs,
            blobs,
            auth,
            events: EventBus::new(),
            config: Arc::new(AppConfig::for_tests()),
        }
    }
}
