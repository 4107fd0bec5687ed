use bytes::Bytes;
use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::auth::AuthClient;
use crate::error::Error;
use crate::events::PostEvent;
use crate::state::AppState;
use crate::store::{Document, POSTS, POST_IMAGES};

use super::model::{now_millis, timestamp_to_wire, Post};

/// Submission status of a [`PostComposer`]. There is no cancellation
/// and no timeout; a remote call that never completes leaves the
/// composer in `Submitting`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitState {
    Idle,
    Submitting,
    Succeeded,
    Failed,
}

/// Author identity stamped onto new posts, immutable afterwards.
#[derive(Debug, Clone)]
pub struct Author {
    pub name: String,
    pub uid: String,
}

impl Author {
    /// Resolve the signed-in user's identity from their profile
    /// document.
    pub async fn current(app: &AppState) -> Result<Author, Error> {
        let Some(uid) = app.auth.current_user_id().await else {
            return Err(Error::validation("not signed in"));
        };
        let user = crate::users::services::fetch_profile(app, &uid).await?;
        Ok(Author {
            name: user.username,
            uid,
        })
    }
}

/// Create/update/delete workflow for a single post screen.
///
/// Within one call the steps are strictly sequential: an image upload
/// completes before the document write begins. Nothing orders two
/// concurrent composers touching the same post; the remote store keeps
/// whichever write lands last. A failed step aborts the call and
/// already completed steps stay as they are.
pub struct PostComposer {
    app: AppState,
    author: Option<Author>,
    state: SubmitState,
}

impl PostComposer {
    pub fn new(app: AppState) -> Self {
        Self {
            app,
            author: None,
            state: SubmitState::Idle,
        }
    }

    pub fn with_author(app: AppState, author: Author) -> Self {
        Self {
            app,
            author: Some(author),
            state: SubmitState::Idle,
        }
    }

    /// Fetch the signed-in author's identity; failures leave the
    /// composer without one and `create` will refuse to run.
    pub async fn load_author(&mut self) {
        self.author = Author::current(&self.app).await.ok();
    }

    pub fn state(&self) -> SubmitState {
        self.state
    }

    /// Publish a new post, uploading the image first when there is one.
    /// On success the created post, including its assigned id, is
    /// returned and broadcast so the feed can show it.
    #[instrument(skip(self, image))]
    pub async fn create(
        &mut self,
        title: &str,
        text: &str,
        image: Option<Bytes>,
    ) -> Result<Post, Error> {
        self.ensure_not_submitting()?;
        if title.is_empty() {
            return Err(Error::validation("title must not be empty"));
        }
        let Some(author) = self.author.clone() else {
            return Err(Error::validation("author identity unavailable"));
        };

        self.state = SubmitState::Submitting;
        match self.create_inner(title, text, author, image).await {
            Ok(post) => {
                self.state = SubmitState::Succeeded;
                info!(id = post.id.as_deref().unwrap_or(""), "post created");
                self.app.events.publish(PostEvent::Created(post.clone()));
                Ok(post)
            }
            Err(err) => {
                self.state = SubmitState::Failed;
                error!(error = %err, "create post failed");
                Err(err)
            }
        }
    }

    async fn create_inner(
        &self,
        title: &str,
        text: &str,
        author: Author,
        image: Option<Bytes>,
    ) -> Result<Post, Error> {
        let mut post = Post::new(title, text, author.name, author.uid);
        if let Some(bytes) = image {
            let path = format!("{POST_IMAGES}/{}.jpg", Uuid::new_v4().simple());
            self.app.blobs.upload(&path, bytes).await?;
            post.image_url = Some(self.app.blobs.url(&path).await?);
        }
        let id = self.app.docs.add(POSTS, post.to_fields()).await?;
        post.id = Some(id);
        Ok(post)
    }

    /// Rewrite an existing post's title and text, optionally replacing
    /// its image. Only the changed fields plus a fresh timestamp are
    /// written, not the whole document.
    #[instrument(skip(self, image))]
    pub async fn update(
        &mut self,
        id: &str,
        title: &str,
        text: &str,
        image: Option<Bytes>,
    ) -> Result<(), Error> {
        self.ensure_not_submitting()?;

        self.state = SubmitState::Submitting;
        match self.update_inner(id, title, text, image).await {
            Ok(()) => {
                self.state = SubmitState::Succeeded;
                info!(%id, "post updated");
                self.app
                    .events
                    .publish(PostEvent::Updated { id: id.to_string() });
                Ok(())
            }
            Err(err) => {
                self.state = SubmitState::Failed;
                error!(%id, error = %err, "update post failed");
                Err(err)
            }
        }
    }

    async fn update_inner(
        &self,
        id: &str,
        title: &str,
        text: &str,
        image: Option<Bytes>,
    ) -> Result<(), Error> {
        let mut fields = Document::new();
        fields.insert("title".into(), serde_json::json!(title));
        fields.insert("text".into(), serde_json::json!(text));
        fields.insert("timestamp".into(), timestamp_to_wire(now_millis()));
        if let Some(bytes) = image {
            let path = format!("{POST_IMAGES}/{id}.jpg");
            self.app.blobs.upload(&path, bytes).await?;
            fields.insert(
                "imageURL".into(),
                serde_json::json!(self.app.blobs.url(&path).await?),
            );
        }
        self.app.docs.update(POSTS, id, fields).await
    }

    /// Remove the post document. The post's image, if any, stays in
    /// blob storage.
    #[instrument(skip(self))]
    pub async fn delete(&mut self, id: &str) -> Result<(), Error> {
        self.ensure_not_submitting()?;

        self.state = SubmitState::Submitting;
        match self.app.docs.delete(POSTS, id).await {
            Ok(()) => {
                self.state = SubmitState::Succeeded;
                info!(%id, "post deleted");
                self.app
                    .events
                    .publish(PostEvent::Deleted { id: id.to_string() });
                Ok(())
            }
            Err(err) => {
                self.state = SubmitState::Failed;
                error!(%id, error = %err, "delete post failed");
                Err(err)
            }
        }
    }

    fn ensure_not_submitting(&self) -> Result<(), Error> {
        if self.state == SubmitState::Submitting {
            return Err(Error::validation("a submission is already in flight"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::auth::PasswordAuth;
    use crate::config::AppConfig;
    use crate::store::memory::{MemoryBlobs, MemoryStore};
    use crate::store::DocumentStore;

    fn test_app() -> (AppState, Arc<MemoryStore>, Arc<MemoryBlobs>) {
        let docs = Arc::new(MemoryStore::default());
        let blobs = Arc::new(MemoryBlobs::default());
        let auth = Arc::new(PasswordAuth::new(docs.clone() as Arc<dyn DocumentStore>));
        let app = AppState::from_parts(
            docs.clone(),
            blobs.clone(),
            auth,
            Arc::new(AppConfig::for_tests()),
        );
        (app, docs, blobs)
    }

    fn composer(app: &AppState) -> PostComposer {
        PostComposer::with_author(
            app.clone(),
            Author {
                name: "alice".into(),
                uid: "u1".into(),
            },
        )
    }

    #[tokio::test]
    async fn author_identity_comes_from_the_profile_document() {
        let (app, docs, _) = test_app();
        let uid = app
            .auth
            .sign_up("alice@example.com", "longenough")
            .await
            .unwrap();
        let user = crate::users::User {
            id: Some(uid.clone()),
            username: "alice".into(),
            full_name: "Alice Appleseed".into(),
            about_you: String::new(),
            user_uid: uid.clone(),
            user_email: "alice@example.com".into(),
            user_prof_pic_url: None,
            saved_recipe_ids: None,
        };
        docs.set(crate::store::USERS, &uid, user.to_fields())
            .await
            .unwrap();

        let author = Author::current(&app).await.unwrap();
        assert_eq!(author.name, "alice");
        assert_eq!(author.uid, uid);
    }

    #[tokio::test]
    async fn author_is_unavailable_without_a_session() {
        let (app, _, _) = test_app();
        assert!(matches!(
            Author::current(&app).await,
            Err(Error::Validation(_))
        ));
    }

    #[tokio::test]
    async fn create_without_image_omits_the_image_url_key() {
        let (app, docs, _) = test_app();
        let mut composer = composer(&app);

        let post = composer.create("Soup", "Recipe", None).await.unwrap();
        assert_eq!(composer.state(), SubmitState::Succeeded);

        let id = post.id.expect("assigned id");
        let fields = docs.get(POSTS, &id).await.unwrap().expect("stored post");
        assert!(!fields.contains_key("imageURL"));
        assert_eq!(fields.get("title"), Some(&serde_json::json!("Soup")));
        assert_eq!(fields.get("userUID"), Some(&serde_json::json!("u1")));
    }

    #[tokio::test]
    async fn create_with_image_uploads_before_the_document_write() {
        let (app, docs, blobs) = test_app();
        let mut composer = composer(&app);

        let post = composer
            .create("Soup", "Recipe", Some(Bytes::from_static(b"jpeg")))
            .await
            .unwrap();
        assert_eq!(blobs.object_count().await, 1);

        let id = post.id.expect("assigned id");
        let fields = docs.get(POSTS, &id).await.unwrap().expect("stored post");
        let url = fields
            .get("imageURL")
            .and_then(serde_json::Value::as_str)
            .expect("image url written");
        assert!(url.contains(POST_IMAGES));
    }

    #[tokio::test]
    async fn create_rejects_an_empty_title_before_any_remote_call() {
        let (app, docs, _) = test_app();
        let mut composer = composer(&app);

        let err = composer.create("", "Recipe", None).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(composer.state(), SubmitState::Idle);
        let rows = docs.query_ordered(POSTS, "timestamp", true).await.unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn create_requires_an_author_identity() {
        let (app, _, _) = test_app();
        let mut composer = PostComposer::new(app);

        let err = composer.create("Soup", "Recipe", None).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn failed_image_upload_aborts_before_the_document_write() {
        let (app, docs, blobs) = test_app();
        let mut composer = composer(&app);
        blobs.fail_next();

        let err = composer
            .create("Soup", "Recipe", Some(Bytes::from_static(b"jpeg")))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Remote(_)));
        assert_eq!(composer.state(), SubmitState::Failed);
        let rows = docs.query_ordered(POSTS, "timestamp", true).await.unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn failed_document_write_does_not_roll_back_the_upload() {
        let (app, docs, blobs) = test_app();
        let mut composer = composer(&app);
        docs.fail_next();

        let err = composer
            .create("Soup", "Recipe", Some(Bytes::from_static(b"jpeg")))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Remote(_)));
        // The uploaded image stays behind; there is no compensation.
        assert_eq!(blobs.object_count().await, 1);
    }

    #[tokio::test]
    async fn create_broadcasts_the_created_post() {
        let (app, _, _) = test_app();
        let mut sub = app.events.subscribe();
        let mut composer = composer(&app);

        let post = composer.create("Soup", "Recipe", None).await.unwrap();
        match sub.recv().await {
            Some(PostEvent::Created(got)) => assert_eq!(got.id, post.id),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn update_writes_only_the_changed_fields() {
        let (app, docs, _) = test_app();
        let mut composer = composer(&app);
        let post = composer.create("Soup", "Recipe", None).await.unwrap();
        let id = post.id.expect("assigned id");

        composer
            .update(&id, "Stew", "Thicker recipe", None)
            .await
            .unwrap();

        let fields = docs.get(POSTS, &id).await.unwrap().expect("stored post");
        assert_eq!(fields.get("title"), Some(&serde_json::json!("Stew")));
        assert_eq!(fields.get("text"), Some(&serde_json::json!("Thicker recipe")));
        // Author fields were not part of the partial write.
        assert_eq!(fields.get("userName"), Some(&serde_json::json!("alice")));
    }

    #[tokio::test]
    async fn update_of_a_missing_post_fails() {
        let (app, _, _) = test_app();
        let mut composer = composer(&app);
        let err = composer
            .update("ghost", "Stew", "text", None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        assert_eq!(composer.state(), SubmitState::Failed);
    }

    #[tokio::test]
    async fn delete_removes_the_document_but_not_the_image() {
        let (app, docs, blobs) = test_app();
        let mut composer = composer(&app);
        let post = composer
            .create("Soup", "Recipe", Some(Bytes::from_static(b"jpeg")))
            .await
            .unwrap();
        let id = post.id.expect("assigned id");

        let mut sub = app.events.subscribe();
        composer.delete(&id).await.unwrap();

        assert!(docs.get(POSTS, &id).await.unwrap().is_none());
        assert_eq!(blobs.object_count().await, 1);
        match sub.recv().await {
            Some(PostEvent::Deleted { id: got }) => assert_eq!(got, id),
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
