use std::sync::Arc;

use tracing::{instrument, warn};

use crate::error::Error;
use crate::events::PostEvent;
use crate::posts::Post;
use crate::store::{DocumentStore, POSTS, USERS};
use crate::users::User;

/// The ordered list of posts behind one screen: the main feed or a
/// user's favourites.
///
/// A `Feed` is owned by the screen that created it and mutated only
/// through the operations below; other parts of the app reach it
/// exclusively via change signals fed into [`Feed::apply`]. Mutations
/// between reloads are applied optimistically in place.
pub struct Feed {
    docs: Arc<dyn DocumentStore>,
    items: Vec<Post>,
}

impl Feed {
    pub fn new(docs: Arc<dyn DocumentStore>) -> Self {
        Self {
            docs,
            items: Vec::new(),
        }
    }

    pub fn items(&self) -> &[Post] {
        &self.items
    }

    /// Replace the list with the full collection, newest first.
    /// Malformed documents are skipped, not surfaced. On a failed fetch
    /// the previous list is left in place.
    #[instrument(skip(self))]
    pub async fn load_all(&mut self) -> Result<(), Error> {
        let rows = self.docs.query_ordered(POSTS, "timestamp", true).await?;
        self.items = rows
            .into_iter()
            .filter_map(|(id, fields)| match Post::from_fields(&fields) {
                Ok(mut post) => {
                    post.id = Some(id);
                    Some(post)
                }
                Err(err) => {
                    warn!(%id, error = %err, "skipping malformed post document");
                    None
                }
            })
            .collect();
        Ok(())
    }

    /// Replace the list with the user's saved recipes, in the order
    /// they were saved. A missing or malformed user document clears the
    /// list; saved IDs that no longer resolve to a post are skipped.
    #[instrument(skip(self))]
    pub async fn load_favourites(&mut self, user_uid: &str) -> Result<(), Error> {
        let Some(fields) = self.docs.get(USERS, user_uid).await? else {
            warn!(user_uid, "user document missing, no favourites to show");
            self.items.clear();
            return Ok(());
        };
        let user = match User::from_fields(&fields) {
            Ok(user) => user,
            Err(err) => {
                warn!(user_uid, error = %err, "malformed user document, no favourites to show");
                self.items.clear();
                return Ok(());
            }
        };

        let mut posts = Vec::new();
        for post_id in user.saved_recipes() {
            match self.docs.get(POSTS, post_id).await {
                Ok(Some(fields)) => match Post::from_fields(&fields) {
                    Ok(mut post) => {
                        post.id = Some(post_id.clone());
                        posts.push(post);
                    }
                    Err(err) => {
                        warn!(%post_id, error = %err, "skipping malformed post document")
                    }
                },
                Ok(None) => warn!(%post_id, "saved post no longer exists"),
                Err(err) => warn!(%post_id, error = %err, "failed to fetch saved post"),
            }
        }
        self.items = posts;
        Ok(())
    }

    /// A post was just created elsewhere in the app; show it on top
    /// without a refetch.
    pub fn on_created(&mut self, post: Post) {
        self.items.insert(0, post);
    }

    /// Drop the matching entry, if it is currently displayed.
    pub fn on_deleted(&mut self, id: &str) {
        if let Some(index) = self
            .items
            .iter()
            .position(|post| post.id.as_deref() == Some(id))
        {
            self.items.remove(index);
        }
    }

    /// Refetch one document and replace the matching entry in place,
    /// preserving its position. A no-op when the entry is not
    /// displayed or the document is gone.
    pub async fn on_updated(&mut self, id: &str) -> Result<(), Error> {
        let Some(fields) = self.docs.get(POSTS, id).await? else {
            warn!(%id, "updated post document not found");
            return Ok(());
        };
        let mut post = match Post::from_fields(&fields) {
            Ok(post) => post,
            Err(err) => {
                warn!(%id, error = %err, "updated post document is malformed");
                return Ok(());
            }
        };
        post.id = Some(id.to_string());
        if let Some(index) = self
            .items
            .iter()
            .position(|item| item.id.as_deref() == Some(id))
        {
            self.items[index] = post;
        }
        Ok(())
    }

    /// Dispatch a change signal received from the bus.
    pub async fn apply(&mut self, event: &PostEvent) -> Result<(), Error> {
        match event {
            PostEvent::Created(post) => {
                self.on_created(post.clone());
                Ok(())
            }
            PostEvent::Updated { id } => self.on_updated(id).await,
            PostEvent::Deleted { id } => {
                self.on_deleted(id);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use time::macros::datetime;
    use time::OffsetDateTime;

    use super::*;
    use crate::store::memory::MemoryStore;
    use crate::store::Document;
    use crate::users::User;

    fn post_at(title: &str, uid: &str, at: OffsetDateTime) -> Post {
        let mut post = Post::new(title, "recipe text", "alice", uid);
        post.published_date = at;
        post
    }

    async fn seed_post(store: &MemoryStore, id: &str, title: &str, at: OffsetDateTime) {
        store
            .set(POSTS, id, post_at(title, "u1", at).to_fields())
            .await
            .unwrap();
    }

    fn titles(feed: &Feed) -> Vec<&str> {
        feed.items().iter().map(|p| p.title.as_str()).collect()
    }

    #[tokio::test]
    async fn load_all_orders_newest_first() {
        let store = Arc::new(MemoryStore::default());
        seed_post(&store, "a", "A", datetime!(2024-07-03 10:00 UTC)).await;
        seed_post(&store, "b", "B", datetime!(2024-07-02 10:00 UTC)).await;
        seed_post(&store, "c", "C", datetime!(2024-07-01 10:00 UTC)).await;

        let mut feed = Feed::new(store);
        feed.load_all().await.unwrap();
        assert_eq!(titles(&feed), vec!["A", "B", "C"]);
        assert_eq!(feed.items()[0].id.as_deref(), Some("a"));
    }

    #[tokio::test]
    async fn empty_collection_loads_an_empty_feed() {
        let store = Arc::new(MemoryStore::default());
        let mut feed = Feed::new(store);
        feed.load_all().await.unwrap();
        assert!(feed.items().is_empty());
    }

    #[tokio::test]
    async fn malformed_documents_are_skipped() {
        let store = Arc::new(MemoryStore::default());
        seed_post(&store, "a", "A", datetime!(2024-07-02 10:00 UTC)).await;
        let mut broken = Document::new();
        broken.insert("title".into(), json!("no text field"));
        broken.insert("timestamp".into(), json!(1_000));
        store.set(POSTS, "bad", broken).await.unwrap();

        let mut feed = Feed::new(store);
        feed.load_all().await.unwrap();
        assert_eq!(titles(&feed), vec!["A"]);
    }

    #[tokio::test]
    async fn created_then_deleted_scenario() {
        let store = Arc::new(MemoryStore::default());
        seed_post(&store, "a", "A", datetime!(2024-07-03 10:00 UTC)).await;
        seed_post(&store, "b", "B", datetime!(2024-07-02 10:00 UTC)).await;
        seed_post(&store, "c", "C", datetime!(2024-07-01 10:00 UTC)).await;

        let mut feed = Feed::new(store);
        feed.load_all().await.unwrap();

        let mut d = post_at("D", "u2", datetime!(2024-07-04 10:00 UTC));
        d.id = Some("d".into());
        feed.on_created(d);
        assert_eq!(titles(&feed), vec!["D", "A", "B", "C"]);

        feed.on_deleted("b");
        assert_eq!(titles(&feed), vec!["D", "A", "C"]);
    }

    #[tokio::test]
    async fn on_deleted_is_a_noop_for_unknown_ids() {
        let store = Arc::new(MemoryStore::default());
        seed_post(&store, "a", "A", datetime!(2024-07-01 10:00 UTC)).await;
        let mut feed = Feed::new(store);
        feed.load_all().await.unwrap();

        feed.on_deleted("nope");
        assert_eq!(titles(&feed), vec!["A"]);
    }

    #[tokio::test]
    async fn on_updated_replaces_in_place() {
        let store = Arc::new(MemoryStore::default());
        seed_post(&store, "a", "A", datetime!(2024-07-03 10:00 UTC)).await;
        seed_post(&store, "b", "B", datetime!(2024-07-02 10:00 UTC)).await;
        let mut feed = Feed::new(store.clone());
        feed.load_all().await.unwrap();

        seed_post(&store, "b", "B2", datetime!(2024-07-02 11:00 UTC)).await;
        feed.on_updated("b").await.unwrap();
        assert_eq!(titles(&feed), vec!["A", "B2"]);
    }

    #[tokio::test]
    async fn on_updated_ignores_posts_not_displayed() {
        let store = Arc::new(MemoryStore::default());
        seed_post(&store, "a", "A", datetime!(2024-07-01 10:00 UTC)).await;
        let mut feed = Feed::new(store.clone());
        feed.load_all().await.unwrap();
        feed.on_deleted("a");

        feed.on_updated("a").await.unwrap();
        assert!(feed.items().is_empty());
    }

    #[tokio::test]
    async fn favourites_preserve_saved_order_and_skip_missing() {
        let store = Arc::new(MemoryStore::default());
        seed_post(&store, "p1", "First", datetime!(2024-07-01 10:00 UTC)).await;
        seed_post(&store, "p2", "Second", datetime!(2024-07-05 10:00 UTC)).await;

        let user = User {
            id: Some("u1".into()),
            username: "alice".into(),
            full_name: "Alice A".into(),
            about_you: "cook".into(),
            user_uid: "u1".into(),
            user_email: "alice@example.com".into(),
            user_prof_pic_url: None,
            saved_recipe_ids: Some(vec!["p2".into(), "gone".into(), "p1".into()]),
        };
        store.set(USERS, "u1", user.to_fields()).await.unwrap();

        let mut feed = Feed::new(store);
        feed.load_favourites("u1").await.unwrap();
        assert_eq!(titles(&feed), vec!["Second", "First"]);
    }

    #[tokio::test]
    async fn apply_dispatches_bus_events() {
        use crate::events::EventBus;

        let store = Arc::new(MemoryStore::default());
        seed_post(&store, "a", "A", datetime!(2024-07-01 10:00 UTC)).await;
        let mut feed = Feed::new(store.clone());
        feed.load_all().await.unwrap();

        let bus = EventBus::new();
        let mut sub = bus.subscribe();
        let mut d = post_at("D", "u2", datetime!(2024-07-02 10:00 UTC));
        d.id = Some("d".into());
        bus.publish(PostEvent::Created(d));
        bus.publish(PostEvent::Deleted { id: "a".into() });

        while let Some(event) = sub.try_recv() {
            feed.apply(&event).await.unwrap();
        }
        assert_eq!(titles(&feed), vec!["D"]);
    }

    #[tokio::test]
    async fn favourites_with_missing_user_show_nothing() {
        let store = Arc::new(MemoryStore::default());
        seed_post(&store, "p1", "First", datetime!(2024-07-01 10:00 UTC)).await;
        let mut feed = Feed::new(store);
        feed.load_favourites("ghost").await.unwrap();
        assert!(feed.items().is_empty());
    }
}
