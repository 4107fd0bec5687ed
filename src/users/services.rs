use bytes::Bytes;
use time::OffsetDateTime;
use tracing::{info, instrument, warn};

use crate::error::Error;
use crate::state::AppState;
use crate::store::{PROFILE_IMAGES, USERS};
use crate::users::User;

/// Fetch a profile document by auth UID. A malformed document is
/// reported as not found rather than surfacing the decode failure.
#[instrument(skip(app))]
pub async fn fetch_profile(app: &AppState, user_uid: &str) -> Result<User, Error> {
    let fields = app
        .docs
        .get(USERS, user_uid)
        .await?
        .ok_or_else(|| Error::not_found(format!("user {user_uid}")))?;
    match User::from_fields(&fields) {
        Ok(mut user) => {
            user.id = Some(user_uid.to_string());
            Ok(user)
        }
        Err(err) => {
            warn!(user_uid, error = %err, "malformed user document");
            Err(Error::not_found(format!("user {user_uid}")))
        }
    }
}

/// Add or remove a post from the user's saved recipes.
///
/// Read-modify-write on the whole profile document with no optimistic
/// concurrency check: of two toggles in flight for the same user, the
/// last write wins and the other is silently lost. Saving an already
/// saved post is a no-op, which keeps the list duplicate-free.
#[instrument(skip(app))]
pub async fn set_favourite(
    app: &AppState,
    user_uid: &str,
    post_id: &str,
    desired: bool,
) -> Result<(), Error> {
    let mut user = fetch_profile(app, user_uid).await?;
    let ids = user.saved_recipe_ids.get_or_insert_with(Vec::new);
    if desired {
        if !ids.iter().any(|id| id == post_id) {
            ids.push(post_id.to_string());
        }
    } else {
        ids.retain(|id| id != post_id);
    }
    app.docs.set(USERS, user_uid, user.to_fields()).await?;
    info!(user_uid, post_id, desired, "favourites updated");
    Ok(())
}

/// Whether the given post is currently in the user's saved recipes.
pub async fn is_favourite(app: &AppState, user_uid: &str, post_id: &str) -> Result<bool, Error> {
    let user = fetch_profile(app, user_uid).await?;
    Ok(user.saved_recipes().iter().any(|id| id == post_id))
}

pub struct ProfileEdit {
    pub username: String,
    pub user_email: String,
    pub full_name: String,
    pub about_you: String,
    pub new_profile_pic: Option<Bytes>,
}

/// Save profile edits. A new picture is uploaded first under a
/// timestamped key, so earlier pictures are not overwritten, then the
/// whole document is written back.
#[instrument(skip(app, edit))]
pub async fn update_profile(
    app: &AppState,
    user_uid: &str,
    edit: ProfileEdit,
) -> Result<User, Error> {
    let mut user = fetch_profile(app, user_uid).await?;

    if let Some(bytes) = edit.new_profile_pic {
        let stamp = OffsetDateTime::now_utc().unix_timestamp();
        let path = format!("{PROFILE_IMAGES}/{user_uid}-{stamp}.jpg");
        app.blobs.upload(&path, bytes).await?;
        user.user_prof_pic_url = Some(app.blobs.url(&path).await?);
    }

    user.username = edit.username;
    user.user_email = edit.user_email;
    user.full_name = edit.full_name;
    user.about_you = edit.about_you;

    app.docs.set(USERS, user_uid, user.to_fields()).await?;
    info!(user_uid, "profile updated");
    Ok(user)
}
