use bytes::Bytes;
use tracing::{info, instrument, warn};

use crate::auth::{AuthClient, SessionState};
use crate::error::Error;
use crate::state::AppState;
use crate::store::{PROFILE_IMAGES, USERS};
use crate::users::User;

pub struct RegisterForm {
    pub username: String,
    pub full_name: String,
    pub about_you: String,
    pub email: String,
    pub password: String,
    pub profile_pic: Option<Bytes>,
}

/// Create the auth account, then the profile document keyed by the new
/// UID. A failed picture upload does not abort registration; the
/// profile simply has no picture until the user edits it.
#[instrument(skip(app, form), fields(email = %form.email))]
pub async fn register(app: &AppState, form: RegisterForm) -> Result<User, Error> {
    let uid = app.auth.sign_up(&form.email, &form.password).await?;

    let mut prof_pic_url = None;
    if let Some(bytes) = form.profile_pic {
        let path = format!("{PROFILE_IMAGES}/{uid}.jpg");
        match app.blobs.upload(&path, bytes).await {
            Ok(()) => match app.blobs.url(&path).await {
                Ok(url) => prof_pic_url = Some(url),
                Err(err) => warn!(%uid, error = %err, "no download url for profile picture"),
            },
            Err(err) => warn!(%uid, error = %err, "profile picture upload failed"),
        }
    }

    let user = User {
        id: Some(uid.clone()),
        username: form.username,
        full_name: form.full_name,
        about_you: form.about_you,
        user_uid: uid.clone(),
        user_email: form.email,
        user_prof_pic_url: prof_pic_url,
        saved_recipe_ids: None,
    };
    app.docs.set(USERS, &uid, user.to_fields()).await?;
    info!(%uid, "profile created");
    Ok(user)
}

pub async fn login(app: &AppState, email: &str, password: &str) -> Result<SessionState, Error> {
    let uid = app.auth.sign_in(email, password).await?;
    Ok(SessionState::SignedIn { user_uid: uid })
}

pub async fn logout(app: &AppState) -> SessionState {
    app.auth.sign_out().await;
    info!("user signed out");
    SessionState::SignedOut
}

pub async fn reset_password(app: &AppState, email: &str) -> Result<(), Error> {
    app.auth.send_password_reset(email).await
}

/// Tear down the signed-in account: profile picture, profile document,
/// then the auth record, aborting on the first failure. Pictures saved
/// later under timestamped keys are not tracked and stay behind.
#[instrument(skip(app))]
pub async fn delete_account(app: &AppState) -> Result<SessionState, Error> {
    let Some(uid) = app.auth.current_user_id().await else {
        return Err(Error::validation("not signed in"));
    };

    app.blobs
        .delete(&format!("{PROFILE_IMAGES}/{uid}.jpg"))
        .await?;
    app.docs.delete(USERS, &uid).await?;
    app.auth.delete_current_account().await?;
    info!(%uid, "account removed");
    Ok(SessionState::SignedOut)
}
