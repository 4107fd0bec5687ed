use serde_json::json;

use crate::error::DecodeError;
use crate::store::{optional_str, required_str, Document};

/// A user profile, distinct from the auth record. `user_uid` is the
/// auth UID and the document key; `user_email` mirrors the auth email
/// redundantly. `saved_recipe_ids` is the favourites list; it must not
/// hold duplicates, which the toggle workflow enforces since the
/// sequence itself cannot.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: Option<String>,
    pub username: String,
    pub full_name: String,
    pub about_you: String,
    pub user_uid: String,
    pub user_email: String,
    pub user_prof_pic_url: Option<String>,
    pub saved_recipe_ids: Option<Vec<String>>,
}

impl User {
    pub fn from_fields(fields: &Document) -> Result<Self, DecodeError> {
        Ok(Self {
            id: optional_str(fields, "id"),
            username: required_str(fields, "username")?,
            full_name: required_str(fields, "fullName")?,
            about_you: required_str(fields, "aboutYou")?,
            user_uid: required_str(fields, "userUID")?,
            user_email: required_str(fields, "userEmail")?,
            user_prof_pic_url: optional_str(fields, "userProfPicURL"),
            saved_recipe_ids: fields.get("savedRecipeIDs").map(|value| {
                value
                    .as_array()
                    .map(|ids| {
                        ids.iter()
                            .filter_map(|id| id.as_str().map(str::to_owned))
                            .collect()
                    })
                    .unwrap_or_default()
            }),
        })
    }

    /// `userProfPicURL` and `savedRecipeIDs` are omitted entirely when
    /// absent rather than written as nulls.
    pub fn to_fields(&self) -> Document {
        let mut fields = Document::new();
        fields.insert("username".into(), json!(self.username));
        fields.insert("fullName".into(), json!(self.full_name));
        fields.insert("aboutYou".into(), json!(self.about_you));
        fields.insert("userUID".into(), json!(self.user_uid));
        fields.insert("userEmail".into(), json!(self.user_email));
        if let Some(url) = &self.user_prof_pic_url {
            fields.insert("userProfPicURL".into(), json!(url));
        }
        if let Some(ids) = &self.saved_recipe_ids {
            fields.insert("savedRecipeIDs".into(), json!(ids));
        }
        fields
    }

    /// The saved list with the never-favourited case flattened away.
    pub fn saved_recipes(&self) -> &[String] {
        self.saved_recipe_ids.as_deref().unwrap_or(&[])
    }
}
