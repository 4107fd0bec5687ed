use serde_json::{json, Value};
use time::OffsetDateTime;

use crate::error::DecodeError;
use crate::store::{optional_str, required_str, Document};

/// A recipe post as displayed in the feed.
///
/// `id` is assigned by the remote store on creation; an unpersisted
/// post has none. `liked_ids`, `disliked_ids` and `image_reference_id`
/// exist for wire compatibility with older documents and carry no
/// behavior. `favourite` is a legacy flag; the per-user saved list on
/// [`crate::users::User`] is what actually drives favourites.
#[derive(Debug, Clone, PartialEq)]
pub struct Post {
    pub id: Option<String>,
    pub title: String,
    pub text: String,
    pub image_url: Option<String>,
    pub image_reference_id: String,
    pub published_date: OffsetDateTime,
    pub liked_ids: Vec<String>,
    pub disliked_ids: Vec<String>,
    pub user_name: String,
    pub user_uid: String,
    pub favourite: bool,
}

impl Post {
    pub fn new(
        title: impl Into<String>,
        text: impl Into<String>,
        user_name: impl Into<String>,
        user_uid: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            title: title.into(),
            text: text.into(),
            image_url: None,
            image_reference_id: String::new(),
            published_date: now_millis(),
            liked_ids: Vec::new(),
            disliked_ids: Vec::new(),
            user_name: user_name.into(),
            user_uid: user_uid.into(),
            favourite: false,
        }
    }

    /// Decode a raw document. Fails when any required field is missing
    /// or has the wrong type; the remote store enforces no schema, so
    /// this is the only line of defense.
    pub fn from_fields(fields: &Document) -> Result<Self, DecodeError> {
        let title = required_str(fields, "title")?;
        let text = required_str(fields, "text")?;
        let user_name = required_str(fields, "userName")?;
        let user_uid = required_str(fields, "userUID")?;
        let published_date = match fields.get("timestamp") {
            None => return Err(DecodeError::MissingField("timestamp")),
            Some(value) => {
                timestamp_from_wire(value).ok_or(DecodeError::WrongType("timestamp"))?
            }
        };

        Ok(Self {
            id: optional_str(fields, "id"),
            title,
            text,
            image_url: optional_str(fields, "imageURL"),
            image_reference_id: String::new(),
            published_date,
            liked_ids: Vec::new(),
            disliked_ids: Vec::new(),
            user_name,
            user_uid,
            favourite: fields
                .get("favourite")
                .and_then(Value::as_bool)
                .unwrap_or(false),
        })
    }

    /// Encode for the remote store. `imageURL` is omitted entirely when
    /// absent so the stored schema stays sparse; the dead fields are
    /// never written.
    pub fn to_fields(&self) -> Document {
        let mut fields = Document::new();
        fields.insert("title".into(), json!(self.title));
        fields.insert("text".into(), json!(self.text));
        fields.insert("userName".into(), json!(self.user_name));
        fields.insert("userUID".into(), json!(self.user_uid));
        fields.insert("timestamp".into(), timestamp_to_wire(self.published_date));
        fields.insert("favourite".into(), json!(self.favourite));
        if let Some(image_url) = &self.image_url {
            fields.insert("imageURL".into(), json!(image_url));
        }
        fields
    }
}

/// Wire timestamps are epoch milliseconds, so the document store can
/// order a feed query numerically.
pub(crate) fn timestamp_to_wire(t: OffsetDateTime) -> Value {
    Value::from((t.unix_timestamp_nanos() / 1_000_000) as i64)
}

pub(crate) fn timestamp_from_wire(value: &Value) -> Option<OffsetDateTime> {
    let millis = value.as_i64()?;
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000).ok()
}

/// Current time truncated to millisecond precision, the resolution the
/// wire format can represent.
pub(crate) fn now_millis() -> OffsetDateTime {
    let now = OffsetDateTime::now_utc();
    let nanos = (now.unix_timestamp_nanos() / 1_000_000) * 1_000_000;
    OffsetDateTime::from_unix_timestamp_nanos(nanos).unwrap_or(now)
}
