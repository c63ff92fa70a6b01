//! The Tent post document.
//!
//! Field presence follows the wire format: empty strings and empty lists are
//! omitted when serialized, `content` is kept as the exact raw JSON the
//! server sent, and `public` flags stay tri-state (absent, true, false).
//! Timestamps are milliseconds since the Unix epoch.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::value::RawValue;

use crate::error::Result;
use crate::link::Link;

/// Media type of a single post envelope.
pub const MEDIA_TYPE_POST: &str = "application/vnd.tent.post.v0+json";
/// Media type of a posts feed page.
pub const MEDIA_TYPE_POSTS_FEED: &str = "application/vnd.tent.posts-feed.v0+json";
/// Media type of a post versions list.
pub const MEDIA_TYPE_POST_VERSIONS: &str = "application/vnd.tent.post-versions.v0+json";
/// Media type of a post mentions list.
pub const MEDIA_TYPE_POST_MENTIONS: &str = "application/vnd.tent.post-mentions.v0+json";
/// Media type of a post children list.
pub const MEDIA_TYPE_POST_CHILDREN: &str = "application/vnd.tent.post-children.v0+json";
/// Media type of a protocol error body.
pub const MEDIA_TYPE_ERROR: &str = "application/vnd.tent.error.v0+json";

/// Relation of the link pointing at a post's credentials post.
pub const REL_CREDENTIALS: &str = "https://tent.io/rels/credentials";
/// Relation marking a post delivery as a notification.
pub const REL_NOTIFICATION: &str = "https://tent.io/rels/notification";

/// A reference from one post to another.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostRef {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub entity: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub original_entity: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub post: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub post_type: String,
}

/// A mention of an entity, optionally pinned to one of its posts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostMention {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub entity: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub original_entity: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub post: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub post_type: String,
    /// Absent or `true` means public; only `false` is private.
    #[serde(rename = "public", default, skip_serializing_if = "Option::is_none")]
    pub public_flag: Option<bool>,
}

impl PostMention {
    pub fn is_public(&self) -> bool {
        self.public_flag != Some(false)
    }
}

/// Metadata of a file attached to a post.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostAttachment {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub content_type: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub size: u64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub digest: String,
}

fn is_zero(n: &u64) -> bool {
    *n == 0
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostPermissions {
    /// Absent or `true` means public; only `false` is private.
    #[serde(rename = "public", default, skip_serializing_if = "Option::is_none")]
    pub public_flag: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entities: Vec<String>,
}

impl PostPermissions {
    /// A post without permissions is public.
    pub fn is_public(permissions: Option<&PostPermissions>) -> bool {
        permissions.is_none_or(|p| p.public_flag != Some(false))
    }
}

/// The app that published a post.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostApp {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
}

/// A prior version this version descends from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostVersionParent {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub entity: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub original_entity: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub post: String,
    #[serde(default)]
    pub version: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostVersion {
    /// Hex version id. Assigned by hashing, never by hand.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parents: Vec<PostVersionParent>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub received_at: Option<u64>,

    // Populated in version and children listings.
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub post_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub entity: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub post: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostLicense {
    pub url: String,
}

/// A versioned, typed unit of content published by an entity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Post {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub entity: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub original_entity: String,

    #[serde(rename = "type", default)]
    pub post_type: String,
    /// Opaque JSON content, byte-for-byte as received. A literal `null` is
    /// kept as present content.
    #[serde(default, deserialize_with = "present_raw", skip_serializing_if = "Option::is_none")]
    pub content: Option<Box<RawValue>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<PostVersion>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub refs: Vec<PostRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mentions: Vec<PostMention>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub licenses: Vec<PostLicense>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<PostAttachment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<PostPermissions>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app: Option<PostApp>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub received_at: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<u64>,

    /// Transport-level links, sent and received as a `Link` header.
    #[serde(skip)]
    pub links: Vec<Link>,

    /// Deliver as a notification rather than a regular post.
    #[serde(skip)]
    pub notification: bool,
}

/// A post together with the posts it references, as served by a server.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PostEnvelope {
    #[serde(default)]
    pub post: Option<Post>,
    #[serde(default)]
    pub refs: Vec<Post>,
}

impl Post {
    pub fn new(post_type: &str) -> Self {
        Self { post_type: post_type.to_string(), ..Self::default() }
    }

    /// Serialize `value` as this post's content.
    pub fn set_content<T: Serialize>(&mut self, value: &T) -> Result<()> {
        self.content = Some(serde_json::value::to_raw_value(value)?);
        Ok(())
    }

    /// Set the content from raw JSON text, kept byte-for-byte.
    pub fn set_raw_content(&mut self, raw: &str) -> Result<()> {
        self.content = Some(RawValue::from_string(raw.to_string())?);
        Ok(())
    }

    /// The raw content bytes, empty when there is no content.
    pub fn content_bytes(&self) -> &[u8] {
        self.content.as_deref().map_or(&[][..], |raw| raw.get().as_bytes())
    }

    /// Decode the content into `T`. `None` when the post has no content.
    pub fn content_as<T: DeserializeOwned>(&self) -> Result<Option<T>> {
        match &self.content {
            Some(raw) => Ok(Some(serde_json::from_str(raw.get())?)),
            None => Ok(None),
        }
    }

    pub fn is_public(&self) -> bool {
        PostPermissions::is_public(self.permissions.as_ref())
    }

    /// The `Content-Type` to send this post with.
    pub fn content_type(&self) -> String {
        let mut ct = format!("{MEDIA_TYPE_POST}; type=\"{}\"", self.post_type);
        if self.notification {
            ct.push_str(&format!("; rel=\"{REL_NOTIFICATION}\""));
        }
        ct
    }

    /// URI of the credentials post linked from this post, if any.
    pub fn credentials_link(&self) -> Option<&str> {
        self.links
            .iter()
            .find(|l| l.rel == REL_CREDENTIALS)
            .map(|l| l.uri.as_str())
    }
}

fn present_raw<'de, D>(deserializer: D) -> std::result::Result<Option<Box<RawValue>>, D::Error>
where
    D: Deserializer<'de>,
{
    Box::<RawValue>::deserialize(deserializer).map(Some)
}

/// Split a post type into its base and fragment at `#`.
pub fn split_type(post_type: &str) -> (&str, &str) {
    match post_type.split_once('#') {
        Some((base, fragment)) => (base, fragment),
        None => (post_type, ""),
    }
}

pub fn type_base(post_type: &str) -> &str {
    split_type(post_type).0
}

/// Lowercased media type of a `Content-Type` value, parameters stripped.
pub fn media_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mention_public_flag_is_tri_state() {
        let mut m = PostMention::default();
        assert!(m.is_public());
        m.public_flag = Some(true);
        assert!(m.is_public());
        m.public_flag = Some(false);
        assert!(!m.is_public());
    }

    #[test]
    fn absent_permissions_are_public() {
        let mut post = Post::new("https://tent.io/types/status/v0#");
        assert!(post.is_public());
        post.permissions = Some(PostPermissions { public_flag: Some(false), ..Default::default() });
        assert!(!post.is_public());
    }

    #[test]
    fn raw_content_survives_a_roundtrip_untouched() {
        let json = r#"{"id":"p1","type":"https://tent.io/types/status/v0#","content":{ "text" : "hi" }}"#;
        let post: Post = serde_json::from_str(json).unwrap();
        assert_eq!(post.content_bytes(), br#"{ "text" : "hi" }"#);
        let out = serde_json::to_string(&post).unwrap();
        assert!(out.contains(r#""content":{ "text" : "hi" }"#));
    }

    #[test]
    fn null_content_is_present() {
        let post: Post = serde_json::from_str(r#"{"id":"p","type":"t","content":null}"#).unwrap();
        assert_eq!(post.content_bytes(), b"null");
        assert_eq!(
            serde_json::to_string(&post).unwrap(),
            r#"{"id":"p","type":"t","content":null}"#
        );

        let absent: Post = serde_json::from_str(r#"{"id":"p","type":"t"}"#).unwrap();
        assert!(absent.content.is_none());
    }

    #[test]
    fn empty_fields_are_omitted() {
        let post = Post::new("https://tent.io/types/status/v0#");
        assert_eq!(
            serde_json::to_string(&post).unwrap(),
            r#"{"type":"https://tent.io/types/status/v0#"}"#
        );
    }

    #[test]
    fn content_type_carries_post_type_and_notification_rel() {
        let mut post = Post::new("https://tent.io/types/status/v0#reply");
        assert_eq!(
            post.content_type(),
            "application/vnd.tent.post.v0+json; type=\"https://tent.io/types/status/v0#reply\""
        );
        post.notification = true;
        assert!(post.content_type().ends_with("; rel=\"https://tent.io/rels/notification\""));
    }

    #[test]
    fn type_splitting() {
        assert_eq!(split_type("https://tent.io/types/app/v0#"), ("https://tent.io/types/app/v0", ""));
        assert_eq!(split_type("a#b#c"), ("a", "b#c"));
        assert_eq!(type_base("no-fragment"), "no-fragment");
    }

    #[test]
    fn media_type_strips_parameters() {
        assert_eq!(media_type("Text/HTML; charset=utf-8"), "text/html");
        assert_eq!(media_type(""), "");
    }

    #[test]
    fn credentials_link_lookup() {
        let mut post = Post::default();
        assert_eq!(post.credentials_link(), None);
        post.links.push(Link::new("https://a.example/posts/creds", REL_CREDENTIALS));
        assert_eq!(post.credentials_link(), Some("https://a.example/posts/creds"));
    }
}
