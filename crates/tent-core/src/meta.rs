//! Meta posts: an entity's profile and the servers that host its posts.

use serde::{Deserialize, Serialize};
use url::Url;
use url::form_urlencoded::byte_serialize;

use crate::error::{Error, Result};
use crate::post::{Post, PostAttachment};

/// Link relation pointing from an entity URI to its meta post.
pub const REL_META_POST: &str = "https://tent.io/rels/meta-post";

/// Endpoint templates advertised by one server.
///
/// Templates carry `{entity}`, `{post}`, `{name}` and `{digest}` placeholders.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerUrls {
    #[serde(default)]
    pub oauth_auth: String,
    #[serde(default)]
    pub oauth_token: String,
    #[serde(default)]
    pub posts_feed: String,
    #[serde(default)]
    pub post: String,
    #[serde(default)]
    pub new_post: String,
    #[serde(default)]
    pub post_attachment: String,
    #[serde(default)]
    pub attachment: String,
    #[serde(default)]
    pub batch: String,
    #[serde(default)]
    pub server_info: String,
}

impl ServerUrls {
    /// URL of a post, optionally pinned to one version.
    pub fn post_url(&self, entity: &str, post: &str, version: Option<&str>) -> Result<String> {
        let url = self
            .post
            .replacen("{entity}", &query_escape(entity), 1)
            .replacen("{post}", post, 1);
        with_version(url, version)
    }

    /// URL of a named attachment of a post.
    pub fn post_attachment_url(
        &self,
        entity: &str,
        post: &str,
        version: Option<&str>,
        name: &str,
    ) -> Result<String> {
        let url = self
            .post_attachment
            .replacen("{entity}", &query_escape(entity), 1)
            .replacen("{post}", post, 1)
            .replacen("{name}", &query_escape(name), 1);
        with_version(url, version)
    }

    /// URL of an attachment addressed by digest.
    pub fn attachment_url(&self, entity: &str, digest: &str) -> String {
        self.attachment
            .replacen("{entity}", &query_escape(entity), 1)
            .replacen("{digest}", digest, 1)
    }

    /// Authorization URL to send the user to when registering an app.
    pub fn oauth_url(&self, app_id: &str, state: &str) -> Result<String> {
        let mut url = Url::parse(&self.oauth_auth)?;
        url.query_pairs_mut()
            .clear()
            .append_pair("client_id", app_id)
            .append_pair("state", state);
        Ok(url.into())
    }
}

fn query_escape(s: &str) -> String {
    byte_serialize(s.as_bytes()).collect()
}

fn with_version(url: String, version: Option<&str>) -> Result<String> {
    match version.filter(|v| !v.is_empty()) {
        Some(version) => append_query(url, "version", version),
        None => Ok(url),
    }
}

/// Add `name=value` to the query of an already-expanded URL template.
pub fn append_query(url: String, name: &str, value: &str) -> Result<String> {
    if url.contains('?') {
        let mut parsed = Url::parse(&url)?;
        parsed.query_pairs_mut().append_pair(name, value);
        Ok(parsed.into())
    } else {
        Ok(format!("{url}?{name}={}", query_escape(value)))
    }
}

/// One server hosting an entity's posts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerDescriptor {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub preference: i64,
    #[serde(default)]
    pub urls: ServerUrls,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaProfile {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub bio: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub website: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub location: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub avatar_digest: String,
}

/// The parsed content of an entity's meta post.
///
/// `servers` keeps the order the entity published them in, which is the
/// order requests fail over in.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetaPost {
    pub entity: String,
    #[serde(default)]
    pub profile: MetaProfile,
    #[serde(default)]
    pub servers: Vec<ServerDescriptor>,
    /// The post this was parsed from, when it came from one.
    #[serde(skip)]
    pub post: Option<Post>,
}

impl MetaPost {
    /// Parse a fetched meta post, keeping the post alongside.
    pub fn from_post(post: Post) -> Result<Self> {
        let content = post
            .content
            .as_deref()
            .ok_or_else(|| Error::MissingField("content".into()))?;
        let mut meta = parse_meta(content.get().as_bytes(), &post.attachments)?;
        meta.post = Some(post);
        Ok(meta)
    }
}

/// Parse meta post content. The first attachment, if any, is the avatar.
pub fn parse_meta(content: &[u8], attachments: &[PostAttachment]) -> Result<MetaPost> {
    let mut meta: MetaPost = serde_json::from_slice(content)?;
    if let Some(avatar) = attachments.first() {
        meta.profile.avatar_digest = avatar.digest.clone();
    }
    Ok(meta)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn urls() -> ServerUrls {
        ServerUrls {
            oauth_auth: "https://a.example/oauth?x=1".into(),
            post: "https://a.example/posts/{entity}/{post}".into(),
            post_attachment: "https://a.example/posts/{entity}/{post}/attachments/{name}".into(),
            attachment: "https://a.example/attachments/{entity}/{digest}".into(),
            ..Default::default()
        }
    }

    #[test]
    fn post_url_escapes_entity() {
        assert_eq!(
            urls().post_url("https://bob.example", "p1", None).unwrap(),
            "https://a.example/posts/https%3A%2F%2Fbob.example/p1"
        );
    }

    #[test]
    fn version_is_appended_as_query() {
        assert_eq!(
            urls().post_url("e", "p1", Some("abc")).unwrap(),
            "https://a.example/posts/e/p1?version=abc"
        );
        let mut u = urls();
        u.post = "https://a.example/post?entity={entity}&id={post}".into();
        assert_eq!(
            u.post_url("e", "p1", Some("abc")).unwrap(),
            "https://a.example/post?entity=e&id=p1&version=abc"
        );
    }

    #[test]
    fn attachment_urls() {
        assert_eq!(
            urls().post_attachment_url("e", "p1", Some("v"), "a b.png").unwrap(),
            "https://a.example/posts/e/p1/attachments/a+b.png?version=v"
        );
        assert_eq!(
            urls().attachment_url("https://bob.example", "sha512t256-00"),
            "https://a.example/attachments/https%3A%2F%2Fbob.example/sha512t256-00"
        );
    }

    #[test]
    fn oauth_url_replaces_query() {
        assert_eq!(
            urls().oauth_url("app-1", "s t").unwrap(),
            "https://a.example/oauth?client_id=app-1&state=s+t"
        );
    }

    #[test]
    fn parses_meta_content_with_avatar() {
        let content = br#"{
            "entity": "https://bob.example",
            "profile": {"name": "Bob"},
            "servers": [
                {"version": "0.3", "preference": 0, "urls": {"post": "https://s1/{post}"}},
                {"version": "0.3", "preference": 1, "urls": {"post": "https://s2/{post}"}}
            ]
        }"#;
        let avatar = PostAttachment { digest: "d1".into(), ..Default::default() };
        let meta = parse_meta(content, &[avatar]).unwrap();
        assert_eq!(meta.entity, "https://bob.example");
        assert_eq!(meta.profile.name, "Bob");
        assert_eq!(meta.profile.avatar_digest, "d1");
        assert_eq!(meta.servers.len(), 2);
        assert_eq!(meta.servers[1].urls.post, "https://s2/{post}");
    }

    #[test]
    fn meta_post_without_content_is_rejected() {
        let post = Post::new("https://tent.io/types/meta/v0#");
        assert!(matches!(MetaPost::from_post(post), Err(Error::MissingField(_))));
    }
}
