//! Hawk credentials and the credentials post they are published in.

use serde::Deserialize;

use crate::app::POST_TYPE_APP;
use crate::error::{Error, Result};
use crate::post::Post;

/// A Hawk key pair, optionally bound to the app that was issued it.
///
/// The algorithm is always HMAC-SHA256.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Key identifier; the id of the credentials post.
    pub id: String,
    /// Shared secret.
    pub key: String,
    /// Id of the app post these credentials were issued to.
    pub app: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("id", &self.id)
            .field("key", &"<redacted>")
            .field("app", &self.app)
            .finish()
    }
}

/// Content of a credentials post.
#[derive(Debug, Deserialize)]
struct CredentialsContent {
    #[serde(default)]
    hawk_key: String,
}

/// Read Hawk credentials out of a credentials post.
pub fn parse_credentials(post: &Post) -> Result<Credentials> {
    let content: CredentialsContent = post
        .content_as()?
        .ok_or_else(|| Error::MissingField("content".into()))?;
    if content.hawk_key.is_empty() {
        return Err(Error::MissingField("hawk_key".into()));
    }
    let app = post
        .mentions
        .iter()
        .find(|m| m.post_type == POST_TYPE_APP && !m.post.is_empty())
        .map(|m| m.post.clone());
    Ok(Credentials { id: post.id.clone(), key: content.hawk_key, app })
}
