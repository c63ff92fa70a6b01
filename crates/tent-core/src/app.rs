//! App registration and OAuth token exchange records.

use serde::{Deserialize, Serialize};

use crate::credentials::Credentials;
use crate::error::Result;
use crate::post::{Post, PostPermissions};

pub const POST_TYPE_APP: &str = "https://tent.io/types/app/v0#";
pub const POST_TYPE_APP_AUTH: &str = "https://tent.io/types/app-auth/v0#";
pub const POST_TYPE_CREDENTIALS: &str = "https://tent.io/types/credentials/v0#";

/// `token_type` requested when exchanging an authorization code.
pub const TOKEN_TYPE_HAWK: &str = "https://tent.io/oauth/hawk-token";

/// Post types an app may read or write.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppTypes {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub read: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub write: Vec<String>,
}

impl AppTypes {
    pub fn is_empty(&self) -> bool {
        self.read.is_empty() && self.write.is_empty()
    }
}

/// Content of an app post.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct App {
    pub name: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scopes: Vec<String>,
    #[serde(default, skip_serializing_if = "AppTypes::is_empty")]
    pub types: AppTypes,
    pub redirect_uri: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub notification_url: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notification_types: Vec<String>,
}

/// Content of an app-auth post: what the entity granted an app.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppAuth {
    #[serde(default)]
    pub active: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scopes: Vec<String>,
    #[serde(default, skip_serializing_if = "AppTypes::is_empty")]
    pub types: AppTypes,
}

/// Wrap an app registration in a post. App posts are never public.
pub fn new_app_post(app: &App) -> Result<Post> {
    let mut post = Post::new(POST_TYPE_APP);
    post.set_content(app)?;
    post.permissions = Some(PostPermissions { public_flag: Some(false), ..Default::default() });
    Ok(post)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessTokenRequest {
    pub code: String,
    pub token_type: String,
}

impl AccessTokenRequest {
    pub fn hawk(code: &str) -> Self {
        Self { code: code.to_string(), token_type: TOKEN_TYPE_HAWK.to_string() }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccessTokenResponse {
    #[serde(rename = "access_token")]
    pub hawk_id: String,
    pub hawk_key: String,
    #[serde(default)]
    pub hawk_algorithm: String,
    #[serde(default)]
    pub token_type: String,
}

impl AccessTokenResponse {
    /// Credentials for signing as `app` with the issued token.
    pub fn credentials(&self, app: Option<String>) -> Credentials {
        Credentials { id: self.hawk_id.clone(), key: self.hawk_key.clone(), app }
    }
}
