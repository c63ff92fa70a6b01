//! Protocol operations against an entity's servers.
//!
//! Reads fail over across the entity's servers in published order; writes
//! go to the first server. Requests are signed with Hawk whenever the client
//! holds credentials.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use tent_core::app::{AccessTokenRequest, AccessTokenResponse};
use tent_core::credentials::{Credentials, parse_credentials};
use tent_core::link::{format_link_header, parse_link_header};
use tent_core::meta::{MetaPost, ServerDescriptor, append_query, parse_meta};
use tent_core::post::{
    MEDIA_TYPE_POST, MEDIA_TYPE_POST_CHILDREN, MEDIA_TYPE_POST_MENTIONS, MEDIA_TYPE_POST_VERSIONS,
    MEDIA_TYPE_POSTS_FEED, Post, PostEnvelope, PostMention, PostVersion,
};
use tent_core::signing::{Payload, authorization_header};

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::executor::first_success;
use crate::transport::{HttpTransport, Method, Request, Response, Transport};

/// A client acting on behalf of one entity.
pub struct Client<T: Transport = HttpTransport> {
    transport: T,
    credentials: Option<Credentials>,
    entity: String,
    servers: Vec<ServerDescriptor>,
}

impl Client {
    /// An HTTP client for the entity described by `meta_content`, signing
    /// with the credentials in `credentials_post`.
    pub fn new(credentials_post: &Post, meta_content: &[u8], config: &ClientConfig) -> Result<Self> {
        let credentials = parse_credentials(credentials_post)?;
        let meta = parse_meta(meta_content, &[])?;
        Ok(Self::with_servers(
            HttpTransport::new(config),
            Some(credentials),
            meta.entity,
            meta.servers,
        ))
    }
}

impl<T: Transport> Client<T> {
    pub fn with_servers(
        transport: T,
        credentials: Option<Credentials>,
        entity: impl Into<String>,
        servers: Vec<ServerDescriptor>,
    ) -> Self {
        Self { transport, credentials, entity: entity.into(), servers }
    }

    pub fn from_meta(transport: T, credentials: Option<Credentials>, meta: MetaPost) -> Self {
        Self::with_servers(transport, credentials, meta.entity, meta.servers)
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn servers(&self) -> &[ServerDescriptor] {
        &self.servers
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Sign with the client's credentials, if any, and send.
    ///
    /// The payload hash uses the `Content-Type` already on the request.
    fn send(&self, mut request: Request) -> Result<Response> {
        if let Some(credentials) = &self.credentials {
            let content_type = request.header_value("content-type").unwrap_or_default();
            let payload = request.body.as_deref().map(|body| Payload { content_type, body });
            let auth =
                authorization_header(credentials, request.method.as_str(), &request.url, payload)?;
            request.headers.push(("Authorization".to_string(), auth));
        }
        self.transport.send(request)
    }

    /// Publish a post, or a new version of it when it already has an id.
    ///
    /// Returns the post as the server stored it, with any `Link` header
    /// links the server sent back.
    pub fn create_post(&self, mut post: Post) -> Result<Post> {
        let server = self.servers.first().ok_or(Error::NoServers)?;
        let (method, url) = if post.id.is_empty() {
            (Method::Post, server.urls.new_post.clone())
        } else {
            let entity = if post.entity.is_empty() { &self.entity } else { &post.entity };
            let url = server.urls.post_url(entity, &post.id, None)?;
            post.entity.clear();
            post.id.clear();
            (Method::Put, url)
        };

        let mut request = Request::new(method, url)
            .header("Content-Type", post.content_type())
            .header("Accept", MEDIA_TYPE_POST)
            .body(serde_json::to_vec(&post)?);
        if !post.links.is_empty() {
            request = request.header("Link", format_link_header(&post.links));
        }
        debug!(%method, post_type = %post.post_type, "Creating post");

        let (stored, links) = post_response(self.send(request)?)?;
        let mut stored = stored.ok_or_else(missing_post)?;
        stored.links = links;
        Ok(stored)
    }

    /// Fetch a post, optionally a specific version, with up to `max_refs`
    /// referenced posts alongside.
    pub fn get_post(
        &self,
        entity: &str,
        id: &str,
        version: Option<&str>,
        max_refs: Option<u32>,
    ) -> Result<PostEnvelope> {
        first_success(&self.servers, |server| {
            let mut url = server.urls.post_url(entity, id, version)?;
            if let Some(max_refs) = max_refs.filter(|n| *n > 0) {
                url = append_query(url, "max_refs", &max_refs.to_string())?;
            }
            let request = Request::new(Method::Get, url).header("Accept", MEDIA_TYPE_POST);
            envelope_response(self.send(request)?)
        })
    }

    /// Delete one of the client entity's posts, or one version of it.
    ///
    /// With `create_delete_post` false the server is asked not to publish a
    /// delete post. Returns the delete post when the server sends one.
    pub fn delete_post(
        &self,
        id: &str,
        version: Option<&str>,
        create_delete_post: bool,
    ) -> Result<Option<Post>> {
        first_success(&self.servers, |server| {
            let url = server.urls.post_url(&self.entity, id, version)?;
            let mut request = Request::new(Method::Delete, url).header("Accept", MEDIA_TYPE_POST);
            if !create_delete_post {
                request = request.header("Create-Delete-Post", "false");
            }
            let (post, links) = post_response(self.send(request)?)?;
            Ok(post.map(|mut post| {
                post.links = links;
                post
            }))
        })
    }

    /// Stream an attachment addressed by digest.
    pub fn get_attachment(&self, entity: &str, digest: &str) -> Result<Response> {
        first_success(&self.servers, |server| {
            let url = server.urls.attachment_url(entity, digest);
            ok_response(self.send(Request::new(Method::Get, url))?)
        })
    }

    /// Stream a post's attachment by name.
    pub fn get_post_attachment(
        &self,
        entity: &str,
        post: &str,
        version: Option<&str>,
        name: &str,
        accept: Option<&str>,
    ) -> Result<Response> {
        first_success(&self.servers, |server| {
            let url = server.urls.post_attachment_url(entity, post, version, name)?;
            let mut request = Request::new(Method::Get, url);
            if let Some(accept) = accept {
                request = request.header("Accept", accept);
            }
            ok_response(self.send(request)?)
        })
    }

    /// Fetch one page of the posts feed.
    ///
    /// When `etag` matches the server's current feed, the page comes back
    /// empty and flagged `not_modified`.
    pub fn get_feed(&self, query: &FeedQuery, etag: Option<&str>) -> Result<FeedPage> {
        first_success(&self.servers, |server| {
            self.fetch_page(query.url(&server.urls.posts_feed)?, MEDIA_TYPE_POSTS_FEED, etag)
        })
    }

    /// Count the posts matching a feed query without fetching them.
    pub fn count_feed(&self, query: &FeedQuery, etag: Option<&str>) -> Result<FeedCount> {
        first_success(&self.servers, |server| {
            self.count_at(query.url(&server.urls.posts_feed)?, MEDIA_TYPE_POSTS_FEED, etag)
        })
    }

    /// Fetch one page of a post's versions.
    pub fn get_versions(&self, entity: &str, post: &str, etag: Option<&str>) -> Result<PostListPage> {
        self.get_post_list(PostList::Versions, entity, post, None, etag)
    }

    /// Fetch one page of the posts that name `version` (or the latest
    /// version) of a post as a parent.
    pub fn get_children(
        &self,
        entity: &str,
        post: &str,
        version: Option<&str>,
        etag: Option<&str>,
    ) -> Result<PostListPage> {
        self.get_post_list(PostList::Children, entity, post, version, etag)
    }

    /// Fetch one page of the mentions of a post.
    pub fn get_mentions(&self, entity: &str, post: &str, etag: Option<&str>) -> Result<PostListPage> {
        self.get_post_list(PostList::Mentions, entity, post, None, etag)
    }

    /// Fetch one page of a post list.
    pub fn get_post_list(
        &self,
        list: PostList,
        entity: &str,
        post: &str,
        version: Option<&str>,
        etag: Option<&str>,
    ) -> Result<PostListPage> {
        first_success(&self.servers, |server| {
            self.fetch_page(server.urls.post_url(entity, post, version)?, list.media_type(), etag)
        })
    }

    /// Count the entries of a post list without fetching them.
    pub fn count_post_list(
        &self,
        list: PostList,
        entity: &str,
        post: &str,
        version: Option<&str>,
        etag: Option<&str>,
    ) -> Result<FeedCount> {
        first_success(&self.servers, |server| {
            self.count_at(server.urls.post_url(entity, post, version)?, list.media_type(), etag)
        })
    }

    /// GET a page. A 304 yields an empty page flagged `not_modified`.
    fn fetch_page<P: Page>(&self, url: String, accept: &str, etag: Option<&str>) -> Result<P> {
        let mut request = Request::new(Method::Get, url).header("Accept", accept);
        if let Some(etag) = etag {
            request = request.header("If-None-Match", etag);
        }
        let res = self.send(request)?;
        let etag = res.header("etag").map(str::to_string);
        match res.status {
            304 => {
                let mut page = P::default();
                page.stamp(etag, true);
                Ok(page)
            }
            200 => {
                let mut page: P = res.read_json()?;
                page.stamp(etag, false);
                Ok(page)
            }
            _ => Err(res.into_bad_status()),
        }
    }

    /// HEAD a page and read its `Count` header.
    fn count_at(&self, url: String, accept: &str, etag: Option<&str>) -> Result<FeedCount> {
        let mut request = Request::new(Method::Head, url).header("Accept", accept);
        if let Some(etag) = etag {
            request = request.header("If-None-Match", etag);
        }
        let res = self.send(request)?;
        let etag = res.header("etag").map(str::to_string);
        match res.status {
            304 => Ok(FeedCount { count: 0, etag, not_modified: true }),
            200 => {
                let count = res
                    .header("count")
                    .and_then(|c| c.trim().parse().ok())
                    .ok_or_else(|| Error::BadData { context: "missing Count header".into() })?;
                Ok(FeedCount { count, etag, not_modified: false })
            }
            _ => Err(res.into_bad_status()),
        }
    }

    /// Exchange an OAuth authorization code for Hawk credentials bound to
    /// this client's app.
    pub fn request_access_token(&self, code: &str) -> Result<Credentials> {
        let body = serde_json::to_vec(&AccessTokenRequest::hawk(code))?;
        let token: AccessTokenResponse = first_success(&self.servers, |server| {
            let request = Request::new(Method::Post, server.urls.oauth_token.clone())
                .header("Accept", "application/json")
                .header("Content-Type", "application/json")
                .body(body.clone());
            ok_response(self.send(request)?)?.read_json()
        })?;
        let app = self.credentials.as_ref().and_then(|c| c.app.clone());
        Ok(token.credentials(app))
    }
}

/// Raw posts feed query parameters, sent in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedQuery {
    pub params: Vec<(String, String)>,
}

impl FeedQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn param(mut self, name: &str, value: impl Into<String>) -> Self {
        self.params.push((name.to_string(), value.into()));
        self
    }

    fn url(&self, base: &str) -> Result<String> {
        if self.params.is_empty() {
            return Ok(base.to_string());
        }
        let mut url = Url::parse(base)?;
        url.query_pairs_mut().extend_pairs(&self.params);
        Ok(url.into())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PageLinks {
    #[serde(default)]
    pub first: Option<String>,
    #[serde(default)]
    pub prev: Option<String>,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub last: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeedPage {
    #[serde(default, alias = "data")]
    pub posts: Vec<Post>,
    #[serde(default)]
    pub refs: Vec<Post>,
    #[serde(default)]
    pub pages: PageLinks,
    #[serde(skip)]
    pub etag: Option<String>,
    #[serde(skip)]
    pub not_modified: bool,
}

/// The lists hanging off a single post.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostList {
    Versions,
    Children,
    Mentions,
}

impl PostList {
    pub fn media_type(self) -> &'static str {
        match self {
            PostList::Versions => MEDIA_TYPE_POST_VERSIONS,
            PostList::Children => MEDIA_TYPE_POST_CHILDREN,
            PostList::Mentions => MEDIA_TYPE_POST_MENTIONS,
        }
    }
}

/// One page of a post list. Which member is filled depends on the list:
/// versions and children come as `versions`, mentions as `mentions`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostListPage {
    #[serde(default)]
    pub versions: Vec<PostVersion>,
    #[serde(default)]
    pub mentions: Vec<PostMention>,
    #[serde(default)]
    pub posts: Vec<Post>,
    #[serde(default)]
    pub pages: PageLinks,
    #[serde(skip)]
    pub etag: Option<String>,
    #[serde(skip)]
    pub not_modified: bool,
}

/// A page fetched with conditional GET.
trait Page: DeserializeOwned + Default {
    fn stamp(&mut self, etag: Option<String>, not_modified: bool);
}

impl Page for FeedPage {
    fn stamp(&mut self, etag: Option<String>, not_modified: bool) {
        self.etag = etag;
        self.not_modified = not_modified;
    }
}

impl Page for PostListPage {
    fn stamp(&mut self, etag: Option<String>, not_modified: bool) {
        self.etag = etag;
        self.not_modified = not_modified;
    }
}

/// Result of a HEAD count against the feed or a post list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedCount {
    pub count: u64,
    pub etag: Option<String>,
    pub not_modified: bool,
}

/// Fetch a post envelope from a full URL, unauthenticated.
pub fn get_post_url<T: Transport + ?Sized>(transport: &T, url: &str) -> Result<PostEnvelope> {
    let request = Request::new(Method::Get, url).header("Accept", MEDIA_TYPE_POST);
    envelope_response(transport.send(request)?)
}

/// Fetch and parse a meta post from a full URL.
pub fn get_meta_post<T: Transport + ?Sized>(transport: &T, url: &str) -> Result<MetaPost> {
    let envelope = get_post_url(transport, url)?;
    let post = envelope.post.ok_or_else(missing_post)?;
    Ok(MetaPost::from_post(post)?)
}

/// Follow a post's credentials link and parse the credentials found there.
pub fn linked_credentials<T: Transport + ?Sized>(
    transport: &T,
    post: &Post,
) -> Result<(Credentials, Post)> {
    let url = post.credentials_link().ok_or(Error::MissingCredentialsLink)?;
    let envelope = get_post_url(transport, url)?;
    let creds_post = envelope.post.ok_or_else(missing_post)?;
    let credentials = parse_credentials(&creds_post)?;
    Ok((credentials, creds_post))
}

fn missing_post() -> Error {
    Error::BadData { context: "response has no post".into() }
}

fn ok_response(res: Response) -> Result<Response> {
    if res.status == 200 { Ok(res) } else { Err(res.into_bad_status()) }
}

/// A 200 response whose envelope must carry a post.
fn envelope_response(res: Response) -> Result<PostEnvelope> {
    let envelope: PostEnvelope = ok_response(res)?.read_json()?;
    if envelope.post.is_none() {
        return Err(missing_post());
    }
    Ok(envelope)
}

/// A 200 response to a write: the post it returned, if any, and the links
/// from its `Link` headers.
fn post_response(res: Response) -> Result<(Option<Post>, Vec<tent_core::Link>)> {
    let res = ok_response(res)?;
    let mut links = Vec::new();
    for value in res.header_all("link") {
        links.extend(parse_link_header(value)?);
    }
    let body = res.read_body()?;
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok((None, links));
    }
    let envelope: PostEnvelope = serde_json::from_slice(&body)?;
    Ok((envelope.post, links))
}
