//! Entity discovery: from an entity URI to its meta post.
//!
//! A HEAD request to the entity looks for meta-post `Link` headers. Only when
//! there are none is the entity fetched as HTML and scanned for `<link>` tags.
//! Candidates are tried one at a time in document order, resolved against
//! the URL the response actually came from. Finding no candidates at all is
//! `Ok(None)`, not an error.

use tracing::{debug, info};
use url::Url;

use tent_core::link::{parse_html_links, parse_link_header};
use tent_core::meta::{MetaPost, REL_META_POST};
use tent_core::post::media_type;

use crate::client::get_meta_post;
use crate::error::{Error, Result};
use crate::executor::first_success;
use crate::transport::{Method, Request, Transport};

/// Find the meta post for `entity`.
pub fn discover<T: Transport + ?Sized>(transport: &T, entity: &str) -> Result<Option<MetaPost>> {
    debug!(entity, "Discovering via Link header");
    let res = transport.send(Request::new(Method::Head, entity))?;
    if !res.is_success() {
        return Err(res.into_bad_status());
    }

    let mut candidates = Vec::new();
    for value in res.header_all("link") {
        candidates.extend(
            parse_link_header(value)?
                .into_iter()
                .filter(|link| link.rel == REL_META_POST)
                .map(|link| link.uri),
        );
    }
    if !candidates.is_empty() {
        return fetch_first(transport, &res.url, &candidates).map(Some);
    }

    debug!(entity, "No meta-post Link header, falling back to HTML");
    let res = transport.send(Request::new(Method::Get, entity).header("Accept", "text/html"))?;
    if res.status != 200 {
        return Err(res.into_bad_status());
    }
    match res.header("content-type") {
        None => return Err(Error::BadContentType { content_type: None }),
        Some(ct) if media_type(ct) != "text/html" => {
            return Err(Error::BadContentType { content_type: Some(ct.to_string()) });
        }
        Some(_) => {}
    }
    let base = res.url.clone();
    let body = res.read_body_lenient()?;
    let candidates = parse_html_links(&String::from_utf8_lossy(&body), REL_META_POST);
    if candidates.is_empty() {
        info!(entity, "No meta post found");
        return Ok(None);
    }
    fetch_first(transport, &base, &candidates).map(Some)
}

/// Fetch the meta post behind each candidate in turn until one works.
fn fetch_first<T: Transport + ?Sized>(
    transport: &T,
    base: &str,
    candidates: &[String],
) -> Result<MetaPost> {
    let base = Url::parse(base)?;
    first_success(candidates, |candidate| {
        let url = resolve(&base, candidate)?;
        debug!(%url, "Fetching meta post");
        get_meta_post(transport, &url)
    })
}

/// Stands in for `%` while joining, so escapes like `%2E%2E` are not decoded
/// into dot segments.
const PERCENT_STANDIN: &str = "\u{fffe}";
/// `PERCENT_STANDIN` as the URL parser encodes it.
const PERCENT_STANDIN_ENCODED: &str = "%EF%BF%BE";

/// Resolve `reference` against `base`, keeping its `%xx` escapes literal.
fn resolve(base: &Url, reference: &str) -> Result<String> {
    let joined = base.join(&reference.replace('%', PERCENT_STANDIN))?;
    Ok(joined.as_str().replace(PERCENT_STANDIN_ENCODED, "%"))
}
